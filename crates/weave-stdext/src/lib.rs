//! Small extensions to the Rust standard library used across the Weave project.

pub mod color;
pub mod suggest;
