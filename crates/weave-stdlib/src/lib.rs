//! # The Weave standard library
//!
//! This crate contains the expanders that can be called from macro expansions
//!     with the syntax `··name(args)`.

extern crate weave;

use std::collections::HashMap;
use weave::expander;

pub mod nested;
pub mod text;
pub mod variables;

/// Returns all of the expanders in the standard library.
pub fn built_in_expanders() -> HashMap<&'static str, expander::BuiltIn> {
    HashMap::from([
        ("concat", text::get_concat()),
        ("count", text::get_count()),
        ("expand", nested::get_expand()),
        ("hygienize", variables::get_hygienize()),
        ("lower", text::get_lower()),
        ("stringify", text::get_stringify()),
        ("trim", text::get_trim()),
        ("unvar", variables::get_unvar()),
        ("upper", text::get_upper()),
    ])
}
