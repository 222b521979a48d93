//! # Weave: a token level source-to-source macro preprocessor.
//!
//! Weave reads source code as a stream of tokens, finds the macro and ignore rule
//!     declarations in it, and replaces every match of a macro's pattern with the macro's expansion.
//! It knows nothing about the language being preprocessed beyond its tokens and
//!     balanced `()`, `[]` and `{}` delimiters.
//!
//! ```
//! let mut engine = weave::Engine::new();
//! let output = engine
//!     .expand_source("macro { unless (···c) } >> { if (!(···c)) } unless (done)")
//!     .unwrap();
//! assert_eq!(output, "if (!(done))");
//! ```
//!
//! The crate is organized bottom-up:
//!
//! - [token]: tokens, the default lexer and the [TokenStream](token::stream::TokenStream).
//! - [parse]: parser combinators and the nested parsers callable from patterns.
//! - [pattern] and [grammar]: compilers from pattern syntax to parsers.
//! - [expansion] and [expander]: the expansion compiler and the expanders it can call.
//! - [hygiene]: blue paint and variable renaming.
//! - [directive] and [engine]: the directive registry and the expansion driver.

extern crate weave_stdext;

pub mod ast;
pub mod directive;
pub mod engine;
pub mod error;
pub mod expander;
pub mod expansion;
pub mod expected;
pub mod grammar;
pub mod hygiene;
pub mod parse;
pub mod pattern;
pub mod token;

pub use engine::Engine;
pub use engine::Options;
