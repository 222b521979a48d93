//! Nested parsers that can be called from macro patterns.
//!
//! A pattern like `·either(ident, integer)·value` calls the nested parser `either`
//!     with two arguments and labels the result `value`.
//! Each nested parser is a [BuiltIn]: a constructor function that receives the
//!     compiled arguments and returns a parser, along with documentation.
//!
//! The map returned by [built_in_parsers] is installed in every engine.
//! None of the built-ins change the token stream, so a pattern that fails
//!     part way through leaves the input as it found it.
//! Additional nested parsers can be registered on the engine.

use super::{BuildError, Parser};
use crate::token;
use std::collections::HashMap;

/// An argument to a nested parser.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A compiled sub-pattern.
    Parser(Parser),
    /// A bare token kind name like `ident`.
    Kind(token::Kind),
    /// A string constant, already unquoted.
    Str(String),
}

impl Arg {
    /// Converts the argument to a parser.
    ///
    /// Kinds match any token of the kind and strings match the tokens obtained by lexing them.
    pub fn to_parser(&self) -> Result<Parser, BuildError> {
        match self {
            Arg::Parser(parser) => Ok(parser.clone()),
            Arg::Kind(kind) => Ok(super::kind(*kind)),
            Arg::Str(source) => super::literal(source),
        }
    }
}

pub type Constructor = fn(&[Arg]) -> Result<Parser, BuildError>;

/// A nested parser constructor along with its documentation.
#[derive(Clone, Copy)]
pub struct BuiltIn {
    constructor: Constructor,
    doc: &'static str,
}

impl BuiltIn {
    pub fn new(constructor: Constructor, doc: &'static str) -> BuiltIn {
        BuiltIn { constructor, doc }
    }

    pub fn construct(&self, args: &[Arg]) -> Result<Parser, BuildError> {
        (self.constructor)(args)
    }

    pub fn doc(&self) -> &'static str {
        self.doc
    }
}

impl std::fmt::Debug for BuiltIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltIn").field("doc", &self.doc).finish()
    }
}

fn exactly(args: &[Arg], n: usize, name: &str) -> Result<(), BuildError> {
    if args.len() != n {
        return Err(BuildError::new(format![
            "{name} takes {n} argument{}, {} given",
            if n == 1 { "" } else { "s" },
            args.len()
        ]));
    }
    Ok(())
}

fn at_least_one(args: &[Arg], name: &str) -> Result<(), BuildError> {
    if args.is_empty() {
        return Err(BuildError::new(format![
            "{name} takes at least one argument"
        ]));
    }
    Ok(())
}

fn parsers(args: &[Arg]) -> Result<Vec<Parser>, BuildError> {
    args.iter().map(Arg::to_parser).collect()
}

fn token_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "token")?;
    match &args[0] {
        Arg::Parser(_) => Err(BuildError::new(
            "token takes a token kind or a string constant",
        )),
        arg => arg.to_parser(),
    }
}

fn rtoken_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    match args {
        [Arg::Str(pattern)] => super::predicate(pattern, None),
        [Arg::Kind(kind), Arg::Str(pattern)] => super::predicate(pattern, Some(*kind)),
        _ => Err(BuildError::new(
            "rtoken takes a regular expression, optionally preceded by a token kind",
        )),
    }
}

fn buffer_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "buffer")?;
    match &args[0] {
        Arg::Str(source) => super::literal(source),
        _ => Err(BuildError::new("buffer takes a string constant")),
    }
}

fn optional_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "optional")?;
    Ok(super::optional(args[0].to_parser()?))
}

fn either_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    at_least_one(args, "either")?;
    super::either(parsers(args)?)
}

fn chain_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    at_least_one(args, "chain")?;
    super::chain(parsers(args)?)
}

fn repeat_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "repeat")?;
    super::repeat(args[0].to_parser()?)
}

fn ls_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 2, "ls")?;
    Ok(super::list(args[0].to_parser()?, args[1].to_parser()?))
}

fn lst_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 2, "lst")?;
    Ok(super::list_trailing(
        args[0].to_parser()?,
        args[1].to_parser()?,
    ))
}

fn layer_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 0, "layer")?;
    Ok(super::layer())
}

fn braces_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 0, "braces")?;
    Ok(super::braces())
}

fn brackets_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 0, "brackets")?;
    Ok(super::brackets())
}

fn parentheses_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 0, "parentheses")?;
    Ok(super::parentheses())
}

fn commit_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "commit")?;
    Ok(super::commit(args[0].to_parser()?))
}

fn not_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "not")?;
    Ok(super::not(args[0].to_parser()?))
}

fn lookahead_fn(args: &[Arg]) -> Result<Parser, BuildError> {
    exactly(args, 1, "lookahead")?;
    Ok(super::lookahead(args[0].to_parser()?))
}

/// Returns the nested parsers that are available in every engine.
pub fn built_in_parsers() -> HashMap<&'static str, BuiltIn> {
    HashMap::from([
        (
            "token",
            BuiltIn::new(token_fn, "Matches one token: `token(ident)` or `token('=>')`"),
        ),
        (
            "rtoken",
            BuiltIn::new(
                rtoken_fn,
                "Matches one token whose whole value matches a regular expression: `rtoken(ident, '[a-z]+')`",
            ),
        ),
        (
            "buffer",
            BuiltIn::new(buffer_fn, "Matches the tokens of a string constant: `buffer('===')`"),
        ),
        (
            "optional",
            BuiltIn::new(optional_fn, "Matches its argument or nothing"),
        ),
        (
            "either",
            BuiltIn::new(either_fn, "Matches the first of its arguments that matches"),
        ),
        (
            "chain",
            BuiltIn::new(chain_fn, "Matches all of its arguments in order"),
        ),
        (
            "repeat",
            BuiltIn::new(repeat_fn, "Matches its argument one or more times"),
        ),
        (
            "ls",
            BuiltIn::new(ls_fn, "Matches a delimited list: `ls(ident, token(','))`"),
        ),
        (
            "lst",
            BuiltIn::new(lst_fn, "Matches a delimited list with an optional trailing delimiter"),
        ),
        (
            "layer",
            BuiltIn::new(layer_fn, "Matches a balanced run of tokens up to an unmatched closer"),
        ),
        (
            "braces",
            BuiltIn::new(braces_fn, "Matches a braced layer, braces included"),
        ),
        (
            "brackets",
            BuiltIn::new(brackets_fn, "Matches a bracketed layer, brackets included"),
        ),
        (
            "parentheses",
            BuiltIn::new(parentheses_fn, "Matches a parenthesized layer, parentheses included"),
        ),
        (
            "commit",
            BuiltIn::new(commit_fn, "Matches its argument, and fails hard if it does not match"),
        ),
        (
            "not",
            BuiltIn::new(not_fn, "Matches nothing, if its argument does not match"),
        ),
        (
            "lookahead",
            BuiltIn::new(lookahead_fn, "Matches its argument without consuming it"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::stream::TokenStream;
    use crate::token::Kind;

    fn construct(name: &str, args: &[Arg]) -> Result<Parser, BuildError> {
        built_in_parsers()[name].construct(args)
    }

    fn matches(parser: &Parser, source: &str) -> bool {
        let mut ts = TokenStream::from_source(source).unwrap();
        parser.parse(&mut ts).is_ok()
    }

    #[test]
    fn token_from_kind_and_string() {
        let ident = construct("token", &[Arg::Kind(Kind::Identifier)]).unwrap();
        assert!(matches(&ident, "abc"));
        assert!(!matches(&ident, "1"));
        let arrow = construct("token", &[Arg::Str("=>".into())]).unwrap();
        assert!(matches(&arrow, "=>"));
    }

    #[test]
    fn rtoken_with_kind() {
        let parser = construct(
            "rtoken",
            &[Arg::Kind(Kind::Identifier), Arg::Str("get_[a-z]+".into())],
        )
        .unwrap();
        assert!(matches(&parser, "get_name"));
        assert!(!matches(&parser, "set_name"));
        assert!(!matches(&parser, "xget_name"));
    }

    #[test]
    fn ls_of_kinds() {
        let parser = construct(
            "ls",
            &[Arg::Kind(Kind::Integer), Arg::Str(",".into())],
        )
        .unwrap();
        let mut ts = TokenStream::from_source("1, 2, 3").unwrap();
        assert_eq!(parser.parse(&mut ts).unwrap().items().count(), 3);
    }

    #[test]
    fn arity_is_checked() {
        let err = construct("optional", &[]).unwrap_err();
        assert_eq!(err.0, "optional takes 1 argument, 0 given");
        assert!(construct("either", &[]).is_err());
        assert!(construct("layer", &[Arg::Kind(Kind::Identifier)]).is_err());
    }

    #[test]
    fn dead_branch_propagates() {
        let optional = construct("optional", &[Arg::Str("a".into())]).unwrap();
        assert!(construct("either", &[Arg::Parser(optional), Arg::Str("b".into())]).is_err());
    }

    #[test]
    fn every_built_in_is_documented() {
        for (name, built_in) in built_in_parsers() {
            assert!(!built_in.doc().is_empty(), "{name}");
        }
    }
}
