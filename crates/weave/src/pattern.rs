//! Pattern compiler.
//!
//! A macro pattern is the token sequence between the first pair of braces of a
//!     macro declaration.
//! The compiler turns it into a [Parser] with one unit per construct:
//!
//! | syntax                            | unit                                            |
//! |-----------------------------------|-------------------------------------------------|
//! | `ident·name`                      | any token of the kind, captured as `name`       |
//! | `ident·_`                         | any token of the kind, not captured             |
//! | `{···name}` `[···name]` `(···name)` | the content of a balanced layer                |
//! | `···name`                         | an undelimited balanced layer                   |
//! | `·either(a, b)·name`              | a call to a nested parser, optionally captured  |
//! | `·`                               | the dominance marker                            |
//! | anything else                     | that exact token                                |
//!
//! Whitespace and comments in the pattern are not significant,
//!     except inside the constructs above whose parts must be adjacent.
//!
//! Units after the dominance marker are wrapped in a [commit](parse::commit):
//!     once the pattern has matched up to the marker, a failure to match the rest is a hard error.

use crate::error::{self, SimpleFailedPreconditionError, SimpleTokenError, UndefinedNameError};
use crate::expected::Expected;
use crate::grammar;
use crate::parse::{self, registry, BuildError, Parser};
use crate::token::{self, Kind, Token};
use std::collections::{BTreeSet, HashMap};

/// A compiled macro pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    parser: Parser,
    specificity: usize,
    labels: BTreeSet<String>,
    // Keeps grammar rules alive: rule references only hold their targets weakly.
    rules: Vec<Parser>,
}

impl Pattern {
    /// Compiles the pattern tokens.
    pub fn compile(
        tokens: &[Token],
        parsers: &HashMap<&'static str, registry::BuiltIn>,
        grammar: bool,
    ) -> error::Result<Pattern> {
        if grammar {
            return grammar::compile(tokens, parsers);
        }
        let mut compiler = Compiler::new(parsers);
        let (parser, specificity) = compiler.sequence(tokens)?;
        Pattern::new(parser, specificity, compiler.into_labels(), vec![], tokens)
    }

    pub(crate) fn new(
        parser: Parser,
        specificity: usize,
        labels: BTreeSet<String>,
        rules: Vec<Parser>,
        tokens: &[Token],
    ) -> error::Result<Pattern> {
        if parser.expected().is_empty() {
            let title = "this pattern does not start with a literal token or a token kind";
            return Err(match tokens.iter().find(|t| !t.skippable()) {
                None => SimpleFailedPreconditionError::new(title).into(),
                Some(first) => SimpleTokenError::new(first.clone(), title)
                    .with_note("macros are looked up by the first token they can match")
                    .into(),
            });
        }
        Ok(Pattern {
            parser,
            specificity,
            labels,
            rules,
        })
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// The number of units in the pattern. More specific patterns are tried first.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    /// The names of every capture in the pattern.
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// The tokens the pattern can start with.
    pub fn expected(&self) -> Expected {
        self.parser.expected()
    }

    pub fn rules(&self) -> &[Parser] {
        &self.rules
    }
}

pub(crate) enum Unit {
    Parser(Parser),
    Marker(Token),
}

/// Compiles pattern constructs.
///
/// The grammar compiler reuses this for the constructs the two syntaxes share.
pub(crate) struct Compiler<'a> {
    parsers: &'a HashMap<&'static str, registry::BuiltIn>,
    scope: BTreeSet<String>,
    labels: BTreeSet<String>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(parsers: &'a HashMap<&'static str, registry::BuiltIn>) -> Compiler<'a> {
        Compiler {
            parsers,
            scope: Default::default(),
            labels: Default::default(),
        }
    }

    /// Starts a new capture scope. Capture names only need to be unique within a scope.
    pub(crate) fn new_scope(&mut self) {
        self.scope.clear();
    }

    pub(crate) fn into_labels(self) -> BTreeSet<String> {
        self.labels
    }

    /// Labels the parser with the name in the token, unless the name is `_`.
    pub(crate) fn capture(&mut self, parser: Parser, name: &Token) -> error::Result<Parser> {
        let label = name.text();
        if label == "_" {
            return Ok(parser);
        }
        if !self.scope.insert(label.to_string()) {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["the capture `{label}` appears more than once"],
            )
            .into());
        }
        self.labels.insert(label.to_string());
        Ok(parser.labeled(label))
    }

    /// Compiles `kind·name`.
    pub(crate) fn kind_capture(&mut self, kind: &Token, name: &Token) -> error::Result<Parser> {
        let Some(k) = Kind::from_name(kind.text()) else {
            return Err(UndefinedNameError::new(kind.clone(), "token kind", Kind::names()).into());
        };
        self.capture(parse::kind(k), name)
    }

    /// Compiles `·name(args)` with an optional `·label`, starting at the `·`.
    ///
    /// Returns the parser and the index after the construct.
    pub(crate) fn call(&mut self, tokens: &[Token], i: usize) -> error::Result<(Parser, usize)> {
        let name = &tokens[i + 1];
        if !tokens.get(i + 2).is_some_and(|t| t.is_char('(')) {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["expected '(' after the nested parser `{}`", name.text()],
            )
            .into());
        }
        let Some(close) = token::matching_closer(tokens, i + 2) else {
            return Err(SimpleTokenError::new(
                tokens[i + 2].clone(),
                "the arguments of this nested parser are not balanced",
            )
            .into());
        };
        let Some(built_in) = self.parsers.get(name.text()) else {
            return Err(UndefinedNameError::new(
                name.clone(),
                "nested parser",
                self.parsers.keys().copied(),
            )
            .into());
        };
        let built_in = *built_in;
        let args = self.args(&tokens[i + 3..close])?;
        let parser = built_in
            .construct(&args)
            .map_err(|err| build_error(name, err))?;
        let mut next = close + 1;
        let labeled = tokens.get(next).is_some_and(is_dot)
            && tokens.get(next + 1).is_some_and(is_identifier)
            && !tokens.get(next + 2).is_some_and(|t| t.is_char('('));
        if !labeled {
            return Ok((parser, next));
        }
        let parser = self.capture(parser, &tokens[next + 1])?;
        next += 2;
        Ok((parser, next))
    }

    fn args(&mut self, tokens: &[Token]) -> error::Result<Vec<registry::Arg>> {
        if tokens.iter().all(Token::skippable) {
            return Ok(vec![]);
        }
        let mut args = vec![];
        for piece in split(tokens, |t| t.is_char(',')) {
            let significant: Vec<&Token> = piece.iter().filter(|t| !t.skippable()).collect();
            let single_kind = match significant.as_slice() {
                [t] if is_identifier(t) => Kind::from_name(t.text()),
                _ => None,
            };
            let arg = match (significant.as_slice(), single_kind) {
                ([], _) => {
                    return Err(SimpleFailedPreconditionError::new(
                        "a nested parser argument is empty",
                    )
                    .into())
                }
                (_, Some(kind)) => registry::Arg::Kind(kind),
                ([t], None) if t.kind() == Kind::String => {
                    registry::Arg::Str(token::unquote(t.text()))
                }
                _ => registry::Arg::Parser(self.sequence(piece)?.0),
            };
            args.push(arg);
        }
        Ok(args)
    }

    /// Compiles the construct that starts at the significant token `tokens[i]`.
    fn unit(&mut self, tokens: &[Token], i: usize) -> error::Result<(Unit, usize)> {
        let t = &tokens[i];
        let next = |k: usize| tokens.get(i + k);
        if is_identifier(t) && next(1).is_some_and(is_dot) && next(2).is_some_and(is_identifier) {
            let parser = self.kind_capture(t, &tokens[i + 2])?;
            return Ok((Unit::Parser(parser), i + 3));
        }
        if is_dot(t) {
            if next(1).is_some_and(is_identifier) {
                let (parser, next) = self.call(tokens, i)?;
                return Ok((Unit::Parser(parser), next));
            }
            return Ok((Unit::Marker(t.clone()), i + 1));
        }
        if t.is_operator("···") && next(1).is_some_and(is_identifier) {
            let parser = self.capture(parse::layer(), &tokens[i + 1])?;
            return Ok((Unit::Parser(parser), i + 2));
        }
        if let Some((name, close)) = layer_capture(tokens, i) {
            let parser = parse::layer_within(t.clone(), tokens[close].clone())
                .map_err(|err| build_error(t, err))?;
            let parser = self.capture(parser, &tokens[name])?;
            return Ok((Unit::Parser(parser), close + 1));
        }
        Ok((Unit::Parser(parse::token(t.clone())), i + 1))
    }

    /// Compiles a whole sequence of constructs.
    ///
    /// Returns the parser and the number of units.
    pub(crate) fn sequence(&mut self, tokens: &[Token]) -> error::Result<(Parser, usize)> {
        let mut units = vec![];
        let mut marker = None;
        let mut i = 0;
        while let Some(j) = significant(tokens, i) {
            let (unit, next) = self.unit(tokens, j)?;
            match unit {
                Unit::Parser(parser) => units.push(parser),
                Unit::Marker(token) => {
                    if marker.is_some() {
                        return Err(SimpleTokenError::new(
                            token,
                            "a pattern can contain at most one dominance marker",
                        )
                        .into());
                    }
                    marker = Some((units.len(), token));
                }
            }
            i = next;
        }
        let n = units.len();
        Ok((assemble(units, marker)?, n))
    }
}

/// Combines units into one parser, committing the units after the dominance marker.
pub(crate) fn assemble(mut units: Vec<Parser>, marker: Option<(usize, Token)>) -> error::Result<Parser> {
    if let Some((at, token)) = marker {
        if at == 0 {
            return Err(SimpleTokenError::new(
                token,
                "the dominance marker cannot be the first element of a pattern",
            )
            .into());
        }
        if at == units.len() {
            return Err(SimpleTokenError::new(
                token,
                "the dominance marker cannot be the last element of a pattern",
            )
            .into());
        }
        let mut tail = units.split_off(at);
        let tail = if tail.len() == 1 {
            tail.remove(0)
        } else {
            parse::chain(tail).map_err(|err| build_error(&token, err))?
        };
        units.push(parse::commit(tail));
    }
    match units.len() {
        0 => Err(SimpleFailedPreconditionError::new("a pattern cannot be empty").into()),
        1 => Ok(units.remove(0)),
        _ => parse::chain(units)
            .map_err(|err| SimpleFailedPreconditionError::new(err.0).into()),
    }
}

pub(crate) fn build_error(token: &Token, err: BuildError) -> Box<error::Error> {
    SimpleTokenError::new(token.clone(), err.0).into()
}

pub(crate) fn is_dot(token: &Token) -> bool {
    token.is_char('·')
}

pub(crate) fn is_identifier(token: &Token) -> bool {
    token.kind() == Kind::Identifier
}

/// Returns the index of the first significant token at or after `from`.
pub(crate) fn significant(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&j| !tokens[j].skippable())
}

/// Splits the tokens at separators that are not nested in delimiters.
pub(crate) fn split<F: Fn(&Token) -> bool>(tokens: &[Token], is_separator: F) -> Vec<&[Token]> {
    let mut pieces = vec![];
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        if token::closer_for(t).is_some() {
            depth += 1;
        } else if token::is_closer(t) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && is_separator(t) {
            pieces.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    pieces.push(&tokens[start..]);
    pieces
}

/// Matches `{···name}` and friends at `tokens[i]`, returning the indices of the name and the closer.
fn layer_capture(tokens: &[Token], i: usize) -> Option<(usize, usize)> {
    let open = &tokens[i];
    if open.kind() == Kind::Operator {
        return None;
    }
    let closer = token::closer_for(open)?;
    let dots = significant(tokens, i + 1)?;
    if !tokens[dots].is_operator("···") || !tokens.get(dots + 1).is_some_and(is_identifier) {
        return None;
    }
    let close = significant(tokens, dots + 2)?;
    if !tokens[close].is_char(closer) {
        return None;
    }
    Some((dots + 1, close))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexer;
    use crate::token::stream::TokenStream;

    fn compile(source: &str) -> error::Result<Pattern> {
        let tokens = lexer::tokenize(source).unwrap();
        Pattern::compile(&tokens, &registry::built_in_parsers(), false)
    }

    fn parse(pattern: &Pattern, source: &str) -> parse::Result<crate::ast::Ast> {
        let mut ts = TokenStream::from_source(source).unwrap();
        pattern.parser().parse(&mut ts)
    }

    fn capture(pattern: &Pattern, source: &str, label: &str) -> String {
        let ast = parse(pattern, source).unwrap();
        ast.get(label)
            .unwrap()
            .tokens()
            .iter()
            .map(|t| t.text())
            .collect()
    }

    #[test]
    fn kind_captures() {
        let pattern = compile("swap(variable·a, variable·b)").unwrap();
        assert_eq!(pattern.specificity(), 6);
        assert_eq!(capture(&pattern, "swap($x, $y)", "a"), "$x");
        assert_eq!(capture(&pattern, "swap($x, $y)", "b"), "$y");
        let labels: Vec<&str> = pattern.labels().iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn discard_captures() {
        let pattern = compile("pair(ident·_, ident·_)").unwrap();
        assert!(pattern.labels().is_empty());
        assert!(parse(&pattern, "pair(a, b)").is_ok());
    }

    #[test]
    fn layer_captures() {
        let pattern = compile("unless (···cond) { ···body }").unwrap();
        assert_eq!(pattern.specificity(), 3);
        assert_eq!(capture(&pattern, "unless ($a > 1) { f(); }", "cond"), "$a > 1");
        assert_eq!(capture(&pattern, "unless ($a > 1) { f(); }", "body"), "f();");
    }

    #[test]
    fn bare_layer_capture() {
        let pattern = compile("debug ···rest").unwrap();
        assert_eq!(capture(&pattern, "debug a + (b) ) c", "rest"), "a + (b)");
    }

    #[test]
    fn single_unit_is_not_chained() {
        let pattern = compile("ident·x").unwrap();
        assert_eq!(pattern.specificity(), 1);
        let ast = parse(&pattern, "a").unwrap();
        assert_eq!(ast.label(), Some("x"));
    }

    #[test]
    fn nested_parser_call() {
        let pattern = compile("let ·either(integer, string)·value ;").unwrap();
        assert_eq!(capture(&pattern, "let 1 ;", "value"), "1");
        assert_eq!(capture(&pattern, "let 'a' ;", "value"), "'a'");
        assert!(parse(&pattern, "let a ;").is_err());
    }

    #[test]
    fn nested_parser_with_sub_patterns() {
        let pattern = compile("enum ·ls(ident·name, ',')·cases ;").unwrap();
        let ast = parse(&pattern, "enum a, b, c ;").unwrap();
        let names: Vec<&str> = ast
            .get("cases")
            .unwrap()
            .items()
            .map(|item| {
                assert_eq!(item.label(), Some("name"));
                item.as_token().unwrap().text()
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn dominance_marker_commits() {
        let pattern = compile("swap · ( ident·a )").unwrap();
        assert!(matches!(parse(&pattern, "swap ;"), Err(parse::Failure::Halt(_))));
        assert!(matches!(parse(&pattern, "other"), Err(parse::Failure::Error(_))));
    }

    macro_rules! compile_failure_tests {
        ( $( ($name: ident, $source: expr, $title: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    let err = compile($source).unwrap_err();
                    assert_eq!(err.title(), $title);
                }
            )+
        };
    }

    compile_failure_tests![
        (
            duplicate_capture,
            "f(ident·a, ident·a)",
            "the capture `a` appears more than once"
        ),
        (unknown_kind, "idnt·a", "undefined token kind `idnt`"),
        (unknown_parser, "a ·eiter(ident)·b", "undefined nested parser `eiter`"),
        (consume_is_not_nested, "a ·consume('b') c", "undefined nested parser `consume`"),
        (
            marker_first,
            "· swap",
            "the dominance marker cannot be the first element of a pattern"
        ),
        (
            marker_last,
            "swap ·",
            "the dominance marker cannot be the last element of a pattern"
        ),
        (
            two_markers,
            "a · b · c",
            "a pattern can contain at most one dominance marker"
        ),
        (
            no_entry_token,
            "···rest",
            "this pattern does not start with a literal token or a token kind"
        ),
        (
            dead_branch,
            "a ·either(·optional('b'), 'c')",
            "branch 1 of either can never fail, so the branches after it are unreachable"
        ),
    ];

    #[test]
    fn split_respects_nesting() {
        let tokens = lexer::tokenize("a, f(b, c), [d, e]").unwrap();
        let pieces = split(&tokens, |t| t.is_char(','));
        assert_eq!(pieces.len(), 3);
    }
}
