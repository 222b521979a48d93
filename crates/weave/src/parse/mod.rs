//! Parser combinators.
//!
//! A [Parser] matches a region of a [TokenStream] starting at the cursor and returns
//!     a capture tree ([Ast]) describing what it matched.
//! Parsers are built from a small closed set of primitives and combinators
//!     (see the constructor functions in this module) and are cheap to clone.
//!
//! ## Contract
//!
//! - On success the cursor is past the matched tokens, on the next significant token.
//!
//! - On a soft failure ([Failure::Error]) the cursor is exactly where it was before the call.
//!     The failure carries the [Expected] set of tokens that would have allowed progress.
//!
//! - A hard failure ([Failure::Halt]) is only produced by [commit] and aborts the whole parse.
//!     Enclosing combinators do not try alternatives after a halt.
//!
//! Leading whitespace and comments are skipped by every primitive.
//!
//! ## Fallibility
//!
//! A parser is fallible if it can fail on some input.
//! [optional] never fails, and neither does the undelimited [layer].
//! Two classes of broken parsers are rejected at construction time using fallibility:
//!     an [either] whose non-final branch can never fail (the later branches are dead),
//!     and a [repeat] of a parser that can never fail (the repetition would not terminate).

pub mod registry;

use crate::ast::{Ast, DuplicateLabel};
use crate::error;
use crate::expected::Expected;
use crate::token::stream::TokenStream;
use crate::token::{self, lexer, Token};
use regex::Regex;
use std::cell::{Cell, OnceCell};
use std::rc::{Rc, Weak};

/// Result of running a parser.
pub type Result<T> = std::result::Result<T, Failure>;

/// Failure of a parser.
#[derive(Debug)]
pub enum Failure {
    /// Soft failure. The cursor has been restored and alternatives may be tried.
    Error(Mismatch),
    /// Hard failure. Parsing must stop.
    Halt(Box<error::Error>),
}

impl Failure {
    fn mismatch(expected: Expected, got: Option<Token>) -> Failure {
        Failure::Error(Mismatch { expected, got })
    }
}

impl From<Failure> for Box<error::Error> {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Error(mismatch) => mismatch.into(),
            Failure::Halt(error) => error,
        }
    }
}

/// Soft failure details: what could have been matched and what was found.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub expected: Expected,
    pub got: Option<Token>,
}

impl error::WeaveError for Mismatch {
    fn kind(&self) -> error::Kind {
        match &self.got {
            None => error::Kind::EndOfInput,
            Some(token) => error::Kind::Token(token.clone()),
        }
    }

    fn title(&self) -> String {
        match &self.got {
            None => format!["expected {}, instead the input ended", self.expected],
            Some(token) => format![
                "expected {}, instead found {}",
                self.expected,
                token.describe()
            ],
        }
    }
}

/// Error returned when a parser is constructed incorrectly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError(pub String);

impl BuildError {
    pub fn new<T: Into<String>>(message: T) -> BuildError {
        BuildError(message.into())
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parser.
#[derive(Clone)]
pub struct Parser {
    label: Option<Rc<str>>,
    kind: Rc<Combinator>,
}

enum Combinator {
    Token(Token),
    Predicate {
        regex: Regex,
        kind: Option<token::Kind>,
    },
    Buffer(Vec<Token>),
    Chain(Vec<Parser>),
    Either(Vec<Parser>),
    Optional {
        parser: Parser,
        default: Ast,
    },
    Repeat(Parser),
    List {
        item: Parser,
        delimiter: Parser,
        trailing: bool,
    },
    Lookahead(Parser),
    Not(Parser),
    Layer {
        within: Option<(Token, char)>,
        inclusive: bool,
    },
    Commit(Parser),
    Consume {
        parser: Parser,
        trim: bool,
    },
    Pointer(Pointer),
}

impl Combinator {
    fn name(&self) -> &'static str {
        match self {
            Combinator::Token(_) => "token",
            Combinator::Predicate { .. } => "predicate",
            Combinator::Buffer(_) => "buffer",
            Combinator::Chain(_) => "chain",
            Combinator::Either(_) => "either",
            Combinator::Optional { .. } => "optional",
            Combinator::Repeat(_) => "repeat",
            Combinator::List { .. } => "list",
            Combinator::Lookahead(_) => "lookahead",
            Combinator::Not(_) => "not",
            Combinator::Layer { .. } => "layer",
            Combinator::Commit(_) => "commit",
            Combinator::Consume { .. } => "consume",
            Combinator::Pointer(_) => "pointer",
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("label", &self.label)
            .field("kind", &self.kind.name())
            .finish()
    }
}

impl Parser {
    fn new(kind: Combinator) -> Parser {
        Parser {
            label: None,
            kind: Rc::new(kind),
        }
    }

    /// Returns this parser with a label.
    ///
    /// The capture tree returned by the parser carries the label.
    /// Labeling an already labeled parser preserves both labels:
    ///     the inner result is nested under the outer label.
    pub fn labeled<L: Into<Rc<str>>>(self, label: L) -> Parser {
        let label = Some(label.into());
        if self.label.is_none() {
            return Parser { label, ..self };
        }
        Parser {
            label,
            kind: Rc::new(Combinator::Chain(vec![self])),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Runs the parser at the cursor.
    pub fn parse(&self, ts: &mut TokenStream) -> Result<Ast> {
        let ast = match self.kind.as_ref() {
            Combinator::Token(token) => parse_token(ts, token),
            Combinator::Predicate { regex, kind } => parse_predicate(ts, regex, *kind),
            Combinator::Buffer(tokens) => parse_buffer(ts, tokens),
            Combinator::Chain(parsers) => parse_chain(ts, parsers),
            Combinator::Either(parsers) => parse_either(ts, parsers),
            Combinator::Optional { parser, default } => match parser.parse(ts) {
                Err(Failure::Error(_)) => Ok(default.clone()),
                result => result,
            },
            Combinator::Repeat(parser) => parse_repeat(ts, parser),
            Combinator::List {
                item,
                delimiter,
                trailing,
            } => parse_list(ts, item, delimiter, *trailing),
            Combinator::Lookahead(parser) => {
                let start = ts.index();
                let result = parser.parse(ts);
                ts.jump(start);
                result.map(|_| Ast::null())
            }
            Combinator::Not(parser) => {
                let start = ts.index();
                match parser.parse(ts) {
                    Ok(_) => {
                        ts.jump(start);
                        ts.skip();
                        let got = ts.current().cloned();
                        ts.jump(start);
                        Err(Failure::mismatch(Expected::new(), got))
                    }
                    Err(Failure::Error(_)) => Ok(Ast::null()),
                    Err(halt) => Err(halt),
                }
            }
            Combinator::Layer { within, inclusive } => parse_layer(ts, within.as_ref(), *inclusive),
            Combinator::Commit(parser) => match parser.parse(ts) {
                Err(Failure::Error(mismatch)) => Err(Failure::Halt(mismatch.into())),
                result => result,
            },
            Combinator::Consume { parser, trim } => parse_consume(ts, parser, *trim),
            Combinator::Pointer(pointer) => match pointer.target() {
                Some(target) => target.parse(ts),
                None => Err(Failure::Halt(
                    error::SimpleFailedPreconditionError::new(format![
                        "the rule `{}` is used before it is defined",
                        pointer.name()
                    ])
                    .into(),
                )),
            },
        }?;
        Ok(match &self.label {
            None => ast,
            Some(label) => ast.labeled(label.clone()),
        })
    }

    /// Returns the tokens the parser can start with.
    pub fn expected(&self) -> Expected {
        match self.kind.as_ref() {
            Combinator::Token(token) => Expected::of(token.clone()),
            Combinator::Predicate { kind, .. } => match kind {
                None => Expected::new(),
                Some(kind) => Expected::of(Token::of_kind(*kind)),
            },
            Combinator::Buffer(tokens) => match tokens.first() {
                None => Expected::new(),
                Some(first) => Expected::of(first.clone()),
            },
            Combinator::Chain(parsers) => {
                let mut expected = Expected::new();
                for parser in parsers {
                    expected.merge(&parser.expected());
                    if parser.is_fallible() {
                        break;
                    }
                }
                expected
            }
            Combinator::Either(parsers) => {
                let mut expected = Expected::new();
                for parser in parsers {
                    expected.merge(&parser.expected());
                }
                expected
            }
            Combinator::Optional { parser, .. }
            | Combinator::Repeat(parser)
            | Combinator::List { item: parser, .. }
            | Combinator::Lookahead(parser)
            | Combinator::Commit(parser)
            | Combinator::Consume { parser, .. } => parser.expected(),
            Combinator::Not(_) => Expected::new(),
            Combinator::Layer { within, .. } => match within {
                None => Expected::new(),
                Some((open, _)) => Expected::of(open.clone()),
            },
            Combinator::Pointer(pointer) => pointer.expected(),
        }
    }

    /// Returns whether the parser can fail.
    pub fn is_fallible(&self) -> bool {
        match self.kind.as_ref() {
            Combinator::Token(_)
            | Combinator::Predicate { .. }
            | Combinator::Buffer(_)
            | Combinator::Repeat(_)
            | Combinator::Not(_) => true,
            Combinator::Chain(parsers) => parsers.iter().any(Parser::is_fallible),
            Combinator::Either(parsers) => parsers.iter().all(Parser::is_fallible),
            Combinator::Optional { .. } => false,
            Combinator::List { item: parser, .. }
            | Combinator::Lookahead(parser)
            | Combinator::Commit(parser)
            | Combinator::Consume { parser, .. } => parser.is_fallible(),
            Combinator::Layer { within, .. } => within.is_some(),
            Combinator::Pointer(pointer) => pointer.is_fallible(),
        }
    }

    /// Repeats the construction checks of [either] and [repeat].
    ///
    /// A pointer counts as fallible until it is defined,
    ///     so parsers built from pointers are checked again once every pointer is defined.
    /// Pointer targets are not followed.
    pub fn validate(&self) -> std::result::Result<(), BuildError> {
        match self.kind.as_ref() {
            Combinator::Chain(parsers) => parsers.iter().try_for_each(Parser::validate),
            Combinator::Either(parsers) => {
                check_branches(parsers)?;
                parsers.iter().try_for_each(Parser::validate)
            }
            Combinator::Repeat(parser) => {
                check_repeated(parser)?;
                parser.validate()
            }
            Combinator::List {
                item, delimiter, ..
            } => {
                item.validate()?;
                delimiter.validate()
            }
            Combinator::Optional { parser, .. }
            | Combinator::Lookahead(parser)
            | Combinator::Not(parser)
            | Combinator::Commit(parser)
            | Combinator::Consume { parser, .. } => parser.validate(),
            Combinator::Token(_)
            | Combinator::Predicate { .. }
            | Combinator::Buffer(_)
            | Combinator::Layer { .. }
            | Combinator::Pointer(_) => Ok(()),
        }
    }
}

/// Matches a single token equal to the given one.
///
/// A template token (one with no value) matches any token of its kind.
pub fn token(token: Token) -> Parser {
    Parser::new(Combinator::Token(token.bare()))
}

/// Matches any single token of the kind.
pub fn kind(kind: token::Kind) -> Parser {
    token(Token::of_kind(kind))
}

/// Matches the tokens obtained by lexing the source, ignoring whitespace between them.
pub fn literal(source: &str) -> std::result::Result<Parser, BuildError> {
    let tokens: Vec<Token> = lexer::tokenize(source)
        .map_err(|err| BuildError::new(err.title()))?
        .into_iter()
        .filter(|t| !t.skippable())
        .collect();
    match tokens.len() {
        0 => Err(BuildError::new(format![
            "the literal '{source}' does not contain any tokens"
        ])),
        1 => Ok(token(tokens[0].clone())),
        _ => buffer(tokens),
    }
}

/// Matches a single token whose value matches the regular expression.
///
/// The whole value must match. If a kind is given the token must also have that kind.
pub fn predicate(pattern: &str, kind: Option<token::Kind>) -> std::result::Result<Parser, BuildError> {
    let regex = Regex::new(&format!["^(?:{pattern})$"])
        .map_err(|err| BuildError::new(format!["invalid regular expression: {err}"]))?;
    Ok(Parser::new(Combinator::Predicate { regex, kind }))
}

/// Matches a sequence of tokens, ignoring whitespace between them.
pub fn buffer(tokens: Vec<Token>) -> std::result::Result<Parser, BuildError> {
    let tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !t.skippable())
        .map(|t| t.bare())
        .collect();
    if tokens.is_empty() {
        return Err(BuildError::new("a buffer must contain at least one token"));
    }
    Ok(Parser::new(Combinator::Buffer(tokens)))
}

/// Matches each of the parsers in order.
///
/// The capture tree is a map holding the results of the elements.
pub fn chain(parsers: Vec<Parser>) -> std::result::Result<Parser, BuildError> {
    if parsers.is_empty() {
        return Err(BuildError::new("a chain must contain at least one parser"));
    }
    Ok(Parser::new(Combinator::Chain(parsers)))
}

/// Returns the result of the first parser that matches.
pub fn either(parsers: Vec<Parser>) -> std::result::Result<Parser, BuildError> {
    if parsers.is_empty() {
        return Err(BuildError::new("either must contain at least one parser"));
    }
    check_branches(&parsers)?;
    Ok(Parser::new(Combinator::Either(parsers)))
}

fn check_branches(parsers: &[Parser]) -> std::result::Result<(), BuildError> {
    let last = parsers.len().saturating_sub(1);
    match parsers[..last].iter().position(|p| !p.is_fallible()) {
        None => Ok(()),
        Some(i) => Err(BuildError::new(format![
            "branch {} of either can never fail, so the branches after it are unreachable",
            i + 1
        ])),
    }
}

/// Matches the parser, or nothing.
pub fn optional(parser: Parser) -> Parser {
    optional_or(parser, Ast::null())
}

/// Matches the parser, or nothing in which case the default capture tree is returned.
pub fn optional_or(parser: Parser, default: Ast) -> Parser {
    Parser::new(Combinator::Optional { parser, default })
}

/// Matches the parser one or more times.
pub fn repeat(parser: Parser) -> std::result::Result<Parser, BuildError> {
    check_repeated(&parser)?;
    Ok(Parser::new(Combinator::Repeat(parser)))
}

fn check_repeated(parser: &Parser) -> std::result::Result<(), BuildError> {
    if parser.is_fallible() {
        return Ok(());
    }
    Err(BuildError::new(
        "repeat requires a parser that can fail, otherwise it would never stop",
    ))
}

/// Matches one or more items separated by the delimiter.
pub fn list(item: Parser, delimiter: Parser) -> Parser {
    Parser::new(Combinator::List {
        item,
        delimiter,
        trailing: false,
    })
}

/// Like [list], but also matches a trailing delimiter.
pub fn list_trailing(item: Parser, delimiter: Parser) -> Parser {
    Parser::new(Combinator::List {
        item,
        delimiter,
        trailing: true,
    })
}

/// Matches if the parser matches, without consuming anything.
pub fn lookahead(parser: Parser) -> Parser {
    Parser::new(Combinator::Lookahead(parser))
}

/// Matches, without consuming anything, if the parser does not match.
pub fn not(parser: Parser) -> Parser {
    Parser::new(Combinator::Not(parser))
}

/// Matches a balanced run of tokens.
///
/// The layer ends at the first closing delimiter that does not have a matching opener,
///     or at the end of the input.
pub fn layer() -> Parser {
    Parser::new(Combinator::Layer {
        within: None,
        inclusive: false,
    })
}

/// Matches a delimited balanced layer and captures the content between the delimiters.
///
/// The delimiters must be one of the pairs `{}`, `[]`, `()` or `${` and `}`.
pub fn layer_within(open: Token, close: Token) -> std::result::Result<Parser, BuildError> {
    match token::closer_for(&open) {
        Some(c) if close.is_char(c) => Ok(Parser::new(Combinator::Layer {
            within: Some((open.bare(), c)),
            inclusive: false,
        })),
        _ => Err(BuildError::new(format![
            "'{}' and '{}' are not a pair of balanced delimiters",
            open.text(),
            close.text()
        ])),
    }
}

fn delimited(open: char, close: char) -> Parser {
    Parser::new(Combinator::Layer {
        within: Some((Token::char(open), close)),
        inclusive: true,
    })
}

/// Matches a braced layer including the braces.
pub fn braces() -> Parser {
    delimited('{', '}')
}

/// Matches a bracketed layer including the brackets.
pub fn brackets() -> Parser {
    delimited('[', ']')
}

/// Matches a parenthesized layer including the parentheses.
pub fn parentheses() -> Parser {
    delimited('(', ')')
}

/// Turns soft failures of the parser into hard failures.
pub fn commit(parser: Parser) -> Parser {
    Parser::new(Combinator::Commit(parser))
}

/// Matches the parser and removes the matched tokens from the stream.
///
/// Skippable tokens after the match stay in the stream,
///     except for whitespace when `trim` is set.
pub fn consume(parser: Parser, trim: bool) -> Parser {
    Parser::new(Combinator::Consume { parser, trim })
}

/// A parser that is declared before it is defined.
///
/// Pointers make recursive grammars possible.
/// The pointer holds its target weakly, so the owner of the grammar must keep the
///     target parsers alive for as long as the pointer is used.
#[derive(Clone)]
pub struct Pointer(Rc<PointerCell>);

struct PointerCell {
    name: Rc<str>,
    target: OnceCell<WeakParser>,
    visiting: Cell<bool>,
    checking: Cell<bool>,
}

struct WeakParser {
    label: Option<Rc<str>>,
    kind: Weak<Combinator>,
}

impl Pointer {
    pub fn new<N: Into<Rc<str>>>(name: N) -> Pointer {
        Pointer(Rc::new(PointerCell {
            name: name.into(),
            target: OnceCell::new(),
            visiting: Cell::new(false),
            checking: Cell::new(false),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns a parser that runs the target of this pointer.
    pub fn parser(&self) -> Parser {
        Parser::new(Combinator::Pointer(self.clone()))
    }

    /// Sets the target of the pointer. A pointer can only be defined once.
    pub fn define(&self, target: &Parser) -> std::result::Result<(), BuildError> {
        let weak = WeakParser {
            label: target.label.clone(),
            kind: Rc::downgrade(&target.kind),
        };
        self.0
            .target
            .set(weak)
            .map_err(|_| BuildError::new(format!["the rule `{}` is already defined", self.name()]))
    }

    pub fn is_defined(&self) -> bool {
        self.0.target.get().is_some()
    }

    fn target(&self) -> Option<Parser> {
        let weak = self.0.target.get()?;
        Some(Parser {
            label: weak.label.clone(),
            kind: weak.kind.upgrade()?,
        })
    }

    fn expected(&self) -> Expected {
        if self.0.visiting.get() {
            return Expected::new();
        }
        self.0.visiting.set(true);
        let expected = self
            .target()
            .map(|target| target.expected())
            .unwrap_or_default();
        self.0.visiting.set(false);
        expected
    }

    // An undefined pointer, or one reached again while its own target is being checked,
    //     counts as fallible.
    fn is_fallible(&self) -> bool {
        if self.0.checking.get() {
            return true;
        }
        self.0.checking.set(true);
        let fallible = self
            .target()
            .map_or(true, |target| target.is_fallible());
        self.0.checking.set(false);
        fallible
    }
}

fn peek(ts: &mut TokenStream) -> Option<Token> {
    ts.skip().cloned()
}

fn parse_token(ts: &mut TokenStream, want: &Token) -> Result<Ast> {
    let start = ts.index();
    match peek(ts) {
        Some(got) if got == *want => {
            ts.next();
            Ok(Ast::token(got))
        }
        got => {
            ts.jump(start);
            Err(Failure::mismatch(Expected::of(want.clone()), got))
        }
    }
}

fn parse_predicate(ts: &mut TokenStream, regex: &Regex, kind: Option<token::Kind>) -> Result<Ast> {
    let start = ts.index();
    match peek(ts) {
        Some(got)
            if kind.map_or(true, |kind| got.kind() == kind) && regex.is_match(got.text()) =>
        {
            ts.next();
            Ok(Ast::token(got))
        }
        got => {
            ts.jump(start);
            let expected = match kind {
                None => Expected::new(),
                Some(kind) => Expected::of(Token::of_kind(kind)),
            };
            Err(Failure::mismatch(expected, got))
        }
    }
}

fn parse_buffer(ts: &mut TokenStream, tokens: &[Token]) -> Result<Ast> {
    let start = ts.index();
    let mut items = Vec::with_capacity(tokens.len());
    for want in tokens {
        match peek(ts) {
            Some(got) if got == *want => {
                ts.next();
                items.push(Ast::token(got));
            }
            got => {
                ts.jump(start);
                return Err(Failure::mismatch(Expected::of(want.clone()), got));
            }
        }
    }
    Ok(Ast::list(items))
}

fn parse_chain(ts: &mut TokenStream, parsers: &[Parser]) -> Result<Ast> {
    let start = ts.index();
    let mut ast = Ast::map();
    for (i, parser) in parsers.iter().enumerate() {
        match parser.parse(ts) {
            Ok(child) => {
                if let Err(DuplicateLabel(label)) = ast.push(child) {
                    ts.jump(start);
                    return Err(Failure::Halt(
                        error::SimpleFailedPreconditionError::new(format![
                            "the capture `{label}` appears more than once"
                        ])
                        .into(),
                    ));
                }
            }
            Err(Failure::Error(mut mismatch)) => {
                for previous in parsers[..i].iter().rev() {
                    if previous.is_fallible() {
                        break;
                    }
                    mismatch.expected.merge(&previous.expected());
                }
                ts.jump(start);
                return Err(Failure::Error(mismatch));
            }
            Err(halt) => {
                ts.jump(start);
                return Err(halt);
            }
        }
    }
    Ok(ast)
}

fn parse_either(ts: &mut TokenStream, parsers: &[Parser]) -> Result<Ast> {
    let start = ts.index();
    let got = peek(ts);
    ts.jump(start);
    let mut expected = Expected::new();
    for parser in parsers {
        match parser.parse(ts) {
            Ok(ast) => return Ok(ast),
            Err(Failure::Error(mismatch)) => expected.merge(&mismatch.expected),
            Err(halt) => return Err(halt),
        }
    }
    Err(Failure::mismatch(expected, got))
}

fn parse_repeat(ts: &mut TokenStream, parser: &Parser) -> Result<Ast> {
    let start = ts.index();
    let mut items = vec![];
    loop {
        ts.skip();
        let before = ts.index();
        match parser.parse(ts) {
            Ok(ast) => {
                items.push(ast);
                ts.skip();
                if ts.index() == before {
                    break;
                }
            }
            Err(Failure::Error(mismatch)) => {
                if items.is_empty() {
                    ts.jump(start);
                    return Err(Failure::Error(mismatch));
                }
                break;
            }
            Err(halt) => {
                ts.jump(start);
                return Err(halt);
            }
        }
    }
    Ok(Ast::list(items))
}

fn parse_list(ts: &mut TokenStream, item: &Parser, delimiter: &Parser, trailing: bool) -> Result<Ast> {
    let start = ts.index();
    let mut items = vec![item.parse(ts)?];
    loop {
        let before = ts.index();
        match delimiter.parse(ts) {
            Ok(_) => {}
            Err(Failure::Error(_)) => break,
            Err(halt) => {
                ts.jump(start);
                return Err(halt);
            }
        }
        match item.parse(ts) {
            Ok(ast) => items.push(ast),
            Err(Failure::Error(_)) => {
                if !trailing {
                    ts.jump(before);
                }
                break;
            }
            Err(halt) => {
                ts.jump(start);
                return Err(halt);
            }
        }
    }
    Ok(Ast::list(items))
}

fn parse_layer(ts: &mut TokenStream, within: Option<&(Token, char)>, inclusive: bool) -> Result<Ast> {
    let start = ts.index();
    let mut tokens: Vec<Token> = vec![];
    let mut stack: Vec<char> = vec![];
    if let Some((open, close)) = within {
        match peek(ts) {
            Some(got) if got == *open => {
                if inclusive {
                    tokens.push(got);
                }
                stack.push(*close);
                ts.step();
            }
            got => {
                ts.jump(start);
                return Err(Failure::mismatch(Expected::of(open.clone()), got));
            }
        }
    } else {
        ts.skip();
    }
    loop {
        let Some(current) = ts.current().cloned() else {
            match stack.last().copied() {
                None => break,
                Some(want) => {
                    ts.jump(start);
                    return Err(Failure::mismatch(Expected::of(Token::char(want)), None));
                }
            }
        };
        if let Some(closer) = token::closer_for(&current) {
            stack.push(closer);
        } else if token::is_closer(&current) {
            match stack.last().copied() {
                None => break,
                Some(want) if current.is_char(want) => {
                    stack.pop();
                    if stack.is_empty() && within.is_some() {
                        if inclusive {
                            tokens.push(current);
                        }
                        ts.next();
                        break;
                    }
                }
                Some(want) => {
                    ts.jump(start);
                    return Err(Failure::mismatch(
                        Expected::of(Token::char(want)),
                        Some(current),
                    ));
                }
            }
        }
        tokens.push(current);
        ts.step();
    }
    if !inclusive {
        trim_skippable(&mut tokens);
    }
    Ok(Ast::list(tokens.into_iter().map(Ast::token).collect()))
}

fn trim_skippable(tokens: &mut Vec<Token>) {
    while tokens.last().is_some_and(Token::skippable) {
        tokens.pop();
    }
    let leading = tokens.iter().take_while(|t| t.skippable()).count();
    tokens.drain(..leading);
}

fn parse_consume(ts: &mut TokenStream, parser: &Parser, trim: bool) -> Result<Ast> {
    let original = ts.index();
    ts.skip();
    let start = ts.index();
    let ast = match parser.parse(ts) {
        Ok(ast) => ast,
        Err(failure) => {
            ts.jump(original);
            return Err(failure);
        }
    };
    ts.unskip();
    if trim {
        while ts
            .current()
            .is_some_and(|t| t.kind() == token::Kind::Whitespace)
        {
            ts.step();
        }
    }
    let end = ts.index();
    ts.extract(start, end);
    ts.step();
    ts.skip();
    Ok(ast)
}
