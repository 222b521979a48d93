//! Tokens, token kinds and the token stream.

pub mod lexer;
pub mod stream;

use crate::hygiene::BlueContext;
use std::fmt;
use std::rc::Rc;

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    Whitespace,
    Comment,
    Identifier,
    /// A variable like `$name`. Free variables in macro expansions are renamed by hygiene.
    Variable,
    Integer,
    Float,
    String,
    /// A multi-character operator like `>>` or `···`.
    Operator,
    /// The output of `··cloak`. The value is re-lexed once the expansion is complete.
    Cloaked,
    /// A single character token like `(` or `;`.
    Char(char),
}

const NAMED_KINDS: [(&str, Kind); 9] = [
    ("whitespace", Kind::Whitespace),
    ("comment", Kind::Comment),
    ("ident", Kind::Identifier),
    ("variable", Kind::Variable),
    ("integer", Kind::Integer),
    ("float", Kind::Float),
    ("string", Kind::String),
    ("operator", Kind::Operator),
    ("cloaked", Kind::Cloaked),
];

impl Kind {
    /// Returns the kind with the given name, as written in patterns (for example `ident·name`).
    pub fn from_name(name: &str) -> Option<Kind> {
        NAMED_KINDS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    /// Returns the name of the kind, or [None] for single character kinds.
    pub fn name(&self) -> Option<&'static str> {
        NAMED_KINDS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
    }

    /// Iterator over all kind names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED_KINDS.iter().map(|(name, _)| *name)
    }

    /// Tokens of skippable kinds are passed over by the skip-aware stream operations.
    pub fn skippable(&self) -> bool {
        matches!(self, Kind::Whitespace | Kind::Comment)
    }

    fn description(&self) -> String {
        match self {
            Kind::Whitespace => "whitespace".into(),
            Kind::Comment => "a comment".into(),
            Kind::Identifier => "an identifier".into(),
            Kind::Variable => "a variable".into(),
            Kind::Integer => "an integer".into(),
            Kind::Float => "a float".into(),
            Kind::String => "a string".into(),
            Kind::Operator => "an operator".into(),
            Kind::Cloaked => "a cloaked token".into(),
            Kind::Char(c) => format!["'{c}'"],
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => match self {
                Kind::Char(c) => write!(f, "{c}"),
                _ => write!(f, "{self:?}"),
            },
        }
    }
}

/// A token.
///
/// Tokens are immutable once constructed.
/// A token may be a template that only has a kind and no value;
///     templates are used in expected sets and in parsers that match any token of a kind.
///
/// Equality is structural with wildcard semantics:
///     the kinds must agree, and a side without a value matches any value.
/// The line number and the hygiene paint do not take part in equality.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    kind: Kind,
    value: Option<Rc<str>>,
    line: Option<u32>,
    #[cfg_attr(feature = "serde", serde(skip))]
    blue: BlueContext,
}

impl Token {
    /// Creates a new token with a value.
    pub fn new<V: Into<Rc<str>>>(kind: Kind, value: V) -> Token {
        Token {
            kind,
            value: Some(value.into()),
            line: None,
            blue: Default::default(),
        }
    }

    /// Creates a template token that matches any token of the kind.
    pub fn of_kind(kind: Kind) -> Token {
        Token {
            kind,
            value: None,
            line: None,
            blue: Default::default(),
        }
    }

    /// Creates a single character token.
    pub fn char(c: char) -> Token {
        Token::new(Kind::Char(c), c.to_string())
    }

    /// Creates an identifier token.
    pub fn identifier<V: Into<Rc<str>>>(value: V) -> Token {
        Token::new(Kind::Identifier, value)
    }

    /// Creates an operator token.
    pub fn operator<V: Into<Rc<str>>>(value: V) -> Token {
        Token::new(Kind::Operator, value)
    }

    pub fn with_line(mut self, line: Option<u32>) -> Token {
        self.line = line;
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The value of the token, or the empty string for templates.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn skippable(&self) -> bool {
        self.kind.skippable()
    }

    /// Returns whether this is an identifier with the given value.
    pub fn is_identifier(&self, value: &str) -> bool {
        self.kind == Kind::Identifier && self.text() == value
    }

    /// Returns whether this is an operator with the given value.
    pub fn is_operator(&self, value: &str) -> bool {
        self.kind == Kind::Operator && self.text() == value
    }

    /// Returns whether this is the single character token `c`.
    pub fn is_char(&self, c: char) -> bool {
        self.kind == Kind::Char(c)
    }

    /// The hygiene paint of the token.
    pub fn blue(&self) -> &BlueContext {
        &self.blue
    }

    /// Returns a copy of this token carrying the given paint.
    pub fn painted(&self, blue: BlueContext) -> Token {
        Token {
            blue,
            ..self.clone()
        }
    }

    /// Returns a copy of this token without line or paint information.
    pub fn bare(&self) -> Token {
        Token {
            kind: self.kind,
            value: self.value.clone(),
            line: None,
            blue: Default::default(),
        }
    }

    /// Human readable description used in diagnostics.
    pub fn describe(&self) -> String {
        match (&self.value, self.kind) {
            (Some(value), Kind::Whitespace) if value.contains('\n') => "a newline".into(),
            (Some(_), Kind::Whitespace) => "whitespace".into(),
            (Some(value), _) => format!["'{value}'"],
            (None, kind) => kind.description(),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Removes the quotes from a string literal and resolves backslash escapes.
pub fn unquote(literal: &str) -> String {
    let mut chars = literal.chars();
    let quote = chars.next();
    let inner: Vec<char> = chars.collect();
    let inner = match (quote, inner.last()) {
        (Some(q @ ('\'' | '"')), Some(last)) if *last == q => &inner[..inner.len() - 1],
        _ => return literal.to_string(),
    };
    let mut result = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner {
        if escaped {
            result.push(*c);
            escaped = false;
        } else if *c == '\\' {
            escaped = true;
        } else {
            result.push(*c);
        }
    }
    result
}

/// Returns the closing character for an opening delimiter.
pub(crate) fn closer_for(token: &Token) -> Option<char> {
    match (token.kind, token.text()) {
        (Kind::Char('{'), _) | (Kind::Operator, "${") => Some('}'),
        (Kind::Char('['), _) => Some(']'),
        (Kind::Char('('), _) => Some(')'),
        _ => None,
    }
}

pub(crate) fn is_closer(token: &Token) -> bool {
    matches!(token.kind, Kind::Char('}' | ']' | ')'))
}

/// Given the index of an opening delimiter, returns the index of the matching closer.
pub(crate) fn matching_closer(tokens: &[Token], open: usize) -> Option<usize> {
    let mut stack = vec![closer_for(tokens.get(open)?)?];
    for (i, token) in tokens.iter().enumerate().skip(open + 1) {
        if let Some(closer) = closer_for(token) {
            stack.push(closer);
        } else if is_closer(token) {
            if !token.is_char(stack.pop()?) {
                return None;
            }
            if stack.is_empty() {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! equality_tests {
        ( $( ($name: ident, $lhs: expr, $rhs: expr, $want: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    let lhs: Token = $lhs;
                    let rhs: Token = $rhs;
                    assert_eq!(lhs == rhs, $want);
                    assert_eq!(rhs == lhs, $want);
                }
            )+
        };
    }

    equality_tests![
        (
            same_kind_and_value,
            Token::identifier("swap"),
            Token::identifier("swap"),
            true
        ),
        (
            different_value,
            Token::identifier("swap"),
            Token::identifier("swop"),
            false
        ),
        (
            different_kind,
            Token::identifier("swap"),
            Token::new(Kind::String, "swap"),
            false
        ),
        (
            template_matches_any_value,
            Token::of_kind(Kind::Variable),
            Token::new(Kind::Variable, "$x"),
            true
        ),
        (
            template_needs_same_kind,
            Token::of_kind(Kind::Variable),
            Token::identifier("x"),
            false
        ),
        (
            line_is_ignored,
            Token::char('(').with_line(Some(3)),
            Token::char('('),
            true
        ),
    ];

    #[test]
    fn kind_names_round_trip() {
        for name in Kind::names() {
            let kind = Kind::from_name(name).unwrap();
            assert_eq!(kind.name(), Some(name));
        }
        assert_eq!(Kind::from_name("T_STRING"), None);
        assert_eq!(Kind::Char('(').name(), None);
    }

    #[test]
    fn describe() {
        assert_eq!(Token::char('(').describe(), "'('");
        assert_eq!(Token::of_kind(Kind::Identifier).describe(), "an identifier");
        assert_eq!(Token::new(Kind::Whitespace, "\n  ").describe(), "a newline");
    }

    #[test]
    fn unquote_strips_and_unescapes() {
        assert_eq!(unquote("'=>'"), "=>");
        assert_eq!(unquote(r#""a\"b""#), "a\"b");
        assert_eq!(unquote(r"'it\'s'"), "it's");
        assert_eq!(unquote("bare"), "bare");
    }

    #[test]
    fn matching_closer_nested() {
        let tokens: Vec<Token> = "{([]){}}"
            .chars()
            .map(Token::char)
            .collect();
        assert_eq!(matching_closer(&tokens, 0), Some(7));
        assert_eq!(matching_closer(&tokens, 1), Some(4));
        assert_eq!(matching_closer(&tokens, 5), Some(6));
    }

    #[test]
    fn matching_closer_mismatch() {
        let tokens: Vec<Token> = "{(})".chars().map(Token::char).collect();
        assert_eq!(matching_closer(&tokens, 0), None);
    }
}
