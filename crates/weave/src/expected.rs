//! Expected sets.
//!
//! An expected set lists the tokens a parser could have accepted at some position.
//! It is used for two things:
//!     building "expected X, instead found Y" diagnostics,
//!     and indexing macros by the tokens that can start them.

use crate::token::Token;
use std::fmt;

/// An ordered, append-only collection of token templates.
#[derive(Clone, Debug, Default)]
pub struct Expected {
    tokens: Vec<Token>,
}

impl Expected {
    pub fn new() -> Expected {
        Default::default()
    }

    pub fn of(token: Token) -> Expected {
        Expected {
            tokens: vec![token.bare()],
        }
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token.bare());
    }

    /// Appends all of the tokens of the other set.
    pub fn merge(&mut self, other: &Expected) {
        self.tokens.extend(other.tokens.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut descriptions: Vec<String> = Vec::new();
        for token in &self.tokens {
            let description = token.describe();
            if !descriptions.contains(&description) {
                descriptions.push(description);
            }
        }
        match descriptions.split_last() {
            None => write!(f, "something else"),
            Some((last, [])) => write!(f, "{last}"),
            Some((last, rest)) => write!(f, "{} or {}", rest.join(", "), last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Kind;

    #[test]
    fn display() {
        let mut expected = Expected::new();
        assert_eq!(expected.to_string(), "something else");
        expected.push(Token::char(')'));
        assert_eq!(expected.to_string(), "')'");
        expected.push(Token::of_kind(Kind::Identifier));
        expected.push(Token::char(')'));
        assert_eq!(expected.to_string(), "')' or an identifier");
        expected.push(Token::char(','));
        assert_eq!(expected.to_string(), "')', an identifier or ','");
    }

    #[test]
    fn merge_keeps_order() {
        let mut a = Expected::of(Token::char('a'));
        a.merge(&Expected::of(Token::char('b')));
        let got: Vec<&str> = a.iter().map(Token::text).collect();
        assert_eq!(got, vec!["a", "b"]);
    }
}
