//! The default lexer.
//!
//! The lexer is built with [logos](https://docs.rs/logos).
//! It never drops text: concatenating the values of the returned tokens
//!     gives back the input exactly.

use super::{Kind, Token};
use crate::error;
use logos::Logos;

/// Signature of a lexer.
///
/// A lexer must assign a kind, a value and a line number to every lexeme
///     and must not drop any text.
/// The engine uses [tokenize] unless another lexer is configured.
pub type Lexer = fn(&str) -> error::Result<Vec<Token>>;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    #[regex(r"//[^\n]*")]
    LineComment,

    // The rest of a block comment is scanned by hand in [tokenize].
    #[token("/*")]
    BlockCommentStart,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*")]
    Variable,

    #[regex(r"[0-9]+")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    Integer,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    Float,

    // The rest of a string is scanned by hand in [tokenize].
    #[token("'", priority = 3)]
    #[token("\"", priority = 3)]
    Quote,

    #[token("···")]
    #[token("··")]
    #[token("...")]
    #[token("${")]
    #[token(">>=")]
    #[token("<<=")]
    #[token("===")]
    #[token("!==")]
    #[token("<=>")]
    #[token("**=")]
    #[token("??=")]
    #[token("?->")]
    #[token(">>")]
    #[token("<<")]
    #[token("=>")]
    #[token("->")]
    #[token("::")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token("++")]
    #[token("--")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token(".=")]
    #[token("%=")]
    #[token("**")]
    #[token("??")]
    Operator,

    // ASCII punctuation except `_`, which starts identifiers.
    #[regex(r"[!-/:-@\[-^`{-~]")]
    Punctuation,

    // Any other non-ASCII character, including the middle dot `·`.
    #[regex(r"[^\x00-\x7F]")]
    Other,
}

impl RawToken {
    fn kind(self, slice: &str) -> Kind {
        match self {
            RawToken::Whitespace => Kind::Whitespace,
            RawToken::LineComment | RawToken::BlockCommentStart => Kind::Comment,
            RawToken::Identifier => Kind::Identifier,
            RawToken::Variable => Kind::Variable,
            RawToken::Integer => Kind::Integer,
            RawToken::Float => Kind::Float,
            RawToken::Quote => match slice.chars().next() {
                Some(c) => Kind::Char(c),
                None => Kind::Operator,
            },
            RawToken::Operator => Kind::Operator,
            RawToken::Punctuation | RawToken::Other => match slice.chars().next() {
                Some(c) => Kind::Char(c),
                None => Kind::Operator,
            },
        }
    }
}

/// Error returned when the input contains a character no token can start with.
#[derive(Debug)]
pub struct LexError {
    pub line: u32,
    pub character: char,
}

impl error::WeaveError for LexError {
    fn kind(&self) -> error::Kind {
        error::Kind::Line(self.line)
    }

    fn title(&self) -> String {
        format!["unexpected character {:?}", self.character]
    }

    fn notes(&self) -> Vec<error::display::Note> {
        vec!["control characters other than tabs, newlines and form feeds cannot appear in source code".into()]
    }
}

/// Lexes the source code into tokens.
pub fn tokenize(source: &str) -> error::Result<Vec<Token>> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    let mut line: u32 = 1;
    while let Some(result) = lexer.next() {
        let kind = match result {
            Ok(RawToken::BlockCommentStart) => {
                // An unterminated block comment runs to the end of the input.
                let rest = lexer.remainder();
                lexer.bump(rest.find("*/").map_or(rest.len(), |end| end + 2));
                Kind::Comment
            }
            Ok(RawToken::Quote) => {
                let quote = lexer.slice().chars().next().unwrap_or('\'');
                match string_length(quote, lexer.remainder()) {
                    Some(n) => {
                        lexer.bump(n);
                        Kind::String
                    }
                    None => Kind::Char(quote),
                }
            }
            Ok(raw) => raw.kind(lexer.slice()),
            Err(()) => {
                return Err(error::Error::new(LexError {
                    line,
                    character: lexer.slice().chars().next().unwrap_or('\u{fffd}'),
                }));
            }
        };
        let slice = lexer.slice();
        tokens.push(Token::new(kind, slice).with_line(Some(line)));
        line += slice.bytes().filter(|b| *b == b'\n').count() as u32;
    }
    Ok(tokens)
}

/// Length in bytes of the rest of a string literal after its opening quote,
///     including the closing quote. Backslashes escape the next character.
fn string_length(quote: char, rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            return Some(i + c.len_utf8());
        }
    }
    None
}
