//! Expanders that operate on the text of tokens

use weave::error::{self, SimpleTokenError};
use weave::expander::{self, ExpansionInput};
use weave::token::stream::TokenStream;
use weave::token::{Kind, Token};

pub const STRINGIFY_DOC: &str = r"Turn tokens into a string literal

Usage: `··stringify(tokens)`

The text of the tokens, with leading and trailing whitespace removed,
is quoted with single quotes.
Quotes and backslashes in the text are escaped.

```
macro { name_of(ident·f) } >> { ··stringify(ident·f) }
name_of(main)
```
expands to `'main'`.
";

pub const CONCAT_DOC: &str = r"Join tokens into one token

Usage: `··concat(tokens)`

The text of the significant tokens is concatenated and lexed again.
It is an error if the result is not exactly one token.

```
macro { getter(ident·f) } >> { ··concat(get_ ident·f) }
getter(name)
```
expands to `get_name`.
";

pub const TRIM_DOC: &str = r"Remove leading and trailing whitespace

Usage: `··trim(tokens)`
";

pub const LOWER_DOC: &str = r"Convert identifiers and strings to lower case

Usage: `··lower(tokens)`

Tokens of other kinds are unchanged.
";

pub const UPPER_DOC: &str = r"Convert identifiers and strings to upper case

Usage: `··upper(tokens)`

Tokens of other kinds are unchanged.
";

pub const COUNT_DOC: &str = r"Count comma separated items

Usage: `··count(tokens)`

Returns an integer: the number of items in the comma separated list.
Commas nested inside delimiters do not separate items and
an empty list has zero items.
";

/// Get the `··stringify` expander.
pub fn get_stringify() -> expander::BuiltIn {
    expander::BuiltIn::new(stringify_fn, STRINGIFY_DOC)
}

fn stringify_fn(mut ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
    ts.trim();
    let mut literal = String::from("'");
    for c in ts.to_string().chars() {
        if c == '\'' || c == '\\' {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push('\'');
    Ok(TokenStream::from(vec![
        Token::new(Kind::String, literal).with_line(input.token().line())
    ]))
}

/// Get the `··concat` expander.
pub fn get_concat() -> expander::BuiltIn {
    expander::BuiltIn::new(concat_fn, CONCAT_DOC)
}

fn concat_fn(ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
    let joined: String = ts.significant().map(Token::text).collect();
    let result = input.lex(&joined)?;
    if result.len() != 1 {
        return Err(SimpleTokenError::new(
            input.token().clone(),
            format!["the concatenation `{joined}` is not a single token"],
        )
        .with_note(format!["it lexes to {} tokens", result.len()])
        .into());
    }
    Ok(result)
}

/// Get the `··trim` expander.
pub fn get_trim() -> expander::BuiltIn {
    expander::BuiltIn::new(trim_fn, TRIM_DOC)
}

fn trim_fn(mut ts: TokenStream, _: &mut ExpansionInput) -> error::Result<TokenStream> {
    ts.trim();
    Ok(ts)
}

/// Get the `··lower` expander.
pub fn get_lower() -> expander::BuiltIn {
    expander::BuiltIn::new(lower_fn, LOWER_DOC)
}

fn lower_fn(ts: TokenStream, _: &mut ExpansionInput) -> error::Result<TokenStream> {
    Ok(map_case(ts, str::to_lowercase))
}

/// Get the `··upper` expander.
pub fn get_upper() -> expander::BuiltIn {
    expander::BuiltIn::new(upper_fn, UPPER_DOC)
}

fn upper_fn(ts: TokenStream, _: &mut ExpansionInput) -> error::Result<TokenStream> {
    Ok(map_case(ts, str::to_uppercase))
}

fn map_case(ts: TokenStream, f: fn(&str) -> String) -> TokenStream {
    ts.into_iter()
        .map(|t| match t.kind() {
            Kind::Identifier | Kind::String => {
                Token::new(t.kind(), f(t.text())).with_line(t.line())
            }
            _ => t,
        })
        .collect()
}

/// Get the `··count` expander.
pub fn get_count() -> expander::BuiltIn {
    expander::BuiltIn::new(count_fn, COUNT_DOC)
}

fn count_fn(ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
    let mut depth = 0_usize;
    let mut items = 0_usize;
    let mut pending = false;
    for t in ts.significant() {
        match t.kind() {
            Kind::Char('(' | '[' | '{') => depth += 1,
            Kind::Char(')' | ']' | '}') => depth = depth.saturating_sub(1),
            Kind::Char(',') if depth == 0 => {
                items += 1;
                pending = false;
                continue;
            }
            _ => {}
        }
        pending = true;
    }
    if pending {
        items += 1;
    }
    Ok(TokenStream::from(vec![
        Token::new(Kind::Integer, items.to_string()).with_line(input.token().line())
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::built_in_expanders;
    use weave_testing::*;

    test_suite![
        expansion_tests(
            (
                stringify_basic,
                "macro { str(···x) } >> { ··stringify(···x) } str(a + b)",
                "'a + b'"
            ),
            (
                stringify_escapes_quotes,
                r"macro { str(···x) } >> { ··stringify(···x) } str('q')",
                r"'\'q\''"
            ),
            (
                stringify_trims,
                "macro { str(···x) } >> { ··stringify( ···x ) } str(a)",
                "'a'"
            ),
            (
                concat_identifiers,
                "macro { getter(ident·f) } >> { ··concat(get_ ident·f) } getter(name)",
                "get_name"
            ),
            (
                concat_operator,
                "macro { op } >> { ··concat(= =) } op",
                "=="
            ),
            (
                trim_whitespace,
                "macro { t(···x) } >> { [··trim(   ···x   )] } t(a)",
                "[a]"
            ),
            (
                lower_identifiers_and_strings,
                "macro { l(···x) } >> { ··lower(···x) } l(Foo 'BAR' 1.5)",
                "foo 'bar' 1.5"
            ),
            (
                upper_identifiers,
                "macro { u(ident·x) } >> { ··upper(ident·x) } u(abc)",
                "ABC"
            ),
            (
                count_items,
                "macro { n(···x) } >> { ··count(···x) } n(a, f(b, c), [d, e])",
                "3"
            ),
            (
                count_trailing_comma,
                "macro { n(···x) } >> { ··count(···x) } n(a, b,)",
                "2"
            ),
            (
                count_trailing_comma_in_template,
                "macro { n(···x) } >> { ··count(···x ,) } n(a)",
                "1"
            ),
        ),
        failure_tests(
            (
                concat_must_produce_one_token,
                "macro { c } >> { ··concat(a +) } c"
            ),
        ),
    ];
}
