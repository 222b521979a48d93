//! Expanders for variables

use weave::error;
use weave::expander::{self, ExpansionInput};
use weave::hygiene;
use weave::token::stream::TokenStream;
use weave::token::{Kind, Token};

pub const UNVAR_DOC: &str = r"Turn variables into identifiers

Usage: `··unvar(tokens)`

Every variable `$name` becomes the identifier `name`.
Tokens of other kinds are unchanged.
";

pub const HYGIENIZE_DOC: &str = r"Rename variables with the current expansion id

Usage: `··hygienize(tokens)`

Every variable `$name` becomes `$name__id`, where `id` is the id of the
    expansion calling the expander.
This is the renaming applied to free variables of hygienic macros.
It is useful in `·unsafe` macros to rename only some of the variables.
";

/// Get the `··unvar` expander.
pub fn get_unvar() -> expander::BuiltIn {
    expander::BuiltIn::new(unvar_fn, UNVAR_DOC)
}

fn unvar_fn(ts: TokenStream, _: &mut ExpansionInput) -> error::Result<TokenStream> {
    Ok(ts
        .into_iter()
        .map(|t| match t.kind() {
            Kind::Variable => {
                Token::new(Kind::Identifier, t.text().trim_start_matches('$')).with_line(t.line())
            }
            _ => t,
        })
        .collect())
}

/// Get the `··hygienize` expander.
pub fn get_hygienize() -> expander::BuiltIn {
    expander::BuiltIn::new(hygienize_fn, HYGIENIZE_DOC)
}

fn hygienize_fn(ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
    let id = input.cycle_id().to_string();
    Ok(ts.iter().map(|t| hygiene::rename(t, &id)).collect())
}

#[cfg(test)]
mod tests {
    use crate::built_in_expanders;
    use weave_testing::*;

    test_suite![
        expansion_tests(
            (
                unvar_variable,
                "macro ·unsafe { field(variable·v) } >> { this.··unvar(variable·v) } field($name)",
                "this.name"
            ),
            (
                unvar_leaves_other_tokens,
                "macro ·unsafe { u(···x) } >> { ··unvar(···x) } u($a + b)",
                "a + b"
            ),
            (
                hygienize_in_unsafe_macro,
                "macro ·unsafe { tmp } >> { ··hygienize($x) = $y } tmp",
                "$x__t1 = $y"
            ),
            (
                hygienize_uses_current_expansion,
                "macro ·unsafe { tmp } >> { ··hygienize($x); } tmp tmp",
                "$x__t1; $x__t2;"
            ),
        ),
    ];
}
