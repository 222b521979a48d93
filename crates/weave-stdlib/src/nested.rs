//! Nested expansion

use weave::error;
use weave::expander::{self, ExpansionInput};
use weave::token::stream::TokenStream;

pub const EXPAND_DOC: &str = r"Expand tokens before using them

Usage: `··expand(tokens)`

The tokens are expanded in a nested expansion cycle and the result is returned.
The nested cycle sees every macro visible at the call site.
Macros declared inside it are not visible outside of it.

This makes it possible to expand the arguments of a macro before the macro itself:
```
macro { a } >> { b }
macro { q(···x) } >> { ··stringify(··expand(···x)) }
q(a)
```
expands to `'b'`.

The depth of nested cycles is bounded by the `max_nesting_depth` option.
";

/// Get the `··expand` expander.
pub fn get_expand() -> expander::BuiltIn {
    expander::BuiltIn::new(expand_fn, EXPAND_DOC)
}

fn expand_fn(ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
    tracing::trace!(depth = input.depth(), tokens = ts.len(), "expanding expander arguments");
    input.expand_nested(ts)
}

#[cfg(test)]
mod tests {
    use crate::built_in_expanders;
    use weave_testing::*;

    test_suite![
        expansion_tests(
            (
                expand_before_stringify,
                "macro { a } >> { b } macro { q(···x) } >> { ··stringify(··expand(···x)) } q(a)",
                "'b'"
            ),
            (
                without_expand_arguments_are_not_expanded,
                "macro { a } >> { b } macro { q(···x) } >> { ··stringify(···x) } q(a)",
                "'a'"
            ),
            (
                nested_declarations_stay_local,
                "macro { q(···x) } >> { ··expand(···x) } q(macro { a } >> { b } a) a",
                "b a"
            ),
        ),
        failure_tests(
            (unbounded_nesting, "macro { deep } >> { ··expand(deep) } deep"),
        ),
    ];
}
