use std::collections::HashMap;
use weave::error;
use weave::expander::{self, ExpansionInput};
use weave::token::stream::TokenStream;
use weave::Engine;
use weave_testing::*;

fn built_in_expanders() -> HashMap<&'static str, expander::BuiltIn> {
    HashMap::new()
}

fn nested_fn(ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
    input.expand_nested(ts)
}

fn register_nested(engine: &mut Engine) {
    engine.register_expander("nested", expander::BuiltIn::new(nested_fn, "Expands its argument"));
}

const ENUM_GRAMMAR: &str = "
macro ·grammar {
    enum ·production = 'enum' ident·name '{' case···',' '}' ;
    case = ident·label ;
} >> { const ident·name = [case··· (, ) { ident·label }]; }
";

mod basics {
    use super::*;

    test_suite![
        expansion_tests(
            (source_without_macros_is_unchanged, "a  /* c */ b\n\t'x'", "a  /* c */ b\n\t'x'"),
            (comments_survive_expansion, "macro { a } >> { b } a // done", "b // done"),
            (
                failed_match_keeps_the_input,
                "macro { a b c } >> { X } a b d a b c",
                "a b d X"
            ),
            (global_macro_in_one_cycle, "macro ·global { a } >> { b } a", "b"),
        ),
        expansion_equality_tests(
            (
                more_specific_macro_is_tried_first,
                "macro { a } >> { one } macro { a b c } >> { three } a b c",
                "three"
            ),
            (
                self_reproducing_macro_expands_once,
                "macro { x } >> { x x } x",
                "x x"
            ),
            (
                repetition_keeps_delimiter_count,
                "macro { list [ ·ls(ident·x, ',')·xs ] } >> { xs··· (,) { f(ident·x) } } list [a, b, c]",
                "f(a), f(b), f(c)"
            ),
            (
                repetition_of_one_item_has_no_delimiter,
                "macro { list [ ·ls(ident·x, ',')·xs ] } >> { xs··· (,) { f(ident·x) } } list [a]",
                "f(a)"
            ),
            (
                two_macros_fire_at_the_same_position,
                "macro { a } >> { b c } macro { b c } >> { d } a",
                "d"
            ),
            (
                ignore_rule_skips_braces,
                "macro { x } >> { y } ignore { {···body} } x { x } x",
                "y { x } y"
            ),
        ),
    ];
}

mod grammars {
    use super::*;

    test_suite![
        expansion_equality_tests(
            (
                enum_grammar,
                format!["{ENUM_GRAMMAR} enum Color {{ Red, Green, Blue }}"],
                "const Color = [Red, Green, Blue];"
            ),
            (
                enum_grammar_single_case,
                format!["{ENUM_GRAMMAR} enum Unit {{ Only }}"],
                "const Unit = [Only];"
            ),
        ),
        expansion_tests(
            (
                grammar_starting_with_optional_rule,
                "macro ·grammar { a ·production = b 'y' ; b ·optional = 'x' ; } >> { Z } x y ; y",
                "Z ; Z"
            ),
        ),
        failure_tests(
            (
                grammar_without_production,
                "macro ·grammar { a = 'x' ; } >> {} x"
            ),
            (
                grammar_with_unreachable_rule,
                "macro ·grammar { a ·production = 'x' ; b = 'y' ; } >> {} x"
            ),
            (
                grammar_matching_any_input_through_rule,
                "macro ·grammar { a ·production = b ; b ·optional = 'x' ; } >> {} x"
            ),
            (
                grammar_dead_branch_through_rule,
                "macro ·grammar { a ·production = 'z' inner ; inner = opt | ident·x ; opt ·optional = 'x' ; } >> {} z x"
            ),
            (
                grammar_matching_any_input,
                "macro ·grammar { a ·production ·optional = 'x' ; } >> {} x"
            ),
        ),
    ];
}

mod failures {
    use super::*;

    test_suite![
        failure_tests(
            (
                dead_branch_in_alternation,
                "macro { ·either(·optional(a), b) } >> {} b"
            ),
            (duplicate_capture, "macro { f(ident·x, ident·x) } >> {} f(a, b)"),
            (dominance_marker_first, "macro { · a } >> {} a"),
            (
                commit_after_dominance_marker,
                "macro { enum ident·name · { ···cases } } >> {} enum Suit ;"
            ),
            (
                balanced_layer_mismatch,
                "macro { f · (···x) } >> {} f { ( } )"
            ),
            (unknown_nested_parser, "macro { ·eithr(a, b) } >> {} a"),
            (consume_in_pattern, "macro { a ·consume('b') c } >> { X } a b d"),
            (unknown_token_kind, "macro { identifier·x } >> {} a"),
            (unbound_capture, "macro { a } >> { ident·x } a"),
            (unterminated_declaration, "macro { a } b"),
        ),
    ];
}

mod nested {
    use super::*;

    test_suite![
        options(
            TestOption::BuiltInExpanders(built_in_expanders),
            TestOption::CustomEngineInitialization(register_nested),
        ),
        expansion_equality_tests(
            (
                inner_call_expands_first,
                "macro { inc(···x) } >> { (··nested(···x) + 1) } inc(inc(inc(0)))",
                "(((0 + 1) + 1) + 1)"
            ),
        ),
        failure_tests(
            (
                unbounded_nesting,
                "macro { deep } >> { ··nested(deep) } deep"
            ),
        ),
    ];
}

mod options {
    use super::*;
    use weave::Options;

    test_suite![
        options(TestOption::Options(Options {
            salt: Some("s".into()),
            hygiene: false,
            trim_declarations: false,
            ..Default::default()
        })),
        expansion_tests(
            (
                variables_are_not_renamed,
                "macro { tmp } >> { $x } tmp",
                " $x"
            ),
        ),
    ];

    #[test]
    fn globals_persist_across_expand_calls() {
        let mut engine = Engine::new().with_options(Options {
            salt: Some("g".into()),
            ..Default::default()
        });
        assert_eq!(
            engine.expand_source("macro ·global { a } >> { b } macro { c } >> { d } a c").unwrap(),
            "b d"
        );
        assert_eq!(engine.num_globals(), 1);
        assert_eq!(engine.expand_source("a c").unwrap(), "b c");
    }

    #[test]
    fn hygiene_ids_restart_every_cycle() {
        let mut engine = Engine::new().with_options(Options {
            salt: Some("h".into()),
            ..Default::default()
        });
        assert_eq!(
            engine.expand_source("macro ·global { tmp } >> { $x } tmp").unwrap(),
            "$x__h1"
        );
        assert_eq!(engine.expand_source("tmp").unwrap(), "$x__h1");
    }
}
