/*!
Weave unit testing library

This is a crate for writing unit tests for code that uses Weave.
It is used in the Weave standard library of expanders and in the integration
    tests of the core crate, so the tests there are good examples of what this crate can do.

Every test builds a fresh [`Engine`] from the provided [`TestOption`]s.
Unless a test overrides it, the engine uses the salt `t`
    so that renamed variables are deterministic:
    the first expansion renames `$x` to `$x__t1`, the second to `$x__t2`, and so on.

## Test types

### Expansion tests

Run using [`run_expansion_test`].

These tests verify that a snippet expands to exactly the given output, whitespace included.

### Expansion equality tests

Run using [`run_expansion_equality_test`].

These tests verify that two snippets expand to the same significant tokens.
Whitespace and comments are ignored.
For example, an expansion equality test can verify that
```text
macro { swap(variable·a, variable·b) } >> { [variable·b, variable·a] = [variable·a, variable·b] }
swap($x, $y);
```
and
```text
[$y, $x] = [$x, $y];
```
produce the same output.

### Failure tests

Run using [`run_failure_test`].

These tests verify that expanding a snippet fails.

## The test suite macro

The preferred way to write a suite of unit tests is to use the [`test_suite`] macro.
See the macro's documentation for instructions on using it.
*/

use std::collections::HashMap;
use weave::error::TracedError;
use weave::expander;
use weave::token::stream::TokenStream;
use weave::token::Kind;
use weave::{Engine, Options};

/// Option passed to a test runner.
pub enum TestOption<'a> {
    /// The expanders are the result of invoking the provided static function.
    ///
    /// Overrides previous `BuiltInExpanders` or `BuiltInExpandersDyn` options.
    BuiltInExpanders(fn() -> HashMap<&'static str, expander::BuiltIn>),

    /// The expanders are the result of invoking the provided closure.
    ///
    /// Overrides previous `BuiltInExpanders` or `BuiltInExpandersDyn` options.
    BuiltInExpandersDyn(Box<dyn Fn() -> HashMap<&'static str, expander::BuiltIn> + 'a>),

    /// The provided static function is invoked after the engine is created and before expansion starts.
    ///
    /// Overrides previous `CustomEngineInitialization` or `CustomEngineInitializationDyn` options.
    CustomEngineInitialization(fn(&mut Engine)),

    /// The provided closure is invoked after the engine is created and before expansion starts.
    ///
    /// Overrides previous `CustomEngineInitialization` or `CustomEngineInitializationDyn` options.
    #[allow(clippy::type_complexity)]
    CustomEngineInitializationDyn(Box<dyn Fn(&mut Engine) + 'a>),

    /// The engine options.
    ///
    /// Overrides previous `Options` options.
    Options(Options),
}

/// Run an expansion test.
///
/// The test passes if the input expands to exactly the expected output.
pub fn run_expansion_test(input: &str, want: &str, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);
    let mut engine = initialize_engine(&options);
    let got = expand(&mut engine, input).to_string();
    similar_asserts::assert_eq!(got: got, want: want.to_string());
}

/// Run an expansion equality test.
///
/// The test passes if the two inputs expand to the same significant tokens.
pub fn run_expansion_equality_test(lhs: &str, rhs: &str, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);

    let mut engine_1 = initialize_engine(&options);
    let output_1 = expand(&mut engine_1, lhs);

    let mut engine_2 = initialize_engine(&options);
    let output_2 = expand(&mut engine_2, rhs);

    let significant = |ts: &TokenStream| -> Vec<(Kind, String)> {
        ts.significant()
            .map(|t| (t.kind(), t.text().to_string()))
            .collect()
    };
    if significant(&output_1) != significant(&output_2) {
        println!("Expansion output is different:");
        println!("------[lhs]------");
        println!("'{output_1}'");
        println!("------[rhs]------");
        println!("'{output_2}'");
        println!("-----------------");
        similar_asserts::assert_eq!(lhs: significant(&output_1), rhs: significant(&output_2));
    }
}

/// Run a failure test.
///
/// The test passes if expansion of the input fails.
pub fn run_failure_test(input: &str, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);
    let mut engine = initialize_engine(&options);
    let result = engine.lex(input).and_then(|ts| engine.expand(ts));
    match result {
        Ok(output) => {
            println!("Expansion succeeded:");
            println!("{output}");
            panic!("Expansion failure test did not pass: expansion successful");
        }
        Err(err) => {
            println!("{}", TracedError::new(err, "testing.wv", input));
        }
    }
}

fn expand(engine: &mut Engine, input: &str) -> TokenStream {
    match engine.lex(input).and_then(|ts| engine.expand(ts)) {
        Ok(ts) => ts,
        Err(err) => {
            println!("{}", TracedError::new(err, "testing.wv", input));
            panic!("Expansion failed");
        }
    }
}

struct ResolvedOptions<'a> {
    built_in_expanders: &'a dyn Fn() -> HashMap<&'static str, expander::BuiltIn>,
    custom_engine_initialization: &'a dyn Fn(&mut Engine),
    options: Options,
}

impl<'a> ResolvedOptions<'a> {
    pub fn new(options: &'a [TestOption]) -> Self {
        let mut resolved = Self {
            built_in_expanders: &HashMap::new,
            custom_engine_initialization: &|_| {},
            options: Options {
                salt: Some("t".into()),
                ..Default::default()
            },
        };
        for option in options {
            match option {
                TestOption::BuiltInExpanders(f) => resolved.built_in_expanders = f,
                TestOption::BuiltInExpandersDyn(f) => resolved.built_in_expanders = f,
                TestOption::CustomEngineInitialization(f) => {
                    resolved.custom_engine_initialization = f
                }
                TestOption::CustomEngineInitializationDyn(f) => {
                    resolved.custom_engine_initialization = f
                }
                TestOption::Options(options) => resolved.options = options.clone(),
            }
        }
        resolved
    }
}

fn initialize_engine(options: &ResolvedOptions) -> Engine {
    let mut engine = Engine::new_with_built_ins((options.built_in_expanders)())
        .with_options(options.options.clone());
    (options.custom_engine_initialization)(&mut engine);
    engine
}

/// Macro to generate a suite of unit tests
///
/// The general use of this macros looks like this:
/// ```
/// # use weave_testing::*;
/// # use std::collections::HashMap;
/// # fn built_in_expanders() -> HashMap<&'static str, weave::expander::BuiltIn> { HashMap::new() }
/// test_suite![
///     options(TestOption::BuiltInExpanders(built_in_expanders)),
///     expansion_tests(
///         (case_1, "macro { a } >> { b } a", "b"),
///     ),
///     expansion_equality_tests(
///         (case_2, "macro { a } >> { b }\n a", "b"),
///     ),
///     failure_tests(
///         (case_3, "macro { a } b"),
///     ),
/// ];
/// ```
///
/// The arguments to the macro are:
///
/// - `options(option_1, option_2, ..., option_n)`: options to pass to the test runner.
///     This is a list of values of type [TestOption].
///     The options can be omitted, in which case they default to
///     `options(TestOption::BuiltInExpanders(built_in_expanders))`.
///     In this case `built_in_expanders` is a static function in scope that returns
///     the expanders to initialize the engine with.
///
/// - `expansion_tests(cases...)`: a list of expansion test cases.
///     Each case is of the form (case name, input, expected output).
///     The data here is fed into the [run_expansion_test] test runner.
///
/// - `expansion_equality_tests(cases...)`: a list of expansion equality test cases.
///     Each case is of the form (case name, left hand side, right hand side).
///     The data here is fed into the [run_expansion_equality_test] test runner.
///
/// - `failure_tests(cases...)`: a list of failure test cases.
///     Each case is of the form (case name, input).
///     The data here is fed into the [run_failure_test] test runner.
///
/// Only one `options()` argument may be provided, and if provided it must be in the first position.
/// Zero or more of the other arguments may be provided, and in any order.
#[macro_export]
macro_rules! test_suite {
    ( options $options: tt, expansion_tests ( $( ($name: ident, $input: expr, $want: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let want = $want;
                let options = vec! $options;
                weave_testing::run_expansion_test(&input, &want, &options);
            }
        )*
    );
    ( options $options: tt, expansion_equality_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let lhs = $lhs;
                let rhs = $rhs;
                let options = vec! $options;
                weave_testing::run_expansion_equality_test(&lhs, &rhs, &options);
            }
        )*
    );
    ( options $options: tt, failure_tests ( $( ($name: ident, $input: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                weave_testing::run_failure_test(&input, &options);
            }
        )*
    );
    ( options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `options`, `expansion_tests`, `expansion_equality_tests`, `failure_tests`");
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            weave_testing::test_suite![options $options, $test_kind $test_cases,];
        )+
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        weave_testing::test_suite![options (weave_testing::TestOption::BuiltInExpanders(built_in_expanders)), $( $test_kind $test_cases, )+ ];
    );
}
