//! The Weave engine.
//!
//! The engine owns the configuration shared by every expansion: the lexer,
//!     the nested parsers available to patterns, the expanders available to expansions
//!     and the [Options].
//!
//! Each call to [Engine::expand] is one expansion cycle.
//! The cycle scans the token stream from left to right.
//! At each significant token:
//!
//! - If the token is the keyword `macro` or `ignore` and starts a declaration,
//!     the declaration is compiled, registered and removed from the stream.
//!     A `macro` keyword that does not start a declaration is left alone.
//!
//! - Otherwise the directives that can start at the token are tried in order.
//!     When a macro matches, its expansion replaces the match and scanning resumes
//!     at the first token of the expansion, so expansions are themselves expanded.
//!     When an ignore rule matches, scanning resumes after the match.
//!
//! Directives only live for the cycle they are declared in,
//!     except for macros tagged `·global`.
//! These are kept in source form and compiled again at the start of every later cycle.

use crate::ast::Ast;
use crate::directive::{self, Directive, IgnoreRule, Macro, Outcome, Registry, Tags};
use crate::error::{self, OperationKind, SimpleFailedPreconditionError, SimpleTokenError};
use crate::expander;
use crate::expansion::{self, Expansion};
use crate::hygiene::Cycle;
use crate::parse::{self, registry, BuildError, Failure, Parser};
use crate::pattern::Pattern;
use crate::token::lexer::{self, Lexer};
use crate::token::stream::TokenStream;
use crate::token::{Kind, Token};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Options that control expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Options {
    /// Salt of the expansion ids.
    ///
    /// If unset a random salt is picked for every cycle.
    /// Setting a salt makes the renamed variables deterministic, which is mostly useful in tests.
    pub salt: Option<String>,

    /// Whether free variables in expansions are renamed.
    pub hygiene: bool,

    /// Whether the whitespace after a declaration is removed along with the declaration.
    pub trim_declarations: bool,

    /// Maximum depth of nested expansion cycles started by expanders.
    pub max_nesting_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            salt: None,
            hygiene: true,
            trim_declarations: true,
            max_nesting_depth: 32,
        }
    }
}

/// Configuration shared by all of the cycles of an engine.
pub struct Resources {
    pub(crate) lexer: Lexer,
    pub(crate) parsers: HashMap<&'static str, registry::BuiltIn>,
    pub(crate) expanders: HashMap<&'static str, expander::BuiltIn>,
    pub(crate) options: Options,
    next_id: Cell<u32>,
    next_nested: Cell<u32>,
}

impl Resources {
    fn next_id(&self) -> directive::Id {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        directive::Id::new(id)
    }

    pub(crate) fn next_nested(&self) -> u32 {
        let n = self.next_nested.get() + 1;
        self.next_nested.set(n);
        n
    }
}

/// State threaded through the application of a directive.
pub(crate) struct Context<'a> {
    pub(crate) resources: &'a Resources,
    pub(crate) registry: &'a Registry,
    pub(crate) cycle: &'a mut Cycle,
    pub(crate) depth: usize,
}

/// A macro or ignore rule declaration, as written in the source.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    keyword: Token,
    tags: Vec<Token>,
    pattern: Vec<Token>,
    expansion: Option<Vec<Token>>,
}

impl Declaration {
    fn from_ast(ast: &Ast) -> Option<Declaration> {
        let inner = |ast: &Ast| -> Vec<Token> {
            match ast.tokens().as_slice() {
                [_, inner @ .., _] => inner.iter().map(|t| (*t).clone()).collect(),
                _ => vec![],
            }
        };
        Some(Declaration {
            keyword: ast.get("keyword")?.as_token()?.clone(),
            tags: ast
                .get("tags")
                .map(|tags| {
                    tags.tokens()
                        .into_iter()
                        .filter(|t| t.kind() == Kind::Identifier)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            pattern: inner(ast.get("pattern")?),
            expansion: ast.get("expansion").map(inner),
        })
    }

    fn is_global(&self) -> bool {
        self.tags.iter().any(|t| t.text() == "global")
    }

    fn compile(&self, resources: &Resources) -> error::Result<Directive> {
        let id = resources.next_id();
        self.compile_with_id(id, resources)
            .map_err(|err| err.propagate(OperationKind::Declaration, self.keyword.clone()))
    }

    fn compile_with_id(&self, id: directive::Id, resources: &Resources) -> error::Result<Directive> {
        let Some(expansion) = &self.expansion else {
            let pattern = Pattern::compile(&self.pattern, &resources.parsers, false)?;
            return Ok(Directive::Ignore(IgnoreRule::new(id, pattern)));
        };
        let tags = Tags::from_tokens(&self.tags)?;
        let pattern = Pattern::compile(&self.pattern, &resources.parsers, tags.grammar)?;
        let expansion = Expansion::compile(
            expansion::trimmed(expansion),
            &resources.expanders,
            pattern.labels(),
            resources.options.hygiene && !tags.unsafe_,
        )?;
        Ok(Directive::Macro(Macro::new(id, tags, pattern, expansion)))
    }
}

/// The parser that recognizes and removes declarations.
///
/// Both declarations are committed once the first brace is seen.
fn declaration_parser(trim: bool) -> Result<Parser, BuildError> {
    let semicolon = || parse::optional(parse::token(Token::char(';')));
    let brace = || parse::lookahead(parse::token(Token::char('{')));
    let tag = parse::chain(vec![
        parse::token(Token::char('·')),
        parse::kind(Kind::Identifier),
    ])?;
    let declare_macro = parse::chain(vec![
        parse::token(Token::identifier("macro")).labeled("keyword"),
        parse::optional(parse::repeat(tag)?).labeled("tags"),
        brace(),
        parse::commit(parse::chain(vec![
            parse::braces().labeled("pattern"),
            parse::token(Token::operator(">>")),
            parse::braces().labeled("expansion"),
            semicolon(),
        ])?),
    ])?;
    let declare_ignore = parse::chain(vec![
        parse::token(Token::identifier("ignore")).labeled("keyword"),
        brace(),
        parse::commit(parse::chain(vec![
            parse::braces().labeled("pattern"),
            semicolon(),
        ])?),
    ])?;
    Ok(parse::consume(
        parse::either(vec![declare_macro, declare_ignore])?,
        trim,
    ))
}

/// Runs one expansion cycle over the stream.
///
/// Global declarations encountered are appended to `globals`.
pub(crate) fn run(
    resources: &Resources,
    registry: &mut Registry,
    cycle: &mut Cycle,
    ts: &mut TokenStream,
    depth: usize,
    globals: &mut Vec<Declaration>,
) -> error::Result<()> {
    let declarations = declaration_parser(resources.options.trim_declarations)
        .map_err(|err| SimpleFailedPreconditionError::new(err.0))?;
    ts.reset();
    while let Some(token) = ts.skip().cloned() {
        if token.is_identifier("macro") || token.is_identifier("ignore") {
            match declarations.parse(ts) {
                Ok(ast) => {
                    let Some(declaration) = Declaration::from_ast(&ast) else {
                        return Err(SimpleTokenError::new(token, "malformed declaration").into());
                    };
                    let directive = declaration.compile(resources)?;
                    tracing::debug!(
                        id = %directive.id(),
                        specificity = directive.specificity(),
                        global = directive.is_global(),
                        line = token.line(),
                        "registered {}",
                        if declaration.expansion.is_some() { "macro" } else { "ignore rule" },
                    );
                    if declaration.is_global() {
                        globals.push(declaration);
                    }
                    registry.insert(Rc::new(directive));
                    continue;
                }
                Err(Failure::Halt(err)) => {
                    return Err(err.propagate(OperationKind::Declaration, token));
                }
                Err(Failure::Error(_)) => {
                    if token.is_identifier("macro") {
                        ts.step();
                        continue;
                    }
                }
            }
        }
        let mut cx = Context {
            resources,
            registry: &*registry,
            cycle: &mut *cycle,
            depth,
        };
        let mut moved = false;
        for directive in registry.candidates(&token) {
            match directive.apply(ts, &mut cx)? {
                Outcome::NoMatch | Outcome::Rejected => continue,
                Outcome::Expanded | Outcome::Ignored => {
                    moved = true;
                    break;
                }
            }
        }
        if !moved {
            ts.step();
        }
    }
    ts.reset();
    Ok(())
}

/// The Weave engine.
pub struct Engine {
    resources: Resources,
    globals: Vec<Declaration>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    /// Creates an engine with the built-in nested parsers and no expanders.
    pub fn new() -> Engine {
        Engine::new_with_built_ins(HashMap::new())
    }

    /// Creates an engine with the built-in nested parsers and the provided expanders.
    pub fn new_with_built_ins(expanders: HashMap<&'static str, expander::BuiltIn>) -> Engine {
        Engine {
            resources: Resources {
                lexer: lexer::tokenize,
                parsers: registry::built_in_parsers(),
                expanders,
                options: Default::default(),
                next_id: Cell::new(0),
                next_nested: Cell::new(0),
            },
            globals: vec![],
        }
    }

    pub fn with_options(mut self, options: Options) -> Engine {
        self.resources.options = options;
        self
    }

    /// Replaces the default lexer.
    pub fn with_lexer(mut self, lexer: Lexer) -> Engine {
        self.resources.lexer = lexer;
        self
    }

    pub fn options(&self) -> &Options {
        &self.resources.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.resources.options
    }

    pub fn register_parser(&mut self, name: &'static str, built_in: registry::BuiltIn) {
        self.resources.parsers.insert(name, built_in);
    }

    pub fn register_expander(&mut self, name: &'static str, built_in: expander::BuiltIn) {
        self.resources.expanders.insert(name, built_in);
    }

    pub fn parsers(&self) -> &HashMap<&'static str, registry::BuiltIn> {
        &self.resources.parsers
    }

    pub fn expanders(&self) -> &HashMap<&'static str, expander::BuiltIn> {
        &self.resources.expanders
    }

    /// Returns the number of global directives that are carried into every cycle.
    pub fn num_globals(&self) -> usize {
        self.globals.len()
    }

    /// Lexes source code with the engine's lexer.
    pub fn lex(&self, source: &str) -> error::Result<TokenStream> {
        Ok((self.resources.lexer)(source)?.into_iter().collect())
    }

    /// Runs one expansion cycle over the tokens and returns the result.
    pub fn expand(&mut self, mut ts: TokenStream) -> error::Result<TokenStream> {
        let mut cycle = Cycle::new(self.resources.options.salt.as_deref());
        tracing::debug!(salt = cycle.salt(), tokens = ts.len(), "starting expansion cycle");
        let mut registry = Registry::default();
        for declaration in &self.globals {
            registry.insert(Rc::new(declaration.compile(&self.resources)?));
        }
        if !self.globals.is_empty() {
            tracing::debug!(n = self.globals.len(), "re-registered global macros");
        }
        let mut globals = vec![];
        run(
            &self.resources,
            &mut registry,
            &mut cycle,
            &mut ts,
            0,
            &mut globals,
        )?;
        self.globals.extend(globals);
        tracing::debug!(
            salt = cycle.salt(),
            directives = registry.len(),
            tokens = ts.len(),
            "finished expansion cycle"
        );
        Ok(ts)
    }

    /// Lexes and expands source code.
    pub fn expand_source(&mut self, source: &str) -> error::Result<String> {
        let ts = self.lex(source)?;
        Ok(self.expand(ts)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::ExpansionInput;

    fn engine() -> Engine {
        let mut engine = Engine::new().with_options(Options {
            salt: Some("t".into()),
            ..Default::default()
        });
        engine.register_expander("reverse", expander::BuiltIn::new(reverse, "reverses tokens"));
        engine.register_expander("nested", expander::BuiltIn::new(nested, "expands tokens"));
        engine
    }

    fn reverse(ts: TokenStream, _: &mut ExpansionInput) -> error::Result<TokenStream> {
        let mut tokens = ts.to_vec();
        tokens.reverse();
        Ok(tokens.into())
    }

    fn nested(ts: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
        input.expand_nested(ts)
    }

    fn expand(source: &str) -> String {
        engine().expand_source(source).unwrap()
    }

    macro_rules! expansion_tests {
        ( $( ($name: ident, $input: expr, $want: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(expand($input), $want);
                }
            )+
        };
    }

    expansion_tests![
        (constant_macro, "macro { foo } >> { bar }\nfoo + foo", "bar + bar"),
        (
            declaration_without_semicolon,
            "macro { a } >> { b } a",
            "b"
        ),
        (
            declaration_with_semicolon,
            "macro { a } >> { b }; a",
            "b"
        ),
        (
            kind_captures,
            "macro { swap(variable·a, variable·b) } >> { [variable·b, variable·a] }\nswap($x, $y);",
            "[$y, $x];"
        ),
        (
            layer_captures,
            "macro { unless (···cond) { ···body } } >> { if (!(···cond)) { ···body } }\nunless (a && b) { go(); }",
            "if (!(a && b)) { go(); }"
        ),
        (
            expansion_is_rescanned,
            "macro { a } >> { b } macro { b } >> { c } a",
            "c"
        ),
        (
            macro_keyword_alone_is_left_alone,
            "macro foo",
            "macro foo"
        ),
        (
            ignore_keyword_alone_is_matched_normally,
            "macro { ignore } >> { skip } ignore me",
            "skip me"
        ),
        (
            most_specific_macro_wins,
            "macro { a } >> { one } macro { a b } >> { two } a b a",
            "two one"
        ),
        (
            declaration_order_breaks_ties,
            "macro { a } >> { first } macro { a } >> { second } a",
            "first"
        ),
        (
            self_reproducing_macro_terminates,
            "macro { foo } >> { foo bar } foo",
            "foo bar"
        ),
        (
            ignore_rule_protects_tokens,
            "macro { a } >> { b } ignore { (···body) } a (a) a",
            "b (a) b"
        ),
        (
            repetition_with_delimiter,
            "macro { list [ ·ls(ident·x, ',')·xs ] } >> { xs··· (; ) { f(ident·x) } } list [a, b, c]",
            "f(a); f(b); f(c)"
        ),
        (
            optional_repetition_of_missing_capture,
            "macro { call ·optional(·ls(ident·x, ',')·xs) ; } >> { go(xs···? (, ) { ident·x }) } call ; call a, b ;",
            "go() go(a, b)"
        ),
        (
            hygienic_variables,
            "macro { tmp } >> { $t = 1; } tmp tmp",
            "$t__t1 = 1; $t__t2 = 1;"
        ),
        (
            unsafe_section,
            "macro { tmp } >> { ··unsafe($t) = $u; } tmp",
            "$t = $u__t1;"
        ),
        (
            unsafe_tag,
            "macro ·unsafe { tmp } >> { $t = 1; } tmp",
            "$t = 1;"
        ),
        (
            expander_call,
            "macro { rev(···args) } >> { ··reverse(···args) } rev(a b c)",
            "c b a"
        ),
        (
            cloak_is_lexed_again,
            "macro { join(ident·a, ident·b) } >> { ··cloak(ident·a ident·b) } join(x, y)",
            "x y"
        ),
        (
            nested_expansion_runs_inner_macros_first,
            "macro { inc(···x) } >> { (··nested(···x) + 1) } inc(inc(1))",
            "((1 + 1) + 1)"
        ),
        (
            empty_expansion,
            "macro { debug(···x); } >> {} a debug(1); b",
            "a  b"
        ),
        (
            dominance_marker,
            "macro { enum ident·name · { ···cases } } >> { class ident·name {} } enum Suit { A }",
            "class Suit {}"
        ),
    ];

    #[test]
    fn declarations_keep_whitespace_without_trimming() {
        let mut engine = engine();
        engine.options_mut().trim_declarations = false;
        let output = engine.expand_source("macro { a } >> { b }\na").unwrap();
        assert_eq!(output, "\nb");
    }

    #[test]
    fn hygiene_disabled_by_option() {
        let mut engine = engine();
        engine.options_mut().hygiene = false;
        let output = engine.expand_source("macro { tmp } >> { $t } tmp").unwrap();
        assert_eq!(output, "$t");
    }

    #[test]
    fn global_macros_survive_cycles() {
        let mut engine = engine();
        let output = engine
            .expand_source("macro ·global { a } >> { b } macro { c } >> { d } a c")
            .unwrap();
        assert_eq!(output, "b d");
        assert_eq!(engine.num_globals(), 1);
        assert_eq!(engine.expand_source("a c").unwrap(), "b c");
    }

    #[test]
    fn recursive_macros_see_their_own_output() {
        let output = expand(
            "macro ·recursive { count(integer·n ···rest) } >> { integer·n + count(···rest) } \
             macro { count() } >> { 0 } count(1 2 3)",
        );
        assert_eq!(output, "1 + 2 + 3 + 0");
    }

    #[test]
    fn commit_failure_halts() {
        let err = engine()
            .expand_source("macro { enum · ident·name { } } >> { x } enum 3")
            .unwrap_err();
        assert_eq!(err.title(), "expected an identifier, instead found '3'");
    }

    #[test]
    fn unterminated_declaration_halts() {
        let err = engine().expand_source("macro { a } b").unwrap_err();
        assert_eq!(err.title(), "expected '>>', instead found 'b'");
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let err = engine().expand_source("macro ·globl { a } >> { b }").unwrap_err();
        assert_eq!(err.title(), "undefined macro tag `globl`");
    }

    #[test]
    fn unbound_capture_is_an_error() {
        let err = engine()
            .expand_source("macro { a ident·x } >> { ident·y }")
            .unwrap_err();
        assert_eq!(err.title(), "undefined capture `y`");
    }

    #[test]
    fn unknown_expander_is_an_error() {
        let err = engine()
            .expand_source("macro { a } >> { ··revers(b) }")
            .unwrap_err();
        assert_eq!(err.title(), "undefined expander `revers`");
    }

    #[test]
    fn missing_repetition_capture_is_an_error() {
        let err = engine()
            .expand_source(
                "macro { call ·optional(·ls(ident·x, ',')·xs) ; } >> { xs··· { ident·x } } call ;",
            )
            .unwrap_err();
        assert_eq!(err.title(), "the capture `xs` is missing or empty");
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut engine = engine();
        engine.options_mut().max_nesting_depth = 3;
        let err = engine
            .expand_source("macro ·recursive { deep } >> { ··nested(deep) } deep")
            .unwrap_err();
        assert!(matches!(*err, error::Error::Propagated(_)));
        assert_eq!(
            err.root().title(),
            "nested expansion exceeded the maximum depth of 3"
        );
    }

    #[test]
    fn nested_declarations_do_not_leak() {
        let output = expand("macro { wrap(···x) } >> { ··nested(···x) } wrap(macro { a } >> { b } a) a");
        assert_eq!(output, "b a");
    }

    #[test]
    fn directive_ids_increase() {
        let mut engine = engine();
        engine.expand_source("macro { a } >> { b }").unwrap();
        let id = engine.resources.next_id();
        assert_eq!(id.get(), 2);
    }
}
