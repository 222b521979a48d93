//! Expanders.
//!
//! An expander is a function that transforms tokens during macro expansion.
//! Expanders are called from expansions with the syntax `··name(args)` or `··name{args}`:
//!     the arguments are expanded first, and the expander receives the resulting tokens.
//!
//! The standard expanders live in the `weave-stdlib` crate.

use crate::directive;
use crate::engine::Resources;
use crate::error::{self, SimpleTokenError};
use crate::hygiene::Cycle;
use crate::token::stream::TokenStream;
use crate::token::Token;
use crate::{directive::Registry, engine};

/// Signature of an expander function.
pub type Fn = fn(TokenStream, &mut ExpansionInput) -> error::Result<TokenStream>;

/// An expander function along with its documentation.
#[derive(Clone, Copy)]
pub struct BuiltIn {
    f: Fn,
    doc: &'static str,
}

impl BuiltIn {
    pub fn new(f: Fn, doc: &'static str) -> BuiltIn {
        BuiltIn { f, doc }
    }

    pub fn call(&self, args: TokenStream, input: &mut ExpansionInput) -> error::Result<TokenStream> {
        (self.f)(args, input)
    }

    pub fn doc(&self) -> &'static str {
        self.doc
    }
}

impl std::fmt::Debug for BuiltIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltIn").field("doc", &self.doc).finish()
    }
}

/// Input passed to expanders.
///
/// This gives expanders access to the state of the macro expansion they are part of.
pub struct ExpansionInput<'a> {
    resources: &'a Resources,
    registry: &'a Registry,
    cycle_id: String,
    depth: usize,
    macro_id: directive::Id,
    token: Token,
}

impl<'a> ExpansionInput<'a> {
    pub(crate) fn new(
        resources: &'a Resources,
        registry: &'a Registry,
        cycle_id: String,
        depth: usize,
        macro_id: directive::Id,
        token: Token,
    ) -> ExpansionInput<'a> {
        ExpansionInput {
            resources,
            registry,
            cycle_id,
            depth,
            macro_id,
            token,
        }
    }

    /// The id of the current expansion. Free variables are renamed with this id.
    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    /// The first token of the macro call being expanded.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The id of the macro being expanded.
    pub fn macro_id(&self) -> directive::Id {
        self.macro_id
    }

    /// How many nested expansions enclose this one. Zero at the top level.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn options(&self) -> &engine::Options {
        &self.resources.options
    }

    /// Lexes source code with the engine's lexer.
    pub fn lex(&self, source: &str) -> error::Result<TokenStream> {
        let tokens = (self.resources.lexer)(source)?;
        Ok(tokens
            .into_iter()
            .map(|t| t.with_line(self.token.line()))
            .collect())
    }

    /// Expands the tokens in an independent expansion cycle.
    ///
    /// The nested cycle sees every directive visible at this point but
    ///     directives declared inside it do not leak out.
    pub fn expand_nested(&mut self, ts: TokenStream) -> error::Result<TokenStream> {
        let depth = self.depth + 1;
        let max = self.resources.options.max_nesting_depth;
        if depth > max {
            return Err(SimpleTokenError::new(
                self.token.clone(),
                format!["nested expansion exceeded the maximum depth of {max}"],
            )
            .with_note("the depth limit is set by the max_nesting_depth option")
            .into());
        }
        let salt = self
            .resources
            .options
            .salt
            .as_ref()
            .map(|salt| format!["{salt}{}n", self.resources.next_nested()]);
        let mut cycle = Cycle::new(salt.as_deref());
        let mut registry = self.registry.clone();
        let mut ts = ts;
        let mut globals = vec![];
        tracing::trace!(depth, salt = cycle.salt(), "starting nested expansion cycle");
        engine::run(
            self.resources,
            &mut registry,
            &mut cycle,
            &mut ts,
            depth,
            &mut globals,
        )?;
        Ok(ts)
    }
}
