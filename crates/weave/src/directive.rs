//! Directives and the directive registry.
//!
//! A directive is either a macro or an ignore rule.
//! Both are declared in the source being expanded:
//!
//! ```text
//! macro ·global { swap(variable·a, variable·b) } >> { (variable·a, variable·b) = [variable·b, variable·a] }
//! ignore { (···body) }
//! ```
//!
//! When the engine reaches a token, it looks up the directives that can start with
//!     that token in the [Registry] and tries them in order.
//! A macro that matches replaces the matched tokens with its expansion.
//! An ignore rule that matches makes the engine skip the matched tokens.

use crate::engine::Context;
use crate::error::{self, OperationKind, UndefinedNameError};
use crate::expander::ExpansionInput;
use crate::expansion::Expansion;
use crate::hygiene::BlueContext;
use crate::parse::Failure;
use crate::pattern::Pattern;
use crate::token::stream::TokenStream;
use crate::token::{Kind, Token};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identifier of a directive.
///
/// Ids are handed out in declaration order, so comparing ids compares declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    pub fn new(id: u32) -> Id {
        Id(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const TAG_NAMES: [&str; 4] = ["global", "recursive", "grammar", "unsafe"];

/// Tags of a macro, written as `·name` after the `macro` keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tags {
    /// The macro is visible in every later expansion cycle of the engine.
    pub global: bool,
    /// The macro may match tokens produced by its own expansion.
    pub recursive: bool,
    /// The pattern is a grammar.
    pub grammar: bool,
    /// Free variables in the expansion are not renamed.
    pub unsafe_: bool,
}

impl Tags {
    /// Builds the tags from the tag name tokens.
    pub fn from_tokens<'a, I: IntoIterator<Item = &'a Token>>(tokens: I) -> error::Result<Tags> {
        let mut tags = Tags::default();
        for token in tokens {
            let flag = match token.text() {
                "global" => &mut tags.global,
                "recursive" => &mut tags.recursive,
                "grammar" => &mut tags.grammar,
                "unsafe" => &mut tags.unsafe_,
                _ => {
                    return Err(UndefinedNameError::new(token.clone(), "macro tag", TAG_NAMES).into())
                }
            };
            *flag = true;
        }
        Ok(tags)
    }
}

/// A macro: a pattern and the expansion that replaces its matches.
#[derive(Debug)]
pub struct Macro {
    id: Id,
    tags: Tags,
    pattern: Pattern,
    expansion: Expansion,
}

impl Macro {
    pub fn new(id: Id, tags: Tags, pattern: Pattern, expansion: Expansion) -> Macro {
        Macro {
            id,
            tags,
            pattern,
            expansion,
        }
    }

    pub fn tags(&self) -> Tags {
        self.tags
    }

    pub fn expansion(&self) -> &Expansion {
        &self.expansion
    }
}

/// An ignore rule: tokens matching the pattern are passed over by the engine.
#[derive(Debug)]
pub struct IgnoreRule {
    id: Id,
    pattern: Pattern,
}

impl IgnoreRule {
    pub fn new(id: Id, pattern: Pattern) -> IgnoreRule {
        IgnoreRule { id, pattern }
    }
}

#[derive(Debug)]
pub enum Directive {
    Macro(Macro),
    Ignore(IgnoreRule),
}

/// Result of trying a directive at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pattern did not match. The cursor is unchanged.
    NoMatch,
    /// The pattern matched tokens painted by this macro. The cursor is unchanged.
    Rejected,
    /// The match was replaced by the expansion.
    /// The cursor is on the first token of the expansion,
    ///     or on the token after the match if the expansion is empty.
    Expanded,
    /// An ignore rule matched. The cursor is just after the match.
    Ignored,
}

impl Directive {
    pub fn id(&self) -> Id {
        match self {
            Directive::Macro(m) => m.id,
            Directive::Ignore(rule) => rule.id,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        match self {
            Directive::Macro(m) => &m.pattern,
            Directive::Ignore(rule) => &rule.pattern,
        }
    }

    pub fn specificity(&self) -> usize {
        self.pattern().specificity()
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Directive::Macro(m) if m.tags.global)
    }

    /// Tries the directive at the cursor, which must be on a significant token.
    pub(crate) fn apply(&self, ts: &mut TokenStream, cx: &mut Context) -> error::Result<Outcome> {
        let start = ts.index();
        let Some(first) = ts.current().cloned() else {
            return Ok(Outcome::NoMatch);
        };
        let ast = match self.pattern().parser().parse(ts) {
            Ok(ast) => ast,
            Err(Failure::Error(_)) => {
                ts.jump(start);
                return Ok(Outcome::NoMatch);
            }
            Err(Failure::Halt(err)) => {
                return Err(err.propagate(OperationKind::Expansion, first));
            }
        };
        if ts.index() == start {
            return Ok(Outcome::NoMatch);
        }
        ts.unskip();
        let end = ts.index();
        let m = match self {
            Directive::Ignore(rule) => {
                tracing::trace!(id = %rule.id, token = first.text(), "ignoring tokens");
                return Ok(Outcome::Ignored);
            }
            Directive::Macro(m) => m,
        };
        let mut blue = BlueContext::of(ts.tokens_between(start, end));
        if blue.contains(m.id) && !m.tags.recursive {
            tracing::trace!(id = %m.id, token = first.text(), "rejected by hygiene");
            ts.jump(start);
            return Ok(Outcome::Rejected);
        }
        ts.extract(start, end);
        let cycle_id = cx.cycle.advance();
        tracing::trace!(id = %m.id, cycle_id = %cycle_id, line = first.line(), "expanding macro");
        let mut input = ExpansionInput::new(
            cx.resources,
            cx.registry,
            cycle_id,
            cx.depth,
            m.id,
            first.clone(),
        );
        let mut output = m
            .expansion
            .expand(&ast, &mut input)
            .map_err(|err| err.propagate(OperationKind::Expansion, first))?;
        blue.insert(m.id);
        output.paint(&blue);
        ts.inject(output);
        Ok(Outcome::Expanded)
    }
}

/// Index of directives by the tokens they can start with.
///
/// Each directive is stored under every literal value and every token kind in its pattern's
///     expected set.
/// Every bucket is sorted from the most to the least specific directive,
///     with ties broken by declaration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    by_literal: HashMap<String, Vec<Rc<Directive>>>,
    by_kind: HashMap<Kind, Vec<Rc<Directive>>>,
    len: usize,
}

impl Registry {
    pub fn insert(&mut self, directive: Rc<Directive>) {
        let mut literals: Vec<String> = vec![];
        let mut kinds: Vec<Kind> = vec![];
        for token in directive.pattern().expected().iter() {
            match token.value() {
                Some(value) => {
                    if !literals.iter().any(|l| l == value) {
                        literals.push(value.to_string());
                    }
                }
                None => {
                    if !kinds.contains(&token.kind()) {
                        kinds.push(token.kind());
                    }
                }
            }
        }
        for literal in literals {
            insert_sorted(self.by_literal.entry(literal).or_default(), &directive);
        }
        for kind in kinds {
            insert_sorted(self.by_kind.entry(kind).or_default(), &directive);
        }
        self.len += 1;
    }

    /// Returns the directives to try at the token, in order.
    ///
    /// If the token's value is indexed, the directives indexed under the value are returned.
    /// Otherwise the directives indexed under the token's kind are returned.
    pub fn candidates(&self, token: &Token) -> Vec<Rc<Directive>> {
        self.by_literal
            .get(token.text())
            .or_else(|| self.by_kind.get(&token.kind()))
            .cloned()
            .unwrap_or_default()
    }

    /// The number of directives in the registry.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn insert_sorted(bucket: &mut Vec<Rc<Directive>>, directive: &Rc<Directive>) {
    bucket.push(directive.clone());
    bucket.sort_by_key(|d| (Reverse(d.specificity()), d.id()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::registry::built_in_parsers;
    use crate::token::lexer;

    fn ignore_rule(id: u32, pattern: &str) -> Rc<Directive> {
        let tokens = lexer::tokenize(pattern).unwrap();
        let pattern = Pattern::compile(&tokens, &built_in_parsers(), false).unwrap();
        Rc::new(Directive::Ignore(IgnoreRule::new(Id::new(id), pattern)))
    }

    fn ids(directives: Vec<Rc<Directive>>) -> Vec<u32> {
        directives.iter().map(|d| d.id().get()).collect()
    }

    #[test]
    fn tags_from_tokens() {
        let tokens = vec![Token::identifier("global"), Token::identifier("unsafe")];
        let tags = Tags::from_tokens(&tokens).unwrap();
        assert_eq!(
            tags,
            Tags {
                global: true,
                unsafe_: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn unknown_tag() {
        let tokens = vec![Token::identifier("globl")];
        let err = Tags::from_tokens(&tokens).unwrap_err();
        assert_eq!(err.title(), "undefined macro tag `globl`");
    }

    #[test]
    fn candidates_are_ordered_by_specificity_then_id() {
        let mut registry = Registry::default();
        registry.insert(ignore_rule(1, "a"));
        registry.insert(ignore_rule(2, "a b c"));
        registry.insert(ignore_rule(3, "a b"));
        registry.insert(ignore_rule(4, "a"));
        assert_eq!(ids(registry.candidates(&Token::identifier("a"))), vec![2, 3, 1, 4]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn literal_index_takes_precedence_over_kind_index() {
        let mut registry = Registry::default();
        registry.insert(ignore_rule(1, "ident·x"));
        registry.insert(ignore_rule(2, "foo"));
        assert_eq!(ids(registry.candidates(&Token::identifier("foo"))), vec![2]);
        assert_eq!(ids(registry.candidates(&Token::identifier("bar"))), vec![1]);
        assert!(registry.candidates(&Token::char(';')).is_empty());
    }

    #[test]
    fn directive_is_indexed_under_every_entry_token() {
        let mut registry = Registry::default();
        registry.insert(ignore_rule(1, "·either('a', 'b', integer)"));
        for token in [Token::identifier("a"), Token::identifier("b"), Token::new(Kind::Integer, "7")] {
            assert_eq!(ids(registry.candidates(&token)), vec![1]);
        }
    }
}
