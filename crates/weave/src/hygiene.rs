//! Macro hygiene.
//!
//! Two mechanisms keep macro expansion well behaved.
//!
//! **Blue paint.**
//! Every token carries a [BlueContext]: the set of ids of the macros whose expansion produced it.
//! Before a macro expands, the paint of every token in the matched span is unioned.
//! If the macro's own id is in the union, and the macro is not tagged `·recursive`,
//!     the match is rejected and scanning continues.
//! After expansion every produced token is painted with the union plus the macro's id.
//! This is what stops `macro { foo } >> { foo bar }` from expanding forever.
//!
//! **Renaming.**
//! Each applied macro gets a fresh id from the [Cycle].
//! Variables in an expansion that are not bound to a capture are renamed with this id,
//!     so that temporaries introduced by two expansions never collide with each other
//!     or with variables at the call site.

use crate::directive;
use crate::token::{Kind, Token};
use rand::Rng;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Set of macro ids attached to a token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlueContext(Option<Rc<BTreeSet<directive::Id>>>);

impl BlueContext {
    /// Unions the paint of all of the tokens.
    pub fn of<'a, I: IntoIterator<Item = &'a Token>>(tokens: I) -> BlueContext {
        let mut blue = BlueContext::default();
        for token in tokens {
            blue.union(token.blue());
        }
        blue
    }

    pub fn contains(&self, id: directive::Id) -> bool {
        self.0.as_ref().is_some_and(|ids| ids.contains(&id))
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_ref().map_or(true, |ids| ids.is_empty())
    }

    pub fn insert(&mut self, id: directive::Id) {
        Rc::make_mut(self.0.get_or_insert_with(Default::default)).insert(id);
    }

    pub fn union(&mut self, other: &BlueContext) {
        let Some(other_ids) = &other.0 else {
            return;
        };
        if self.0.is_none() {
            self.0 = Some(other_ids.clone());
            return;
        }
        if let Some(ids) = &mut self.0 {
            if !Rc::ptr_eq(ids, other_ids) {
                Rc::make_mut(ids).extend(other_ids.iter().copied());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = directive::Id> + '_ {
        self.0.iter().flat_map(|ids| ids.iter().copied())
    }
}

/// Source of expansion ids for one expansion cycle.
///
/// An id is the cycle's salt followed by a counter that is bumped for every applied macro.
/// The salt is random unless one is configured, in which case ids are deterministic.
#[derive(Debug)]
pub struct Cycle {
    salt: String,
    counter: u64,
}

impl Cycle {
    pub fn new(salt: Option<&str>) -> Cycle {
        let salt = match salt {
            Some(salt) => salt.to_string(),
            None => format!["{:08x}", rand::thread_rng().gen::<u32>()],
        };
        Cycle { salt, counter: 0 }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Bumps the counter and returns the new id.
    pub fn advance(&mut self) -> String {
        self.counter += 1;
        self.id()
    }

    /// The current id.
    pub fn id(&self) -> String {
        format!["{}{}", self.salt, self.counter]
    }
}

/// Renames a variable with an expansion id. Tokens of other kinds are returned unchanged.
pub fn rename(token: &Token, id: &str) -> Token {
    if token.kind() != Kind::Variable {
        return token.clone();
    }
    Token::new(Kind::Variable, format!["{}__{}", token.text(), id]).with_line(token.line())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn painted(ids: &[u32]) -> Token {
        let mut blue = BlueContext::default();
        for id in ids {
            blue.insert(directive::Id::new(*id));
        }
        Token::identifier("x").painted(blue)
    }

    #[test]
    fn union_of_tokens() {
        let tokens = vec![painted(&[1]), painted(&[]), painted(&[2, 3])];
        let blue = BlueContext::of(&tokens);
        let ids: Vec<u32> = blue.iter().map(|id| id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(blue.contains(directive::Id::new(2)));
        assert!(!blue.contains(directive::Id::new(4)));
    }

    #[test]
    fn insert_does_not_leak_into_shared_paint() {
        let token = painted(&[1]);
        let mut blue = token.blue().clone();
        blue.insert(directive::Id::new(2));
        assert!(!token.blue().contains(directive::Id::new(2)));
    }

    #[test]
    fn empty_paint() {
        assert!(BlueContext::default().is_empty());
        assert!(BlueContext::of(&[Token::identifier("a")]).is_empty());
    }

    #[test]
    fn cycle_ids() {
        let mut cycle = Cycle::new(Some("s"));
        assert_eq!(cycle.id(), "s0");
        assert_eq!(cycle.advance(), "s1");
        assert_eq!(cycle.advance(), "s2");
    }

    #[test]
    fn random_salts_differ() {
        let salts: BTreeSet<String> = (0..8).map(|_| Cycle::new(None).salt().to_string()).collect();
        assert!(salts.len() > 1);
    }

    #[test]
    fn rename_variables_only() {
        let renamed = rename(&Token::new(Kind::Variable, "$tmp"), "s1");
        assert_eq!(renamed.text(), "$tmp__s1");
        let ident = rename(&Token::identifier("tmp"), "s1");
        assert_eq!(ident.text(), "tmp");
    }
}
