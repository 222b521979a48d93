//! Capture trees.
//!
//! A successful parse returns an [Ast]: a tree whose leaves are tokens and whose
//!     interior nodes are either maps or lists.
//!
//! - A **map** is produced by a sequence of parsers.
//!     Its children are the results of the sequence's elements.
//!     Labeled children can be looked up by label and labels are unique within a map.
//!
//! - A **list** is produced by repetitions, delimited lists and balanced layers.
//!     Its children are positional.
//!
//! Every node may carry a label, set once.
//! Labeling an already labeled node wraps it in a new map node,
//!     so that both labels are preserved.

use crate::token::stream::TokenStream;
use crate::token::Token;
use std::rc::Rc;

/// The value of a capture tree node.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Token(Token),
    Map(Vec<Ast>),
    List(Vec<Ast>),
}

/// A capture tree node.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    label: Option<Rc<str>>,
    value: Value,
}

/// Error returned when a label appears twice in the same map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateLabel(pub String);

impl Ast {
    pub fn null() -> Ast {
        Ast::default()
    }

    pub fn token(token: Token) -> Ast {
        Ast {
            label: None,
            value: Value::Token(token),
        }
    }

    pub fn map() -> Ast {
        Ast {
            label: None,
            value: Value::Map(Vec::new()),
        }
    }

    pub fn list(items: Vec<Ast>) -> Ast {
        Ast {
            label: None,
            value: Value::List(items),
        }
    }

    /// Returns this node with the label.
    ///
    /// If the node is already labeled it is wrapped in a new map node carrying the new label.
    pub fn labeled(self, label: Rc<str>) -> Ast {
        if self.label.is_none() {
            return Ast {
                label: Some(label),
                ..self
            };
        }
        Ast {
            label: Some(label),
            value: Value::Map(vec![self]),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the token if this is a leaf.
    pub fn as_token(&self) -> Option<&Token> {
        match &self.value {
            Value::Token(token) => Some(token),
            _ => None,
        }
    }

    /// Adds a child to a map node.
    ///
    /// Unlabeled maps are merged into this map and unlabeled null nodes are dropped.
    /// Pushing onto a node that is not a map turns it into a map.
    pub fn push(&mut self, child: Ast) -> Result<(), DuplicateLabel> {
        if child.label.is_none() {
            match child.value {
                Value::Null => return Ok(()),
                Value::Map(children) => {
                    for grandchild in children {
                        self.push(grandchild)?;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }
        if !matches!(self.value, Value::Map(_)) {
            let previous = std::mem::take(&mut self.value);
            self.value = Value::Map(match previous {
                Value::Null => vec![],
                other => vec![Ast {
                    label: None,
                    value: other,
                }],
            });
        }
        let Value::Map(children) = &mut self.value else {
            return Ok(());
        };
        if let Some(label) = child.label() {
            if children.iter().any(|c| c.label() == Some(label)) {
                return Err(DuplicateLabel(label.to_string()));
            }
        }
        children.push(child);
        Ok(())
    }

    /// Returns the child of a map node with the label.
    pub fn get(&self, label: &str) -> Option<&Ast> {
        match &self.value {
            Value::Map(children) => children.iter().find(|c| c.label() == Some(label)),
            _ => None,
        }
    }

    /// Follows a path of labels from this node.
    pub fn path(&self, labels: &[&str]) -> Option<&Ast> {
        labels.iter().try_fold(self, |node, label| node.get(label))
    }

    /// Iterates the node as a list.
    ///
    /// A list node yields its children.
    /// A map or a token yields itself once, and a null node yields nothing.
    pub fn items(&self) -> Box<dyn Iterator<Item = &Ast> + '_> {
        match &self.value {
            Value::Null => Box::new(std::iter::empty()),
            Value::List(items) => Box::new(items.iter()),
            Value::Token(_) | Value::Map(_) => Box::new(std::iter::once(self)),
        }
    }

    /// Returns all of the leaf tokens in order.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    fn collect_tokens<'a>(&'a self, tokens: &mut Vec<&'a Token>) {
        match &self.value {
            Value::Null => {}
            Value::Token(token) => tokens.push(token),
            Value::Map(children) | Value::List(children) => {
                for child in children {
                    child.collect_tokens(tokens);
                }
            }
        }
    }

    /// Returns a stream containing all of the leaf tokens.
    pub fn to_stream(&self) -> TokenStream {
        self.tokens().into_iter().cloned().collect()
    }

    /// Returns whether the node has no tokens at all.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Token(_) => false,
            Value::Map(children) | Value::List(children) => children.iter().all(Ast::is_empty),
        }
    }
}

/// A capture tree node along with its enclosing scopes.
///
/// Lookups that fail in a scope are delegated to the parent scope.
#[derive(Clone, Copy, Debug)]
pub struct Scope<'a> {
    ast: &'a Ast,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn root(ast: &'a Ast) -> Scope<'a> {
        Scope { ast, parent: None }
    }

    /// Creates a child scope.
    pub fn child(&'a self, ast: &'a Ast) -> Scope<'a> {
        Scope {
            ast,
            parent: Some(self),
        }
    }

    pub fn ast(&self) -> &'a Ast {
        self.ast
    }

    /// Finds the node bound to the label.
    ///
    /// The scope's own node matches if it carries the label;
    ///     then its children are searched; then the parent scope.
    pub fn lookup(&self, label: &str) -> Option<&'a Ast> {
        if self.ast.label() == Some(label) {
            return Some(self.ast);
        }
        if let Some(ast) = self.ast.get(label) {
            return Some(ast);
        }
        self.parent.and_then(|parent| parent.lookup(label))
    }
}
