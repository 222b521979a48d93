//! Token streams.
//!
//! A [TokenStream] is a doubly linked list of tokens with a cursor.
//! The nodes live in an arena owned by the stream and the list is bounded by
//!     two sentinel nodes that never hold tokens.
//! This gives O(1) cursor movement, O(1) save/restore of the cursor through
//!     [Position] handles, and splicing that costs O(1) per moved node.
//!
//! Positions are opaque handles to nodes.
//! A position stays valid while its node is in the stream,
//!     even if other regions of the stream are extracted or injected.
//!
//! There are two families of cursor operations:
//!
//! - [step](TokenStream::step) and [back](TokenStream::back) move one node at a time.
//!
//! - [next](TokenStream::next), [previous](TokenStream::previous),
//!     [skip](TokenStream::skip) and [unskip](TokenStream::unskip)
//!     pass over skippable tokens (whitespace and comments).
//!
//! Moving past a sentinel is not an error: the cursor stays on the sentinel
//!     and [current](TokenStream::current) returns [None].

use super::Token;
use crate::hygiene::BlueContext;
use std::fmt;

type NodeId = usize;

const START: NodeId = 0;
const END: NodeId = 1;

#[derive(Clone, Debug)]
struct Node {
    token: Option<Token>,
    prev: NodeId,
    next: NodeId,
}

/// Handle to a node of a [TokenStream].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position(NodeId);

/// A doubly linked list of tokens with a cursor.
#[derive(Clone, Debug)]
pub struct TokenStream {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    current: NodeId,
    len: usize,
}

impl Default for TokenStream {
    fn default() -> Self {
        TokenStream::new()
    }
}

impl TokenStream {
    /// Creates a new empty stream.
    pub fn new() -> TokenStream {
        let sentinel = Node {
            token: None,
            prev: START,
            next: END,
        };
        TokenStream {
            nodes: vec![sentinel.clone(), sentinel],
            free: Vec::new(),
            current: END,
            len: 0,
        }
    }

    /// Lexes the source code with the default lexer and returns the resulting stream.
    pub fn from_source(source: &str) -> crate::error::Result<TokenStream> {
        Ok(super::lexer::tokenize(source)?.into_iter().collect())
    }

    fn alloc(&mut self, token: Token) -> NodeId {
        let node = Node {
            token: Some(token),
            prev: START,
            next: END,
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn link_after(&mut self, at: NodeId, id: NodeId) {
        let next = self.nodes[at].next;
        self.nodes[id].prev = at;
        self.nodes[id].next = next;
        self.nodes[at].next = id;
        self.nodes[next].prev = id;
        self.len += 1;
    }

    fn unlink(&mut self, id: NodeId) -> Option<Token> {
        let (prev, next) = (self.nodes[id].prev, self.nodes[id].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.free.push(id);
        self.len -= 1;
        self.nodes[id].token.take()
    }

    fn first(&self) -> NodeId {
        self.nodes[START].next
    }

    /// Appends a token to the end of the stream. The cursor does not move.
    pub fn push(&mut self, token: Token) {
        let id = self.alloc(token);
        let last = self.nodes[END].prev;
        self.link_after(last, id);
    }

    /// Appends every token of the other stream to the end of this stream. The cursor does not move.
    pub fn append(&mut self, other: TokenStream) {
        for token in other {
            self.push(token);
        }
    }

    /// Returns the token at the cursor, or [None] if the cursor is on a sentinel.
    pub fn current(&self) -> Option<&Token> {
        self.nodes[self.current].token.as_ref()
    }

    /// Returns the token before the cursor.
    pub fn peek_back(&self) -> Option<&Token> {
        let prev = self.nodes[self.current].prev;
        self.nodes[prev].token.as_ref()
    }

    /// Moves the cursor one node forward.
    pub fn step(&mut self) -> Option<&Token> {
        if self.current != END {
            self.current = self.nodes[self.current].next;
        }
        self.current()
    }

    /// Moves the cursor one node backward.
    pub fn back(&mut self) -> Option<&Token> {
        if self.current != START {
            self.current = self.nodes[self.current].prev;
        }
        self.current()
    }

    /// Moves the cursor forward past any skippable tokens.
    pub fn skip(&mut self) -> Option<&Token> {
        while self.current().is_some_and(Token::skippable) {
            self.current = self.nodes[self.current].next;
        }
        self.current()
    }

    /// Moves the cursor backward while the token before it is skippable.
    ///
    /// After a successful match the cursor sits on the first significant token after the match;
    ///     this moves it back to the first skippable token after the match.
    pub fn unskip(&mut self) {
        loop {
            let prev = self.nodes[self.current].prev;
            match &self.nodes[prev].token {
                Some(token) if token.skippable() => self.current = prev,
                _ => return,
            }
        }
    }

    /// Moves the cursor forward one node and then past any skippable tokens.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Token> {
        self.step();
        self.skip()
    }

    /// Moves the cursor backward one node and then backward past any skippable tokens.
    pub fn previous(&mut self) -> Option<&Token> {
        self.back();
        while self.current().is_some_and(Token::skippable) {
            self.current = self.nodes[self.current].prev;
        }
        self.current()
    }

    /// Returns the position of the cursor.
    pub fn index(&self) -> Position {
        Position(self.current)
    }

    /// Moves the cursor to the position.
    pub fn jump(&mut self, position: Position) {
        debug_assert!(
            position.0 == START || position.0 == END || self.nodes[position.0].token.is_some(),
            "jump to a position that is no longer in the stream"
        );
        self.current = position.0;
    }

    /// Moves the cursor to the first token, or to the end sentinel if the stream is empty.
    pub fn reset(&mut self) {
        self.current = self.first();
    }

    /// Returns whether the cursor is on the end sentinel.
    pub fn is_at_end(&self) -> bool {
        self.current == END
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Removes the half-open range `[from, to)` and returns it as a new stream.
    ///
    /// The cursor is left on the node before `from`.
    pub fn extract(&mut self, from: Position, to: Position) -> TokenStream {
        let mut id = if from.0 == START {
            self.first()
        } else {
            from.0
        };
        let before = self.nodes[id].prev;
        let mut extracted = TokenStream::new();
        while id != to.0 && id != END {
            let next = self.nodes[id].next;
            if let Some(token) = self.unlink(id) {
                extracted.push(token);
            }
            id = next;
        }
        self.current = before;
        extracted.reset();
        extracted
    }

    /// Splices the other stream's tokens in right after the cursor.
    ///
    /// If the cursor is on the end sentinel the tokens are spliced in before it.
    /// The cursor moves to the first injected token,
    ///     or to the node after the insertion point if the other stream is empty.
    pub fn inject(&mut self, other: TokenStream) {
        let mut at = if self.current == END {
            self.nodes[END].prev
        } else {
            self.current
        };
        let follow = self.nodes[at].next;
        let mut first = None;
        for token in other {
            let id = self.alloc(token);
            self.link_after(at, id);
            first.get_or_insert(id);
            at = id;
        }
        self.current = first.unwrap_or(follow);
    }

    /// Splices the other stream's tokens in at the start of this stream.
    ///
    /// The cursor moves to the first injected token.
    pub fn prepend(&mut self, other: TokenStream) {
        self.current = START;
        self.inject(other);
    }

    /// Removes leading and trailing skippable tokens and resets the cursor.
    pub fn trim(&mut self) {
        while self.nodes[self.first()]
            .token
            .as_ref()
            .is_some_and(Token::skippable)
        {
            self.unlink(self.first());
        }
        while self.nodes[self.nodes[END].prev]
            .token
            .as_ref()
            .is_some_and(Token::skippable)
        {
            self.unlink(self.nodes[END].prev);
        }
        self.reset();
    }

    /// Replaces the paint of every token.
    pub fn paint(&mut self, blue: &BlueContext) {
        let mut id = self.first();
        while id != END {
            if let Some(token) = &self.nodes[id].token {
                self.nodes[id].token = Some(token.painted(blue.clone()));
            }
            id = self.nodes[id].next;
        }
    }

    /// Iterator over every token in the stream, independent of the cursor.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stream: self,
            id: self.first(),
            end: END,
        }
    }

    /// Iterator over the tokens in the half-open range `[from, to)`.
    pub fn tokens_between(&self, from: Position, to: Position) -> Iter<'_> {
        Iter {
            stream: self,
            id: from.0,
            end: to.0,
        }
    }

    /// Iterator over the non-skippable tokens.
    pub fn significant(&self) -> impl Iterator<Item = &Token> {
        self.iter().filter(|token| !token.skippable())
    }

    pub fn to_vec(&self) -> Vec<Token> {
        self.iter().cloned().collect()
    }
}

/// Iterator over the tokens of a stream.
pub struct Iter<'a> {
    stream: &'a TokenStream,
    id: NodeId,
    end: NodeId,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        while self.id != self.end && self.id != END {
            let node = &self.stream.nodes[self.id];
            self.id = node.next;
            if let Some(token) = &node.token {
                return Some(token);
            }
        }
        None
    }
}

impl IntoIterator for TokenStream {
    type Item = Token;
    type IntoIter = std::vec::IntoIter<Token>;

    fn into_iter(mut self) -> Self::IntoIter {
        let mut tokens = Vec::with_capacity(self.len);
        let mut id = self.first();
        while id != END {
            let next = self.nodes[id].next;
            if let Some(token) = self.nodes[id].token.take() {
                tokens.push(token);
            }
            id = next;
        }
        tokens.into_iter()
    }
}

impl FromIterator<Token> for TokenStream {
    fn from_iter<T: IntoIterator<Item = Token>>(iter: T) -> Self {
        let mut stream = TokenStream::new();
        for token in iter {
            stream.push(token);
        }
        stream.reset();
        stream
    }
}

impl From<Vec<Token>> for TokenStream {
    fn from(tokens: Vec<Token>) -> Self {
        tokens.into_iter().collect()
    }
}

impl fmt::Display for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in self.iter() {
            write!(f, "{}", token.text())?;
        }
        Ok(())
    }
}
