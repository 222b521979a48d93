//! Error handling
//!
//! Every fallible operation in Weave returns a [`Box<Error>`](Error) on failure.
//! An error is either a root error, described by a type implementing [WeaveError],
//!     or a propagated error that adds context like "while expanding this macro".
//!
//! Errors do not hold the source code.
//! The engine pairs an error with the source code at the top level to build a [TracedError],
//!     whose [Display](std::fmt::Display) implementation renders the full report.

pub mod display;

use crate::token::Token;
use weave_stdext::suggest;

/// Result type used throughout Weave.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// The type of an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Kind {
    /// An error at a particular token.
    Token(Token),
    /// An error at a line of the source that has no token, for example a lexing error.
    Line(u32),
    /// The input ended prematurely.
    EndOfInput,
    /// Some condition does not hold that is not tied to a specific token.
    FailedPrecondition,
}

/// Implementations of this trait describe an error in source code or in a macro.
pub trait WeaveError: std::fmt::Debug + 'static {
    fn kind(&self) -> Kind;

    fn title(&self) -> String;

    fn notes(&self) -> Vec<display::Note> {
        vec![]
    }

    fn source_annotation(&self) -> String {
        match self.kind() {
            Kind::Token(token) => format!["unexpected {}", token.describe()],
            Kind::Line(_) => "error occurred on this line".into(),
            Kind::EndOfInput => "input ended here".into(),
            Kind::FailedPrecondition => "error occurred here".into(),
        }
    }
}

/// An error in Weave.
#[derive(Debug)]
pub enum Error {
    Root(Box<dyn WeaveError>),
    Propagated(PropagatedError),
}

/// An error with additional context.
#[derive(Debug)]
pub struct PropagatedError {
    pub context: OperationKind,
    pub token: Token,
    pub error: Box<Error>,
}

/// The operation that was running when an error occurred.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Declaration,
    Expansion,
    Expander,
}

impl OperationKind {
    pub fn action(&self) -> &'static str {
        match self {
            OperationKind::Declaration => "declaring this macro",
            OperationKind::Expansion => "expanding this macro",
            OperationKind::Expander => "running this expander",
        }
    }
}

impl Error {
    pub fn new<E: WeaveError>(error: E) -> Box<Error> {
        Box::new(Error::Root(Box::new(error)))
    }

    /// Adds context to the error.
    pub fn propagate(self: Box<Error>, context: OperationKind, token: Token) -> Box<Error> {
        Box::new(Error::Propagated(PropagatedError {
            context,
            token,
            error: self,
        }))
    }

    /// Returns the root error along with the context frames, outermost first.
    pub fn stack_view(&self) -> (Vec<&PropagatedError>, &dyn WeaveError) {
        let mut stack = vec![];
        let mut error = self;
        loop {
            match error {
                Error::Root(root) => return (stack, root.as_ref()),
                Error::Propagated(propagated) => {
                    stack.push(propagated);
                    error = &propagated.error;
                }
            }
        }
    }

    pub fn root(&self) -> &dyn WeaveError {
        self.stack_view().1
    }

    pub fn title(&self) -> String {
        self.root().title()
    }
}

impl<T: WeaveError> From<T> for Box<Error> {
    fn from(error: T) -> Self {
        Error::new(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root = self.root();
        write!(f, "{}", root.title())?;
        if let Kind::Token(token) = root.kind() {
            if let Some(line) = token.line() {
                write!(f, " (line {line})")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// An error along with the source code it occurred in.
#[derive(Debug)]
pub struct TracedError {
    pub error: Box<Error>,
    pub file_name: String,
    pub source: String,
}

impl TracedError {
    pub fn new(error: Box<Error>, file_name: &str, source: &str) -> TracedError {
        TracedError {
            error,
            file_name: file_name.to_string(),
            source: source.to_string(),
        }
    }
}

impl std::fmt::Display for TracedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display::format_error(f, self)
    }
}

impl std::error::Error for TracedError {}

/// Error at a token with a fixed title.
#[derive(Debug)]
pub struct SimpleTokenError {
    pub token: Token,
    pub title: String,
    pub text_notes: Vec<String>,
}

impl SimpleTokenError {
    /// Create a new simple token error.
    pub fn new<T: AsRef<str>>(token: Token, title: T) -> SimpleTokenError {
        SimpleTokenError {
            token,
            title: title.as_ref().into(),
            text_notes: vec![],
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Self {
        self.text_notes.push(note.into());
        self
    }
}

impl WeaveError for SimpleTokenError {
    fn kind(&self) -> Kind {
        Kind::Token(self.token.clone())
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<display::Note> {
        self.text_notes.iter().map(Into::into).collect()
    }

    fn source_annotation(&self) -> String {
        "".into()
    }
}

/// Error that is not tied to a specific token.
#[derive(Debug)]
pub struct SimpleFailedPreconditionError {
    pub title: String,
    pub text_notes: Vec<String>,
}

impl SimpleFailedPreconditionError {
    /// Create a new simple failed precondition error.
    pub fn new<T: AsRef<str>>(title: T) -> Self {
        Self {
            title: title.as_ref().into(),
            text_notes: vec![],
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Self {
        self.text_notes.push(note.into());
        self
    }
}

impl WeaveError for SimpleFailedPreconditionError {
    fn kind(&self) -> Kind {
        Kind::FailedPrecondition
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<display::Note> {
        self.text_notes.iter().map(Into::into).collect()
    }
}

/// Concrete error for the case when a name does not refer to anything.
///
/// This is returned for unknown nested parsers, expanders, token kinds and grammar rules.
#[derive(Debug)]
pub struct UndefinedNameError {
    /// The token containing the undefined name.
    pub token: Token,
    /// What the name was supposed to refer to, for example "expander".
    pub what: &'static str,
    /// A defined name that is spelled similarly.
    pub close_name: Option<String>,
}

impl UndefinedNameError {
    pub fn new<'a, I>(token: Token, what: &'static str, names: I) -> UndefinedNameError
    where
        I: IntoIterator<Item = &'a str>,
    {
        let close_name = suggest::closest(names, token.text()).map(str::to_string);
        UndefinedNameError {
            token,
            what,
            close_name,
        }
    }
}

impl WeaveError for UndefinedNameError {
    fn kind(&self) -> Kind {
        Kind::Token(self.token.clone())
    }

    fn title(&self) -> String {
        format!["undefined {} `{}`", self.what, self.token.text()]
    }

    fn notes(&self) -> Vec<display::Note> {
        let mut notes: Vec<display::Note> = Default::default();
        use weave_stdext::color::Colorize;
        if let Some(close_name) = &self.close_name {
            notes.push(format!["did you mean `{}`?", close_name.as_str().bold()].into());
        }
        notes
    }

    fn source_annotation(&self) -> String {
        format!["undefined {}", self.what]
    }
}
