//! Error types for shell-syntax decoding, encoding and command interpretation.

use std::fmt;

use thiserror::Error;

/// The class of a [`ParseFailure`], named after the script error it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The text is not valid expression syntax.
    Syntax,
    /// The text references an identifier outside the whitelist.
    Reference,
    /// A whitelisted binding was called with arguments it cannot accept.
    Type,
}

impl FailureKind {
    fn label(self) -> &'static str {
        match self {
            FailureKind::Syntax => "SyntaxError",
            FailureKind::Reference => "ReferenceError",
            FailureKind::Type => "TypeError",
        }
    }
}

/// A failure to turn text into a value. Position is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub kind: FailureKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (line {}, column {})",
            self.kind.label(),
            self.message,
            self.line,
            self.column
        )
    }
}

/// Errors that can occur while decoding, encoding or interpreting shell text.
#[derive(Error, Debug)]
pub enum ShellError {
    /// Malformed literal or expression text, or a whitelist violation.
    #[error("{0}")]
    Parse(ParseFailure),

    /// A method name the interpreter does not know.
    #[error("UnsupportedOperation: {target}.{name}() is not supported")]
    UnsupportedOperation { target: String, name: String },

    /// A modifier applied where the chain does not allow it.
    #[error("InvalidChainState: {0}")]
    InvalidChainState(String),

    /// A 64-bit integer or decimal value could not be represented exactly.
    #[error("PrecisionLoss: {0}")]
    PrecisionLoss(String),

    /// A `$`-wrapper in Extended JSON input had the wrong shape.
    #[error("Invalid Extended JSON: {0}")]
    ExtendedJson(String),

    /// The input string was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShellError {
    pub(crate) fn failure(
        kind: FailureKind,
        message: impl Into<String>,
        (line, column): (usize, usize),
    ) -> Self {
        ShellError::Parse(ParseFailure {
            kind,
            message: message.into(),
            line,
            column,
        })
    }

    /// The failure class, if this is a [`ShellError::Parse`].
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ShellError::Parse(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

/// Convenience alias used throughout ejson-core.
pub type Result<T> = std::result::Result<T, ShellError>;
