//! Error Handling
//!
//! Every failure the binding layer can report is one [`Error`] variant.
//! Engine status codes are translated 1:1 by [`Error::from_status`], so host
//! code never sees a raw status code.
//!
//! Errors raised inside a host callable travel the other way: the callable
//! boundary renders them (or a panic payload, via [`format_panic_payload`])
//! into a message and hands it to the engine's own error mechanism.

use crate::stack::Status;
use std::any::Any;
use std::fmt;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A binding-layer failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A decode asked for a host type the stack value cannot become
    IncorrectType {
        /// What the decoder wanted (e.g. "number", "2 arguments")
        expected: String,
        /// What was actually there (e.g. "string", "3 arguments")
        found: String,
    },
    /// The engine failed while running script code
    Runtime(String),
    /// Source text did not parse
    Syntax(String),
    /// The engine ran out of memory
    Memory(String),
    /// The engine's message handler itself failed
    ErrorHandler(String),
    /// A script file could not be opened or read
    File(String),
}

impl Error {
    /// Build an `IncorrectType` error
    pub fn incorrect_type(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::IncorrectType {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Translate a non-success engine status into its error kind
    ///
    /// `message` is the error value the engine left on the stack.
    /// A status that is not an error (or is unknown) is reported as a
    /// runtime failure, since the engine still refused the operation.
    pub fn from_status(status: Status, message: String) -> Self {
        match status {
            Status::Syntax => Error::Syntax(message),
            Status::Memory => Error::Memory(message),
            Status::ErrorHandler => Error::ErrorHandler(message),
            Status::File => Error::File(message),
            Status::Ok | Status::Yield | Status::Runtime | Status::Unknown(_) => {
                Error::Runtime(message)
            }
        }
    }

    /// Annotate a nested decode failure with the aggregate field it came from
    pub fn at_field(self, field: &str) -> Self {
        match self {
            Error::IncorrectType { expected, found } => Error::IncorrectType {
                expected: format!("{expected} at field `{field}`"),
                found,
            },
            other => other,
        }
    }

    /// Annotate a nested decode failure with the 1-based table position it came from
    pub fn at_position(self, position: usize) -> Self {
        match self {
            Error::IncorrectType { expected, found } => Error::IncorrectType {
                expected: format!("{expected} at position {position}"),
                found,
            },
            other => other,
        }
    }

    /// Annotate a host-callable argument failure with its 1-based argument number
    pub fn at_argument(self, argument: usize) -> Self {
        match self {
            Error::IncorrectType { expected, found } => Error::IncorrectType {
                expected: format!("{expected} for argument #{argument}"),
                found,
            },
            other => other,
        }
    }

    /// True for errors produced by the host-side codec rather than the engine
    pub fn is_incorrect_type(&self) -> bool {
        matches!(self, Error::IncorrectType { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IncorrectType { expected, found } => {
                write!(f, "incorrect type: expected {}, found {}", expected, found)
            }
            Error::Runtime(msg) => write!(f, "runtime error: {}", msg),
            Error::Syntax(msg) => write!(f, "syntax error: {}", msg),
            Error::Memory(msg) => write!(f, "memory error: {}", msg),
            Error::ErrorHandler(msg) => write!(f, "error in error handler: {}", msg),
            Error::File(msg) => write!(f, "file error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Format a panic payload into an error message
pub fn format_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let msg = || "boom".to_string();
        assert_eq!(
            Error::from_status(Status::Runtime, msg()),
            Error::Runtime("boom".into())
        );
        assert_eq!(
            Error::from_status(Status::Syntax, msg()),
            Error::Syntax("boom".into())
        );
        assert_eq!(
            Error::from_status(Status::Memory, msg()),
            Error::Memory("boom".into())
        );
        assert_eq!(
            Error::from_status(Status::ErrorHandler, msg()),
            Error::ErrorHandler("boom".into())
        );
        assert_eq!(
            Error::from_status(Status::File, msg()),
            Error::File("boom".into())
        );
        assert_eq!(
            Error::from_status(Status::Unknown(42), msg()),
            Error::Runtime("boom".into())
        );
    }

    #[test]
    fn test_annotations_only_touch_type_errors() {
        let err = Error::incorrect_type("number", "nil").at_field("biz");
        assert_eq!(
            err.to_string(),
            "incorrect type: expected number at field `biz`, found nil"
        );

        let err = Error::incorrect_type("boolean", "string").at_position(2);
        assert_eq!(
            err.to_string(),
            "incorrect type: expected boolean at position 2, found string"
        );

        let err = Error::incorrect_type("string", "number").at_argument(1);
        assert_eq!(
            err.to_string(),
            "incorrect type: expected string for argument #1, found number"
        );

        let err = Error::Runtime("x".into()).at_field("biz");
        assert_eq!(err, Error::Runtime("x".into()));
    }

    #[test]
    fn test_format_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("panic message");
        assert_eq!(format_panic_payload(&*payload), "panic message");

        let payload: Box<dyn Any + Send> = Box::new("owned panic".to_string());
        assert_eq!(format_panic_payload(&*payload), "owned panic");

        let payload: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(format_panic_payload(&*payload), "unknown panic");
    }
}
