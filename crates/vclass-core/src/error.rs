//! Error types for the virtual classroom read path.
//!
//! Every failure is classified into one of three kinds:
//!
//! - **Invalid argument**: a required request field is missing or malformed,
//!   detected before any I/O (exit code 1)
//! - **Deadline exceeded**: the request-scoped timeout elapsed (exit code 2)
//! - **Internal**: storage, configuration or feature-flag failures (exit code 3)
//!
//! Wrapping an error with [`ResultExt::context`] records the operation and the
//! parameters that produced it without changing its kind.

use std::fmt;

/// Coarse classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    DeadlineExceeded,
    Internal,
}

impl ErrorKind {
    /// Process exit code for this kind of failure.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InvalidArgument => 1,
            Self::DeadlineExceeded => 2,
            Self::Internal => 3,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required request field is missing or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A storage query failed
    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A stored row could not be mapped onto the domain model
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// The feature-flag service could not evaluate a flag
    #[error("feature flag '{flag}' could not be evaluated: {reason}")]
    FeatureFlag { flag: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(String),

    /// The request-scoped deadline elapsed before the operation finished
    #[error("{operation} exceeded its deadline of {timeout_ms}ms")]
    DeadlineExceeded {
        operation: &'static str,
        timeout_ms: u128,
    },

    /// Another error annotated with the operation that produced it
    #[error("{operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Build a closure suitable for `map_err` on sqlx results.
    pub fn database(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { operation, source }
    }

    /// Classify the error, looking through any context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Context { source, .. } => source.kind(),
            Self::Database { .. }
            | Self::InvalidData(_)
            | Self::FeatureFlag { .. }
            | Self::InvalidConfig(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// The innermost error beneath all context wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Annotate errors with the operation (and parameters) that produced them.
pub trait ResultExt<T> {
    fn context(self, operation: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`] but only builds the message on failure.
    fn with_context<F, S>(self, operation: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Context {
            operation: operation.into(),
            source: Box::new(source),
        })
    }

    fn with_context<F, S>(self, operation: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| Error::Context {
            operation: operation().into(),
            source: Box::new(source),
        })
    }
}
