//! Error types for Sanduq container operations.
//!
//! Every condition the container raises for its own contract has a
//! distinct variant. Errors produced by user code (factories and injected
//! functions) pass through [`Error::Failed`] untouched.

use std::fmt;

use sanduq_support::rendering::suggest;

use crate::key::Key;

/// A boxed error produced by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Sanduq operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No entry for the key in a container, or no value bound to it in the
    /// current execution context of a scope.
    #[error("{}", .0)]
    MissingKey(MissingKeyError),

    /// Conflicting or incomplete arguments to `put`.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// A stack operation needed a container but the stack is empty.
    #[error("No containers found on the stack, please `.push()` a container first.")]
    NoActiveContainer,

    /// `pop` was called on an empty stack.
    #[error("Nothing to pop: the stack is empty, please `.push()` a container first.")]
    EmptyStack,

    /// A push guard popped a container it did not push.
    #[error(
        "The push guard has popped the wrong container, meaning it did not pop the one \
         that was pushed. This occurs when the stack is popped manually while a guard \
         returned by `.push()` is still alive."
    )]
    PopMismatch,

    /// The arguments of a call do not fit the callee's signature.
    #[error(transparent)]
    Call(#[from] CallError),

    /// A value exists but has a different type than the one requested.
    #[error("Type mismatch for {subject}: expected {expected}, found {found}")]
    TypeMismatch {
        /// What was looked up (a key or a parameter).
        subject: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A host-bound scope was used outside of the unit of work that
    /// provides its storage.
    #[error(
        "Working outside of {0} context.\n  Hint: run the unit of work through \
         `ScopeMiddleware::run` or `ScopeMiddleware::scope`"
    )]
    OutsideContext(&'static str),

    /// An error raised by a factory or by an injected function.
    #[error(transparent)]
    Failed(BoxError),
}

impl Error {
    /// Creates a missing-key error without suggestions.
    pub fn missing(key: &Key) -> Self {
        Error::MissingKey(MissingKeyError {
            key: key.clone(),
            suggestions: Vec::new(),
        })
    }

    /// Wraps an error raised by user code.
    ///
    /// A Sanduq [`Error`] that travelled through user code is returned as is
    /// rather than nested inside [`Error::Failed`].
    pub fn failed(error: impl Into<BoxError>) -> Self {
        match error.into().downcast::<Error>() {
            Ok(own) => *own,
            Err(other) => Error::Failed(other),
        }
    }

    /// Returns `true` if this is a [`Error::MissingKey`].
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Error::MissingKey(_))
    }

    /// Returns `true` if this error reports `key` itself as missing.
    pub fn is_missing(&self, key: &Key) -> bool {
        matches!(self, Error::MissingKey(e) if e.key == *key)
    }
}

/// Error when a key has nothing behind it.
///
/// Containers attach keys that look similar to the requested one.
#[derive(Debug)]
pub struct MissingKeyError {
    /// The key that was requested
    pub key: Key,
    /// Registered keys that look like the requested one
    pub suggestions: Vec<String>,
}

impl MissingKeyError {
    /// Builds the error, suggesting lookalikes among `available`.
    pub fn with_suggestions(key: &Key, available: &[Key]) -> Self {
        let requested = key.to_string();
        let names: Vec<String> = available.iter().map(Key::to_string).collect();
        Self {
            key: key.clone(),
            suggestions: suggest(&requested, names.iter().map(String::as_str), 3),
        }
    }
}

impl fmt::Display for MissingKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key not found: {}", self.key)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Errors of the calling convention shared by every injectable function.
///
/// These are the failures a call raises on its own; injection does not
/// translate them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("{function}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword { function: String, name: String },

    #[error("{function}() takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        function: String,
        expected: usize,
        given: usize,
    },

    #[error("{function}() got multiple values for argument '{name}'")]
    MultipleValues { function: String, name: String },

    #[error("{function}() missing required argument: '{name}'")]
    MissingArgument { function: String, name: String },
}

/// Convenient Result type for Sanduq operations.
pub type Result<T> = std::result::Result<T, Error>;
