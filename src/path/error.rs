use std::fmt;

use thiserror::Error;

/// Errors produced when parsing a path string.
#[derive(Debug)]
pub struct PathError {
    message: String,
}

impl PathError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path error: {}", self.message)
    }
}

impl std::error::Error for PathError {}

/// Rejected [`PathSyntax`](super::PathSyntax) configurations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("path separator must not be empty")]
    EmptySeparator,

    #[error("wildcard tokens must not be empty")]
    EmptyToken,

    #[error("token '{token}' contains the separator '{separator}'")]
    TokenContainsSeparator { token: String, separator: String },

    #[error("any-in-level and many-levels tokens are both '{token}'")]
    AmbiguousTokens { token: String },
}
