//! Errors for parsing and converting the shared value types.

use thiserror::Error;

/// Return an error if the condition is false.
#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            return Err($e);
        }
    };
}

/// Failure to parse one of the string forms of an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    /// The input did not have the expected number of components.
    #[error("expected {expected}, found `{input}`")]
    Malformed {
        /// Human readable form that was expected.
        expected: &'static str,
        /// The rejected input.
        input: String,
    },
    /// A numeric component could not be parsed.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

impl ParseIdError {
    pub(crate) fn malformed(expected: &'static str, input: &str) -> Self {
        Self::Malformed { expected, input: input.to_string() }
    }
}
