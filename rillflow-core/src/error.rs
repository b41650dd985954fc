//! Engine error types.
//!
//! Each condition is handled at the smallest enclosing scope: a
//! [`ContractViolation`](RillError::ContractViolation) or
//! [`TypeMismatch`](RillError::TypeMismatch) is fatal to the offending agent
//! only, while [`Range`](RillError::Range) indicates a scheduler invariant
//! failure and aborts the process run. Orchestration-level plumbing (thread
//! joins, pipeline wiring) uses `anyhow` on top of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RillError {
    /// Slice requested beyond the current stream length. Never fires while the
    /// scheduler dispatch invariant holds; treated as internal and fatal.
    #[error("slice [{start}, {stop}) out of range for stream `{stream}` (len {len})")]
    Range {
        stream: String,
        start: usize,
        stop: usize,
        len: usize,
    },

    /// A transition consumed more than it was offered, or returned a result
    /// whose shape does not match the agent's declared inputs/outputs.
    #[error("contract violated: {detail}")]
    ContractViolation { detail: String },

    /// A typed operator helper received an element of an unexpected kind.
    #[error("`{context}` expected `{expected}` elements")]
    TypeMismatch {
        context: String,
        expected: &'static str,
    },

    /// Graph or pipeline construction error.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Sink I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RillError::Range {
            stream: "t".into(),
            start: 3,
            stop: 9,
            len: 5,
        };
        assert_eq!(
            err.to_string(),
            "slice [3, 9) out of range for stream `t` (len 5)"
        );
    }
}
