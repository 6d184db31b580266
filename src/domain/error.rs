//! Error types for the hierarchical pipeline.
//!
//! Three fatal classes, none retried:
//!   Format — malformed raw input (caller's data is wrong)
//!   State  — an operation ran before its prerequisite
//!   Shape  — a tensor-shape contract between pipeline stages
//!            was violated (programmer error)
//!
//! Unknown tokens are deliberately NOT an error: numericalizing
//! a token absent from the vocabulary maps it to the reserved
//! `<unk>` id so inference stays resilient to novel input.

use thiserror::Error;

/// Top-level error type for the field/model pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("format error: {0}")]
    Format(String),

    #[error("state error: {0}")]
    State(String),

    #[error("shape error: {context} - expected {expected}, got {actual}")]
    Shape {
        context: String,
        expected: String,
        actual: String,
    },
}

impl PipelineError {
    /// Shorthand for a shape-contract violation between stages.
    pub fn shape(
        context: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        PipelineError::Shape {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_display() {
        let err = PipelineError::Format("separator yields no chunks".into());
        assert!(err.to_string().contains("format error"));
    }

    #[test]
    fn test_shape_display_carries_both_sides() {
        let err = PipelineError::shape("chunk_lengths", 12, 9);
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("9"));
        assert!(msg.contains("chunk_lengths"));
    }
}
