//! Error types for the tempo estimation engine
//!
//! Expected "no usable signal" outcomes (silence, too-short input, no
//! periodicity) are not errors: the engine reports them as `Ok(None)`.
//! `AnalysisError` is reserved for invalid parameters and host cancellation.

use thiserror::Error;

/// Errors that can occur during tempo analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Invalid input parameters (zero sample rate, inconsistent configuration)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The host asked the engine to stop at a window boundary
    #[error("Analysis cancelled by host")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AnalysisError::InvalidInput("Invalid sample rate".to_string());
        assert_eq!(err.to_string(), "Invalid input: Invalid sample rate");
        assert_eq!(AnalysisError::Cancelled.to_string(), "Analysis cancelled by host");
    }
}
