//! Unified error types for the ikss workspace
//!
//! This module provides a common error type [`ScError`] that can represent
//! errors from any part of a short-circuit calculation. Domain-specific error
//! types (admittance assembly, configuration parsing) convert into `ScError`
//! for uniform error handling at API boundaries.
//!
//! An unreachable bus is deliberately *not* an error: it is reported as a
//! per-bus status in the result set while the remaining buses are solved.
//!
//! # Example
//!
//! ```ignore
//! use ikss_core::{ScError, ScResult};
//!
//! fn study(network: &Network) -> ScResult<()> {
//!     let results = compute_fault_currents(network, FaultCase::Max, true)?;
//!     println!("{}", results.to_json()?);
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all short-circuit operations.
#[derive(Error, Debug)]
pub enum ScError {
    /// I/O errors (configuration files, result export)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid source, bus or branch parameters. Aborts the whole calculation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Factorization failed or produced non-finite values. Every bus shares
    /// the same factorization, so this aborts the whole calculation.
    #[error("Numeric ill-conditioning: {0}")]
    NumericIllConditioning(String),

    /// Network structure errors
    #[error("Network error: {0}")]
    Network(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ScError.
pub type ScResult<T> = Result<T, ScError>;

impl ScError {
    /// True for errors caused by the caller's network description.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScError::Configuration(_))
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for ScError {
    fn from(err: anyhow::Error) -> Self {
        ScError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for ScError {
    fn from(s: String) -> Self {
        ScError::Other(s)
    }
}

impl From<&str> for ScError {
    fn from(s: &str) -> Self {
        ScError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for ScError {
    fn from(err: serde_json::Error) -> Self {
        ScError::Parse(err.to_string())
    }
}

// TOML configuration errors
impl From<toml::de::Error> for ScError {
    fn from(err: toml::de::Error) -> Self {
        ScError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ScError {
    fn from(err: toml::ser::Error) -> Self {
        ScError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScError::Configuration("grid 1 has zero short-circuit power".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("zero short-circuit power"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let sc_err: ScError = io_err.into();
        assert!(matches!(sc_err, ScError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let bad: Result<toml::Value, _> = toml::from_str("base_mva = ");
        let sc_err: ScError = bad.unwrap_err().into();
        assert!(matches!(sc_err, ScError::Parse(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ScResult<()> {
            Err(ScError::NumericIllConditioning("singular".into()))
        }

        fn outer() -> ScResult<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert!(!err.is_configuration());
    }
}
