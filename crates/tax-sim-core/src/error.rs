use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxSimError {
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: String },

    #[error("Upstream estimator unavailable: {0}")]
    UpstreamEstimatorUnavailable(String),

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Which side of the request a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Malformed or incomplete caller input (4xx analog).
    Client,
    /// Fault inside the engine (5xx analog).
    Internal,
}

impl TaxSimError {
    pub fn class(&self) -> FailureClass {
        match self {
            TaxSimError::InvalidSeries(_)
            | TaxSimError::MissingRequiredField(_)
            | TaxSimError::InvalidInput { .. }
            | TaxSimError::InsufficientData(_)
            | TaxSimError::SerializationError(_) => FailureClass::Client,
            TaxSimError::ArithmeticOverflow { .. }
            | TaxSimError::UpstreamEstimatorUnavailable(_) => FailureClass::Internal,
        }
    }

    /// Message safe to hand back to a caller. Internal faults are reported
    /// generically so no engine state leaks out.
    pub fn public_message(&self) -> String {
        match self.class() {
            FailureClass::Client => self.to_string(),
            FailureClass::Internal => "Internal computation error".to_string(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.public_message(),
        }
    }
}

/// Failure body returned in place of a simulation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<serde_json::Error> for TaxSimError {
    fn from(e: serde_json::Error) -> Self {
        TaxSimError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_client_class() {
        let err = TaxSimError::InvalidSeries("month 13 out of range".into());
        assert_eq!(err.class(), FailureClass::Client);
        assert!(err.public_message().contains("month 13"));

        let err = TaxSimError::MissingRequiredField("companyId".into());
        assert_eq!(err.class(), FailureClass::Client);
        assert_eq!(err.to_response().error, "Missing required field: companyId");
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = TaxSimError::ArithmeticOverflow {
            context: "annual revenue sum".into(),
        };
        assert_eq!(err.class(), FailureClass::Internal);
        assert_eq!(err.public_message(), "Internal computation error");
        assert!(!err.public_message().contains("revenue"));
    }
}
