use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid terms: {field}: {reason}")]
    InvalidTerms { field: String, reason: String },

    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    #[error("Invalid waiver: {0}")]
    InvalidWaiver(String),

    /// Generated installments failed to reconcile. Indicates a defect in the
    /// engine, not bad caller input.
    #[error("Schedule integrity violation: {0}")]
    ScheduleIntegrity(String),

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LedgerError {
    pub(crate) fn terms(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidTerms {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn input(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::SerializationError(e.to_string())
    }
}
