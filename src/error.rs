//! Error types for asset overlay operations
//!
//! Every failure a caller can observe is one of these variants. Each
//! variant carries a stable code so responses can be matched on without
//! parsing the message text.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CcError {
    #[error("Must include \"address\"")]
    MissingAddress,

    #[error("Must include asset")]
    MissingAsset,

    #[error("The address does not have inputs")]
    NoInputsForAddress,

    #[error("The address does not have inputs with confirmations")]
    NoInputsConfirmed,

    #[error("Not enough funds to make the transaction (needed {needed}, collected {collected})")]
    NotEnoughFunds { needed: u64, collected: u64 },

    #[error("Issuance transaction not found for {0}")]
    ProvenanceNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Node service unavailable: {0}")]
    NodeServiceUnavailable(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transaction builder error: {0}")]
    Builder(String),
}

impl CcError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAddress => "MISSING_ADDRESS",
            Self::MissingAsset => "MISSING_ASSET",
            Self::NoInputsForAddress => "NO_INPUTS_FOR_ADDRESS",
            Self::NoInputsConfirmed => "NO_INPUTS_CONFIRMED",
            Self::NotEnoughFunds { .. } => "NOT_ENOUGH_FUNDS",
            Self::ProvenanceNotFound(_) => "PROVENANCE_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::NodeServiceUnavailable(_) => "NODE_SERVICE_UNAVAILABLE",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Builder(_) => "BUILDER_ERROR",
        }
    }

    /// Read-path "not found" responses, kept distinct from empty successes
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TransactionNotFound(_) | Self::ProvenanceNotFound(_))
    }

    pub fn node(msg: impl Into<String>) -> Self {
        Self::NodeServiceUnavailable(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<reqwest::Error> for CcError {
    fn from(err: reqwest::Error) -> Self {
        Self::NodeServiceUnavailable(err.to_string())
    }
}

/// Structured error body handed back to callers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl From<&CcError> for ErrorResponse {
    fn from(err: &CcError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(CcError::MissingAddress.to_string(), "Must include \"address\"");
        assert_eq!(
            CcError::NoInputsConfirmed.to_string(),
            "The address does not have inputs with confirmations"
        );
        let err = CcError::NotEnoughFunds {
            needed: 10,
            collected: 5,
        };
        assert!(err
            .to_string()
            .starts_with("Not enough funds to make the transaction"));
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::from(&CcError::TransactionNotFound("ab".into()));
        assert_eq!(body.code, "TRANSACTION_NOT_FOUND");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "Transaction not found: ab");
        assert!(CcError::TransactionNotFound("ab".into()).is_not_found());
        assert!(!CcError::MissingAsset.is_not_found());
    }
}
