//! Error types for vault operations.
//!
//! Every [`VaultClient`](super::VaultClient) operation returns a
//! [`VaultError`]. Callers that need to branch on the broad category
//! (render a form hint vs. a retry banner) use [`VaultError::kind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codes::ContractErrorCode;
use crate::address::AddressError;
use crate::amount::AmountError;

/// Broad failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, rejected before any network call.
    Validation,
    /// No signed-in account.
    Session,
    /// Network, endpoint or wallet plumbing failed.
    Transport,
    /// The user dismissed the wallet prompt.
    UserCancelled,
    /// The contract itself refused.
    Contract,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount too small: minimum is 0.000001")]
    AmountTooSmall,

    #[error("Amount too large: maximum is 1000000")]
    AmountTooLarge,

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("User not signed in")]
    NotSignedIn,

    #[error("Transaction cancelled by user")]
    UserCancelled,

    /// A read-only query could not be completed.
    #[error("{function} query failed: {reason}")]
    QueryFailed {
        function: String,
        reason: String,
    },

    /// The contract answered `(err …)`. `code` is set when the value maps
    /// onto a known vault error.
    #[error("contract error {raw}")]
    Contract {
        code: Option<ContractErrorCode>,
        raw: String,
    },

    /// The wallet refused or failed to submit the call.
    #[error("{0}")]
    SubmissionFailed(String),

    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout {
        operation: String,
        elapsed_ms: u64,
    },
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidAmount(_)
            | VaultError::AmountTooSmall
            | VaultError::AmountTooLarge
            | VaultError::InvalidAddress(_) => ErrorKind::Validation,
            VaultError::NotSignedIn => ErrorKind::Session,
            VaultError::QueryFailed { .. }
            | VaultError::SubmissionFailed(_)
            | VaultError::Timeout { .. } => ErrorKind::Transport,
            VaultError::UserCancelled => ErrorKind::UserCancelled,
            VaultError::Contract { .. } => ErrorKind::Contract,
        }
    }

    pub(crate) fn query(function: &str, reason: impl ToString) -> Self {
        VaultError::QueryFailed {
            function: function.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<AmountError> for VaultError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Invalid(detail) => VaultError::InvalidAmount(detail),
            AmountError::TooSmall => VaultError::AmountTooSmall,
            AmountError::TooLarge => VaultError::AmountTooLarge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        assert_eq!(VaultError::AmountTooSmall.kind(), ErrorKind::Validation);
        assert_eq!(
            VaultError::InvalidAddress(AddressError::Empty).kind(),
            ErrorKind::Validation
        );
        assert_eq!(VaultError::NotSignedIn.kind(), ErrorKind::Session);
        assert_eq!(VaultError::query("get-total-shares", "boom").kind(), ErrorKind::Transport);
        assert_eq!(
            VaultError::Timeout {
                operation: "deposit".into(),
                elapsed_ms: 1
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(VaultError::UserCancelled.kind(), ErrorKind::UserCancelled);
        assert_eq!(
            VaultError::Contract {
                code: Some(ContractErrorCode::Paused),
                raw: "(err u100)".into()
            }
            .kind(),
            ErrorKind::Contract
        );
    }

    #[test]
    fn user_facing_messages() {
        assert_eq!(VaultError::NotSignedIn.to_string(), "User not signed in");
        assert_eq!(
            VaultError::UserCancelled.to_string(),
            "Transaction cancelled by user"
        );
    }

    #[test]
    fn amount_errors_convert() {
        assert_eq!(VaultError::from(AmountError::TooSmall), VaultError::AmountTooSmall);
        assert_eq!(VaultError::from(AmountError::TooLarge), VaultError::AmountTooLarge);
        assert!(matches!(
            VaultError::from(AmountError::Invalid("x".into())),
            VaultError::InvalidAmount(_)
        ));
    }
}
