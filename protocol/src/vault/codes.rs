//! # Contract Error Codes
//!
//! The vault contract signals failures as `(err uN)`. This module maps
//! those codes onto user-facing text.
//!
//! Two entry points:
//!
//! - [`ContractErrorCode::from_code`] for values we decoded ourselves.
//! - [`ContractErrorCode::from_message`] for free-form text from a wallet or
//!   an endpoint, matched on the `uNNN` marker. The table is scanned in
//!   order and the first marker found anywhere in the text wins.

use serde::{Deserialize, Serialize};

use super::error::VaultError;
use crate::clarity::ClarityValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractErrorCode {
    Paused,
    InsufficientFunds,
    InvalidShares,
    NotKeeper,
    NotAdmin,
    TvlCapExceeded,
    StrategyNotAllowed,
    ZeroAmount,
    ZeroShares,
}

/// Match order for [`ContractErrorCode::from_message`].
const TABLE: [ContractErrorCode; 9] = [
    ContractErrorCode::Paused,
    ContractErrorCode::InsufficientFunds,
    ContractErrorCode::InvalidShares,
    ContractErrorCode::NotKeeper,
    ContractErrorCode::NotAdmin,
    ContractErrorCode::TvlCapExceeded,
    ContractErrorCode::StrategyNotAllowed,
    ContractErrorCode::ZeroAmount,
    ContractErrorCode::ZeroShares,
];

/// Named constant some nodes print instead of the numeric code.
const PAUSED_CONSTANT: &str = "ERR_PAUSED";

impl ContractErrorCode {
    pub fn all() -> &'static [ContractErrorCode] {
        &TABLE
    }

    pub fn code(&self) -> u128 {
        match self {
            ContractErrorCode::Paused => 100,
            ContractErrorCode::InsufficientFunds => 101,
            ContractErrorCode::InvalidShares => 102,
            ContractErrorCode::NotKeeper => 103,
            ContractErrorCode::NotAdmin => 104,
            ContractErrorCode::TvlCapExceeded => 105,
            ContractErrorCode::StrategyNotAllowed => 106,
            ContractErrorCode::ZeroAmount => 109,
            ContractErrorCode::ZeroShares => 110,
        }
    }

    /// The marker as it appears in Clarity text, e.g. `u100`.
    pub fn marker(&self) -> String {
        format!("u{}", self.code())
    }

    pub fn message(&self) -> &'static str {
        match self {
            ContractErrorCode::Paused => {
                "⚠️ Vault is currently paused. Please try again later or contact support."
            }
            ContractErrorCode::InsufficientFunds => "Insufficient funds in vault",
            ContractErrorCode::InvalidShares => "Invalid shares amount",
            ContractErrorCode::NotKeeper => "Not authorized keeper",
            ContractErrorCode::NotAdmin => "Not authorized admin",
            ContractErrorCode::TvlCapExceeded => {
                "TVL cap exceeded - vault has reached maximum capacity"
            }
            ContractErrorCode::StrategyNotAllowed => "Strategy not allowed",
            ContractErrorCode::ZeroAmount => "Amount cannot be zero",
            ContractErrorCode::ZeroShares => "Shares cannot be zero",
        }
    }

    pub fn from_code(code: u128) -> Option<Self> {
        TABLE.iter().copied().find(|c| c.code() == code)
    }

    /// Substring lookup on free-form text.
    ///
    /// Matching is on the bare marker, so `"u1000"` still reads as `u100`.
    /// Messages from wallets are not structured enough to do better.
    pub fn from_message(message: &str) -> Option<Self> {
        TABLE
            .iter()
            .copied()
            .find(|c| message.contains(c.marker().as_str()))
    }

    /// Decodes `(err uN)` or a bare `uN`.
    pub fn from_value(value: &ClarityValue) -> Option<Self> {
        match value {
            ClarityValue::ResponseErr(inner) => Self::from_value(inner),
            ClarityValue::UInt(code) => Self::from_code(*code),
            _ => None,
        }
    }

    /// True if `message` names the paused condition, numerically or by
    /// constant name.
    pub fn is_pause_marker(message: &str) -> bool {
        message.contains(ContractErrorCode::Paused.marker().as_str())
            || message.contains(PAUSED_CONSTANT)
    }
}

impl std::fmt::Display for ContractErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Table message for a raw error string, else `Transaction failed: <raw>`.
pub fn translate_message(message: &str) -> String {
    match ContractErrorCode::from_message(message) {
        Some(code) => code.message().to_string(),
        None => format!("Transaction failed: {}", message),
    }
}

/// User-facing text for any vault error.
pub fn translate_error(err: &VaultError) -> String {
    match err {
        VaultError::Contract {
            code: Some(code), ..
        } => code.message().to_string(),
        VaultError::Contract { code: None, raw } => translate_message(raw),
        other => translate_message(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAUSED_TEXT: &str =
        "⚠️ Vault is currently paused. Please try again later or contact support.";

    #[test]
    fn paused_message_is_verbatim() {
        assert_eq!(translate_message("(err u100)"), PAUSED_TEXT);
        assert_eq!(ContractErrorCode::Paused.message(), PAUSED_TEXT);
    }

    #[test]
    fn every_code_round_trips_through_lookup() {
        for code in ContractErrorCode::all() {
            assert_eq!(ContractErrorCode::from_code(code.code()), Some(*code));
            assert_eq!(
                ContractErrorCode::from_message(&format!("(err {})", code.marker())),
                Some(*code)
            );
        }
        assert_eq!(ContractErrorCode::from_code(107), None);
        assert_eq!(ContractErrorCode::from_code(0), None);
    }

    #[test]
    fn first_table_match_wins() {
        // Both markers present; u101 comes first in the table.
        assert_eq!(
            ContractErrorCode::from_message("u105 then u101"),
            Some(ContractErrorCode::InsufficientFunds)
        );
        // Prefix collision is inherited from marker matching.
        assert_eq!(
            ContractErrorCode::from_message("err u1000"),
            Some(ContractErrorCode::Paused)
        );
    }

    #[test]
    fn unknown_text_falls_back() {
        assert_eq!(
            translate_message("node unreachable"),
            "Transaction failed: node unreachable"
        );
    }

    #[test]
    fn decoded_values_map_exactly() {
        let err = ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(105)));
        assert_eq!(
            ContractErrorCode::from_value(&err),
            Some(ContractErrorCode::TvlCapExceeded)
        );
        assert_eq!(ContractErrorCode::from_value(&ClarityValue::Bool(true)), None);
    }

    #[test]
    fn pause_markers() {
        assert!(ContractErrorCode::is_pause_marker("(err u100)"));
        assert!(ContractErrorCode::is_pause_marker("ERR_PAUSED"));
        assert!(!ContractErrorCode::is_pause_marker("(err u101)"));
    }

    #[test]
    fn translates_vault_errors() {
        let coded = VaultError::Contract {
            code: Some(ContractErrorCode::ZeroShares),
            raw: "(err u110)".into(),
        };
        assert_eq!(translate_error(&coded), "Shares cannot be zero");

        let uncoded = VaultError::Contract {
            code: None,
            raw: "(err u42)".into(),
        };
        assert_eq!(translate_error(&uncoded), "Transaction failed: (err u42)");

        assert_eq!(
            translate_error(&VaultError::NotSignedIn),
            "Transaction failed: User not signed in"
        );
        assert_eq!(
            translate_error(&VaultError::SubmissionFailed("rejected (err u101)".into())),
            "Insufficient funds in vault"
        );
    }
}
