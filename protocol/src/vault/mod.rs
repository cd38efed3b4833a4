//! # Vault: Contract Client, Actions & Previews
//!
//! Everything that talks to the yield vault contract.
//!
//! ## Architecture
//!
//! ```text
//! client.rs : VaultClient: read-only queries, deposit/withdraw submission
//! rpc.rs    : ContractReader seam + HTTP call-read implementation
//! signer.rs : TransactionSigner seam + wallet bridge implementation
//! codes.rs  : contract error codes → user-facing messages
//! error.rs  : VaultError and its broad kinds
//! action.rs : deposit/withdraw state machine with delayed refresh
//! preview.rs: debounced preview of shares/amount for form input
//! ```
//!
//! ## Ground Rules
//!
//! 1. **Amounts are `u64` micro-units.** Display units only exist at the
//!    edges ([`validate_deposit_amount`], formatting).
//! 2. **No keys here.** State-changing calls are handed to a
//!    [`TransactionSigner`]; a receipt proves submission, not success.
//! 3. **No caching.** Every read reflects the chain when it was answered.

pub mod action;
pub mod client;
pub mod codes;
pub mod error;
pub mod preview;
pub mod rpc;
pub mod signer;

pub use action::{ActionKind, ActionOutcome, ActionPhase, TransitionError, VaultAction};
pub use client::{
    validate_deposit_amount, ExchangeRate, StatusSignal, TransactionReceipt, VaultBalance,
    VaultClient, VaultStats, VaultStatus,
};
pub use codes::{translate_error, translate_message, ContractErrorCode};
pub use error::{ErrorKind, VaultError};
pub use preview::{PreviewDebouncer, PreviewKind, PreviewState};
pub use rpc::{ContractReader, HttpContractReader, ReadError};
pub use signer::{
    ContractCall, HttpWalletBridge, NoSigner, PostConditionMode, SignerError, TransactionSigner,
};
