//! Wallet hand-off for state-changing calls.
//!
//! This crate never holds keys. A [`ContractCall`] describes the unsigned
//! call; a [`TransactionSigner`] shows it to the user, signs and broadcasts
//! it, and answers with the transaction id. [`HttpWalletBridge`] speaks to
//! an external wallet process over HTTP:
//!
//! ```text
//! POST {bridge}/contract-call   (ContractCall as JSON, args hex-encoded)
//! ← {"txId": "0x…"} | {"cancelled": true} | {"error": "…"}
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::ContractId;
use crate::clarity::ClarityValue;
use crate::config::Network;
use crate::http;

/// App name shown in the wallet prompt.
pub const APP_NAME: &str = "Zeref Vault";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostConditionMode {
    Allow,
    Deny,
}

/// An unsigned contract call awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract: ContractId,
    pub function: String,
    pub args: Vec<ClarityValue>,
    pub post_condition_mode: PostConditionMode,
    pub network: Network,
    pub app_name: String,
}

impl ContractCall {
    /// Vault calls run with `Allow` post conditions; the contract moves
    /// funds on the caller's behalf.
    pub fn new(
        contract: ContractId,
        function: impl Into<String>,
        args: Vec<ClarityValue>,
        network: Network,
    ) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
            post_condition_mode: PostConditionMode::Allow,
            network,
            app_name: APP_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Transaction cancelled by user")]
    Cancelled,

    #[error("wallet rejected the call: {0}")]
    Rejected(String),

    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Prompts the user and returns the broadcast transaction id.
    async fn request_call(&self, call: ContractCall) -> Result<String, SignerError>;
}

/// Signer for read-only deployments; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigner;

#[async_trait]
impl TransactionSigner for NoSigner {
    async fn request_call(&self, _call: ContractCall) -> Result<String, SignerError> {
        Err(SignerError::Unavailable("no wallet bridge configured".into()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeRequest<'a> {
    contract_address: &'a str,
    contract_name: &'a str,
    function_name: &'a str,
    function_args: Vec<String>,
    post_condition_mode: PostConditionMode,
    network: Network,
    app_name: &'a str,
}

impl<'a> From<&'a ContractCall> for BridgeRequest<'a> {
    fn from(call: &'a ContractCall) -> Self {
        Self {
            contract_address: &call.contract.address,
            contract_name: &call.contract.name,
            function_name: &call.function,
            function_args: call.args.iter().map(ClarityValue::to_hex).collect(),
            post_condition_mode: call.post_condition_mode,
            network: call.network,
            app_name: &call.app_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeResponse {
    #[serde(default)]
    tx_id: Option<String>,
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    error: Option<String>,
}

impl BridgeResponse {
    fn into_result(self) -> Result<String, SignerError> {
        if self.cancelled {
            return Err(SignerError::Cancelled);
        }
        if let Some(error) = self.error {
            return Err(SignerError::Rejected(error));
        }
        self.tx_id
            .ok_or_else(|| SignerError::Rejected("bridge answered without a txId".into()))
    }
}

/// [`TransactionSigner`] that forwards calls to a wallet bridge process.
///
/// The client given here should not carry the short request timeout; the
/// user may take minutes to confirm. The caller bounds the wait instead.
#[derive(Debug, Clone)]
pub struct HttpWalletBridge {
    http: Client,
    base: String,
}

impl HttpWalletBridge {
    pub fn new(http: Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TransactionSigner for HttpWalletBridge {
    async fn request_call(&self, call: ContractCall) -> Result<String, SignerError> {
        let url = http::endpoint(&self.base, &["contract-call"]).map_err(SignerError::Unavailable)?;
        debug!(contract = %call.contract, function = %call.function, "requesting wallet signature");

        let res = self
            .http
            .post(url)
            .json(&BridgeRequest::from(&call))
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let status = res.status();
        let body: BridgeResponse = match res.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%status, error = %e, "unreadable wallet bridge response");
                return Err(SignerError::Unavailable(format!(
                    "bridge returned {}: {}",
                    status, e
                )));
            }
        };
        let result = body.into_result();
        match &result {
            Ok(tx_id) => info!(tx_id = %tx_id, function = %call.function, "transaction submitted"),
            Err(SignerError::Cancelled) => info!(function = %call.function, "user cancelled"),
            Err(e) => warn!(error = %e, function = %call.function, "wallet refused call"),
        }
        result
    }
}
