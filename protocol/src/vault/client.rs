//! The vault contract client.
//!
//! Read-only queries go through a [`ContractReader`]; deposits and
//! withdrawals go through a [`TransactionSigner`] and need a signed-in
//! [`Session`]. Nothing here is cached: every call reflects the chain at
//! the moment it was answered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::codes::ContractErrorCode;
use super::error::VaultError;
use super::rpc::{ContractReader, HttpContractReader};
use super::signer::{ContractCall, HttpWalletBridge, NoSigner, SignerError, TransactionSigner};
use crate::address::{ContractId, StacksAddress};
use crate::amount::parse_display_amount;
use crate::clarity::ClarityValue;
use crate::config::{functions, ClientConfig, Network, MICRO_UNITS_PER_UNIT};
use crate::http;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A user's position, in micro-units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBalance {
    pub shares: u64,
    pub estimated_amount: u64,
}

/// Exchange rate as reported by the vault, scaled by 1,000,000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(pub u64);

impl ExchangeRate {
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Underlying units per share.
    pub fn as_ratio(&self) -> f64 {
        self.0 as f64 / MICRO_UNITS_PER_UNIT as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStats {
    pub exchange_rate: ExchangeRate,
    pub total_underlying: u64,
    pub total_shares: u64,
}

/// How [`VaultStatus`] was inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StatusSignal {
    /// The probe read succeeded.
    Readable,
    /// The probe failed with the paused code.
    PausedCode,
    /// The probe failed for another reason; the vault is assumed open.
    Inconclusive { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub is_paused: bool,
    pub can_deposit: bool,
    pub signal: StatusSignal,
}

impl VaultStatus {
    fn open(signal: StatusSignal) -> Self {
        Self {
            is_paused: false,
            can_deposit: true,
            signal,
        }
    }

    fn paused() -> Self {
        Self {
            is_paused: true,
            can_deposit: false,
            signal: StatusSignal::PausedCode,
        }
    }
}

/// Proof of submission. Says nothing about confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub tx_id: String,
    pub function: String,
    pub amount: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Parses user input into deposit micro-units, enforcing the bounds.
pub fn validate_deposit_amount(text: &str) -> Result<u64, VaultError> {
    Ok(parse_display_amount(text)?)
}

// ---------------------------------------------------------------------------
// VaultClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct VaultClient {
    contract: ContractId,
    share_token: Option<ContractId>,
    network: Network,
    reader: Arc<dyn ContractReader>,
    signer: Arc<dyn TransactionSigner>,
    session: Session,
    prompt_timeout: Duration,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("contract", &self.contract)
            .field("share_token", &self.share_token)
            .field("network", &self.network)
            .field("prompt_timeout", &self.prompt_timeout)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    pub fn new(
        contract: ContractId,
        network: Network,
        reader: Arc<dyn ContractReader>,
        signer: Arc<dyn TransactionSigner>,
        session: Session,
    ) -> Self {
        Self {
            contract,
            share_token: None,
            network,
            reader,
            signer,
            session,
            prompt_timeout: crate::config::WALLET_PROMPT_TIMEOUT,
        }
    }

    /// Wires the HTTP reader and, if configured, the wallet bridge.
    pub fn from_config(config: &ClientConfig, session: Session) -> reqwest::Result<Self> {
        let reader = HttpContractReader::new(
            http::build_client(config.request_timeout)?,
            config.api_base(),
        );
        let signer: Arc<dyn TransactionSigner> = match &config.wallet_bridge {
            Some(base) => Arc::new(HttpWalletBridge::new(
                http::build_client(config.wallet_prompt_timeout)?,
                base.clone(),
            )),
            None => Arc::new(NoSigner),
        };
        let mut client = Self::new(
            config.vault.clone(),
            config.network,
            Arc::new(reader),
            signer,
            session,
        )
        .with_prompt_timeout(config.wallet_prompt_timeout);
        client.share_token = config.share_token.clone();
        Ok(client)
    }

    pub fn with_share_token(mut self, token: ContractId) -> Self {
        self.share_token = Some(token);
        self
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The signed-in address.
    pub fn ensure_signed_in(&self) -> Result<String, VaultError> {
        self.session.address().ok_or(VaultError::NotSignedIn)
    }

    // -- writes -------------------------------------------------------------

    /// Submits `deposit(amount)` for the signed-in user.
    pub async fn deposit(&self, amount: u64) -> Result<TransactionReceipt, VaultError> {
        self.submit(functions::DEPOSIT, amount, "Amount must be greater than 0")
            .await
    }

    /// Submits `withdraw(shares)` for the signed-in user.
    pub async fn withdraw(&self, shares: u64) -> Result<TransactionReceipt, VaultError> {
        self.submit(functions::WITHDRAW, shares, "Shares must be greater than 0")
            .await
    }

    async fn submit(
        &self,
        function: &'static str,
        amount: u64,
        zero_message: &str,
    ) -> Result<TransactionReceipt, VaultError> {
        self.ensure_signed_in()?;
        if amount == 0 {
            return Err(VaultError::InvalidAmount(zero_message.to_string()));
        }

        let call = ContractCall::new(
            self.contract.clone(),
            function,
            vec![ClarityValue::UInt(amount as u128)],
            self.network,
        );
        info!(contract = %self.contract, function, amount, "awaiting wallet confirmation");

        let started = Instant::now();
        let answer = tokio::time::timeout(self.prompt_timeout, self.signer.request_call(call)).await;
        match answer {
            Err(_) => Err(VaultError::Timeout {
                operation: function.to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            Ok(Err(SignerError::Cancelled)) => Err(VaultError::UserCancelled),
            Ok(Err(SignerError::Rejected(msg))) | Ok(Err(SignerError::Unavailable(msg))) => {
                Err(VaultError::SubmissionFailed(msg))
            }
            Ok(Ok(tx_id)) => Ok(TransactionReceipt {
                tx_id,
                function: function.to_string(),
                amount,
                submitted_at: Utc::now(),
            }),
        }
    }

    // -- reads --------------------------------------------------------------

    pub async fn get_user_balance(&self, address: &str) -> Result<VaultBalance, VaultError> {
        let principal = principal_arg(address)?;
        let value = self
            .read(&self.contract, functions::GET_USER_BALANCE, vec![principal], address)
            .await?;
        let field = |name: &str| -> Result<u64, VaultError> {
            let v = value
                .field(name)
                .and_then(ClarityValue::expect_uint)
                .map_err(|e| VaultError::query(functions::GET_USER_BALANCE, e))?;
            to_u64(functions::GET_USER_BALANCE, v)
        };
        Ok(VaultBalance {
            shares: field("shares")?,
            estimated_amount: field("est-amount")?,
        })
    }

    pub async fn get_exchange_rate(&self) -> Result<ExchangeRate, VaultError> {
        self.read_global_uint(functions::GET_EXCHANGE_RATE, vec![])
            .await
            .map(ExchangeRate)
    }

    pub async fn get_total_underlying(&self) -> Result<u64, VaultError> {
        self.read_global_uint(functions::GET_TOTAL_UNDERLYING, vec![])
            .await
    }

    pub async fn get_total_shares(&self) -> Result<u64, VaultError> {
        self.read_global_uint(functions::GET_TOTAL_SHARES, vec![]).await
    }

    /// Shares the vault would mint for `amount` right now.
    pub async fn preview_deposit(&self, amount: u64) -> Result<u64, VaultError> {
        self.read_global_uint(
            functions::PREVIEW_DEPOSIT,
            vec![ClarityValue::UInt(amount as u128)],
        )
        .await
    }

    /// Underlying the vault would pay out for `shares` right now.
    pub async fn preview_withdraw(&self, shares: u64) -> Result<u64, VaultError> {
        self.read_global_uint(
            functions::PREVIEW_WITHDRAW,
            vec![ClarityValue::UInt(shares as u128)],
        )
        .await
    }

    /// Share-token balance of `address`. Fails if no share token is
    /// configured.
    pub async fn get_share_token_balance(&self, address: &str) -> Result<u64, VaultError> {
        let token = self
            .share_token
            .as_ref()
            .ok_or_else(|| VaultError::query(functions::GET_BALANCE, "no share token configured"))?;
        let principal = principal_arg(address)?;
        let value = self
            .read(token, functions::GET_BALANCE, vec![principal], address)
            .await?;
        uint_of(functions::GET_BALANCE, &value)
    }

    /// Exchange rate, total underlying and total shares, fetched
    /// concurrently. One failure fails the whole call.
    pub async fn get_vault_stats(&self) -> Result<VaultStats, VaultError> {
        let (exchange_rate, total_underlying, total_shares) = tokio::try_join!(
            self.get_exchange_rate(),
            self.get_total_underlying(),
            self.get_total_shares(),
        )?;
        Ok(VaultStats {
            exchange_rate,
            total_underlying,
            total_shares,
        })
    }

    /// Infers whether the vault is paused by probing the exchange rate.
    ///
    /// Only the paused code counts as paused. Any other failure reports an
    /// open vault with [`StatusSignal::Inconclusive`].
    pub async fn check_vault_status(&self) -> VaultStatus {
        match self.get_exchange_rate().await {
            Ok(_) => VaultStatus::open(StatusSignal::Readable),
            Err(VaultError::Contract {
                code: Some(ContractErrorCode::Paused),
                ..
            }) => VaultStatus::paused(),
            Err(e) if ContractErrorCode::is_pause_marker(&e.to_string()) => VaultStatus::paused(),
            Err(e) => {
                warn!(error = %e, "vault status probe failed, assuming open");
                VaultStatus::open(StatusSignal::Inconclusive {
                    reason: e.to_string(),
                })
            }
        }
    }

    // -- plumbing -----------------------------------------------------------

    async fn read_global_uint(
        &self,
        function: &'static str,
        args: Vec<ClarityValue>,
    ) -> Result<u64, VaultError> {
        let value = self
            .read(&self.contract, function, args, &self.contract.address)
            .await?;
        uint_of(function, &value)
    }

    /// Runs one read-only call. `(err …)` becomes [`VaultError::Contract`],
    /// `(ok …)` is unwrapped.
    async fn read(
        &self,
        contract: &ContractId,
        function: &'static str,
        args: Vec<ClarityValue>,
        sender: &str,
    ) -> Result<ClarityValue, VaultError> {
        debug!(contract = %contract, function, "vault read");
        let value = self
            .reader
            .call_read_only(contract, function, &args, sender)
            .await
            .map_err(|e| {
                warn!(function, error = %e, "vault query failed");
                VaultError::query(function, e)
            })?;

        match value {
            ClarityValue::ResponseErr(ref inner) => Err(VaultError::Contract {
                code: ContractErrorCode::from_value(inner),
                raw: value.to_string(),
            }),
            other => Ok(other.unwrap_ok()),
        }
    }
}

fn principal_arg(address: &str) -> Result<ClarityValue, VaultError> {
    let address: StacksAddress = address.parse()?;
    Ok(ClarityValue::StandardPrincipal(address))
}

fn uint_of(function: &str, value: &ClarityValue) -> Result<u64, VaultError> {
    let v = value
        .expect_uint()
        .map_err(|e| VaultError::query(function, e))?;
    to_u64(function, v)
}

fn to_u64(function: &str, v: u128) -> Result<u64, VaultError> {
    u64::try_from(v).map_err(|_| VaultError::query(function, format!("value {} exceeds u64", v)))
}
