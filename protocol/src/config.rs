//! # Client Configuration & Constants
//!
//! Every magic number the vault client relies on lives here: unit scale,
//! deposit bounds, price plausibility window, timeouts, and the endpoint
//! base URLs for each network.
//!
//! Runtime configuration is a single [`ClientConfig`] value. The binary
//! assembles it from CLI flags and environment variables; tests build it
//! directly with [`ClientConfig::for_api_base`] so they can point every
//! component at a local server.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::ContractId;
use crate::market::price::PriceFeed;

// ---------------------------------------------------------------------------
// Units & Bounds
// ---------------------------------------------------------------------------

/// Micro-units per display unit. 1 STX = 1,000,000 µSTX.
pub const MICRO_UNITS_PER_UNIT: u64 = 1_000_000;

/// Number of decimal places carried by a micro-unit amount.
pub const UNIT_DECIMALS: usize = 6;

/// Smallest depositable amount, in micro-units (0.000001 units).
pub const MIN_DEPOSIT_MICRO: u64 = 1;

/// Largest depositable amount, in micro-units (1,000,000 units).
pub const MAX_DEPOSIT_MICRO: u64 = 1_000_000 * MICRO_UNITS_PER_UNIT;

// ---------------------------------------------------------------------------
// Price Feeds
// ---------------------------------------------------------------------------

/// Price reported when every feed fails or returns nonsense.
pub const FALLBACK_PRICE_USD: f64 = 0.65;

/// Exclusive lower bound of a plausible quote.
pub const MIN_PLAUSIBLE_PRICE: f64 = 0.0;

/// Exclusive upper bound of a plausible quote.
pub const MAX_PLAUSIBLE_PRICE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Per-request timeout for every outbound HTTP call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the wallet bridge may keep a confirmation prompt open.
pub const WALLET_PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Delay before re-reading the vault balance after a call is accepted.
/// Confirmation can take longer than this; the refresh is best effort.
pub const POST_SUBMIT_REFRESH_DELAY: Duration = Duration::from_secs(3);

/// Quiet period before a preview is computed for the latest input.
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Contract Interface
// ---------------------------------------------------------------------------

/// Default contract name of the vault.
pub const DEFAULT_VAULT_NAME: &str = "zeref-vault";

/// Read-only and public function names exposed by the vault contract.
pub mod functions {
    pub const DEPOSIT: &str = "deposit";
    pub const WITHDRAW: &str = "withdraw";
    pub const GET_USER_BALANCE: &str = "get-user-balance";
    pub const GET_EXCHANGE_RATE: &str = "get-exchange-rate";
    pub const GET_TOTAL_UNDERLYING: &str = "get-total-underlying";
    pub const GET_TOTAL_SHARES: &str = "get-total-shares";
    pub const PREVIEW_DEPOSIT: &str = "preview-deposit";
    pub const PREVIEW_WITHDRAW: &str = "preview-withdraw";
    /// SIP-010 balance getter on the share token.
    pub const GET_BALANCE: &str = "get-balance";
}

// ---------------------------------------------------------------------------
// Network Selection
// ---------------------------------------------------------------------------

/// Stacks API base for mainnet.
pub const MAINNET_API_BASE: &str = "https://api.mainnet.hiro.so";

/// Stacks API base for testnet.
pub const TESTNET_API_BASE: &str = "https://api.testnet.hiro.so";

/// Which Stacks network the process talks to. One value per process; the
/// balance fetcher and the contract reader always share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    /// Base URL of the public Stacks API for this network.
    pub fn api_base(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_API_BASE,
            Network::Testnet => TESTNET_API_BASE,
        }
    }

    /// Address version byte for single-sig addresses (`SP` / `ST`).
    pub fn single_sig_version(&self) -> u8 {
        match self {
            Network::Mainnet => 22,
            Network::Testnet => 26,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    /// Accepts `mainnet`/`production` and `testnet`/`test`/`development`,
    /// case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "production" => Ok(Network::Mainnet),
            "testnet" | "test" | "development" => Ok(Network::Testnet),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Everything a client needs to reach its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Selected network.
    pub network: Network,

    /// Overrides [`Network::api_base`] (local devnet node, tests).
    #[serde(default)]
    pub api_base_override: Option<String>,

    /// The vault contract every call targets.
    pub vault: ContractId,

    /// Optional share-token contract for balance lookups.
    #[serde(default)]
    pub share_token: Option<ContractId>,

    /// Wallet bridge used for mutating calls.
    #[serde(default)]
    pub wallet_bridge: Option<String>,

    /// Price feeds in priority order.
    pub price_feeds: Vec<PriceFeed>,

    /// Per-request HTTP timeout.
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// Timeout for a wallet confirmation prompt.
    #[serde(with = "duration_millis")]
    pub wallet_prompt_timeout: Duration,
}

impl ClientConfig {
    /// Config for `vault` on `network` using the public endpoints.
    pub fn new(network: Network, vault: ContractId) -> Self {
        Self {
            network,
            api_base_override: None,
            vault,
            share_token: None,
            wallet_bridge: None,
            price_feeds: PriceFeed::default_feeds(),
            request_timeout: REQUEST_TIMEOUT,
            wallet_prompt_timeout: WALLET_PROMPT_TIMEOUT,
        }
    }

    /// Config whose Stacks API calls all go to `api_base`.
    pub fn for_api_base(api_base: impl Into<String>, vault: ContractId) -> Self {
        Self {
            api_base_override: Some(api_base.into()),
            ..Self::new(Network::Testnet, vault)
        }
    }

    /// The Stacks API base in effect, without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_override
            .as_deref()
            .unwrap_or_else(|| self.network.api_base())
            .trim_end_matches('/')
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
