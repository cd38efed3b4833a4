//! # Market Data: Balances & Prices
//!
//! Display data for the dashboard: the account's STX balance from the
//! Stacks API and the STX/USD price from public exchanges.
//!
//! Everything here degrades instead of failing. A balance that cannot be
//! fetched is `None` ("unknown", never "zero"); a price that cannot be
//! fetched is the fallback constant. Callers never see a transport error.
//!
//! ```text
//! balance.rs: GET {api_base}/extended/v1/address/{address}/stx
//! price.rs  : ordered feed list, first plausible quote wins
//! ```

pub mod balance;
pub mod price;

pub use balance::AccountBalance;
pub use price::{PriceFeed, PriceOrigin, PriceQuote, PriceSourceKind};

use reqwest::Client;

use crate::config::ClientConfig;
use crate::http;

/// HTTP client for balance and price lookups.
///
/// Cheap to clone; the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct MarketClient {
    http: Client,
    api_base: String,
    feeds: Vec<PriceFeed>,
}

impl MarketClient {
    /// Builds a client from the runtime config, with its request timeout.
    pub fn new(config: &ClientConfig) -> reqwest::Result<Self> {
        Ok(Self::with_client(
            http::build_client(config.request_timeout)?,
            config.api_base(),
            config.price_feeds.clone(),
        ))
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn with_client(http: Client, api_base: impl Into<String>, feeds: Vec<PriceFeed>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            feeds,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn feeds(&self) -> &[PriceFeed] {
        &self.feeds
    }
}
