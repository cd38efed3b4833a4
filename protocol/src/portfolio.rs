//! # Portfolio
//!
//! Balance × price for one address. Both lookups run concurrently and
//! neither can fail the whole: an unknown balance is reported as zero with
//! `balance_known = false`, and the price always has a value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::to_display_units;
use crate::market::{MarketClient, PriceOrigin};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    /// `balance × price`, in USD.
    pub total_value: f64,
    /// STX balance in display units.
    pub balance: f64,
    pub price: f64,
    pub price_origin: PriceOrigin,
    pub balance_known: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PortfolioService {
    market: MarketClient,
}

impl PortfolioService {
    pub fn new(market: MarketClient) -> Self {
        Self { market }
    }

    pub fn market(&self) -> &MarketClient {
        &self.market
    }

    pub async fn get_portfolio(&self, address: &str) -> Portfolio {
        let (balance, quote) = tokio::join!(
            self.market.fetch_balance(address),
            self.market.fetch_price()
        );

        let balance_known = balance.is_some();
        let balance = balance.map(|b| to_display_units(b.balance)).unwrap_or(0.0);
        debug!(address, balance, price = quote.price, balance_known, "portfolio computed");

        Portfolio {
            total_value: balance * quote.price,
            balance,
            price: quote.price,
            price_origin: quote.origin,
            balance_known,
            fetched_at: Utc::now(),
        }
    }
}
