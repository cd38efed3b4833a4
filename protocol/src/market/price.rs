//! # STX/USD Price
//!
//! A degraded-availability chain, not a consensus: feeds are tried in
//! priority order and the first plausible quote wins. No averaging, no
//! quorum, no retries, no cache. When every feed is down or talking
//! nonsense the fallback constant is reported, tagged as such.
//!
//! Each exchange answers in its own shape:
//!
//! | Feed      | Body                                   |
//! |-----------|----------------------------------------|
//! | CoinGecko | `{"stacks": {"usd": 0.61}}`            |
//! | Coinbase  | `{"data": {"rates": {"USD": "0.61"}}}` |
//! | Binance   | `{"price": "0.61000000"}`              |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::MarketClient;
use crate::config::{FALLBACK_PRICE_USD, MAX_PLAUSIBLE_PRICE, MIN_PLAUSIBLE_PRICE};

const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price?ids=stacks&vs_currencies=usd";
const COINBASE_URL: &str = "https://api.coinbase.com/v2/exchange-rates?currency=STX";
const BINANCE_URL: &str = "https://api.binance.com/api/v3/ticker/price?symbol=STXUSDT";

/// Which response shape a feed speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSourceKind {
    CoinGecko,
    Coinbase,
    Binance,
}

impl PriceSourceKind {
    /// Pulls the USD price out of a response body. CoinGecko sends a JSON
    /// number; the other two send decimal strings.
    pub fn extract(&self, body: &Value) -> Option<f64> {
        match self {
            PriceSourceKind::CoinGecko => body.get("stacks")?.get("usd")?.as_f64(),
            PriceSourceKind::Coinbase => body
                .get("data")?
                .get("rates")?
                .get("USD")?
                .as_str()?
                .trim()
                .parse()
                .ok(),
            PriceSourceKind::Binance => body.get("price")?.as_str()?.trim().parse().ok(),
        }
    }
}

/// One entry of the ordered feed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    pub kind: PriceSourceKind,
    pub url: String,
}

impl PriceFeed {
    pub fn new(kind: PriceSourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }

    /// CoinGecko, then Coinbase, then Binance.
    pub fn default_feeds() -> Vec<PriceFeed> {
        vec![
            PriceFeed::new(PriceSourceKind::CoinGecko, COINGECKO_URL),
            PriceFeed::new(PriceSourceKind::Coinbase, COINBASE_URL),
            PriceFeed::new(PriceSourceKind::Binance, BINANCE_URL),
        ]
    }
}

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source", content = "feed")]
pub enum PriceOrigin {
    Feed(PriceSourceKind),
    Fallback,
}

/// A USD price per STX, valid at fetch time only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub origin: PriceOrigin,
}

impl PriceQuote {
    pub fn fallback() -> Self {
        Self {
            price: FALLBACK_PRICE_USD,
            origin: PriceOrigin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == PriceOrigin::Fallback
    }
}

/// `0 < price < 100`, and a real number.
pub fn is_plausible(price: f64) -> bool {
    price.is_finite() && price > MIN_PLAUSIBLE_PRICE && price < MAX_PLAUSIBLE_PRICE
}

impl MarketClient {
    /// Walks the feed list and returns the first plausible quote, or the
    /// fallback if there is none.
    pub async fn fetch_price(&self) -> PriceQuote {
        for feed in &self.feeds {
            match self.query_feed(feed).await {
                Some(price) if is_plausible(price) => {
                    debug!(source = ?feed.kind, price, "price quote accepted");
                    return PriceQuote {
                        price,
                        origin: PriceOrigin::Feed(feed.kind),
                    };
                }
                Some(price) => {
                    warn!(source = ?feed.kind, price, "implausible price quote ignored");
                }
                None => {}
            }
        }
        info!(price = FALLBACK_PRICE_USD, "all price feeds failed, using fallback");
        PriceQuote::fallback()
    }

    async fn query_feed(&self, feed: &PriceFeed) -> Option<f64> {
        let res = match self
            .http
            .get(&feed.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                warn!(source = ?feed.kind, error = %e, "price feed unreachable");
                return None;
            }
        };
        if !res.status().is_success() {
            warn!(source = ?feed.kind, status = %res.status(), "price feed returned an error");
            return None;
        }
        match res.json::<Value>().await {
            Ok(body) => {
                let price = feed.kind.extract(&body);
                if price.is_none() {
                    warn!(source = ?feed.kind, "price feed response had an unexpected shape");
                }
                price
            }
            Err(e) => {
                warn!(source = ?feed.kind, error = %e, "price feed response was not json");
                None
            }
        }
    }
}
