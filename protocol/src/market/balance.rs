//! # Account Balance Lookup
//!
//! One GET against the Stacks API per call. A 404 means the address has
//! never been funded, which is a perfectly good zero balance. Everything
//! else that goes wrong means "we don't know" and yields `None`.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::MarketClient;
use crate::address::is_valid_address;
use crate::amount::to_display_units;
use crate::http;

/// STX account figures, all in micro-units.
///
/// Serialized as decimal strings, the same way the Stacks API reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    #[serde(with = "micro_string")]
    pub balance: u64,
    #[serde(with = "micro_string")]
    pub total_sent: u64,
    #[serde(with = "micro_string")]
    pub total_received: u64,
    #[serde(with = "micro_string")]
    pub locked: u64,
}

impl AccountBalance {
    /// The record reported for an address the API has never seen.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Spendable balance in display units.
    pub fn balance_display(&self) -> f64 {
        to_display_units(self.balance)
    }
}

mod micro_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let text = String::deserialize(d)?;
        text.trim().parse().map_err(de::Error::custom)
    }
}

/// Wire shape: integer strings, any of which may be absent.
#[derive(Debug, Deserialize)]
struct StxBalanceResponse {
    #[serde(default)]
    balance: Option<String>,
    #[serde(default)]
    total_sent: Option<String>,
    #[serde(default)]
    total_received: Option<String>,
    #[serde(default)]
    locked: Option<String>,
}

impl StxBalanceResponse {
    fn into_balance(self) -> Option<AccountBalance> {
        fn micro(field: Option<String>) -> Option<u64> {
            match field {
                None => Some(0),
                Some(s) => s.trim().parse().ok(),
            }
        }
        Some(AccountBalance {
            balance: micro(self.balance)?,
            total_sent: micro(self.total_sent)?,
            total_received: micro(self.total_received)?,
            locked: micro(self.locked)?,
        })
    }
}

impl MarketClient {
    /// Fetches the STX balance of `address`.
    ///
    /// Returns the zero record on 404 and `None` on any other failure. A
    /// malformed address is logged and looked up anyway; the API has the
    /// final word on what exists.
    pub async fn fetch_balance(&self, address: &str) -> Option<AccountBalance> {
        if !is_valid_address(address) {
            warn!(address, "address failed shape check, fetching anyway");
        }

        let url = match http::endpoint(&self.api_base, &["extended", "v1", "address", address, "stx"])
        {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build balance url");
                return None;
            }
        };

        debug!(%url, "fetching account balance");
        let res = match self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                warn!(address, error = %e, "balance request failed");
                return None;
            }
        };

        match res.status() {
            StatusCode::NOT_FOUND => {
                debug!(address, "address unknown to the API, reporting zero balance");
                Some(AccountBalance::zero())
            }
            status if status.is_success() => match res.json::<StxBalanceResponse>().await {
                Ok(body) => {
                    let balance = body.into_balance();
                    if balance.is_none() {
                        warn!(address, "balance response carried non-integer fields");
                    }
                    balance
                }
                Err(e) => {
                    warn!(address, error = %e, "undecodable balance response");
                    None
                }
            },
            status => {
                let body = res.text().await.unwrap_or_default();
                warn!(address, %status, body = %body, "balance lookup rejected");
                None
            }
        }
    }

    /// Probes `{api_base}/extended/v1/status`. `true` when the API answers
    /// with a success status.
    pub async fn check_api_status(&self) -> bool {
        let url = match http::endpoint(&self.api_base, &["extended", "v1", "status"]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.http.get(url).send().await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                debug!(error = %e, "api status probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_record_is_all_zeros() {
        let zero = AccountBalance::zero();
        assert_eq!(zero.balance, 0);
        assert_eq!(zero.total_sent, 0);
        assert_eq!(zero.total_received, 0);
        assert_eq!(zero.locked, 0);
    }

    #[test]
    fn wire_strings_become_micro_units() {
        let raw: StxBalanceResponse = serde_json::from_str(
            r#"{"balance":"2500000","total_sent":"100","total_received":"2500100","locked":"0"}"#,
        )
        .unwrap();
        let balance = raw.into_balance().unwrap();
        assert_eq!(balance.balance, 2_500_000);
        assert_eq!(balance.total_received, 2_500_100);
        assert!((balance.balance_display() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let raw: StxBalanceResponse = serde_json::from_str(r#"{"balance":"7"}"#).unwrap();
        assert_eq!(
            raw.into_balance(),
            Some(AccountBalance {
                balance: 7,
                ..AccountBalance::zero()
            })
        );
    }

    #[test]
    fn garbage_fields_make_balance_unknown() {
        let raw: StxBalanceResponse =
            serde_json::from_str(r#"{"balance":"lots","locked":"0"}"#).unwrap();
        assert_eq!(raw.into_balance(), None);
    }

    #[test]
    fn zero_record_serializes_as_strings() {
        let json = serde_json::to_value(AccountBalance::zero()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "balance": "0",
                "totalSent": "0",
                "totalReceived": "0",
                "locked": "0"
            })
        );
    }

    #[test]
    fn string_fields_deserialize_back() {
        let balance: AccountBalance = serde_json::from_str(
            r#"{"balance":"2500000","totalSent":"1","totalReceived":"2500001","locked":"0"}"#,
        )
        .unwrap();
        assert_eq!(balance.balance, 2_500_000);
        assert_eq!(balance.total_sent, 1);
    }
}
