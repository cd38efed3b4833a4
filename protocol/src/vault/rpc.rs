//! Read-only contract calls.
//!
//! [`ContractReader`] is the seam between the vault client and the Stacks
//! node. Production code uses [`HttpContractReader`]; tests swap in
//! in-memory readers.
//!
//! ```text
//! POST {api_base}/v2/contracts/call-read/{address}/{name}/{function}
//!   {"sender": "ST…", "arguments": ["0x01…"]}
//! ← {"okay": true,  "result": "0x07…"}
//! ← {"okay": false, "cause":  "Unchecked(…)"}
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::address::ContractId;
use crate::clarity::{ClarityError, ClarityValue};
use crate::http;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The node evaluated the call and refused it.
    #[error("call rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("undecodable result: {0}")]
    Decode(#[from] ClarityError),
}

/// Evaluates read-only contract functions.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn call_read_only(
        &self,
        contract: &ContractId,
        function: &str,
        args: &[ClarityValue],
        sender: &str,
    ) -> Result<ClarityValue, ReadError>;
}

#[derive(Debug, Serialize)]
struct CallReadRequest<'a> {
    sender: &'a str,
    arguments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CallReadResponse {
    okay: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

/// [`ContractReader`] backed by a Stacks API node.
#[derive(Debug, Clone)]
pub struct HttpContractReader {
    http: Client,
    api_base: String,
}

impl HttpContractReader {
    pub fn new(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn parse_response(res: reqwest::Response) -> Result<ClarityValue, ReadError> {
        match res.status() {
            StatusCode::OK => {
                let body: CallReadResponse = res
                    .json()
                    .await
                    .map_err(|e| ReadError::Malformed(e.to_string()))?;
                if !body.okay {
                    return Err(ReadError::Rejected(
                        body.cause.unwrap_or_else(|| "no cause given".into()),
                    ));
                }
                let hex = body
                    .result
                    .ok_or_else(|| ReadError::Malformed("okay response without result".into()))?;
                Ok(ClarityValue::from_hex(&hex)?)
            }
            status => {
                let body = res.text().await.unwrap_or_default();
                warn!(%status, body = %body, "call-read failed");
                Err(ReadError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl ContractReader for HttpContractReader {
    async fn call_read_only(
        &self,
        contract: &ContractId,
        function: &str,
        args: &[ClarityValue],
        sender: &str,
    ) -> Result<ClarityValue, ReadError> {
        let url = http::endpoint(
            &self.api_base,
            &[
                "v2",
                "contracts",
                "call-read",
                &contract.address,
                &contract.name,
                function,
            ],
        )
        .map_err(ReadError::Transport)?;

        debug!(contract = %contract, function, "call-read");
        let res = self
            .http
            .post(url)
            .json(&CallReadRequest {
                sender,
                arguments: args.iter().map(ClarityValue::to_hex).collect(),
            })
            .send()
            .await
            .map_err(|e| ReadError::Transport(e.to_string()))?;

        Self::parse_response(res).await
    }
}
