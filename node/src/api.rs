//! # JSON API
//!
//! The dashboard's data layer over HTTP. Handlers are thin: they call the
//! library and serialize what comes back. Failures are reported with the
//! same translated message a user would see.
//!
//! ## Endpoints
//!
//! | Method | Path                               | Description                  |
//! |--------|------------------------------------|------------------------------|
//! | GET    | `/health`                          | Liveness probe               |
//! | GET    | `/price`                           | STX/USD quote                |
//! | GET    | `/accounts/:address/balance`       | STX balance or `null`        |
//! | GET    | `/portfolio/:address`              | Balance × price              |
//! | GET    | `/vault/stats`                     | Rate, underlying, shares     |
//! | GET    | `/vault/status`                    | Paused or open               |
//! | GET    | `/vault/balance/:address`          | User's vault position        |
//! | GET    | `/vault/preview/deposit?amount=`   | Shares for an amount         |
//! | GET    | `/vault/preview/withdraw?shares=`  | Amount for shares            |

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Path, Query, Request, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use zeref_protocol::amount::format_micro;
use zeref_protocol::portfolio::PortfolioService;
use zeref_protocol::vault::{
    translate_error, validate_deposit_amount, ErrorKind, VaultClient, VaultError,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub network: String,
    pub vault: Arc<VaultClient>,
    pub portfolio: PortfolioService,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the API router with CORS, tracing and per-route metrics.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/price", get(price_handler))
        .route("/accounts/:address/balance", get(account_balance_handler))
        .route("/portfolio/:address", get(portfolio_handler))
        .route("/vault/stats", get(vault_stats_handler))
        .route("/vault/status", get(vault_status_handler))
        .route("/vault/balance/:address", get(vault_balance_handler))
        .route("/vault/preview/deposit", get(preview_deposit_handler))
        .route("/vault/preview/withdraw", get(preview_withdraw_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_metrics(
    State(state): State<AppState>,
    matched: Option<MatchedPath>,
    req: Request,
    next: Next,
) -> Response {
    let route = matched
        .map(|m| m.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();
    let res = next.run(req).await;
    state
        .metrics
        .observe(&route, res.status(), started.elapsed().as_secs_f64());
    res
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Deserialize)]
pub struct DepositPreviewQuery {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawPreviewQuery {
    pub shares: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositPreview {
    /// Deposit in micro-units.
    pub amount: u64,
    pub shares: u64,
    pub shares_display: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawPreview {
    /// Shares in micro-units.
    pub shares: u64,
    pub amount: u64,
    pub amount_display: String,
}

/// Maps a [`VaultError`] onto a status code and translated message.
fn vault_error(state: &AppState, route: &str, err: VaultError) -> Response {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Session => StatusCode::UNAUTHORIZED,
        ErrorKind::UserCancelled => StatusCode::CONFLICT,
        ErrorKind::Transport | ErrorKind::Contract => {
            state
                .metrics
                .vault_query_failures_total
                .with_label_values(&[route])
                .inc();
            StatusCode::BAD_GATEWAY
        }
    };
    let error = match err.kind() {
        ErrorKind::Validation => err.to_string(),
        _ => translate_error(&err),
    };
    tracing::warn!(route, error = %err, "vault request failed");
    (
        status,
        Json(ErrorResponse {
            error,
            kind: err.kind(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up. Does not probe upstreams.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "network": state.network,
    }))
}

async fn price_handler(State(state): State<AppState>) -> impl IntoResponse {
    let quote = state.portfolio.market().fetch_price().await;
    if quote.is_fallback() {
        state.metrics.price_fallbacks_total.inc();
    }
    Json(quote)
}

/// `GET /accounts/:address/balance`: `null` when the balance is unknown.
async fn account_balance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let balance = state.portfolio.market().fetch_balance(&address).await;
    if balance.is_none() {
        state.metrics.balance_unknown_total.inc();
    }
    Json(balance)
}

async fn portfolio_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let portfolio = state.portfolio.get_portfolio(&address).await;
    if !portfolio.balance_known {
        state.metrics.balance_unknown_total.inc();
    }
    if portfolio.price_origin == zeref_protocol::market::PriceOrigin::Fallback {
        state.metrics.price_fallbacks_total.inc();
    }
    Json(portfolio)
}

async fn vault_stats_handler(State(state): State<AppState>) -> Response {
    match state.vault.get_vault_stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => vault_error(&state, "/vault/stats", e),
    }
}

async fn vault_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.vault.check_vault_status().await)
}

async fn vault_balance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.vault.get_user_balance(&address).await {
        Ok(balance) => Json(balance).into_response(),
        Err(e) => vault_error(&state, "/vault/balance/:address", e),
    }
}

async fn preview_deposit_handler(
    Query(query): Query<DepositPreviewQuery>,
    State(state): State<AppState>,
) -> Response {
    const ROUTE: &str = "/vault/preview/deposit";
    let amount = match validate_deposit_amount(&query.amount) {
        Ok(amount) => amount,
        Err(e) => return vault_error(&state, ROUTE, e),
    };
    match state.vault.preview_deposit(amount).await {
        Ok(shares) => Json(DepositPreview {
            amount,
            shares,
            shares_display: format_micro(shares),
        })
        .into_response(),
        Err(e) => vault_error(&state, ROUTE, e),
    }
}

async fn preview_withdraw_handler(
    Query(query): Query<WithdrawPreviewQuery>,
    State(state): State<AppState>,
) -> Response {
    const ROUTE: &str = "/vault/preview/withdraw";
    let shares = match validate_deposit_amount(&query.shares) {
        Ok(shares) => shares,
        Err(e) => return vault_error(&state, ROUTE, e),
    };
    match state.vault.preview_withdraw(shares).await {
        Ok(amount) => Json(WithdrawPreview {
            shares,
            amount,
            amount_display: format_micro(amount),
        })
        .into_response(),
        Err(e) => vault_error(&state, ROUTE, e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use zeref_protocol::address::ContractId;
    use zeref_protocol::clarity::ClarityValue;
    use zeref_protocol::config::Network;
    use zeref_protocol::market::MarketClient;
    use zeref_protocol::session::Session;
    use zeref_protocol::vault::{ContractReader, NoSigner, ReadError};

    const VAULT_ADDR: &str = "ST1HTBVD3JG9C05J7HBJTHGR0GGW7KXW28M5JS8QE";
    const USER: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

    /// A vault that is either open with fixed numbers or paused.
    struct FixedReader {
        paused: bool,
    }

    #[async_trait]
    impl ContractReader for FixedReader {
        async fn call_read_only(
            &self,
            _contract: &ContractId,
            function: &str,
            args: &[ClarityValue],
            _sender: &str,
        ) -> Result<ClarityValue, ReadError> {
            if self.paused {
                return Ok(ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(100))));
            }
            let v = match (function, args.first()) {
                ("get-exchange-rate", _) => 1_000_000,
                ("get-total-underlying", _) | ("get-total-shares", _) => 42_000_000,
                ("preview-deposit", Some(ClarityValue::UInt(a))) => *a / 2,
                ("preview-withdraw", Some(ClarityValue::UInt(s))) => *s * 2,
                _ => return Err(ReadError::Rejected("Unchecked(UndefinedFunction)".into())),
            };
            Ok(ClarityValue::ResponseOk(Box::new(ClarityValue::UInt(v))))
        }
    }

    fn test_app_state(paused: bool) -> AppState {
        let vault = VaultClient::new(
            ContractId::new(VAULT_ADDR, "zeref-vault"),
            Network::Testnet,
            Arc::new(FixedReader { paused }),
            Arc::new(NoSigner),
            Session::new(),
        );
        // Nothing listens on the discard port; every market lookup degrades.
        let market = MarketClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9", vec![]);
        AppState {
            version: "0.1.0-test".into(),
            network: "testnet".into(),
            vault: Arc::new(vault),
            portfolio: PortfolioService::new(market),
            metrics: Arc::new(crate::metrics::ApiMetrics::new()),
        }
    }

    /// Sends a GET request and returns (status, parsed JSON body).
    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_version() {
        let router = create_router(test_app_state(false));
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["network"], "testnet");
    }

    #[tokio::test]
    async fn price_without_feeds_is_fallback() {
        let state = test_app_state(false);
        let metrics = state.metrics.clone();
        let router = create_router(state);
        let (status, body) = get(&router, "/price").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 0.65);
        assert_eq!(body["origin"]["source"], "fallback");
        assert_eq!(metrics.price_fallbacks_total.get(), 1);
    }

    #[tokio::test]
    async fn unknown_balance_is_null() {
        let router = create_router(test_app_state(false));
        let (status, body) = get(&router, &format!("/accounts/{}/balance", USER)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn portfolio_degrades_to_zero() {
        let router = create_router(test_app_state(false));
        let (status, body) = get(&router, &format!("/portfolio/{}", USER)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balanceKnown"], false);
        assert_eq!(body["totalValue"], 0.0);
        assert_eq!(body["price"], 0.65);
    }

    #[tokio::test]
    async fn vault_stats_ok() {
        let router = create_router(test_app_state(false));
        let (status, body) = get(&router, "/vault/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exchangeRate"], 1_000_000);
        assert_eq!(body["totalUnderlying"], 42_000_000);
        assert_eq!(body["totalShares"], 42_000_000);
    }

    #[tokio::test]
    async fn paused_vault_stats_is_bad_gateway() {
        let state = test_app_state(true);
        let metrics = state.metrics.clone();
        let router = create_router(state);
        let (status, body) = get(&router, "/vault/stats").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"],
            "⚠️ Vault is currently paused. Please try again later or contact support."
        );
        assert_eq!(body["kind"], "contract");
        assert_eq!(
            metrics
                .vault_query_failures_total
                .with_label_values(&["/vault/stats"])
                .get(),
            1
        );

        let (status, body) = get(&router, "/vault/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isPaused"], true);
        assert_eq!(body["canDeposit"], false);
    }

    #[tokio::test]
    async fn preview_validates_before_querying() {
        let router = create_router(test_app_state(false));

        let (status, body) = get(&router, "/vault/preview/deposit?amount=0.0000001").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");

        let (status, body) = get(&router, "/vault/preview/deposit?amount=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], 3_000_000);
        assert_eq!(body["shares"], 1_500_000);
        assert_eq!(body["sharesDisplay"], "1.5");

        let (status, body) = get(&router, "/vault/preview/withdraw?shares=1.5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], 3_000_000);
    }

    #[tokio::test]
    async fn malformed_address_is_bad_request() {
        let router = create_router(test_app_state(false));
        let (status, body) = get(&router, "/vault/balance/not-an-address").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn requests_are_counted() {
        let state = test_app_state(false);
        let metrics = state.metrics.clone();
        let router = create_router(state);
        get(&router, "/health").await;
        get(&router, "/health").await;
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["/health", "2xx"])
                .get(),
            2
        );
    }
}
