//! End-to-end tests against local fakes.
//!
//! Every test stands up an axum server on an ephemeral port playing the
//! Stacks API, the price feeds and the wallet bridge, then drives the real
//! HTTP clients against it. Nothing leaves 127.0.0.1.

use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

use zeref_protocol::address::ContractId;
use zeref_protocol::clarity::ClarityValue;
use zeref_protocol::config::{Network, FALLBACK_PRICE_USD, REQUEST_TIMEOUT};
use zeref_protocol::http;
use zeref_protocol::market::{
    AccountBalance, MarketClient, PriceFeed, PriceOrigin, PriceSourceKind,
};
use zeref_protocol::portfolio::PortfolioService;
use zeref_protocol::session::Session;
use zeref_protocol::vault::{
    ContractErrorCode, ExchangeRate, HttpContractReader, HttpWalletBridge, StatusSignal,
    VaultBalance, VaultClient, VaultError,
};

const VAULT_ADDR: &str = "ST1HTBVD3JG9C05J7HBJTHGR0GGW7KXW28M5JS8QE";
const USER: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
const STRANGER: &str = "SP000000000000000000002Q6VF78";

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Serves `app` on an ephemeral port and returns its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

fn feeds(base: &str) -> Vec<PriceFeed> {
    vec![
        PriceFeed::new(PriceSourceKind::CoinGecko, format!("{}/coingecko", base)),
        PriceFeed::new(PriceSourceKind::Coinbase, format!("{}/coinbase", base)),
        PriceFeed::new(PriceSourceKind::Binance, format!("{}/binance", base)),
    ]
}

fn market(base: &str) -> MarketClient {
    MarketClient::with_client(reqwest::Client::new(), base, feeds(base))
}

fn vault_id() -> ContractId {
    ContractId::new(VAULT_ADDR, "zeref-vault")
}

fn stx_balance_routes() -> Router {
    Router::new()
        .route(
            "/extended/v1/address/:address/stx",
            get(|Path(address): Path<String>| async move {
                match address.as_str() {
                    USER => (
                        StatusCode::OK,
                        Json(json!({
                            "balance": "2500000",
                            "total_sent": "500000",
                            "total_received": "3000000",
                            "locked": "0"
                        })),
                    )
                        .into_response(),
                    STRANGER => StatusCode::NOT_FOUND.into_response(),
                    _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                }
            }),
        )
        .route("/extended/v1/status", get(|| async { Json(json!({"status": "ready"})) }))
}

fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

/// A fake vault that answers call-read with fixed values and records the
/// requests it saw.
#[derive(Clone, Default)]
struct FakeVault {
    paused: bool,
    seen: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeVault {
    fn answer(&self, function: &str, args: &[ClarityValue]) -> Value {
        let ok = |v: ClarityValue| ClarityValue::ResponseOk(Box::new(v));
        let result = match function {
            _ if self.paused => ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(100))),
            "get-exchange-rate" => ok(ClarityValue::UInt(1_050_000)),
            "get-total-underlying" => ok(ClarityValue::UInt(10_500_000)),
            "get-total-shares" => ok(ClarityValue::UInt(10_000_000)),
            "get-user-balance" => {
                let fields = [
                    ("shares".to_string(), ClarityValue::UInt(2_000_000)),
                    ("est-amount".to_string(), ClarityValue::UInt(2_100_000)),
                ];
                ok(ClarityValue::Tuple(fields.into_iter().collect()))
            }
            "preview-deposit" => match args.first() {
                Some(ClarityValue::UInt(amount)) => ok(ClarityValue::UInt(amount * 100 / 105)),
                _ => return json!({"okay": false, "cause": "bad arguments"}),
            },
            _ => return json!({"okay": false, "cause": "Unchecked(UndefinedFunction)"}),
        };
        json!({"okay": true, "result": result.to_hex()})
    }

    fn router(self) -> Router {
        Router::new().route(
            "/v2/contracts/call-read/:address/:name/:function",
            post(
                move |Path((address, name, function)): Path<(String, String, String)>,
                      Json(body): Json<Value>| {
                    let vault = self.clone();
                    async move {
                        if address != VAULT_ADDR || name != "zeref-vault" {
                            return (StatusCode::NOT_FOUND, Json(json!({"error": "no contract"})));
                        }
                        let args: Vec<ClarityValue> = body["arguments"]
                            .as_array()
                            .map(|a| {
                                a.iter()
                                    .filter_map(|h| h.as_str())
                                    .filter_map(|h| ClarityValue::from_hex(h).ok())
                                    .collect()
                            })
                            .unwrap_or_default();
                        vault.seen.lock().push((function.clone(), body));
                        (StatusCode::OK, Json(vault.answer(&function, &args)))
                    }
                },
            ),
        )
    }
}

fn reader_client(base: &str, session: Session) -> VaultClient {
    VaultClient::new(
        vault_id(),
        Network::Testnet,
        Arc::new(HttpContractReader::new(reqwest::Client::new(), base)),
        Arc::new(HttpWalletBridge::new(reqwest::Client::new(), base)),
        session,
    )
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_lookup_distinguishes_zero_from_unknown() {
    let base = serve(stx_balance_routes()).await;
    let market = market(&base);

    let known = market.fetch_balance(USER).await.expect("known balance");
    assert_eq!(
        known,
        AccountBalance {
            balance: 2_500_000,
            total_sent: 500_000,
            total_received: 3_000_000,
            locked: 0,
        }
    );

    assert_eq!(market.fetch_balance(STRANGER).await, Some(AccountBalance::zero()));
    assert_eq!(market.fetch_balance(VAULT_ADDR).await, None);
    assert!(market.check_api_status().await);
}

#[tokio::test]
async fn unreachable_api_means_unknown_balance() {
    let market = MarketClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9", vec![]);
    assert_eq!(market.fetch_balance(USER).await, None);
    assert!(!market.check_api_status().await);
}

#[tokio::test]
async fn first_plausible_price_wins() {
    let app = Router::new()
        .route("/coingecko", get(|| async { Json(json!({"stacks": {"usd": 250.0}})) }))
        .route(
            "/coinbase",
            get(|| async { Json(json!({"data": {"rates": {"USD": "0.71"}}})) }),
        )
        .route("/binance", get(|| async { Json(json!({"price": "0.90"})) }));
    let base = serve(app).await;

    let quote = market(&base).fetch_price().await;
    assert_eq!(quote.price, 0.71);
    assert_eq!(quote.origin, PriceOrigin::Feed(PriceSourceKind::Coinbase));
}

#[tokio::test]
async fn all_feeds_down_uses_fallback() {
    let app = Router::new()
        .route("/coingecko", get(|| async { unavailable() }))
        .route("/coinbase", get(|| async { "not json" }))
        .route("/binance", get(|| async { Json(json!({"symbol": "STXUSDT"})) }));
    let base = serve(app).await;

    let quote = market(&base).fetch_price().await;
    assert_eq!(quote.price, 0.65);
    assert!(quote.is_fallback());
}

#[tokio::test]
async fn refused_feeds_fall_back_within_request_timeout() {
    let closed = "http://127.0.0.1:9";
    let client = http::build_client(REQUEST_TIMEOUT).expect("client");
    let market = MarketClient::with_client(client, closed, feeds(closed));

    let started = std::time::Instant::now();
    let quote = market.fetch_price().await;

    assert_eq!(quote.origin, PriceOrigin::Fallback);
    assert_eq!(quote.price, FALLBACK_PRICE_USD);
    assert_eq!(quote.price, 0.65);
    assert!(started.elapsed() < REQUEST_TIMEOUT);
}

#[tokio::test]
async fn portfolio_multiplies_balance_by_price() {
    let app = stx_balance_routes()
        .route("/coingecko", get(|| async { Json(json!({"stacks": {"usd": 2.0}})) }));
    let base = serve(app).await;
    let service = PortfolioService::new(market(&base));

    let p = service.get_portfolio(USER).await;
    assert!(p.balance_known);
    assert_eq!(p.balance, 2.5);
    assert_eq!(p.price, 2.0);
    assert_eq!(p.total_value, 5.0);
    assert_eq!(p.price_origin, PriceOrigin::Feed(PriceSourceKind::CoinGecko));

    // Unknown balance: zero value, flagged, price still present.
    let p = service.get_portfolio(VAULT_ADDR).await;
    assert!(!p.balance_known);
    assert_eq!(p.total_value, 0.0);
    assert_eq!(p.price, 2.0);
}

// ---------------------------------------------------------------------------
// Vault reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vault_reads_over_http() {
    let fake = FakeVault::default();
    let seen = fake.seen.clone();
    let base = serve(fake.router()).await;
    let client = reader_client(&base, Session::new());

    let stats = client.get_vault_stats().await.expect("stats");
    assert_eq!(stats.exchange_rate, ExchangeRate(1_050_000));
    assert_eq!(stats.total_underlying, 10_500_000);
    assert_eq!(stats.total_shares, 10_000_000);

    assert_eq!(
        client.get_user_balance(USER).await,
        Ok(VaultBalance {
            shares: 2_000_000,
            estimated_amount: 2_100_000,
        })
    );
    assert_eq!(client.preview_deposit(1_050_000).await, Ok(1_000_000));

    let seen = seen.lock();
    let (_, balance_call) = seen
        .iter()
        .find(|(f, _)| f == "get-user-balance")
        .expect("user balance call");
    assert_eq!(balance_call["sender"], USER);
    assert_eq!(
        balance_call["arguments"][0],
        ClarityValue::principal(USER).unwrap().to_hex()
    );
    let (_, rate_call) = seen
        .iter()
        .find(|(f, _)| f == "get-exchange-rate")
        .expect("rate call");
    assert_eq!(rate_call["sender"], VAULT_ADDR);
}

#[tokio::test]
async fn rejected_call_is_query_failure() {
    let base = serve(FakeVault::default().router()).await;
    let client = reader_client(&base, Session::new());
    let err = client.preview_withdraw(1).await.unwrap_err();
    assert!(matches!(err, VaultError::QueryFailed { ref function, .. } if function == "preview-withdraw"));
}

#[tokio::test]
async fn paused_vault_is_detected() {
    let fake = FakeVault {
        paused: true,
        ..FakeVault::default()
    };
    let base = serve(fake.router()).await;
    let client = reader_client(&base, Session::new());

    let status = client.check_vault_status().await;
    assert!(status.is_paused);
    assert!(!status.can_deposit);
    assert_eq!(status.signal, StatusSignal::PausedCode);

    assert!(matches!(
        client.get_vault_stats().await,
        Err(VaultError::Contract {
            code: Some(ContractErrorCode::Paused),
            ..
        })
    ));
}

#[tokio::test]
async fn unreachable_node_is_inconclusive() {
    let client = reader_client("http://127.0.0.1:9", Session::new());
    let status = client.check_vault_status().await;
    assert!(!status.is_paused);
    assert!(status.can_deposit);
    assert!(matches!(status.signal, StatusSignal::Inconclusive { .. }));
}

// ---------------------------------------------------------------------------
// Wallet bridge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deposit_through_wallet_bridge() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::default();
    let record = seen.clone();
    let app = Router::new().route(
        "/contract-call",
        post(move |Json(body): Json<Value>| {
            let record = record.clone();
            async move {
                *record.lock() = Some(body);
                Json(json!({"txId": "0x5eed"}))
            }
        }),
    );
    let base = serve(app).await;
    let client = reader_client(&base, Session::signed_in(USER));

    let receipt = client.deposit(1_000_000).await.expect("receipt");
    assert_eq!(receipt.tx_id, "0x5eed");
    assert_eq!(receipt.function, "deposit");

    let body = seen.lock().clone().expect("bridge called");
    assert_eq!(body["contractAddress"], VAULT_ADDR);
    assert_eq!(body["contractName"], "zeref-vault");
    assert_eq!(body["functionName"], "deposit");
    assert_eq!(body["functionArgs"][0], "0x01000000000000000000000000000f4240");
    assert_eq!(body["postConditionMode"], "allow");
}

#[tokio::test]
async fn wallet_cancellation_and_rejection() {
    let app = Router::new().route(
        "/contract-call",
        post(|Json(body): Json<Value>| async move {
            if body["functionName"] == "withdraw" {
                Json(json!({"cancelled": true}))
            } else {
                Json(json!({"error": "ConflictingNonceInMempool"}))
            }
        }),
    );
    let base = serve(app).await;
    let client = reader_client(&base, Session::signed_in(USER));

    assert_eq!(client.withdraw(1).await, Err(VaultError::UserCancelled));
    assert_eq!(
        client.deposit(1).await,
        Err(VaultError::SubmissionFailed("ConflictingNonceInMempool".into()))
    );
}

#[tokio::test]
async fn signed_out_user_never_reaches_bridge() {
    let calls = Arc::new(Mutex::new(0u32));
    let counter = calls.clone();
    let app = Router::new().route(
        "/contract-call",
        post(move || {
            let counter = counter.clone();
            async move {
                *counter.lock() += 1;
                Json(json!({"txId": "0x1"}))
            }
        }),
    );
    let base = serve(app).await;
    let client = reader_client(&base, Session::new());

    assert_eq!(client.deposit(1).await, Err(VaultError::NotSignedIn));
    assert_eq!(*calls.lock(), 0);
}
