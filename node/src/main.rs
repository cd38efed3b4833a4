// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Zeref Vault Client
//!
//! Entry point for the `zeref` binary. Parses CLI arguments, initializes
//! logging, and either serves the JSON API or runs one command and prints
//! its result as JSON on stdout.
//!
//! - `serve`              : JSON API plus Prometheus metrics
//! - `portfolio`/`balance`/`price` : market data
//! - `vault …`            : read-only vault queries
//! - `deposit`/`withdraw` : submit through the wallet bridge
//! - `version`            : build information

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::signal;

use zeref_protocol::config::ClientConfig;
use zeref_protocol::market::MarketClient;
use zeref_protocol::portfolio::PortfolioService;
use zeref_protocol::session::Session;
use zeref_protocol::vault::{
    translate_error, validate_deposit_amount, ActionKind, ActionPhase, VaultAction, VaultClient,
    VaultError,
};

use cli::{ActionArgs, Commands, GlobalArgs, ServeArgs, VaultCommand, ZerefCli};
use logging::LogFormat;
use metrics::ApiMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ZerefCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(
        logging::DEFAULT_DIRECTIVE,
        LogFormat::from_str_lossy(&cli.global.log_format),
    );
    let config = client_config(&cli.global);

    match cli.command {
        Commands::Serve(args) => serve(args, config).await,
        Commands::Portfolio(args) => {
            let service = PortfolioService::new(market_client(&config)?);
            print_json(&service.get_portfolio(&args.address).await)
        }
        Commands::Balance(args) => {
            let market = market_client(&config)?;
            print_json(&market.fetch_balance(&args.address).await)
        }
        Commands::Price => print_json(&market_client(&config)?.fetch_price().await),
        Commands::Vault(cmd) => run_vault_query(cmd, &config).await,
        Commands::Deposit(args) => run_action(ActionKind::Deposit, args, &config).await,
        Commands::Withdraw(args) => run_action(ActionKind::Withdraw, args, &config).await,
        Commands::Version => Ok(()),
    }
}

/// Assembles the library config from CLI flags and environment.
fn client_config(global: &GlobalArgs) -> ClientConfig {
    let mut config = ClientConfig::new(global.network, global.vault.clone());
    config.api_base_override = global.api_base.clone();
    config.share_token = global.share_token.clone();
    config.wallet_bridge = global.wallet_bridge.clone();
    config
}

fn market_client(config: &ClientConfig) -> Result<MarketClient> {
    MarketClient::new(config).context("failed to build HTTP client")
}

fn vault_client(config: &ClientConfig, session: Session) -> Result<VaultClient> {
    VaultClient::from_config(config, session).context("failed to build vault client")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{}", text);
    Ok(())
}

/// Runs one read-only vault query.
async fn run_vault_query(cmd: VaultCommand, config: &ClientConfig) -> Result<()> {
    let vault = vault_client(config, Session::new())?;
    // Contract errors are shown the way a user would see them.
    let fail = |e: VaultError| anyhow::anyhow!(translate_error(&e));

    match cmd {
        VaultCommand::Stats => print_json(&vault.get_vault_stats().await.map_err(fail)?),
        VaultCommand::Status => print_json(&vault.check_vault_status().await),
        VaultCommand::Rate => {
            let rate = vault.get_exchange_rate().await.map_err(fail)?;
            print_json(&serde_json::json!({ "raw": rate.raw(), "ratio": rate.as_ratio() }))
        }
        VaultCommand::UserBalance(args) => {
            print_json(&vault.get_user_balance(&args.address).await.map_err(fail)?)
        }
        VaultCommand::TokenBalance(args) => print_json(
            &vault
                .get_share_token_balance(&args.address)
                .await
                .map_err(fail)?,
        ),
        VaultCommand::PreviewDeposit(args) => {
            let amount = validate_deposit_amount(&args.amount)?;
            let shares = vault.preview_deposit(amount).await.map_err(fail)?;
            print_json(&serde_json::json!({ "amount": amount, "shares": shares }))
        }
        VaultCommand::PreviewWithdraw(args) => {
            let shares = validate_deposit_amount(&args.amount)?;
            let amount = vault.preview_withdraw(shares).await.map_err(fail)?;
            print_json(&serde_json::json!({ "shares": shares, "amount": amount }))
        }
    }
}

/// Drives one deposit or withdraw through the action state machine.
async fn run_action(kind: ActionKind, args: ActionArgs, config: &ClientConfig) -> Result<()> {
    if config.wallet_bridge.is_none() {
        bail!("--wallet-bridge (or ZEREF_WALLET_BRIDGE) is required to submit transactions");
    }
    let session = Session::signed_in(args.address.clone());
    let vault = Arc::new(vault_client(config, session)?);
    let action = VaultAction::new(kind, vault);

    let outcome = action
        .run(&args.amount)
        .await
        .context("action already in flight")?;
    print_json(&outcome.phase)?;

    match (&outcome.phase, outcome.refresh) {
        (ActionPhase::Accepted { .. }, Some(refresh)) if !args.no_refresh => {
            match refresh.await.context("refresh task panicked")? {
                Ok(balance) => print_json(&balance),
                Err(e) => {
                    tracing::warn!(error = %e, "post-submit balance refresh failed");
                    Ok(())
                }
            }
        }
        (ActionPhase::Accepted { .. }, _) => Ok(()),
        (ActionPhase::Cancelled, _) => Ok(()),
        (ActionPhase::Failed { message }, _) => bail!("{}", message),
        (other, _) => bail!("action ended in unexpected phase {}", other.name()),
    }
}

/// Serves the JSON API and the metrics endpoint until a shutdown signal.
async fn serve(args: ServeArgs, config: ClientConfig) -> Result<()> {
    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        network = %config.network,
        api_base = config.api_base(),
        vault = %config.vault,
        "starting zeref api"
    );

    let market = market_client(&config)?;
    if !market.check_api_status().await {
        tracing::warn!(api_base = config.api_base(), "stacks api did not answer the status probe");
    }

    let api_metrics = Arc::new(ApiMetrics::new());
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: config.network.to_string(),
        vault: Arc::new(vault_client(&config, Session::new())?),
        portfolio: PortfolioService::new(market),
        metrics: Arc::clone(&api_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&api_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("zeref api stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("zeref {}", env!("CARGO_PKG_VERSION"));
    println!("rustc {}", rustc_version());
}

fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
