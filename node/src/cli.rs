//! # CLI Interface
//!
//! Command-line structure for `zeref` using `clap` derive. Global flags
//! pick the network and contracts; subcommands either serve the JSON API
//! or run a single query or action and print the result as JSON.

use clap::{Args, Parser, Subcommand};

use zeref_protocol::address::ContractId;
use zeref_protocol::config::Network;

/// Zeref vault client.
///
/// Reads balances, prices and vault state from Stacks, and hands deposits
/// and withdrawals to a wallet bridge for signing.
#[derive(Parser, Debug)]
#[command(
    name = "zeref",
    about = "Zeref yield vault client",
    version,
    propagate_version = true
)]
pub struct ZerefCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Stacks network: mainnet or testnet.
    #[arg(long, global = true, env = "ZEREF_NETWORK", default_value = "testnet")]
    pub network: Network,

    /// Stacks API base URL; overrides the network default.
    #[arg(long, global = true, env = "ZEREF_API_BASE")]
    pub api_base: Option<String>,

    /// Vault contract as `<address>.<name>`.
    #[arg(
        long,
        global = true,
        env = "ZEREF_VAULT",
        default_value = "ST1HTBVD3JG9C05J7HBJTHGR0GGW7KXW28M5JS8QE.zeref-vault"
    )]
    pub vault: ContractId,

    /// Share-token contract as `<address>.<name>`.
    #[arg(long, global = true, env = "ZEREF_SHARE_TOKEN")]
    pub share_token: Option<ContractId>,

    /// Wallet bridge base URL for deposits and withdrawals.
    #[arg(long, global = true, env = "ZEREF_WALLET_BRIDGE")]
    pub wallet_bridge: Option<String>,

    /// Log output format: pretty or json.
    #[arg(long, global = true, env = "ZEREF_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the JSON API and Prometheus metrics.
    Serve(ServeArgs),
    /// Balance × price for an address.
    Portfolio(AddressArgs),
    /// STX balance of an address.
    Balance(AddressArgs),
    /// Current STX/USD price.
    Price,
    /// Read-only vault queries.
    #[command(subcommand)]
    Vault(VaultCommand),
    /// Deposit into the vault through the wallet bridge.
    Deposit(ActionArgs),
    /// Withdraw shares from the vault through the wallet bridge.
    Withdraw(ActionArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Exchange rate, total underlying and total shares.
    Stats,
    /// Paused or open.
    Status,
    /// Current exchange rate.
    Rate,
    /// A user's shares and estimated amount.
    UserBalance(AddressArgs),
    /// Share-token balance of an address.
    TokenBalance(AddressArgs),
    /// Shares minted for a deposit of AMOUNT STX.
    PreviewDeposit(AmountArgs),
    /// STX paid out for SHARES shares.
    PreviewWithdraw(AmountArgs),
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the JSON API.
    #[arg(long, env = "ZEREF_PORT", default_value_t = 8787)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ZEREF_METRICS_PORT", default_value_t = 9788)]
    pub metrics_port: u16,

    /// Address to bind both listeners to.
    #[arg(long, env = "ZEREF_BIND", default_value = "127.0.0.1")]
    pub bind: String,
}

#[derive(Args, Debug)]
pub struct AddressArgs {
    /// Stacks address.
    pub address: String,
}

#[derive(Args, Debug)]
pub struct AmountArgs {
    /// Amount in display units, e.g. `12.5`.
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct ActionArgs {
    /// Amount in display units, e.g. `12.5`.
    pub amount: String,

    /// Signed-in address the wallet will sign for.
    #[arg(long, env = "ZEREF_ADDRESS")]
    pub address: String,

    /// Skip waiting for the post-submit balance refresh.
    #[arg(long)]
    pub no_refresh: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        ZerefCli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = ZerefCli::try_parse_from([
            "zeref",
            "vault",
            "preview-deposit",
            "1.5",
            "--network",
            "mainnet",
            "--vault",
            "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.zeref-vault",
        ])
        .unwrap();
        assert_eq!(cli.global.network, Network::Mainnet);
        assert_eq!(cli.global.vault.name, "zeref-vault");
        match cli.command {
            Commands::Vault(VaultCommand::PreviewDeposit(args)) => assert_eq!(args.amount, "1.5"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn network_flag_accepts_aliases() {
        let cli = ZerefCli::try_parse_from(["zeref", "price", "--network", "Production"]).unwrap();
        assert_eq!(cli.global.network, Network::Mainnet);
        let cli = ZerefCli::try_parse_from(["zeref", "price", "--network", "development"]).unwrap();
        assert_eq!(cli.global.network, Network::Testnet);
        assert!(ZerefCli::try_parse_from(["zeref", "price", "--network", "devnet"]).is_err());
    }

    #[test]
    fn rejects_malformed_vault_id() {
        assert!(ZerefCli::try_parse_from(["zeref", "price", "--vault", "no-dot-here"]).is_err());
    }
}
