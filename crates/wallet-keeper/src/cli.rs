use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use rust_decimal::Decimal;

use wallet_keeper_core::Coin;

/// wallet-keeper: one coin-agnostic HTTP wallet API over Bitcoin, Omni Layer
/// and Ethereum wallet daemons.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Address the HTTP API listens on.
    #[arg(long, default_value = "127.0.0.1:8000", env = "WALLET_KEEPER_HTTP_LISTEN_ADDR")]
    pub http_listen_addr: SocketAddr,

    /// Backends to serve, comma separated.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "btc",
        env = "WALLET_KEEPER_BACKENDS"
    )]
    pub backends: Vec<Coin>,

    /// Directory for the gateway log and per-backend transfer journals.
    #[arg(long, env = "WALLET_KEEPER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Deadline for one daemon call, in seconds.
    #[arg(
        long,
        default_value = "30",
        env = "WALLET_KEEPER_RPC_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rpc_timeout_secs: u64,

    /// Outbound request ceiling per backend (optional).
    #[arg(long, env = "WALLET_KEEPER_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// Bitcoin daemon RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "WALLET_KEEPER_BTC_RPC_ADDR")]
    pub btc_rpc_addr: String,

    #[arg(long, env = "WALLET_KEEPER_BTC_RPC_USER")]
    pub btc_rpc_user: Option<String>,

    #[arg(long, env = "WALLET_KEEPER_BTC_RPC_PASS")]
    pub btc_rpc_pass: Option<String>,

    /// Omni Core daemon RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:18332", env = "WALLET_KEEPER_USDT_RPC_ADDR")]
    pub usdt_rpc_addr: String,

    #[arg(long, env = "WALLET_KEEPER_USDT_RPC_USER")]
    pub usdt_rpc_user: Option<String>,

    #[arg(long, env = "WALLET_KEEPER_USDT_RPC_PASS")]
    pub usdt_rpc_pass: Option<String>,

    /// Omni property served as usdt (31 is Tether).
    #[arg(long, default_value = "31", env = "WALLET_KEEPER_USDT_PROPERTY_ID")]
    pub usdt_property_id: u32,

    /// BTC miner fee attached to each token transfer.
    #[arg(long, default_value = "0.0001", env = "WALLET_KEEPER_USDT_FEE")]
    pub usdt_fee: Decimal,

    /// Ethereum node RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8545", env = "WALLET_KEEPER_ETH_RPC_ADDR")]
    pub eth_rpc_addr: String,

    /// Node keystore directory.
    #[arg(long, env = "WALLET_KEEPER_ETH_WALLET_DIR")]
    pub eth_wallet_dir: Option<PathBuf>,

    /// JSON file holding the account to address mapping.
    #[arg(long, env = "WALLET_KEEPER_ETH_ACCOUNT_PATH")]
    pub eth_account_path: Option<PathBuf>,

    /// Keystore password used for new keys and for signing.
    #[arg(long, env = "WALLET_KEEPER_ETH_ACCOUNT_PASSWORD", hide_env_values = true)]
    pub eth_account_password: Option<String>,
}

impl Cli {
    pub fn serves(&self, coin: Coin) -> bool {
        self.backends.contains(&coin)
    }
}
