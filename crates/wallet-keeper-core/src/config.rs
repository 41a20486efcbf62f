//! Construction parameters for the backend Keepers.
//!
//! These are plain data; the binary maps its CLI flags onto them.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;

/// Omni Layer property id of Tether USD.
pub const TETHER_PROPERTY_ID: u32 = 31;

/// One daemon JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    pub url: String,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl RpcEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            pass: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.pass = Some(pass.into());
        self
    }
}

/// Transport tuning shared by every backend.
#[derive(Debug, Clone)]
pub struct RpcOptions {
    /// Deadline for one complete call. A hung daemon must not hold a request
    /// task forever, so this is always set.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Outbound request ceiling per backend; batched calls count once.
    pub requests_per_second: Option<u32>,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            requests_per_second: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BtcConfig {
    pub endpoint: RpcEndpoint,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UsdtConfig {
    pub endpoint: RpcEndpoint,
    pub log_dir: Option<PathBuf>,
    pub property_id: u32,
    /// Miner fee in BTC attached to raw token transfers.
    pub fee: Decimal,
}

#[derive(Debug, Clone)]
pub struct EthConfig {
    pub endpoint: RpcEndpoint,
    pub log_dir: Option<PathBuf>,
    /// Node keystore directory holding `UTC--<time>--<address>` key files.
    pub wallet_dir: PathBuf,
    /// JSON file mapping logical account names to keystore addresses.
    pub account_path: PathBuf,
    pub password: String,
}

/// Everything needed to bring up the gateway. Absent backends are not served.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub rpc: RpcOptions,
    pub btc: Option<BtcConfig>,
    pub usdt: Option<UsdtConfig>,
    pub eth: Option<EthConfig>,
}
