//! Backend routing: owns one Keeper per configured coin and resolves the
//! per-request coin selector to exactly one of them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::KeeperError;
use crate::keeper::{BtcKeeper, EthKeeper, Keeper, UsdtKeeper};
use crate::types::Coin;

/// Why a coin selector did not resolve to a Keeper.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("no coin type specified, should be one of btc, usdt, eth")]
    Missing,

    #[error("unknown coin type `{0}`, should be one of btc, usdt, eth")]
    Unknown(String),

    #[error("coin type `{0}` is not enabled on this gateway")]
    NotConfigured(Coin),
}

#[derive(Clone, Default)]
pub struct Gateway {
    keepers: BTreeMap<Coin, Arc<dyn Keeper>>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("coins", &self.keepers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `keeper` under its own coin, replacing any previous one.
    pub fn with_keeper(mut self, keeper: Arc<dyn Keeper>) -> Self {
        self.keepers.insert(keeper.coin(), keeper);
        self
    }

    /// Construct a Keeper for every backend present in `config`.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, KeeperError> {
        let mut gateway = Self::new();
        if let Some(btc) = &config.btc {
            let keeper = BtcKeeper::new(btc, &config.rpc).map_err(|e| e.with_coin(Coin::Btc))?;
            info!(coin = %Coin::Btc, url = %btc.endpoint.url, "backend configured");
            gateway = gateway.with_keeper(Arc::new(keeper));
        }
        if let Some(usdt) = &config.usdt {
            let keeper =
                UsdtKeeper::new(usdt, &config.rpc).map_err(|e| e.with_coin(Coin::Usdt))?;
            info!(
                coin = %Coin::Usdt,
                url = %usdt.endpoint.url,
                property_id = usdt.property_id,
                "backend configured"
            );
            gateway = gateway.with_keeper(Arc::new(keeper));
        }
        if let Some(eth) = &config.eth {
            let keeper = EthKeeper::new(eth, &config.rpc)
                .await
                .map_err(|e| e.with_coin(Coin::Eth))?;
            info!(coin = %Coin::Eth, url = %eth.endpoint.url, "backend configured");
            gateway = gateway.with_keeper(Arc::new(keeper));
        }
        Ok(gateway)
    }

    /// Configured coins in health-check order.
    pub fn coins(&self) -> impl Iterator<Item = Coin> + '_ {
        self.keepers.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.keepers.is_empty()
    }

    pub fn keeper(&self, coin: Coin) -> Option<Arc<dyn Keeper>> {
        self.keepers.get(&coin).cloned()
    }

    /// Resolve a raw coin selector, case-insensitively.
    pub fn resolve(&self, selector: Option<&str>) -> Result<Arc<dyn Keeper>, RoutingError> {
        let raw = selector
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RoutingError::Missing)?;
        let coin: Coin = raw
            .parse()
            .map_err(|_| RoutingError::Unknown(raw.to_owned()))?;
        self.keeper(coin).ok_or(RoutingError::NotConfigured(coin))
    }

    /// Ping every configured backend.
    ///
    /// All pings run concurrently; the reported failure is the first one in
    /// btc, usdt, eth order, annotated with its coin.
    pub async fn health(&self) -> Result<(), KeeperError> {
        let pings = self
            .keepers
            .iter()
            .map(|(coin, keeper)| async move { (*coin, keeper.ping().await) });
        let mut first_failure = None;
        for (coin, result) in join_all(pings).await {
            if let Err(e) = result {
                warn!(%coin, error = %e, connectivity = e.is_connectivity(), "backend unhealthy");
                if first_failure.is_none() {
                    first_failure = Some(e.with_coin(coin));
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}
