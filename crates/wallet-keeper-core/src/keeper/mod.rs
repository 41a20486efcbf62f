//! The coin-agnostic wallet contract and its backend implementations.
//!
//! Every HTTP handler is written once against [`Keeper`]. Each backend maps
//! the operations onto its own daemon procedures, sometimes several per
//! operation, and keeps that mapping private.

mod btc;
mod eth;
mod usdt;

pub use btc::BtcKeeper;
pub use eth::{AccountBook, EthKeeper};
pub use usdt::UsdtKeeper;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::KeeperError;
use crate::types::{AccountInfo, Coin, UnspentOutput, MIN_CONFIRMATIONS};

#[async_trait]
pub trait Keeper: Send + Sync {
    /// Which backend this is; used to annotate errors at the gateway.
    fn coin(&self) -> Coin;

    /// Check the daemon is reachable and answering.
    async fn ping(&self) -> Result<(), KeeperError>;

    /// Current chain height.
    async fn get_block_count(&self) -> Result<u64, KeeperError>;

    /// Receive address of `account`.
    /// Callers pass [`DEFAULT_ACCOUNT`](crate::types::DEFAULT_ACCOUNT) when
    /// the request does not name one.
    async fn get_address(&self, account: &str) -> Result<String, KeeperError>;

    /// All addresses that belong to `account`.
    async fn get_addresses_by_account(&self, account: &str) -> Result<Vec<String>, KeeperError>;

    /// Generate a fresh address for `account`.
    async fn get_new_address(&self, account: &str) -> Result<String, KeeperError>;

    /// Create `account` and return its receive address.
    /// Fails with [`KeeperError::AccountExists`] if the name is taken.
    async fn create_account(&self, account: &str) -> Result<String, KeeperError>;

    /// Balance and addresses of an existing account.
    async fn get_account_info(&self, account: &str) -> Result<AccountInfo, KeeperError>;

    /// Balance of every account with at least `min_conf` confirmations.
    async fn list_accounts(&self, min_conf: u32) -> Result<BTreeMap<String, Decimal>, KeeperError>;

    /// Send from an account to an external address; returns the transaction id.
    async fn send_from(
        &self,
        from_account: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError>;

    /// Send from the wallet's default funds; returns the transaction id.
    async fn send_to_address(&self, to_address: &str, amount: Decimal)
        -> Result<String, KeeperError>;

    /// Move funds between two accounts of this wallet.
    async fn move_funds(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
    ) -> Result<bool, KeeperError>;

    /// Spendable outputs with at least `min_conf` confirmations.
    async fn list_unspent_min(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, KeeperError>;

    /// Sum of every account's balance at the standard confirmation depth.
    async fn get_balance(&self) -> Result<Decimal, KeeperError> {
        let accounts = self.list_accounts(MIN_CONFIRMATIONS).await?;
        Ok(accounts.values().copied().sum())
    }
}
