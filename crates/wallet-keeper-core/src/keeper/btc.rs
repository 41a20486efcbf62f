use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use crate::amount::to_btc_amount;
use crate::command::btc::{
    GetAccountAddress, GetAddressesByAccount, GetBalance, GetBlockCount, GetNewAddress,
    ListAccounts, ListUnspent, Move, Ping, SendFrom, SendToAddress,
};
use crate::config::{BtcConfig, RpcOptions};
use crate::error::KeeperError;
use crate::journal::{TransferJournal, TransferKind, TransferRecord};
use crate::rpc::{HttpRpcClient, RpcTransport};
use crate::types::{AccountInfo, Coin, UnspentOutput, MIN_CONFIRMATIONS};

use super::Keeper;

// ==============================================================================
// Wallet account helpers
// ==============================================================================
//
// Bitcoin Core and Omni Core share the account-era wallet API, so the Omni
// backend manages its addresses through these as well.

pub(super) async fn account_exists(
    rpc: &dyn RpcTransport,
    account: &str,
) -> Result<bool, KeeperError> {
    let accounts = rpc.execute(ListAccounts { min_conf: 0 }).await?;
    Ok(accounts.contains_key(account))
}

/// Fail unless `account` is known to the wallet. `getaccountaddress` and
/// friends would silently create it otherwise.
pub(super) async fn require_account(
    rpc: &dyn RpcTransport,
    account: &str,
) -> Result<(), KeeperError> {
    if account_exists(rpc, account).await? {
        Ok(())
    } else {
        Err(KeeperError::AccountNotFound(account.to_owned()))
    }
}

pub(super) async fn account_address(
    rpc: &dyn RpcTransport,
    account: &str,
) -> Result<String, KeeperError> {
    require_account(rpc, account).await?;
    rpc.execute(GetAccountAddress {
        account: account.to_owned(),
    })
    .await
}

pub(super) async fn account_addresses(
    rpc: &dyn RpcTransport,
    account: &str,
) -> Result<Vec<String>, KeeperError> {
    require_account(rpc, account).await?;
    rpc.execute(GetAddressesByAccount {
        account: account.to_owned(),
    })
    .await
}

pub(super) async fn new_address(
    rpc: &dyn RpcTransport,
    account: &str,
) -> Result<String, KeeperError> {
    rpc.execute(GetNewAddress {
        account: account.to_owned(),
    })
    .await
}

pub(super) async fn create_account(
    rpc: &dyn RpcTransport,
    account: &str,
) -> Result<String, KeeperError> {
    if account_exists(rpc, account).await? {
        return Err(KeeperError::AccountExists(account.to_owned()));
    }
    new_address(rpc, account).await
}

// ==============================================================================
// BtcKeeper
// ==============================================================================

/// Keeper over a Bitcoin-family wallet daemon. Operations map one to one
/// onto the daemon's account API, amounts are BTC.
pub struct BtcKeeper {
    rpc: Arc<dyn RpcTransport>,
    journal: TransferJournal,
}

impl BtcKeeper {
    pub fn new(config: &BtcConfig, options: &RpcOptions) -> Result<Self, KeeperError> {
        let rpc = HttpRpcClient::new(Coin::Btc, &config.endpoint, options)?;
        let journal = TransferJournal::new(Coin::Btc, config.log_dir.as_deref())?;
        Ok(Self::with_transport(Arc::new(rpc), journal))
    }

    pub fn with_transport(rpc: Arc<dyn RpcTransport>, journal: TransferJournal) -> Self {
        Self { rpc, journal }
    }
}

#[async_trait]
impl Keeper for BtcKeeper {
    fn coin(&self) -> Coin {
        Coin::Btc
    }

    async fn ping(&self) -> Result<(), KeeperError> {
        self.rpc.execute(Ping).await
    }

    async fn get_block_count(&self) -> Result<u64, KeeperError> {
        self.rpc.execute(GetBlockCount).await
    }

    async fn get_address(&self, account: &str) -> Result<String, KeeperError> {
        account_address(self.rpc.as_ref(), account).await
    }

    async fn get_addresses_by_account(&self, account: &str) -> Result<Vec<String>, KeeperError> {
        account_addresses(self.rpc.as_ref(), account).await
    }

    async fn get_new_address(&self, account: &str) -> Result<String, KeeperError> {
        new_address(self.rpc.as_ref(), account).await
    }

    async fn create_account(&self, account: &str) -> Result<String, KeeperError> {
        create_account(self.rpc.as_ref(), account).await
    }

    async fn get_account_info(&self, account: &str) -> Result<AccountInfo, KeeperError> {
        let addresses = account_addresses(self.rpc.as_ref(), account).await?;
        let balance = self
            .rpc
            .execute(GetBalance {
                account: account.to_owned(),
                min_conf: MIN_CONFIRMATIONS,
            })
            .await?;
        Ok(AccountInfo {
            account: account.to_owned(),
            balance,
            addresses,
        })
    }

    async fn list_accounts(&self, min_conf: u32) -> Result<BTreeMap<String, Decimal>, KeeperError> {
        self.rpc.execute(ListAccounts { min_conf }).await
    }

    async fn send_from(
        &self,
        from_account: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError> {
        let btc = to_btc_amount(amount)?;
        require_account(self.rpc.as_ref(), from_account).await?;
        let txid = self
            .rpc
            .execute(SendFrom {
                from_account: from_account.to_owned(),
                to_address: to_address.to_owned(),
                amount: btc,
                min_conf: None,
            })
            .await?;
        debug!(coin = %Coin::Btc, from_account, to_address, %amount, %txid, "sendfrom broadcast");
        self.journal
            .record(TransferRecord {
                kind: TransferKind::SendFrom,
                from: from_account,
                to: to_address,
                amount,
                txid: Some(&txid),
            })
            .await;
        Ok(txid)
    }

    async fn send_to_address(
        &self,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError> {
        let btc = to_btc_amount(amount)?;
        let txid = self
            .rpc
            .execute(SendToAddress {
                address: to_address.to_owned(),
                amount: btc,
            })
            .await?;
        self.journal
            .record(TransferRecord {
                kind: TransferKind::SendToAddress,
                from: "",
                to: to_address,
                amount,
                txid: Some(&txid),
            })
            .await;
        Ok(txid)
    }

    async fn move_funds(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
    ) -> Result<bool, KeeperError> {
        let btc = to_btc_amount(amount)?;
        require_account(self.rpc.as_ref(), from_account).await?;
        require_account(self.rpc.as_ref(), to_account).await?;
        let moved = self
            .rpc
            .execute(Move {
                from_account: from_account.to_owned(),
                to_account: to_account.to_owned(),
                amount: btc,
            })
            .await?;
        if moved {
            self.journal
                .record(TransferRecord {
                    kind: TransferKind::Move,
                    from: from_account,
                    to: to_account,
                    amount,
                    txid: None,
                })
                .await;
        }
        Ok(moved)
    }

    async fn list_unspent_min(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, KeeperError> {
        let unspent = self
            .rpc
            .execute(ListUnspent {
                min_conf,
                max_conf: None,
                addresses: None,
            })
            .await?;
        Ok(unspent
            .into_iter()
            .map(|u| UnspentOutput {
                txid: Some(u.txid.to_string()),
                vout: Some(u.vout),
                address: u.address,
                account: u.account,
                amount: u.amount,
                confirmations: u.confirmations,
            })
            .collect())
    }
}
