use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::amount::{ether_to_wei, format_quantity, wei_to_ether};
use crate::command::eth::{
    Accounts, BlockNumber, BlockTag, GetBalance, NetVersion, NewAccount, SendTransaction,
    TransactionRequest,
};
use crate::command::Command as _;
use crate::config::{EthConfig, RpcOptions};
use crate::error::KeeperError;
use crate::journal::{TransferJournal, TransferKind, TransferRecord};
use crate::rpc::{HttpRpcClient, RpcTransport};
use crate::types::{AccountInfo, Coin, UnspentOutput, DEFAULT_ACCOUNT, MIN_CONFIRMATIONS};

use super::Keeper;

// ==============================================================================
// Account Book
// ==============================================================================

/// Logical accounts of the Ethereum backend: a persisted map from account
/// name to the keystore addresses generated for it.
///
/// The node only knows addresses. Which address belongs to which account
/// lives here, in a JSON file rewritten on every change.
pub struct AccountBook {
    path: Option<PathBuf>,
    accounts: Mutex<BTreeMap<String, Vec<String>>>,
}

impl AccountBook {
    /// Load the book at `path`, starting empty if the file does not exist yet.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, KeeperError> {
        let path = path.into();
        let accounts = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                KeeperError::Config(format!("account book {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            accounts: Mutex::new(accounts),
        })
    }

    /// A book that is never written to disk.
    pub fn in_memory(accounts: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            path: None,
            accounts: Mutex::new(accounts),
        }
    }

    pub async fn contains(&self, account: &str) -> bool {
        self.accounts.lock().await.contains_key(account)
    }

    pub async fn addresses(&self, account: &str) -> Option<Vec<String>> {
        self.accounts.lock().await.get(account).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.accounts.lock().await.clone()
    }

    /// Append `address` to `account`, creating the account if needed.
    pub async fn add_address(&self, account: &str, address: &str) -> Result<(), KeeperError> {
        let mut accounts = self.accounts.lock().await;
        let mut updated = accounts.clone();
        updated
            .entry(account.to_owned())
            .or_default()
            .push(address.to_owned());
        self.persist(&updated).await?;
        *accounts = updated;
        Ok(())
    }

    /// Create `account` holding `address`; fails if the name is already taken.
    pub async fn create(&self, account: &str, address: &str) -> Result<(), KeeperError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(account) {
            return Err(KeeperError::AccountExists(account.to_owned()));
        }
        let mut updated = accounts.clone();
        updated.insert(account.to_owned(), vec![address.to_owned()]);
        self.persist(&updated).await?;
        *accounts = updated;
        Ok(())
    }

    /// Writes `accounts` to disk. The in-memory book only changes after this
    /// succeeds.
    async fn persist(&self, accounts: &BTreeMap<String, Vec<String>>) -> Result<(), KeeperError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(accounts)
            .map_err(|e| KeeperError::Io(std::io::Error::other(e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Staged write, renamed over the book.
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}

/// Address encoded in a geth keystore file name
/// (`UTC--2018-03-01T09-30-12.345Z--<40 hex digits>`).
fn keystore_address(file_name: &str) -> Option<String> {
    let (_, hex) = file_name.strip_prefix("UTC--")?.rsplit_once("--")?;
    (hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| format!("0x{}", hex.to_ascii_lowercase()))
}

/// Address of the first keystore file in `wallet_dir`, by file name order.
async fn first_keystore_address(wallet_dir: &Path) -> Result<Option<String>, KeeperError> {
    let mut entries = match tokio::fs::read_dir(wallet_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(names.iter().find_map(|name| keystore_address(name)))
}

// ==============================================================================
// EthKeeper
// ==============================================================================

/// Keeper over an Ethereum node with a local keystore.
///
/// Accounts are emulated with an [`AccountBook`]; keys never leave the node
/// and every send is signed there with the configured keystore password.
/// Amounts are ether.
pub struct EthKeeper {
    rpc: Arc<dyn RpcTransport>,
    book: AccountBook,
    password: String,
    journal: TransferJournal,
}

impl EthKeeper {
    /// Connect to the node, load the account book and make sure the default
    /// account has an address.
    pub async fn new(config: &EthConfig, options: &RpcOptions) -> Result<Self, KeeperError> {
        let rpc = HttpRpcClient::new(Coin::Eth, &config.endpoint, options)?;
        let book = AccountBook::load(&config.account_path).await?;
        let journal = TransferJournal::new(Coin::Eth, config.log_dir.as_deref())?;
        let keeper = Self::with_transport(Arc::new(rpc), book, config.password.clone(), journal);
        keeper.seed_default_account(&config.wallet_dir).await?;
        Ok(keeper)
    }

    pub fn with_transport(
        rpc: Arc<dyn RpcTransport>,
        book: AccountBook,
        password: String,
        journal: TransferJournal,
    ) -> Self {
        Self {
            rpc,
            book,
            password,
            journal,
        }
    }

    /// Give the default account the first keystore address, or the node's
    /// first account when the keystore directory has none.
    pub async fn seed_default_account(&self, wallet_dir: &Path) -> Result<(), KeeperError> {
        if self.book.contains(DEFAULT_ACCOUNT).await {
            return Ok(());
        }
        let address = match first_keystore_address(wallet_dir).await? {
            Some(address) => Some(address),
            None => self.rpc.execute(Accounts).await?.into_iter().next(),
        };
        match address {
            Some(address) => {
                info!(coin = %Coin::Eth, %address, "seeded default account");
                self.book.add_address(DEFAULT_ACCOUNT, &address).await
            }
            None => {
                warn!(
                    coin = %Coin::Eth,
                    wallet_dir = %wallet_dir.display(),
                    "no keystore address found for the default account"
                );
                Ok(())
            }
        }
    }

    async fn book_addresses(&self, account: &str) -> Result<Vec<String>, KeeperError> {
        self.book
            .addresses(account)
            .await
            .ok_or_else(|| KeeperError::AccountNotFound(account.to_owned()))
    }

    /// Block at which balances with `min_conf` confirmations are read.
    async fn confirmed_block(&self, min_conf: u32) -> Result<BlockTag, KeeperError> {
        if min_conf == 0 {
            return Ok(BlockTag::Latest);
        }
        let height = self.rpc.execute(BlockNumber).await?;
        Ok(BlockTag::Number(height.saturating_sub(u64::from(min_conf))))
    }

    /// Balances in ether of `addresses` at `block`, in the same order.
    async fn balances(
        &self,
        addresses: &[String],
        block: BlockTag,
    ) -> Result<Vec<Decimal>, KeeperError> {
        let commands = addresses
            .iter()
            .map(|address| GetBalance {
                address: address.clone(),
                block,
            })
            .collect();
        self.rpc
            .execute_batch(commands)
            .await?
            .into_iter()
            .map(|wei| wei_to_ether(wei).map_err(|e| KeeperError::decode(GetBalance::METHOD, e)))
            .collect()
    }

    /// First address of `account` whose latest balance exceeds `wei`.
    ///
    /// An address holding exactly `wei` cannot also pay for gas, so it is
    /// skipped.
    async fn funded_address(&self, account: &str, wei: u128) -> Result<String, KeeperError> {
        let addresses = self.book_addresses(account).await?;
        let commands = addresses
            .iter()
            .map(|address| GetBalance {
                address: address.clone(),
                block: BlockTag::Latest,
            })
            .collect();
        let balances = self.rpc.execute_batch(commands).await?;
        addresses
            .into_iter()
            .zip(balances)
            .find(|(_, balance)| *balance > wei)
            .map(|(address, _)| address)
            .ok_or_else(|| KeeperError::InsufficientFunds {
                account: account.to_owned(),
            })
    }

    async fn transfer(&self, from: String, to: &str, wei: u128) -> Result<String, KeeperError> {
        let hash = self
            .rpc
            .execute(SendTransaction {
                tx: TransactionRequest {
                    from: from.clone(),
                    to: to.to_owned(),
                    value: format_quantity(wei),
                },
                password: self.password.clone(),
            })
            .await?;
        debug!(coin = %Coin::Eth, %from, to, %wei, %hash, "transaction submitted");
        Ok(hash)
    }
}

#[async_trait]
impl Keeper for EthKeeper {
    fn coin(&self) -> Coin {
        Coin::Eth
    }

    async fn ping(&self) -> Result<(), KeeperError> {
        self.rpc.execute(NetVersion).await.map(|_| ())
    }

    async fn get_block_count(&self) -> Result<u64, KeeperError> {
        self.rpc.execute(BlockNumber).await
    }

    async fn get_address(&self, account: &str) -> Result<String, KeeperError> {
        self.book_addresses(account)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KeeperError::AccountNotFound(account.to_owned()))
    }

    async fn get_addresses_by_account(&self, account: &str) -> Result<Vec<String>, KeeperError> {
        self.book_addresses(account).await
    }

    async fn get_new_address(&self, account: &str) -> Result<String, KeeperError> {
        let address = self
            .rpc
            .execute(NewAccount {
                password: self.password.clone(),
            })
            .await?;
        self.book.add_address(account, &address).await?;
        Ok(address)
    }

    async fn create_account(&self, account: &str) -> Result<String, KeeperError> {
        if self.book.contains(account).await {
            return Err(KeeperError::AccountExists(account.to_owned()));
        }
        let address = self
            .rpc
            .execute(NewAccount {
                password: self.password.clone(),
            })
            .await?;
        self.book.create(account, &address).await?;
        Ok(address)
    }

    async fn get_account_info(&self, account: &str) -> Result<AccountInfo, KeeperError> {
        let addresses = self.book_addresses(account).await?;
        let block = self.confirmed_block(MIN_CONFIRMATIONS).await?;
        let balance = self.balances(&addresses, block).await?.into_iter().sum();
        Ok(AccountInfo {
            account: account.to_owned(),
            balance,
            addresses,
        })
    }

    async fn list_accounts(&self, min_conf: u32) -> Result<BTreeMap<String, Decimal>, KeeperError> {
        let book = self.book.snapshot().await;
        let block = self.confirmed_block(min_conf).await?;
        let flat: Vec<String> = book.values().flatten().cloned().collect();
        let mut balances = self.balances(&flat, block).await?.into_iter();
        Ok(book
            .into_iter()
            .map(|(account, addresses)| {
                let total: Decimal = balances.by_ref().take(addresses.len()).sum();
                (account, total)
            })
            .collect())
    }

    async fn send_from(
        &self,
        from_account: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError> {
        let wei = ether_to_wei(amount)?;
        let from = self.funded_address(from_account, wei).await?;
        let hash = self.transfer(from, to_address, wei).await?;
        self.journal
            .record(TransferRecord {
                kind: TransferKind::SendFrom,
                from: from_account,
                to: to_address,
                amount,
                txid: Some(&hash),
            })
            .await;
        Ok(hash)
    }

    async fn send_to_address(
        &self,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError> {
        let wei = ether_to_wei(amount)?;
        let from = self.funded_address(DEFAULT_ACCOUNT, wei).await?;
        let hash = self.transfer(from.clone(), to_address, wei).await?;
        self.journal
            .record(TransferRecord {
                kind: TransferKind::SendToAddress,
                from: &from,
                to: to_address,
                amount,
                txid: Some(&hash),
            })
            .await;
        Ok(hash)
    }

    async fn move_funds(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
    ) -> Result<bool, KeeperError> {
        let wei = ether_to_wei(amount)?;
        let to_address = self.get_address(to_account).await?;
        let from = self.funded_address(from_account, wei).await?;
        let hash = self.transfer(from, &to_address, wei).await?;
        self.journal
            .record(TransferRecord {
                kind: TransferKind::Move,
                from: from_account,
                to: to_account,
                amount,
                txid: Some(&hash),
            })
            .await;
        Ok(true)
    }

    /// One entry per funded address; there are no outputs on Ethereum.
    async fn list_unspent_min(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, KeeperError> {
        let owned: Vec<(String, String)> = self
            .book
            .snapshot()
            .await
            .into_iter()
            .flat_map(|(account, addresses)| {
                addresses.into_iter().map(move |a| (account.clone(), a))
            })
            .collect();
        let block = self.confirmed_block(min_conf).await?;
        let addresses: Vec<String> = owned.iter().map(|(_, a)| a.clone()).collect();
        let balances = self.balances(&addresses, block).await?;
        Ok(owned
            .into_iter()
            .zip(balances)
            .filter(|(_, balance)| !balance.is_zero())
            .map(|((account, address), amount)| UnspentOutput {
                txid: None,
                vout: None,
                address: Some(address),
                account: Some(account),
                amount,
                confirmations: u64::from(min_conf),
            })
            .collect())
    }
}
