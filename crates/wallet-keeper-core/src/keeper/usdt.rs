use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Amount;
use rust_decimal::Decimal;
use tracing::debug;

use crate::amount::{omni_param, to_btc_amount};
use crate::command::btc::{
    CreateRawTransaction, GetAddressesByAccount, GetBlockCount, ListAccounts, ListUnspent,
    OutPointRef, Ping, SendRawTransaction, SignRawTransactionWithWallet, Unspent,
};
use crate::command::omni::{
    OmniCreatePayloadSimpleSend, OmniCreateRawTxChange, OmniCreateRawTxOpReturn,
    OmniCreateRawTxReference, OmniGetBalance, PrevTx,
};
use crate::config::{RpcOptions, UsdtConfig};
use crate::error::KeeperError;
use crate::journal::{TransferJournal, TransferKind, TransferRecord};
use crate::rpc::{HttpRpcClient, RpcTransport};
use crate::types::{AccountInfo, Coin, UnspentOutput, DEFAULT_ACCOUNT};

use super::btc::{account_address, account_addresses, create_account, new_address};
use super::Keeper;

/// Upper confirmation bound used when listing fee inputs of one address.
const MAX_CONFIRMATIONS: u32 = 9_999_999;

/// Keeper over an Omni Core daemon, denominated in one Omni property.
///
/// Accounts and addresses are the node's bitcoin wallet accounts; balances
/// are token balances of those addresses. Token transfers are built as raw
/// simple-send transactions whose miner fee is paid in BTC from the sending
/// address.
pub struct UsdtKeeper {
    rpc: Arc<dyn RpcTransport>,
    property_id: u32,
    fee: Amount,
    journal: TransferJournal,
}

impl UsdtKeeper {
    pub fn new(config: &UsdtConfig, options: &RpcOptions) -> Result<Self, KeeperError> {
        let rpc = HttpRpcClient::new(Coin::Usdt, &config.endpoint, options)?;
        let journal = TransferJournal::new(Coin::Usdt, config.log_dir.as_deref())?;
        Self::with_transport(Arc::new(rpc), journal, config.property_id, config.fee)
    }

    pub fn with_transport(
        rpc: Arc<dyn RpcTransport>,
        journal: TransferJournal,
        property_id: u32,
        fee: Decimal,
    ) -> Result<Self, KeeperError> {
        let fee = to_btc_amount(fee)
            .map_err(|e| KeeperError::Config(format!("usdt transaction fee: {e}")))?;
        Ok(Self {
            rpc,
            property_id,
            fee,
            journal,
        })
    }

    /// Token balances of `addresses`, in the same order.
    async fn token_balances(&self, addresses: &[String]) -> Result<Vec<Decimal>, KeeperError> {
        let commands = addresses
            .iter()
            .map(|address| OmniGetBalance {
                address: address.clone(),
                property_id: self.property_id,
            })
            .collect();
        let balances = self.rpc.execute_batch(commands).await?;
        Ok(balances.into_iter().map(|b| b.balance).collect())
    }

    /// Addresses of `account` holding at least `amount` tokens, in wallet order.
    async fn funded_addresses(
        &self,
        account: &str,
        amount: Decimal,
    ) -> Result<Vec<String>, KeeperError> {
        let addresses = account_addresses(self.rpc.as_ref(), account).await?;
        let balances = self.token_balances(&addresses).await?;
        let funded: Vec<String> = addresses
            .into_iter()
            .zip(balances)
            .filter(|(_, balance)| *balance >= amount)
            .map(|(address, _)| address)
            .collect();
        if funded.is_empty() {
            return Err(KeeperError::InsufficientFunds {
                account: account.to_owned(),
            });
        }
        Ok(funded)
    }

    /// Confirmed bitcoin outputs of `address`, spent to pay the miner fee.
    async fn fee_inputs(&self, address: &str) -> Result<Vec<Unspent>, KeeperError> {
        self.rpc
            .execute(ListUnspent {
                min_conf: 1,
                max_conf: Some(MAX_CONFIRMATIONS),
                addresses: Some(vec![address.to_owned()]),
            })
            .await
    }

    /// Send `amount` tokens from the first address of `account` that holds
    /// both the tokens and fee inputs. Returns the sending address and txid.
    async fn send_from_account(
        &self,
        account: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<(String, String), KeeperError> {
        omni_param(amount)?;
        let candidates = self.funded_addresses(account, amount).await?;
        for address in &candidates {
            let unspent = self.fee_inputs(address).await?;
            if unspent.is_empty() {
                debug!(coin = %Coin::Usdt, %address, "no fee inputs, trying next address");
                continue;
            }
            let txid = self.send_tokens(address, unspent, to_address, amount).await?;
            return Ok((address.clone(), txid));
        }
        Err(KeeperError::NoFeeInputs {
            address: candidates.join(", "),
        })
    }

    /// Build, sign and broadcast a simple send of `amount` tokens, funding the
    /// fee from `unspent`.
    async fn send_tokens(
        &self,
        from_address: &str,
        unspent: Vec<Unspent>,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError> {
        let token_amount = omni_param(amount)?;

        let inputs = unspent
            .iter()
            .map(|u| OutPointRef {
                txid: u.txid.to_string(),
                vout: u.vout,
            })
            .collect();
        let prev_txs = unspent
            .iter()
            .map(|u| {
                Ok(PrevTx {
                    txid: u.txid.to_string(),
                    vout: u.vout,
                    script_pub_key: u.script_pub_key.clone(),
                    value: to_btc_amount(u.amount)?.to_btc(),
                })
            })
            .collect::<Result<Vec<_>, KeeperError>>()?;

        let raw = self
            .rpc
            .execute(CreateRawTransaction {
                inputs,
                outputs: BTreeMap::new(),
            })
            .await?;
        let payload = self
            .rpc
            .execute(OmniCreatePayloadSimpleSend {
                property_id: self.property_id,
                amount: token_amount,
            })
            .await?;
        let raw = self
            .rpc
            .execute(OmniCreateRawTxOpReturn { raw, payload })
            .await?;
        let raw = self
            .rpc
            .execute(OmniCreateRawTxReference {
                raw,
                destination: to_address.to_owned(),
                amount: None,
            })
            .await?;
        let raw = self
            .rpc
            .execute(OmniCreateRawTxChange {
                raw,
                prev_txs,
                destination: from_address.to_owned(),
                fee: self.fee,
                position: None,
            })
            .await?;

        let signed = self
            .rpc
            .execute(SignRawTransactionWithWallet { hex: raw })
            .await?;
        if !signed.complete {
            return Err(KeeperError::IncompleteSignature);
        }

        let txid = self
            .rpc
            .execute(SendRawTransaction { hex: signed.hex })
            .await?;
        debug!(coin = %Coin::Usdt, from_address, to_address, %amount, %txid, "token send broadcast");
        Ok(txid)
    }
}

#[async_trait]
impl Keeper for UsdtKeeper {
    fn coin(&self) -> Coin {
        Coin::Usdt
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
        let balance = self.token_balances(&addresses).await?.into_iter().sum();
        Ok(AccountInfo {
            account: account.to_owned(),
            balance,
            addresses,
        })
    }

    /// Token balances per account, summed over each account's addresses.
    ///
    /// Omni balances carry no confirmation depth. `min_conf` is forwarded to
    /// `listaccounts`, which lists every wallet account whatever its value,
    /// so it does not change the result.
    async fn list_accounts(&self, min_conf: u32) -> Result<BTreeMap<String, Decimal>, KeeperError> {
        let accounts: Vec<String> = self
            .rpc
            .execute(ListAccounts { min_conf })
            .await?
            .into_keys()
            .collect();
        let address_lists = self
            .rpc
            .execute_batch(
                accounts
                    .iter()
                    .map(|account| GetAddressesByAccount {
                        account: account.clone(),
                    })
                    .collect(),
            )
            .await?;

        let flat: Vec<String> = address_lists.iter().flatten().cloned().collect();
        let mut balances = self.token_balances(&flat).await?.into_iter();

        let mut result = BTreeMap::new();
        for (account, addresses) in accounts.into_iter().zip(address_lists) {
            let total: Decimal = balances.by_ref().take(addresses.len()).sum();
            result.insert(account, total);
        }
        Ok(result)
    }

    async fn send_from(
        &self,
        from_account: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<String, KeeperError> {
        let (_, txid) = self
            .send_from_account(from_account, to_address, amount)
            .await?;
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
        let (from_address, txid) = self
            .send_from_account(DEFAULT_ACCOUNT, to_address, amount)
            .await?;
        self.journal
            .record(TransferRecord {
                kind: TransferKind::SendToAddress,
                from: &from_address,
                to: to_address,
                amount,
                txid: Some(&txid),
            })
            .await;
        Ok(txid)
    }

    /// Token balances are per address, so moving between accounts is an
    /// on-chain send to the receiving account's address.
    async fn move_funds(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
    ) -> Result<bool, KeeperError> {
        omni_param(amount)?;
        let to_address = account_address(self.rpc.as_ref(), to_account).await?;
        let (_, txid) = self
            .send_from_account(from_account, &to_address, amount)
            .await?;
        self.journal
            .record(TransferRecord {
                kind: TransferKind::Move,
                from: from_account,
                to: to_account,
                amount,
                txid: Some(&txid),
            })
            .await;
        Ok(true)
    }

    /// Bitcoin outputs held by the node; these pay token transfer fees.
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

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;
    use crate::config::TETHER_PROPERTY_ID;
    use crate::rpc::mock::MockTransport;

    const FUNDING_TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
    const SENT_TXID: &str = "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid decimal literal")
    }

    fn keeper(mock: &MockTransport) -> UsdtKeeper {
        let journal = TransferJournal::new(Coin::Usdt, None).expect("no-op journal");
        UsdtKeeper::with_transport(
            mock.clone().into_transport(),
            journal,
            TETHER_PROPERTY_ID,
            dec("0.0001"),
        )
        .expect("valid fee")
    }

    fn omni_balance(amount: &str) -> serde_json::Value {
        json!({"balance": amount, "reserved": "0.00000000", "frozen": "0.00000000"})
    }

    /// Scripts a full raw send pipeline from account `A` holding one address,
    /// with `signed` as the wallet's signing result.
    fn scripted_send(signed: serde_json::Value) -> MockTransport {
        MockTransport::new()
            .reply("listaccounts", json!({"": 0.0, "A": 0.0, "B": 0.0}))
            .reply("getaddressesbyaccount", json!(["1FromAddr"]))
            .reply("omni_getbalance", omni_balance("100.00000000"))
            .reply(
                "listunspent",
                json!([{
                    "txid": FUNDING_TXID,
                    "vout": 1,
                    "address": "1FromAddr",
                    "scriptPubKey": "76a914aa",
                    "amount": 0.001,
                    "confirmations": 20
                }]),
            )
            .reply("createrawtransaction", json!("raw0"))
            .reply("omni_createpayload_simplesend", json!("payload"))
            .reply("omni_createrawtx_opreturn", json!("raw1"))
            .reply("omni_createrawtx_reference", json!("raw2"))
            .reply("omni_createrawtx_change", json!("raw3"))
            .reply("signrawtransactionwithwallet", signed)
            .reply("sendrawtransaction", json!(SENT_TXID))
    }

    #[tokio::test]
    async fn send_from_builds_raw_simple_send_in_order() {
        let mock = scripted_send(json!({"hex": "signed", "complete": true}));
        let txid = keeper(&mock)
            .send_from("A", "1DestAddr", dec("12.5"))
            .await
            .expect("send must succeed");
        assert_eq!(txid, SENT_TXID);

        let pipeline: Vec<&str> = mock
            .methods()
            .into_iter()
            .skip_while(|m| *m != "listunspent")
            .collect();
        assert_eq!(
            pipeline,
            vec![
                "listunspent",
                "createrawtransaction",
                "omni_createpayload_simplesend",
                "omni_createrawtx_opreturn",
                "omni_createrawtx_reference",
                "omni_createrawtx_change",
                "signrawtransactionwithwallet",
                "sendrawtransaction",
            ]
        );

        assert_eq!(
            mock.calls_to("listunspent")[0].params,
            vec![json!(1), json!(MAX_CONFIRMATIONS), json!(["1FromAddr"])]
        );
        assert_eq!(
            mock.calls_to("omni_createpayload_simplesend")[0].params,
            vec![json!(TETHER_PROPERTY_ID), json!("12.5")]
        );
        assert_eq!(
            mock.calls_to("omni_createrawtx_reference")[0].params,
            vec![json!("raw1"), json!("1DestAddr")]
        );
        assert_eq!(
            mock.calls_to("omni_createrawtx_change")[0].params,
            vec![
                json!("raw2"),
                json!([{"txid": FUNDING_TXID, "vout": 1, "scriptPubKey": "76a914aa", "value": 0.001}]),
                json!("1FromAddr"),
                json!(0.0001),
            ]
        );
        assert_eq!(
            mock.calls_to("sendrawtransaction")[0].params,
            vec![json!("signed")]
        );
    }

    #[tokio::test]
    async fn incomplete_signature_is_not_broadcast() {
        let mock = scripted_send(json!({"hex": "partial", "complete": false}));
        let err = keeper(&mock)
            .send_from("A", "1DestAddr", dec("1"))
            .await
            .expect_err("partial signature");
        assert!(matches!(err, KeeperError::IncompleteSignature));
        assert!(mock.calls_to("sendrawtransaction").is_empty());
    }

    #[tokio::test]
    async fn send_from_without_token_balance_is_insufficient_funds() {
        let mock = MockTransport::new()
            .reply("listaccounts", json!({"A": 0.0}))
            .reply("getaddressesbyaccount", json!(["1a", "1b"]))
            .reply("omni_getbalance", omni_balance("0.5"));
        let err = keeper(&mock)
            .send_from("A", "1Dest", dec("1"))
            .await
            .expect_err("not enough tokens");
        assert!(matches!(err, KeeperError::InsufficientFunds { ref account } if account == "A"));
        assert!(!err.is_connectivity());
        assert!(mock.calls_to("listunspent").is_empty());
    }

    #[tokio::test]
    async fn send_without_fee_inputs_fails_before_building() {
        let mock = MockTransport::new()
            .reply("listaccounts", json!({"A": 0.0}))
            .reply("getaddressesbyaccount", json!(["1a"]))
            .reply("omni_getbalance", omni_balance("5"))
            .reply("listunspent", json!([]));
        let err = keeper(&mock)
            .send_from("A", "1Dest", dec("1"))
            .await
            .expect_err("no BTC for fee");
        assert!(matches!(err, KeeperError::NoFeeInputs { ref address } if address == "1a"));
        assert!(mock.calls_to("createrawtransaction").is_empty());
    }

    #[tokio::test]
    async fn send_skips_funded_address_without_fee_inputs() {
        let mock = MockTransport::new()
            .reply("listaccounts", json!({"A": 0.0}))
            .reply("getaddressesbyaccount", json!(["1a", "1b"]))
            .reply("omni_getbalance", omni_balance("5"))
            .reply("listunspent", json!([]))
            .reply(
                "listunspent",
                json!([{
                    "txid": FUNDING_TXID,
                    "vout": 0,
                    "address": "1b",
                    "scriptPubKey": "76a914bb",
                    "amount": 0.002,
                    "confirmations": 3
                }]),
            )
            .reply("createrawtransaction", json!("raw0"))
            .reply("omni_createpayload_simplesend", json!("payload"))
            .reply("omni_createrawtx_opreturn", json!("raw1"))
            .reply("omni_createrawtx_reference", json!("raw2"))
            .reply("omni_createrawtx_change", json!("raw3"))
            .reply("signrawtransactionwithwallet", json!({"hex": "signed", "complete": true}))
            .reply("sendrawtransaction", json!(SENT_TXID));
        let txid = keeper(&mock)
            .send_from("A", "1Dest", dec("1"))
            .await
            .expect("second address pays the fee");
        assert_eq!(txid, SENT_TXID);

        let fee_lookups = mock.calls_to("listunspent");
        assert_eq!(fee_lookups.len(), 2);
        assert_eq!(fee_lookups[1].params[2], json!(["1b"]));
        assert_eq!(mock.calls_to("omni_createrawtx_change")[0].params[2], json!("1b"));
    }

    #[tokio::test]
    async fn unreachable_daemon_is_connectivity_error() {
        let mock = MockTransport::new()
            .reply("listaccounts", json!({"A": 0.0}))
            .reply("getaddressesbyaccount", json!(["1a"]))
            .unreachable("omni_getbalance");
        let err = keeper(&mock)
            .send_from("A", "1Dest", dec("1"))
            .await
            .expect_err("daemon down");
        assert!(err.is_connectivity());
        assert!(mock.calls_to("listunspent").is_empty());
    }

    #[tokio::test]
    async fn account_info_sums_token_balances() {
        let mock = MockTransport::new()
            .reply("listaccounts", json!({"A": 0.0}))
            .reply("getaddressesbyaccount", json!(["1a", "1b"]))
            .reply("omni_getbalance", omni_balance("2.5"))
            .reply("omni_getbalance", omni_balance("1.25"));
        let info = keeper(&mock).get_account_info("A").await.expect("info");
        assert_eq!(info.balance, dec("3.75"));
        assert_eq!(
            mock.calls_to("omni_getbalance")[1].params,
            vec![json!("1b"), json!(TETHER_PROPERTY_ID)]
        );
    }

    #[tokio::test]
    async fn list_accounts_groups_balances_per_account() {
        let mock = MockTransport::new()
            .reply("listaccounts", json!({"A": 0.0, "B": 0.0}))
            .reply("getaddressesbyaccount", json!(["1a1", "1a2"]))
            .reply("getaddressesbyaccount", json!(["1b1"]))
            .reply("omni_getbalance", omni_balance("1"))
            .reply("omni_getbalance", omni_balance("2"))
            .reply("omni_getbalance", omni_balance("4"));
        let accounts = keeper(&mock).list_accounts(6).await.expect("accounts");
        assert_eq!(accounts.get("A"), Some(&dec("3")));
        assert_eq!(accounts.get("B"), Some(&dec("4")));
    }

    #[tokio::test]
    async fn move_sends_to_receiving_account_address() {
        let mock = scripted_send(json!({"hex": "signed", "complete": true}))
            .reply("getaccountaddress", json!("1BAddr"));
        let moved = keeper(&mock)
            .move_funds("A", "B", dec("1.5"))
            .await
            .expect("move");
        assert!(moved);
        assert_eq!(
            mock.calls_to("omni_createrawtx_reference")[0].params,
            vec![json!("raw1"), json!("1BAddr")]
        );
        // One account lookup for each side of the move.
        assert_eq!(mock.calls_to("listaccounts").len(), 2);
    }

    #[test]
    fn negative_fee_is_rejected_at_construction() {
        let mock = MockTransport::new();
        let journal = TransferJournal::new(Coin::Usdt, None).expect("no-op journal");
        let err = UsdtKeeper::with_transport(mock.into_transport(), journal, 31, dec("-1"))
            .err()
            .expect("negative fee");
        assert!(matches!(err, KeeperError::Config(_)));
    }
}
