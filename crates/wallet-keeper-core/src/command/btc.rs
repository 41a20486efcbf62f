//! Bitcoin Core wallet procedures (account-era API, as served by Bitcoin-family
//! and Omni Core daemons).

use std::collections::BTreeMap;

use bitcoin::{Amount, Txid};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::amount::{btc_param, deserialize_btc, parse_btc_value};
use crate::error::KeeperError;

use super::{push_trailing, Command};

/// Decode a transaction id, checking it is one.
fn decode_txid(method: &'static str, raw: serde_json::Value) -> Result<String, KeeperError> {
    let txid: Txid = serde_json::from_value(raw).map_err(|e| KeeperError::decode(method, e))?;
    Ok(txid.to_string())
}

// ==============================================================================
// Chain / Node
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping;

impl Command for Ping {
    type Output = ();
    const METHOD: &'static str = "ping";

    fn params(&self) -> Vec<serde_json::Value> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlockCount;

impl Command for GetBlockCount {
    type Output = u64;
    const METHOD: &'static str = "getblockcount";

    fn params(&self) -> Vec<serde_json::Value> {
        Vec::new()
    }
}

// ==============================================================================
// Accounts / Addresses
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetNewAddress {
    pub account: String,
}

impl Command for GetNewAddress {
    type Output = String;
    const METHOD: &'static str = "getnewaddress";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.account)]
    }
}

/// Current receive address of an account; the daemon creates one on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAccountAddress {
    pub account: String,
}

impl Command for GetAccountAddress {
    type Output = String;
    const METHOD: &'static str = "getaccountaddress";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.account)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAddressesByAccount {
    pub account: String,
}

impl Command for GetAddressesByAccount {
    type Output = Vec<String>;
    const METHOD: &'static str = "getaddressesbyaccount";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.account)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBalance {
    pub account: String,
    pub min_conf: u32,
}

impl Command for GetBalance {
    type Output = Decimal;
    const METHOD: &'static str = "getbalance";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.account), json!(self.min_conf)]
    }

    fn decode(raw: serde_json::Value) -> Result<Decimal, KeeperError> {
        parse_btc_value(&raw).map_err(|e| KeeperError::decode(Self::METHOD, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListAccounts {
    pub min_conf: u32,
}

impl Command for ListAccounts {
    type Output = BTreeMap<String, Decimal>;
    const METHOD: &'static str = "listaccounts";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.min_conf)]
    }

    fn decode(raw: serde_json::Value) -> Result<Self::Output, KeeperError> {
        let serde_json::Value::Object(entries) = raw else {
            return Err(KeeperError::decode(
                Self::METHOD,
                format!("expected object of account balances, got: {raw}"),
            ));
        };
        entries
            .into_iter()
            .map(|(account, value)| {
                parse_btc_value(&value)
                    .map(|balance| (account, balance))
                    .map_err(|e| KeeperError::decode(Self::METHOD, e))
            })
            .collect()
    }
}

// ==============================================================================
// Transfers
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFrom {
    pub from_account: String,
    pub to_address: String,
    pub amount: Amount,
    pub min_conf: Option<u32>,
}

impl Command for SendFrom {
    type Output = String;
    const METHOD: &'static str = "sendfrom";

    fn params(&self) -> Vec<serde_json::Value> {
        let mut params = vec![
            json!(self.from_account),
            json!(self.to_address),
            btc_param(self.amount),
        ];
        push_trailing(&mut params, [self.min_conf.map(|c| json!(c))]);
        params
    }

    fn decode(raw: serde_json::Value) -> Result<String, KeeperError> {
        decode_txid(Self::METHOD, raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendToAddress {
    pub address: String,
    pub amount: Amount,
}

impl Command for SendToAddress {
    type Output = String;
    const METHOD: &'static str = "sendtoaddress";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.address), btc_param(self.amount)]
    }

    fn decode(raw: serde_json::Value) -> Result<String, KeeperError> {
        decode_txid(Self::METHOD, raw)
    }
}

/// Off-chain transfer between two accounts of the same wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub from_account: String,
    pub to_account: String,
    pub amount: Amount,
}

impl Command for Move {
    type Output = bool;
    const METHOD: &'static str = "move";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![
            json!(self.from_account),
            json!(self.to_account),
            btc_param(self.amount),
        ]
    }
}

// ==============================================================================
// UTXOs / Raw Transactions
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUnspent {
    pub min_conf: u32,
    pub max_conf: Option<u32>,
    pub addresses: Option<Vec<String>>,
}

impl Command for ListUnspent {
    type Output = Vec<Unspent>;
    const METHOD: &'static str = "listunspent";

    fn params(&self) -> Vec<serde_json::Value> {
        let mut params = vec![json!(self.min_conf)];
        push_trailing(
            &mut params,
            [
                self.max_conf.map(|c| json!(c)),
                self.addresses.as_ref().map(|a| json!(a)),
            ],
        );
        params
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Unspent {
    pub txid: Txid,
    pub vout: u32,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    #[serde(deserialize_with = "deserialize_btc")]
    pub amount: Decimal,
    pub confirmations: u64,
}

/// Reference to a previous output, as `createrawtransaction` and
/// `omni_createrawtx_change` take them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutPointRef {
    pub txid: String,
    pub vout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRawTransaction {
    pub inputs: Vec<OutPointRef>,
    pub outputs: BTreeMap<String, Amount>,
}

impl Command for CreateRawTransaction {
    type Output = String;
    const METHOD: &'static str = "createrawtransaction";

    fn params(&self) -> Vec<serde_json::Value> {
        let outputs: serde_json::Map<String, serde_json::Value> = self
            .outputs
            .iter()
            .map(|(address, amount)| (address.clone(), btc_param(*amount)))
            .collect();
        vec![json!(self.inputs), serde_json::Value::Object(outputs)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRawTransactionWithWallet {
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
}

impl Command for SignRawTransactionWithWallet {
    type Output = SignedTransaction;
    const METHOD: &'static str = "signrawtransactionwithwallet";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.hex)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRawTransaction {
    pub hex: String,
}

impl Command for SendRawTransaction {
    type Output = String;
    const METHOD: &'static str = "sendrawtransaction";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.hex)]
    }

    fn decode(raw: serde_json::Value) -> Result<String, KeeperError> {
        decode_txid(Self::METHOD, raw)
    }
}
