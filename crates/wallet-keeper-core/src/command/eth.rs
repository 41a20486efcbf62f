//! Ethereum node procedures. Keys live in the node's keystore and are used
//! through the `personal_*` namespace.

use serde::Serialize;
use serde_json::json;

use crate::amount::{format_quantity, parse_quantity};
use crate::error::KeeperError;

use super::Command;

fn decode_quantity(method: &'static str, raw: serde_json::Value) -> Result<u128, KeeperError> {
    let text = raw
        .as_str()
        .ok_or_else(|| KeeperError::decode(method, format!("expected hex quantity, got: {raw}")))?;
    parse_quantity(text).map_err(|e| KeeperError::decode(method, e))
}

fn decode_hash(method: &'static str, raw: serde_json::Value) -> Result<String, KeeperError> {
    let text = raw
        .as_str()
        .ok_or_else(|| KeeperError::decode(method, format!("expected hash, got: {raw}")))?;
    let valid = text.len() == 66
        && text.starts_with("0x")
        && text[2..].bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(KeeperError::decode(method, format!("invalid hash `{text}`")));
    }
    Ok(text.to_owned())
}

/// Block a state query is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    fn to_param(self) -> serde_json::Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Number(n) => json!(format_quantity(u128::from(n))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetVersion;

impl Command for NetVersion {
    type Output = String;
    const METHOD: &'static str = "net_version";

    fn params(&self) -> Vec<serde_json::Value> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockNumber;

impl Command for BlockNumber {
    type Output = u64;
    const METHOD: &'static str = "eth_blockNumber";

    fn params(&self) -> Vec<serde_json::Value> {
        Vec::new()
    }

    fn decode(raw: serde_json::Value) -> Result<u64, KeeperError> {
        let height = decode_quantity(Self::METHOD, raw)?;
        u64::try_from(height)
            .map_err(|_| KeeperError::decode(Self::METHOD, format!("height {height} out of range")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accounts;

impl Command for Accounts {
    type Output = Vec<String>;
    const METHOD: &'static str = "eth_accounts";

    fn params(&self) -> Vec<serde_json::Value> {
        Vec::new()
    }
}

/// Balance in wei.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBalance {
    pub address: String,
    pub block: BlockTag,
}

impl Command for GetBalance {
    type Output = u128;
    const METHOD: &'static str = "eth_getBalance";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.address), self.block.to_param()]
    }

    fn decode(raw: serde_json::Value) -> Result<u128, KeeperError> {
        decode_quantity(Self::METHOD, raw)
    }
}

/// Generate a key in the node keystore, encrypted with `password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub password: String,
}

impl Command for NewAccount {
    type Output = String;
    const METHOD: &'static str = "personal_newAccount";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.password)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    /// Hex quantity in wei.
    pub value: String,
}

/// Sign with the keystore key of `tx.from` and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTransaction {
    pub tx: TransactionRequest,
    pub password: String,
}

impl Command for SendTransaction {
    type Output = String;
    const METHOD: &'static str = "personal_sendTransaction";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.tx), json!(self.password)]
    }

    fn decode(raw: serde_json::Value) -> Result<String, KeeperError> {
        decode_hash(Self::METHOD, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_number_decodes_hex() {
        assert_eq!(BlockNumber::decode(json!("0x10d4f")).expect("hex height"), 68_943);
        assert!(BlockNumber::decode(json!(68_943)).is_err());
    }

    #[test]
    fn get_balance_encodes_block_tag() {
        let latest = GetBalance {
            address: "0xabc".to_string(),
            block: BlockTag::Latest,
        };
        assert_eq!(latest.params(), vec![json!("0xabc"), json!("latest")]);

        let pinned = GetBalance {
            block: BlockTag::Number(100),
            ..latest
        };
        assert_eq!(pinned.params(), vec![json!("0xabc"), json!("0x64")]);
    }

    #[test]
    fn send_transaction_encodes_object_then_password() {
        let cmd = SendTransaction {
            tx: TransactionRequest {
                from: "0xfrom".to_string(),
                to: "0xto".to_string(),
                value: "0xde0b6b3a7640000".to_string(),
            },
            password: "secret".to_string(),
        };
        assert_eq!(
            cmd.params(),
            vec![
                json!({"from": "0xfrom", "to": "0xto", "value": "0xde0b6b3a7640000"}),
                json!("secret")
            ]
        );
    }

    #[test]
    fn send_transaction_validates_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(SendTransaction::decode(json!(hash.clone())).expect("valid hash"), hash);
        assert!(SendTransaction::decode(json!("0x1234")).is_err());
    }
}
