//! Omni Layer procedures for property-token balances and raw token transfers.

use bitcoin::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::amount::{btc_param, parse_omni_value};
use crate::error::KeeperError;

use super::{push_trailing, Command};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmniGetBalance {
    pub address: String,
    pub property_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OmniBalance {
    pub balance: Decimal,
    pub reserved: Decimal,
}

impl Command for OmniGetBalance {
    type Output = OmniBalance;
    const METHOD: &'static str = "omni_getbalance";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.address), json!(self.property_id)]
    }

    fn decode(raw: serde_json::Value) -> Result<OmniBalance, KeeperError> {
        #[derive(Deserialize)]
        struct RawBalance {
            balance: String,
            reserved: String,
        }

        let parsed: RawBalance =
            serde_json::from_value(raw).map_err(|e| KeeperError::decode(Self::METHOD, e))?;
        Ok(OmniBalance {
            balance: parse_omni_value(&parsed.balance)
                .map_err(|e| KeeperError::decode(Self::METHOD, e))?,
            reserved: parse_omni_value(&parsed.reserved)
                .map_err(|e| KeeperError::decode(Self::METHOD, e))?,
        })
    }
}

/// Encoded simple-send payload for `amount` units of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmniCreatePayloadSimpleSend {
    pub property_id: u32,
    /// Already-validated decimal string, see [`crate::amount::omni_param`].
    pub amount: serde_json::Value,
}

impl Command for OmniCreatePayloadSimpleSend {
    type Output = String;
    const METHOD: &'static str = "omni_createpayload_simplesend";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.property_id), self.amount.clone()]
    }
}

/// Attach a payload to a raw transaction as a class C (`OP_RETURN`) output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmniCreateRawTxOpReturn {
    pub raw: String,
    pub payload: String,
}

impl Command for OmniCreateRawTxOpReturn {
    type Output = String;
    const METHOD: &'static str = "omni_createrawtx_opreturn";

    fn params(&self) -> Vec<serde_json::Value> {
        vec![json!(self.raw), json!(self.payload)]
    }
}

/// Add the reference (recipient) output to a raw transaction.
///
/// Without `amount` the daemon attaches the minimum dust value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmniCreateRawTxReference {
    pub raw: String,
    pub destination: String,
    pub amount: Option<Amount>,
}

impl Command for OmniCreateRawTxReference {
    type Output = String;
    const METHOD: &'static str = "omni_createrawtx_reference";

    fn params(&self) -> Vec<serde_json::Value> {
        let mut params = vec![json!(self.raw), json!(self.destination)];
        push_trailing(&mut params, [self.amount.map(btc_param)]);
        params
    }
}

/// Previous output spent by a raw transaction, as the change helper needs it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrevTx {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    pub value: f64,
}

/// Add a change output, paying `fee` out of the spent inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OmniCreateRawTxChange {
    pub raw: String,
    pub prev_txs: Vec<PrevTx>,
    pub destination: String,
    pub fee: Amount,
    pub position: Option<u32>,
}

impl Command for OmniCreateRawTxChange {
    type Output = String;
    const METHOD: &'static str = "omni_createrawtx_change";

    fn params(&self) -> Vec<serde_json::Value> {
        let mut params = vec![
            json!(self.raw),
            json!(self.prev_txs),
            json!(self.destination),
            btc_param(self.fee),
        ];
        push_trailing(&mut params, [self.position.map(|p| json!(p))]);
        params
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn reference_omits_amount_when_unset() {
        let cmd = OmniCreateRawTxReference {
            raw: "0100".to_string(),
            destination: "1Dest".to_string(),
            amount: None,
        };
        assert_eq!(cmd.encode(1).method, "omni_createrawtx_reference");
        assert_eq!(cmd.params(), vec![json!("0100"), json!("1Dest")]);

        let with_amount = OmniCreateRawTxReference {
            amount: Some(Amount::from_sat(546)),
            ..cmd
        };
        assert_eq!(
            with_amount.params(),
            vec![json!("0100"), json!("1Dest"), json!(0.00000546)]
        );
    }

    #[test]
    fn balance_decodes_string_amounts() {
        let balance = OmniGetBalance::decode(json!({
            "balance": "12.50000000",
            "reserved": "0.00000000",
            "frozen": "0.00000000"
        }))
        .expect("well-formed omni balance");
        assert_eq!(balance.balance, Decimal::from_str("12.5").expect("literal"));
        assert!(balance.reserved.is_zero());
    }

    #[test]
    fn balance_with_garbage_amount_is_decode_error() {
        let err = OmniGetBalance::decode(json!({"balance": "lots", "reserved": "0"}))
            .expect_err("unparseable amount");
        assert!(matches!(
            err,
            KeeperError::Decode {
                method: "omni_getbalance",
                ..
            }
        ));
    }

    #[test]
    fn change_encodes_prev_txs_in_order() {
        let cmd = OmniCreateRawTxChange {
            raw: "0100".to_string(),
            prev_txs: vec![PrevTx {
                txid: "ab".to_string(),
                vout: 2,
                script_pub_key: "76a9".to_string(),
                value: 0.001,
            }],
            destination: "1Change".to_string(),
            fee: Amount::from_sat(10_000),
            position: None,
        };
        assert_eq!(
            cmd.params(),
            vec![
                json!("0100"),
                json!([{"txid": "ab", "vout": 2, "scriptPubKey": "76a9", "value": 0.001}]),
                json!("1Change"),
                json!(0.0001),
            ]
        );
    }

    #[test]
    fn payload_params_are_property_then_amount() {
        let cmd = OmniCreatePayloadSimpleSend {
            property_id: 31,
            amount: json!("1.5"),
        };
        assert_eq!(cmd.params(), vec![json!(31), json!("1.5")]);
    }
}
