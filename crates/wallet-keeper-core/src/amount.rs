//! Conversions between gateway amounts and backend-native units.
//!
//! Amounts travel through the gateway as exact [`Decimal`] values in the
//! backend's display unit (BTC, token units, ether). Each backend converts at
//! its own boundary: Bitcoin-family daemons take 8-decimal BTC numbers, Omni
//! takes decimal strings, Ethereum takes hex-encoded wei quantities.

use std::str::FromStr;

use bitcoin::{Amount, Denomination, SignedAmount};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::KeeperError;

const WEI_DECIMALS: u32 = 18;
const BTC_DECIMALS: u32 = 8;

// ==============================================================================
// Bitcoin-family
// ==============================================================================

/// Convert a caller amount into a satoshi-exact [`Amount`].
///
/// Rejects negative values and anything finer than one satoshi.
pub fn to_btc_amount(amount: Decimal) -> Result<Amount, KeeperError> {
    if amount.is_sign_negative() {
        return Err(KeeperError::InvalidAmount(format!(
            "amount must not be negative: {amount}"
        )));
    }
    let text = amount.normalize().to_string();
    Amount::from_str_in(&text, Denomination::Bitcoin)
        .map_err(|e| KeeperError::InvalidAmount(format!("`{text}` is not a valid BTC amount: {e}")))
}

/// JSON parameter form of a BTC amount, as the wallet RPCs expect it.
pub fn btc_param(amount: Amount) -> serde_json::Value {
    serde_json::json!(amount.to_btc())
}

pub fn sats_to_decimal(amount: SignedAmount) -> Decimal {
    Decimal::new(amount.to_sat(), BTC_DECIMALS).normalize()
}

/// Parse a BTC amount reported by a daemon.
///
/// Account balances can legitimately be negative after `move`, so the value is
/// parsed as a [`SignedAmount`]. Number values go through the float parser to
/// accept scientific notation; strings are parsed exactly.
pub fn parse_btc_value(value: &serde_json::Value) -> Result<Decimal, String> {
    let parsed = match value {
        serde_json::Value::Number(n) => {
            let float = n
                .as_f64()
                .ok_or_else(|| format!("invalid BTC amount `{value}`"))?;
            SignedAmount::from_float_in(float, Denomination::Bitcoin)
                .map_err(|e| format!("invalid BTC amount `{value}`: {e}"))?
        }
        serde_json::Value::String(s) => SignedAmount::from_str_in(s, Denomination::Bitcoin)
            .map_err(|e| format!("invalid BTC amount `{s}`: {e}"))?,
        _ => return Err(format!("expected numeric BTC amount, got: {value}")),
    };
    Ok(sats_to_decimal(parsed))
}

/// `deserialize_with` adapter for BTC amount fields in daemon results.
pub(crate) fn deserialize_btc<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    parse_btc_value(&raw).map_err(serde::de::Error::custom)
}

// ==============================================================================
// Omni Layer
// ==============================================================================

/// Omni RPCs take and return token amounts as decimal strings.
pub fn omni_param(amount: Decimal) -> Result<serde_json::Value, KeeperError> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(KeeperError::InvalidAmount(format!(
            "token amount must be positive: {amount}"
        )));
    }
    Ok(serde_json::Value::String(amount.normalize().to_string()))
}

pub fn parse_omni_value(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim())
        .map(|d| d.normalize())
        .map_err(|e| format!("invalid token amount `{value}`: {e}"))
}

// ==============================================================================
// Ethereum
// ==============================================================================

/// Convert ether into integer wei, rejecting sub-wei precision.
pub fn ether_to_wei(amount: Decimal) -> Result<u128, KeeperError> {
    if amount.is_sign_negative() {
        return Err(KeeperError::InvalidAmount(format!(
            "amount must not be negative: {amount}"
        )));
    }
    let amount = amount.normalize();
    if amount.scale() > WEI_DECIMALS {
        return Err(KeeperError::InvalidAmount(format!(
            "`{amount}` has more than {WEI_DECIMALS} decimal places"
        )));
    }
    // mantissa * 10^(18 - scale) is the wei value; the mantissa of a
    // non-negative decimal is non-negative.
    let mantissa = u128::try_from(amount.mantissa())
        .map_err(|_| KeeperError::InvalidAmount(format!("`{amount}` is out of range")))?;
    10u128
        .checked_pow(WEI_DECIMALS - amount.scale())
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| KeeperError::InvalidAmount(format!("`{amount}` is out of range")))
}

pub fn wei_to_ether(wei: u128) -> Result<Decimal, String> {
    let wei = i128::try_from(wei).map_err(|_| format!("wei value {wei} out of range"))?;
    Decimal::try_from_i128_with_scale(wei, WEI_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|e| format!("wei value {wei} out of range: {e}"))
}

/// Parse an Ethereum hex quantity (`0x1bc16d674ec80000`).
pub fn parse_quantity(value: &str) -> Result<u128, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| format!("quantity `{value}` is missing 0x prefix"))?;
    if digits.is_empty() {
        return Err(format!("quantity `{value}` has no digits"));
    }
    u128::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity `{value}`: {e}"))
}

pub fn format_quantity(value: u128) -> String {
    format!("{value:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid decimal literal")
    }

    #[test]
    fn btc_amount_is_satoshi_exact() {
        let amount = to_btc_amount(dec("1.5")).expect("valid amount");
        assert_eq!(amount, Amount::from_sat(150_000_000));
        assert_eq!(btc_param(amount), serde_json::json!(1.5));
    }

    #[test]
    fn btc_amount_rejects_sub_satoshi_and_negative() {
        assert!(to_btc_amount(dec("0.000000001")).is_err());
        assert!(to_btc_amount(dec("-1")).is_err());
    }

    #[test]
    fn btc_value_parses_numbers_strings_and_negatives() {
        assert_eq!(parse_btc_value(&serde_json::json!(0.00001)), Ok(dec("0.00001")));
        assert_eq!(parse_btc_value(&serde_json::json!("0.5")), Ok(dec("0.5")));
        assert_eq!(parse_btc_value(&serde_json::json!(-2.25)), Ok(dec("-2.25")));
        assert_eq!(parse_btc_value(&serde_json::json!(6.6e-6)), Ok(dec("0.0000066")));
        assert!(parse_btc_value(&serde_json::json!(true)).is_err());
    }

    #[test]
    fn omni_param_is_a_decimal_string() {
        assert_eq!(
            omni_param(dec("10.50")).expect("positive amount"),
            serde_json::json!("10.5")
        );
        assert!(omni_param(Decimal::ZERO).is_err());
    }

    #[test]
    fn ether_converts_to_wei_and_back() {
        let wei = ether_to_wei(dec("1.5")).expect("valid ether amount");
        assert_eq!(wei, 1_500_000_000_000_000_000);
        assert_eq!(format_quantity(wei), "0x14d1120d7b160000");
        assert_eq!(wei_to_ether(wei), Ok(dec("1.5")));
        assert_eq!(ether_to_wei(dec("0.000000000000000001")).ok(), Some(1));
    }

    #[test]
    fn ether_rejects_sub_wei_precision() {
        assert!(ether_to_wei(dec("0.0000000000000000001")).is_err());
    }

    #[test]
    fn quantity_parsing() {
        assert_eq!(parse_quantity("0x0"), Ok(0));
        assert_eq!(parse_quantity("0x1b4"), Ok(436));
        assert!(parse_quantity("1b4").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }
}
