use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

/// Name of the account used when a caller does not name one.
pub const DEFAULT_ACCOUNT: &str = "";

/// Confirmation depth applied to account listings and balances.
pub const MIN_CONFIRMATIONS: u32 = 6;

// ==============================================================================
// Coin Selector
// ==============================================================================

/// Backend family a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coin {
    Btc,
    Usdt,
    Eth,
}

impl Coin {
    /// Every supported coin, in health-check order.
    pub const ALL: [Coin; 3] = [Coin::Btc, Coin::Usdt, Coin::Eth];

    pub fn as_str(self) -> &'static str {
        match self {
            Coin::Btc => "btc",
            Coin::Usdt => "usdt",
            Coin::Eth => "eth",
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown coin type `{0}`, expected one of btc, usdt, eth")]
pub struct UnknownCoin(pub String);

impl FromStr for Coin {
    type Err = UnknownCoin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" => Ok(Coin::Btc),
            "usdt" => Ok(Coin::Usdt),
            "eth" => Ok(Coin::Eth),
            _ => Err(UnknownCoin(s.to_owned())),
        }
    }
}

// ==============================================================================
// Keeper Results
// ==============================================================================

/// Balance and receive addresses of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountInfo {
    pub account: String,
    pub balance: Decimal,
    pub addresses: Vec<String>,
}

/// One spendable output, or for account-model chains one funded address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnspentOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vout: Option<u32>,
    pub address: Option<String>,
    pub account: Option<String>,
    pub amount: Decimal,
    pub confirmations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_parses_case_insensitively() {
        assert_eq!("BTC".parse::<Coin>(), Ok(Coin::Btc));
        assert_eq!("uSdT".parse::<Coin>(), Ok(Coin::Usdt));
        assert_eq!(" eth ".parse::<Coin>(), Ok(Coin::Eth));
    }

    #[test]
    fn coin_rejects_unknown_and_empty() {
        assert!("ltc".parse::<Coin>().is_err());
        assert!("".parse::<Coin>().is_err());
    }

    #[test]
    fn coin_display_round_trips() {
        for coin in Coin::ALL {
            assert_eq!(coin.to_string().parse::<Coin>(), Ok(coin));
        }
    }
}
