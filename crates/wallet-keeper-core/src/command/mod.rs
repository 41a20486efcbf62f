//! Typed JSON-RPC commands.
//!
//! Every remote procedure is one [`Command`] type: its fields are projected in
//! declaration order into the positional parameter list, and its `decode`
//! turns the daemon's untyped result into a typed value. Adding a procedure
//! means adding a type here; the transport never changes.

pub mod btc;
pub mod eth;
pub mod omni;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::KeeperError;

/// One encoded call, ready for the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: u64,
    pub method: &'static str,
    pub params: Vec<serde_json::Value>,
}

pub trait Command {
    type Output: DeserializeOwned;

    /// Remote procedure name.
    const METHOD: &'static str;

    /// Positional parameters. Trailing optional fields that are unset are
    /// left out entirely rather than sent as `null`.
    fn params(&self) -> Vec<serde_json::Value>;

    fn decode(raw: serde_json::Value) -> Result<Self::Output, KeeperError> {
        serde_json::from_value(raw).map_err(|e| KeeperError::decode(Self::METHOD, e))
    }

    fn encode(&self, id: u64) -> Request {
        Request {
            id,
            method: Self::METHOD,
            params: self.params(),
        }
    }
}

/// Append trailing optional parameters, stopping at the first unset one so
/// that positional decoding on the daemon never sees a gap.
pub(crate) fn push_trailing(
    params: &mut Vec<serde_json::Value>,
    optional: impl IntoIterator<Item = Option<serde_json::Value>>,
) {
    params.extend(optional.into_iter().map_while(|value| value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_optionals_stop_at_first_gap() {
        let mut params = vec![serde_json::json!("a")];
        push_trailing(
            &mut params,
            [
                Some(serde_json::json!(1)),
                None,
                Some(serde_json::json!(true)),
            ],
        );
        assert_eq!(params, vec![serde_json::json!("a"), serde_json::json!(1)]);
    }
}
