pub mod amount;
pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod journal;
pub mod keeper;
pub mod rpc;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{KeeperError, RpcError};
pub use gateway::{Gateway, RoutingError};
pub use keeper::Keeper;
pub use types::{AccountInfo, Coin, UnspentOutput, DEFAULT_ACCOUNT, MIN_CONFIRMATIONS};
