use crate::types::Coin;

/// Failures raised while talking JSON-RPC to a wallet daemon.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("missing JSON-RPC batch item id={id}")]
    MissingBatchItem { id: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum KeeperError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("failed to decode `{method}` result: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("insufficient funds in account `{account}`")]
    InsufficientFunds { account: String },

    #[error("no spendable outputs at {address} to pay the transaction fee")]
    NoFeeInputs { address: String },

    #[error("wallet could not fully sign the transaction")]
    IncompleteSignature,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{coin}: {source}")]
    Backend {
        coin: Coin,
        #[source]
        source: Box<KeeperError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KeeperError {
    /// Whether the failure means the daemon could not be reached or answered
    /// with something we cannot understand.
    ///
    /// Everything else is a logical rejection that the daemon (or the Keeper
    /// on its behalf) reported deliberately and that should reach the caller
    /// with its own message.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Rpc(RpcError::ServerError { .. }) => false,
            Self::Rpc(_) | Self::Decode { .. } | Self::Io(_) => true,
            Self::Backend { source, .. } => source.is_connectivity(),
            Self::AccountNotFound(_)
            | Self::AccountExists(_)
            | Self::InsufficientFunds { .. }
            | Self::NoFeeInputs { .. }
            | Self::IncompleteSignature
            | Self::InvalidAmount(_)
            | Self::Config(_) => false,
        }
    }

    /// Whether the caller supplied an amount the backend cannot represent.
    pub fn is_invalid_amount(&self) -> bool {
        match self {
            Self::InvalidAmount(_) => true,
            Self::Backend { source, .. } => source.is_invalid_amount(),
            _ => false,
        }
    }

    /// Annotate the error with the backend it came from.
    pub fn with_coin(self, coin: Coin) -> Self {
        match self {
            already @ Self::Backend { .. } => already,
            other => Self::Backend {
                coin,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn decode(method: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            method,
            message: message.to_string(),
        }
    }
}
