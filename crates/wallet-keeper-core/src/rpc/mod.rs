//! JSON-RPC transport layer.
//!
//! Defines the [`RpcTransport`] trait that every Keeper talks through and
//! provides an HTTP implementation ([`HttpRpcClient`]) plus a scripted test
//! double (`mock::MockTransport`).

mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use http_adapter::HttpRpcClient;

use async_trait::async_trait;

use crate::command::{Command, Request};
use crate::error::KeeperError;

/// Sends encoded commands to one daemon endpoint.
///
/// Implementations must be safe to share between concurrent requests; the
/// HTTP client does this through reqwest's connection pool.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Reserve `count` consecutive request ids and return the first.
    fn reserve_ids(&self, count: u64) -> u64;

    /// Execute one request and return its raw result (`null` when absent).
    async fn send(&self, request: Request) -> Result<serde_json::Value, KeeperError>;

    /// Execute several requests, returning results in request order.
    /// Implementations may pack these into a single JSON-RPC batch.
    async fn send_batch(
        &self,
        requests: Vec<Request>,
    ) -> Result<Vec<serde_json::Value>, KeeperError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.send(request).await?);
        }
        Ok(results)
    }
}

impl<'a> dyn RpcTransport + 'a {
    /// Encode, send and decode one command.
    pub async fn execute<C>(&self, command: C) -> Result<C::Output, KeeperError>
    where
        C: Command + Send,
    {
        let request = command.encode(self.reserve_ids(1));
        let raw = self.send(request).await?;
        C::decode(raw)
    }

    /// Execute commands of one type together, decoding results in order.
    pub async fn execute_batch<C>(&self, commands: Vec<C>) -> Result<Vec<C::Output>, KeeperError>
    where
        C: Command + Send,
    {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let start_id = self.reserve_ids(commands.len() as u64);
        let requests = commands
            .iter()
            .zip(start_id..)
            .map(|(command, id)| command.encode(id))
            .collect();
        let raw = self.send_batch(requests).await?;
        raw.into_iter().map(C::decode).collect()
    }
}
