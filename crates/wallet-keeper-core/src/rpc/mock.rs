use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::Request;
use crate::error::{KeeperError, RpcError};

use super::RpcTransport;

#[derive(Debug, Clone)]
enum Reply {
    Ok(serde_json::Value),
    ServerError { code: i64, message: String },
    Unreachable,
}

impl Reply {
    fn into_result(self) -> Result<serde_json::Value, KeeperError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::ServerError { code, message } => {
                Err(RpcError::ServerError { code, message }.into())
            }
            Reply::Unreachable => {
                Err(RpcError::InvalidResponse("connection refused".to_string()).into())
            }
        }
    }
}

/// A scripted daemon for Keeper tests.
///
/// Replies are queued per method; the last queued reply repeats once the
/// queue is down to one entry. Every request is recorded for inspection.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<HashMap<&'static str, VecDeque<Reply>>>>,
    requests: Arc<Mutex<Vec<Request>>>,
    next_id: Arc<AtomicU64>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, method: &'static str, reply: Reply) -> Self {
        self.replies
            .lock()
            .expect("mock replies lock")
            .entry(method)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn reply(self, method: &'static str, value: serde_json::Value) -> Self {
        self.push(method, Reply::Ok(value))
    }

    pub fn fail(self, method: &'static str, code: i64, message: &str) -> Self {
        self.push(
            method,
            Reply::ServerError {
                code,
                message: message.to_string(),
            },
        )
    }

    pub fn unreachable(self, method: &'static str) -> Self {
        self.push(method, Reply::Unreachable)
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("mock requests lock").clone()
    }

    /// Methods called so far, in order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.requests().iter().map(|r| r.method).collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub fn into_transport(self) -> Arc<dyn RpcTransport> {
        Arc::new(self)
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    fn reserve_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    async fn send(&self, request: Request) -> Result<serde_json::Value, KeeperError> {
        let method = request.method;
        self.requests
            .lock()
            .expect("mock requests lock")
            .push(request);

        let reply = {
            let mut replies = self.replies.lock().expect("mock replies lock");
            let queue = replies
                .get_mut(method)
                .unwrap_or_else(|| panic!("no scripted reply for `{method}`"));
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };
        reply
            .unwrap_or_else(|| panic!("empty reply queue for `{method}`"))
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::command::btc::{GetBlockCount, GetNewAddress};

    #[tokio::test]
    async fn replies_are_consumed_in_order_and_last_repeats() {
        let mock = MockTransport::new()
            .reply("getnewaddress", json!("addr-1"))
            .reply("getnewaddress", json!("addr-2"));
        let rpc = mock.clone().into_transport();

        let cmd = || GetNewAddress {
            account: "alice".to_string(),
        };
        assert_eq!(rpc.execute(cmd()).await.expect("first"), "addr-1");
        assert_eq!(rpc.execute(cmd()).await.expect("second"), "addr-2");
        assert_eq!(rpc.execute(cmd()).await.expect("repeat"), "addr-2");
        assert_eq!(mock.calls_to("getnewaddress").len(), 3);
    }

    #[tokio::test]
    async fn ids_are_unique_per_transport() {
        let mock = MockTransport::new().reply("getblockcount", json!(1));
        let rpc = mock.clone().into_transport();
        rpc.execute(GetBlockCount).await.expect("first");
        rpc.execute(GetBlockCount).await.expect("second");
        let ids: Vec<u64> = mock.requests().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn batch_falls_back_to_sequential_sends() {
        let mock = MockTransport::new().reply("getblockcount", json!(5));
        let rpc = mock.clone().into_transport();
        let heights = rpc
            .execute_batch(vec![GetBlockCount, GetBlockCount])
            .await
            .expect("batch");
        assert_eq!(heights, vec![5, 5]);
        assert_eq!(mock.methods(), vec!["getblockcount", "getblockcount"]);
    }
}
