use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use tracing::{debug, trace};

use crate::command::Request;
use crate::config::{RpcEndpoint, RpcOptions};
use crate::error::{KeeperError, RpcError};
use crate::types::Coin;

use super::super::RpcTransport;
use super::connection::{parse_connection, resolve_auth};
use super::protocol::{into_result, parse_batch_id, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseOwned};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Wallet daemon JSON-RPC client over HTTP(S).
///
/// One instance per backend, shared by every in-flight request. reqwest pools
/// connections internally, so concurrent calls need no extra locking here.
pub struct HttpRpcClient {
    coin: Coin,
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a client for one daemon endpoint.
    ///
    /// The URL must be `http://` or `https://`. User and password are either
    /// both set (HTTP basic auth) or both absent.
    pub fn new(coin: Coin, endpoint: &RpcEndpoint, options: &RpcOptions) -> Result<Self, KeeperError> {
        let auth = resolve_auth(endpoint)?;
        let url = parse_connection(&endpoint.url)?;

        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.timeout)
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| KeeperError::Config(format!("build HTTP client for {coin}: {e}")))?;

        let limiter = match options.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    KeeperError::Config("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            coin,
            client,
            url,
            auth,
            limiter,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn post<T: serde::Serialize + ?Sized>(&self, body: &T) -> Result<String, KeeperError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        // Bitcoin-family daemons answer logical errors with HTTP 500 and a
        // JSON-RPC body, so the status alone says nothing; the body decides.
        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(RpcError::Transport)?;
        debug!(rpc.coin = %self.coin, %status, body_len = body.len(), "rpc response");
        trace!(rpc.coin = %self.coin, body = %body, "rpc response body");
        Ok(body)
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    fn reserve_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    async fn send(&self, request: Request) -> Result<serde_json::Value, KeeperError> {
        self.wait_for_rate_limit().await;
        debug!(
            rpc.coin = %self.coin,
            rpc.id = request.id,
            rpc.method = request.method,
            rpc.params = request.params.len(),
            "rpc call"
        );

        let body = self.post(&JsonRpcRequest::from(&request)).await?;
        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!(
                "decode JSON-RPC response: {e}; body={}",
                body_excerpt(&body)
            ))
        })?;

        into_result(decoded.result, decoded.error)
    }

    async fn send_batch(
        &self,
        requests: Vec<Request>,
    ) -> Result<Vec<serde_json::Value>, KeeperError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        self.wait_for_rate_limit().await;
        debug!(
            rpc.coin = %self.coin,
            rpc.batch_start_id = requests[0].id,
            rpc.batch_size = requests.len(),
            "rpc batch call"
        );

        let wire: Vec<JsonRpcRequest<'_>> = requests.iter().map(JsonRpcRequest::from).collect();
        let body = self.post(&wire).await?;
        let decoded: Vec<JsonRpcResponseOwned> = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!(
                "decode JSON-RPC batch response: {e}; body={}",
                body_excerpt(&body)
            ))
        })?;

        let mut by_id: HashMap<u64, JsonRpcResponseOwned> = HashMap::with_capacity(decoded.len());
        for item in decoded {
            let id = parse_batch_id(&item.id)?;
            by_id.insert(id, item);
        }

        requests
            .iter()
            .map(|request| {
                let item = by_id
                    .remove(&request.id)
                    .ok_or(RpcError::MissingBatchItem { id: request.id })?;
                into_result(item.result, item.error)
            })
            .collect()
    }
}

/// Longest slice of an undecodable body kept in error messages.
const BODY_EXCERPT_CHARS: usize = 120;

/// Leading part of a response body for error messages; the full body is
/// only logged at trace level.
fn body_excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}... ({} bytes)", &body[..cut], body.len()),
        None => body.to_owned(),
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}
