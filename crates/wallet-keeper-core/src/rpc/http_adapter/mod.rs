//! JSON-RPC client for wallet daemons over HTTP(S).
//!
//! Implements [`RpcTransport`](super::RpcTransport) using `reqwest`, with
//! basic auth, a mandatory per-call timeout, optional request rate limiting,
//! and real JSON-RPC batches.

mod client;
mod connection;
mod protocol;

pub use client::HttpRpcClient;
