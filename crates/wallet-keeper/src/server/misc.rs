use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::error::AppError;
use super::SharedState;

/// Routes listed by `/help`.
const METHODS_SUPPORTED: &[(&str, &str)] = &[
    ("/ping", "check that the API service is up"),
    ("/health", "ping every configured backend"),
    ("/help", "display this message"),
    ("/getblockcount", "height of the blockchain"),
    ("/getaddress", "receive address of the given account or the default one"),
    ("/getaddressesbyaccount", "all addresses of the given account or the default one"),
    ("/getnewaddress", "a new address for the given account or the default one"),
    ("/createaccount", "create account and return its receive address, error if it exists"),
    ("/getaccountinfo", "balance and addresses of an account"),
    ("/listaccounts", "accounts with their balances, minconf defaults to 6"),
    ("/getbalance", "sum of balances of all accounts"),
    ("/sendtoaddress", "send amount from the default funds to an address"),
    ("/sendfrom", "send amount from an account to an address"),
    ("/listunspentmin", "spendable outputs, minconf defaults to 6"),
    ("/move", "move amount from one account to another"),
];

pub(super) async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

pub(super) async fn health(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    state.gateway.health().await?;
    Ok(Json(json!({ "message": "healthy" })))
}

pub(super) async fn help() -> Json<Value> {
    let methods: BTreeMap<&str, &str> = METHODS_SUPPORTED.iter().copied().collect();
    Json(json!({ "methods": methods }))
}
