use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wallet_keeper_core::{AccountInfo, UnspentOutput, DEFAULT_ACCOUNT, MIN_CONFIRMATIONS};

use super::error::AppError;
use super::SelectedKeeper;

// ==============================================================================
// Request and Response Shapes
// ==============================================================================

#[derive(Debug, Serialize)]
pub(super) struct Envelope<T> {
    message: T,
}

type Reply<T> = Result<Json<Envelope<T>>, AppError>;

fn reply<T>(message: T) -> Reply<T> {
    Ok(Json(Envelope { message }))
}

#[derive(Debug, Deserialize)]
pub(super) struct AccountQuery {
    account: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MinConfQuery {
    minconf: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendToAddressQuery {
    address: Option<String>,
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendFromQuery {
    from: Option<String>,
    address: Option<String>,
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MoveQuery {
    from: Option<String>,
    to: Option<String>,
    amount: Option<String>,
}

fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    extracted
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Amounts must be strictly positive decimals.
fn parse_amount(raw: &str) -> Result<Decimal, AppError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid amount `{raw}`: {e}")))?;
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(format!(
            "amount must be positive, got `{raw}`"
        )));
    }
    Ok(amount)
}

fn required_account(account: Option<String>) -> Result<String, AppError> {
    account
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::BadRequest("account is a mandatory field".to_string()))
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn get_block_count(Extension(keeper): Extension<SelectedKeeper>) -> Reply<u64> {
    reply(keeper.get_block_count().await?)
}

pub(super) async fn get_address(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<AccountQuery>, QueryRejection>,
) -> Reply<String> {
    let account = query(params)?.account.unwrap_or_else(|| DEFAULT_ACCOUNT.to_owned());
    reply(keeper.get_address(&account).await?)
}

pub(super) async fn get_addresses_by_account(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<AccountQuery>, QueryRejection>,
) -> Reply<Vec<String>> {
    let account = query(params)?.account.unwrap_or_else(|| DEFAULT_ACCOUNT.to_owned());
    reply(keeper.get_addresses_by_account(&account).await?)
}

pub(super) async fn get_new_address(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<AccountQuery>, QueryRejection>,
) -> Reply<String> {
    let account = query(params)?.account.unwrap_or_else(|| DEFAULT_ACCOUNT.to_owned());
    reply(keeper.get_new_address(&account).await?)
}

pub(super) async fn create_account(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<AccountQuery>, QueryRejection>,
) -> Reply<String> {
    let account = required_account(query(params)?.account)?;
    reply(keeper.create_account(&account).await?)
}

pub(super) async fn get_account_info(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<AccountQuery>, QueryRejection>,
) -> Reply<AccountInfo> {
    let account = required_account(query(params)?.account)?;
    reply(keeper.get_account_info(&account).await?)
}

pub(super) async fn list_accounts(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<MinConfQuery>, QueryRejection>,
) -> Reply<BTreeMap<String, Decimal>> {
    let min_conf = query(params)?.minconf.unwrap_or(MIN_CONFIRMATIONS);
    reply(keeper.list_accounts(min_conf).await?)
}

pub(super) async fn get_balance(Extension(keeper): Extension<SelectedKeeper>) -> Reply<Decimal> {
    reply(keeper.get_balance().await?)
}

pub(super) async fn send_to_address(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<SendToAddressQuery>, QueryRejection>,
) -> Reply<String> {
    let SendToAddressQuery { address, amount } = query(params)?;
    let (Some(address), Some(amount)) = (address, amount) else {
        return Err(AppError::BadRequest(
            "address/amount are both mandatory fields".to_string(),
        ));
    };
    let amount = parse_amount(&amount)?;
    reply(keeper.send_to_address(&address, amount).await?)
}

pub(super) async fn send_from(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<SendFromQuery>, QueryRejection>,
) -> Reply<String> {
    let SendFromQuery {
        from,
        address,
        amount,
    } = query(params)?;
    let (Some(from), Some(address), Some(amount)) = (from, address, amount) else {
        return Err(AppError::BadRequest(
            "from account/address/amount are all mandatory fields".to_string(),
        ));
    };
    let amount = parse_amount(&amount)?;
    reply(keeper.send_from(&from, &address, amount).await?)
}

pub(super) async fn list_unspent_min(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<MinConfQuery>, QueryRejection>,
) -> Reply<Vec<UnspentOutput>> {
    let min_conf = query(params)?.minconf.unwrap_or(MIN_CONFIRMATIONS);
    reply(keeper.list_unspent_min(min_conf).await?)
}

pub(super) async fn move_funds(
    Extension(keeper): Extension<SelectedKeeper>,
    params: Result<Query<MoveQuery>, QueryRejection>,
) -> Reply<&'static str> {
    let MoveQuery { from, to, amount } = query(params)?;
    let (Some(from), Some(to), Some(amount)) = (from, to, amount) else {
        return Err(AppError::BadRequest(
            "from account/to account/amount are all mandatory fields".to_string(),
        ));
    };
    let amount = parse_amount(&amount)?;
    if keeper.move_funds(&from, &to, amount).await? {
        reply("success")
    } else {
        Err(AppError::BadRequest("fail".to_string()))
    }
}
