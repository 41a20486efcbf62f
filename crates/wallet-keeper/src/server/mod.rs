mod error;
mod misc;
mod wallet;

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use wallet_keeper_core::{Gateway, Keeper};

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub gateway: Gateway,
}

type SharedState = Arc<AppState>;

/// Header carrying the per-request coin selector.
pub const COIN_TYPE_HEADER: &str = "CoinType";

/// The Keeper chosen for the current request by [`select_keeper`].
#[derive(Clone)]
pub(crate) struct SelectedKeeper(Arc<dyn Keeper>);

impl Deref for SelectedKeeper {
    type Target = dyn Keeper;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    let public = Router::new()
        .route("/ping", get(misc::ping))
        .route("/health", get(misc::health))
        .route("/help", get(misc::help));

    // Every wallet route is served by exactly one Keeper, resolved from the
    // coin header before the handler runs.
    let wallet = Router::new()
        .route("/getblockcount", get(wallet::get_block_count))
        .route("/getaddress", get(wallet::get_address))
        .route("/getaddressesbyaccount", get(wallet::get_addresses_by_account))
        .route("/getnewaddress", get(wallet::get_new_address))
        .route("/createaccount", get(wallet::create_account))
        .route("/getaccountinfo", get(wallet::get_account_info))
        .route("/listaccounts", get(wallet::list_accounts))
        .route("/getbalance", get(wallet::get_balance))
        .route("/sendtoaddress", get(wallet::send_to_address))
        .route("/sendfrom", get(wallet::send_from))
        .route("/listunspentmin", get(wallet::list_unspent_min))
        .route("/move", get(wallet::move_funds))
        .route_layer(middleware::from_fn_with_state(shared.clone(), select_keeper));

    Router::new()
        .merge(public)
        .merge(wallet)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn select_keeper(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, error::AppError> {
    let selector = request
        .headers()
        .get(COIN_TYPE_HEADER)
        .map(|value| value.to_str().unwrap_or("<non-ascii>"));
    let keeper = state.gateway.resolve(selector)?;
    tracing::debug!(coin = %keeper.coin(), path = %request.uri().path(), "routed");
    request.extensions_mut().insert(SelectedKeeper(keeper));
    Ok(next.run(request).await)
}

async fn route_not_found() -> error::AppError {
    error::AppError::NotFound("route not found".to_string())
}
