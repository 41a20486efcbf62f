mod cli;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wallet_keeper_core::config::{
    BtcConfig, EthConfig, GatewayConfig, RpcEndpoint, RpcOptions, UsdtConfig,
};
use wallet_keeper_core::{Coin, Gateway};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();
    init_tracing(args.log_dir.as_deref())?;

    let config = gateway_config(&args)?;
    let gateway = Gateway::connect(&config)
        .await
        .wrap_err("initialize wallet backends")?;
    if gateway.is_empty() {
        return Err(eyre!("no backend selected; pass --backends btc,usdt,eth"));
    }

    // Refuse to serve until every configured daemon answers.
    gateway
        .health()
        .await
        .wrap_err("backend health check failed")?;
    let coins: Vec<String> = gateway.coins().map(|c| c.to_string()).collect();
    tracing::info!(backends = %coins.join(","), "all backends healthy");

    let router = server::build_router(server::AppState { gateway });
    let listener = tokio::net::TcpListener::bind(args.http_listen_addr)
        .await
        .wrap_err_with(|| format!("bind HTTP listener on {}", args.http_listen_addr))?;

    tracing::info!("starting api gateway on {}", args.http_listen_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("run HTTP server")?;

    Ok(())
}

/// Console logging, plus an appending `wallet-keeper.log` when a log
/// directory is configured.
fn init_tracing(log_dir: Option<&Path>) -> eyre::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("create log directory {}", dir.display()))?;
            let path = dir.join("wallet-keeper.log");
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .wrap_err_with(|| format!("open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_level(true),
        )
        .with(file_layer)
        .init();
    Ok(())
}

fn gateway_config(args: &cli::Cli) -> eyre::Result<GatewayConfig> {
    let rpc = RpcOptions {
        timeout: Duration::from_secs(args.rpc_timeout_secs),
        requests_per_second: args.rpc_requests_per_second,
        ..RpcOptions::default()
    };

    let btc = args.serves(Coin::Btc).then(|| BtcConfig {
        endpoint: endpoint(&args.btc_rpc_addr, &args.btc_rpc_user, &args.btc_rpc_pass),
        log_dir: args.log_dir.clone(),
    });

    let usdt = args.serves(Coin::Usdt).then(|| UsdtConfig {
        endpoint: endpoint(&args.usdt_rpc_addr, &args.usdt_rpc_user, &args.usdt_rpc_pass),
        log_dir: args.log_dir.clone(),
        property_id: args.usdt_property_id,
        fee: args.usdt_fee,
    });

    let eth = if args.serves(Coin::Eth) {
        let required = |value: &Option<PathBuf>, flag: &str| {
            value
                .clone()
                .ok_or_else(|| eyre!("--{flag} is required when serving eth"))
        };
        Some(EthConfig {
            endpoint: RpcEndpoint::new(&args.eth_rpc_addr),
            log_dir: args.log_dir.clone(),
            wallet_dir: required(&args.eth_wallet_dir, "eth-wallet-dir")?,
            account_path: required(&args.eth_account_path, "eth-account-path")?,
            password: args
                .eth_account_password
                .clone()
                .ok_or_else(|| eyre!("--eth-account-password is required when serving eth"))?,
        })
    } else {
        None
    };

    Ok(GatewayConfig {
        rpc,
        btc,
        usdt,
        eth,
    })
}

fn endpoint(url: &str, user: &Option<String>, pass: &Option<String>) -> RpcEndpoint {
    RpcEndpoint {
        url: url.to_owned(),
        user: user.clone(),
        pass: pass.clone(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
