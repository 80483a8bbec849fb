// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::time::Duration;

use tokenspectrum_server::{
    api::router,
    blockchain::{ensure_target_chain, SpectrumClient, SEPOLIA},
    config::{AppConfig, DEFAULT_LOG_FILTER},
    decryption::{GrantBuilder, RelayerClient},
    state::AppState,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.json_logs);

    info!(?config, "configuration loaded");

    let chain = SpectrumClient::new(SEPOLIA, &config.rpc_url)?;
    match chain.get_chain_id().await {
        Ok(chain_id) => match ensure_target_chain(chain.network(), chain_id) {
            Ok(()) => info!(chain_id, "RPC endpoint is on the target network"),
            Err(reason) => warn!(%reason, "RPC endpoint is on the wrong network"),
        },
        Err(err) => warn!(error = %err, "could not query RPC chain id"),
    }

    if config.contracts.is_none() {
        warn!("contract addresses not configured; asset actions are disabled");
    }

    let wallet = config.load_wallet()?;
    match &wallet {
        Some(wallet) => info!(?wallet, "session wallet loaded"),
        None => warn!("no session wallet configured; writes and decryption are disabled"),
    }

    let grants = GrantBuilder::new(config.decryption_domain.clone())
        .with_duration_days(config.grant_duration_days)
        .with_signing_timeout(Duration::from_secs(config.signing_timeout_secs));
    let relayer = RelayerClient::new(&config.relayer_url, SEPOLIA.chain_id)?;

    let state = AppState::new(chain, config.contracts, wallet, grants, relayer);
    let app = router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "TokenSpectrum server listening (docs at /docs)");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                signal.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
