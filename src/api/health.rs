// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::StatusResponse;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// "ok" when both contract addresses are provisioned.
    pub contracts: String,
    /// "ok" when a session wallet key is loaded.
    pub wallet: String,
}

fn check(ok: bool, missing: &str) -> String {
    let value = if ok { "ok" } else { missing };
    value.to_string()
}

/// Health check endpoint handler.
///
/// Returns 200 when contracts and wallet are configured, 503 otherwise.
/// Does not call the RPC endpoint or the relayer.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is not configured", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let contracts_ok = state.contracts.is_some();
    let wallet_ok = state.wallet.is_some();
    let all_ok = contracts_ok && wallet_ok;

    let response = HealthResponse {
        status: check(all_ok, "degraded"),
        checks: HealthChecks {
            service: "ok".to_string(),
            contracts: check(contracts_ok, "not_configured"),
            wallet: check(wallet_ok, "missing"),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Session status: network, account, contracts, relayer.
#[utoipa::path(
    get,
    path = "/v1/status",
    tag = "Health",
    responses((status = 200, description = "Session status", body = StatusResponse))
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::from(state.controller().status()))
}
