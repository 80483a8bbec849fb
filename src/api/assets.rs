// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Asset lifecycle and decryption endpoints.
//!
//! Every handler converts failures into the action's one-shot status line.
//! The owner's cached view is replaced by the view reloaded after every
//! write. Decryptions store their decrypted copy only while the view it was
//! applied to is still the newest.

use std::str::FromStr;

use alloy::primitives::Address;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::{debug, warn};

use crate::{
    blockchain::{TokenId, WalletSigner},
    error::{ApiError, SpectrumError},
    lifecycle::{Action, ActionOutcome},
    models::{
        ActionResponse, AssetViewResponse, AssetsQuery, BatchDecryptResponse, DecryptFailure,
        DecryptResponse,
    },
    state::AppState,
    view::AssetView,
};

fn parse_token_id(raw: &str) -> Result<TokenId, ApiError> {
    TokenId::from_str_radix(raw.trim(), 10)
        .map_err(|_| ApiError::bad_request(format!("Invalid token id: {raw}")))
}

fn failed(action: Action) -> impl FnOnce(SpectrumError) -> ApiError {
    move |err| {
        warn!(action = ?action, error = %err, retryable = err.is_retryable(), "action failed");
        let message = action.failure_message(&err);
        ApiError::from_action(err, message)
    }
}

/// Cache `view` unless a newer one is already stored, logging any token
/// whose state went backwards.
fn store_view(state: &AppState, view: &AssetView) {
    let previous = state.views.get(view.owner());
    if !state.views.put_if_newer(view.clone()) {
        debug!(
            owner = %view.owner(),
            loaded_at = %view.loaded_at(),
            "discarded view older than the cached one"
        );
        return;
    }
    if let Some(previous) = previous {
        let regressed = view.state_regressions(&previous);
        if !regressed.is_empty() {
            warn!(owner = %view.owner(), tokens = ?regressed, "token state reverted on chain read");
        }
    }
}

/// Cached view of the session wallet, loading it on a miss.
async fn session_view(state: &AppState) -> Result<AssetView, SpectrumError> {
    let owner = match (state.contracts, state.wallet.as_deref()) {
        (Some(_), Some(wallet)) => wallet.address(),
        _ => return state.controller().refresh_session().await,
    };
    if let Some(view) = state.views.get(owner) {
        return Ok(view);
    }
    let view = state.controller().refresh(owner).await?;
    store_view(state, &view);
    Ok(view)
}

/// The reload after a write starts after the write confirmed, so it beats
/// any view read before it. Without a reload the owner's entry is fenced off.
fn action_response(state: &AppState, action: Action, outcome: ActionOutcome) -> ActionResponse {
    match (&outcome.view, state.wallet.as_deref()) {
        (Some(view), _) => store_view(state, view),
        (None, Some(wallet)) => state.views.invalidate(wallet.address()),
        (None, None) => {}
    }
    ActionResponse::new(action.success_message(), &outcome.tx, outcome.view.as_ref())
}

/// Load an owner's tokens and confidential balance from chain.
#[utoipa::path(
    get,
    path = "/v1/assets",
    tag = "Assets",
    params(AssetsQuery),
    responses(
        (status = 200, description = "Fresh asset view", body = AssetViewResponse),
        (status = 400, description = "Invalid owner address"),
        (status = 502, description = "Failed to load on-chain data"),
        (status = 503, description = "Contracts are not configured")
    )
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<AssetsQuery>,
) -> Result<Json<AssetViewResponse>, ApiError> {
    let controller = state.controller();
    let view = match query.owner.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
        Some(raw) => {
            let owner = Address::from_str(raw)
                .map_err(|_| ApiError::bad_request(format!("Invalid owner address: {raw}")))?;
            controller.refresh(owner).await
        }
        None => controller.refresh_session().await,
    }
    .map_err(failed(Action::Refresh))?;

    store_view(&state, &view);
    Ok(Json(AssetViewResponse::from(&view)))
}

/// Mint a new NFT to the session wallet.
#[utoipa::path(
    post,
    path = "/v1/assets/mint",
    tag = "Assets",
    responses(
        (status = 200, description = "Mint confirmed", body = ActionResponse),
        (status = 409, description = "Wallet is on the wrong network"),
        (status = 412, description = "No wallet connected"),
        (status = 422, description = "Rejected by the contract"),
        (status = 503, description = "Contracts are not configured")
    )
)]
pub async fn mint(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    let action = Action::Mint;
    tracing::info!(status = %action.pending_message());

    let outcome = state.controller().mint().await.map_err(failed(action))?;
    Ok(Json(action_response(&state, action, outcome)))
}

/// Claim the TEST reward of a token.
#[utoipa::path(
    post,
    path = "/v1/assets/{token_id}/claim",
    tag = "Assets",
    params(("token_id" = String, Path, description = "Token id (decimal)")),
    responses(
        (status = 200, description = "Claim confirmed", body = ActionResponse),
        (status = 400, description = "Invalid token id"),
        (status = 422, description = "Rejected by the contract (not owner or already claimed)")
    )
)]
pub async fn claim(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = parse_token_id(&token_id)?;
    let action = Action::Claim(id);
    tracing::info!(status = %action.pending_message());

    let outcome = state.controller().claim(id).await.map_err(failed(action))?;
    Ok(Json(action_response(&state, action, outcome)))
}

/// Decrypt the hidden attribute of one owned token.
#[utoipa::path(
    post,
    path = "/v1/assets/{token_id}/decrypt",
    tag = "Decryption",
    params(("token_id" = String, Path, description = "Token id (decimal)")),
    responses(
        (status = 200, description = "Decrypted value", body = DecryptResponse),
        (status = 401, description = "Grant declined or expired"),
        (status = 403, description = "Handle not readable by the wallet")
    )
)]
pub async fn decrypt_asset(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let id = parse_token_id(&token_id)?;
    let action = Action::DecryptTest(id);
    tracing::info!(status = %action.pending_message());

    let view = session_view(&state).await.map_err(failed(action))?;
    let outcome = state
        .controller()
        .decrypt_asset(&view, id)
        .await
        .map_err(failed(action))?;

    store_view(&state, &outcome.view);
    Ok(Json(DecryptResponse {
        status: action.success_message().to_string(),
        value: outcome.value.to_string(),
        view: AssetViewResponse::from(&outcome.view),
    }))
}

/// Decrypt the confidential TEST balance of the session wallet.
#[utoipa::path(
    post,
    path = "/v1/balance/decrypt",
    tag = "Decryption",
    responses(
        (status = 200, description = "Decrypted balance", body = DecryptResponse),
        (status = 401, description = "Grant declined or expired"),
        (status = 403, description = "Handle not readable by the wallet")
    )
)]
pub async fn decrypt_balance(
    State(state): State<AppState>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let action = Action::DecryptBalance;
    tracing::info!(status = %action.pending_message());

    let view = session_view(&state).await.map_err(failed(action))?;
    let outcome = state
        .controller()
        .decrypt_balance(&view)
        .await
        .map_err(failed(action))?;

    store_view(&state, &outcome.view);
    Ok(Json(DecryptResponse {
        status: action.success_message().to_string(),
        value: outcome.value.to_string(),
        view: AssetViewResponse::from(&outcome.view),
    }))
}

/// Decrypt every attribute and the balance under a single grant.
#[utoipa::path(
    post,
    path = "/v1/assets/decrypt",
    tag = "Decryption",
    responses(
        (status = 200, description = "Per-handle results", body = BatchDecryptResponse),
        (status = 401, description = "Grant declined or expired")
    )
)]
pub async fn decrypt_all(
    State(state): State<AppState>,
) -> Result<Json<BatchDecryptResponse>, ApiError> {
    let action = Action::DecryptAll;
    tracing::info!(status = %action.pending_message());

    let view = session_view(&state).await.map_err(failed(action))?;
    let outcome = state
        .controller()
        .decrypt_all(&view)
        .await
        .map_err(failed(action))?;

    store_view(&state, &outcome.view);

    let status = match outcome.failures.first() {
        None => action.success_message().to_string(),
        Some((_, err)) => action.failure_message(err),
    };
    let failures = outcome
        .failures
        .iter()
        .map(|(pair, err)| DecryptFailure {
            handle: pair.handle.to_string(),
            contract_address: pair.contract_address.to_string(),
            error_code: err.error_code().to_string(),
            message: err.to_string(),
        })
        .collect();

    Ok(Json(BatchDecryptResponse {
        status,
        decrypted: outcome.decrypted,
        failures,
        view: AssetViewResponse::from(&outcome.view),
    }))
}
