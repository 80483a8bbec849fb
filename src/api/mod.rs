// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        ActionResponse, AssetRow, AssetViewResponse, BalanceView, BatchDecryptResponse,
        DecryptFailure, DecryptResponse, StatusResponse,
    },
    state::AppState,
};

pub mod assets;
pub mod health;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/status", get(health::status))
        .route("/assets", get(assets::list_assets))
        .route("/assets/mint", post(assets::mint))
        .route("/assets/decrypt", post(assets::decrypt_all))
        .route("/assets/{token_id}/claim", post(assets::claim))
        .route("/assets/{token_id}/decrypt", post(assets::decrypt_asset))
        .route("/balance/decrypt", post(assets::decrypt_balance))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::status,
        assets::list_assets,
        assets::mint,
        assets::claim,
        assets::decrypt_asset,
        assets::decrypt_balance,
        assets::decrypt_all
    ),
    components(
        schemas(
            health::HealthResponse,
            health::HealthChecks,
            StatusResponse,
            AssetRow,
            BalanceView,
            AssetViewResponse,
            ActionResponse,
            DecryptResponse,
            DecryptFailure,
            BatchDecryptResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and session status"),
        (name = "Assets", description = "Mint, claim and on-chain views"),
        (name = "Decryption", description = "User decryption of encrypted handles")
    )
)]
struct ApiDoc;
