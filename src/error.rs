// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by every asset action, and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::blockchain::ChainClientError;
use crate::decryption::{DecryptionError, GrantError};

/// Failure of a user-facing action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpectrumError {
    /// Contract addresses are missing or still the zero placeholder.
    #[error("Contracts are not configured: {0}")]
    Configuration(String),

    #[error("No wallet connected")]
    WalletUnavailable,

    #[error("Wrong network: {0}")]
    WrongNetwork(String),

    /// Grant signature declined, invalid or expired.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The caller is not on the ACL of the handle.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Contract revert, surfaced verbatim.
    #[error("{0}")]
    ChainRejected(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SpectrumError {
    /// Whether repeating the same action may succeed without other changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpectrumError::WalletUnavailable
                | SpectrumError::AuthorizationDenied(_)
                | SpectrumError::ServiceUnavailable(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SpectrumError::Configuration(_) => "configuration_error",
            SpectrumError::WalletUnavailable => "wallet_unavailable",
            SpectrumError::WrongNetwork(_) => "wrong_network",
            SpectrumError::AuthorizationDenied(_) => "authorization_denied",
            SpectrumError::AccessDenied(_) => "access_denied",
            SpectrumError::ChainRejected(_) => "chain_rejected",
            SpectrumError::ServiceUnavailable(_) => "service_unavailable",
            SpectrumError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SpectrumError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            SpectrumError::WalletUnavailable => StatusCode::PRECONDITION_FAILED,
            SpectrumError::WrongNetwork(_) => StatusCode::CONFLICT,
            SpectrumError::AuthorizationDenied(_) => StatusCode::UNAUTHORIZED,
            SpectrumError::AccessDenied(_) => StatusCode::FORBIDDEN,
            SpectrumError::ChainRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SpectrumError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
            SpectrumError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ChainClientError> for SpectrumError {
    fn from(err: ChainClientError) -> Self {
        match err {
            ChainClientError::InvalidRpcUrl(msg) => SpectrumError::Configuration(msg),
            ChainClientError::Reverted(msg) => SpectrumError::ChainRejected(msg),
            ChainClientError::RpcError(msg)
            | ChainClientError::ContractError(msg)
            | ChainClientError::TransactionFailed(msg) => SpectrumError::ServiceUnavailable(msg),
        }
    }
}

impl From<GrantError> for SpectrumError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::InvalidInput(msg) => SpectrumError::InvalidInput(msg),
            GrantError::KeyGeneration(e) => SpectrumError::ServiceUnavailable(e.to_string()),
            GrantError::SigningRejected(_) | GrantError::SigningTimedOut => {
                SpectrumError::AuthorizationDenied(err.to_string())
            }
        }
    }
}

impl From<DecryptionError> for SpectrumError {
    fn from(err: DecryptionError) -> Self {
        match err {
            DecryptionError::InvalidRequest(msg) => SpectrumError::InvalidInput(msg),
            DecryptionError::NotCovered(_) | DecryptionError::Expired { .. } => {
                SpectrumError::AuthorizationDenied(err.to_string())
            }
            DecryptionError::AuthorizationDenied(msg) => SpectrumError::AuthorizationDenied(msg),
            DecryptionError::AccessDenied(msg) => SpectrumError::AccessDenied(msg),
            DecryptionError::ServiceUnavailable(msg) => SpectrumError::ServiceUnavailable(msg),
            DecryptionError::InvalidResponse(msg) => SpectrumError::ServiceUnavailable(msg),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    /// Wrap an action failure with the status line shown to the user.
    pub fn from_action(err: SpectrumError, status_message: impl Into<String>) -> Self {
        Self::new(err.status_code(), err.error_code(), status_message)
    }
}

impl From<SpectrumError> for ApiError {
    fn from(err: SpectrumError) -> Self {
        Self::new(err.status_code(), err.error_code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code,
        });
        (self.status, body).into_response()
    }
}
