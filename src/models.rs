// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Token ids and cleartext
//! values are 256-bit integers and travel as decimal strings; addresses and
//! handles as `0x`-prefixed hex.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::TxOutcome;
use crate::lifecycle::SessionStatus;
use crate::view::{AssetRecord, AssetView};

// =============================================================================
// Asset View Models
// =============================================================================

/// One owned token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AssetRow {
    /// Token id (decimal).
    pub token_id: String,
    /// `minted` or `claimed`.
    pub state: String,
    pub claimed: bool,
    /// Whether the claim action should be offered.
    pub claim_enabled: bool,
    /// Encrypted hidden attribute handle.
    pub encrypted_test: String,
    /// Decrypted hidden attribute, when fetched in this view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrypted_test: Option<String>,
}

impl From<&AssetRecord> for AssetRow {
    fn from(record: &AssetRecord) -> Self {
        Self {
            token_id: record.token_id.to_string(),
            state: record.state().as_str().to_string(),
            claimed: record.claimed,
            claim_enabled: record.claim_enabled(),
            encrypted_test: record.encrypted_test.to_string(),
            decrypted_test: record.decrypted_test.map(|v| v.to_string()),
        }
    }
}

/// Confidential TEST balance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BalanceView {
    pub encrypted_handle: String,
    /// True when the owner never received tokens (zero handle).
    pub uninitialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrypted: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AssetViewResponse {
    pub owner: String,
    pub nft_contract: String,
    pub token_contract: String,
    /// Rows in ascending token id order.
    pub assets: Vec<AssetRow>,
    pub balance: BalanceView,
    /// RFC 3339 time the view was read from chain.
    pub loaded_at: String,
}

impl From<&AssetView> for AssetViewResponse {
    fn from(view: &AssetView) -> Self {
        let balance = view.balance();
        Self {
            owner: view.owner().to_string(),
            nft_contract: view.contracts().nft.to_string(),
            token_contract: view.contracts().token.to_string(),
            assets: view.records().map(AssetRow::from).collect(),
            balance: BalanceView {
                encrypted_handle: balance.handle.to_string(),
                uninitialized: balance.is_uninitialized(),
                decrypted: balance.decrypted.map(|v| v.to_string()),
            },
            loaded_at: view.loaded_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AssetsQuery {
    /// Owner to load; defaults to the session wallet.
    pub owner: Option<String>,
}

// =============================================================================
// Action Models
// =============================================================================

/// Confirmed mint or claim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    /// One-shot status line.
    pub status: String,
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Token minted by the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub explorer_url: String,
    /// View reloaded after confirmation; absent if the reload failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<AssetViewResponse>,
}

impl ActionResponse {
    pub fn new(status: &str, tx: &TxOutcome, view: Option<&AssetView>) -> Self {
        Self {
            status: status.to_string(),
            tx_hash: tx.tx_hash.to_string(),
            block_number: tx.block_number,
            token_id: tx.minted_token_id.map(|id| id.to_string()),
            explorer_url: tx.explorer_url.clone(),
            view: view.map(AssetViewResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecryptResponse {
    pub status: String,
    /// Decrypted value (decimal).
    pub value: String,
    pub view: AssetViewResponse,
}

/// A handle the relayer refused in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DecryptFailure {
    pub handle: String,
    pub contract_address: String,
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchDecryptResponse {
    pub status: String,
    pub decrypted: usize,
    pub failures: Vec<DecryptFailure>,
    pub view: AssetViewResponse,
}

// =============================================================================
// Session Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StatusResponse {
    pub network: String,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub contracts_configured: bool,
    pub relayer_url: String,
    pub wrong_network: bool,
    /// Hint for the user when an action is currently impossible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<SessionStatus> for StatusResponse {
    fn from(status: SessionStatus) -> Self {
        let hint = if !status.contracts_configured {
            Some("Contracts are not configured yet.")
        } else if status.account.is_none() {
            Some("Connect a wallet first.")
        } else if status.wrong_network {
            Some("Switch to Sepolia to use this dApp.")
        } else {
            None
        };

        Self {
            network: status.network_name.to_string(),
            chain_id: status.chain_id,
            account: status.account.map(|a| a.to_string()),
            contracts_configured: status.contracts_configured,
            relayer_url: status.relayer_url,
            wrong_network: status.wrong_network,
            hint: hint.map(str::to_string),
        }
    }
}
