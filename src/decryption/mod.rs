// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User decryption of encrypted handles.
//!
//! - `grant`: ephemeral keypair + EIP-712 signed authorization
//! - `seal`: the response channel opened with the ephemeral key
//! - `relayer`: HTTP client for the decryption relayer

pub mod grant;
pub mod relayer;
pub mod seal;

pub use grant::{AuthorizationGrant, DecryptionDomain, GrantBuilder, GrantError};
pub use relayer::{DecryptedBatch, DecryptionError, RelayerClient, DEFAULT_RELAYER_URL};
pub use seal::SealError;
