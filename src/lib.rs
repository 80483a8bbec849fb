// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TokenSpectrum - Confidential NFT and reward service
//!
//! Drives the TokenSpectrum NFT (mint, claim) on Sepolia and reads back the
//! encrypted values it produces through the user-decryption protocol.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - Sepolia contracts, transactions and the wallet boundary
//! - `decryption` - Authorization grants and the relayer client
//! - `lifecycle` - Mint/claim sequencing and decryption actions
//! - `view` - Per-owner asset view and its cache

pub mod api;
pub mod blockchain;
pub mod config;
pub mod decryption;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod state;
pub mod view;

#[cfg(test)]
mod testing;
