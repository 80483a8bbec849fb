// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for the TokenSpectrum contracts on Sepolia.
//!
//! This module provides functionality for:
//! - Reading ownership, claim flags and encrypted handles
//! - Submitting mint/claim transactions and awaiting confirmation
//! - The wallet signing boundary

pub mod client;
pub mod contracts;
pub mod signing;
pub mod transactions;
pub mod types;

pub use client::{AssetChain, ChainClientError, SpectrumClient};
pub use signing::{LocalWallet, WalletError, WalletSigner};
pub use transactions::TxOutcome;
pub use types::*;
