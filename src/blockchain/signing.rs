// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet boundary.
//!
//! The rest of the crate only sees the [`WalletSigner`] capability: report
//! the connected account and chain, sign EIP-712 typed data, and hand out a
//! transaction signer. [`LocalWallet`] implements it over a secp256k1 key
//! loaded from PEM or hex.

use std::future::Future;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Signature},
    signers::{local::PrivateKeySigner, Signer},
    sol_types::{Eip712Domain, SolStruct},
};
use k256::SecretKey;

/// Errors raised by the wallet boundary.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Signature request rejected: {0}")]
    Rejected(String),
}

/// Signing capability of the connected wallet.
pub trait WalletSigner: Send + Sync {
    /// Connected account.
    fn address(&self) -> Address;

    /// Chain the wallet is currently connected to.
    fn chain_id(&self) -> u64;

    /// Sign an EIP-712 typed message under `domain`.
    fn sign_typed_data<T: SolStruct + Send + Sync>(
        &self,
        message: &T,
        domain: &Eip712Domain,
    ) -> impl Future<Output = Result<Signature, WalletError>> + Send;

    /// Transaction signer used to submit contract writes.
    fn transaction_wallet(&self) -> EthereumWallet;
}

/// Wallet backed by an in-memory secp256k1 key.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        let signer = signer.with_chain_id(Some(chain_id));
        Self { signer, chain_id }
    }

    /// Create a wallet from a hex private key (with or without `0x`).
    pub fn from_hex(private_key_hex: &str, chain_id: u64) -> Result<Self, WalletError> {
        let key_bytes = alloy::hex::decode(private_key_hex.trim())
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;

        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::new(signer, chain_id))
    }

    /// Create a wallet from a PEM-encoded key (SEC1 or PKCS#8).
    pub fn from_pem(pem_bytes: &[u8], chain_id: u64) -> Result<Self, WalletError> {
        let hex_key = pem_to_hex(pem_bytes)?;
        Self::from_hex(&hex_key, chain_id)
    }
}

impl WalletSigner for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn sign_typed_data<T: SolStruct + Send + Sync>(
        &self,
        message: &T,
        domain: &Eip712Domain,
    ) -> Result<Signature, WalletError> {
        let hash = message.eip712_signing_hash(domain);
        self.signer
            .sign_hash(&hash)
            .await
            .map_err(|e| WalletError::Rejected(e.to_string()))
    }

    fn transaction_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

/// Parse a private key from PEM format to a hex string (no `0x`).
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, WalletError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid UTF-8: {}", e)))?;

    let pem = pem::parse(pem_str.trim())
        .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid PEM: {}", e)))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| parse_pkcs8_to_secret_key(pem.contents()))
        .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid key format: {}", e)))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

fn parse_pkcs8_to_secret_key(der: &[u8]) -> Result<SecretKey, String> {
    use k256::pkcs8::DecodePrivateKey;
    SecretKey::from_pkcs8_der(der).map_err(|e| e.to_string())
}
