// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Token identifier on the TokenSpectrum NFT contract.
pub type TokenId = U256;

/// Target network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Default RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Ethereum Sepolia testnet, the only network the contracts are deployed on.
pub const SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Sepolia",
    chain_id: 11_155_111,
    rpc_url: "https://eth-sepolia.public.blastapi.io",
    explorer_url: "https://sepolia.etherscan.io",
};

/// Validate a chain id reported by the wallet or the RPC endpoint.
pub fn ensure_target_chain(network: &NetworkConfig, reported: u64) -> Result<(), String> {
    if reported == network.chain_id {
        Ok(())
    } else {
        Err(format!(
            "Connected to chain {reported}, expected {} ({})",
            network.name, network.chain_id
        ))
    }
}

/// Opaque 32-byte reference to a ciphertext held by the confidential-compute
/// backend. A handle is only meaningful together with the contract that
/// emitted it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
#[schema(value_type = String, example = "0x5f1c…")]
pub struct EncryptedHandle(pub B256);

impl EncryptedHandle {
    pub const ZERO: Self = Self(B256::ZERO);

    /// The zero handle marks a value the contract never initialized.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl From<B256> for EncryptedHandle {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl FromStr for EncryptedHandle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid handle: {e}"))
    }
}

impl fmt::Display for EncryptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A handle together with the contract it is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: EncryptedHandle,
    pub contract_address: Address,
}

impl HandleContractPair {
    pub fn new(handle: EncryptedHandle, contract_address: Address) -> Self {
        Self {
            handle,
            contract_address,
        }
    }
}

/// Deployed addresses of the NFT and the confidential reward token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    /// TokenSpectrumNFT
    pub nft: Address,
    /// TestToken (confidential fungible token)
    pub token: Address,
}

impl ContractAddresses {
    /// Parse provisioned addresses. Returns `None` when either one is missing,
    /// malformed or the zero address, which means deployments have not been
    /// synced yet.
    pub fn from_raw(nft: Option<&str>, token: Option<&str>) -> Option<Self> {
        let nft = parse_contract_address(nft?)?;
        let token = parse_contract_address(token?)?;
        Some(Self { nft, token })
    }
}

fn parse_contract_address(raw: &str) -> Option<Address> {
    Address::from_str(raw.trim())
        .ok()
        .filter(|addr| !addr.is_zero())
}
