// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TokenSpectrum contract interfaces.
//!
//! Encrypted values (`euint8`, `euint64`) are ABI-encoded as their `bytes32`
//! handle.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::client::ChainClientError;
use super::types::{EncryptedHandle, TokenId};

sol! {
    #[sol(rpc)]
    interface ITokenSpectrumNFT {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);

        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function isClaimed(uint256 tokenId) external view returns (bool);
        function encryptedTestOf(uint256 tokenId) external view returns (bytes32);
        function mint() external returns (uint256);
        function claim(uint256 tokenId) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IConfidentialToken {
        function confidentialBalanceOf(address account) external view returns (bytes32);
    }
}

/// Read-only wrapper around the NFT contract.
pub struct NftContract<P> {
    contract: ITokenSpectrumNFT::ITokenSpectrumNFTInstance<P>,
}

impl<P: Provider + Clone> NftContract<P> {
    pub fn new(provider: &P, address: Address) -> Self {
        Self {
            contract: ITokenSpectrumNFT::new(address, provider.clone()),
        }
    }

    /// Number of tokens held by `owner`.
    pub async fn balance_of(&self, owner: Address) -> Result<u64, ChainClientError> {
        let count: U256 = self
            .contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))?;

        u64::try_from(count)
            .map_err(|_| ChainClientError::ContractError(format!("balanceOf overflow: {count}")))
    }

    pub async fn token_of_owner_by_index(
        &self,
        owner: Address,
        index: u64,
    ) -> Result<TokenId, ChainClientError> {
        self.contract
            .tokenOfOwnerByIndex(owner, U256::from(index))
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    pub async fn is_claimed(&self, token_id: TokenId) -> Result<bool, ChainClientError> {
        self.contract
            .isClaimed(token_id)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    pub async fn encrypted_test_of(
        &self,
        token_id: TokenId,
    ) -> Result<EncryptedHandle, ChainClientError> {
        let handle = self
            .contract
            .encryptedTestOf(token_id)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))?;
        Ok(EncryptedHandle(handle))
    }
}

/// Read-only wrapper around the confidential reward token.
pub struct ConfidentialTokenContract<P> {
    contract: IConfidentialToken::IConfidentialTokenInstance<P>,
}

impl<P: Provider + Clone> ConfidentialTokenContract<P> {
    pub fn new(provider: &P, address: Address) -> Self {
        Self {
            contract: IConfidentialToken::new(address, provider.clone()),
        }
    }

    pub async fn confidential_balance_of(
        &self,
        account: Address,
    ) -> Result<EncryptedHandle, ChainClientError> {
        let handle = self
            .contract
            .confidentialBalanceOf(account)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))?;
        Ok(EncryptedHandle(handle))
    }
}
