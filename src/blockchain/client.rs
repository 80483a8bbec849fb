// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sepolia client for the TokenSpectrum contracts.

use std::future::Future;

use alloy::{
    network::Ethereum,
    primitives::Address,
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};

use super::contracts::{ConfidentialTokenContract, NftContract};
use super::signing::WalletSigner;
use super::transactions::{TxOutcome, TxSubmitter};
use super::types::*;

/// HTTP provider type for read calls (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Chain RPC boundary for the asset contracts.
///
/// Every call names the contract it targets so the caller decides which
/// provisioned address is used. Writes take the wallet that signs them.
pub trait AssetChain: Send + Sync {
    fn balance_of(
        &self,
        nft: Address,
        owner: Address,
    ) -> impl Future<Output = Result<u64, ChainClientError>> + Send;

    fn token_of_owner_by_index(
        &self,
        nft: Address,
        owner: Address,
        index: u64,
    ) -> impl Future<Output = Result<TokenId, ChainClientError>> + Send;

    fn is_claimed(
        &self,
        nft: Address,
        token_id: TokenId,
    ) -> impl Future<Output = Result<bool, ChainClientError>> + Send;

    fn encrypted_test_of(
        &self,
        nft: Address,
        token_id: TokenId,
    ) -> impl Future<Output = Result<EncryptedHandle, ChainClientError>> + Send;

    fn confidential_balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> impl Future<Output = Result<EncryptedHandle, ChainClientError>> + Send;

    /// Submit `mint()` and wait for the receipt.
    fn mint<W: WalletSigner>(
        &self,
        wallet: &W,
        nft: Address,
    ) -> impl Future<Output = Result<TxOutcome, ChainClientError>> + Send;

    /// Submit `claim(tokenId)` and wait for the receipt.
    fn claim<W: WalletSigner>(
        &self,
        wallet: &W,
        nft: Address,
        token_id: TokenId,
    ) -> impl Future<Output = Result<TxOutcome, ChainClientError>> + Send;
}

/// JSON-RPC backed implementation of [`AssetChain`].
#[derive(Clone)]
pub struct SpectrumClient {
    network: NetworkConfig,
    rpc_url: url::Url,
    provider: HttpProvider,
}

impl SpectrumClient {
    /// Create a client for `network` talking to `rpc_url`.
    pub fn new(network: NetworkConfig, rpc_url: &str) -> Result<Self, ChainClientError> {
        let rpc_url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());

        Ok(Self {
            network,
            rpc_url,
            provider,
        })
    }

    /// Chain id reported by the RPC endpoint.
    pub async fn get_chain_id(&self) -> Result<u64, ChainClientError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainClientError::RpcError(e.to_string()))
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn submitter<W: WalletSigner>(&self, wallet: &W) -> TxSubmitter {
        TxSubmitter::new(
            self.network.clone(),
            self.rpc_url.clone(),
            wallet.transaction_wallet(),
        )
    }
}

impl AssetChain for SpectrumClient {
    async fn balance_of(&self, nft: Address, owner: Address) -> Result<u64, ChainClientError> {
        NftContract::new(&self.provider, nft).balance_of(owner).await
    }

    async fn token_of_owner_by_index(
        &self,
        nft: Address,
        owner: Address,
        index: u64,
    ) -> Result<TokenId, ChainClientError> {
        NftContract::new(&self.provider, nft)
            .token_of_owner_by_index(owner, index)
            .await
    }

    async fn is_claimed(&self, nft: Address, token_id: TokenId) -> Result<bool, ChainClientError> {
        NftContract::new(&self.provider, nft)
            .is_claimed(token_id)
            .await
    }

    async fn encrypted_test_of(
        &self,
        nft: Address,
        token_id: TokenId,
    ) -> Result<EncryptedHandle, ChainClientError> {
        NftContract::new(&self.provider, nft)
            .encrypted_test_of(token_id)
            .await
    }

    async fn confidential_balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<EncryptedHandle, ChainClientError> {
        ConfidentialTokenContract::new(&self.provider, token)
            .confidential_balance_of(owner)
            .await
    }

    async fn mint<W: WalletSigner>(
        &self,
        wallet: &W,
        nft: Address,
    ) -> Result<TxOutcome, ChainClientError> {
        self.submitter(wallet).mint(nft).await
    }

    async fn claim<W: WalletSigner>(
        &self,
        wallet: &W,
        nft: Address,
        token_id: TokenId,
    ) -> Result<TxOutcome, ChainClientError> {
        self.submitter(wallet).claim(nft, token_id).await
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    /// The contract rejected the call (revert), e.g. double claim or non-owner claim.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl ChainClientError {
    /// Classify a submission error. Node errors carry the revert reason
    /// in the message text.
    pub fn from_send_error(message: String) -> Self {
        if message.to_ascii_lowercase().contains("revert") {
            ChainClientError::Reverted(message)
        } else {
            ChainClientError::TransactionFailed(message)
        }
    }
}
