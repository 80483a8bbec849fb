// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed contract writes against the NFT contract.
//!
//! Every write is submitted through a wallet-filled provider and then awaited
//! until the node reports a receipt, so callers can refresh chain state
//! right after a write returns.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, B256},
    providers::ProviderBuilder,
    rpc::types::{Log, TransactionReceipt},
};

use super::client::ChainClientError;
use super::contracts::ITokenSpectrumNFT;
use super::types::{NetworkConfig, TokenId};

/// Provider type with a wallet filler for signing.
type SigningProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::fillers::JoinFill<
            alloy::providers::Identity,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::GasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::BlobGasFiller,
                    alloy::providers::fillers::JoinFill<
                        alloy::providers::fillers::NonceFiller,
                        alloy::providers::fillers::ChainIdFiller,
                    >,
                >,
            >,
        >,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    alloy::providers::RootProvider<alloy::network::Ethereum>,
>;

/// Confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// Transaction hash
    pub tx_hash: B256,
    /// Block number where the transaction was included
    pub block_number: Option<u64>,
    /// Token minted by this transaction, when it emitted one
    pub minted_token_id: Option<TokenId>,
    /// Explorer URL for the transaction
    pub explorer_url: String,
}

/// Transaction submitter bound to one wallet.
pub struct TxSubmitter {
    network: NetworkConfig,
    provider: SigningProvider,
}

impl TxSubmitter {
    pub fn new(network: NetworkConfig, rpc_url: url::Url, wallet: EthereumWallet) -> Self {
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(rpc_url);
        Self { network, provider }
    }

    /// Submit `mint()` and wait for confirmation.
    pub async fn mint(&self, nft: Address) -> Result<TxOutcome, ChainClientError> {
        let contract = ITokenSpectrumNFT::new(nft, self.provider.clone());
        let pending = contract
            .mint()
            .send()
            .await
            .map_err(|e| ChainClientError::from_send_error(e.to_string()))?;

        tracing::info!(tx_hash = %pending.tx_hash(), "mint submitted, awaiting receipt");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainClientError::RpcError(format!("Failed to get receipt: {}", e)))?;

        self.confirmed(receipt, nft)
    }

    /// Submit `claim(tokenId)` and wait for confirmation.
    pub async fn claim(
        &self,
        nft: Address,
        token_id: TokenId,
    ) -> Result<TxOutcome, ChainClientError> {
        let contract = ITokenSpectrumNFT::new(nft, self.provider.clone());
        let pending = contract
            .claim(token_id)
            .send()
            .await
            .map_err(|e| ChainClientError::from_send_error(e.to_string()))?;

        tracing::info!(
            tx_hash = %pending.tx_hash(),
            token_id = %token_id,
            "claim submitted, awaiting receipt"
        );

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainClientError::RpcError(format!("Failed to get receipt: {}", e)))?;

        self.confirmed(receipt, nft)
    }

    fn confirmed(
        &self,
        receipt: TransactionReceipt,
        nft: Address,
    ) -> Result<TxOutcome, ChainClientError> {
        let tx_hash = receipt.transaction_hash;
        if !receipt.status() {
            return Err(ChainClientError::Reverted(format!(
                "transaction {tx_hash} reverted"
            )));
        }

        Ok(TxOutcome {
            tx_hash,
            block_number: receipt.block_number,
            minted_token_id: minted_token_id(receipt.inner.logs(), nft),
            explorer_url: format!("{}/tx/{}", self.network.explorer_url, tx_hash),
        })
    }
}

/// Token id of the first `Transfer(0x0 → owner)` emitted by `nft`.
pub fn minted_token_id(logs: &[Log], nft: Address) -> Option<TokenId> {
    logs.iter()
        .filter(|log| log.address() == nft)
        .filter_map(|log| log.log_decode::<ITokenSpectrumNFT::Transfer>().ok())
        .map(|decoded| decoded.inner.data)
        .find(|transfer| transfer.from == Address::ZERO)
        .map(|transfer| transfer.tokenId)
}
