// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Asset lifecycle controller.
//!
//! Sequences mint/claim writes with the refresh that must follow them, and
//! runs single and batched user decryptions against the current view. One
//! controller is built per session from borrowed collaborators; it holds no
//! mutable state of its own.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::blockchain::{
    ensure_target_chain, AssetChain, ChainClientError, ContractAddresses, HandleContractPair,
    NetworkConfig, TokenId, TxOutcome, WalletSigner,
};
use crate::decryption::{GrantBuilder, RelayerClient};
use crate::error::SpectrumError;
use crate::view::{AssetRecord, AssetView};

/// Upper bound on the token count a `balanceOf` read may report. Anything
/// above it means the address is not the NFT contract or the RPC is lying.
pub const MAX_OWNED_TOKENS: u64 = 10_000;

/// User-triggered action, used for one-shot status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Refresh,
    Mint,
    Claim(TokenId),
    DecryptTest(TokenId),
    DecryptBalance,
    DecryptAll,
}

impl Action {
    pub fn pending_message(self) -> String {
        match self {
            Action::Refresh => "Loading on-chain data...".to_string(),
            Action::Mint => "Minting NFT...".to_string(),
            Action::Claim(id) => format!("Claiming TEST for tokenId {id}..."),
            Action::DecryptTest(id) => format!("Decrypting test for tokenId {id}..."),
            Action::DecryptBalance => "Decrypting TEST balance...".to_string(),
            Action::DecryptAll => "Decrypting all values...".to_string(),
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Action::Refresh => "Loaded.",
            Action::Mint => "Minted.",
            Action::Claim(_) => "Claimed.",
            Action::DecryptTest(_) | Action::DecryptBalance | Action::DecryptAll => "Decrypted.",
        }
    }

    /// Status line for a failed action. Precondition failures read the same
    /// whatever the action; contract reverts carry their reason.
    pub fn failure_message(self, err: &SpectrumError) -> String {
        match err {
            SpectrumError::Configuration(_) => return "Contracts are not configured yet.".into(),
            SpectrumError::WalletUnavailable => return "Connect a wallet first.".into(),
            SpectrumError::WrongNetwork(_) => {
                return "Switch to Sepolia to use this dApp.".into()
            }
            _ => {}
        }

        let base = match self {
            Action::Refresh => "Failed to load on-chain data.",
            Action::Mint => "Mint failed.",
            Action::Claim(_) => "Claim failed.",
            Action::DecryptTest(_) | Action::DecryptAll => {
                "Decryption failed (check ACL and contract address)."
            }
            Action::DecryptBalance => {
                "Balance decryption failed (check ACL and contract address)."
            }
        };

        match err {
            SpectrumError::ChainRejected(reason) => {
                format!("{}: {reason}", base.trim_end_matches('.'))
            }
            _ => base.to_string(),
        }
    }
}

/// Confirmed write plus the view reloaded after it.
#[derive(Debug)]
pub struct ActionOutcome {
    pub tx: TxOutcome,
    /// `None` when the reload failed; the write itself is confirmed.
    pub view: Option<AssetView>,
}

#[derive(Debug)]
pub struct DecryptOutcome {
    pub value: U256,
    pub view: AssetView,
}

/// Result of a batched decryption; refused handles are listed, the rest are
/// applied to `view`.
#[derive(Debug)]
pub struct BatchOutcome {
    pub view: AssetView,
    pub decrypted: usize,
    pub failures: Vec<(HandleContractPair, SpectrumError)>,
}

/// Snapshot of the session for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub network_name: &'static str,
    pub chain_id: u64,
    pub account: Option<Address>,
    pub contracts_configured: bool,
    pub relayer_url: String,
    pub wrong_network: bool,
}

pub struct AssetController<'a, C, W> {
    chain: &'a C,
    network: &'a NetworkConfig,
    contracts: Option<ContractAddresses>,
    wallet: Option<&'a W>,
    grants: &'a GrantBuilder,
    relayer: &'a RelayerClient,
}

impl<'a, C: AssetChain, W: WalletSigner> AssetController<'a, C, W> {
    pub fn new(
        chain: &'a C,
        network: &'a NetworkConfig,
        contracts: Option<ContractAddresses>,
        grants: &'a GrantBuilder,
        relayer: &'a RelayerClient,
    ) -> Self {
        Self {
            chain,
            network,
            contracts,
            wallet: None,
            grants,
            relayer,
        }
    }

    pub fn with_wallet(mut self, wallet: Option<&'a W>) -> Self {
        self.wallet = wallet;
        self
    }

    pub fn wrong_network(&self) -> bool {
        self.wallet
            .is_some_and(|w| ensure_target_chain(self.network, w.chain_id()).is_err())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            network_name: self.network.name,
            chain_id: self.network.chain_id,
            account: self.wallet.map(|w| w.address()),
            contracts_configured: self.contracts.is_some(),
            relayer_url: self.relayer.base_url().to_string(),
            wrong_network: self.wrong_network(),
        }
    }

    fn require_contracts(&self) -> Result<ContractAddresses, SpectrumError> {
        self.contracts.ok_or_else(|| {
            SpectrumError::Configuration("NFT or token contract address is not set".to_string())
        })
    }

    /// Contracts, then wallet, then network.
    fn ready(&self) -> Result<(ContractAddresses, &'a W), SpectrumError> {
        let contracts = self.require_contracts()?;
        let wallet = self.wallet.ok_or(SpectrumError::WalletUnavailable)?;
        ensure_target_chain(self.network, wallet.chain_id()).map_err(SpectrumError::WrongNetwork)?;
        Ok((contracts, wallet))
    }

    /// Load the owner's tokens and confidential balance. Read-only; the
    /// result replaces any earlier view and carries no decrypted values.
    /// The view is stamped with the time the reads started.
    pub async fn refresh(&self, owner: Address) -> Result<AssetView, SpectrumError> {
        let contracts = self.require_contracts()?;
        let started = Utc::now();

        let (records, balance_handle) = tokio::try_join!(
            self.read_records(contracts.nft, owner),
            self.chain.confidential_balance_of(contracts.token, owner),
        )?;

        debug!(owner = %owner, tokens = records.len(), "refreshed asset view");
        Ok(AssetView::new(owner, contracts, records, balance_handle).with_loaded_at(started))
    }

    async fn read_records(
        &self,
        nft: Address,
        owner: Address,
    ) -> Result<Vec<AssetRecord>, ChainClientError> {
        let count = self.chain.balance_of(nft, owner).await?;
        if count > MAX_OWNED_TOKENS {
            return Err(ChainClientError::ContractError(format!(
                "balanceOf({owner}) returned {count}, above the limit of {MAX_OWNED_TOKENS}"
            )));
        }

        let mut records = Vec::new();

        for index in 0..count {
            let token_id = self.chain.token_of_owner_by_index(nft, owner, index).await?;
            let (claimed, handle) = tokio::try_join!(
                self.chain.is_claimed(nft, token_id),
                self.chain.encrypted_test_of(nft, token_id),
            )?;
            records.push(AssetRecord::new(token_id, claimed, handle));
        }

        Ok(records)
    }

    /// View of the connected wallet's own assets.
    pub async fn refresh_session(&self) -> Result<AssetView, SpectrumError> {
        self.require_contracts()?;
        let wallet = self.wallet.ok_or(SpectrumError::WalletUnavailable)?;
        self.refresh(wallet.address()).await
    }

    pub async fn mint(&self) -> Result<ActionOutcome, SpectrumError> {
        let (contracts, wallet) = self.ready()?;

        let tx = self.chain.mint(wallet, contracts.nft).await?;
        info!(
            owner = %wallet.address(),
            tx_hash = %tx.tx_hash,
            token_id = ?tx.minted_token_id,
            "mint confirmed"
        );

        let view = self.reload_after_write(wallet.address()).await;
        Ok(ActionOutcome { tx, view })
    }

    /// Ownership and double-claim checks belong to the contract; its revert
    /// comes back as [`SpectrumError::ChainRejected`].
    pub async fn claim(&self, token_id: TokenId) -> Result<ActionOutcome, SpectrumError> {
        let (contracts, wallet) = self.ready()?;

        let tx = self.chain.claim(wallet, contracts.nft, token_id).await?;
        info!(
            owner = %wallet.address(),
            token_id = %token_id,
            tx_hash = %tx.tx_hash,
            "claim confirmed"
        );

        let view = self.reload_after_write(wallet.address()).await;
        Ok(ActionOutcome { tx, view })
    }

    async fn reload_after_write(&self, owner: Address) -> Option<AssetView> {
        match self.refresh(owner).await {
            Ok(view) => Some(view),
            Err(err) => {
                warn!(owner = %owner, error = %err, "reload after confirmed write failed");
                None
            }
        }
    }

    /// Decrypt the hidden attribute of one row of `view`.
    pub async fn decrypt_asset(
        &self,
        view: &AssetView,
        token_id: TokenId,
    ) -> Result<DecryptOutcome, SpectrumError> {
        let (contracts, wallet) = self.ready()?;

        let record = view.record(token_id).ok_or_else(|| {
            SpectrumError::InvalidInput(format!("token {token_id} is not in the current view"))
        })?;
        if record.encrypted_test.is_zero() {
            return Err(SpectrumError::InvalidInput(format!(
                "token {token_id} has no encrypted attribute"
            )));
        }

        let pair = view.test_pair(record);
        let value = self.decrypt_one(wallet, contracts.nft, pair).await?;

        Ok(DecryptOutcome {
            value,
            view: view.with_cleartexts(&BTreeMap::from([(pair, value)])),
        })
    }

    /// Decrypt the confidential balance of `view`. An uninitialized balance
    /// reads as zero without contacting the relayer.
    pub async fn decrypt_balance(&self, view: &AssetView) -> Result<DecryptOutcome, SpectrumError> {
        let (contracts, wallet) = self.ready()?;

        if view.balance().is_uninitialized() {
            return Ok(DecryptOutcome {
                value: U256::ZERO,
                view: view.with_uninitialized_balance(),
            });
        }

        let pair = view.balance_pair();
        let value = self.decrypt_one(wallet, contracts.token, pair).await?;

        Ok(DecryptOutcome {
            value,
            view: view.with_cleartexts(&BTreeMap::from([(pair, value)])),
        })
    }

    async fn decrypt_one(
        &self,
        wallet: &W,
        contract: Address,
        pair: HandleContractPair,
    ) -> Result<U256, SpectrumError> {
        let grant = self.grants.build_grant(wallet, &[contract], &[pair]).await?;
        let mut batch = self.relayer.decrypt(grant, &[pair]).await?;
        Ok(batch.take(&pair)?)
    }

    /// Decrypt every attribute and the balance under one grant covering both
    /// contracts. Each handle succeeds or fails on its own.
    pub async fn decrypt_all(&self, view: &AssetView) -> Result<BatchOutcome, SpectrumError> {
        let (contracts, wallet) = self.ready()?;

        let base = view.with_uninitialized_balance();
        let pairs = view.decryptable_pairs();
        if pairs.is_empty() {
            return Ok(BatchOutcome {
                view: base,
                decrypted: 0,
                failures: Vec::new(),
            });
        }

        let grant = self
            .grants
            .build_grant(wallet, &[contracts.nft, contracts.token], &pairs)
            .await?;
        let batch = self.relayer.decrypt(grant, &pairs).await?;

        let failures: Vec<(HandleContractPair, SpectrumError)> = batch
            .failures
            .into_iter()
            .map(|(pair, err)| (pair, SpectrumError::from(err)))
            .collect();

        info!(
            owner = %wallet.address(),
            decrypted = batch.cleartexts.len(),
            failed = failures.len(),
            "batch decryption finished"
        );

        Ok(BatchOutcome {
            view: base.with_cleartexts(&batch.cleartexts),
            decrypted: batch.cleartexts.len(),
            failures,
        })
    }
}
