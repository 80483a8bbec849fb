// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read model of an owner's assets.
//!
//! An [`AssetView`] is rebuilt from chain state in one piece and replaced
//! wholesale; decrypted values are applied to a copy. Rows are keyed by
//! token id, so there is never more than one row per token.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use lru::LruCache;

use crate::blockchain::{ContractAddresses, EncryptedHandle, HandleContractPair, TokenId};

/// Lifecycle of a token as seen by its owner. Transitions are one-way:
/// `Unminted -> Minted -> Claimed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetState {
    Unminted,
    Minted,
    Claimed,
}

impl AssetState {
    pub fn can_transition_to(self, next: AssetState) -> bool {
        matches!(
            (self, next),
            (AssetState::Unminted, AssetState::Minted) | (AssetState::Minted, AssetState::Claimed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetState::Unminted => "unminted",
            AssetState::Minted => "minted",
            AssetState::Claimed => "claimed",
        }
    }
}

/// One owned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub token_id: TokenId,
    pub claimed: bool,
    pub encrypted_test: EncryptedHandle,
    /// Only meaningful for `encrypted_test`; cleared on every refresh.
    pub decrypted_test: Option<U256>,
}

impl AssetRecord {
    pub fn new(token_id: TokenId, claimed: bool, encrypted_test: EncryptedHandle) -> Self {
        Self {
            token_id,
            claimed,
            encrypted_test,
            decrypted_test: None,
        }
    }

    pub fn state(&self) -> AssetState {
        if self.claimed {
            AssetState::Claimed
        } else {
            AssetState::Minted
        }
    }

    pub fn claim_enabled(&self) -> bool {
        !self.claimed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidentialBalance {
    pub handle: EncryptedHandle,
    pub decrypted: Option<U256>,
}

impl ConfidentialBalance {
    /// The zero handle means the owner never received tokens.
    pub fn is_uninitialized(&self) -> bool {
        self.handle.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetView {
    owner: Address,
    contracts: ContractAddresses,
    records: BTreeMap<TokenId, AssetRecord>,
    balance: ConfidentialBalance,
    loaded_at: DateTime<Utc>,
}

impl AssetView {
    pub fn new(
        owner: Address,
        contracts: ContractAddresses,
        records: impl IntoIterator<Item = AssetRecord>,
        balance_handle: EncryptedHandle,
    ) -> Self {
        Self {
            owner,
            contracts,
            records: records
                .into_iter()
                .map(|record| (record.token_id, record))
                .collect(),
            balance: ConfidentialBalance {
                handle: balance_handle,
                decrypted: None,
            },
            loaded_at: Utc::now(),
        }
    }

    /// Stamp the view with the instant its chain reads started.
    pub fn with_loaded_at(mut self, loaded_at: DateTime<Utc>) -> Self {
        self.loaded_at = loaded_at;
        self
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Rows in ascending token id order.
    pub fn records(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.values()
    }

    pub fn record(&self, token_id: TokenId) -> Option<&AssetRecord> {
        self.records.get(&token_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn balance(&self) -> &ConfidentialBalance {
        &self.balance
    }

    pub fn test_pair(&self, record: &AssetRecord) -> HandleContractPair {
        HandleContractPair::new(record.encrypted_test, self.contracts.nft)
    }

    pub fn balance_pair(&self) -> HandleContractPair {
        HandleContractPair::new(self.balance.handle, self.contracts.token)
    }

    /// Every non-zero handle in the view, scoped to its contract.
    pub fn decryptable_pairs(&self) -> Vec<HandleContractPair> {
        let mut pairs: Vec<HandleContractPair> = self
            .records()
            .filter(|record| !record.encrypted_test.is_zero())
            .map(|record| self.test_pair(record))
            .collect();
        if !self.balance.is_uninitialized() {
            pairs.push(self.balance_pair());
        }
        pairs
    }

    /// Copy of this view with cleartexts applied. A value lands only on the
    /// row whose handle and contract both match.
    pub fn with_cleartexts(&self, cleartexts: &BTreeMap<HandleContractPair, U256>) -> AssetView {
        let mut next = self.clone();
        let nft = next.contracts.nft;
        for record in next.records.values_mut() {
            let pair = HandleContractPair::new(record.encrypted_test, nft);
            if let Some(value) = cleartexts.get(&pair) {
                record.decrypted_test = Some(*value);
            }
        }
        if let Some(value) = cleartexts.get(&next.balance_pair()) {
            next.balance.decrypted = Some(*value);
        }
        next
    }

    /// Copy of this view with an uninitialized balance shown as zero.
    pub fn with_uninitialized_balance(&self) -> AssetView {
        let mut next = self.clone();
        if next.balance.is_uninitialized() {
            next.balance.decrypted = Some(U256::ZERO);
        }
        next
    }

    /// Tokens whose state moved backwards compared with `previous`.
    pub fn state_regressions(&self, previous: &AssetView) -> Vec<TokenId> {
        previous
            .records()
            .filter(|old| {
                self.record(old.token_id).is_some_and(|new| {
                    new.state() != old.state() && !old.state().can_transition_to(new.state())
                })
            })
            .map(|old| old.token_id)
            .collect()
    }
}

/// Cached entry: view + insertion timestamp. Views loaded before `floor`
/// are stale for this owner.
struct CacheEntry {
    view: Option<AssetView>,
    floor: DateTime<Utc>,
    inserted_at: Instant,
}

/// In-process LRU cache of the latest view per owner. An entry only ever
/// moves forward in time: a view loaded before the cached one, or before
/// the last invalidation, is discarded.
pub struct ViewCache {
    cache: Mutex<LruCache<Address, CacheEntry>>,
    ttl: Duration,
}

impl ViewCache {
    /// - `capacity`: Max number of owners to cache.
    /// - `ttl`: Time-to-live for each cache entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Returns `None` if not cached or expired.
    pub fn get(&self, owner: Address) -> Option<AssetView> {
        let mut cache = self.cache.lock().ok()?;
        let entry = cache.get_mut(&owner)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            entry.view = None;
        }
        entry.view.clone()
    }

    /// Store `view` unless the owner's entry is newer. A decrypted copy
    /// carries the `loaded_at` of the view it was applied to, so it replaces
    /// that view but never one reloaded after it.
    pub fn put_if_newer(&self, view: AssetView) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        let owner = view.owner();
        let loaded_at = view.loaded_at();
        if cache.peek(&owner).is_some_and(|entry| loaded_at < entry.floor) {
            return false;
        }
        cache.put(
            owner,
            CacheEntry {
                view: Some(view),
                floor: loaded_at,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    /// Drop the owner's view and refuse any view loaded before now.
    pub fn invalidate(&self, owner: Address) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                owner,
                CacheEntry {
                    view: None,
                    floor: Utc::now(),
                    inserted_at: Instant::now(),
                },
            );
        }
    }
}
