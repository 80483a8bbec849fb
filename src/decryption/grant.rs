// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization grants for user decryption.
//!
//! A grant binds a fresh ephemeral public key, a contract allowlist and a
//! validity window under an EIP-712 signature from the owner's wallet. The
//! relayer re-verifies that signature before releasing any cleartext.
//!
//! WARNING: the EIP-712 domain and `UserDecryptRequestVerification` layout
//! are defined by the decryption service. Any change here breaks signature
//! verification on the service side.

use std::{borrow::Cow, collections::BTreeSet, time::Duration};

use alloy::{
    primitives::{address, Address, Bytes, Signature, U256},
    sol,
    sol_types::Eip712Domain,
};

use super::seal::{EphemeralKeypair, SealError};
use crate::blockchain::{HandleContractPair, WalletError, WalletSigner};

sol! {
    #[derive(Debug, PartialEq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes extraData;
    }
}

/// Default validity of a grant.
pub const DEFAULT_DURATION_DAYS: u64 = 10;

/// `extraData` sent with every request (no extensions).
pub const EXTRA_DATA: [u8; 1] = [0x00];

const SECONDS_PER_DAY: u64 = 86_400;

/// How long the wallet may take to answer a signature prompt.
pub const DEFAULT_SIGNING_TIMEOUT_SECS: u64 = 120;

/// EIP-712 domain published by the decryption service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionDomain {
    /// Chain id of the gateway chain that hosts the decryption verifier.
    pub gateway_chain_id: u64,
    /// Address of the decryption verifying contract.
    pub verifying_contract: Address,
}

impl DecryptionDomain {
    /// Testnet deployment paired with Sepolia.
    pub const SEPOLIA: DecryptionDomain = DecryptionDomain {
        gateway_chain_id: 55_815,
        verifying_contract: address!("b6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1"),
    };

    pub fn eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed("Decryption")),
            Some(Cow::Borrowed("1")),
            Some(U256::from(self.gateway_chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("Invalid grant request: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    KeyGeneration(#[from] SealError),

    #[error("Wallet rejected the signature request: {0}")]
    SigningRejected(String),

    #[error("Wallet did not answer the signature request in time")]
    SigningTimedOut,
}

impl From<WalletError> for GrantError {
    fn from(err: WalletError) -> Self {
        GrantError::SigningRejected(err.to_string())
    }
}

/// Signed capability to decrypt a fixed set of handles.
///
/// Built fresh for every request and consumed by
/// [`RelayerClient::decrypt`](super::relayer::RelayerClient::decrypt).
#[derive(Debug)]
pub struct AuthorizationGrant {
    pub(crate) keypair: EphemeralKeypair,
    owner: Address,
    contract_addresses: Vec<Address>,
    pairs: BTreeSet<HandleContractPair>,
    start_timestamp: u64,
    duration_days: u64,
    signature: Signature,
}

impl AuthorizationGrant {
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn contract_addresses(&self) -> &[Address] {
        &self.contract_addresses
    }

    pub fn pairs(&self) -> &BTreeSet<HandleContractPair> {
        &self.pairs
    }

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// First unix second at which the grant is no longer honored.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    /// Signature as the relayer expects it: 65 bytes hex, no `0x`.
    pub fn signature_hex(&self) -> String {
        alloy::hex::encode(self.signature.as_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        alloy::hex::encode(self.keypair.public_key())
    }

    /// The typed message this grant's signature covers.
    pub fn message(&self) -> UserDecryptRequestVerification {
        request_message(
            self.keypair.public_key(),
            &self.contract_addresses,
            self.start_timestamp,
            self.duration_days,
        )
    }

    /// Whether `pair` was authorized by this grant.
    pub fn covers(&self, pair: &HandleContractPair) -> bool {
        self.pairs.contains(pair) && self.contract_addresses.contains(&pair.contract_address)
    }
}

/// Build the EIP-712 message for a request.
pub fn request_message(
    public_key: &[u8],
    contract_addresses: &[Address],
    start_timestamp: u64,
    duration_days: u64,
) -> UserDecryptRequestVerification {
    UserDecryptRequestVerification {
        publicKey: Bytes::copy_from_slice(public_key),
        contractAddresses: contract_addresses.to_vec(),
        startTimestamp: U256::from(start_timestamp),
        durationDays: U256::from(duration_days),
        extraData: Bytes::copy_from_slice(&EXTRA_DATA),
    }
}

/// Builds and signs authorization grants.
#[derive(Debug, Clone)]
pub struct GrantBuilder {
    domain: DecryptionDomain,
    duration_days: u64,
    signing_timeout: Duration,
}

impl GrantBuilder {
    pub fn new(domain: DecryptionDomain) -> Self {
        Self {
            domain,
            duration_days: DEFAULT_DURATION_DAYS,
            signing_timeout: Duration::from_secs(DEFAULT_SIGNING_TIMEOUT_SECS),
        }
    }

    pub fn with_duration_days(mut self, days: u64) -> Self {
        self.duration_days = days;
        self
    }

    pub fn with_signing_timeout(mut self, timeout: Duration) -> Self {
        self.signing_timeout = timeout;
        self
    }

    pub fn domain(&self) -> &DecryptionDomain {
        &self.domain
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    /// Build a grant valid from now.
    pub async fn build_grant<W: WalletSigner>(
        &self,
        owner: &W,
        contract_addresses: &[Address],
        pairs: &[HandleContractPair],
    ) -> Result<AuthorizationGrant, GrantError> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        self.build_grant_at(owner, contract_addresses, pairs, now).await
    }

    /// Build a grant whose validity window starts at `start_timestamp`.
    pub async fn build_grant_at<W: WalletSigner>(
        &self,
        owner: &W,
        contract_addresses: &[Address],
        pairs: &[HandleContractPair],
        start_timestamp: u64,
    ) -> Result<AuthorizationGrant, GrantError> {
        if self.duration_days == 0 {
            return Err(GrantError::InvalidInput(
                "grant duration must be at least one day".to_string(),
            ));
        }
        let contract_addresses = dedup_addresses(contract_addresses);
        let pairs: BTreeSet<HandleContractPair> = pairs.iter().copied().collect();
        validate_request(&contract_addresses, &pairs)?;

        let keypair = EphemeralKeypair::generate()?;
        let message = request_message(
            keypair.public_key(),
            &contract_addresses,
            start_timestamp,
            self.duration_days,
        );

        let signature = tokio::time::timeout(
            self.signing_timeout,
            owner.sign_typed_data(&message, &self.domain.eip712()),
        )
        .await
        .map_err(|_| GrantError::SigningTimedOut)??;

        tracing::debug!(
            owner = %owner.address(),
            contracts = contract_addresses.len(),
            handles = pairs.len(),
            start_timestamp,
            duration_days = self.duration_days,
            "built user-decrypt grant"
        );

        Ok(AuthorizationGrant {
            keypair,
            owner: owner.address(),
            contract_addresses,
            pairs,
            start_timestamp,
            duration_days: self.duration_days,
            signature,
        })
    }
}

/// Allowlist order is part of the signed message; keep first occurrence order.
fn dedup_addresses(addresses: &[Address]) -> Vec<Address> {
    let mut seen = BTreeSet::new();
    addresses
        .iter()
        .copied()
        .filter(|addr| seen.insert(*addr))
        .collect()
}

fn validate_request(
    contract_addresses: &[Address],
    pairs: &BTreeSet<HandleContractPair>,
) -> Result<(), GrantError> {
    if contract_addresses.is_empty() {
        return Err(GrantError::InvalidInput(
            "at least one contract address is required".to_string(),
        ));
    }
    if pairs.is_empty() {
        return Err(GrantError::InvalidInput(
            "at least one handle is required".to_string(),
        ));
    }
    for pair in pairs {
        if pair.handle.is_zero() {
            return Err(GrantError::InvalidInput(
                "the zero handle cannot be decrypted".to_string(),
            ));
        }
        if !contract_addresses.contains(&pair.contract_address) {
            return Err(GrantError::InvalidInput(format!(
                "contract {} of handle {} is not in the allowlist",
                pair.contract_address, pair.handle
            )));
        }
    }
    Ok(())
}
