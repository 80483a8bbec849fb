// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed response channel for user decryption.
//!
//! The requester generates an ephemeral X25519 keypair per request and ships
//! only the public half. The service seals each cleartext to that key; the
//! private half is consumed by a single key agreement and cannot be reused,
//! cloned or serialized.
//!
//! Key schedule:
//!
//! ```text
//! shared  = X25519(ephemeral_private, sealing_key)
//! key     = HKDF-SHA256(salt = requester_public, ikm = shared, info = SEALING_INFO)
//! opened  = ChaCha20-Poly1305(key, nonce, aad = handle bytes)
//! ```
//!
//! Binding the handle as associated data means a ciphertext only opens for
//! the handle it was sealed for.

use alloy::primitives::U256;
use ring::{
    aead::{self, Aad, LessSafeKey, Nonce, UnboundKey},
    agreement::{self, EphemeralPrivateKey, UnparsedPublicKey, X25519},
    error::Unspecified,
    hkdf,
    rand::SystemRandom,
};

use crate::blockchain::EncryptedHandle;

/// HKDF info string for the user-decrypt response channel.
pub const SEALING_INFO: &[u8] = b"tokenspectrum/user-decrypt/v1";

/// Length of an X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("Failed to generate ephemeral keypair")]
    KeyGeneration,

    #[error("Invalid sealing key from service")]
    InvalidSealingKey,

    #[error("Sealed value for {0} failed authentication")]
    Open(EncryptedHandle),

    #[error("Cleartext for {0} is not a 256-bit integer")]
    MalformedCleartext(EncryptedHandle),
}

/// Ephemeral keypair for one decryption request.
pub struct EphemeralKeypair {
    private_key: EphemeralPrivateKey,
    public_key: Vec<u8>,
}

impl EphemeralKeypair {
    pub fn generate() -> Result<Self, SealError> {
        let rng = SystemRandom::new();
        let private_key =
            EphemeralPrivateKey::generate(&X25519, &rng).map_err(|_| SealError::KeyGeneration)?;
        let public_key = private_key
            .compute_public_key()
            .map_err(|_| SealError::KeyGeneration)?
            .as_ref()
            .to_vec();

        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Run the key agreement against the service's sealing key. Consumes the
    /// private key.
    pub fn into_unsealer(self, sealing_key: &[u8]) -> Result<Unsealer, SealError> {
        let peer = UnparsedPublicKey::new(&X25519, sealing_key);
        let requester_public = self.public_key;

        let key = agreement::agree_ephemeral(self.private_key, &peer, |shared| {
            derive_key(shared, &requester_public)
        })
        .map_err(|_| SealError::InvalidSealingKey)?
        .map_err(|_| SealError::InvalidSealingKey)?;

        Ok(Unsealer { key })
    }
}

impl std::fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public_key", &alloy::hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Opens sealed cleartexts of a single response.
pub struct Unsealer {
    key: LessSafeKey,
}

impl Unsealer {
    pub fn open(
        &self,
        handle: &EncryptedHandle,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<U256, SealError> {
        let nonce =
            Nonce::try_assume_unique_for_key(nonce).map_err(|_| SealError::Open(*handle))?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(handle.as_bytes()), &mut in_out)
            .map_err(|_| SealError::Open(*handle))?;

        U256::try_from_be_slice(plaintext).ok_or(SealError::MalformedCleartext(*handle))
    }
}

fn derive_key(shared: &[u8], requester_public: &[u8]) -> Result<LessSafeKey, Unspecified> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, requester_public).extract(shared);
    let okm = prk.expand(&[SEALING_INFO], &aead::CHACHA20_POLY1305)?;
    Ok(LessSafeKey::new(UnboundKey::from(okm)))
}

/// One sealed cleartext as produced by the service.
#[cfg(test)]
pub(crate) struct SealedValue {
    pub handle: EncryptedHandle,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Service side of the channel. Returns the sealing key and the sealed values.
#[cfg(test)]
pub(crate) fn seal(
    requester_public: &[u8],
    values: &[(EncryptedHandle, U256)],
) -> Result<(Vec<u8>, Vec<SealedValue>), Unspecified> {
    let rng = SystemRandom::new();
    let private_key = EphemeralPrivateKey::generate(&X25519, &rng)?;
    let sealing_key = private_key.compute_public_key()?.as_ref().to_vec();

    let peer = UnparsedPublicKey::new(&X25519, requester_public);
    let key = agreement::agree_ephemeral(private_key, &peer, |shared| {
        derive_key(shared, requester_public)
    })??;

    let mut sealed = Vec::with_capacity(values.len());
    for (index, (handle, value)) in values.iter().enumerate() {
        let mut nonce = [0u8; aead::NONCE_LEN];
        nonce[4..].copy_from_slice(&(index as u64).to_be_bytes());

        let mut in_out = value.to_be_bytes::<32>().to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(handle.as_bytes()),
            &mut in_out,
        )?;

        sealed.push(SealedValue {
            handle: *handle,
            nonce: nonce.to_vec(),
            ciphertext: in_out,
        });
    }

    Ok((sealing_key, sealed))
}
