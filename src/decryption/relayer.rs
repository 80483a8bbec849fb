// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the user-decryption relayer.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use alloy::primitives::{Address, U256};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::grant::{AuthorizationGrant, EXTRA_DATA};
use super::seal::Unsealer;
use crate::blockchain::{EncryptedHandle, HandleContractPair};

/// Testnet relayer paired with Sepolia.
pub const DEFAULT_RELAYER_URL: &str = "https://relayer.testnet.zama.cloud";

const USER_DECRYPT_PATH: &str = "/v1/user-decrypt";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validity window as sent on the wire (stringified integers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestValidity {
    pub start_timestamp: String,
    pub duration_days: String,
}

/// `POST /v1/user-decrypt` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptRequest {
    pub handle_contract_pairs: Vec<HandleContractPair>,
    pub request_validity: RequestValidity,
    pub contracts_chain_id: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    /// 65-byte signature, hex without `0x`.
    pub signature: String,
    /// Ephemeral X25519 public key, hex without `0x`.
    pub public_key: String,
    pub extra_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDecryptResponse {
    pub response: SealedResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedResponse {
    /// Service's ephemeral X25519 public key, hex.
    #[serde(default)]
    pub sealing_key: String,
    #[serde(default)]
    pub results: Vec<SealedResult>,
    #[serde(default)]
    pub errors: Vec<HandleError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedResult {
    pub handle: EncryptedHandle,
    pub nonce: String,
    pub ciphertext: String,
}

/// Per-handle refusal inside an otherwise successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleError {
    pub handle: EncryptedHandle,
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Error body for non-2xx answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayerErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecryptionError {
    #[error("Invalid decryption request: {0}")]
    InvalidRequest(String),

    #[error("Handle {} at {} is not covered by the grant", .0.handle, .0.contract_address)]
    NotCovered(HandleContractPair),

    #[error("Grant expired at {expires_at}")]
    Expired { expires_at: u64 },

    #[error("Relayer refused the grant: {0}")]
    AuthorizationDenied(String),

    #[error("Relayer refused access: {0}")]
    AccessDenied(String),

    #[error("Relayer unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Relayer response was invalid: {0}")]
    InvalidResponse(String),
}

impl DecryptionError {
    /// Map a per-handle error code from the relayer.
    pub fn from_handle_code(code: &str, message: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "access_denied" | "not_allowed_on_acl" => {
                DecryptionError::AccessDenied(message.to_string())
            }
            "expired" | "invalid_signature" => {
                DecryptionError::AuthorizationDenied(message.to_string())
            }
            other => DecryptionError::ServiceUnavailable(format!("{other}: {message}")),
        }
    }
}

/// Outcome of one decryption round. Successes and failures are reported per
/// handle so one refused handle never hides the others.
#[derive(Debug, Default)]
pub struct DecryptedBatch {
    pub cleartexts: BTreeMap<HandleContractPair, U256>,
    pub failures: BTreeMap<HandleContractPair, DecryptionError>,
}

impl DecryptedBatch {
    /// Result for a single pair; a pair the service never mentioned counts
    /// as refused.
    pub fn take(&mut self, pair: &HandleContractPair) -> Result<U256, DecryptionError> {
        if let Some(value) = self.cleartexts.remove(pair) {
            return Ok(value);
        }
        Err(self.failures.remove(pair).unwrap_or_else(|| {
            DecryptionError::AccessDenied(format!("no result for handle {}", pair.handle))
        }))
    }
}

/// Client for the decryption relayer.
#[derive(Debug, Clone)]
pub struct RelayerClient {
    base_url: String,
    host_chain_id: u64,
    http: Client,
}

impl RelayerClient {
    /// `host_chain_id` is the chain the asset contracts live on.
    pub fn new(base_url: &str, host_chain_id: u64) -> Result<Self, DecryptionError> {
        url::Url::parse(base_url)
            .map_err(|e| DecryptionError::InvalidRequest(format!("invalid relayer URL: {e}")))?;

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| {
                DecryptionError::ServiceUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            host_chain_id,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Decrypt `pairs` under `grant`. The grant is consumed: its ephemeral
    /// private key is used once to open the response and then dropped.
    pub async fn decrypt(
        &self,
        grant: AuthorizationGrant,
        pairs: &[HandleContractPair],
    ) -> Result<DecryptedBatch, DecryptionError> {
        let requested: BTreeSet<HandleContractPair> = pairs.iter().copied().collect();
        if requested.is_empty() {
            return Err(DecryptionError::InvalidRequest(
                "no handles to decrypt".to_string(),
            ));
        }
        // Sealed results are keyed by handle alone.
        let mut handles = BTreeSet::new();
        if let Some(pair) = requested.iter().find(|pair| !handles.insert(pair.handle)) {
            return Err(DecryptionError::InvalidRequest(format!(
                "handle {} is requested under more than one contract",
                pair.handle
            )));
        }
        if let Some(pair) = requested.iter().find(|pair| !grant.covers(pair)) {
            return Err(DecryptionError::NotCovered(*pair));
        }

        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        if !grant.is_valid_at(now) {
            return Err(DecryptionError::Expired {
                expires_at: grant.expires_at(),
            });
        }

        let request = self.build_request(&grant, &requested);

        info!(
            user = %grant.owner(),
            handles = requested.len(),
            contracts = grant.contract_addresses().len(),
            "submitting user-decrypt request"
        );

        let response = self.post(&request).await?;
        let batch = open_response(grant, &requested, response.response)?;

        for (pair, err) in &batch.failures {
            warn!(handle = %pair.handle, contract = %pair.contract_address, error = %err, "handle not decrypted");
        }

        Ok(batch)
    }

    fn build_request(
        &self,
        grant: &AuthorizationGrant,
        requested: &BTreeSet<HandleContractPair>,
    ) -> UserDecryptRequest {
        UserDecryptRequest {
            handle_contract_pairs: requested.iter().copied().collect(),
            request_validity: RequestValidity {
                start_timestamp: grant.start_timestamp().to_string(),
                duration_days: grant.duration_days().to_string(),
            },
            contracts_chain_id: self.host_chain_id.to_string(),
            contract_addresses: grant.contract_addresses().to_vec(),
            user_address: grant.owner(),
            signature: grant.signature_hex(),
            public_key: grant.public_key_hex(),
            extra_data: format!("0x{}", alloy::hex::encode(EXTRA_DATA)),
        }
    }

    async fn post(&self, request: &UserDecryptRequest) -> Result<UserDecryptResponse, DecryptionError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, USER_DECRYPT_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                DecryptionError::ServiceUnavailable(format!("POST {USER_DECRYPT_PATH} failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        response.json().await.map_err(|e| {
            DecryptionError::InvalidResponse(format!("POST {USER_DECRYPT_PATH} invalid JSON: {e}"))
        })
    }
}

fn map_status(status: StatusCode, body: &str) -> DecryptionError {
    let message = serde_json::from_str::<RelayerErrorBody>(body)
        .ok()
        .map(|b| match b.label {
            Some(label) if !label.is_empty() => format!("{label}: {}", b.message),
            _ => b.message,
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED => DecryptionError::AuthorizationDenied(message),
        StatusCode::FORBIDDEN => DecryptionError::AccessDenied(message),
        StatusCode::BAD_REQUEST => DecryptionError::InvalidRequest(message),
        _ => DecryptionError::ServiceUnavailable(format!(
            "POST {USER_DECRYPT_PATH} returned {status}: {message}"
        )),
    }
}

/// Open every sealed result that answers a requested pair.
fn open_response(
    grant: AuthorizationGrant,
    requested: &BTreeSet<HandleContractPair>,
    response: SealedResponse,
) -> Result<DecryptedBatch, DecryptionError> {
    let by_handle: BTreeMap<EncryptedHandle, HandleContractPair> =
        requested.iter().map(|pair| (pair.handle, *pair)).collect();

    let mut batch = DecryptedBatch::default();

    for refusal in &response.errors {
        if let Some(pair) = by_handle.get(&refusal.handle) {
            batch.failures.insert(
                *pair,
                DecryptionError::from_handle_code(&refusal.code, &refusal.message),
            );
        }
    }

    let answered: Vec<&SealedResult> = response
        .results
        .iter()
        .filter(|result| by_handle.contains_key(&result.handle))
        .collect();

    if !answered.is_empty() {
        let sealing_key = alloy::hex::decode(&response.sealing_key)
            .map_err(|e| DecryptionError::InvalidResponse(format!("sealing key: {e}")))?;
        let unsealer = grant
            .keypair
            .into_unsealer(&sealing_key)
            .map_err(|e| DecryptionError::InvalidResponse(e.to_string()))?;

        for result in answered {
            let pair = by_handle[&result.handle];
            match open_result(&unsealer, result) {
                Ok(value) => {
                    batch.failures.remove(&pair);
                    batch.cleartexts.insert(pair, value);
                }
                Err(err) => {
                    batch.failures.insert(pair, err);
                }
            }
        }
    }

    for pair in requested {
        if !batch.cleartexts.contains_key(pair) && !batch.failures.contains_key(pair) {
            batch.failures.insert(
                *pair,
                DecryptionError::AccessDenied(format!("no result for handle {}", pair.handle)),
            );
        }
    }

    Ok(batch)
}

fn open_result(unsealer: &Unsealer, result: &SealedResult) -> Result<U256, DecryptionError> {
    let nonce = alloy::hex::decode(&result.nonce)
        .map_err(|e| DecryptionError::InvalidResponse(format!("nonce: {e}")))?;
    let ciphertext = alloy::hex::decode(&result.ciphertext)
        .map_err(|e| DecryptionError::InvalidResponse(format!("ciphertext: {e}")))?;

    unsealer
        .open(&result.handle, &nonce, &ciphertext)
        .map_err(|e| DecryptionError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{LocalWallet, WalletSigner};
    use crate::decryption::grant::{DecryptionDomain, GrantBuilder};
    use crate::testing::{self, RelayerBehavior};

    fn builder() -> GrantBuilder {
        GrantBuilder::new(DecryptionDomain::SEPOLIA)
    }

    #[test]
    fn status_codes_map_to_taxonomy() {
        let body = r#"{"message":"signature mismatch","label":"invalid_signature"}"#;
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, body),
            DecryptionError::AuthorizationDenied(m) if m.contains("invalid_signature")
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "{}"),
            DecryptionError::AccessDenied(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "bad"),
            DecryptionError::InvalidRequest(m) if m == "bad"
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, ""),
            DecryptionError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn handle_codes_map_to_taxonomy() {
        assert!(matches!(
            DecryptionError::from_handle_code("ACCESS_DENIED", "nope"),
            DecryptionError::AccessDenied(_)
        ));
        assert!(matches!(
            DecryptionError::from_handle_code("expired", ""),
            DecryptionError::AuthorizationDenied(_)
        ));
        assert!(matches!(
            DecryptionError::from_handle_code("kms_timeout", ""),
            DecryptionError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(RelayerClient::new("not a url", 1).is_err());
        let client = RelayerClient::new("http://localhost:3000/", 1).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn owner_decrypts_minted_value() {
        let env = testing::TestEnv::start(RelayerBehavior::Honest).await;
        let alice = testing::alice();
        let token_id = env.ledger.mint_to(alice.address());
        let pair = env.ledger.test_pair(token_id);

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[pair])
            .await
            .unwrap();
        let mut batch = env.relayer.decrypt(grant, &[pair]).await.unwrap();

        let value = batch.take(&pair).unwrap();
        assert_eq!(Some(value), env.ledger.cleartext(&pair.handle));
        assert!((1..=100).contains(&value.to::<u64>()));
    }

    #[tokio::test]
    async fn denied_handle_does_not_block_the_rest_of_the_batch() {
        let env = testing::TestEnv::start(RelayerBehavior::Honest).await;
        let alice = testing::alice();
        let bob = testing::bob();
        let mine = env.ledger.test_pair(env.ledger.mint_to(alice.address()));
        let theirs = env.ledger.test_pair(env.ledger.mint_to(bob.address()));

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[mine, theirs])
            .await
            .unwrap();
        let batch = env.relayer.decrypt(grant, &[mine, theirs]).await.unwrap();

        assert!(batch.cleartexts.contains_key(&mine));
        assert!(matches!(
            batch.failures.get(&theirs),
            Some(DecryptionError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn same_handle_under_two_contracts_is_refused_before_sending() {
        let env = testing::TestEnv::start(RelayerBehavior::Honest).await;
        let alice = testing::alice();
        let mine = env.ledger.test_pair(env.ledger.mint_to(alice.address()));
        let twin = HandleContractPair::new(mine.handle, env.contracts.token);

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft, env.contracts.token], &[mine, twin])
            .await
            .unwrap();
        let result = env.relayer.decrypt(grant, &[mine, twin]).await;

        assert!(matches!(
            result,
            Err(DecryptionError::InvalidRequest(m)) if m.contains("more than one contract")
        ));
        assert_eq!(env.relayer_hits(), 0);
    }

    #[tokio::test]
    async fn fully_denied_request_is_access_denied() {
        let env = testing::TestEnv::start(RelayerBehavior::Honest).await;
        let theirs = env.ledger.test_pair(env.ledger.mint_to(testing::bob().address()));

        let grant = builder()
            .build_grant(&testing::alice(), &[env.contracts.nft], &[theirs])
            .await
            .unwrap();
        let result = env.relayer.decrypt(grant, &[theirs]).await;
        assert!(matches!(result, Err(DecryptionError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn grant_cannot_be_replayed_for_another_handle() {
        let env = testing::TestEnv::start(RelayerBehavior::Honest).await;
        let alice = testing::alice();
        let first = env.ledger.test_pair(env.ledger.mint_to(alice.address()));
        let second = env.ledger.test_pair(env.ledger.mint_to(alice.address()));

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[first])
            .await
            .unwrap();
        let result = env.relayer.decrypt(grant, &[second]).await;
        assert_eq!(result.unwrap_err(), DecryptionError::NotCovered(second));

        let other_contract = HandleContractPair::new(first.handle, env.contracts.token);
        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[first])
            .await
            .unwrap();
        let result = env.relayer.decrypt(grant, &[other_contract]).await;
        assert!(matches!(result, Err(DecryptionError::NotCovered(_))));
    }

    #[tokio::test]
    async fn swapped_ciphertexts_fail_authentication() {
        let env = testing::TestEnv::start(RelayerBehavior::SwapCiphertexts).await;
        let alice = testing::alice();
        let first = env.ledger.test_pair(env.ledger.mint_to(alice.address()));
        let second = env.ledger.test_pair(env.ledger.mint_to(alice.address()));

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[first, second])
            .await
            .unwrap();
        let batch = env.relayer.decrypt(grant, &[first, second]).await.unwrap();

        assert!(batch.cleartexts.is_empty());
        assert_eq!(batch.failures.len(), 2);
    }

    #[tokio::test]
    async fn expired_grant_is_refused_before_sending() {
        let env = testing::TestEnv::start(RelayerBehavior::Honest).await;
        let alice = testing::alice();
        let pair = env.ledger.test_pair(env.ledger.mint_to(alice.address()));

        let eleven_days_ago =
            u64::try_from(chrono::Utc::now().timestamp()).unwrap() - 11 * 86_400;
        let grant = builder()
            .build_grant_at(&alice, &[env.contracts.nft], &[pair], eleven_days_ago)
            .await
            .unwrap();

        let result = env.relayer.decrypt(grant, &[pair]).await;
        assert!(matches!(result, Err(DecryptionError::Expired { .. })));
        assert_eq!(env.relayer_hits(), 0);
    }

    #[tokio::test]
    async fn service_side_expiry_is_authorization_denied() {
        // Relayer clock runs eleven days ahead of ours.
        let env = testing::TestEnv::start(RelayerBehavior::ClockAhead(11 * 86_400)).await;
        let alice = testing::alice();
        let pair = env.ledger.test_pair(env.ledger.mint_to(alice.address()));

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[pair])
            .await
            .unwrap();
        let result = env.relayer.decrypt(grant, &[pair]).await;
        assert!(matches!(result, Err(DecryptionError::AuthorizationDenied(m)) if m.contains("expired")));
    }

    #[tokio::test]
    async fn signature_from_another_wallet_is_refused() {
        let env = testing::TestEnv::start(RelayerBehavior::ForgeUserAddress(
            testing::bob().address(),
        ))
        .await;
        let alice = testing::alice();
        let pair = env.ledger.test_pair(env.ledger.mint_to(alice.address()));

        let grant = builder()
            .build_grant(&alice, &[env.contracts.nft], &[pair])
            .await
            .unwrap();
        let result = env.relayer.decrypt(grant, &[pair]).await;
        assert!(matches!(result, Err(DecryptionError::AuthorizationDenied(_))));
    }

    #[tokio::test]
    async fn unreachable_relayer_is_service_unavailable() {
        let relayer = RelayerClient::new(&testing::unused_local_url().await, 11_155_111).unwrap();
        let alice: LocalWallet = testing::alice();
        let pair = HandleContractPair::new(
            EncryptedHandle(alloy::primitives::B256::repeat_byte(7)),
            Address::repeat_byte(1),
        );
        let grant = builder()
            .build_grant(&alice, &[pair.contract_address], &[pair])
            .await
            .unwrap();

        let result = relayer.decrypt(grant, &[pair]).await;
        assert!(matches!(result, Err(DecryptionError::ServiceUnavailable(_))));
    }
}
