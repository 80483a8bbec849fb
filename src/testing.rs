// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles: an in-memory confidential ledger behind [`AssetChain`] and a
//! relayer served over HTTP on an ephemeral local port.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{address, keccak256, Address, Signature, B256, U256};
use alloy::sol_types::SolStruct;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use ring::rand::{SecureRandom, SystemRandom};

use crate::blockchain::{
    AssetChain, ChainClientError, ContractAddresses, EncryptedHandle, HandleContractPair,
    LocalWallet, TokenId, TxOutcome, WalletSigner, SEPOLIA,
};
use crate::decryption::grant::request_message;
use crate::decryption::relayer::{
    HandleError, RelayerErrorBody, SealedResponse, SealedResult, UserDecryptRequest,
    UserDecryptResponse,
};
use crate::decryption::seal::seal;
use crate::decryption::{DecryptionDomain, GrantBuilder, RelayerClient};

const ALICE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const BOB_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const CONTRACTS: ContractAddresses = ContractAddresses {
    nft: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
    token: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
};

pub fn alice() -> LocalWallet {
    wallet_on_chain(SEPOLIA.chain_id)
}

pub fn bob() -> LocalWallet {
    LocalWallet::from_hex(BOB_KEY, SEPOLIA.chain_id).unwrap()
}

/// Alice's key reporting another chain id.
pub fn wallet_on_chain(chain_id: u64) -> LocalWallet {
    LocalWallet::from_hex(ALICE_KEY, chain_id).unwrap()
}

/// Base URL of a local port nothing listens on.
pub async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

struct Ciphertext {
    contract: Address,
    value: U256,
    readers: BTreeSet<Address>,
}

#[derive(Default)]
struct LedgerState {
    next_token_id: u64,
    owners: BTreeMap<TokenId, Address>,
    claimed: BTreeSet<TokenId>,
    test_handles: BTreeMap<TokenId, EncryptedHandle>,
    balances: HashMap<Address, EncryptedHandle>,
    ciphertexts: HashMap<EncryptedHandle, Ciphertext>,
    handle_counter: u64,
    tx_counter: u64,
    reads_failing: bool,
    reported_balance: Option<u64>,
}

impl LedgerState {
    fn new_handle(&mut self, contract: Address, value: U256, reader: Address) -> EncryptedHandle {
        self.handle_counter += 1;
        let mut preimage = contract.to_vec();
        preimage.extend_from_slice(&self.handle_counter.to_be_bytes());
        let handle = EncryptedHandle(keccak256(preimage));
        self.ciphertexts.insert(
            handle,
            Ciphertext {
                contract,
                value,
                readers: BTreeSet::from([reader]),
            },
        );
        handle
    }

    fn next_tx(&mut self) -> (B256, u64) {
        self.tx_counter += 1;
        (keccak256(self.tx_counter.to_be_bytes()), self.tx_counter)
    }
}

/// Confidential ledger: NFT ownership and claim flags, hidden values and the
/// per-handle ACL the relayer checks.
pub struct Ledger {
    contracts: ContractAddresses,
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new(contracts: ContractAddresses) -> Self {
        Self {
            contracts,
            state: Mutex::new(LedgerState {
                next_token_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Mint a token with a hidden value in 1..=100.
    pub fn mint_to(&self, owner: Address) -> TokenId {
        let mut byte = [0u8; 1];
        SystemRandom::new().fill(&mut byte).unwrap();
        let value = U256::from(byte[0] % 100 + 1);

        let mut state = self.state.lock().unwrap();
        let token_id = U256::from(state.next_token_id);
        state.next_token_id += 1;
        let handle = state.new_handle(self.contracts.nft, value, owner);
        state.owners.insert(token_id, owner);
        state.test_handles.insert(token_id, handle);
        token_id
    }

    /// Transfer and grant the new owner read access to the hidden value.
    pub fn transfer(&self, from: Address, to: Address, token_id: TokenId) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.owners.get(&token_id) != Some(&from) {
            return Err("execution reverted: ERC721IncorrectOwner".to_string());
        }
        state.owners.insert(token_id, to);
        let handle = state.test_handles[&token_id];
        if let Some(ciphertext) = state.ciphertexts.get_mut(&handle) {
            ciphertext.readers.insert(to);
        }
        Ok(())
    }

    fn claim_as(&self, sender: Address, token_id: TokenId) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.owners.get(&token_id) != Some(&sender) {
            return Err("execution reverted: NotTokenOwner".to_string());
        }
        if state.claimed.contains(&token_id) {
            return Err("execution reverted: AlreadyClaimed".to_string());
        }
        let value = state.ciphertexts[&state.test_handles[&token_id]].value;
        let previous = state
            .balances
            .get(&sender)
            .map(|h| state.ciphertexts[h].value)
            .unwrap_or_default();

        let token = self.contracts.token;
        let handle = state.new_handle(token, previous + value, sender);
        state.balances.insert(sender, handle);
        state.claimed.insert(token_id);
        Ok(())
    }

    pub fn test_pair(&self, token_id: TokenId) -> HandleContractPair {
        let state = self.state.lock().unwrap();
        HandleContractPair::new(state.test_handles[&token_id], self.contracts.nft)
    }

    pub fn cleartext(&self, handle: &EncryptedHandle) -> Option<U256> {
        let state = self.state.lock().unwrap();
        state.ciphertexts.get(handle).map(|c| c.value)
    }

    pub fn revoke(&self, handle: &EncryptedHandle, reader: Address) {
        let mut state = self.state.lock().unwrap();
        if let Some(ciphertext) = state.ciphertexts.get_mut(handle) {
            ciphertext.readers.remove(&reader);
        }
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.state.lock().unwrap().reads_failing = failing;
    }

    /// Make `balanceOf` report `count` regardless of ownership.
    pub fn set_reported_balance(&self, count: Option<u64>) {
        self.state.lock().unwrap().reported_balance = count;
    }

    /// ACL check as the relayer performs it.
    fn decrypt_for(&self, user: Address, pair: &HandleContractPair) -> Option<U256> {
        let state = self.state.lock().unwrap();
        state
            .ciphertexts
            .get(&pair.handle)
            .filter(|c| c.contract == pair.contract_address && c.readers.contains(&user))
            .map(|c| c.value)
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> Result<T, String>) -> Result<T, ChainClientError> {
        let state = self.state.lock().unwrap();
        if state.reads_failing {
            return Err(ChainClientError::RpcError("connection refused".to_string()));
        }
        f(&*state).map_err(ChainClientError::ContractError)
    }

    fn check_contract(&self, expected: Address, called: Address) -> Result<(), String> {
        if expected == called {
            Ok(())
        } else {
            Err(format!("no contract code at {called}"))
        }
    }

    fn confirmed(&self, minted_token_id: Option<TokenId>) -> TxOutcome {
        let (tx_hash, block) = self.state.lock().unwrap().next_tx();
        TxOutcome {
            tx_hash,
            block_number: Some(block),
            minted_token_id,
            explorer_url: format!("{}/tx/{}", SEPOLIA.explorer_url, tx_hash),
        }
    }
}

/// [`AssetChain`] over a shared [`Ledger`].
#[derive(Clone)]
pub struct MockChain {
    ledger: Arc<Ledger>,
}

impl AssetChain for MockChain {
    async fn balance_of(&self, nft: Address, owner: Address) -> Result<u64, ChainClientError> {
        self.ledger.read(|state| {
            self.ledger.check_contract(self.ledger.contracts.nft, nft)?;
            let owned = state.owners.values().filter(|o| **o == owner).count() as u64;
            Ok(state.reported_balance.unwrap_or(owned))
        })
    }

    async fn token_of_owner_by_index(
        &self,
        nft: Address,
        owner: Address,
        index: u64,
    ) -> Result<TokenId, ChainClientError> {
        self.ledger.read(|state| {
            self.ledger.check_contract(self.ledger.contracts.nft, nft)?;
            state
                .owners
                .iter()
                .filter(|(_, o)| **o == owner)
                .nth(index as usize)
                .map(|(id, _)| *id)
                .ok_or_else(|| "ERC721OutOfBoundsIndex".to_string())
        })
    }

    async fn is_claimed(&self, nft: Address, token_id: TokenId) -> Result<bool, ChainClientError> {
        self.ledger.read(|state| {
            self.ledger.check_contract(self.ledger.contracts.nft, nft)?;
            Ok(state.claimed.contains(&token_id))
        })
    }

    async fn encrypted_test_of(
        &self,
        nft: Address,
        token_id: TokenId,
    ) -> Result<EncryptedHandle, ChainClientError> {
        self.ledger.read(|state| {
            self.ledger.check_contract(self.ledger.contracts.nft, nft)?;
            Ok(state
                .test_handles
                .get(&token_id)
                .copied()
                .unwrap_or(EncryptedHandle::ZERO))
        })
    }

    async fn confidential_balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<EncryptedHandle, ChainClientError> {
        self.ledger.read(|state| {
            self.ledger.check_contract(self.ledger.contracts.token, token)?;
            Ok(state
                .balances
                .get(&owner)
                .copied()
                .unwrap_or(EncryptedHandle::ZERO))
        })
    }

    async fn mint<W: WalletSigner>(
        &self,
        wallet: &W,
        nft: Address,
    ) -> Result<TxOutcome, ChainClientError> {
        self.ledger
            .check_contract(self.ledger.contracts.nft, nft)
            .map_err(ChainClientError::from_send_error)?;
        let token_id = self.ledger.mint_to(wallet.address());
        Ok(self.ledger.confirmed(Some(token_id)))
    }

    async fn claim<W: WalletSigner>(
        &self,
        wallet: &W,
        nft: Address,
        token_id: TokenId,
    ) -> Result<TxOutcome, ChainClientError> {
        self.ledger
            .check_contract(self.ledger.contracts.nft, nft)
            .map_err(ChainClientError::from_send_error)?;
        self.ledger
            .claim_as(wallet.address(), token_id)
            .map_err(ChainClientError::from_send_error)?;
        Ok(self.ledger.confirmed(None))
    }
}

/// How the test relayer deviates from an honest one.
#[derive(Debug, Clone, Copy)]
pub enum RelayerBehavior {
    Honest,
    /// Swap the ciphertexts of the first two results.
    SwapCiphertexts,
    /// Relayer clock runs this many seconds ahead.
    ClockAhead(u64),
    /// Verify the signature against this address instead of `userAddress`.
    ForgeUserAddress(Address),
}

struct RelayerState {
    ledger: Arc<Ledger>,
    domain: DecryptionDomain,
    behavior: RelayerBehavior,
    hits: AtomicUsize,
}

fn refuse(status: StatusCode, label: &str, message: impl Into<String>) -> Response {
    let body = RelayerErrorBody {
        message: message.into(),
        label: Some(label.to_string()),
    };
    (status, Json(body)).into_response()
}

async fn user_decrypt(
    State(state): State<Arc<RelayerState>>,
    Json(request): Json<UserDecryptRequest>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let user = match state.behavior {
        RelayerBehavior::ForgeUserAddress(forged) => forged,
        _ => request.user_address,
    };

    let Ok(public_key) = alloy::hex::decode(&request.public_key) else {
        return refuse(StatusCode::BAD_REQUEST, "bad_request", "publicKey is not hex");
    };
    let Some(signature) = alloy::hex::decode(&request.signature)
        .ok()
        .and_then(|bytes| Signature::try_from(bytes.as_slice()).ok())
    else {
        return refuse(StatusCode::BAD_REQUEST, "bad_request", "malformed signature");
    };
    let (Ok(start), Ok(days)) = (
        request.request_validity.start_timestamp.parse::<u64>(),
        request.request_validity.duration_days.parse::<u64>(),
    ) else {
        return refuse(StatusCode::BAD_REQUEST, "bad_request", "malformed validity");
    };
    if request.contracts_chain_id != SEPOLIA.chain_id.to_string() {
        return refuse(StatusCode::BAD_REQUEST, "bad_request", "unsupported host chain");
    }

    let message = request_message(&public_key, &request.contract_addresses, start, days);
    let hash = message.eip712_signing_hash(&state.domain.eip712());
    if signature.recover_address_from_prehash(&hash).ok() != Some(user) {
        return refuse(StatusCode::UNAUTHORIZED, "invalid_signature", "signer mismatch");
    }

    let offset = match state.behavior {
        RelayerBehavior::ClockAhead(secs) => secs,
        _ => 0,
    };
    let now = chrono::Utc::now().timestamp() as u64 + offset;
    if now < start || now >= start + days * 86_400 {
        return refuse(StatusCode::UNAUTHORIZED, "expired", "request validity expired");
    }

    let mut values = Vec::new();
    let mut errors = Vec::new();
    for pair in &request.handle_contract_pairs {
        let allowed = request.contract_addresses.contains(&pair.contract_address);
        match state.ledger.decrypt_for(user, pair).filter(|_| allowed) {
            Some(value) => values.push((pair.handle, value)),
            None => errors.push(HandleError {
                handle: pair.handle,
                code: "access_denied".to_string(),
                message: format!("{user} is not allowed to decrypt {}", pair.handle),
            }),
        }
    }

    if values.is_empty() {
        return refuse(
            StatusCode::FORBIDDEN,
            "not_allowed_on_acl",
            "no requested handle is readable by the user",
        );
    }

    let Ok((sealing_key, sealed)) = seal(&public_key, &values) else {
        return refuse(StatusCode::INTERNAL_SERVER_ERROR, "internal", "sealing failed");
    };

    let mut results: Vec<SealedResult> = sealed
        .into_iter()
        .map(|s| SealedResult {
            handle: s.handle,
            nonce: alloy::hex::encode(s.nonce),
            ciphertext: alloy::hex::encode(s.ciphertext),
        })
        .collect();
    if matches!(state.behavior, RelayerBehavior::SwapCiphertexts) && results.len() >= 2 {
        let first = results[0].ciphertext.clone();
        results[0].ciphertext = std::mem::replace(&mut results[1].ciphertext, first);
    }

    Json(UserDecryptResponse {
        response: SealedResponse {
            sealing_key: alloy::hex::encode(sealing_key),
            results,
            errors,
        },
    })
    .into_response()
}

/// Ledger, chain, relayer and clients wired together.
pub struct TestEnv {
    pub contracts: ContractAddresses,
    pub ledger: Arc<Ledger>,
    pub chain: MockChain,
    pub grants: GrantBuilder,
    pub relayer: RelayerClient,
    relayer_state: Arc<RelayerState>,
}

impl TestEnv {
    pub async fn start(behavior: RelayerBehavior) -> Self {
        let ledger = Arc::new(Ledger::new(CONTRACTS));
        let relayer_state = Arc::new(RelayerState {
            ledger: ledger.clone(),
            domain: DecryptionDomain::SEPOLIA,
            behavior,
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/v1/user-decrypt", post(user_decrypt))
            .with_state(relayer_state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            contracts: CONTRACTS,
            chain: MockChain {
                ledger: ledger.clone(),
            },
            ledger,
            grants: GrantBuilder::new(DecryptionDomain::SEPOLIA),
            relayer: RelayerClient::new(&format!("http://{addr}"), SEPOLIA.chain_id).unwrap(),
            relayer_state,
        }
    }

    /// Requests the relayer has received.
    pub fn relayer_hits(&self) -> usize {
        self.relayer_state.hits.load(Ordering::SeqCst)
    }
}
