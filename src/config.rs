// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `RPC_URL` | Sepolia JSON-RPC endpoint | public Sepolia endpoint |
//! | `NFT_CONTRACT_ADDRESS` | TokenSpectrumNFT address | unset (not configured) |
//! | `TOKEN_CONTRACT_ADDRESS` | TestToken address | unset (not configured) |
//! | `RELAYER_URL` | User-decryption relayer | testnet relayer |
//! | `GATEWAY_CHAIN_ID` | EIP-712 domain chain id | `55815` |
//! | `DECRYPTION_VERIFIER_ADDRESS` | EIP-712 verifying contract | testnet verifier |
//! | `GRANT_DURATION_DAYS` | Validity of each decryption grant in days (at least 1) | `10` |
//! | `GRANT_SIGNING_TIMEOUT_SECS` | Time allowed for the wallet to sign a grant | `120` |
//! | `WALLET_PRIVATE_KEY_PEM` | Session wallet key (PEM) | unset (no wallet) |
//! | `WALLET_PRIVATE_KEY_PATH` | Path to a PEM key file | unset |
//! | `WALLET_PRIVATE_KEY` | Session wallet key (hex) | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `tokenspectrum_server=info,tower_http=debug` |

use std::str::FromStr;

use alloy::primitives::Address;

use crate::blockchain::{ContractAddresses, LocalWallet, WalletError, SEPOLIA};
use crate::decryption::grant::{DEFAULT_DURATION_DAYS, DEFAULT_SIGNING_TIMEOUT_SECS};
use crate::decryption::{DecryptionDomain, DEFAULT_RELAYER_URL};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const NFT_CONTRACT_ENV: &str = "NFT_CONTRACT_ADDRESS";
pub const TOKEN_CONTRACT_ENV: &str = "TOKEN_CONTRACT_ADDRESS";
pub const RELAYER_URL_ENV: &str = "RELAYER_URL";
pub const GATEWAY_CHAIN_ID_ENV: &str = "GATEWAY_CHAIN_ID";
pub const VERIFIER_ADDRESS_ENV: &str = "DECRYPTION_VERIFIER_ADDRESS";
pub const GRANT_DURATION_ENV: &str = "GRANT_DURATION_DAYS";
pub const SIGNING_TIMEOUT_ENV: &str = "GRANT_SIGNING_TIMEOUT_SECS";
pub const WALLET_KEY_PEM_ENV: &str = "WALLET_PRIVATE_KEY_PEM";
pub const WALLET_KEY_PATH_ENV: &str = "WALLET_PRIVATE_KEY_PATH";
pub const WALLET_KEY_HEX_ENV: &str = "WALLET_PRIVATE_KEY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_LOG_FILTER: &str = "tokenspectrum_server=info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Failed to read {path}: {reason}")]
    KeyFile { path: String, reason: String },

    #[error("Invalid wallet key: {0}")]
    Wallet(#[from] WalletError),
}

/// Where the session wallet key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletKeySource {
    Pem(String),
    PemFile(String),
    Hex(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rpc_url: String,
    /// `None` until both deployments are provisioned.
    pub contracts: Option<ContractAddresses>,
    pub relayer_url: String,
    pub decryption_domain: DecryptionDomain,
    pub grant_duration_days: u64,
    pub signing_timeout_secs: u64,
    pub wallet_key: Option<WalletKeySource>,
    pub json_logs: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("rpc_url", &self.rpc_url)
            .field("contracts", &self.contracts)
            .field("relayer_url", &self.relayer_url)
            .field("decryption_domain", &self.decryption_domain)
            .field("grant_duration_days", &self.grant_duration_days)
            .field("signing_timeout_secs", &self.signing_timeout_secs)
            .field("wallet_key", &self.wallet_key.as_ref().map(|_| "<redacted>"))
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_optional)
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let nft = get(NFT_CONTRACT_ENV);
        let token = get(TOKEN_CONTRACT_ENV);
        let contracts = ContractAddresses::from_raw(nft.as_deref(), token.as_deref());
        if contracts.is_none() && (nft.is_some() || token.is_some()) {
            tracing::warn!(
                nft = nft.as_deref().unwrap_or_default(),
                token = token.as_deref().unwrap_or_default(),
                "contract addresses missing or invalid, treating contracts as not configured"
            );
        }

        let verifying_contract = match get(VERIFIER_ADDRESS_ENV) {
            Some(raw) => Address::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                name: VERIFIER_ADDRESS_ENV,
                reason: e.to_string(),
            })?,
            None => DecryptionDomain::SEPOLIA.verifying_contract,
        };

        let wallet_key = get(WALLET_KEY_PEM_ENV)
            .map(|pem| WalletKeySource::Pem(pem.replace("\\n", "\n")))
            .or_else(|| get(WALLET_KEY_PATH_ENV).map(WalletKeySource::PemFile))
            .or_else(|| get(WALLET_KEY_HEX_ENV).map(WalletKeySource::Hex));

        let grant_duration_days =
            parse_or(get(GRANT_DURATION_ENV), GRANT_DURATION_ENV, DEFAULT_DURATION_DAYS)?;
        if grant_duration_days == 0 {
            return Err(ConfigError::InvalidValue {
                name: GRANT_DURATION_ENV,
                reason: "must be at least 1 day".to_string(),
            });
        }
        let signing_timeout_secs =
            parse_or(get(SIGNING_TIMEOUT_ENV), SIGNING_TIMEOUT_ENV, DEFAULT_SIGNING_TIMEOUT_SECS)?;
        if signing_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: SIGNING_TIMEOUT_ENV,
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get(PORT_ENV), PORT_ENV, 8080)?,
            rpc_url: get(RPC_URL_ENV).unwrap_or_else(|| SEPOLIA.rpc_url.to_string()),
            contracts,
            relayer_url: get(RELAYER_URL_ENV).unwrap_or_else(|| DEFAULT_RELAYER_URL.to_string()),
            decryption_domain: DecryptionDomain {
                gateway_chain_id: parse_or(
                    get(GATEWAY_CHAIN_ID_ENV),
                    GATEWAY_CHAIN_ID_ENV,
                    DecryptionDomain::SEPOLIA.gateway_chain_id,
                )?,
                verifying_contract,
            },
            grant_duration_days,
            signing_timeout_secs,
            wallet_key,
            json_logs: get(LOG_FORMAT_ENV).is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load the session wallet, if a key is configured.
    pub fn load_wallet(&self) -> Result<Option<LocalWallet>, ConfigError> {
        let chain_id = SEPOLIA.chain_id;
        let wallet = match &self.wallet_key {
            None => return Ok(None),
            Some(WalletKeySource::Pem(pem)) => LocalWallet::from_pem(pem.as_bytes(), chain_id)?,
            Some(WalletKeySource::PemFile(path)) => {
                let pem = std::fs::read(path).map_err(|e| ConfigError::KeyFile {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                LocalWallet::from_pem(&pem, chain_id)?
            }
            Some(WalletKeySource::Hex(hex)) => LocalWallet::from_hex(hex, chain_id)?,
        };
        Ok(Some(wallet))
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}
