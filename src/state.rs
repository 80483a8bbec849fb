// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::{ContractAddresses, LocalWallet, NetworkConfig, SpectrumClient};
use crate::decryption::{GrantBuilder, RelayerClient};
use crate::lifecycle::AssetController;
use crate::view::ViewCache;

const VIEW_CACHE_CAPACITY: usize = 256;
const VIEW_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub chain: SpectrumClient,
    pub network: NetworkConfig,
    pub contracts: Option<ContractAddresses>,
    pub wallet: Option<Arc<LocalWallet>>,
    pub grants: GrantBuilder,
    pub relayer: RelayerClient,
    pub views: Arc<ViewCache>,
}

impl AppState {
    pub fn new(
        chain: SpectrumClient,
        contracts: Option<ContractAddresses>,
        wallet: Option<LocalWallet>,
        grants: GrantBuilder,
        relayer: RelayerClient,
    ) -> Self {
        Self {
            network: chain.network().clone(),
            chain,
            contracts,
            wallet: wallet.map(Arc::new),
            grants,
            relayer,
            views: Arc::new(ViewCache::new(VIEW_CACHE_CAPACITY, VIEW_CACHE_TTL)),
        }
    }

    /// Controller for the server's wallet session.
    pub fn controller(&self) -> AssetController<'_, SpectrumClient, LocalWallet> {
        AssetController::new(
            &self.chain,
            &self.network,
            self.contracts,
            &self.grants,
            &self.relayer,
        )
        .with_wallet(self.wallet.as_deref())
    }
}

/// Unconfigured state: Sepolia defaults, no contracts, no wallet.
#[cfg(test)]
impl Default for AppState {
    fn default() -> Self {
        let network = crate::blockchain::SEPOLIA;
        let chain = SpectrumClient::new(network.clone(), network.rpc_url).unwrap();
        let relayer =
            RelayerClient::new(crate::decryption::DEFAULT_RELAYER_URL, 11_155_111).unwrap();
        Self::new(
            chain,
            None,
            None,
            GrantBuilder::new(crate::decryption::DecryptionDomain::SEPOLIA),
            relayer,
        )
    }
}
