//! ABI source resolution: manual override, cache, proxy detection,
//! explorer verified source, known registry

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;

use super::proxy::{detect_proxy, ProxyInfo};
use crate::domain::abi::{AbiResolution, AbiSource, KnownRegistry};
use crate::domain::{Clock, Network};
use crate::infrastructure::ethereum::RpcClient;
use crate::infrastructure::explorer::ExplorerClient;
use crate::store::{ManualAbiStore, TtlCache};

/// How long a resolution is reused
pub const RESOLUTION_TTL: Duration = Duration::from_secs(5 * 60);

/// Answers "which ABI should be used for address X"
///
/// Stages run strictly in order and the first success wins. The signature
/// directory is deliberately absent: its single-function guesses are the
/// decoder's business.
pub struct AbiResolver {
    manual: Arc<dyn ManualAbiStore>,
    explorer: Arc<dyn ExplorerClient>,
    registry: KnownRegistry,
    cache: TtlCache<(u64, Address), AbiResolution>,
}

impl AbiResolver {
    pub fn new(
        manual: Arc<dyn ManualAbiStore>,
        explorer: Arc<dyn ExplorerClient>,
        registry: KnownRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manual,
            explorer,
            registry,
            cache: TtlCache::new(RESOLUTION_TTL, clock),
        }
    }

    pub fn registry(&self) -> &KnownRegistry {
        &self.registry
    }

    /// Resolve the best available ABI; never fails
    pub async fn resolve(
        &self,
        address: Address,
        network: Network,
        rpc: Option<&dyn RpcClient>,
    ) -> AbiResolution {
        if let Some(abi) = self.manual.get(&address).filter(|abi| !abi.is_empty()) {
            tracing::debug!(%address, "using manual ABI");
            return AbiResolution::found(abi, AbiSource::Manual);
        }

        let key = (network.chain_id(), address);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(%address, source = hit.source.label(), "ABI resolution cache hit");
            return hit;
        }

        let proxy = match rpc {
            Some(rpc) => detect_proxy(rpc, address).await,
            None => ProxyInfo::not_proxy(),
        };
        let lookup = proxy.implementation.unwrap_or(address);

        match self.explorer.get_contract_abi(network, lookup).await {
            Ok(found) if found.verified && !found.abi.is_empty() => {
                let resolution = AbiResolution::found(found.abi, AbiSource::ExplorerVerified)
                    .with_proxy(proxy.is_proxy, proxy.implementation);
                tracing::debug!(%address, %lookup, is_proxy = proxy.is_proxy, "explorer verified ABI");
                self.cache.insert(key, resolution.clone());
                return resolution;
            }
            Ok(_) => tracing::debug!(%lookup, "explorer has no verified ABI"),
            Err(err) => tracing::warn!(%lookup, error = %err, "explorer lookup failed"),
        }

        let known = proxy
            .implementation
            .and_then(|implementation| self.registry.lookup(&implementation))
            .or_else(|| self.registry.lookup(&address));
        if let Some(abi) = known {
            let resolution = AbiResolution::found(abi.clone(), AbiSource::KnownRegistry)
                .with_proxy(proxy.is_proxy, proxy.implementation);
            tracing::debug!(%address, "known registry ABI");
            self.cache.insert(key, resolution.clone());
            return resolution;
        }

        let mut reason = format!("no verified or known ABI for {} on {}", address, network);
        match (proxy.is_proxy, proxy.implementation) {
            (true, Some(implementation)) => {
                reason.push_str(&format!(" (proxy to {})", implementation));
            }
            (true, None) => reason.push_str(" (beacon proxy, implementation unknown)"),
            _ => {}
        }
        tracing::debug!(%address, %reason, "ABI resolution gave up");
        AbiResolution::missing(reason).with_proxy(proxy.is_proxy, proxy.implementation)
    }

    /// Drop any cached resolution for an address
    pub fn invalidate(&self, address: Address, network: Network) {
        self.cache.remove(&(network.chain_id(), address));
    }
}
