//! EIP-1967 proxy detection through storage reads

use alloy_primitives::{b256, Address, B256, U256};

use crate::infrastructure::ethereum::RpcClient;

/// keccak256("eip1967.proxy.implementation") - 1
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// keccak256("eip1967.proxy.beacon") - 1
pub const EIP1967_BEACON_SLOT: B256 =
    b256!("a3f0ad74e5423aebfd80d3ef4346578335a9a72aeaee59ff6cb3582b35133d50");

/// What the storage slots say about an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProxyInfo {
    pub is_proxy: bool,
    /// Known only for implementation-slot proxies
    pub implementation: Option<Address>,
}

impl ProxyInfo {
    pub fn not_proxy() -> Self {
        Self::default()
    }
}

/// Read the EIP-1967 slots of `address`
///
/// Read failures count as "not a proxy"; this never errors.
pub async fn detect_proxy(rpc: &dyn RpcClient, address: Address) -> ProxyInfo {
    match read_slot(rpc, address, EIP1967_IMPLEMENTATION_SLOT).await {
        Some(word) if word != B256::ZERO => {
            let implementation = Address::from_word(word);
            tracing::debug!(%address, %implementation, "EIP-1967 implementation slot set");
            return ProxyInfo {
                is_proxy: true,
                implementation: Some(implementation),
            };
        }
        Some(_) => {}
        None => return ProxyInfo::not_proxy(),
    }

    match read_slot(rpc, address, EIP1967_BEACON_SLOT).await {
        Some(word) if word != B256::ZERO => {
            tracing::debug!(%address, beacon = %Address::from_word(word), "EIP-1967 beacon slot set");
            ProxyInfo {
                is_proxy: true,
                implementation: None,
            }
        }
        _ => ProxyInfo::not_proxy(),
    }
}

async fn read_slot(rpc: &dyn RpcClient, address: Address, slot: B256) -> Option<B256> {
    match rpc.get_storage_at(address, U256::from_be_bytes(slot.0)).await {
        Ok(word) => Some(word),
        Err(err) => {
            tracing::warn!(%address, %slot, error = %err, "proxy slot read failed");
            None
        }
    }
}
