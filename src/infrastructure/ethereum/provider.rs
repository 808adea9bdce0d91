//! RPC client abstraction and the Alloy HTTP implementation

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::TransactionRequest;
use alloy_sol_types::SolValue;
use anyhow::{Context, Result};

use crate::domain::timelock::{encode_has_role, TimelockRole};

/// The on-chain reads this crate needs
///
/// Kept small so tests can stand in for a node.
#[async_trait::async_trait]
pub trait RpcClient: Send + Sync {
    /// Read a raw storage word
    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<B256>;

    /// Execute a read-only call (eth_call)
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

type HttpFillProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// JSON-RPC over HTTP
pub struct AlloyRpcClient {
    provider: HttpFillProvider,
    endpoint: String,
}

impl AlloyRpcClient {
    pub fn http(url: &str) -> Result<Self> {
        let rpc_url = url.parse().context("Invalid HTTP URL")?;
        let provider = ProviderBuilder::new().connect_http(rpc_url);
        Ok(Self {
            provider,
            endpoint: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl RpcClient for AlloyRpcClient {
    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<B256> {
        let value = self
            .provider
            .get_storage_at(address, slot)
            .await
            .with_context(|| {
                format!("eth_getStorageAt {} {:#x} via {}", address, slot, self.endpoint)
            })?;
        Ok(B256::from(value))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default().to(to).input(data.into());
        self.provider
            .call(request)
            .await
            .with_context(|| format!("eth_call {} via {}", to, self.endpoint))
    }
}

/// Check timelock role membership through `hasRole`
pub async fn has_role(
    rpc: &dyn RpcClient,
    timelock: Address,
    role: TimelockRole,
    account: Address,
) -> Result<bool> {
    let output = rpc
        .call(timelock, encode_has_role(role, account))
        .await
        .with_context(|| format!("hasRole({}, {}) on {}", role.name(), account, timelock))?;
    bool::abi_decode(&output).context("Failed to decode hasRole result")
}
