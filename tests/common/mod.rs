//! In-process stand-ins for the node, explorer and signature directory
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_json_abi::JsonAbi;
use alloy_primitives::{address, Address, Bytes, Selector, B256, U256};
use alloy_sol_types::{sol, SolCall};
use anyhow::{anyhow, Result};

use timelock_inspector::domain::abi::{KnownContractKind, KnownRegistry};
use timelock_inspector::domain::ManualClock;
use timelock_inspector::infrastructure::abi::{
    AbiResolver, CalldataDecoder, DirectoryError, SignatureDirectory, SignatureFetcher,
    EIP1967_BEACON_SLOT, EIP1967_IMPLEMENTATION_SLOT,
};
use timelock_inspector::infrastructure::ethereum::RpcClient;
use timelock_inspector::infrastructure::explorer::{ExplorerAbi, ExplorerClient};
use timelock_inspector::store::InMemoryAbiStore;
use timelock_inspector::Network;

pub const TIMELOCK: Address = address!("1111111111111111111111111111111111111111");
pub const TOKEN: Address = address!("2222222222222222222222222222222222222222");
pub const RECIPIENT: Address = address!("1234567890123456789012345678901234567890");
pub const UNKNOWN: Address = address!("3333333333333333333333333333333333333333");

sol! {
    interface IFixtures {
        function transfer(address to, uint256 amount) external returns (bool);
        function execute(address target, uint256 value, bytes payload, bytes32 predecessor, bytes32 salt) external payable;
        function executeBatch(address[] targets, uint256[] values, bytes[] payloads, bytes32 predecessor, bytes32 salt) external payable;
        function upgradeTo(address newImplementation) external;
    }
}

pub fn hex0x(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn transfer(to: Address, amount: u64) -> Bytes {
    IFixtures::transferCall {
        to,
        amount: U256::from(amount),
    }
    .abi_encode()
    .into()
}

pub fn execute(target: Address, value: u64, payload: Bytes) -> Bytes {
    IFixtures::executeCall {
        target,
        value: U256::from(value),
        payload,
        predecessor: B256::ZERO,
        salt: B256::ZERO,
    }
    .abi_encode()
    .into()
}

pub fn execute_batch(targets: Vec<Address>, values: Vec<u64>, payloads: Vec<Bytes>) -> Bytes {
    IFixtures::executeBatchCall {
        targets,
        values: values.into_iter().map(U256::from).collect(),
        payloads,
        predecessor: B256::ZERO,
        salt: B256::ZERO,
    }
    .abi_encode()
    .into()
}

pub fn upgrade_to(implementation: Address) -> Bytes {
    IFixtures::upgradeToCall {
        newImplementation: implementation,
    }
    .abi_encode()
    .into()
}

/// Node with a fixed storage layout
#[derive(Default)]
pub struct MockRpc {
    storage: HashMap<(Address, U256), B256>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_implementation(mut self, proxy: Address, implementation: Address) -> Self {
        self.storage.insert(
            (proxy, U256::from_be_bytes(EIP1967_IMPLEMENTATION_SLOT.0)),
            implementation.into_word(),
        );
        self
    }

    pub fn with_beacon(mut self, proxy: Address, beacon: Address) -> Self {
        self.storage.insert(
            (proxy, U256::from_be_bytes(EIP1967_BEACON_SLOT.0)),
            beacon.into_word(),
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RpcClient for MockRpc {
    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<B256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("connection refused"));
        }
        Ok(self
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or(B256::ZERO))
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("eth_call not mocked"))
    }
}

/// Explorer that knows a fixed set of verified ABIs and records each query
#[derive(Default)]
pub struct MockExplorer {
    verified: HashMap<Address, JsonAbi>,
    pub fail: bool,
    queried: Mutex<Vec<Address>>,
}

impl MockExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_verified(mut self, address: Address, abi: JsonAbi) -> Self {
        self.verified.insert(address, abi);
        self
    }

    pub fn queried(&self) -> Vec<Address> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ExplorerClient for MockExplorer {
    async fn get_contract_abi(&self, _network: Network, address: Address) -> Result<ExplorerAbi> {
        self.queried.lock().unwrap().push(address);
        if self.fail {
            return Err(anyhow!("explorer returned 503 Service Unavailable"));
        }
        Ok(match self.verified.get(&address) {
            Some(abi) => ExplorerAbi {
                abi: abi.clone(),
                verified: true,
            },
            None => ExplorerAbi::unverified(),
        })
    }
}

/// Directory with canned answers per selector
#[derive(Default)]
pub struct MockFetcher {
    signatures: HashMap<Selector, Vec<String>>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, selector: [u8; 4], signatures: &[&str]) -> Self {
        self.signatures.insert(
            Selector::from(selector),
            signatures.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[async_trait::async_trait]
impl SignatureFetcher for MockFetcher {
    async fn fetch(&self, selector: Selector) -> Result<Vec<String>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DirectoryError::Status(502));
        }
        Ok(self.signatures.get(&selector).cloned().unwrap_or_default())
    }
}

/// Fully wired decoder over mocks
pub struct Harness {
    pub manual: Arc<InMemoryAbiStore>,
    pub explorer: Arc<MockExplorer>,
    pub fetcher: Arc<MockFetcher>,
    pub clock: Arc<ManualClock>,
    pub resolver: Arc<AbiResolver>,
    pub decoder: CalldataDecoder,
}

impl Harness {
    pub fn new(explorer: MockExplorer, fetcher: MockFetcher, registry: KnownRegistry) -> Self {
        let manual = Arc::new(InMemoryAbiStore::new());
        let explorer = Arc::new(explorer);
        let fetcher = Arc::new(fetcher);
        let clock = Arc::new(ManualClock::new(1_000));
        let resolver = Arc::new(AbiResolver::new(
            manual.clone(),
            explorer.clone(),
            registry,
            clock.clone(),
        ));
        let directory = Arc::new(SignatureDirectory::new(fetcher.clone(), clock.clone()));
        let decoder = CalldataDecoder::new(resolver.clone(), directory);
        Self {
            manual,
            explorer,
            fetcher,
            clock,
            resolver,
            decoder,
        }
    }

    /// Timelock and token registered, no explorer or directory data
    pub fn with_known_contracts() -> Self {
        Self::new(MockExplorer::new(), MockFetcher::new(), known_registry())
    }
}

pub fn known_registry() -> KnownRegistry {
    let mut registry = KnownRegistry::new();
    registry.insert_kind(TIMELOCK, KnownContractKind::Timelock);
    registry.insert_kind(TOKEN, KnownContractKind::Erc20);
    registry
}
