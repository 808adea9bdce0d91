//! Known-contract registry - static ABIs indexed by address

use std::collections::HashMap;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;

use super::KnownContractKind;

/// Registry of well-known contract ABIs indexed by address
#[derive(Debug, Default, Clone)]
pub struct KnownRegistry {
    contracts: HashMap<Address, JsonAbi>,
}

impl KnownRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ABI for an address
    ///
    /// Note: First registration for an address wins (no overwrite)
    pub fn insert(&mut self, address: Address, abi: JsonAbi) {
        self.contracts.entry(address).or_insert(abi);
    }

    /// Register one of the built-in contract kinds
    pub fn insert_kind(&mut self, address: Address, kind: KnownContractKind) {
        self.insert(address, kind.abi());
    }

    /// Look up the ABI registered for an address
    pub fn lookup(&self, address: &Address) -> Option<&JsonAbi> {
        self.contracts.get(address)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
