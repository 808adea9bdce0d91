//! Local state: manual ABI overrides and TTL caches

mod abi_store;
mod ttl_cache;

pub use abi_store::{store_key, InMemoryAbiStore, ManualAbiStore, SqliteAbiStore, StoredAbi};
pub use ttl_cache::TtlCache;
