//! Ethereum infrastructure - RPC client implementations

mod provider;

pub use provider::{has_role, AlloyRpcClient, RpcClient};
