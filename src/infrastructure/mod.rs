//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based RPC client used for proxy slots and role checks
//! - Blockscout explorer and 4byte directory clients
//! - ABI resolution and calldata decoding using alloy-dyn-abi

pub mod abi;
pub mod ethereum;
pub mod explorer;

pub use abi::{AbiResolver, CalldataDecoder, DecodeRequest, SignatureDirectory};
pub use ethereum::{AlloyRpcClient, RpcClient};
pub use explorer::{BlockscoutExplorer, ExplorerClient};
