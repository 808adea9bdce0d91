//! ABI domain models
//!
//! Resolution results, the static registry of well-known contract ABIs and
//! the built-in human-readable ABIs used to seed it.

mod builtin;
mod registry;
mod resolution;

pub use builtin::{erc20_abi, timelock_abi, KnownContractKind};
pub use registry::KnownRegistry;
pub use resolution::{AbiResolution, AbiSource, Confidence};
