//! ABI resolution and recursive calldata decoding for TimelockController
//! operations on Rootstock.
//!
//! Typical wiring:
//! - [`AbiResolver`] answers "which ABI for this address"
//! - [`CalldataDecoder`] turns calldata into a [`DecodedCallNode`] tree
//! - [`domain::classifier`] flags privileged calls
//! - [`domain::status`] derives operation lifecycle status

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod store;

pub use domain::abi::{AbiResolution, AbiSource, Confidence, KnownRegistry};
pub use domain::classifier::{classify, scan_tree, DangerousCall};
pub use domain::status::{derive_status, Countdown, OperationStatus, OperationTimes};
pub use domain::{DecodeWarning, DecodedCallNode, DecodedParam, Network, WarningKind};
pub use infrastructure::abi::{
    AbiResolver, CalldataDecoder, CalldataError, DecodeBudget, DecodeRequest, SignatureDirectory,
};
