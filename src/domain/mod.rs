//! Domain layer - types and pure logic independent of any transport

pub mod abi;
pub mod call;
pub mod classifier;
pub mod clock;
pub mod network;
pub mod status;
pub mod timelock;

pub use call::{DecodeWarning, DecodedCallNode, DecodedParam, WarningKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use network::Network;
