//! TimelockController bindings, operation ids, roles and calldata builders

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface ITimelockController {
        function schedule(address target, uint256 value, bytes data, bytes32 predecessor, bytes32 salt, uint256 delay) external;
        function scheduleBatch(address[] targets, uint256[] values, bytes[] payloads, bytes32 predecessor, bytes32 salt, uint256 delay) external;
        function execute(address target, uint256 value, bytes payload, bytes32 predecessor, bytes32 salt) external payable;
        function executeBatch(address[] targets, uint256[] values, bytes[] payloads, bytes32 predecessor, bytes32 salt) external payable;
        function cancel(bytes32 id) external;
        function updateDelay(uint256 newDelay) external;
        function hasRole(bytes32 role, address account) external view returns (bool);
    }
}

/// Function names whose payloads are unwrapped into child calls
pub const EXECUTE: &str = "execute";
pub const EXECUTE_BATCH: &str = "executeBatch";

/// Access-control roles used by TimelockController
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelockRole {
    DefaultAdmin,
    Proposer,
    Executor,
    Canceller,
}

impl TimelockRole {
    pub const ALL: [TimelockRole; 4] = [
        TimelockRole::DefaultAdmin,
        TimelockRole::Proposer,
        TimelockRole::Executor,
        TimelockRole::Canceller,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimelockRole::DefaultAdmin => "DEFAULT_ADMIN_ROLE",
            TimelockRole::Proposer => "PROPOSER_ROLE",
            TimelockRole::Executor => "EXECUTOR_ROLE",
            TimelockRole::Canceller => "CANCELLER_ROLE",
        }
    }

    /// Role identifier as stored on chain
    pub fn id(self) -> B256 {
        match self {
            TimelockRole::DefaultAdmin => B256::ZERO,
            other => keccak256(other.name().as_bytes()),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|role| role.name() == upper || role.name().trim_end_matches("_ROLE") == upper)
    }
}

/// A single timelock call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelockCall {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Operation id as computed by `hashOperation`
pub fn hash_operation(call: &TimelockCall, predecessor: B256, salt: B256) -> B256 {
    let encoded = (call.target, call.value, call.data.clone(), predecessor, salt).abi_encode_params();
    keccak256(encoded)
}

/// Operation id as computed by `hashOperationBatch`
pub fn hash_operation_batch(calls: &[TimelockCall], predecessor: B256, salt: B256) -> B256 {
    let (targets, values, payloads) = split_calls(calls);
    let encoded = (targets, values, payloads, predecessor, salt).abi_encode_params();
    keccak256(encoded)
}

pub fn encode_schedule(call: &TimelockCall, predecessor: B256, salt: B256, delay: U256) -> Bytes {
    ITimelockController::scheduleCall {
        target: call.target,
        value: call.value,
        data: call.data.clone(),
        predecessor,
        salt,
        delay,
    }
    .abi_encode()
    .into()
}

pub fn encode_schedule_batch(
    calls: &[TimelockCall],
    predecessor: B256,
    salt: B256,
    delay: U256,
) -> Bytes {
    let (targets, values, payloads) = split_calls(calls);
    ITimelockController::scheduleBatchCall {
        targets,
        values,
        payloads,
        predecessor,
        salt,
        delay,
    }
    .abi_encode()
    .into()
}

pub fn encode_execute(call: &TimelockCall, predecessor: B256, salt: B256) -> Bytes {
    ITimelockController::executeCall {
        target: call.target,
        value: call.value,
        payload: call.data.clone(),
        predecessor,
        salt,
    }
    .abi_encode()
    .into()
}

pub fn encode_execute_batch(calls: &[TimelockCall], predecessor: B256, salt: B256) -> Bytes {
    let (targets, values, payloads) = split_calls(calls);
    ITimelockController::executeBatchCall {
        targets,
        values,
        payloads,
        predecessor,
        salt,
    }
    .abi_encode()
    .into()
}

pub fn encode_cancel(id: B256) -> Bytes {
    ITimelockController::cancelCall { id }.abi_encode().into()
}

pub fn encode_has_role(role: TimelockRole, account: Address) -> Bytes {
    ITimelockController::hasRoleCall {
        role: role.id(),
        account,
    }
    .abi_encode()
    .into()
}

fn split_calls(calls: &[TimelockCall]) -> (Vec<Address>, Vec<U256>, Vec<Bytes>) {
    let targets = calls.iter().map(|c| c.target).collect();
    let values = calls.iter().map(|c| c.value).collect();
    let payloads = calls.iter().map(|c| c.data.clone()).collect();
    (targets, values, payloads)
}
