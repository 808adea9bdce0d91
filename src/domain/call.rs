//! Decoded call tree types

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{hex, Address, Selector, U256};
use serde::{Serialize, Serializer};

use super::abi::{AbiSource, Confidence};

/// Function name used when nothing could be decoded
pub const UNKNOWN_FUNCTION: &str = "unknown";

/// Kind of warning attached to a decoded node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    /// Depth or node budget ran out before decoding finished
    TruncatedRecursion,
    /// No ABI was available for the target
    AbiMissing,
    /// The decode is based on a directory guess
    AbiGuess,
    /// Decoding failed somewhere along the way
    DecodeFailed,
}

/// A warning with a human-readable explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl DecodeWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A decoded function argument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedParam {
    /// Parameter name (or "param{n}" if unnamed)
    pub name: String,
    /// Solidity type (e.g., "address", "uint256", "(uint256,address)")
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(serialize_with = "serialize_value")]
    pub value: DynSolValue,
}

/// One node in the decode tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedCallNode {
    pub target: Option<Address>,
    pub selector: Option<Selector>,
    /// Native value forwarded with this call, when known from the parent
    pub value: Option<U256>,
    pub function_name: String,
    pub signature: String,
    pub params: Vec<DecodedParam>,
    pub source: AbiSource,
    pub confidence: Confidence,
    pub warnings: Vec<DecodeWarning>,
    pub children: Vec<DecodedCallNode>,
}

impl DecodedCallNode {
    /// Node for calldata nothing could be decoded from
    pub fn unknown(target: Option<Address>, selector: Option<Selector>) -> Self {
        Self {
            target,
            selector,
            value: None,
            function_name: UNKNOWN_FUNCTION.to_string(),
            signature: String::new(),
            params: Vec::new(),
            source: AbiSource::DirectoryGuess,
            confidence: Confidence::Low,
            warnings: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_warning(mut self, kind: WarningKind, message: impl Into<String>) -> Self {
        self.warnings.push(DecodeWarning::new(kind, message));
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.function_name == UNKNOWN_FUNCTION
    }

    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    pub fn param(&self, name: &str) -> Option<&DecodedParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Selector as 0x-prefixed hex, empty for stub nodes
    pub fn selector_hex(&self) -> String {
        self.selector
            .map(|s| format!("0x{}", hex::encode(s)))
            .unwrap_or_default()
    }

    /// Total number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

fn serialize_value<S: Serializer>(value: &DynSolValue, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_value(value))
}

/// Format a DynSolValue for display
///
/// Integers are rendered in full decimal; nothing goes through floats.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        // bytesN is right-padded, so take the first `size` bytes
        DynSolValue::FixedBytes(word, size) => {
            let bytes = &word.as_slice()[..(*size).min(32)];
            format!("0x{}", hex::encode(bytes))
        }
        DynSolValue::Address(addr) => addr.to_checksum(None),
        DynSolValue::Function(func) => format!("0x{}", hex::encode(func.as_slice())),
        DynSolValue::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        DynSolValue::String(s) => format!("\"{}\"", s),
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        DynSolValue::Tuple(fields) => {
            let items: Vec<String> = fields.iter().map(format_value).collect();
            format!("({})", items.join(", "))
        }
        #[allow(unreachable_patterns)]
        _ => format!("{:?}", value),
    }
}
