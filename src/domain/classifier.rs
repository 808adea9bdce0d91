//! Dangerous-call classification by selector

use alloy_primitives::{fixed_bytes, hex, Selector};
use serde::Serialize;

use super::call::DecodedCallNode;

/// Selectors whose calls deserve a loud warning
const DANGEROUS_SELECTORS: &[(Selector, &str)] = &[
    // upgradeTo(address)
    (fixed_bytes!("3659cfe6"), "upgradeTo"),
    // upgradeToAndCall(address,bytes)
    (fixed_bytes!("4f1ef286"), "upgradeToAndCall"),
    // transferOwnership(address)
    (fixed_bytes!("f2fde38b"), "transferOwnership"),
    // updateDelay(uint256)
    (fixed_bytes!("64d62353"), "updateDelay"),
];

/// A high-risk call found in calldata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DangerousCall {
    pub function_name: String,
    /// 0x-prefixed lowercase selector
    pub selector: String,
}

/// Classify raw calldata by its selector
///
/// Returns `None` for missing, non-hex or too-short input.
pub fn classify(calldata: Option<&str>) -> Option<DangerousCall> {
    let data = calldata?.trim();
    let payload = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);
    let bytes = hex::decode(payload).ok()?;
    let selector = Selector::try_from(bytes.get(..4)?).ok()?;
    classify_selector(selector)
}

/// Classify a selector that has already been extracted
pub fn classify_selector(selector: Selector) -> Option<DangerousCall> {
    DANGEROUS_SELECTORS
        .iter()
        .find(|(known, _)| *known == selector)
        .map(|(known, name)| DangerousCall {
            function_name: (*name).to_string(),
            selector: format!("0x{}", hex::encode(known)),
        })
}

/// Collect every dangerous call in a decoded tree, depth-first
pub fn scan_tree(node: &DecodedCallNode) -> Vec<DangerousCall> {
    let mut found = Vec::new();
    collect(node, &mut found);
    found
}

fn collect(node: &DecodedCallNode, out: &mut Vec<DangerousCall>) {
    if let Some(call) = node.selector.and_then(classify_selector) {
        out.push(call);
    }
    for child in &node.children {
        collect(child, out);
    }
}
