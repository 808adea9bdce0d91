//! ABI decoder implementation using alloy-dyn-abi

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{hex, Selector};

use crate::domain::DecodedParam;

/// Why calldata could not be decoded against an ABI
#[derive(Debug, thiserror::Error)]
pub enum AbiDecodeError {
    #[error("calldata too short (need at least 4 bytes for selector)")]
    TooShort,
    #[error("selector 0x{} not found in ABI", hex::encode(.0))]
    SelectorNotFound(Selector),
    #[error("selector mismatch: got 0x{}, expected 0x{}", hex::encode(.got), hex::encode(.expected))]
    SelectorMismatch { got: Selector, expected: Selector },
    #[error("failed to resolve type of '{param}': {source}")]
    Type {
        param: String,
        source: alloy_dyn_abi::Error,
    },
    #[error("failed to decode arguments of {signature}: {source}")]
    Decode {
        signature: String,
        source: alloy_dyn_abi::Error,
    },
}

/// A function call decoded against a specific ABI entry
#[derive(Debug, Clone)]
pub struct FunctionDecode {
    pub function_name: String,
    /// Human signature with parameter names, e.g. `transfer(address to, uint256 amount)`
    pub signature: String,
    pub params: Vec<DecodedParam>,
}

/// Selector of `data`, if it carries one
pub fn selector_of(data: &[u8]) -> Option<Selector> {
    data.get(..4).and_then(|s| Selector::try_from(s).ok())
}

/// Decode calldata against a full ABI by selector
pub fn decode_with_abi(abi: &JsonAbi, data: &[u8]) -> Result<FunctionDecode, AbiDecodeError> {
    let selector = selector_of(data).ok_or(AbiDecodeError::TooShort)?;
    let function = abi
        .functions()
        .find(|f| f.selector() == selector)
        .ok_or(AbiDecodeError::SelectorNotFound(selector))?;
    decode_with_function(function, data)
}

/// Decode calldata against a single function entry
pub fn decode_with_function(
    function: &Function,
    data: &[u8],
) -> Result<FunctionDecode, AbiDecodeError> {
    let selector = selector_of(data).ok_or(AbiDecodeError::TooShort)?;
    if selector != function.selector() {
        return Err(AbiDecodeError::SelectorMismatch {
            got: selector,
            expected: function.selector(),
        });
    }

    let args_data = &data[4..];
    let signature = format_signature(function);

    let types: Vec<DynSolType> = function
        .inputs
        .iter()
        .map(|param| {
            param.resolve().map_err(|source| AbiDecodeError::Type {
                param: param.name.clone(),
                source: source.into(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let decoded_values = if types.is_empty() {
        Vec::new()
    } else {
        let decoded = DynSolType::Tuple(types)
            .abi_decode_params(args_data)
            .map_err(|source| AbiDecodeError::Decode {
                signature: signature.clone(),
                source: source.into(),
            })?;
        match decoded {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        }
    };

    let params = function
        .inputs
        .iter()
        .zip(decoded_values)
        .enumerate()
        .map(|(idx, (param, value))| DecodedParam {
            name: param_name(&param.name, idx),
            kind: param.selector_type().into_owned(),
            value,
        })
        .collect();

    Ok(FunctionDecode {
        function_name: function.name.clone(),
        signature,
        params,
    })
}

/// `name(type name, ...)`, synthesizing `paramN` for unnamed inputs
pub fn format_signature(function: &Function) -> String {
    let inputs: Vec<String> = function
        .inputs
        .iter()
        .enumerate()
        .map(|(idx, param)| format!("{} {}", param.selector_type(), param_name(&param.name, idx)))
        .collect();
    format!("{}({})", function.name, inputs.join(", "))
}

fn param_name(name: &str, idx: usize) -> String {
    if name.trim().is_empty() {
        format!("param{}", idx)
    } else {
        name.to_string()
    }
}
