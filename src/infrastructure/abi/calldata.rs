//! Recursive calldata decoding into a bounded call tree

use std::collections::HashMap;
use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{hex, Address, Bytes, Selector, U256};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use super::decoder::{decode_with_abi, decode_with_function, selector_of, FunctionDecode};
use super::directory::SignatureDirectory;
use super::resolver::AbiResolver;
use crate::domain::abi::{AbiSource, Confidence};
use crate::domain::timelock::{EXECUTE, EXECUTE_BATCH};
use crate::domain::{DecodeWarning, DecodedCallNode, DecodedParam, Network, WarningKind};
use crate::infrastructure::ethereum::RpcClient;

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_NODES: usize = 50;

/// Hard ceiling on inner calls decoded per batch, whatever the budget
pub const MAX_BATCH_CALLS: usize = 50;

const EXECUTE_TYPES: [&str; 5] = ["address", "uint256", "bytes", "bytes32", "bytes32"];
const EXECUTE_BATCH_TYPES: [&str; 5] = ["address[]", "uint256[]", "bytes[]", "bytes32", "bytes32"];

/// Malformed decoder input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalldataError {
    #[error("calldata must be 0x-prefixed hex")]
    MissingPrefix,
    #[error("calldata is not valid hex: {0}")]
    InvalidHex(String),
    #[error("calldata is {0} bytes, shorter than a 4-byte selector")]
    TooShort(usize),
}

/// Parse 0x-prefixed calldata that carries at least a selector
pub fn parse_calldata(calldata: &str) -> Result<Bytes, CalldataError> {
    let trimmed = calldata.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or(CalldataError::MissingPrefix)?;
    let bytes = hex::decode(payload).map_err(|e| CalldataError::InvalidHex(e.to_string()))?;
    if bytes.len() < 4 {
        return Err(CalldataError::TooShort(bytes.len()));
    }
    Ok(bytes.into())
}

/// Depth and node limits threaded through the recursion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeBudget {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for DecodeBudget {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Everything `decode` needs to know about one calldata blob
#[derive(Clone)]
pub struct DecodeRequest {
    pub calldata: String,
    pub target: Option<Address>,
    /// Explicit ABI, used ahead of any lookup
    pub abi: Option<JsonAbi>,
    pub abi_source: Option<AbiSource>,
    pub abi_confidence: Option<Confidence>,
    pub network: Network,
    pub rpc: Option<Arc<dyn RpcClient>>,
    /// Per-address ABIs applied at every level of the tree
    pub abi_overrides: HashMap<Address, JsonAbi>,
    pub budget: DecodeBudget,
}

impl DecodeRequest {
    pub fn new(calldata: impl Into<String>) -> Self {
        Self {
            calldata: calldata.into(),
            target: None,
            abi: None,
            abi_source: None,
            abi_confidence: None,
            network: Network::default(),
            rpc: None,
            abi_overrides: HashMap::new(),
            budget: DecodeBudget::default(),
        }
    }

    pub fn target(mut self, target: Address) -> Self {
        self.target = Some(target);
        self
    }

    pub fn abi(mut self, abi: JsonAbi) -> Self {
        self.abi = Some(abi);
        self
    }

    pub fn abi_source(mut self, source: AbiSource, confidence: Confidence) -> Self {
        self.abi_source = Some(source);
        self.abi_confidence = Some(confidence);
        self
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn rpc(mut self, rpc: Arc<dyn RpcClient>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn abi_override(mut self, address: Address, abi: JsonAbi) -> Self {
        self.abi_overrides.insert(address, abi);
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.budget.max_depth = max_depth;
        self
    }

    pub fn max_nodes(mut self, max_nodes: usize) -> Self {
        self.budget.max_nodes = max_nodes;
        self
    }
}

/// Request-wide state shared by every node of one decode
struct DecodeContext {
    network: Network,
    rpc: Option<Arc<dyn RpcClient>>,
    overrides: HashMap<Address, JsonAbi>,
}

/// An ABI chosen for a node and how far it can be trusted
struct ChosenAbi {
    abi: JsonAbi,
    source: AbiSource,
    confidence: Confidence,
}

/// Decodes calldata into a tree, unwrapping timelock executions
pub struct CalldataDecoder {
    resolver: Arc<AbiResolver>,
    directory: Arc<SignatureDirectory>,
}

impl CalldataDecoder {
    pub fn new(resolver: Arc<AbiResolver>, directory: Arc<SignatureDirectory>) -> Self {
        Self {
            resolver,
            directory,
        }
    }

    pub fn resolver(&self) -> &AbiResolver {
        &self.resolver
    }

    /// Decode `request.calldata`
    ///
    /// Only malformed input is an error; every upstream failure ends up as a
    /// warning on the returned tree.
    pub async fn decode(&self, request: DecodeRequest) -> Result<DecodedCallNode, CalldataError> {
        if request.budget.max_nodes == 0 {
            return Ok(truncated_stub(request.target));
        }
        let data = parse_calldata(&request.calldata)?;

        let explicit = request.abi.map(|abi| ChosenAbi {
            abi,
            source: request.abi_source.unwrap_or(AbiSource::Manual),
            confidence: request.abi_confidence.unwrap_or(Confidence::High),
        });
        let ctx = DecodeContext {
            network: request.network,
            rpc: request.rpc,
            overrides: request.abi_overrides,
        };

        let node = self
            .decode_node(&ctx, data, request.target, explicit, request.budget)
            .await;
        tracing::debug!(
            contract = ?request.target,
            function = %node.function_name,
            nodes = node.node_count(),
            "decoded calldata"
        );
        Ok(node)
    }

    fn decode_node<'a>(
        &'a self,
        ctx: &'a DecodeContext,
        data: Bytes,
        target: Option<Address>,
        explicit: Option<ChosenAbi>,
        budget: DecodeBudget,
    ) -> BoxFuture<'a, DecodedCallNode> {
        async move {
            if budget.max_nodes == 0 {
                return truncated_stub(target);
            }
            let Some(selector) = selector_of(&data) else {
                return DecodedCallNode::unknown(target, None).with_warning(
                    WarningKind::DecodeFailed,
                    format!("payload is {} bytes, shorter than a selector", data.len()),
                );
            };

            let mut warnings = Vec::new();
            match self.choose_abi(ctx, target, explicit).await {
                Ok(chosen) => match decode_with_abi(&chosen.abi, &data) {
                    Ok(decoded) => {
                        let mut node = decoded_node(
                            target,
                            selector,
                            decoded,
                            chosen.source,
                            chosen.confidence,
                            warnings,
                        );
                        self.expand(ctx, &mut node, budget).await;
                        return node;
                    }
                    Err(err) => {
                        tracing::debug!(contract = ?target, error = %err, "decode against resolved ABI failed");
                        warnings.push(DecodeWarning::new(WarningKind::DecodeFailed, err.to_string()));
                    }
                },
                Err(reason) => warnings.push(DecodeWarning::new(WarningKind::AbiMissing, reason)),
            }

            self.directory_fallback(target, selector, &data, warnings).await
        }
        .boxed()
    }

    /// Explicit ABI, then per-address override, then the resolver
    async fn choose_abi(
        &self,
        ctx: &DecodeContext,
        target: Option<Address>,
        explicit: Option<ChosenAbi>,
    ) -> Result<ChosenAbi, String> {
        // An ABI without functions cannot decode anything
        if let Some(chosen) = explicit.filter(|chosen| has_functions(&chosen.abi)) {
            return Ok(chosen);
        }
        let Some(target) = target else {
            return Err("no ABI supplied and no target address to resolve".to_string());
        };
        if let Some(abi) = ctx.overrides.get(&target).filter(|abi| has_functions(abi)) {
            return Ok(ChosenAbi {
                abi: abi.clone(),
                source: AbiSource::Manual,
                confidence: Confidence::High,
            });
        }

        let resolution = self
            .resolver
            .resolve(target, ctx.network, ctx.rpc.as_deref())
            .await;
        if resolution.has_abi() {
            Ok(ChosenAbi {
                abi: resolution.abi,
                source: resolution.source,
                confidence: resolution.confidence,
            })
        } else {
            Err(resolution
                .error
                .unwrap_or_else(|| format!("no ABI available for {}", target)))
        }
    }

    /// Attach children for timelock `execute` / `executeBatch`
    async fn expand(&self, ctx: &DecodeContext, node: &mut DecodedCallNode, budget: DecodeBudget) {
        let is_batch = match node.function_name.as_str() {
            EXECUTE => false,
            EXECUTE_BATCH => true,
            _ => return,
        };
        if budget.max_depth == 0 {
            node.warnings.push(DecodeWarning::new(
                WarningKind::TruncatedRecursion,
                "depth budget exhausted; inner calls not decoded",
            ));
            return;
        }

        if is_batch {
            self.expand_batch(ctx, node, budget).await;
        } else {
            self.expand_single(ctx, node, budget).await;
        }
    }

    async fn expand_single(&self, ctx: &DecodeContext, node: &mut DecodedCallNode, budget: DecodeBudget) {
        let Some((target, value, payload)) = execute_args(&node.params) else {
            tracing::debug!(signature = %node.signature, "execute is not a timelock execute");
            return;
        };
        let child_budget = DecodeBudget {
            max_depth: budget.max_depth - 1,
            max_nodes: budget.max_nodes.saturating_sub(1),
        };
        let mut child = self
            .decode_node(ctx, payload, Some(target), None, child_budget)
            .await;
        child.value = Some(value);
        node.children.push(child);
    }

    async fn expand_batch(&self, ctx: &DecodeContext, node: &mut DecodedCallNode, budget: DecodeBudget) {
        let Some((targets, values, payloads)) = execute_batch_args(&node.params) else {
            tracing::debug!(signature = %node.signature, "executeBatch is not a timelock executeBatch");
            return;
        };

        if targets.len() != payloads.len() {
            node.warnings.push(DecodeWarning::new(
                WarningKind::DecodeFailed,
                format!(
                    "targets ({}) and payloads ({}) differ in length; decoding the {} alignable calls",
                    targets.len(),
                    payloads.len(),
                    targets.len().min(payloads.len())
                ),
            ));
        }
        let alignable = targets.len().min(payloads.len());
        let count = alignable.min(MAX_BATCH_CALLS);
        if alignable > count {
            node.warnings.push(DecodeWarning::new(
                WarningKind::TruncatedRecursion,
                format!("only the first {} of {} calls were decoded", count, alignable),
            ));
        }
        if count == 0 {
            return;
        }

        let child_budget = DecodeBudget {
            max_depth: budget.max_depth - 1,
            max_nodes: (budget.max_nodes.saturating_sub(1) / count).max(1),
        };
        let children = targets
            .into_iter()
            .zip(payloads)
            .take(count)
            .enumerate()
            .map(|(idx, (target, payload))| {
                let value = values.get(idx).copied();
                self.decode_node(ctx, payload, Some(target), None, child_budget)
                    .map(move |mut child| {
                        child.value = value;
                        child
                    })
            });
        // join_all yields in input order regardless of completion order
        node.children = join_all(children).await;
    }

    async fn directory_fallback(
        &self,
        target: Option<Address>,
        selector: Selector,
        data: &[u8],
        mut warnings: Vec<DecodeWarning>,
    ) -> DecodedCallNode {
        match self.directory.best_guess(data).await {
            Ok(Some(guess)) => match decode_with_function(&guess.fragment, data) {
                Ok(decoded) => {
                    let mut message = format!("decoded with directory guess {}", guess.signature);
                    if guess.has_collision {
                        message.push_str(&format!(
                            "; {} signatures share this selector, the guess may be wrong",
                            guess.candidates.len()
                        ));
                    }
                    warnings.push(DecodeWarning::new(WarningKind::AbiGuess, message));
                    // Guessed types are never trusted for structural recursion
                    return decoded_node(
                        target,
                        selector,
                        decoded,
                        AbiSource::DirectoryGuess,
                        Confidence::Low,
                        warnings,
                    );
                }
                Err(err) => warnings.push(DecodeWarning::new(
                    WarningKind::DecodeFailed,
                    format!("directory guess {} did not decode: {}", guess.signature, err),
                )),
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(selector = %hex::encode(selector), error = %err, "directory lookup failed");
                warnings.push(DecodeWarning::new(
                    WarningKind::DecodeFailed,
                    format!("directory lookup failed: {}", err),
                ));
            }
        }

        let mut node = DecodedCallNode::unknown(target, Some(selector));
        node.warnings = warnings;
        node.with_warning(WarningKind::DecodeFailed, "no ABI and no directory match")
    }
}

fn truncated_stub(target: Option<Address>) -> DecodedCallNode {
    DecodedCallNode::unknown(target, None).with_warning(
        WarningKind::TruncatedRecursion,
        "node budget exhausted; calldata not decoded",
    )
}

fn decoded_node(
    target: Option<Address>,
    selector: Selector,
    decoded: FunctionDecode,
    source: AbiSource,
    confidence: Confidence,
    warnings: Vec<DecodeWarning>,
) -> DecodedCallNode {
    DecodedCallNode {
        target,
        selector: Some(selector),
        value: None,
        function_name: decoded.function_name,
        signature: decoded.signature,
        params: decoded.params,
        source,
        confidence,
        warnings,
        children: Vec::new(),
    }
}

fn has_functions(abi: &JsonAbi) -> bool {
    abi.functions().next().is_some()
}

fn has_shape(params: &[DecodedParam], types: &[&str]) -> bool {
    params.len() == types.len() && params.iter().zip(types).all(|(p, ty)| p.kind == *ty)
}

/// `(target, value, payload)` of a timelock `execute`
fn execute_args(params: &[DecodedParam]) -> Option<(Address, U256, Bytes)> {
    if !has_shape(params, &EXECUTE_TYPES) {
        return None;
    }
    let target = params[0].value.as_address()?;
    let (value, _) = params[1].value.as_uint()?;
    let payload = Bytes::copy_from_slice(params[2].value.as_bytes()?);
    Some((target, value, payload))
}

/// `(targets, values, payloads)` of a timelock `executeBatch`
fn execute_batch_args(params: &[DecodedParam]) -> Option<(Vec<Address>, Vec<U256>, Vec<Bytes>)> {
    if !has_shape(params, &EXECUTE_BATCH_TYPES) {
        return None;
    }
    let targets = params[0]
        .value
        .as_array()?
        .iter()
        .map(|v| v.as_address())
        .collect::<Option<Vec<_>>>()?;
    let values = params[1]
        .value
        .as_array()?
        .iter()
        .map(|v| v.as_uint().map(|(u, _)| u))
        .collect::<Option<Vec<_>>>()?;
    let payloads = params[2]
        .value
        .as_array()?
        .iter()
        .map(|v| v.as_bytes().map(Bytes::copy_from_slice))
        .collect::<Option<Vec<_>>>()?;
    Some((targets, values, payloads))
}
