//! Call-tree decoding: budgets, batch alignment and fallbacks

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use common::*;
use timelock_inspector::domain::abi::{erc20_abi, KnownRegistry};
use timelock_inspector::domain::call::format_value;
use timelock_inspector::infrastructure::abi::MAX_BATCH_CALLS;
use timelock_inspector::{
    AbiSource, CalldataError, Confidence, DecodeRequest, DecodedCallNode, WarningKind,
};

sol! {
    interface IRouter {
        function execute(bytes commands, bytes[] inputs) external payable;
    }
}

async fn decode(h: &Harness, request: DecodeRequest) -> DecodedCallNode {
    h.decoder.decode(request).await.unwrap()
}

#[tokio::test]
async fn test_erc20_transfer() {
    let h = Harness::with_known_contracts();
    let request = DecodeRequest::new(hex0x(&transfer(RECIPIENT, 1000))).target(TOKEN);

    let node = decode(&h, request).await;

    assert_eq!(node.function_name, "transfer");
    assert_eq!(node.signature, "transfer(address to, uint256 amount)");
    assert_eq!(node.selector_hex(), "0xa9059cbb");
    assert_eq!(node.source, AbiSource::KnownRegistry);
    assert_eq!(node.confidence, Confidence::High);
    assert!(node.warnings.is_empty());
    assert!(node.children.is_empty());

    let to = node.param("to").unwrap();
    assert_eq!(to.kind, "address");
    assert_eq!(format_value(&to.value), RECIPIENT.to_checksum(None));
    assert_eq!(format_value(&node.param("amount").unwrap().value), "1000");
}

#[tokio::test]
async fn test_execute_unwraps_inner_call() {
    let h = Harness::with_known_contracts();
    let calldata = execute(TOKEN, 7, transfer(RECIPIENT, 1000));

    let node = decode(&h, DecodeRequest::new(hex0x(&calldata)).target(TIMELOCK)).await;

    assert_eq!(node.function_name, "execute");
    assert_eq!(node.children.len(), 1);
    let child = &node.children[0];
    assert_eq!(child.target, Some(TOKEN));
    assert_eq!(child.value, Some(U256::from(7u64)));
    assert_eq!(child.function_name, "transfer");
    assert_eq!(format_value(&child.param("amount").unwrap().value), "1000");
    assert_eq!(node.node_count(), 2);
}

#[tokio::test]
async fn test_execute_batch_children_keep_order() {
    let h = Harness::with_known_contracts();
    let other = address!("9999999999999999999999999999999999999999");
    let calldata = execute_batch(
        vec![TOKEN, TOKEN, TOKEN],
        vec![0, 1, 2],
        vec![
            transfer(RECIPIENT, 1),
            transfer(other, 2),
            transfer(RECIPIENT, 3),
        ],
    );

    let node = decode(&h, DecodeRequest::new(hex0x(&calldata)).target(TIMELOCK)).await;

    assert_eq!(node.function_name, "executeBatch");
    assert!(node.warnings.is_empty());
    let amounts: Vec<String> = node
        .children
        .iter()
        .map(|c| format_value(&c.param("amount").unwrap().value))
        .collect();
    assert_eq!(amounts, vec!["1", "2", "3"]);
    assert_eq!(node.children[1].value, Some(U256::from(1u64)));
}

#[tokio::test]
async fn test_batch_length_mismatch_decodes_aligned_prefix() {
    let h = Harness::with_known_contracts();
    let calldata = execute_batch(
        vec![TOKEN, TOKEN, TOKEN],
        vec![0, 0, 0],
        vec![transfer(RECIPIENT, 1), transfer(RECIPIENT, 2)],
    );

    let node = decode(&h, DecodeRequest::new(hex0x(&calldata)).target(TIMELOCK)).await;

    assert!(node.has_warning(WarningKind::DecodeFailed));
    assert_eq!(node.children.len(), 2);
    assert!(node.children.iter().all(|c| c.function_name == "transfer"));
}

#[tokio::test]
async fn test_batch_is_capped() {
    let h = Harness::with_known_contracts();
    let count = MAX_BATCH_CALLS + 1;
    let calldata = execute_batch(
        vec![TOKEN; count],
        vec![0; count],
        vec![transfer(RECIPIENT, 1); count],
    );
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .max_nodes(1_000);

    let node = decode(&h, request).await;

    assert_eq!(node.children.len(), MAX_BATCH_CALLS);
    assert!(node.has_warning(WarningKind::TruncatedRecursion));
}

#[tokio::test]
async fn test_zero_node_budget_returns_stub_without_parsing() {
    let h = Harness::with_known_contracts();

    let node = decode(&h, DecodeRequest::new("not even hex").max_nodes(0)).await;

    assert!(node.is_unknown());
    assert!(node.has_warning(WarningKind::TruncatedRecursion));
    assert!(node.children.is_empty());
}

#[tokio::test]
async fn test_zero_depth_stops_at_execute() {
    let h = Harness::with_known_contracts();
    let calldata = execute(TOKEN, 0, transfer(RECIPIENT, 1));
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .max_depth(0);

    let node = decode(&h, request).await;

    assert_eq!(node.function_name, "execute");
    assert!(node.children.is_empty());
    assert!(node.has_warning(WarningKind::TruncatedRecursion));
}

#[tokio::test]
async fn test_nested_execute_respects_depth() {
    let h = Harness::with_known_contracts();
    let inner = execute(TOKEN, 0, transfer(RECIPIENT, 1));
    let outer = execute(TIMELOCK, 0, inner);
    let request = DecodeRequest::new(hex0x(&outer))
        .target(TIMELOCK)
        .max_depth(1);

    let node = decode(&h, request).await;

    let child = &node.children[0];
    assert_eq!(child.function_name, "execute");
    assert!(child.children.is_empty());
    assert!(child.has_warning(WarningKind::TruncatedRecursion));
}

#[tokio::test]
async fn test_node_budget_of_one_truncates_child() {
    let h = Harness::with_known_contracts();
    let calldata = execute(TOKEN, 0, transfer(RECIPIENT, 1));
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .max_nodes(1);

    let node = decode(&h, request).await;

    assert_eq!(node.children.len(), 1);
    assert!(node.children[0].is_unknown());
    assert!(node.children[0].has_warning(WarningKind::TruncatedRecursion));
}

#[tokio::test]
async fn test_failed_batch_child_leaves_siblings_decoded() {
    let h = Harness::with_known_contracts();
    let calldata = execute_batch(
        vec![TOKEN, UNKNOWN, TIMELOCK],
        vec![0, 0, 0],
        vec![
            transfer(RECIPIENT, 1),
            Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
            execute(TOKEN, 0, transfer(RECIPIENT, 2)),
        ],
    );
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .max_nodes(4);

    let node = decode(&h, request).await;

    assert!(node.warnings.is_empty());
    assert_eq!(node.children.len(), 3);

    let first = &node.children[0];
    assert_eq!(first.function_name, "transfer");
    assert!(first.warnings.is_empty());

    let second = &node.children[1];
    assert!(second.is_unknown());
    assert_eq!(second.selector_hex(), "0xdeadbeef");
    assert!(second.has_warning(WarningKind::AbiMissing));
    assert!(second.has_warning(WarningKind::DecodeFailed));

    // (4 - 1) / 3 leaves one node per child, so the nested execute cannot
    // spend anything on its own inner call
    let third = &node.children[2];
    assert_eq!(third.function_name, "execute");
    assert_eq!(third.children.len(), 1);
    assert!(third.children[0].is_unknown());
    assert_eq!(third.children[0].target, Some(TOKEN));
    assert!(third.children[0].has_warning(WarningKind::TruncatedRecursion));
}

#[tokio::test]
async fn test_batch_budget_split_evenly_across_children() {
    let h = Harness::with_known_contracts();
    let calldata = execute_batch(
        vec![TIMELOCK, TIMELOCK],
        vec![0, 0],
        vec![
            execute(TOKEN, 0, transfer(RECIPIENT, 1)),
            execute(TOKEN, 0, transfer(RECIPIENT, 2)),
        ],
    );
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .max_nodes(5);

    let node = decode(&h, request).await;

    for child in &node.children {
        assert_eq!(child.function_name, "execute");
        assert_eq!(child.children[0].function_name, "transfer");
    }
    assert_eq!(node.node_count(), 5);
}

#[tokio::test]
async fn test_non_timelock_execute_has_no_children_or_warnings() {
    let h = Harness::with_known_contracts();
    let router = JsonAbi::parse(["function execute(bytes commands, bytes[] inputs)"]).unwrap();
    let calldata: Bytes = IRouter::executeCall {
        commands: Bytes::from_static(&[0x0b, 0x00]),
        inputs: vec![transfer(RECIPIENT, 1)],
    }
    .abi_encode()
    .into();
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(UNKNOWN)
        .abi_override(UNKNOWN, router);

    let node = decode(&h, request).await;

    assert_eq!(node.function_name, "execute");
    assert_eq!(node.source, AbiSource::Manual);
    assert!(node.warnings.is_empty());
    assert!(node.children.is_empty());
}

#[tokio::test]
async fn test_empty_explicit_abi_falls_through_to_resolver() {
    let h = Harness::with_known_contracts();
    let request = DecodeRequest::new(hex0x(&transfer(RECIPIENT, 3)))
        .target(TOKEN)
        .abi(JsonAbi::new());

    let node = decode(&h, request).await;

    assert_eq!(node.function_name, "transfer");
    assert_eq!(node.source, AbiSource::KnownRegistry);
    assert!(node.warnings.is_empty());
}

#[tokio::test]
async fn test_empty_override_falls_through_to_resolver() {
    let h = Harness::with_known_contracts();
    let request = DecodeRequest::new(hex0x(&transfer(RECIPIENT, 3)))
        .target(TOKEN)
        .abi_override(TOKEN, JsonAbi::new());

    let node = decode(&h, request).await;

    assert_eq!(node.function_name, "transfer");
    assert_eq!(node.source, AbiSource::KnownRegistry);
}

#[tokio::test]
async fn test_empty_explicit_abi_without_target_is_missing() {
    let h = Harness::with_known_contracts();
    let request = DecodeRequest::new(hex0x(&transfer(RECIPIENT, 3))).abi(JsonAbi::new());

    let node = decode(&h, request).await;

    assert!(node.is_unknown());
    assert_eq!(node.warnings[0].kind, WarningKind::AbiMissing);
    assert!(node.warnings[0].message.contains("no target address"));
}

#[tokio::test]
async fn test_short_inner_payload_is_unknown_child() {
    let h = Harness::with_known_contracts();
    let calldata = execute(TOKEN, 0, vec![0xa9u8, 0x05].into());

    let node = decode(&h, DecodeRequest::new(hex0x(&calldata)).target(TIMELOCK)).await;

    let child = &node.children[0];
    assert!(child.is_unknown());
    assert!(child.has_warning(WarningKind::DecodeFailed));
}

#[tokio::test]
async fn test_directory_guess_when_no_abi() {
    let h = Harness::new(
        MockExplorer::new(),
        MockFetcher::new().with([0xa9, 0x05, 0x9c, 0xbb], &["transfer(address,uint256)"]),
        KnownRegistry::new(),
    );

    let node = decode(
        &h,
        DecodeRequest::new(hex0x(&transfer(RECIPIENT, 5))).target(UNKNOWN),
    )
    .await;

    assert_eq!(node.function_name, "transfer");
    assert_eq!(node.source, AbiSource::DirectoryGuess);
    assert_eq!(node.confidence, Confidence::Low);
    assert!(node.has_warning(WarningKind::AbiMissing));
    assert!(node.has_warning(WarningKind::AbiGuess));
    assert_eq!(format_value(&node.param("param1").unwrap().value), "5");
}

#[tokio::test]
async fn test_directory_guess_never_recurses() {
    let calldata = execute(TOKEN, 0, transfer(RECIPIENT, 1));
    let selector: [u8; 4] = calldata[..4].try_into().unwrap();
    let h = Harness::new(
        MockExplorer::new(),
        MockFetcher::new().with(selector, &["execute(address,uint256,bytes,bytes32,bytes32)"]),
        KnownRegistry::new(),
    );

    let node = decode(&h, DecodeRequest::new(hex0x(&calldata)).target(UNKNOWN)).await;

    assert_eq!(node.function_name, "execute");
    assert_eq!(node.source, AbiSource::DirectoryGuess);
    assert!(node.children.is_empty());
}

#[tokio::test]
async fn test_collision_is_reported() {
    let h = Harness::new(
        MockExplorer::new(),
        MockFetcher::new().with(
            [0xa9, 0x05, 0x9c, 0xbb],
            &["transfer(address,uint256)", "many_msg_babbage(bytes1)"],
        ),
        KnownRegistry::new(),
    );

    let node = decode(
        &h,
        DecodeRequest::new(hex0x(&transfer(RECIPIENT, 5))).target(UNKNOWN),
    )
    .await;

    let guess = node
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::AbiGuess)
        .unwrap();
    assert!(guess.message.contains("2 signatures"));
}

#[tokio::test]
async fn test_nothing_known_gives_unknown_node() {
    let h = Harness::new(MockExplorer::new(), MockFetcher::new(), KnownRegistry::new());

    let node = decode(
        &h,
        DecodeRequest::new(hex0x(&transfer(RECIPIENT, 5))).target(UNKNOWN),
    )
    .await;

    assert!(node.is_unknown());
    assert_eq!(node.selector_hex(), "0xa9059cbb");
    assert!(node.has_warning(WarningKind::AbiMissing));
    assert!(node.has_warning(WarningKind::DecodeFailed));
}

#[tokio::test]
async fn test_directory_failure_is_a_warning() {
    let h = Harness::new(MockExplorer::new(), MockFetcher::failing(), KnownRegistry::new());

    let node = decode(
        &h,
        DecodeRequest::new(hex0x(&transfer(RECIPIENT, 5))).target(UNKNOWN),
    )
    .await;

    assert!(node.is_unknown());
    assert!(node
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::DecodeFailed && w.message.contains("directory")));
}

#[tokio::test]
async fn test_explicit_abi_skips_resolution() {
    let h = Harness::new(MockExplorer::new(), MockFetcher::new(), KnownRegistry::new());
    let request = DecodeRequest::new(hex0x(&transfer(RECIPIENT, 5)))
        .target(UNKNOWN)
        .abi(erc20_abi());

    let node = decode(&h, request).await;

    assert_eq!(node.function_name, "transfer");
    assert_eq!(node.source, AbiSource::Manual);
    assert!(h.explorer.queried().is_empty());
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_explicit_abi_falls_back_to_directory() {
    let h = Harness::new(
        MockExplorer::new(),
        MockFetcher::new().with([0xa9, 0x05, 0x9c, 0xbb], &["transfer(address,uint256)"]),
        KnownRegistry::new(),
    );
    let abi = JsonAbi::parse(["function pause()"]).unwrap();
    let request = DecodeRequest::new(hex0x(&transfer(RECIPIENT, 5))).abi(abi);

    let node = decode(&h, request).await;

    assert_eq!(node.source, AbiSource::DirectoryGuess);
    assert!(node.has_warning(WarningKind::DecodeFailed));
    assert!(node.has_warning(WarningKind::AbiGuess));
}

#[tokio::test]
async fn test_override_applies_to_children() {
    let h = Harness::new(MockExplorer::new(), MockFetcher::new(), known_registry());
    let custom: Address = address!("7777777777777777777777777777777777777777");
    let calldata = execute(custom, 0, transfer(RECIPIENT, 9));
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .abi_override(custom, erc20_abi());

    let node = decode(&h, request).await;

    let child = &node.children[0];
    assert_eq!(child.function_name, "transfer");
    assert_eq!(child.source, AbiSource::Manual);
    assert!(!h.explorer.queried().contains(&custom));
}

#[tokio::test]
async fn test_rpc_is_used_for_children() {
    let implementation = address!("8888888888888888888888888888888888888888");
    let h = Harness::new(
        MockExplorer::new().with_verified(implementation, erc20_abi()),
        MockFetcher::new(),
        known_registry(),
    );
    let proxy = address!("6666666666666666666666666666666666666666");
    let rpc = Arc::new(MockRpc::new().with_implementation(proxy, implementation));
    let calldata = execute(proxy, 0, transfer(RECIPIENT, 1));
    let request = DecodeRequest::new(hex0x(&calldata))
        .target(TIMELOCK)
        .rpc(rpc.clone());

    let node = decode(&h, request).await;

    assert_eq!(node.children[0].source, AbiSource::ExplorerVerified);
    assert!(h.explorer.queried().contains(&implementation));
}

#[tokio::test]
async fn test_malformed_input_is_rejected() {
    let h = Harness::with_known_contracts();

    let err = h
        .decoder
        .decode(DecodeRequest::new("a9059cbb"))
        .await
        .unwrap_err();
    assert_eq!(err, CalldataError::MissingPrefix);

    let err = h.decoder.decode(DecodeRequest::new("0xa905")).await.unwrap_err();
    assert_eq!(err, CalldataError::TooShort(2));
}

#[tokio::test]
async fn test_tree_serializes_to_json() {
    let h = Harness::with_known_contracts();
    let calldata = execute(TOKEN, 0, transfer(RECIPIENT, 1000));

    let node = decode(&h, DecodeRequest::new(hex0x(&calldata)).target(TIMELOCK)).await;
    let json = serde_json::to_value(&node).unwrap();

    assert_eq!(json["functionName"], "execute");
    assert_eq!(json["source"], "KNOWN_REGISTRY");
    assert_eq!(json["children"][0]["params"][1]["value"], "1000");
    assert_eq!(json["children"][0]["params"][1]["type"], "uint256");
}
