//! Integration tests for the HTTP JSON-RPC transport

use httpmock::{Method::POST, MockServer};
use peggy::address::Address;
use peggy::error::PeggyError;
use peggy::gateway::RpcGateway;
use peggy::rpc::HttpTransport;
use serde_json::json;
use std::time::Duration;

fn gateway_for(server: &MockServer, token: Option<&str>) -> RpcGateway<HttpTransport> {
    let transport = HttpTransport::new(
        &server.url("/rpc/v0"),
        token.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();
    RpcGateway::new(transport)
}

#[tokio::test]
async fn test_nonce_over_http_with_bearer_token() {
    let server = MockServer::start_async().await;
    let nonce = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rpc/v0")
                .header("content-type", "application/json")
                .header("authorization", "Bearer s3cret")
                .body_contains("\"method\":\"Filecoin.MpoolGetNonce\"")
                .body_contains("\"params\":[\"f01234\"]");
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "id": 1000, "result": 5}));
        })
        .await;

    let gateway = gateway_for(&server, Some("s3cret"));
    let addr: Address = "f01234".parse().unwrap();
    assert_eq!(gateway.mpool_get_nonce(&addr).await.unwrap(), 5);
    nonce.assert_async().await;
}

#[tokio::test]
async fn test_http_error_status_is_rpc_failure() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc/v0");
            then.status(500).body("internal error");
        })
        .await;

    let gateway = gateway_for(&server, None);
    let err = gateway
        .wallet_balance(&"f01234".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PeggyError::RpcFailure(_)));
    failing.assert_async().await;
}

#[tokio::test]
async fn test_node_error_object_is_rpc_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rpc/v0");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1000,
                "error": {"code": 1, "message": "resolution lookup failed"}
            }));
        })
        .await;

    let gateway = gateway_for(&server, None);
    let err = gateway
        .state_lookup_id(&"f01234".parse().unwrap())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PeggyError::RpcFailure("resolution lookup failed (code 1)".to_string())
    );
}

#[tokio::test]
async fn test_miner_info_over_http() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rpc/v0")
                .body_contains("\"method\":\"Filecoin.StateMinerInfo\"");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1000,
                "result": {
                    "Owner": "f01001",
                    "Worker": "f01002",
                    "ControlAddresses": ["f01003"],
                    "SectorSize": 34359738368u64
                }
            }));
        })
        .await;

    let gateway = gateway_for(&server, None);
    let info = gateway
        .state_miner_info(&"f01000".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(info.owner.to_string(), "f01001");
    assert_eq!(info.worker.to_string(), "f01002");
    assert_eq!(info.control_addresses.unwrap().len(), 1);
    assert!(info.peer_id.is_none());
}
