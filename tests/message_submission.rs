//! Integration tests for the nonce -> build -> sign -> push flow against a
//! scripted node.

use async_trait::async_trait;
use peggy::address::{Address, Network};
use peggy::bignum::BigNum;
use peggy::crypto::{KeyPair, KeyType};
use peggy::error::{PeggyError, Result};
use peggy::gateway::RpcGateway;
use peggy::message::{
    Message, MessageBuilder, MessageSigner, Signature, SignatureType,
    METHOD_CHANGE_OWNER_ADDRESS,
};
use peggy::mpool::MessageSubmitter;
use peggy::rpc::{RpcRequest, RpcTransport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers each method with a fixed result and records every request.
/// Unscripted methods get a node error.
#[derive(Default)]
struct ScriptedNode {
    results: HashMap<String, Value>,
    seen: Mutex<Vec<RpcRequest>>,
}

impl ScriptedNode {
    fn answer(mut self, method: &str, result: Value) -> Self {
        self.results.insert(method.to_string(), result);
        self
    }

    fn calls(&self, method: &str) -> Vec<RpcRequest> {
        let full = format!("Filecoin.{}", method);
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == full)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RpcTransport for ScriptedNode {
    async fn call(&self, request: &RpcRequest) -> Result<Value> {
        self.seen.lock().unwrap().push(request.clone());
        let short = request.method.trim_start_matches("Filecoin.");
        Ok(match self.results.get(short) {
            Some(result) => json!({"jsonrpc": "2.0", "id": request.id, "result": result}),
            None => json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "error": {"code": 1, "message": format!("{} not scripted", short)}
            }),
        })
    }
}

struct CountingSigner {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingSigner {
    fn working() -> Self {
        CountingSigner {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn broken() -> Self {
        CountingSigner {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSigner for CountingSigner {
    async fn sign(&self, _message: &Message, _key: &KeyPair) -> Result<Signature> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PeggyError::SigningFailed("hardware signer timed out".to_string()));
        }
        Ok(Signature {
            sig_type: SignatureType::Secp256k1,
            data: vec![0x5a; 65],
        })
    }
}

fn owner_key() -> KeyPair {
    KeyPair::from_private_key(KeyType::Secp256k1, &[0x07; 32]).unwrap()
}

fn owner_address() -> Address {
    Address::from_public_key(&owner_key().public_key_bytes(), Network::Mainnet).unwrap()
}

fn miner() -> Address {
    "f01000".parse().unwrap()
}

fn new_owner() -> Address {
    "f01234".parse().unwrap()
}

fn healthy_node() -> ScriptedNode {
    ScriptedNode::default()
        .answer(
            "StateMinerInfo",
            json!({"Owner": "f01001", "Worker": "f01002", "PeerId": null}),
        )
        .answer("StateLookupID", json!("f01001"))
        .answer("MpoolGetNonce", json!(5))
        .answer("WalletBalance", json!("10000000000000000000"))
        .answer("MpoolPush", json!({"/": "bafy2bzaceowner"}))
}

#[tokio::test]
async fn test_owner_change_is_pushed_with_live_nonce() {
    let gateway = RpcGateway::new(healthy_node());
    let signer = CountingSigner::working();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let cid = submitter
        .push_owner_change(&owner_key(), &owner_address(), &miner(), &new_owner())
        .await
        .unwrap();
    assert_eq!(cid.to_string(), "bafy2bzaceowner");
    assert_eq!(signer.calls(), 1);

    let pushes = gateway.transport().calls("MpoolPush");
    assert_eq!(pushes.len(), 1);
    let pushed = &pushes[0].params[0];
    assert_eq!(pushed["Message"]["To"], "f01000");
    assert_eq!(pushed["Message"]["From"], owner_address().to_string());
    assert_eq!(pushed["Message"]["Nonce"], 5);
    assert_eq!(pushed["Message"]["Method"], METHOD_CHANGE_OWNER_ADDRESS);
    assert_eq!(pushed["Message"]["Value"], "0");
    assert_eq!(pushed["Message"]["Params"], "QwDSCQ==");
    assert_eq!(pushed["Signature"]["Type"], 1);
}

#[tokio::test]
async fn test_non_owner_is_refused_before_signing() {
    let node = healthy_node().answer("StateLookupID", json!("f01999"));
    let gateway = RpcGateway::new(node);
    let signer = CountingSigner::working();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let err = submitter
        .push_owner_change(&owner_key(), &owner_address(), &miner(), &new_owner())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PeggyError::OwnerMismatch {
            expected: "f01001".to_string(),
            actual: owner_address().to_string(),
        }
    );
    assert_eq!(signer.calls(), 0);
    assert!(gateway.transport().calls("MpoolGetNonce").is_empty());
    assert!(gateway.transport().calls("MpoolPush").is_empty());
}

#[tokio::test]
async fn test_insufficient_balance_stops_before_signing() {
    let node = healthy_node().answer("WalletBalance", json!("1000"));
    let gateway = RpcGateway::new(node);
    let signer = CountingSigner::working();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let err = submitter
        .push_transfer(&owner_key(), &owner_address(), &new_owner(), BigNum::from_u64(1))
        .await
        .unwrap_err();
    match err {
        PeggyError::InsufficientFunds {
            required,
            available,
        } => {
            // 101137 * 32932877 + 1
            assert_eq!(required, "3330732381150");
            assert_eq!(available, "1000");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(signer.calls(), 0);
    assert!(gateway.transport().calls("MpoolPush").is_empty());
}

#[tokio::test]
async fn test_signer_failure_is_not_retried() {
    let gateway = RpcGateway::new(healthy_node());
    let signer = CountingSigner::broken();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let err = submitter
        .push_owner_change(&owner_key(), &owner_address(), &miner(), &new_owner())
        .await
        .unwrap_err();
    assert!(matches!(err, PeggyError::SigningFailed(_)));
    assert_eq!(signer.calls(), 1);
    assert!(gateway.transport().calls("MpoolPush").is_empty());
}

#[tokio::test]
async fn test_node_error_on_push_surfaces() {
    let node = ScriptedNode {
        results: healthy_node()
            .results
            .into_iter()
            .filter(|(method, _)| method != "MpoolPush")
            .collect(),
        ..Default::default()
    };
    let gateway = RpcGateway::new(node);
    let signer = CountingSigner::working();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let err = submitter
        .push_transfer(&owner_key(), &owner_address(), &new_owner(), BigNum::zero())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PeggyError::RpcFailure("MpoolPush not scripted (code 1)".to_string())
    );
    assert_eq!(signer.calls(), 1);
}

#[tokio::test]
async fn test_builds_without_refetch_share_a_nonce() {
    let gateway = RpcGateway::new(healthy_node());
    let builder = MessageBuilder::default();
    let from = owner_address();

    let nonce = gateway.mpool_get_nonce(&from).await.unwrap();
    let first = builder.build_transfer(&new_owner(), &from, nonce, BigNum::from_u64(10));
    let second = builder.build_owner_change_message(&miner(), &from, nonce, &new_owner());

    // Both carry 5; only one can be accepted by the node.
    assert_eq!(first.nonce, 5);
    assert_eq!(second.nonce, 5);
    assert_eq!(gateway.transport().calls("MpoolGetNonce").len(), 1);
}

fn receipt(exit_code: i64) -> Value {
    json!({
        "Message": {"/": "bafy2bzaceowner"},
        "Receipt": {"ExitCode": exit_code, "Return": null, "GasUsed": 21_000_000},
        "ReturnDec": null,
        "TipSet": [{"/": "bafy2bzacetipset"}],
        "Height": 3120
    })
}

#[tokio::test]
async fn test_owner_change_waits_for_receipt() {
    let node = healthy_node().answer("StateWaitMsg", receipt(0));
    let gateway = RpcGateway::new(node);
    let signer = CountingSigner::working();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let lookup = submitter
        .push_owner_change_and_wait(&owner_key(), &owner_address(), &miner(), &new_owner())
        .await
        .unwrap();
    assert_eq!(lookup.message.to_string(), "bafy2bzaceowner");
    assert_eq!(lookup.receipt.exit_code, 0);
    assert_eq!(lookup.height, 3120);

    let waits = gateway.transport().calls("StateWaitMsg");
    assert_eq!(waits.len(), 1);
    assert_eq!(waits[0].params, json!([{"/": "bafy2bzaceowner"}, 1]));
}

#[tokio::test]
async fn test_owner_change_failing_on_chain_is_an_error() {
    let node = healthy_node().answer("StateWaitMsg", receipt(18));
    let gateway = RpcGateway::new(node);
    let signer = CountingSigner::working();
    let builder = MessageBuilder::default();
    let submitter = MessageSubmitter::new(&gateway, &signer, &builder);

    let err = submitter
        .push_owner_change_and_wait(&owner_key(), &owner_address(), &miner(), &new_owner())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PeggyError::MessageFailed {
            cid: "bafy2bzaceowner".to_string(),
            exit_code: 18,
        }
    );
    // Accepted into the pool exactly once; the failure is not retried.
    assert_eq!(gateway.transport().calls("MpoolPush").len(), 1);
    assert_eq!(signer.calls(), 1);
}
