//! Typed wrappers for the node methods Peggy consumes.

use crate::address::Address;
use crate::bignum::BigNum;
use crate::error::{PeggyError, Result};
use crate::message::{base64_bytes, Message, SignedMessage};
use crate::rpc::{interpret_response, RequestIds, RpcRequest, RpcTransport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, error, info};

pub const DEFAULT_NAMESPACE: &str = "Filecoin";

pub const STATE_MINER_INFO: &str = "StateMinerInfo";
pub const STATE_ACCOUNT_KEY: &str = "StateAccountKey";
pub const STATE_LOOKUP_ID: &str = "StateLookupID";
pub const STATE_GET_ACTOR: &str = "StateGetActor";
pub const MPOOL_GET_NONCE: &str = "MpoolGetNonce";
pub const MPOOL_PUSH: &str = "MpoolPush";
pub const WALLET_BALANCE: &str = "WalletBalance";
pub const GAS_ESTIMATE_MESSAGE_GAS: &str = "GasEstimateMessageGas";
pub const STATE_WAIT_MSG: &str = "StateWaitMsg";

/// Epochs the node waits on top of inclusion before answering `StateWaitMsg`.
pub const DEFAULT_CONFIDENCE: u64 = 1;

/// Content identifier as the node renders it: `{"/": "bafy..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cid {
    #[serde(rename = "/")]
    pub value: String,
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinerInfo {
    pub owner: Address,
    pub worker: Address,
    #[serde(default)]
    pub new_worker: Option<Address>,
    #[serde(default)]
    pub control_addresses: Option<Vec<Address>>,
    #[serde(default, rename = "PeerId")]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub sector_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActorState {
    pub code: Cid,
    pub head: Cid,
    pub nonce: u64,
    pub balance: BigNum,
}

/// Execution receipt of an included message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Receipt {
    pub exit_code: i64,
    #[serde(rename = "Return", default, with = "base64_bytes")]
    pub return_data: Vec<u8>,
    pub gas_used: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgLookup {
    pub message: Cid,
    pub receipt: Receipt,
    #[serde(default, rename = "TipSet")]
    pub tipset: Option<Vec<Cid>>,
    #[serde(default)]
    pub height: i64,
}

/// Builds requests for one node and interprets its replies. Holds no locks;
/// callers serialize message submission per sender.
pub struct RpcGateway<T> {
    transport: T,
    ids: RequestIds,
    namespace: String,
}

impl<T: RpcTransport> RpcGateway<T> {
    pub fn new(transport: T) -> Self {
        Self::with_namespace(transport, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(transport: T, namespace: &str) -> Self {
        RpcGateway {
            transport,
            ids: RequestIds::default(),
            namespace: namespace.to_string(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn method_name(&self, method: &str) -> String {
        format!("{}.{}", self.namespace, method)
    }

    /// Allocates an id and builds the envelope without sending it.
    pub fn request(&self, method: &str, params: Value) -> RpcRequest {
        RpcRequest::new(self.method_name(method), params, self.ids.next_id())
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let request = self.request(method, params);
        debug!("Calling {} (id {})", request.method, request.id);
        let body = self.transport.call(&request).await?;
        interpret_response(request.id, body)
    }

    pub async fn state_miner_info(&self, miner: &Address) -> Result<MinerInfo> {
        self.call(STATE_MINER_INFO, json!([miner, []])).await
    }

    /// Resolves an ID address to the key address behind it.
    pub async fn state_account_key(&self, address: &Address) -> Result<Address> {
        self.call(STATE_ACCOUNT_KEY, json!([address, []])).await
    }

    pub async fn state_lookup_id(&self, address: &Address) -> Result<Address> {
        self.call(STATE_LOOKUP_ID, json!([address, []])).await
    }

    pub async fn state_get_actor(&self, actor: &Address) -> Result<ActorState> {
        self.call(STATE_GET_ACTOR, json!([actor, []])).await
    }

    pub async fn mpool_get_nonce(&self, address: &Address) -> Result<u64> {
        self.call(MPOOL_GET_NONCE, json!([address])).await
    }

    pub async fn mpool_push(&self, message: &SignedMessage) -> Result<Cid> {
        self.call(MPOOL_PUSH, json!([message])).await
    }

    pub async fn wallet_balance(&self, address: &Address) -> Result<BigNum> {
        self.call(WALLET_BALANCE, json!([address])).await
    }

    /// Lets the node fill in gas fields, capped at `max_fee`.
    pub async fn gas_estimate_message_gas(
        &self,
        message: &Message,
        max_fee: &BigNum,
    ) -> Result<Message> {
        self.call(
            GAS_ESTIMATE_MESSAGE_GAS,
            json!([message, { "MaxFee": max_fee }, []]),
        )
        .await
    }

    /// Blocks until `cid` is included with `confidence` epochs on top. A
    /// non-zero exit code is an error.
    pub async fn state_wait_msg(&self, cid: &Cid, confidence: u64) -> Result<MsgLookup> {
        let lookup: MsgLookup = self.call(STATE_WAIT_MSG, json!([cid, confidence])).await?;
        if lookup.receipt.exit_code != 0 {
            error!(
                "Message {} failed at height {} with exit code {}",
                cid, lookup.height, lookup.receipt.exit_code
            );
            return Err(PeggyError::MessageFailed {
                cid: cid.to_string(),
                exit_code: lookup.receipt.exit_code,
            });
        }
        info!(
            "Message {} executed at height {} (gas used {})",
            cid, lookup.height, lookup.receipt.gas_used
        );
        Ok(lookup)
    }

    /// Checks that `from` resolves to the owner of `miner`. Returns the miner
    /// info on success and `OwnerMismatch` otherwise.
    pub async fn ensure_owner(&self, miner: &Address, from: &Address) -> Result<MinerInfo> {
        let info = self.state_miner_info(miner).await?;
        let from_id = self.state_lookup_id(from).await?;
        if from_id != info.owner {
            return Err(PeggyError::OwnerMismatch {
                expected: info.owner.to_string(),
                actual: from.to_string(),
            });
        }
        Ok(info)
    }
}
