//! Message submission: fetch nonce, build, check funds, sign, push.
//!
//! Each step runs strictly after the previous one and nothing is retried.
//! The node enforces per-sender nonce order, so two submissions for the same
//! sender must not overlap; that serialization is the caller's job.

use crate::address::Address;
use crate::bignum::BigNum;
use crate::crypto::KeyPair;
use crate::error::{PeggyError, Result};
use crate::gateway::{Cid, MsgLookup, RpcGateway, DEFAULT_CONFIDENCE};
use crate::message::{
    encode_address_param, sign_message, MessageBuilder, MessageSigner,
    METHOD_CHANGE_OWNER_ADDRESS, METHOD_SEND,
};
use crate::rpc::RpcTransport;
use tracing::{error, info, warn};

pub struct MessageSubmitter<'a, T, S: ?Sized> {
    gateway: &'a RpcGateway<T>,
    signer: &'a S,
    builder: &'a MessageBuilder,
}

impl<'a, T, S> MessageSubmitter<'a, T, S>
where
    T: RpcTransport,
    S: MessageSigner + ?Sized,
{
    pub fn new(gateway: &'a RpcGateway<T>, signer: &'a S, builder: &'a MessageBuilder) -> Self {
        MessageSubmitter {
            gateway,
            signer,
            builder,
        }
    }

    pub async fn push(
        &self,
        key: &KeyPair,
        from: &Address,
        to: &Address,
        value: BigNum,
        method: u64,
        params: Vec<u8>,
    ) -> Result<Cid> {
        let nonce = self.gateway.mpool_get_nonce(from).await?;
        let message = self.builder.build(to, from, nonce, value, method, params);

        let required = message.required_funds();
        let balance = self.gateway.wallet_balance(from).await?;
        if balance < required {
            warn!(
                "Account {} balance {} < required {} (value + max gas)",
                from, balance, required
            );
            return Err(PeggyError::InsufficientFunds {
                required: required.to_string(),
                available: balance.to_string(),
            });
        }

        let signed = sign_message(self.signer, message, key).await?;
        match self.gateway.mpool_push(&signed).await {
            Ok(cid) => {
                info!("Pushed message {} from {} nonce {}", cid, from, nonce);
                Ok(cid)
            }
            Err(err) => {
                error!("Push from {} nonce {} failed: {}", from, nonce, err);
                Err(err)
            }
        }
    }

    /// Transfers ownership of `miner` to `new_owner`. Fails with
    /// `OwnerMismatch` before anything is signed if `from` is not the owner.
    pub async fn push_owner_change(
        &self,
        key: &KeyPair,
        from: &Address,
        miner: &Address,
        new_owner: &Address,
    ) -> Result<Cid> {
        self.gateway.ensure_owner(miner, from).await?;

        let params = encode_address_param(new_owner);
        let cid = self
            .push(
                key,
                from,
                miner,
                BigNum::zero(),
                METHOD_CHANGE_OWNER_ADDRESS,
                params,
            )
            .await?;
        info!(
            "Requested owner change of {} to {} ({})",
            miner, new_owner, cid
        );
        Ok(cid)
    }

    /// Owner change followed by a wait for its receipt. Succeeds only once
    /// the message has executed with exit code 0.
    pub async fn push_owner_change_and_wait(
        &self,
        key: &KeyPair,
        from: &Address,
        miner: &Address,
        new_owner: &Address,
    ) -> Result<MsgLookup> {
        let cid = self.push_owner_change(key, from, miner, new_owner).await?;
        self.wait(&cid).await
    }

    pub async fn wait(&self, cid: &Cid) -> Result<MsgLookup> {
        self.gateway.state_wait_msg(cid, DEFAULT_CONFIDENCE).await
    }

    pub async fn push_transfer(
        &self,
        key: &KeyPair,
        from: &Address,
        to: &Address,
        value: BigNum,
    ) -> Result<Cid> {
        self.push(key, from, to, value, METHOD_SEND, Vec::new()).await
    }
}
