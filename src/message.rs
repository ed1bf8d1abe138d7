//! Ledger messages, their parameter encoding, and the signing boundary.

use crate::address::Address;
use crate::bignum::BigNum;
use crate::crypto::{KeyPair, KeyType};
use crate::error::{PeggyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Plain value transfer.
pub const METHOD_SEND: u64 = 0;
/// Miner actor `ChangeOwnerAddress`.
pub const METHOD_CHANGE_OWNER_ADDRESS: u64 = 23;

pub const MESSAGE_VERSION: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    pub version: u64,
    pub to: Address,
    pub from: Address,
    pub nonce: u64,
    pub value: BigNum,
    pub gas_limit: i64,
    pub gas_fee_cap: BigNum,
    pub gas_premium: BigNum,
    pub method: u64,
    #[serde(with = "base64_bytes")]
    pub params: Vec<u8>,
}

impl Message {
    /// Balance the sender needs for this message to be accepted:
    /// `value + gas_fee_cap * gas_limit`.
    pub fn required_funds(&self) -> BigNum {
        &self.gas_fee_cap.mul_gas(self.gas_limit) + &self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SignatureType {
    Secp256k1 = 1,
    Bls = 2,
}

impl From<SignatureType> for u8 {
    fn from(value: SignatureType) -> u8 {
        value as u8
    }
}

impl TryFrom<u8> for SignatureType {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(SignatureType::Secp256k1),
            2 => Ok(SignatureType::Bls),
            other => Err(format!("unknown signature type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(rename = "Type")]
    pub sig_type: SignatureType,
    #[serde(rename = "Data", with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Signature,
}

/// Gas envelope applied to every built message. Comes from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPolicy {
    pub gas_limit: i64,
    pub gas_fee_cap: BigNum,
    pub gas_premium: BigNum,
}

impl Default for GasPolicy {
    fn default() -> Self {
        GasPolicy {
            gas_limit: 32_932_877,
            gas_fee_cap: BigNum::from_u64(101_137),
            gas_premium: BigNum::from_u64(100_083),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    gas: GasPolicy,
}

impl MessageBuilder {
    pub fn new(gas: GasPolicy) -> Self {
        MessageBuilder { gas }
    }

    pub fn gas_policy(&self) -> &GasPolicy {
        &self.gas
    }

    pub fn build(
        &self,
        to: &Address,
        from: &Address,
        nonce: u64,
        value: BigNum,
        method: u64,
        params: Vec<u8>,
    ) -> Message {
        Message {
            version: MESSAGE_VERSION,
            to: to.clone(),
            from: from.clone(),
            nonce,
            value,
            gas_limit: self.gas.gas_limit,
            gas_fee_cap: self.gas.gas_fee_cap.clone(),
            gas_premium: self.gas.gas_premium.clone(),
            method,
            params,
        }
    }

    /// Asks `miner` to hand ownership to `new_owner`. `from` must be the
    /// current owner and `nonce` its current on-chain nonce.
    pub fn build_owner_change_message(
        &self,
        miner: &Address,
        from: &Address,
        nonce: u64,
        new_owner: &Address,
    ) -> Message {
        self.build(
            miner,
            from,
            nonce,
            BigNum::zero(),
            METHOD_CHANGE_OWNER_ADDRESS,
            encode_address_param(new_owner),
        )
    }

    pub fn build_transfer(
        &self,
        to: &Address,
        from: &Address,
        nonce: u64,
        value: BigNum,
    ) -> Message {
        self.build(to, from, nonce, value, METHOD_SEND, Vec::new())
    }
}

/// Single-address parameter: a length-prefixed byte string whose contents
/// are `protocol ‖ payload`.
pub fn encode_address_param(address: &Address) -> Vec<u8> {
    let bytes = address.to_bytes();
    let len = bytes.len();
    let mut out = Vec::with_capacity(len + 3);
    if len < 24 {
        out.push(0x40 | len as u8);
    } else if len < 256 {
        out.push(0x58);
        out.push(len as u8);
    } else {
        out.push(0x59);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(&bytes);
    out
}

/// External signing provider. Implementations own the signature algorithm.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    async fn sign(&self, message: &Message, key: &KeyPair) -> Result<Signature>;
}

/// Signs exactly once. Provider failures become `SigningFailed` and are not
/// retried: re-signing with a stale nonce can duplicate intent.
pub async fn sign_message<S>(signer: &S, message: Message, key: &KeyPair) -> Result<SignedMessage>
where
    S: MessageSigner + ?Sized,
{
    if key.key_type() != KeyType::Secp256k1 {
        return Err(PeggyError::UnsupportedKeyType(key.key_type().to_string()));
    }
    match signer.sign(&message, key).await {
        Ok(signature) => {
            info!(
                "Signed message from {} nonce {} method {}",
                message.from, message.nonce, message.method
            );
            Ok(SignedMessage { message, signature })
        }
        Err(err) => {
            error!(
                "Signing message from {} nonce {} failed: {}",
                message.from, message.nonce, err
            );
            Err(match err {
                PeggyError::SigningFailed(msg) => PeggyError::SigningFailed(msg),
                other => PeggyError::SigningFailed(other.to_string()),
            })
        }
    }
}

/// Byte fields travel as standard base64 strings; `null` reads as empty.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
