//! Ledger addresses: derivation from public keys and the textual codec.
//!
//! Text form is `<network><protocol><body>`. For key and actor addresses the
//! body is lowercase unpadded RFC4648 base32 of `payload ‖ checksum`, where
//! the checksum is a 4-byte BLAKE2b digest over `protocol ‖ payload`. ID
//! addresses carry the decimal actor id instead and have no checksum.

use crate::error::{PeggyError, Result};
use blake2::digest::consts::{U20, U4};
use blake2::{Blake2b, Digest};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

type Blake2b160 = Blake2b<U20>;
type Blake2b32 = Blake2b<U4>;

/// Size of an uncompressed secp256k1 public key.
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;
/// Payload size for secp256k1 and actor addresses.
pub const PAYLOAD_HASH_LEN: usize = 20;
/// Payload size for BLS addresses (a raw BLS public key).
pub const BLS_PUBLIC_KEY_LEN: usize = 48;
/// Maximum sub-address size for delegated addresses.
pub const MAX_SUBADDRESS_LEN: usize = 54;
pub const CHECKSUM_LEN: usize = 4;

const MAX_ID_DIGITS: usize = 20;
const MAX_ADDRESS_TEXT_LEN: usize = 116;
const BASE32_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz234567";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn prefix(self) -> char {
        match self {
            Network::Mainnet => 'f',
            Network::Testnet => 't',
        }
    }

    fn from_prefix(c: char) -> Result<Self> {
        match c {
            'f' => Ok(Network::Mainnet),
            't' => Ok(Network::Testnet),
            other => Err(PeggyError::InvalidAddress(format!(
                "unknown network prefix '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Id = 0,
    Secp256k1 = 1,
    Actor = 2,
    Bls = 3,
    Delegated = 4,
}

impl Protocol {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn digit(self) -> char {
        (b'0' + self.as_u8()) as char
    }
}

impl TryFrom<u8> for Protocol {
    type Error = PeggyError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Protocol::Id),
            1 => Ok(Protocol::Secp256k1),
            2 => Ok(Protocol::Actor),
            3 => Ok(Protocol::Bls),
            4 => Ok(Protocol::Delegated),
            other => Err(PeggyError::InvalidAddress(format!(
                "unknown protocol {}",
                other
            ))),
        }
    }
}

/// A parsed, validated address. The checksum is always recomputed from
/// `protocol ‖ payload` and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    protocol: Protocol,
    payload: Vec<u8>,
}

impl Address {
    /// Derives a secp256k1 key address from a 65-byte uncompressed public key.
    pub fn from_public_key(public_key: &[u8], network: Network) -> Result<Self> {
        if public_key.len() != UNCOMPRESSED_PUBLIC_KEY_LEN {
            return Err(PeggyError::InvalidAddress(format!(
                "public key must be {} bytes (uncompressed), got {}",
                UNCOMPRESSED_PUBLIC_KEY_LEN,
                public_key.len()
            )));
        }
        Ok(Address {
            network,
            protocol: Protocol::Secp256k1,
            payload: Blake2b160::digest(public_key).to_vec(),
        })
    }

    pub fn new_id(id: u64, network: Network) -> Self {
        Address {
            network,
            protocol: Protocol::Id,
            payload: encode_uvarint(id),
        }
    }

    pub fn new_delegated(namespace: u64, subaddress: &[u8], network: Network) -> Result<Self> {
        if subaddress.len() > MAX_SUBADDRESS_LEN {
            return Err(PeggyError::InvalidAddress(format!(
                "sub-address is {} bytes, at most {} allowed",
                subaddress.len(),
                MAX_SUBADDRESS_LEN
            )));
        }
        let mut payload = encode_uvarint(namespace);
        payload.extend_from_slice(subaddress);
        Ok(Address {
            network,
            protocol: Protocol::Delegated,
            payload,
        })
    }

    /// Builds an address from its parts, enforcing the per-protocol payload shape.
    pub fn new(network: Network, protocol: Protocol, payload: Vec<u8>) -> Result<Self> {
        validate_payload(protocol, &payload)?;
        Ok(Address {
            network,
            protocol,
            payload,
        })
    }

    /// Decodes the binary form `protocol ‖ payload`.
    pub fn from_bytes(bytes: &[u8], network: Network) -> Result<Self> {
        let (&protocol, payload) = bytes
            .split_first()
            .ok_or_else(|| PeggyError::InvalidAddress("empty address bytes".to_string()))?;
        Address::new(network, Protocol::try_from(protocol)?, payload.to_vec())
    }

    pub fn parse(text: &str) -> Result<Self> {
        text.parse()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Binary form: protocol byte followed by the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 1);
        out.push(self.protocol.as_u8());
        out.extend_from_slice(&self.payload);
        out
    }

    /// The derived checksum; ID addresses have none.
    pub fn checksum(&self) -> Option<[u8; CHECKSUM_LEN]> {
        match self.protocol {
            Protocol::Id => None,
            _ => Some(checksum(&self.to_bytes())),
        }
    }

    /// Actor id for protocol-0 addresses.
    pub fn id(&self) -> Option<u64> {
        match self.protocol {
            Protocol::Id => decode_uvarint(&self.payload).map(|(id, _)| id),
            _ => None,
        }
    }

    pub fn with_network(&self, network: Network) -> Self {
        Address {
            network,
            ..self.clone()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.network.prefix(), self.protocol.digit())?;
        match self.protocol {
            Protocol::Id => {
                let id = decode_uvarint(&self.payload).map(|(id, _)| id).unwrap_or(0);
                write!(f, "{}", id)
            }
            Protocol::Secp256k1 | Protocol::Actor | Protocol::Bls => {
                write!(f, "{}", encode_body(&self.payload, &self.to_bytes()))
            }
            Protocol::Delegated => {
                let (namespace, used) = decode_uvarint(&self.payload).unwrap_or((0, 0));
                write!(
                    f,
                    "{}f{}",
                    namespace,
                    encode_body(&self.payload[used..], &self.to_bytes())
                )
            }
        }
    }
}

impl FromStr for Address {
    type Err = PeggyError;

    fn from_str(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(PeggyError::InvalidAddress(
                "address must be ASCII".to_string(),
            ));
        }
        if text.len() < 3 || text.len() > MAX_ADDRESS_TEXT_LEN {
            return Err(PeggyError::InvalidAddress(format!(
                "address length {} out of range",
                text.len()
            )));
        }

        let bytes = text.as_bytes();
        let network = Network::from_prefix(bytes[0] as char)?;
        let protocol = match bytes[1] {
            d @ b'0'..=b'9' => Protocol::try_from(d - b'0')?,
            other => {
                return Err(PeggyError::InvalidAddress(format!(
                    "protocol must be a digit, got '{}'",
                    other as char
                )))
            }
        };
        let body = &text[2..];

        let payload = match protocol {
            Protocol::Id => encode_uvarint(parse_decimal_u64(body)?),
            Protocol::Secp256k1 | Protocol::Actor | Protocol::Bls => {
                let raw = decode_base32(body)?;
                split_and_verify(protocol, &[], &raw)?
            }
            Protocol::Delegated => {
                let (namespace, sub) = body.split_once('f').ok_or_else(|| {
                    PeggyError::InvalidAddress("delegated address missing separator".to_string())
                })?;
                let prefix = encode_uvarint(parse_decimal_u64(namespace)?);
                let raw = decode_base32(sub)?;
                split_and_verify(protocol, &prefix, &raw)?
            }
        };

        Address::new(network, protocol, payload)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// 4-byte BLAKE2b digest over `protocol ‖ payload`.
pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Blake2b32::digest(data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest);
    out
}

fn encode_body(tail: &[u8], checksummed: &[u8]) -> String {
    let mut raw = tail.to_vec();
    raw.extend_from_slice(&checksum(checksummed));
    BASE32_NOPAD.encode(&raw).to_ascii_lowercase()
}

fn decode_base32(body: &str) -> Result<Vec<u8>> {
    if body.is_empty() || !body.chars().all(|c| BASE32_ALPHABET.contains(c)) {
        return Err(PeggyError::InvalidAddress(
            "body is not lowercase base32".to_string(),
        ));
    }
    BASE32_NOPAD
        .decode(body.to_ascii_uppercase().as_bytes())
        .map_err(|e| PeggyError::InvalidAddress(format!("base32 decode failed: {}", e)))
}

/// Splits `raw` into the payload tail and checksum and verifies the checksum
/// over `protocol ‖ prefix ‖ tail`. Returns the full payload.
fn split_and_verify(protocol: Protocol, prefix: &[u8], raw: &[u8]) -> Result<Vec<u8>> {
    // Delegated addresses may have an empty sub-address; payload shape is
    // checked per protocol below.
    if raw.len() < CHECKSUM_LEN {
        return Err(PeggyError::InvalidAddress(
            "address body too short".to_string(),
        ));
    }
    let (tail, sum) = raw.split_at(raw.len() - CHECKSUM_LEN);

    let mut payload = prefix.to_vec();
    payload.extend_from_slice(tail);
    validate_payload(protocol, &payload)?;

    let mut checksummed = vec![protocol.as_u8()];
    checksummed.extend_from_slice(&payload);
    if checksum(&checksummed) != sum {
        return Err(PeggyError::ChecksumMismatch);
    }
    Ok(payload)
}

fn validate_payload(protocol: Protocol, payload: &[u8]) -> Result<()> {
    let ok = match protocol {
        Protocol::Id => matches!(decode_uvarint(payload), Some((_, n)) if n == payload.len()),
        Protocol::Secp256k1 | Protocol::Actor => payload.len() == PAYLOAD_HASH_LEN,
        Protocol::Bls => payload.len() == BLS_PUBLIC_KEY_LEN,
        Protocol::Delegated => matches!(
            decode_uvarint(payload),
            Some((_, n)) if payload.len() - n <= MAX_SUBADDRESS_LEN
        ),
    };
    if ok {
        Ok(())
    } else {
        Err(PeggyError::InvalidAddress(format!(
            "invalid payload of {} bytes for protocol {}",
            payload.len(),
            protocol.as_u8()
        )))
    }
}

/// Decimal digits only, no leading zeros, fits in u64.
fn parse_decimal_u64(text: &str) -> Result<u64> {
    let canonical = !text.is_empty()
        && text.len() <= MAX_ID_DIGITS
        && text.bytes().all(|b| b.is_ascii_digit())
        && (text == "0" || !text.starts_with('0'));
    if !canonical {
        return Err(PeggyError::InvalidAddress(format!(
            "'{}' is not a canonical decimal id",
            text
        )));
    }
    text.parse::<u64>()
        .map_err(|e| PeggyError::InvalidAddress(format!("id out of range: {}", e)))
}

fn encode_uvarint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Minimal-form LEB128 decode; returns the value and the bytes consumed.
fn decode_uvarint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate().take(10) {
        let bits = u64::from(byte & 0x7f);
        if i == 9 && bits > 1 {
            return None;
        }
        value |= bits << (7 * i);
        if byte & 0x80 == 0 {
            // Trailing zero groups are not minimal.
            if i > 0 && byte == 0 {
                return None;
            }
            return Some((value, i + 1));
        }
    }
    None
}
