//! Peggy - account, address and message tooling for Filecoin-style nodes
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Encoding
//! - [`bignum`] - Arbitrary precision token amounts and their byte form
//! - [`address`] - Address codec (ID, secp256k1, actor, BLS, delegated)
//!
//! ## Keys & Accounts
//! - [`crypto`] - Key types, keypairs and bounded key generation
//! - [`keystore`] - Hex/JSON/base64 private key blobs
//! - [`account`] - Account creation and import
//!
//! ## Messages & Node Access
//! - [`message`] - Message construction, gas policy and signing boundary
//! - [`rpc`] - JSON-RPC envelopes and HTTP transport
//! - [`gateway`] - Typed node methods
//! - [`mpool`] - Nonce, balance check, sign and push
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Encoding
// ============================================================================
pub mod address;
pub mod bignum;

// ============================================================================
// Keys & Accounts
// ============================================================================
pub mod account;
pub mod crypto;
pub mod keystore;

// ============================================================================
// Messages & Node Access
// ============================================================================
pub mod gateway;
pub mod message;
pub mod mpool;
pub mod rpc;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
