//! # tessera-tokens
//!
//! Signed fleet tokens for Tessera.
//!
//! This crate provides functionality for:
//! - Describing clients, servers and provisioning identities as claims
//! - Signing claims as compact JWTs with ed25519 or RSA keys
//! - Parsing and verifying tokens, including their purpose and lifetime
//! - Building and verifying organization trust chains
//!
//! ## Two-Signature Model
//!
//! Every token carries two independent signatures:
//!
//! | Signature | Made By | Proves |
//! |-----------|---------|--------|
//! | **Envelope** | Token issuer | The token was not altered on the wire |
//! | **Trust chain** (`tcs`) | Organization issuer or delegate | The issuer was allowed to issue it |
//!
//! A token issued by an organization issuer has `iss` set to `I-<issuer key>`,
//! one issued by a delegate has `iss` set to `C-<delegate id>.<delegate key>`.

pub mod chain;
pub mod claims;
pub mod codec;
pub mod error;
pub mod keys;

pub use chain::{CHAIN_ISSUER_PREFIX, ChainIssuer, ORG_ISSUER_PREFIX, TrustChain};
pub use claims::{
    ClientIdClaims, ClientPermissions, Claims, ProvisioningClaims, Purpose, ServerClaims,
    ServerPermissions, StandardClaims,
};
pub use codec::{
    parse_token, parse_token_unverified, save_token, sign_and_save_token, sign_token,
    token_purpose,
};
pub use error::{ChainError, KeyError, TokenError};
pub use keys::{PublicKey, SigningKey};
