//! # tessera-security
//!
//! Request signature verification for Tessera.
//!
//! This crate provides functionality for:
//! - Building the set of trusted token signers from configuration
//! - Verifying payload signatures made by token holders
//! - Verifying signatures made by delegates on behalf of other clients
//! - Loading this process's own seed and token to sign requests
//!
//! ## Trust Store
//!
//! Trusted keys are either signers that sign tokens directly or named
//! organization issuers at the root of trust chains. The store is built once
//! and shared as an `Arc<TrustStore>`; verification never mutates it.

pub mod authenticator;
pub mod credentials;
pub mod error;
pub mod trust;

pub use authenticator::{Authenticator, Denial, Principal, caller_identity};
pub use credentials::Credentials;
pub use error::SecurityError;
pub use trust::{TrustAnchor, TrustStore};
