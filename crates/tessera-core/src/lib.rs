//! Configuration types shared across all Tessera crates.
//!
//! Verifiers are configured with exactly one trust model: either a flat list
//! of trusted token signer keys, or a named map of organization issuers.

pub mod config;

pub use config::{ConfigError, TrustConfig, TrustModel};
