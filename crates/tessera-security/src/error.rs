//! Error types for the security crate.

use std::path::PathBuf;
use tessera_core::ConfigError;
use tessera_tokens::{KeyError, TokenError};
use thiserror::Error;

/// Errors from building the trust store or handling credentials.
///
/// Requests that are merely not authorized are reported as a
/// [`Denial`](crate::Denial) instead.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured trusted key could not be parsed.
    #[error("invalid trusted key {name}: {source}")]
    TrustedKey { name: String, source: KeyError },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// The caller presented the wrong number of tokens.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("could not find a valid caller identity name in {0}")]
    InvalidCallerId(String),

    #[error("no trusted token signers configured")]
    EmptyTrustStore,

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Credentials error: {0}")]
    Credentials(String),
}
