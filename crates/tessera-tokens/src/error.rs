//! Error types for the tokens crate.

use crate::claims::Purpose;
use thiserror::Error;

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Claims failed validation while being created.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Key material could not be used.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Failed to sign a token.
    #[error("could not sign token: {0}")]
    TokenCreationFailed(String),

    /// The token is not a well formed JWT.
    #[error("could not parse token: {0}")]
    TokenParseFailed(String),

    /// The token was signed with an algorithm the key can not verify.
    #[error("unsupported signing method in token")]
    UnsupportedAlgorithm,

    /// The envelope signature did not verify.
    #[error("token verification failed: {0}")]
    VerificationFailed(String),

    /// The token itself has expired.
    #[error("token has expired")]
    TokenExpired,

    /// The delegate that issued the token has expired.
    #[error("token issuer has expired")]
    IssuerExpired,

    /// The token is well formed but not of the expected kind.
    #[error("not a {expected} token")]
    PurposeMismatch { expected: Purpose, actual: Purpose },

    /// The trust chain is malformed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The trust chain is well formed but was not signed by the trusted issuer.
    #[error("token is not signed by the trusted issuer")]
    NotTrusted,

    /// Failed to serialize or deserialize claims.
    #[error("token serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error (reading keys, writing tokens).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TokenError {
    /// Whether this is an expected rejection of untrusted input rather than
    /// malformed input or misuse.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TokenError::VerificationFailed(_)
                | TokenError::TokenExpired
                | TokenError::IssuerExpired
                | TokenError::NotTrusted
        )
    }
}

/// Structural problems with chain of trust data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("no issuer set")]
    NoIssuer,

    #[error("no public key set")]
    NoPublicKey,

    #[error("no trust chain signature set")]
    NoTrustChainSignature,

    #[error("no token id set")]
    NoTokenId,

    #[error("id not set")]
    IdNotSet,

    #[error("public key not set")]
    PublicKeyNotSet,

    #[error("issuer not set")]
    IssuerNotSet,

    #[error("invalid issuer prefix")]
    InvalidIssuerPrefix,

    #[error("invalid issuer data")]
    InvalidIssuerData,

    #[error("invalid issuer content")]
    InvalidIssuerContent,

    #[error("invalid id in issuer")]
    InvalidIssuerId,

    #[error("invalid public key in issuer")]
    MissingIssuerPublicKey,

    #[error("invalid public key in issuer data")]
    InvalidIssuerPublicKey,

    #[error("public keys do not match")]
    KeyMismatch,

    #[error("no issuer expires set")]
    NoIssuerExpiry,

    #[error("unsupported issuer format")]
    UnsupportedIssuer,

    #[error("invalid trust chain signature")]
    MalformedTrustChain,

    #[error("invalid trust chain signature: {0}")]
    TrustChainEncoding(hex::FromHexError),

    #[error("invalid signature in chain signature: {0}")]
    ChainSignatureEncoding(hex::FromHexError),

    #[error("trust chains can only be verified with ed25519 keys")]
    UnsupportedKeyType,
}

/// Errors from loading or using key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected {expected} key bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("failed to parse public key: {0}")]
    InvalidPublicKey(String),

    #[error("failed to parse private key: {0}")]
    InvalidPrivateKey(String),

    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("could not read key file: {0}")]
    IoError(#[from] std::io::Error),
}
