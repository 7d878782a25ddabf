//! Key material for signing and verifying tokens.

use crate::error::KeyError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use std::fmt;
use std::path::Path;

/// Length of an ed25519 seed or public key.
pub const ED25519_KEY_LENGTH: usize = 32;

/// A key that can sign tokens and request payloads.
///
/// The variant is fixed when the key is constructed, so every later signing
/// operation dispatches on it rather than inspecting key bytes.
#[derive(Clone)]
pub enum SigningKey {
    /// Signs with EdDSA.
    Ed25519(ed25519_dalek::SigningKey),

    /// Signs with RS256, RS384 or RS512.
    Rsa {
        key: EncodingKey,
        algorithm: Algorithm,
    },
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningKey::Ed25519(key) => f
                .debug_tuple("Ed25519")
                .field(&hex::encode(key.verifying_key().as_bytes()))
                .finish(),
            SigningKey::Rsa { algorithm, .. } => {
                f.debug_struct("Rsa").field("algorithm", algorithm).finish()
            }
        }
    }
}

impl SigningKey {
    /// Generate a new random ed25519 key.
    pub fn generate_ed25519() -> Self {
        SigningKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Create an ed25519 key from a 32 byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let seed: [u8; ED25519_KEY_LENGTH] =
            seed.try_into().map_err(|_| KeyError::InvalidLength {
                expected: ED25519_KEY_LENGTH,
                got: seed.len(),
            })?;

        Ok(SigningKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(
            &seed,
        )))
    }

    /// Create an ed25519 key from a hex-encoded seed.
    pub fn from_seed_hex(seed: &str) -> Result<Self, KeyError> {
        Self::from_seed(&hex::decode(seed.trim())?)
    }

    /// Create an RSA key from PEM, signing with one of the RS algorithms.
    pub fn from_rsa_pem(pem: &[u8], algorithm: Algorithm) -> Result<Self, KeyError> {
        if !matches!(
            algorithm,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(KeyError::UnsupportedAlgorithm(algorithm));
        }

        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;

        Ok(SigningKey::Rsa { key, algorithm })
    }

    /// Load a key from a file holding either a hex seed or an RSA PEM key.
    ///
    /// RSA keys loaded this way sign with RS256.
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim_start().starts_with("-----BEGIN") {
            Self::from_rsa_pem(content.as_bytes(), Algorithm::RS256)
        } else {
            Self::from_seed_hex(&content)
        }
    }

    /// The JWT algorithm used when signing tokens with this key.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            SigningKey::Ed25519(_) => Algorithm::EdDSA,
            SigningKey::Rsa { algorithm, .. } => *algorithm,
        }
    }

    /// The ed25519 public key, RSA keys have none usable in trust chains.
    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        match self {
            SigningKey::Ed25519(key) => Some(key.verifying_key()),
            SigningKey::Rsa { .. } => None,
        }
    }

    /// Sign arbitrary bytes.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            SigningKey::Ed25519(key) => Ok(key.sign(data).to_bytes().to_vec()),
            SigningKey::Rsa { key, algorithm } => {
                let encoded = jsonwebtoken::crypto::sign(data, key, *algorithm)
                    .map_err(|e| KeyError::SigningFailed(e.to_string()))?;
                URL_SAFE_NO_PAD
                    .decode(encoded)
                    .map_err(|e| KeyError::SigningFailed(e.to_string()))
            }
        }
    }

    pub(crate) fn encoding_key(&self) -> Result<EncodingKey, KeyError> {
        match self {
            SigningKey::Ed25519(key) => {
                let der = key
                    .to_pkcs8_der()
                    .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
                Ok(EncodingKey::from_ed_der(der.as_bytes()))
            }
            SigningKey::Rsa { key, .. } => Ok(key.clone()),
        }
    }
}

/// A key trusted to verify token envelopes.
#[derive(Clone)]
pub enum PublicKey {
    /// Verifies EdDSA tokens and trust chains.
    Ed25519(VerifyingKey),

    /// Verifies RS256, RS384 and RS512 tokens.
    Rsa(DecodingKey),
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKey::Ed25519(key) => f
                .debug_tuple("Ed25519")
                .field(&hex::encode(key.as_bytes()))
                .finish(),
            PublicKey::Rsa(_) => f.write_str("Rsa"),
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKey::Ed25519(key) => write!(f, "{}", hex::encode(key.as_bytes())),
            PublicKey::Rsa(_) => f.write_str("rsa public key"),
        }
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        PublicKey::Ed25519(key)
    }
}

impl PublicKey {
    /// Parse a hex-encoded ed25519 public key.
    pub fn from_hex(key: &str) -> Result<Self, KeyError> {
        Ok(PublicKey::Ed25519(decode_ed25519_public_key(key)?))
    }

    /// Parse a PEM encoded RSA public key.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, KeyError> {
        DecodingKey::from_rsa_pem(pem)
            .map(PublicKey::Rsa)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
    }

    /// Parse either a PEM encoded RSA key or a hex ed25519 key.
    pub fn parse(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        if text.starts_with("-----BEGIN") {
            Self::from_rsa_pem(text.as_bytes())
        } else {
            Self::from_hex(text)
        }
    }

    /// Load a key from a file holding either a hex ed25519 key or an RSA PEM
    /// public key.
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn as_ed25519(&self) -> Option<&VerifyingKey> {
        match self {
            PublicKey::Ed25519(key) => Some(key),
            PublicKey::Rsa(_) => None,
        }
    }

    pub(crate) fn decoding_key(&self) -> Result<DecodingKey, KeyError> {
        match self {
            PublicKey::Ed25519(key) => {
                DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(key.as_bytes()))
                    .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
            }
            PublicKey::Rsa(key) => Ok(key.clone()),
        }
    }

    pub(crate) fn algorithms(&self) -> Vec<Algorithm> {
        match self {
            PublicKey::Ed25519(_) => vec![Algorithm::EdDSA],
            PublicKey::Rsa(_) => vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512],
        }
    }
}

/// Decode a hex ed25519 public key, which must be exactly 32 bytes.
pub fn decode_ed25519_public_key(key: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = hex::decode(key.trim())?;
    let bytes: [u8; ED25519_KEY_LENGTH] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidLength {
                expected: ED25519_KEY_LENGTH,
                got: bytes.len(),
            })?;

    VerifyingKey::from_bytes(&bytes).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}

/// Verify an ed25519 signature, malformed signatures simply do not verify.
pub fn ed25519_verify(key: &VerifyingKey, data: &[u8], signature: &[u8]) -> bool {
    match Signature::from_slice(signature) {
        Ok(signature) => key.verify(data, &signature).is_ok(),
        Err(_) => false,
    }
}
