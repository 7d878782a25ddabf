//! The set of keys trusted to issue tokens.

use tessera_core::{TrustConfig, TrustModel};
use tessera_tokens::PublicKey;

use crate::error::SecurityError;

/// A key trusted to sign tokens, either directly or as an organization issuer.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    /// Name used when logging, the issuer name or the key itself.
    pub name: String,
    pub key: PublicKey,
}

/// Immutable set of trust anchors, built once at startup and shared between
/// verifiers.
#[derive(Debug, Clone)]
pub struct TrustStore {
    anchors: Vec<TrustAnchor>,
}

impl TrustStore {
    /// Create a store from anchors, at least one is required.
    pub fn new(anchors: Vec<TrustAnchor>) -> Result<Self, SecurityError> {
        if anchors.is_empty() {
            return Err(SecurityError::EmptyTrustStore);
        }

        Ok(Self { anchors })
    }

    /// Build the store from configuration, failing if any key can not be
    /// read or parsed.
    pub fn from_config(config: &TrustConfig) -> Result<Self, SecurityError> {
        Self::from_model(config.resolve_trust_model()?)
    }

    pub fn from_model(model: TrustModel) -> Result<Self, SecurityError> {
        let anchors = match model {
            TrustModel::Signers(keys) => keys
                .iter()
                .enumerate()
                .map(|(index, text)| {
                    let key = PublicKey::parse(text).map_err(|source| {
                        SecurityError::TrustedKey {
                            name: format!("token signer {index}"),
                            source,
                        }
                    })?;

                    let name = match &key {
                        PublicKey::Ed25519(_) => key.to_string(),
                        PublicKey::Rsa(_) => format!("token signer {index}"),
                    };

                    Ok(TrustAnchor { name, key })
                })
                .collect::<Result<Vec<_>, SecurityError>>()?,

            // chains are ed25519 only, so issuers must be ed25519 keys
            TrustModel::Issuers(issuers) => issuers
                .into_iter()
                .map(|(name, text)| match PublicKey::from_hex(&text) {
                    Ok(key) => Ok(TrustAnchor { name, key }),
                    Err(source) => Err(SecurityError::TrustedKey { name, source }),
                })
                .collect::<Result<Vec<_>, SecurityError>>()?,
        };

        tracing::info!(anchors = anchors.len(), "Loaded trusted token signers");

        Self::new(anchors)
    }

    pub fn anchors(&self) -> &[TrustAnchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
