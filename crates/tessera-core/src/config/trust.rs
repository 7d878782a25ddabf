//! Trusted token signer configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::ConfigError;

/// Configuration for token verification and signing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrustConfig {
    /// Identity of this process, used when no token is available to derive it.
    #[serde(default)]
    pub identity: Option<String>,

    /// Path to the ed25519 seed used to sign requests.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,

    /// Path to the signed token presented by this process.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Hex-encoded ed25519 public keys allowed to sign tokens.
    #[serde(default)]
    pub token_signers: Vec<String>,

    /// Environment variable holding comma separated hex signer keys.
    #[serde(default)]
    pub token_signers_env: Option<String>,

    /// Files holding a hex ed25519 public key or a PEM encoded RSA public key.
    #[serde(default)]
    pub token_signer_files: Vec<PathBuf>,

    /// Organization issuers by name, hex-encoded ed25519 public keys.
    #[serde(default)]
    pub issuers: BTreeMap<String, String>,
}

/// The resolved trust model, with all key material read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustModel {
    /// Keys that sign tokens directly, hex or PEM text.
    Signers(Vec<String>),

    /// Named organization issuers, hex text.
    Issuers(BTreeMap<String, String>),
}

impl TrustConfig {
    fn has_signers(&self) -> bool {
        !self.token_signers.is_empty()
            || self.token_signers_env.is_some()
            || !self.token_signer_files.is_empty()
    }

    /// Resolve the configured trust model, reading every key file.
    ///
    /// Any unreadable file or unset signer variable fails the whole
    /// resolution so a verifier never starts with a partial set of trusted
    /// keys.
    pub fn resolve_trust_model(&self) -> Result<TrustModel, ConfigError> {
        if !self.issuers.is_empty() {
            if self.has_signers() {
                return Err(ConfigError::Config(
                    "token signers and issuers are mutually exclusive".to_string(),
                ));
            }

            return Ok(TrustModel::Issuers(
                self.issuers
                    .iter()
                    .map(|(name, key)| (name.clone(), key.trim().to_string()))
                    .collect(),
            ));
        }

        let mut keys: Vec<String> = self
            .token_signers
            .iter()
            .map(|k| k.trim().to_string())
            .collect();

        if let Some(env_var) = &self.token_signers_env {
            let value = std::env::var(env_var)
                .map_err(|_| ConfigError::Config(format!("{env_var} is not set")))?;
            keys.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        }

        for path in &self.token_signer_files {
            let key = std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
                path: path.clone(),
                source,
            })?;
            keys.push(key.trim().to_string());
        }

        keys.retain(|k| !k.is_empty());

        if keys.is_empty() {
            return Err(ConfigError::Config(
                "no trusted token signers or issuers configured".to_string(),
            ));
        }

        Ok(TrustModel::Signers(keys))
    }
}
