//! The signing identity of this process: its seed and its signed token.

use std::path::Path;
use tessera_core::TrustConfig;
use tessera_tokens::claims::{
    parse_client_id_token_unverified, parse_server_token_unverified,
};
use tessera_tokens::{Purpose, SigningKey, token_purpose};

use crate::error::SecurityError;

/// A loaded seed and token, used to sign outgoing requests.
#[derive(Debug, Clone)]
pub struct Credentials {
    identity: String,
    key: SigningKey,
    token: String,
}

impl Credentials {
    /// Load the seed and token named in the configuration.
    ///
    /// The identity is taken from the configuration when set, otherwise from
    /// the token. The token must carry the public key of the seed.
    pub fn load(config: &TrustConfig) -> Result<Self, SecurityError> {
        let problems = Self::validate(config);
        if !problems.is_empty() {
            return Err(SecurityError::Credentials(problems.join(", ")));
        }

        let (Some(seed_file), Some(token_file)) = (&config.seed_file, &config.token_file) else {
            return Err(SecurityError::Credentials(
                "seed and token files are required".to_string(),
            ));
        };

        let key = SigningKey::from_file(seed_file)?;
        let token = read_token(token_file)?;

        let (token_identity, token_key) = match token_purpose(&token) {
            Purpose::ClientId => {
                let claims = parse_client_id_token_unverified(&token)?;
                (claims.caller_id, claims.standard.public_key)
            }
            Purpose::Server => {
                let claims = parse_server_token_unverified(&token)?;
                (claims.identity, claims.standard.public_key)
            }
            purpose => {
                return Err(SecurityError::Credentials(format!(
                    "cannot sign requests using a {purpose} token"
                )));
            }
        };

        let seed_key = key
            .verifying_key()
            .map(|k| hex::encode(k.as_bytes()))
            .unwrap_or_default();
        if seed_key.is_empty() || seed_key != token_key {
            return Err(SecurityError::Credentials(format!(
                "the seed in {} does not match the public key in the token",
                seed_file.display()
            )));
        }

        let identity = config.identity.clone().unwrap_or(token_identity);
        tracing::debug!(identity = %identity, token = %token_file.display(), "Loaded signing credentials");

        Ok(Self {
            identity,
            key,
            token,
        })
    }

    /// List what is missing from the configuration to load credentials.
    pub fn validate(config: &TrustConfig) -> Vec<String> {
        let mut problems = Vec::new();

        if config.token_file.is_none() {
            problems.push("the path to the JWT token is not configured".to_string());
        }
        if config.seed_file.is_none() {
            problems.push("the path to the ed25519 seed is not configured".to_string());
        }

        problems
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The token to present alongside signed requests.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Sign a request payload.
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SecurityError> {
        Ok(self.key.sign(payload)?)
    }
}

fn read_token(path: &Path) -> Result<String, SecurityError> {
    std::fs::read_to_string(path)
        .map(|t| t.trim().to_string())
        .map_err(|source| SecurityError::Io {
            path: path.to_path_buf(),
            source,
        })
}
