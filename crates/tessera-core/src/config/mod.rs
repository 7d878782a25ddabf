//! Configuration types for Tessera verifiers and issuers.
//!
//! Configuration is loaded from a YAML file, typically `tessera.yaml`:
//!
//! ```yaml
//! identity: node1.example.net
//! seed_file: /etc/tessera/node1.seed
//! token_file: /etc/tessera/node1.jwt
//! token_signers:
//!   - 1b0ec9...e4a2
//! token_signer_files:
//!   - keys/provisioner.pem
//! ```
//!
//! `issuers` may be used instead of the signer settings, never together with them.

pub mod trust;

use std::fs;
use std::path::{Path, PathBuf};

pub use trust::{TrustConfig, TrustModel};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrustConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and make every file reference absolute.
    ///
    /// Relative paths are resolved against the directory holding the
    /// configuration file.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let absolute = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        };

        config.seed_file = config.seed_file.as_ref().map(absolute);
        config.token_file = config.token_file.as_ref().map(absolute);
        config.token_signer_files = config.token_signer_files.iter().map(absolute).collect();

        Ok(config)
    }
}
