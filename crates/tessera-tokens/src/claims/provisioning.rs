//! Claims carrying bootstrap settings for nodes that are not enrolled yet.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Claims, Purpose, StandardClaims};
use crate::codec::{parse_token, parse_token_unverified};
use crate::error::TokenError;
use crate::keys::PublicKey;

/// Provisioning settings, carrying `choria_provisioning` purpose.
///
/// The subject is also set to the purpose so older parsers recognise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningClaims {
    /// Token presented to the provisioner.
    #[serde(rename = "cht", default)]
    pub token: String,

    /// Whether to connect to the provisioning broker using TLS.
    #[serde(rename = "chs", default)]
    pub secure: bool,

    /// Comma separated broker URLs.
    #[serde(rename = "chu", default, skip_serializing_if = "String::is_empty")]
    pub urls: String,

    #[serde(rename = "chsrv", default, skip_serializing_if = "String::is_empty")]
    pub srv_domain: String,

    /// Whether nodes enter provisioning mode by default.
    #[serde(rename = "chpd", default)]
    pub provision_by_default: bool,

    #[serde(rename = "chrd", default, skip_serializing_if = "String::is_empty")]
    pub registration_data: String,

    #[serde(rename = "chf", default, skip_serializing_if = "String::is_empty")]
    pub facts: String,

    #[serde(rename = "chusr", default, skip_serializing_if = "String::is_empty")]
    pub broker_user: String,

    #[serde(rename = "chpwd", default, skip_serializing_if = "String::is_empty")]
    pub broker_password: String,

    #[serde(default)]
    pub extensions: serde_json::Map<String, serde_json::Value>,

    #[serde(flatten)]
    pub standard: StandardClaims,
}

impl Claims for ProvisioningClaims {
    const PURPOSE: Purpose = Purpose::Provisioning;

    fn standard(&self) -> &StandardClaims {
        &self.standard
    }

    fn standard_mut(&mut self) -> &mut StandardClaims {
        &mut self.standard
    }

    fn has_expected_purpose(&self) -> bool {
        self.standard.subject == Purpose::Provisioning.as_str()
            || self.standard.purpose == Purpose::Provisioning
    }
}

impl ProvisioningClaims {
    /// Create provisioning claims pointing at `urls` or an SRV domain.
    pub fn new(
        urls: Vec<String>,
        srv_domain: impl Into<String>,
        validity: Duration,
    ) -> Result<Self, TokenError> {
        let srv_domain = srv_domain.into();
        if srv_domain.is_empty() && urls.is_empty() {
            return Err(TokenError::InvalidClaims(
                "srv domain or urls required".to_string(),
            ));
        }

        let standard = StandardClaims::new("Choria", Purpose::Provisioning, validity, true)?;

        Ok(Self {
            token: String::new(),
            secure: false,
            urls: urls.join(","),
            srv_domain,
            provision_by_default: false,
            registration_data: String::new(),
            facts: String::new(),
            broker_user: String::new(),
            broker_password: String::new(),
            extensions: serde_json::Map::new(),
            standard,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_provision_by_default(mut self, by_default: bool) -> Self {
        self.provision_by_default = by_default;
        self
    }

    pub fn with_broker_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.broker_user = user.into();
        self.broker_password = password.into();
        self
    }

    pub fn with_registration_data(mut self, file: impl Into<String>) -> Self {
        self.registration_data = file.into();
        self
    }

    pub fn with_facts(mut self, file: impl Into<String>) -> Self {
        self.facts = file.into();
        self
    }

    pub fn with_extensions(mut self, extensions: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.standard.issuer = issuer.into();
        self
    }

    /// The broker URLs as a list.
    pub fn url_list(&self) -> Vec<&str> {
        self.urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect()
    }
}

/// Parse a provisioning token and verify it with `key`.
pub fn parse_provisioning_token(
    token: &str,
    key: &PublicKey,
) -> Result<ProvisioningClaims, TokenError> {
    let claims: ProvisioningClaims = parse_token(token, key)?;

    if !claims.has_expected_purpose() {
        return Err(TokenError::PurposeMismatch {
            expected: Purpose::Provisioning,
            actual: claims.standard.purpose,
        });
    }

    Ok(claims)
}

pub fn parse_provisioning_token_with_key_file(
    token: &str,
    key_file: &Path,
) -> Result<ProvisioningClaims, TokenError> {
    let key = PublicKey::from_file(key_file)?;
    parse_provisioning_token(token, &key)
}

/// Parse a provisioning token without verifying it.
///
/// Nodes use this to discover their bootstrap settings; the broker and
/// provisioner verify the token again before acting on it.
pub fn parse_provisioning_token_unverified(token: &str) -> Result<ProvisioningClaims, TokenError> {
    let claims: ProvisioningClaims = parse_token_unverified(token)?;

    if !claims.has_expected_purpose() {
        return Err(TokenError::PurposeMismatch {
            expected: Purpose::Provisioning,
            actual: claims.standard.purpose,
        });
    }

    Ok(claims)
}
