//! Claims identifying a fleet node.

use chrono::Duration;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Claims, Purpose, StandardClaims};
use crate::codec::{parse_token, parse_token_unverified};
use crate::error::TokenError;
use crate::keys::PublicKey;

/// Additional abilities granted to a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPermissions {
    /// Publishing to `<collective>.submission.in.>`.
    #[serde(default)]
    pub submission: bool,

    /// Access to Streams, for example reading KV values.
    #[serde(default)]
    pub streams: bool,

    /// Using governors.
    #[serde(default)]
    pub governor: bool,

    /// Listening for service requests.
    #[serde(default)]
    pub service_host: bool,
}

/// A server identity, carrying `choria_server` purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerClaims {
    #[serde(rename = "identity", default)]
    pub identity: String,

    /// Collectives the server belongs to within the organization.
    #[serde(default)]
    pub collectives: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ServerPermissions>,

    #[serde(rename = "ou", default, skip_serializing_if = "String::is_empty")]
    pub organization_unit: String,

    /// Extra subjects the server may publish to, e.g. custom registration.
    #[serde(rename = "pub_subjects", default, skip_serializing_if = "Vec::is_empty")]
    pub additional_publish_subjects: Vec<String>,

    #[serde(flatten)]
    pub standard: StandardClaims,
}

impl Claims for ServerClaims {
    const PURPOSE: Purpose = Purpose::Server;

    fn standard(&self) -> &StandardClaims {
        &self.standard
    }

    fn standard_mut(&mut self) -> &mut StandardClaims {
        &mut self.standard
    }
}

impl ServerClaims {
    /// Create new server claims valid for `validity`.
    ///
    /// Servers sign their replies, so a public key is always required.
    pub fn new(
        identity: impl Into<String>,
        collectives: Vec<String>,
        public_key: &VerifyingKey,
        validity: Duration,
    ) -> Result<Self, TokenError> {
        let identity = identity.into();
        if identity.is_empty() {
            return Err(TokenError::InvalidClaims("identity is required".to_string()));
        }

        if collectives.is_empty() {
            return Err(TokenError::InvalidClaims(
                "at least one collective is required".to_string(),
            ));
        }

        let mut standard = StandardClaims::new("Choria", Purpose::Server, validity, false)?;
        standard.set_public_key(public_key);

        Ok(Self {
            identity,
            collectives,
            permissions: None,
            organization_unit: "choria".to_string(),
            additional_publish_subjects: Vec::new(),
            standard,
        })
    }

    pub fn with_permissions(mut self, permissions: ServerPermissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_organization_unit(mut self, org: impl Into<String>) -> Self {
        self.organization_unit = org.into();
        self
    }

    pub fn with_additional_publish_subjects(mut self, subjects: Vec<String>) -> Self {
        self.additional_publish_subjects = subjects;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.standard.issuer = issuer.into();
        self
    }
}

/// Parse a server token and verify it with `key`.
pub fn parse_server_token(token: &str, key: &PublicKey) -> Result<ServerClaims, TokenError> {
    let claims: ServerClaims = parse_token(token, key)?;

    if !claims.has_expected_purpose() {
        return Err(TokenError::PurposeMismatch {
            expected: Purpose::Server,
            actual: claims.standard.purpose,
        });
    }

    Ok(claims)
}

/// Parse a server token and verify it with the public key in `key_file`.
pub fn parse_server_token_with_key_file(
    token: &str,
    key_file: &Path,
) -> Result<ServerClaims, TokenError> {
    let key = PublicKey::from_file(key_file)?;
    parse_server_token(token, &key)
}

/// Parse a server token without verifying it.
pub fn parse_server_token_unverified(token: &str) -> Result<ServerClaims, TokenError> {
    let claims: ServerClaims = parse_token_unverified(token)?;

    if !claims.has_expected_purpose() {
        return Err(TokenError::PurposeMismatch {
            expected: Purpose::Server,
            actual: claims.standard.purpose,
        });
    }

    Ok(claims)
}

/// Extract the identity from a server token without verifying it.
pub fn unverified_identity_from_server_token(token: &str) -> Result<String, TokenError> {
    let claims = parse_server_token_unverified(token)?;
    if claims.identity.is_empty() {
        return Err(TokenError::InvalidClaims(
            "invalid identity in token".to_string(),
        ));
    }

    Ok(claims.identity)
}
