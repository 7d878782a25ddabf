//! Claims identifying a client, typically a human or automation caller.

use chrono::Duration;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::{Claims, Purpose, StandardClaims};
use crate::codec::{parse_token, parse_token_unverified};
use crate::error::TokenError;
use crate::keys::PublicKey;

/// Additional abilities granted to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPermissions {
    /// Full access to Streams, including the management APIs.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streams_admin: bool,

    /// User level access to Streams.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streams_user: bool,

    /// Viewing lifecycle and autonomous agent events.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub events_viewer: bool,

    /// Taking part in leader elections.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub election_user: bool,

    /// Using governors.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub governor: bool,

    /// Access to every subject in the organization.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub org_admin: bool,

    /// Addressing and commanding fleet nodes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fleet_management: bool,

    /// Fleet management, but only with requests countersigned by a delegate.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub signed_fleet_management: bool,

    /// Signing requests on behalf of other clients.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub authentication_delegator: bool,

    /// A longer than usual lifetime, for service accounts.
    #[serde(
        rename = "service",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub extended_service_lifetime: bool,

    /// An internal system account.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system_user: bool,
}

/// A client identity, carrying `choria_client_id` purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdClaims {
    /// Caller id used for authorization, in `provider=name` form.
    #[serde(rename = "callerid", default)]
    pub caller_id: String,

    /// Agents or `agent.action` names this client may invoke.
    #[serde(rename = "agents", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_agents: Vec<String>,

    #[serde(rename = "ou", default, skip_serializing_if = "String::is_empty")]
    pub organization_unit: String,

    /// Arbitrary properties available to policies evaluated by a signer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_properties: BTreeMap<String, String>,

    /// Open Policy Agent document limiting what the client may do.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub opa_policy: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ClientPermissions>,

    #[serde(flatten)]
    pub standard: StandardClaims,
}

impl Claims for ClientIdClaims {
    const PURPOSE: Purpose = Purpose::ClientId;

    fn standard(&self) -> &StandardClaims {
        &self.standard
    }

    fn standard_mut(&mut self) -> &mut StandardClaims {
        &mut self.standard
    }
}

impl ClientIdClaims {
    /// Create new client claims valid for `validity`.
    pub fn new(
        caller_id: impl Into<String>,
        validity: Duration,
        public_key: Option<&VerifyingKey>,
    ) -> Result<Self, TokenError> {
        let caller_id = caller_id.into();
        if caller_id.is_empty() {
            return Err(TokenError::InvalidClaims("caller id is required".to_string()));
        }

        let mut standard = StandardClaims::new("Choria", Purpose::ClientId, validity, false)?;
        if let Some(key) = public_key {
            standard.set_public_key(key);
        }

        Ok(Self {
            caller_id,
            allowed_agents: Vec::new(),
            organization_unit: String::new(),
            user_properties: BTreeMap::new(),
            opa_policy: String::new(),
            permissions: None,
            standard,
        })
    }

    pub fn with_permissions(mut self, permissions: ClientPermissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_allowed_agents(mut self, agents: Vec<String>) -> Self {
        self.allowed_agents = agents;
        self
    }

    pub fn with_organization_unit(mut self, org: impl Into<String>) -> Self {
        self.organization_unit = org.into();
        self
    }

    pub fn with_user_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.user_properties = properties;
        self
    }

    pub fn with_opa_policy(mut self, policy: impl Into<String>) -> Self {
        self.opa_policy = policy.into();
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.standard.issuer = issuer.into();
        self
    }

    fn permission(&self, check: impl Fn(&ClientPermissions) -> bool) -> bool {
        self.permissions.as_ref().is_some_and(check)
    }

    /// May address the fleet, directly or through a delegated signer.
    pub fn has_fleet_access(&self) -> bool {
        self.permission(|p| p.fleet_management || p.signed_fleet_management)
    }

    /// May sign its own requests to the fleet.
    pub fn may_self_sign(&self) -> bool {
        self.permission(|p| p.fleet_management && !p.signed_fleet_management)
    }

    /// May sign requests on behalf of other clients.
    pub fn is_delegator(&self) -> bool {
        self.permission(|p| p.authentication_delegator)
    }
}

/// Parse a client token and verify it with `key`.
///
/// With `verify_purpose` false, tokens of any purpose decode into client
/// claims; that exists for tokens predating the purpose claim.
pub fn parse_client_id_token(
    token: &str,
    key: &PublicKey,
    verify_purpose: bool,
) -> Result<ClientIdClaims, TokenError> {
    let claims: ClientIdClaims = parse_token(token, key)?;

    if verify_purpose && !claims.has_expected_purpose() {
        return Err(TokenError::PurposeMismatch {
            expected: Purpose::ClientId,
            actual: claims.standard.purpose,
        });
    }

    Ok(claims)
}

/// Parse a client token and verify it with the public key stored in
/// `key_file`.
pub fn parse_client_id_token_with_key_file(
    token: &str,
    key_file: &Path,
    verify_purpose: bool,
) -> Result<ClientIdClaims, TokenError> {
    let key = PublicKey::from_file(key_file)?;
    parse_client_id_token(token, &key, verify_purpose)
}

/// Parse a client token without verifying it.
///
/// Only for a holder reading its own token, never to trust another principal.
pub fn parse_client_id_token_unverified(token: &str) -> Result<ClientIdClaims, TokenError> {
    let claims: ClientIdClaims = parse_token_unverified(token)?;

    if !claims.has_expected_purpose() {
        return Err(TokenError::PurposeMismatch {
            expected: Purpose::ClientId,
            actual: claims.standard.purpose,
        });
    }

    Ok(claims)
}

/// Extract the caller id from a client token without verifying it.
pub fn unverified_caller_from_client_id_token(token: &str) -> Result<String, TokenError> {
    let claims = parse_client_id_token_unverified(token)?;
    if claims.caller_id.is_empty() {
        return Err(TokenError::InvalidClaims(
            "invalid caller id in token".to_string(),
        ));
    }

    Ok(claims.caller_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::sign_token;
    use crate::keys::SigningKey;

    #[test]
    fn test_requires_caller_id() {
        let err = ClientIdClaims::new("", Duration::hours(1), None).unwrap_err();
        assert_eq!(err.to_string(), "invalid claims: caller id is required");
    }

    #[test]
    fn test_new_client_claims() {
        let key = SigningKey::generate_ed25519().verifying_key().unwrap();
        let claims = ClientIdClaims::new("up=bob", Duration::hours(1), Some(&key))
            .unwrap()
            .with_allowed_agents(vec!["rpcutil".into()])
            .with_opa_policy("package io");

        assert_eq!(claims.standard.purpose, Purpose::ClientId);
        assert_eq!(claims.standard.issuer, "Choria");
        assert_eq!(claims.standard.public_key, hex::encode(key.as_bytes()));
        assert_eq!(claims.allowed_agents, vec!["rpcutil".to_string()]);
        assert!(claims.permissions.is_none());
        assert!(!claims.has_fleet_access());
    }

    #[test]
    fn test_permission_helpers() {
        let claims = ClientIdClaims::new("up=bob", Duration::hours(1), None)
            .unwrap()
            .with_permissions(ClientPermissions {
                signed_fleet_management: true,
                ..Default::default()
            });

        assert!(claims.has_fleet_access());
        assert!(!claims.may_self_sign());
        assert!(!claims.is_delegator());
    }

    #[test]
    fn test_permissions_wire_names() {
        let perms = ClientPermissions {
            fleet_management: true,
            extended_service_lifetime: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&perms).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"fleet_management": true, "service": true})
        );
    }

    #[test]
    fn test_unverified_caller() {
        let signer = SigningKey::generate_ed25519();
        let claims = ClientIdClaims::new("up=bob", Duration::hours(1), None).unwrap();
        let token = sign_token(&claims, &signer).unwrap();

        assert_eq!(unverified_caller_from_client_id_token(&token).unwrap(), "up=bob");
    }

    #[test]
    fn test_parse_checks_purpose() {
        let signer = SigningKey::generate_ed25519();
        let public = PublicKey::from(signer.verifying_key().unwrap());

        let mut claims = ClientIdClaims::new("up=bob", Duration::hours(1), None).unwrap();
        claims.standard.purpose = Purpose::Unknown;
        let token = sign_token(&claims, &signer).unwrap();

        let err = parse_client_id_token(&token, &public, true).unwrap_err();
        assert!(matches!(
            err,
            TokenError::PurposeMismatch {
                expected: Purpose::ClientId,
                actual: Purpose::Unknown
            }
        ));

        let parsed = parse_client_id_token(&token, &public, false).unwrap();
        assert_eq!(parsed.caller_id, "up=bob");
    }

    #[test]
    fn test_parse_with_key_file() {
        let signer = SigningKey::generate_ed25519();
        let other = SigningKey::generate_ed25519();
        let dir = tempfile::tempdir().unwrap();

        let key_file = dir.path().join("issuer.pub");
        std::fs::write(&key_file, hex::encode(signer.verifying_key().unwrap().as_bytes())).unwrap();
        let other_file = dir.path().join("other.pub");
        std::fs::write(&other_file, hex::encode(other.verifying_key().unwrap().as_bytes())).unwrap();

        let claims = ClientIdClaims::new("up=bob", Duration::hours(1), None).unwrap();
        let token = sign_token(&claims, &signer).unwrap();

        let parsed = parse_client_id_token_with_key_file(&token, &key_file, true).unwrap();
        assert_eq!(parsed.caller_id, "up=bob");

        let err = parse_client_id_token_with_key_file(&token, &other_file, true).unwrap_err();
        assert!(err.is_rejection());

        let err = parse_client_id_token_with_key_file(&token, &dir.path().join("missing.pub"), true)
            .unwrap_err();
        assert!(matches!(err, TokenError::Key(_)));
    }
}
