//! Claims shared by every token.

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Purpose;
use crate::error::{KeyError, TokenError};
use crate::keys::decode_ed25519_public_key;

/// The envelope embedded in every claim type.
///
/// Times are unix seconds, matching the registered JWT claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Type of the token, used to pick the right claims structure.
    #[serde(default)]
    pub purpose: Purpose,

    /// Proof that an organization issuer, possibly via a delegate, issued this token.
    #[serde(rename = "tcs", default, skip_serializing_if = "String::is_empty")]
    pub trust_chain_signature: String,

    /// Hex ed25519 public key of the subject.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,

    /// Expiry of the delegate that issued this token.
    #[serde(rename = "issexp", default, skip_serializing_if = "Option::is_none")]
    pub issuer_expires_at: Option<i64>,

    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,

    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,

    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StandardClaims {
    /// Create claims valid from now for `validity`, with a fresh token id.
    pub(crate) fn new(
        issuer: &str,
        purpose: Purpose,
        validity: Duration,
        set_subject: bool,
    ) -> Result<Self, TokenError> {
        if validity <= Duration::zero() {
            return Err(TokenError::InvalidClaims(
                "validity must be positive".to_string(),
            ));
        }

        let now = Utc::now();

        Ok(Self {
            purpose,
            id: Uuid::new_v4().to_string(),
            issuer: issuer.to_string(),
            subject: if set_subject {
                purpose.as_str().to_string()
            } else {
                String::new()
            },
            issued_at: Some(now.timestamp()),
            not_before: Some(now.timestamp()),
            expires_at: Some((now + validity).timestamp()),
            ..Default::default()
        })
    }

    /// The earliest of the token expiry and the issuer expiry.
    pub fn expire_time(&self) -> Option<DateTime<Utc>> {
        let earliest = match (self.expires_at, self.issuer_expires_at) {
            (Some(exp), Some(iexp)) => Some(exp.min(iexp)),
            (exp, iexp) => exp.or(iexp),
        }?;

        DateTime::from_timestamp(earliest, 0)
    }

    /// Whether the token or its issuer has expired.
    pub fn is_expired(&self) -> bool {
        match self.expire_time() {
            Some(at) => Utc::now() > at,
            None => false,
        }
    }

    /// Decode the embedded subject public key, if one is set.
    pub fn verifying_key(&self) -> Result<Option<VerifyingKey>, KeyError> {
        if self.public_key.is_empty() {
            return Ok(None);
        }

        decode_ed25519_public_key(&self.public_key).map(Some)
    }

    pub(crate) fn set_public_key(&mut self, key: &VerifyingKey) {
        self.public_key = hex::encode(key.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_standard_claims() {
        let claims =
            StandardClaims::new("Choria", Purpose::Provisioning, Duration::hours(1), true).unwrap();

        assert_eq!(claims.subject, "choria_provisioning");
        assert_eq!(claims.issued_at, claims.not_before);
        assert_eq!(claims.expires_at, claims.issued_at.map(|t| t + 3600));
        assert!(Uuid::parse_str(&claims.id).is_ok());
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_validity_must_be_positive() {
        let err = StandardClaims::new("Choria", Purpose::ClientId, Duration::zero(), false)
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClaims(_)));
    }

    #[test]
    fn test_expire_time_prefers_earliest() {
        let mut claims = StandardClaims {
            expires_at: Some(2000),
            ..Default::default()
        };
        assert_eq!(claims.expire_time().unwrap().timestamp(), 2000);

        claims.issuer_expires_at = Some(1000);
        assert_eq!(claims.expire_time().unwrap().timestamp(), 1000);
        assert!(claims.is_expired());

        claims.expires_at = None;
        assert_eq!(claims.expire_time().unwrap().timestamp(), 1000);
    }

    #[test]
    fn test_verifying_key() {
        let mut claims = StandardClaims::default();
        assert!(claims.verifying_key().unwrap().is_none());

        claims.public_key = "abcd".to_string();
        assert!(claims.verifying_key().is_err());
    }
}
