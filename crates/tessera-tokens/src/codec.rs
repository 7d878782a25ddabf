//! Token signing, parsing and storage.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;

use crate::claims::{Claims, Purpose, StandardClaims};
use crate::error::TokenError;
use crate::keys::{PublicKey, SigningKey};

/// Sign claims into a compact JWT.
///
/// Ed25519 keys sign with EdDSA, RSA keys with the algorithm chosen when the
/// key was loaded.
pub fn sign_token<C: Claims>(claims: &C, key: &SigningKey) -> Result<String, TokenError> {
    let header = Header::new(key.algorithm());
    let encoding = key.encoding_key()?;

    jsonwebtoken::encode(&header, claims, &encoding)
        .map_err(|e| TokenError::TokenCreationFailed(e.to_string()))
}

/// Parse a token and verify it using a trusted `key`.
///
/// Tokens carrying a trust chain are first checked against `key` as their
/// organization issuer; the envelope must then be signed by whoever the
/// chain names as signer. Expired tokens and tokens whose issuing delegate
/// has expired are rejected.
pub fn parse_token<C: Claims>(token: &str, key: &PublicKey) -> Result<C, TokenError> {
    let envelope_key = envelope_key(token, key)?;

    let decoding = envelope_key.decoding_key()?;
    let claims = jsonwebtoken::decode::<C>(token, &decoding, &validation(&envelope_key))
        .map_err(map_jwt_error)?
        .claims;

    let standard = claims.standard();
    if !standard.verify_issuer_expiry(standard.requires_chain()) {
        tracing::debug!(id = %standard.id, "Token issuer has expired");
        return Err(TokenError::IssuerExpired);
    }

    Ok(claims)
}

/// Parse a token without verifying its signature or lifetime.
///
/// Only for a credential holder reading its own settings.
pub fn parse_token_unverified<C: DeserializeOwned>(token: &str) -> Result<C, TokenError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<C>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

/// Determine the purpose of a token without verifying it.
///
/// Provisioning tokens predating the purpose claim are recognised by subject.
pub fn token_purpose(token: &str) -> Purpose {
    let Ok(claims) = parse_token_unverified::<StandardClaims>(token) else {
        return Purpose::Unknown;
    };

    if claims.purpose == Purpose::Unknown && claims.subject == Purpose::Provisioning.as_str() {
        return Purpose::Provisioning;
    }

    claims.purpose
}

/// Write a token to `path`, readable only by its owner.
pub fn save_token(path: &Path, token: &str) -> Result<(), TokenError> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(token.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Sign claims and save the token to `path`.
pub fn sign_and_save_token<C: Claims>(
    claims: &C,
    key: &SigningKey,
    path: &Path,
) -> Result<String, TokenError> {
    let token = sign_token(claims, key)?;
    save_token(path, &token)?;
    tracing::debug!(path = %path.display(), "Saved signed token");

    Ok(token)
}

fn envelope_key(token: &str, key: &PublicKey) -> Result<PublicKey, TokenError> {
    let PublicKey::Ed25519(root) = key else {
        return Ok(key.clone());
    };

    let standard: StandardClaims = parse_token_unverified(token)?;
    if !standard.is_chain_attested() {
        return Ok(key.clone());
    }

    match standard.is_signed_by_issuer(root)? {
        Some(signer) => Ok(PublicKey::Ed25519(signer)),
        None if !standard.verify_issuer_expiry(standard.requires_chain()) => {
            Err(TokenError::IssuerExpired)
        }
        None => Err(TokenError::NotTrusted),
    }
}

fn validation(key: &PublicKey) -> Validation {
    let algorithms = key.algorithms();
    let mut validation = Validation::new(algorithms[0]);
    validation.algorithms = algorithms;
    validation.leeway = 0;
    validation.validate_nbf = true;
    validation.validate_aud = false;

    validation
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::VerificationFailed(err.to_string()),
        ErrorKind::ImmatureSignature => {
            TokenError::VerificationFailed("token is not valid yet".to_string())
        }
        ErrorKind::ExpiredSignature => TokenError::TokenExpired,
        ErrorKind::InvalidAlgorithm => TokenError::UnsupportedAlgorithm,
        _ => TokenError::TokenParseFailed(err.to_string()),
    }
}
