//! Verification of request signatures made by token holders or their delegates.
//!
//! A request carries a signature over its payload and one or two tokens:
//!
//! | Tokens | Signed By | Attributed To |
//! |--------|-----------|---------------|
//! | `caller` | The caller | The caller |
//! | `caller`, `delegate` | The delegate | The delegate |
//!
//! In the delegated form the caller token only proves the caller was entitled
//! to have the delegate sign on its behalf.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tessera_tokens::claims::{
    ClientIdClaims, parse_client_id_token, parse_client_id_token_unverified, parse_server_token,
};
use tessera_tokens::keys::ed25519_verify;
use tessera_tokens::{PublicKey, Purpose, StandardClaims, TokenError, token_purpose};
use thiserror::Error;

use crate::error::SecurityError;
use crate::trust::{TrustAnchor, TrustStore};

static CALLER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+=([\w.\-]+)").expect("valid caller id pattern"));

const FLEET_MANAGEMENT: &str = "fleet management";
const AUTHENTICATION_DELEGATOR: &str = "authentication delegator";

/// The principal a verified signature is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Caller id of a client, or identity of a server.
    pub id: String,

    /// The client the signature was made for, when signed by a delegate.
    pub on_behalf_of: Option<String>,

    /// Name of the trust anchor that validated the tokens.
    pub anchor: String,
}

/// Why a signature was not accepted.
///
/// The reasons are for logs only, remote parties should see
/// [`Denial::public_message`].
#[derive(Debug, Error)]
pub enum Denial {
    #[error("expected one or two tokens, received {0}")]
    Protocol(usize),

    #[error("cannot verify signatures using a {0} token")]
    UnsupportedPurpose(Purpose),

    #[error("token could not be loaded using {anchors} trusted issuers: {reason}")]
    Untrusted { anchors: usize, reason: String },

    #[error("caller token could not be loaded using the delegator's issuer {anchor}: {source}")]
    CallerNotTrusted { anchor: String, source: TokenError },

    #[error("{child} was not issued by {delegate}")]
    NotIssuedBy { child: String, delegate: String },

    #[error("{principal} does not have the {permission} permission")]
    MissingPermission {
        principal: String,
        permission: &'static str,
    },

    #[error("{0} requires requests to be signed by a delegate")]
    DelegationRequired(String),

    #[error("{0} has no usable public key")]
    NoPublicKey(String),

    #[error("signature verification failed for {0}")]
    BadSignature(String),
}

impl Denial {
    /// The only reason ever returned to a remote party.
    pub fn public_message(&self) -> &'static str {
        "not authorized"
    }

    fn is_routine(&self) -> bool {
        matches!(self, Denial::UnsupportedPurpose(_))
    }
}

/// Verifies request signatures against a shared [`TrustStore`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    trust: Arc<TrustStore>,
}

impl Authenticator {
    pub fn new(trust: Arc<TrustStore>) -> Self {
        Self { trust }
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    /// Verify `signature` over `payload` using the presented tokens.
    ///
    /// `tokens` is either the caller's token alone, or the caller's token
    /// followed by the token of the delegate that made the signature.
    ///
    /// A lone chain issued token is accepted once its chain leads back to a
    /// trusted issuer, whether or not the delegate that issued it holds the
    /// authentication delegator permission. Use
    /// [`Authenticator::verify_chain_delegation`] with the delegate's token to
    /// enforce that permission.
    pub fn authenticate(
        &self,
        payload: &[u8],
        signature: &[u8],
        tokens: &[&str],
    ) -> Result<Principal, Denial> {
        let result = match tokens {
            [caller] => self.verify_by_caller(payload, signature, caller),
            [caller, delegate] => self.verify_by_delegate(payload, signature, caller, delegate),
            _ => Err(Denial::Protocol(tokens.len())),
        };

        match &result {
            Ok(principal) => {
                tracing::debug!(
                    principal = %principal.id,
                    on_behalf_of = ?principal.on_behalf_of,
                    anchor = %principal.anchor,
                    "Verified request signature"
                );
            }
            Err(denial) if denial.is_routine() => {
                tracing::debug!(reason = %denial, "Request signature not accepted");
            }
            Err(denial) => {
                tracing::warn!(reason = %denial, "Request signature not accepted");
            }
        }

        result
    }

    /// Verify a signature, returning whether it is valid and who made it.
    ///
    /// The name is empty when the signature is not accepted.
    pub fn verify_signature_bytes(
        &self,
        payload: &[u8],
        signature: &[u8],
        tokens: &[&str],
    ) -> (bool, String) {
        match self.authenticate(payload, signature, tokens) {
            Ok(principal) => (true, principal.id),
            Err(_) => (false, String::new()),
        }
    }

    fn verify_by_caller(
        &self,
        payload: &[u8],
        signature: &[u8],
        token: &str,
    ) -> Result<Principal, Denial> {
        match token_purpose(token) {
            Purpose::Server => {
                let (anchor, claims) =
                    self.load_with_any_anchor(token, |t, k| parse_server_token(t, k))?;
                verify_payload(&claims.identity, &claims.standard, payload, signature)?;

                Ok(Principal {
                    id: claims.identity,
                    on_behalf_of: None,
                    anchor: anchor.name.clone(),
                })
            }

            Purpose::ClientId => {
                let (anchor, claims) =
                    self.load_with_any_anchor(token, |t, k| parse_client_id_token(t, k, true))?;

                if !claims.has_fleet_access() {
                    return Err(Denial::MissingPermission {
                        principal: claims.caller_id,
                        permission: FLEET_MANAGEMENT,
                    });
                }
                if !claims.may_self_sign() {
                    return Err(Denial::DelegationRequired(claims.caller_id));
                }

                verify_payload(&claims.caller_id, &claims.standard, payload, signature)?;

                Ok(Principal {
                    id: claims.caller_id,
                    on_behalf_of: None,
                    anchor: anchor.name.clone(),
                })
            }

            purpose => Err(Denial::UnsupportedPurpose(purpose)),
        }
    }

    fn verify_by_delegate(
        &self,
        payload: &[u8],
        signature: &[u8],
        caller: &str,
        delegate: &str,
    ) -> Result<Principal, Denial> {
        let purpose = token_purpose(delegate);
        if purpose != Purpose::ClientId {
            return Err(Denial::UnsupportedPurpose(purpose));
        }

        let (anchor, delegate) =
            self.load_with_any_anchor(delegate, |t, k| parse_client_id_token(t, k, true))?;
        let caller = self.load_caller(anchor, caller, &delegate)?;

        if !caller.has_fleet_access() {
            return Err(Denial::MissingPermission {
                principal: caller.caller_id,
                permission: FLEET_MANAGEMENT,
            });
        }

        verify_payload(&delegate.caller_id, &delegate.standard, payload, signature)?;

        Ok(Principal {
            id: delegate.caller_id,
            on_behalf_of: Some(caller.caller_id),
            anchor: anchor.name.clone(),
        })
    }

    /// Load the caller with the anchor that validated its delegate, after
    /// checking the delegate may sign for others.
    fn load_caller(
        &self,
        anchor: &TrustAnchor,
        caller: &str,
        delegate: &ClientIdClaims,
    ) -> Result<ClientIdClaims, Denial> {
        if !delegate.is_delegator() {
            return Err(Denial::MissingPermission {
                principal: delegate.caller_id.clone(),
                permission: AUTHENTICATION_DELEGATOR,
            });
        }

        parse_client_id_token(caller, &anchor.key, true).map_err(|source| {
            Denial::CallerNotTrusted {
                anchor: anchor.name.clone(),
                source,
            }
        })
    }

    /// Confirm a chain issued client token was issued by `delegate_token`,
    /// a delegate allowed to issue for others, both under the same anchor.
    pub fn verify_chain_delegation(
        &self,
        child_token: &str,
        delegate_token: &str,
    ) -> Result<Principal, Denial> {
        let result = self.check_chain_delegation(child_token, delegate_token);
        if let Err(denial) = &result {
            tracing::warn!(reason = %denial, "Chain delegation not accepted");
        }

        result
    }

    fn check_chain_delegation(
        &self,
        child_token: &str,
        delegate_token: &str,
    ) -> Result<Principal, Denial> {
        let (anchor, delegate) =
            self.load_with_any_anchor(delegate_token, |t, k| parse_client_id_token(t, k, true))?;
        let child = self.load_caller(anchor, child_token, &delegate)?;

        let expected_issuer = format!(
            "{}{}.{}",
            tessera_tokens::CHAIN_ISSUER_PREFIX,
            delegate.standard.id,
            delegate.standard.public_key
        );
        if child.standard.issuer != expected_issuer {
            return Err(Denial::NotIssuedBy {
                child: child.caller_id,
                delegate: delegate.caller_id,
            });
        }

        Ok(Principal {
            id: child.caller_id,
            on_behalf_of: Some(delegate.caller_id),
            anchor: anchor.name.clone(),
        })
    }

    /// Try every anchor in turn until one loads the token.
    fn load_with_any_anchor<C>(
        &self,
        token: &str,
        parse: impl Fn(&str, &PublicKey) -> Result<C, TokenError>,
    ) -> Result<(&TrustAnchor, C), Denial> {
        let mut reason = String::new();

        for anchor in self.trust.anchors() {
            match parse(token, &anchor.key) {
                Ok(claims) => return Ok((anchor, claims)),
                Err(e) => {
                    tracing::trace!(anchor = %anchor.name, error = %e, "Token not loaded by anchor");
                    reason = e.to_string();
                }
            }
        }

        Err(Denial::Untrusted {
            anchors: self.trust.len(),
            reason,
        })
    }

    /// Decide whether already verified caller tokens may make a request as
    /// `name`.
    ///
    /// The tokens are not verified again. With two tokens the second must
    /// belong to a delegator and `name` is not compared, the delegation
    /// being the authority.
    pub fn should_allow_caller(&self, name: &str, callers: &[&str]) -> Result<bool, SecurityError> {
        match callers {
            [caller] => {
                let caller = parse_client_id_token_unverified(caller)?;
                if !caller.has_fleet_access() {
                    tracing::warn!(caller = %caller.caller_id, "Caller does not have fleet management access");
                    return Ok(false);
                }

                if caller.caller_id != name {
                    tracing::warn!(caller = %caller.caller_id, name = %name, "Caller does not match the request");
                    return Ok(false);
                }

                Ok(true)
            }

            [caller, delegate] => {
                let caller = parse_client_id_token_unverified(caller)?;
                let delegate = parse_client_id_token_unverified(delegate)?;

                if !caller.has_fleet_access() {
                    tracing::warn!(caller = %caller.caller_id, "Caller does not have fleet management access");
                    return Ok(false);
                }

                if !delegate.is_delegator() {
                    tracing::warn!(delegate = %delegate.caller_id, "Delegate does not have authentication delegator access");
                    return Ok(false);
                }

                Ok(true)
            }

            _ => {
                tracing::warn!(tokens = callers.len(), "Received a caller check with an invalid number of tokens");
                Err(SecurityError::Protocol(format!(
                    "expected one or two tokens, received {}",
                    callers.len()
                )))
            }
        }
    }
}

/// Extract the name from a caller id like `choria=alice`.
pub fn caller_identity(caller_id: &str) -> Result<&str, SecurityError> {
    CALLER_ID_RE
        .captures(caller_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| SecurityError::InvalidCallerId(caller_id.to_string()))
}

fn verify_payload(
    principal: &str,
    standard: &StandardClaims,
    payload: &[u8],
    signature: &[u8],
) -> Result<(), Denial> {
    let key = match standard.verifying_key() {
        Ok(Some(key)) => key,
        Ok(None) | Err(_) => return Err(Denial::NoPublicKey(principal.to_string())),
    };

    if !ed25519_verify(&key, payload, signature) {
        return Err(Denial::BadSignature(principal.to_string()));
    }

    Ok(())
}
