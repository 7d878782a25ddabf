//! Verification of chain of trust data against a trusted organization issuer.

use chrono::Utc;
use ed25519_dalek::VerifyingKey;

use super::{CHAIN_ISSUER_PREFIX, ChainIssuer, ORG_ISSUER_PREFIX, TrustChain};
use crate::claims::StandardClaims;
use crate::error::ChainError;
use crate::keys::{decode_ed25519_public_key, ed25519_verify};

impl StandardClaims {
    /// Check the claims needed to verify a chain of trust are present.
    pub fn verify_issuer_required_claims(&self) -> Result<(), ChainError> {
        if self.issuer.is_empty() {
            return Err(ChainError::NoIssuer);
        }
        if self.public_key.is_empty() {
            return Err(ChainError::NoPublicKey);
        }
        if self.trust_chain_signature.is_empty() {
            return Err(ChainError::NoTrustChainSignature);
        }
        if self.id.is_empty() {
            return Err(ChainError::IdNotSet);
        }

        Ok(())
    }

    /// Determine whether these claims were issued by `root`, directly or
    /// through a delegate `root` attested.
    ///
    /// Returns the key that must have signed the token envelope when the chain
    /// is valid, and `None` when a signature does not verify or the delegate
    /// has expired. Malformed chain data is an error.
    pub fn is_signed_by_issuer(
        &self,
        root: &VerifyingKey,
    ) -> Result<Option<VerifyingKey>, ChainError> {
        self.verify_issuer_required_claims()?;

        match ChainIssuer::parse(&self.issuer)? {
            ChainIssuer::Org { public_key } => {
                if public_key != *root {
                    return Err(ChainError::KeyMismatch);
                }

                let chain = TrustChain::parse_org(&self.trust_chain_signature)?;
                let data = self.org_issuer_chain_data()?;

                if !ed25519_verify(root, &data, chain.signature()) {
                    tracing::debug!(id = %self.id, "Organization issuer signature did not verify");
                    return Ok(None);
                }

                Ok(Some(*root))
            }

            ChainIssuer::Delegate {
                id,
                public_key,
                encoded_key,
            } => {
                let Some(issuer_expires_at) = self.issuer_expires_at else {
                    return Err(ChainError::NoIssuerExpiry);
                };
                if issuer_expires_at <= Utc::now().timestamp() {
                    tracing::debug!(id = %self.id, delegate = %id, "Token delegate has expired");
                    return Ok(None);
                }

                let TrustChain::Delegated { parent, signature } =
                    TrustChain::parse_delegated(&self.trust_chain_signature)?
                else {
                    return Err(ChainError::MalformedTrustChain);
                };

                let data = self.chain_issuer_data(&parent)?;
                if !ed25519_verify(&public_key, &data, &signature) {
                    tracing::debug!(id = %self.id, delegate = %id, "Delegate signature did not verify");
                    return Ok(None);
                }

                let delegate = StandardClaims {
                    id,
                    public_key: encoded_key,
                    trust_chain_signature: parent,
                    issuer: format!("{ORG_ISSUER_PREFIX}{}", hex::encode(root.as_bytes())),
                    ..Default::default()
                };

                Ok(delegate.is_signed_by_issuer(root)?.map(|_| public_key))
            }
        }
    }

    /// Check the issuer expiry, optionally requiring the claims to be chain
    /// issued.
    ///
    /// Without an issuer expiry the claims pass only when no chain is
    /// required. An elapsed issuer expiry always fails.
    pub fn verify_issuer_expiry(&self, require_chain: bool) -> bool {
        let Some(expires_at) = self.issuer_expires_at else {
            return !require_chain;
        };

        if expires_at <= Utc::now().timestamp() {
            return false;
        }

        !require_chain || self.requires_chain()
    }

    /// Whether these claims claim to be issued by a delegate in a chain.
    pub fn requires_chain(&self) -> bool {
        self.issuer.starts_with(CHAIN_ISSUER_PREFIX) && !self.trust_chain_signature.is_empty()
    }

    /// Whether these claims belong to a delegate attested by an organization
    /// issuer, and so may issue further tokens.
    ///
    /// With `verify` false only the shape is checked. With `verify` true the
    /// organization issuer's signature is checked against the key embedded in
    /// the issuer, so callers must still confirm that key is trusted.
    pub fn is_chained_issuer(&self, verify: bool) -> bool {
        if self.trust_chain_signature.is_empty() {
            return false;
        }

        let Some(key) = self.issuer.strip_prefix(ORG_ISSUER_PREFIX) else {
            return false;
        };

        if !verify {
            return true;
        }

        let Ok(data) = self.org_issuer_chain_data() else {
            return false;
        };
        let Ok(key) = decode_ed25519_public_key(key) else {
            return false;
        };
        let Ok(TrustChain::Org { signature }) = TrustChain::parse_org(&self.trust_chain_signature)
        else {
            return false;
        };

        ed25519_verify(&key, &data, &signature)
    }

    /// Whether the envelope signer must be resolved through the chain.
    pub(crate) fn is_chain_attested(&self) -> bool {
        !self.trust_chain_signature.is_empty()
            && (self.issuer.starts_with(ORG_ISSUER_PREFIX)
                || self.issuer.starts_with(CHAIN_ISSUER_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;
    use uuid::Uuid;

    struct Party {
        key: SigningKey,
        public: VerifyingKey,
    }

    fn party() -> Party {
        let key = SigningKey::generate_ed25519();
        let public = key.verifying_key().unwrap();
        Party { key, public }
    }

    fn claims_for(party: &Party) -> StandardClaims {
        let now = Utc::now().timestamp();
        StandardClaims {
            id: Uuid::new_v4().to_string(),
            public_key: hex::encode(party.public.as_bytes()),
            issued_at: Some(now),
            expires_at: Some(now + 3600),
            ..Default::default()
        }
    }

    fn chain() -> (Party, Party, StandardClaims, StandardClaims) {
        let root = party();
        let delegate = party();
        let holder = party();

        let mut delegate_claims = claims_for(&delegate);
        delegate_claims.add_org_issuer_data(&root.key).unwrap();

        let mut holder_claims = claims_for(&holder);
        holder_claims
            .add_chain_issuer_data(&delegate_claims, &delegate.key)
            .unwrap();

        (root, delegate, delegate_claims, holder_claims)
    }

    fn flip_hex(s: &str, index: usize) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[index] = if chars[index] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_required_claims() {
        let mut c = StandardClaims::default();
        assert_eq!(c.verify_issuer_required_claims(), Err(ChainError::NoIssuer));

        c.issuer = "I-x".to_string();
        assert_eq!(c.verify_issuer_required_claims(), Err(ChainError::NoPublicKey));

        c.public_key = "abcd".to_string();
        assert_eq!(
            c.verify_issuer_required_claims(),
            Err(ChainError::NoTrustChainSignature)
        );

        c.trust_chain_signature = "00".to_string();
        assert_eq!(c.verify_issuer_required_claims(), Err(ChainError::IdNotSet));

        c.id = "x".to_string();
        assert_eq!(c.verify_issuer_required_claims(), Ok(()));
    }

    #[test]
    fn test_org_issued() {
        let root = party();
        let mut c = claims_for(&party());
        c.add_org_issuer_data(&root.key).unwrap();

        assert_eq!(c.is_signed_by_issuer(&root.public), Ok(Some(root.public)));
        assert!(c.is_chained_issuer(false));
        assert!(c.is_chained_issuer(true));

        assert_eq!(
            c.is_signed_by_issuer(&party().public),
            Err(ChainError::KeyMismatch)
        );

        let mut tampered = c.clone();
        tampered.trust_chain_signature = flip_hex(&c.trust_chain_signature, 10);
        assert_eq!(tampered.is_signed_by_issuer(&root.public), Ok(None));
        assert!(!tampered.is_chained_issuer(true));
        assert!(tampered.is_chained_issuer(false));

        let mut short = c.clone();
        short.trust_chain_signature = "abcd".to_string();
        assert_eq!(short.is_signed_by_issuer(&root.public), Ok(None));

        let mut garbage = c.clone();
        garbage.trust_chain_signature = "not hex".to_string();
        assert!(matches!(
            garbage.is_signed_by_issuer(&root.public),
            Err(ChainError::TrustChainEncoding(_))
        ));

        let mut other_id = c.clone();
        other_id.id = Uuid::new_v4().to_string();
        assert_eq!(other_id.is_signed_by_issuer(&root.public), Ok(None));
    }

    #[test]
    fn test_delegated() {
        let (root, delegate, delegate_claims, holder) = chain();

        assert!(delegate_claims.is_chained_issuer(true));
        assert!(!holder.is_chained_issuer(false));

        assert_eq!(
            holder.is_signed_by_issuer(&root.public),
            Ok(Some(delegate.public))
        );
        assert!(holder.verify_issuer_expiry(holder.requires_chain()));

        // the delegate was not attested by this root
        assert_eq!(holder.is_signed_by_issuer(&party().public), Ok(None));
        assert_eq!(
            delegate_claims.is_signed_by_issuer(&party().public),
            Err(ChainError::KeyMismatch)
        );
    }

    #[test]
    fn test_delegated_with_uppercase_delegate_key() {
        let root = party();
        let delegate = party();
        let holder = party();

        let mut delegate_claims = claims_for(&delegate);
        delegate_claims.public_key = delegate_claims.public_key.to_uppercase();
        delegate_claims.add_org_issuer_data(&root.key).unwrap();
        assert_eq!(
            delegate_claims.is_signed_by_issuer(&root.public),
            Ok(Some(root.public))
        );

        let mut holder_claims = claims_for(&holder);
        holder_claims
            .add_chain_issuer_data(&delegate_claims, &delegate.key)
            .unwrap();
        assert!(holder_claims.issuer.ends_with(&delegate_claims.public_key));

        assert_eq!(
            holder_claims.is_signed_by_issuer(&root.public),
            Ok(Some(delegate.public))
        );
    }

    #[test]
    fn test_delegated_tamper_at_either_level() {
        let (root, _, delegate_claims, holder) = chain();
        let parent_len = delegate_claims.trust_chain_signature.len();

        for index in [0, parent_len / 2, parent_len - 1] {
            let mut tampered = holder.clone();
            tampered.trust_chain_signature = flip_hex(&holder.trust_chain_signature, index);
            assert_eq!(tampered.is_signed_by_issuer(&root.public), Ok(None), "{index}");
        }

        let total = holder.trust_chain_signature.len();
        for index in [parent_len + 1, parent_len + 40, total - 1] {
            let mut tampered = holder.clone();
            tampered.trust_chain_signature = flip_hex(&holder.trust_chain_signature, index);
            assert_eq!(tampered.is_signed_by_issuer(&root.public), Ok(None), "{index}");
        }
    }

    #[test]
    fn test_delegated_structural_errors() {
        let (root, _, _, holder) = chain();

        let mut no_expiry = holder.clone();
        no_expiry.issuer_expires_at = None;
        assert_eq!(
            no_expiry.is_signed_by_issuer(&root.public),
            Err(ChainError::NoIssuerExpiry)
        );

        let mut deep = holder.clone();
        deep.trust_chain_signature = format!("aa.{}", holder.trust_chain_signature);
        assert_eq!(
            deep.is_signed_by_issuer(&root.public),
            Err(ChainError::MalformedTrustChain)
        );

        let mut bad_sig = holder.clone();
        let (parent, _) = holder.trust_chain_signature.split_once('.').unwrap();
        bad_sig.trust_chain_signature = format!("{parent}.zz");
        assert!(matches!(
            bad_sig.is_signed_by_issuer(&root.public),
            Err(ChainError::ChainSignatureEncoding(_))
        ));

        let mut unsupported = holder.clone();
        unsupported.issuer = "X-whatever".to_string();
        assert_eq!(
            unsupported.is_signed_by_issuer(&root.public),
            Err(ChainError::UnsupportedIssuer)
        );
    }

    #[test]
    fn test_expired_delegate() {
        let (root, _, _, holder) = chain();

        let mut expired = holder.clone();
        expired.issuer_expires_at = Some(Utc::now().timestamp() - 1);
        assert_eq!(expired.is_signed_by_issuer(&root.public), Ok(None));
        assert!(!expired.verify_issuer_expiry(false));
        assert!(!expired.verify_issuer_expiry(true));
    }

    #[test]
    fn test_verify_issuer_expiry() {
        let future = Utc::now().timestamp() + 3600;

        let mut c = StandardClaims::default();
        assert!(c.verify_issuer_expiry(false));
        assert!(!c.verify_issuer_expiry(true));

        c.issuer_expires_at = Some(future);
        assert!(c.verify_issuer_expiry(false));
        assert!(!c.verify_issuer_expiry(true));

        c.issuer = "C-x.abcd".to_string();
        assert!(!c.verify_issuer_expiry(true));
        assert!(!c.requires_chain());

        c.trust_chain_signature = "aa.bb".to_string();
        assert!(c.verify_issuer_expiry(true));
        assert!(c.requires_chain());

        c.issuer = "I-abcd".to_string();
        assert!(!c.verify_issuer_expiry(true));
        assert!(c.verify_issuer_expiry(c.requires_chain()));
    }

    #[test]
    fn test_is_chain_attested() {
        let mut c = StandardClaims {
            issuer: "Choria".to_string(),
            trust_chain_signature: "aa".to_string(),
            ..Default::default()
        };
        assert!(!c.is_chain_attested());

        c.issuer = "I-abcd".to_string();
        assert!(c.is_chain_attested());

        c.trust_chain_signature.clear();
        assert!(!c.is_chain_attested());
    }
}
