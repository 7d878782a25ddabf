//! Issuer side helpers that stamp chain of trust data onto claims.

use ed25519_dalek::{Signer, VerifyingKey};

use super::{CHAIN_ISSUER_PREFIX, ORG_ISSUER_PREFIX, SEPARATOR, TrustChain};
use crate::claims::StandardClaims;
use crate::error::ChainError;
use crate::keys::{SigningKey, decode_ed25519_public_key};

impl StandardClaims {
    /// Mark the claims as issued directly by the organization issuer `key`.
    pub fn set_org_issuer(&mut self, key: &VerifyingKey) {
        self.issuer = format!("{ORG_ISSUER_PREFIX}{}", hex::encode(key.as_bytes()));
    }

    /// Mark the claims as issued by the delegate holding `parent`.
    ///
    /// The delegate's own expiry becomes the issuer expiry of these claims.
    pub fn set_chain_issuer(&mut self, parent: &StandardClaims) -> Result<(), ChainError> {
        if parent.id.is_empty() {
            return Err(ChainError::IdNotSet);
        }
        if parent.public_key.is_empty() {
            return Err(ChainError::PublicKeyNotSet);
        }

        self.issuer = format!(
            "{CHAIN_ISSUER_PREFIX}{}{SEPARATOR}{}",
            parent.id, parent.public_key
        );
        self.issuer_expires_at = parent.expires_at;

        Ok(())
    }

    /// The bytes an organization issuer signs to attest these claims.
    pub fn org_issuer_chain_data(&self) -> Result<Vec<u8>, ChainError> {
        if self.id.is_empty() {
            return Err(ChainError::NoTokenId);
        }
        if self.public_key.is_empty() {
            return Err(ChainError::NoPublicKey);
        }

        Ok(format!("{}{SEPARATOR}{}", self.id, self.public_key).into_bytes())
    }

    /// The bytes a delegate signs to attest these claims, `parent_proof`
    /// being the delegate's own trust chain signature.
    ///
    /// The issuer must already be set with [`StandardClaims::set_chain_issuer`].
    pub fn chain_issuer_data(&self, parent_proof: &str) -> Result<Vec<u8>, ChainError> {
        if self.id.is_empty() {
            return Err(ChainError::IdNotSet);
        }
        if self.issuer.is_empty() {
            return Err(ChainError::IssuerNotSet);
        }

        let Some(data) = self.issuer.strip_prefix(CHAIN_ISSUER_PREFIX) else {
            return Err(ChainError::InvalidIssuerPrefix);
        };
        if data.split(SEPARATOR).count() != 2 {
            return Err(ChainError::InvalidIssuerData);
        }

        Ok(format!("{}{SEPARATOR}{parent_proof}", self.id).into_bytes())
    }

    /// Store the organization issuer's signature as the trust chain signature.
    pub fn set_chain_issuer_trust_signature(&mut self, signature: &[u8]) {
        self.trust_chain_signature = TrustChain::Org {
            signature: signature.to_vec(),
        }
        .encode();
    }

    /// Store a delegate's signature combined with the delegate's own proof.
    pub fn set_chain_user_trust_signature(
        &mut self,
        parent: &StandardClaims,
        signature: &[u8],
    ) -> Result<(), ChainError> {
        if parent.trust_chain_signature.is_empty() {
            return Err(ChainError::NoTrustChainSignature);
        }

        self.trust_chain_signature = TrustChain::Delegated {
            parent: parent.trust_chain_signature.clone(),
            signature: signature.to_vec(),
        }
        .encode();

        Ok(())
    }

    /// Set the issuer and trust chain signature for claims issued directly by
    /// the organization issuer `root`.
    pub fn add_org_issuer_data(&mut self, root: &SigningKey) -> Result<(), ChainError> {
        let SigningKey::Ed25519(root) = root else {
            return Err(ChainError::UnsupportedKeyType);
        };

        self.set_org_issuer(&root.verifying_key());
        let data = self.org_issuer_chain_data()?;
        let signature = root.sign(&data);
        self.set_chain_issuer_trust_signature(&signature.to_bytes());

        Ok(())
    }

    /// Set the issuer and trust chain signature for claims issued by the
    /// delegate holding `parent`, signing with the delegate's `key`.
    pub fn add_chain_issuer_data(
        &mut self,
        parent: &StandardClaims,
        key: &SigningKey,
    ) -> Result<(), ChainError> {
        let SigningKey::Ed25519(key) = key else {
            return Err(ChainError::UnsupportedKeyType);
        };
        if decode_ed25519_public_key(&parent.public_key).ok() != Some(key.verifying_key()) {
            return Err(ChainError::KeyMismatch);
        }

        self.set_chain_issuer(parent)?;
        let data = self.chain_issuer_data(&parent.trust_chain_signature)?;
        let signature = key.sign(&data);
        self.set_chain_user_trust_signature(parent, &signature.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(id: &str, public_key: &str) -> StandardClaims {
        StandardClaims {
            id: id.to_string(),
            public_key: public_key.to_string(),
            expires_at: Some(1_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_org_issuer() {
        let key = SigningKey::generate_ed25519().verifying_key().unwrap();
        let mut c = StandardClaims::default();
        c.set_org_issuer(&key);
        assert_eq!(c.issuer, format!("I-{}", hex::encode(key.as_bytes())));
    }

    #[test]
    fn test_set_chain_issuer() {
        let mut c = StandardClaims::default();

        assert_eq!(
            c.set_chain_issuer(&claims("", "abcd")).unwrap_err(),
            ChainError::IdNotSet
        );
        assert_eq!(
            c.set_chain_issuer(&claims("x", "")).unwrap_err(),
            ChainError::PublicKeyNotSet
        );

        c.set_chain_issuer(&claims("x", "abcd")).unwrap();
        assert_eq!(c.issuer, "C-x.abcd");
        assert_eq!(c.issuer_expires_at, Some(1_000));
    }

    #[test]
    fn test_org_issuer_chain_data() {
        assert_eq!(
            claims("", "abcd").org_issuer_chain_data().unwrap_err(),
            ChainError::NoTokenId
        );
        assert_eq!(
            claims("x", "").org_issuer_chain_data().unwrap_err(),
            ChainError::NoPublicKey
        );
        assert_eq!(
            claims("x", "abcd").org_issuer_chain_data().unwrap(),
            b"x.abcd".to_vec()
        );
    }

    #[test]
    fn test_chain_issuer_data() {
        let mut c = claims("", "");
        assert_eq!(c.chain_issuer_data("p").unwrap_err(), ChainError::IdNotSet);

        c.id = "child".to_string();
        assert_eq!(
            c.chain_issuer_data("p").unwrap_err(),
            ChainError::IssuerNotSet
        );

        c.issuer = "I-abcd".to_string();
        assert_eq!(
            c.chain_issuer_data("p").unwrap_err(),
            ChainError::InvalidIssuerPrefix
        );

        c.issuer = "C-abcd".to_string();
        assert_eq!(
            c.chain_issuer_data("p").unwrap_err(),
            ChainError::InvalidIssuerData
        );

        c.issuer = "C-parent.abcd".to_string();
        assert_eq!(c.chain_issuer_data("p").unwrap(), b"child.p".to_vec());
    }

    #[test]
    fn test_trust_signatures() {
        let mut parent = claims("parent", "abcd");
        parent.set_chain_issuer_trust_signature(&[0x01, 0x02]);
        assert_eq!(parent.trust_chain_signature, "0102");

        let mut child = claims("child", "");
        assert_eq!(
            child
                .set_chain_user_trust_signature(&claims("p", "k"), &[0xff])
                .unwrap_err(),
            ChainError::NoTrustChainSignature
        );

        child.set_chain_user_trust_signature(&parent, &[0xff]).unwrap();
        assert_eq!(child.trust_chain_signature, "0102.ff");
    }

    #[test]
    fn test_add_chain_issuer_data_checks_key() {
        let delegate = SigningKey::generate_ed25519();
        let other = SigningKey::generate_ed25519();
        let root = SigningKey::generate_ed25519();

        let mut parent = claims("parent", "");
        parent.set_public_key(&delegate.verifying_key().unwrap());
        parent.add_org_issuer_data(&root).unwrap();

        let mut child = claims("child", "");
        assert_eq!(
            child.add_chain_issuer_data(&parent, &other).unwrap_err(),
            ChainError::KeyMismatch
        );

        child.add_chain_issuer_data(&parent, &delegate).unwrap();
        assert!(child.issuer.starts_with("C-parent."));
        assert!(
            child
                .trust_chain_signature
                .starts_with(&parent.trust_chain_signature)
        );
    }
}
