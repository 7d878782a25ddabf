//! Chain of trust data carried in the `iss` and `tcs` claims.
//!
//! A token issued directly by an organization carries `I-<root key>` as
//! issuer and the root's signature over `<id>.<public key>` as trust chain
//! signature. A token issued by a delegate carries `C-<delegate id>.<delegate
//! key>` as issuer and `<delegate tcs>.<signature>` as trust chain signature,
//! the signature being the delegate's over `<id>.<delegate tcs>`.
//!
//! Only the root -> delegate -> holder depth is supported.

mod builder;
mod verifier;

use ed25519_dalek::VerifyingKey;

use crate::error::ChainError;
use crate::keys::decode_ed25519_public_key;

/// Issuer prefix for tokens signed directly by an organization issuer.
pub const ORG_ISSUER_PREFIX: &str = "I-";

/// Issuer prefix for tokens signed by a delegate in a chain.
pub const CHAIN_ISSUER_PREFIX: &str = "C-";

const SEPARATOR: char = '.';

/// The parsed `iss` claim of a chain-attested token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssuer {
    /// `I-<hex root key>`
    Org { public_key: VerifyingKey },

    /// `C-<delegate token id>.<hex delegate key>`
    ///
    /// `encoded_key` keeps the key text as written in the issuer since the
    /// organization issuer signed that exact text.
    Delegate {
        id: String,
        public_key: VerifyingKey,
        encoded_key: String,
    },
}

impl ChainIssuer {
    pub fn parse(issuer: &str) -> Result<Self, ChainError> {
        if let Some(key) = issuer.strip_prefix(ORG_ISSUER_PREFIX) {
            return Ok(ChainIssuer::Org {
                public_key: issuer_key(key)?,
            });
        }

        let Some(data) = issuer.strip_prefix(CHAIN_ISSUER_PREFIX) else {
            return Err(ChainError::UnsupportedIssuer);
        };

        let Some((id, key)) = data.split_once(SEPARATOR) else {
            return Err(ChainError::InvalidIssuerContent);
        };
        if key.contains(SEPARATOR) {
            return Err(ChainError::InvalidIssuerContent);
        }
        if id.is_empty() {
            return Err(ChainError::InvalidIssuerId);
        }

        Ok(ChainIssuer::Delegate {
            id: id.to_string(),
            public_key: issuer_key(key)?,
            encoded_key: key.to_string(),
        })
    }

    pub fn public_key(&self) -> &VerifyingKey {
        match self {
            ChainIssuer::Org { public_key } | ChainIssuer::Delegate { public_key, .. } => {
                public_key
            }
        }
    }
}

fn issuer_key(key: &str) -> Result<VerifyingKey, ChainError> {
    if key.is_empty() {
        return Err(ChainError::MissingIssuerPublicKey);
    }

    decode_ed25519_public_key(key).map_err(|_| ChainError::InvalidIssuerPublicKey)
}

/// The parsed `tcs` claim.
///
/// Signatures are kept as raw bytes; their length is not checked here since
/// a signature of the wrong size simply fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustChain {
    /// The organization issuer's signature over `<id>.<public key>`.
    Org { signature: Vec<u8> },

    /// The delegate's own trust chain signature, followed by the delegate's
    /// signature over `<id>.<parent>`.
    Delegated { parent: String, signature: Vec<u8> },
}

impl TrustChain {
    /// Parse the trust chain signature of an organization issued token.
    pub fn parse_org(tcs: &str) -> Result<Self, ChainError> {
        if tcs.is_empty() || tcs.contains(SEPARATOR) {
            return Err(ChainError::MalformedTrustChain);
        }

        let signature = hex::decode(tcs).map_err(ChainError::TrustChainEncoding)?;

        Ok(TrustChain::Org { signature })
    }

    /// Parse the trust chain signature of a delegate issued token.
    pub fn parse_delegated(tcs: &str) -> Result<Self, ChainError> {
        let segments: Vec<&str> = tcs.split(SEPARATOR).collect();
        let [parent, signature] = segments.as_slice() else {
            return Err(ChainError::MalformedTrustChain);
        };
        if parent.is_empty() || signature.is_empty() {
            return Err(ChainError::MalformedTrustChain);
        }

        hex::decode(parent).map_err(ChainError::TrustChainEncoding)?;
        let signature = hex::decode(signature).map_err(ChainError::ChainSignatureEncoding)?;

        Ok(TrustChain::Delegated {
            parent: parent.to_string(),
            signature,
        })
    }

    pub fn signature(&self) -> &[u8] {
        match self {
            TrustChain::Org { signature } | TrustChain::Delegated { signature, .. } => signature,
        }
    }

    /// The wire form stored in the `tcs` claim.
    pub fn encode(&self) -> String {
        match self {
            TrustChain::Org { signature } => hex::encode(signature),
            TrustChain::Delegated { parent, signature } => {
                format!("{parent}{SEPARATOR}{}", hex::encode(signature))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;

    fn key_hex() -> (VerifyingKey, String) {
        let key = SigningKey::generate_ed25519().verifying_key().unwrap();
        let encoded = hex::encode(key.as_bytes());
        (key, encoded)
    }

    #[test]
    fn test_parse_org_issuer() {
        let (key, encoded) = key_hex();

        let issuer = ChainIssuer::parse(&format!("I-{encoded}")).unwrap();
        assert_eq!(issuer, ChainIssuer::Org { public_key: key });
        assert_eq!(issuer.public_key(), &key);

        assert_eq!(
            ChainIssuer::parse("I-").unwrap_err(),
            ChainError::MissingIssuerPublicKey
        );
        assert_eq!(
            ChainIssuer::parse("I-abcd").unwrap_err(),
            ChainError::InvalidIssuerPublicKey
        );
    }

    #[test]
    fn test_parse_chain_issuer() {
        let (key, encoded) = key_hex();

        let issuer = ChainIssuer::parse(&format!("C-abc.{encoded}")).unwrap();
        assert_eq!(
            issuer,
            ChainIssuer::Delegate {
                id: "abc".to_string(),
                public_key: key,
                encoded_key: encoded.clone(),
            }
        );

        let upper = encoded.to_uppercase();
        let issuer = ChainIssuer::parse(&format!("C-abc.{upper}")).unwrap();
        assert_eq!(issuer.public_key(), &key);
        assert!(matches!(issuer, ChainIssuer::Delegate { encoded_key, .. } if encoded_key == upper));

        let cases = [
            ("C-", ChainError::InvalidIssuerContent),
            ("C-abc", ChainError::InvalidIssuerContent),
            ("C-a.b.c", ChainError::InvalidIssuerContent),
            ("C-.abcd", ChainError::InvalidIssuerId),
            ("C-abc.", ChainError::MissingIssuerPublicKey),
            ("C-abc.xx", ChainError::InvalidIssuerPublicKey),
            ("Choria", ChainError::UnsupportedIssuer),
            ("", ChainError::UnsupportedIssuer),
        ];

        for (issuer, expected) in cases {
            assert_eq!(ChainIssuer::parse(issuer).unwrap_err(), expected, "{issuer}");
        }
    }

    #[test]
    fn test_org_trust_chain() {
        let chain = TrustChain::parse_org("00ff").unwrap();
        assert_eq!(chain.signature(), &[0x00, 0xff]);
        assert_eq!(chain.encode(), "00ff");

        assert_eq!(
            TrustChain::parse_org("").unwrap_err(),
            ChainError::MalformedTrustChain
        );
        assert_eq!(
            TrustChain::parse_org("00.ff").unwrap_err(),
            ChainError::MalformedTrustChain
        );
        assert!(matches!(
            TrustChain::parse_org("zz").unwrap_err(),
            ChainError::TrustChainEncoding(_)
        ));
    }

    #[test]
    fn test_delegated_trust_chain() {
        let chain = TrustChain::parse_delegated("0a0b.ff").unwrap();
        assert_eq!(
            chain,
            TrustChain::Delegated {
                parent: "0a0b".to_string(),
                signature: vec![0xff]
            }
        );
        assert_eq!(chain.encode(), "0a0b.ff");

        for malformed in ["", "0a0b", "0a0b.", ".ff", "0a.0b.ff"] {
            assert_eq!(
                TrustChain::parse_delegated(malformed).unwrap_err(),
                ChainError::MalformedTrustChain,
                "{malformed}"
            );
        }

        assert!(matches!(
            TrustChain::parse_delegated("zz.ff").unwrap_err(),
            ChainError::TrustChainEncoding(_)
        ));
        assert!(matches!(
            TrustChain::parse_delegated("0a.zz").unwrap_err(),
            ChainError::ChainSignatureEncoding(_)
        ));
    }
}
