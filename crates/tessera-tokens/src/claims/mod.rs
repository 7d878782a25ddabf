//! Token claims for clients, servers and provisioning identities.

mod client;
mod provisioning;
mod server;
mod standard;

pub use client::{
    ClientIdClaims, ClientPermissions, parse_client_id_token, parse_client_id_token_unverified,
    parse_client_id_token_with_key_file, unverified_caller_from_client_id_token,
};
pub use provisioning::{
    ProvisioningClaims, parse_provisioning_token, parse_provisioning_token_unverified,
    parse_provisioning_token_with_key_file,
};
pub use server::{
    ServerClaims, ServerPermissions, parse_server_token, parse_server_token_unverified,
    parse_server_token_with_key_file, unverified_identity_from_server_token,
};
pub use standard::StandardClaims;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Indicates what kind of claims a token holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Purpose {
    /// A token without a recognised purpose.
    #[default]
    Unknown,

    /// [`ClientIdClaims`].
    ClientId,

    /// [`ServerClaims`].
    Server,

    /// [`ProvisioningClaims`].
    Provisioning,
}

impl Purpose {
    /// The value stored in the `purpose` claim.
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Unknown => "",
            Purpose::ClientId => "choria_client_id",
            Purpose::Server => "choria_server",
            Purpose::Provisioning => "choria_provisioning",
        }
    }

    pub fn from_claim(value: &str) -> Self {
        match value {
            "choria_client_id" => Purpose::ClientId,
            "choria_server" => Purpose::Server,
            "choria_provisioning" => Purpose::Provisioning,
            _ => Purpose::Unknown,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Purpose::Unknown => "unknown",
            Purpose::ClientId => "client id",
            Purpose::Server => "server",
            Purpose::Provisioning => "provisioning",
        };
        f.write_str(name)
    }
}

impl Serialize for Purpose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Purpose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Purpose::from_claim(&value))
    }
}

/// Claims that can be carried in a signed token.
pub trait Claims: Serialize + DeserializeOwned {
    /// The purpose tokens of this kind carry.
    const PURPOSE: Purpose;

    fn standard(&self) -> &StandardClaims;

    fn standard_mut(&mut self) -> &mut StandardClaims;

    /// Whether the decoded token really is of this kind.
    fn has_expected_purpose(&self) -> bool {
        self.standard().purpose == Self::PURPOSE
    }
}
