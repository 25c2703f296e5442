//! OAuth 2.0 grant type tag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// OAuth 2.0 grant types.
///
/// The tag carried by every grant request and used by the dispatcher to pick
/// a provider. Grant types outside the built-in set are represented as
/// [`GrantType::Extension`] so that new grants can be plugged in without
/// touching this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GrantType {
    /// Authorization Code flow (RFC 6749 §4.1).
    AuthorizationCode,
    /// Refresh Token flow (RFC 6749 §6).
    RefreshToken,
    /// Client Credentials flow (confidential clients only).
    ClientCredentials,
    /// Device Authorization Grant (RFC 8628).
    DeviceCode,
    /// Any other grant, identified by its absolute URI or name.
    Extension(String),
}

impl GrantType {
    /// Wire value of the device code grant.
    pub const DEVICE_CODE_URN: &'static str = "urn:ietf:params:oauth:grant-type:device_code";

    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
            Self::DeviceCode => Self::DEVICE_CODE_URN,
            Self::Extension(value) => value,
        }
    }

    /// Returns `true` for grant types this crate ships a provider for.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Extension(_))
    }
}

impl From<&str> for GrantType {
    fn from(value: &str) -> Self {
        match value {
            "authorization_code" => Self::AuthorizationCode,
            "refresh_token" => Self::RefreshToken,
            "client_credentials" => Self::ClientCredentials,
            Self::DEVICE_CODE_URN => Self::DeviceCode,
            other => Self::Extension(other.to_string()),
        }
    }
}

impl From<String> for GrantType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl FromStr for GrantType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for GrantType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GrantType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from(value))
    }
}
