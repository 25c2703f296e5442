//! OAuth 2.0 registered client domain types.
//!
//! This module defines the `RegisteredClient` struct and its token endpoint
//! authentication method. Field names follow the OAuth 2.0 Dynamic Client
//! Registration metadata (RFC 7591) where one exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::types::grant_type::GrantType;
use crate::types::scope::Scopes;

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// Token endpoint authentication methods.
///
/// Defined in OpenID Connect Core Section 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// No client authentication (public clients).
    None,

    /// Client secret via HTTP Basic Auth.
    #[default]
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,
}

impl TokenEndpointAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }

    /// Parses a registration metadata value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "client_secret_basic" => Some(Self::ClientSecretBasic),
            "client_secret_post" => Some(Self::ClientSecretPost),
            _ => None,
        }
    }

    /// Returns `true` if this method requires a client secret.
    #[must_use]
    pub fn requires_secret(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Registered Client
// =============================================================================

/// An OAuth 2.0 client registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredClient {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// When the client identifier was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub client_id_issued_at: OffsetDateTime,

    /// Argon2id hash of the client secret (confidential clients only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// When the client secret stops being accepted (None = never).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub client_secret_expires_at: Option<OffsetDateTime>,

    /// Human-readable display name.
    pub client_name: String,

    /// Grant types this client is allowed to use.
    pub grant_types: Vec<GrantType>,

    /// Allowed redirect URIs for the authorization code flow.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes this client may request. Empty means all scopes are allowed.
    #[serde(default)]
    pub scopes: Scopes,

    /// How the client authenticates at the token endpoint.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Whether this client is currently active and can be used.
    pub active: bool,

    /// Whether PKCE is required for the authorization code flow even when
    /// the client is confidential.
    #[serde(default)]
    pub require_pkce: bool,

    /// Access token lifetime in seconds, overriding the server default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<i64>,

    /// Refresh token lifetime in seconds, overriding the server default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime: Option<i64>,
}

impl RegisteredClient {
    /// Creates an active client with the given id, name, and auth method.
    ///
    /// Remaining fields start empty and are filled in with the `with_*`
    /// helpers.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_name: impl Into<String>,
        auth_method: TokenEndpointAuthMethod,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_id_issued_at: OffsetDateTime::now_utc(),
            client_secret: None,
            client_secret_expires_at: None,
            client_name: client_name.into(),
            grant_types: Vec::new(),
            redirect_uris: Vec::new(),
            scopes: Scopes::new(),
            token_endpoint_auth_method: auth_method,
            active: true,
            require_pkce: false,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
        }
    }

    /// Sets the hashed client secret.
    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.client_secret = Some(hash.into());
        self
    }

    /// Sets the allowed grant types.
    #[must_use]
    pub fn with_grant_types(mut self, grant_types: impl IntoIterator<Item = GrantType>) -> Self {
        self.grant_types = grant_types.into_iter().collect();
        self
    }

    /// Sets the allowed redirect URIs.
    #[must_use]
    pub fn with_redirect_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redirect_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the allowed scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is invalid.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.client_name.is_empty() {
            return Err(ClientValidationError::EmptyName);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        // Public clients cannot use client_credentials
        if !self.is_confidential() && self.grant_types.contains(&GrantType::ClientCredentials) {
            return Err(ClientValidationError::PublicClientCredentials);
        }

        if self.is_confidential() && self.client_secret.is_none() {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.grant_types.contains(&GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        Ok(())
    }

    /// Returns `true` if the client authenticates with a secret.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.token_endpoint_auth_method.requires_secret()
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the given scope is allowed for this client.
    ///
    /// An empty scope list means all scopes are allowed.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.contains(scope)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: &GrantType) -> bool {
        self.grant_types.contains(grant_type)
    }

    /// Returns `true` if the client secret has passed its expiry.
    #[must_use]
    pub fn is_secret_expired(&self) -> bool {
        self.client_secret_expires_at
            .map(|exp| OffsetDateTime::now_utc() > exp)
            .unwrap_or(false)
    }
}

/// Errors that can occur when validating a client configuration.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientValidationError {
    /// Client ID is empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Client name is empty.
    #[error("Client name cannot be empty")]
    EmptyName,

    /// No grant types specified.
    #[error("At least one grant type must be specified")]
    NoGrantTypes,

    /// Public client cannot use client_credentials grant.
    #[error("Public clients cannot use client_credentials grant")]
    PublicClientCredentials,

    /// Confidential client is missing a secret.
    #[error("Confidential clients must have a client secret")]
    MissingSecret,

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code grant requires at least one redirect URI")]
    NoRedirectUris,
}
