//! Token endpoint types.
//!
//! [`TokenRequest`] is the decoded form body of a token request. It is turned
//! into a typed [`GrantRequest`] once the client has been authenticated;
//! [`TokenResponse`] and [`TokenError`] are the RFC 6749 §5.1/§5.2 bodies a
//! transport renders from the outcome.
//!
//! `grant_type` values other than `authorization_code`, `refresh_token`,
//! `client_credentials` and the device code URN are routed as extension
//! grants.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AuthResult;
use crate::error::AuthError;
use crate::grant::request::{GrantRequest, GrantRequestBuilder};
use crate::types::grant_type::GrantType;
use crate::types::principal::ClientPrincipal;
use crate::types::scope::parse_scope;

/// RFC 7523 client authentication parameters. They belong to client
/// authentication and are dropped from the grant request.
const CLIENT_ASSERTION_PARAMETERS: [&str; 2] = ["client_assertion", "client_assertion_type"];

/// Decoded `application/x-www-form-urlencoded` token request.
///
/// Which fields must be present depends on `grant_type`; the grant request
/// builder reports the missing ones.
///
/// Parameters without a dedicated field are collected in `extra` and become
/// the request's additional parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Only read by client authentication.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Only read by client authentication.
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub device_code: Option<String>,

    /// Requested scope, space-separated.
    #[serde(default)]
    pub scope: Option<String>,

    /// Any other parameters.
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl TokenRequest {
    /// Builds the typed grant request for an authenticated client.
    ///
    /// Client authentication parameters never reach the grant request. For
    /// extension grants every non-authentication parameter, including
    /// `scope`, is carried as an additional parameter.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for a missing `grant_type`, a missing grant-specific
    /// parameter, or an empty issuer.
    pub fn into_grant_request(
        self,
        issuer: &str,
        principal: Arc<ClientPrincipal>,
    ) -> AuthResult<GrantRequest> {
        if self.grant_type.is_empty() {
            return Err(AuthError::invalid_request("grant_type is required"));
        }
        let grant_type = GrantType::from(self.grant_type.as_str());

        let mut builder = GrantRequestBuilder::new()
            .issuer(issuer)
            .client_principal(principal);
        for (name, value) in self.extra {
            if CLIENT_ASSERTION_PARAMETERS.contains(&name.as_str()) {
                continue;
            }
            builder = builder.additional_parameter(name, value);
        }

        let request = match grant_type {
            GrantType::AuthorizationCode => builder
                .authorization_code(
                    self.code.unwrap_or_default(),
                    self.redirect_uri,
                    self.code_verifier,
                )?
                .into(),
            GrantType::RefreshToken => builder
                .refresh_token(
                    self.refresh_token.unwrap_or_default(),
                    self.scope.as_deref().map(parse_scope).unwrap_or_default(),
                )?
                .into(),
            GrantType::ClientCredentials => builder
                .client_credentials(self.scope.as_deref().map(parse_scope).unwrap_or_default())?
                .into(),
            GrantType::DeviceCode => builder
                .device_code(self.device_code.unwrap_or_default())?
                .into(),
            extension @ GrantType::Extension(_) => {
                let carried = [
                    ("code", self.code),
                    ("redirect_uri", self.redirect_uri),
                    ("code_verifier", self.code_verifier),
                    ("refresh_token", self.refresh_token),
                    ("device_code", self.device_code),
                    ("scope", self.scope),
                ];
                for (name, value) in carried {
                    if let Some(value) = value {
                        builder = builder.additional_parameter(name, value);
                    }
                }
                builder.extension(extension)?.into()
            }
        };
        Ok(request)
    }
}

/// Successful token response (RFC 6749 §5.1).
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "2YotnFZFEjr1zCsicMWpAA",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid scope1",
///   "refresh_token": "tGzv3JOkF0XG5Qx2TlKWIA"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type, usually "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Granted scopes (space-separated).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (if openid scope was granted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Extension response parameters, serialized alongside the standard ones.
    #[serde(flatten)]
    pub additional_parameters: HashMap<String, Value>,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(
        access_token: String,
        token_type: String,
        expires_in: Option<u64>,
        scope: String,
    ) -> Self {
        Self {
            access_token,
            token_type,
            expires_in,
            scope,
            refresh_token: None,
            id_token: None,
            additional_parameters: HashMap::new(),
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }

    /// Sets the ID token.
    #[must_use]
    pub fn with_id_token(mut self, token: String) -> Self {
        self.id_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: String, value: Value) -> Self {
        self.additional_parameters.insert(name, value);
        self
    }
}

/// Token error response (RFC 6749 §5.2).
///
/// # Example Response
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "Authorization code expired"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TokenError {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenError {
    #[must_use]
    pub fn new(error: TokenErrorCode) -> Self {
        Self {
            error,
            error_description: None,
        }
    }

    #[must_use]
    pub fn with_description(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }

    /// HTTP status a transport should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.error.http_status()
    }
}

impl From<&AuthError> for TokenError {
    /// Server-side failures are rendered without their internal message.
    fn from(error: &AuthError) -> Self {
        let code = TokenErrorCode::from(error);
        match (code, error) {
            (TokenErrorCode::ServerError, _) => Self::with_description(
                code,
                "The authorization server encountered an unexpected condition",
            ),
            (_, AuthError::AuthorizationPending | AuthError::SlowDown) => Self::new(code),
            // A lost race on the record reads as a spent grant to the client.
            (_, AuthError::Conflict { .. }) => {
                Self::with_description(code, "The grant has already been used")
            }
            _ => Self::with_description(code, error.to_string()),
        }
    }
}

impl From<AuthError> for TokenError {
    fn from(error: AuthError) -> Self {
        Self::from(&error)
    }
}

/// OAuth 2.0 error codes answered by the token and registration endpoints.
///
/// RFC 6749 §5.2, RFC 6750 §3.1, RFC 7591 §3.2.2 and RFC 8628 §3.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    InvalidToken,
    InsufficientScope,
    InvalidClientMetadata,
    InvalidRedirectUri,
    AuthorizationPending,
    SlowDown,
    AccessDenied,
    ExpiredToken,
    ServerError,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::InvalidClientMetadata => "invalid_client_metadata",
            Self::InvalidRedirectUri => "invalid_redirect_uri",
            Self::AuthorizationPending => "authorization_pending",
            Self::SlowDown => "slow_down",
            Self::AccessDenied => "access_denied",
            Self::ExpiredToken => "expired_token",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient | Self::InvalidToken => 401,
            Self::InsufficientScope => 403,
            Self::ServerError => 500,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType
            | Self::InvalidScope
            | Self::InvalidClientMetadata
            | Self::InvalidRedirectUri
            | Self::AuthorizationPending
            | Self::SlowDown
            | Self::AccessDenied
            | Self::ExpiredToken => 400,
        }
    }
}

impl From<&AuthError> for TokenErrorCode {
    fn from(error: &AuthError) -> Self {
        match error {
            AuthError::InvalidRequest { .. } => Self::InvalidRequest,
            AuthError::InvalidClient { .. } => Self::InvalidClient,
            AuthError::InvalidGrant { .. } | AuthError::Conflict { .. } => Self::InvalidGrant,
            AuthError::InvalidScope { .. } => Self::InvalidScope,
            AuthError::UnauthorizedClient { .. } => Self::UnauthorizedClient,
            AuthError::UnsupportedGrantType { .. } => Self::UnsupportedGrantType,
            AuthError::InvalidToken { .. } => Self::InvalidToken,
            AuthError::InsufficientScope { .. } => Self::InsufficientScope,
            AuthError::InvalidClientMetadata { .. } => Self::InvalidClientMetadata,
            AuthError::InvalidRedirectUri { .. } => Self::InvalidRedirectUri,
            AuthError::AuthorizationPending => Self::AuthorizationPending,
            AuthError::SlowDown => Self::SlowDown,
            AuthError::AccessDenied { .. } => Self::AccessDenied,
            AuthError::ExpiredToken { .. } => Self::ExpiredToken,
            AuthError::Storage { .. }
            | AuthError::Timeout { .. }
            | AuthError::Configuration { .. }
            | AuthError::Internal { .. } => Self::ServerError,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
