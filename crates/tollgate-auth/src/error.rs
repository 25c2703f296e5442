//! Authentication and authorization error types.
//!
//! Every failure the grant core can produce is an [`AuthError`]. Each variant
//! maps onto a standard OAuth 2.0 / OIDC error code via
//! [`AuthError::oauth_error_code`], which the dispatching layer uses to build
//! the protocol-visible response.

use std::fmt;

/// Errors that can occur while authenticating a grant or registration request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a required parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// Client authentication failed or the client is unknown.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization grant or refresh token is invalid, expired, revoked,
    /// or was issued to another client.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The requested scope is invalid or exceeds what was granted.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The client is not allowed to use the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client is not authorized.
        message: String,
    },

    /// No provider is registered for the grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The bearer token presented to a protected operation is invalid.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The bearer token lacks the scope required by the operation.
    #[error("Insufficient scope: {required} is required")]
    InsufficientScope {
        /// The scope the operation requires.
        required: String,
    },

    /// Client registration metadata is invalid.
    #[error("Invalid client metadata: {message}")]
    InvalidClientMetadata {
        /// Description of the offending metadata.
        message: String,
    },

    /// A redirect URI in client registration metadata is invalid.
    #[error("Invalid redirect URI: {message}")]
    InvalidRedirectUri {
        /// Description of why the redirect URI is invalid.
        message: String,
    },

    /// The device authorization is still pending end-user interaction.
    #[error("Authorization pending")]
    AuthorizationPending,

    /// The client is polling the device endpoint too frequently.
    #[error("Slow down")]
    SlowDown,

    /// The resource owner denied the authorization.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// The device code has expired.
    #[error("Expired token: {message}")]
    ExpiredToken {
        /// Description of what expired.
        message: String,
    },

    /// A compare-and-swap save lost against a concurrent update.
    #[error("Concurrent modification: {message}")]
    Conflict {
        /// Description of the conflicting update.
        message: String,
    },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// A store or issuer call did not complete within its deadline.
    #[error("Timed out: {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `InsufficientScope` error.
    #[must_use]
    pub fn insufficient_scope(required: impl Into<String>) -> Self {
        Self::InsufficientScope {
            required: required.into(),
        }
    }

    /// Creates a new `InvalidClientMetadata` error.
    #[must_use]
    pub fn invalid_client_metadata(message: impl Into<String>) -> Self {
        Self::InvalidClientMetadata {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRedirectUri` error.
    #[must_use]
    pub fn invalid_redirect_uri(message: impl Into<String>) -> Self {
        Self::InvalidRedirectUri {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `ExpiredToken` error.
    #[must_use]
    pub fn expired_token(message: impl Into<String>) -> Self {
        Self::ExpiredToken {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (`server_error` code).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Timeout { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if the caller may retry the same request.
    ///
    /// Only transient infrastructure failures qualify. Nothing in this crate
    /// retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if this error belongs to the RFC 8628 polling family.
    #[must_use]
    pub fn is_device_polling_error(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationPending
                | Self::SlowDown
                | Self::AccessDenied { .. }
                | Self::ExpiredToken { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } | Self::InvalidGrant { .. } | Self::Conflict { .. } => {
                ErrorCategory::Authentication
            }
            Self::InvalidScope { .. }
            | Self::UnauthorizedClient { .. }
            | Self::InsufficientScope { .. }
            | Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::InvalidToken { .. } | Self::ExpiredToken { .. } => ErrorCategory::Token,
            Self::InvalidRequest { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::InvalidClientMetadata { .. }
            | Self::InvalidRedirectUri { .. } => ErrorCategory::Validation,
            Self::AuthorizationPending | Self::SlowDown => ErrorCategory::Pending,
            Self::Storage { .. } | Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidToken { .. } => "invalid_token",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::InvalidClientMetadata { .. } => "invalid_client_metadata",
            Self::InvalidRedirectUri { .. } => "invalid_redirect_uri",
            Self::AuthorizationPending => "authorization_pending",
            Self::SlowDown => "slow_down",
            Self::AccessDenied { .. } => "access_denied",
            Self::ExpiredToken { .. } => "expired_token",
            // A lost compare-and-swap means the grant was spent concurrently.
            Self::Conflict { .. } => "invalid_grant",
            Self::Storage { .. }
            | Self::Timeout { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => "server_error",
        }
    }
}

/// Categories of authentication/authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client or grant verification failed.
    Authentication,
    /// Permission checks failed.
    Authorization,
    /// Bearer or device token problems.
    Token,
    /// Request validation errors.
    Validation,
    /// Device flow still in progress.
    Pending,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Pending => write!(f, "pending"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
