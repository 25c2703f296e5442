//! Token issuer interface.
//!
//! Grant providers decide *what* to issue; a [`TokenIssuer`] decides *how*
//! the token value looks (opaque handle, signed JWT, ...). The core only
//! ever stores the hash of the returned value.

use std::collections::HashMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::types::record::{TokenKind, TokenRecord};
use crate::types::scope::Scopes;

/// Everything an issuer needs to mint one token.
#[derive(Debug, Clone)]
pub struct TokenIssueRequest {
    /// Which token to mint.
    pub kind: TokenKind,

    /// Issuer the token is bound to.
    pub issuer: Option<String>,

    /// Client the token is issued to.
    pub client_id: String,

    /// Resource owner the token represents.
    pub subject: String,

    /// Scopes the token carries.
    pub scopes: Scopes,

    /// How long the token is valid.
    pub lifetime: Duration,

    /// Extra claims (e.g. `nonce` for ID tokens).
    pub claims: HashMap<String, serde_json::Value>,
}

impl TokenIssueRequest {
    /// Creates a request with no issuer, scopes or claims.
    #[must_use]
    pub fn new(
        kind: TokenKind,
        client_id: impl Into<String>,
        subject: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        Self {
            kind,
            issuer: None,
            client_id: client_id.into(),
            subject: subject.into(),
            scopes: Scopes::new(),
            lifetime,
            claims: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<&str>) -> Self {
        self.issuer = issuer.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Scopes) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_claim(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

/// A freshly minted token. The only place a token value exists in plaintext.
#[derive(Clone)]
pub struct IssuedToken {
    /// Token value handed to the client.
    pub value: String,

    /// Token kind.
    pub kind: TokenKind,

    /// `token_type` for the response, normally `Bearer`.
    pub token_type: String,

    /// When the token was minted.
    pub issued_at: OffsetDateTime,

    /// When the token expires.
    pub expires_at: Option<OffsetDateTime>,

    /// Scopes the token carries.
    pub scopes: Scopes,
}

impl IssuedToken {
    /// Seconds until expiry, for the `expires_in` response field.
    #[must_use]
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_at
            .map(|exp| (exp - self.issued_at).whole_seconds().max(0) as u64)
    }

    /// Hashed form for storage on an authorization record.
    #[must_use]
    pub fn to_record(&self) -> TokenRecord {
        TokenRecord::new(&self.value, self.issued_at, self.expires_at)
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("kind", &self.kind)
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Mints token values.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mints one token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the token cannot be produced.
    async fn issue(&self, request: &TokenIssueRequest) -> AuthResult<IssuedToken>;
}
