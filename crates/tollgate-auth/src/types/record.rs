//! Authorization record domain type.
//!
//! An [`AuthorizationRecord`] is the persisted state of one grant: the client
//! and resource owner it binds, the granted scopes, and every token issued
//! under it (authorization code, access token, refresh token, device code,
//! user code, registration access token).
//!
//! # Security
//!
//! - Token values are never stored, only their SHA-256 hashes
//! - Invalidated tokens stay on the record so replays can be detected
//! - `version` supports compare-and-swap saves in the store

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::types::grant_type::GrantType;
use crate::types::scope::Scopes;

/// Attribute key holding the redirect URI of the authorization request.
pub const ATTR_REDIRECT_URI: &str = "redirect_uri";
/// Attribute key holding the PKCE code challenge.
pub const ATTR_CODE_CHALLENGE: &str = "code_challenge";
/// Attribute key holding the PKCE code challenge method.
pub const ATTR_CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
/// Attribute key holding the OIDC nonce.
pub const ATTR_NONCE: &str = "nonce";

/// The slots a token can occupy on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// One-time authorization code.
    AuthorizationCode,
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// OpenID Connect ID token.
    IdToken,
    /// RFC 8628 device code.
    DeviceCode,
    /// RFC 8628 user code.
    UserCode,
    /// RFC 7592 registration access token.
    RegistrationAccessToken,
}

impl TokenKind {
    /// Returns the snake_case name of the slot.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
            Self::DeviceCode => "device_code",
            Self::UserCode => "user_code",
            Self::RegistrationAccessToken => "registration_access_token",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A token issued under an authorization, stored by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// SHA-256 hash of the token value.
    pub token_hash: String,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the token expires (None = no expiration).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,

    /// When the token was invalidated (consumed, rotated, or revoked).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub invalidated_at: Option<OffsetDateTime>,
}

impl TokenRecord {
    /// Creates a record for a plaintext token value, hashing it.
    #[must_use]
    pub fn new(value: &str, issued_at: OffsetDateTime, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            token_hash: Self::hash_token(value),
            issued_at,
            expires_at,
            invalidated_at: None,
        }
    }

    /// Creates a record expiring `lifetime` after `issued_at`.
    #[must_use]
    pub fn with_lifetime(value: &str, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
        Self::new(value, issued_at, Some(issued_at + lifetime))
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| OffsetDateTime::now_utc() > exp)
            .unwrap_or(false)
    }

    /// Returns `true` if this token has been invalidated.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated_at.is_some()
    }

    /// Returns `true` if this token is usable (not expired, not invalidated).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_expired() && !self.is_invalidated()
    }

    /// Marks the token invalidated. Earlier invalidation times are kept.
    pub fn invalidate(&mut self, at: OffsetDateTime) {
        self.invalidated_at.get_or_insert(at);
    }

    /// Hash a token value using SHA-256.
    ///
    /// This is used both when storing new tokens and when looking up
    /// tokens for validation.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate a cryptographically secure random token.
    ///
    /// Returns a 256-bit random value encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_token() -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Progress of an RFC 8628 device authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAuthorizationStatus {
    /// Waiting for the end user to act on the user code.
    Pending,
    /// The end user approved; tokens can be issued once.
    Approved,
    /// The end user denied the request.
    Denied,
    /// Tokens were issued; the device code is spent.
    Consumed,
}

/// Device-flow state attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthorizationState {
    /// Current status.
    pub status: DeviceAuthorizationStatus,

    /// Minimum seconds between polls.
    pub interval_seconds: u64,

    /// When the client last polled the token endpoint.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_polled_at: Option<OffsetDateTime>,
}

impl DeviceAuthorizationState {
    /// Creates a pending state with the given polling interval.
    #[must_use]
    pub fn pending(interval_seconds: u64) -> Self {
        Self {
            status: DeviceAuthorizationStatus::Pending,
            interval_seconds,
            last_polled_at: None,
        }
    }

    /// Returns `true` if a poll at `now` comes sooner than the interval allows.
    #[must_use]
    pub fn is_polling_too_fast(&self, now: OffsetDateTime) -> bool {
        let interval = Duration::seconds(self.interval_seconds as i64);
        self.last_polled_at
            .map(|last| now - last < interval)
            .unwrap_or(false)
    }
}

/// A persisted authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// Client the authorization was granted to.
    pub client_id: String,

    /// Resource owner (the client id itself for client credentials).
    pub principal_name: String,

    /// Grant that created the record.
    pub grant_type: GrantType,

    /// Issuer the authorization is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Scopes the resource owner granted.
    pub scopes: Scopes,

    /// Tokens issued under this authorization, by slot.
    #[serde(default)]
    pub tokens: BTreeMap<TokenKind, TokenRecord>,

    /// Authorization request attributes (redirect URI, PKCE challenge, nonce).
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Device-flow state, present only for device authorizations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceAuthorizationState>,

    /// Optimistic concurrency version, bumped by the store on every save.
    pub version: u64,

    /// When this record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When a token on this record was last exchanged.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_used_at: Option<OffsetDateTime>,
}

impl AuthorizationRecord {
    /// Creates an empty record for a client and resource owner.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        principal_name: impl Into<String>,
        grant_type: GrantType,
        scopes: Scopes,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: client_id.into(),
            principal_name: principal_name.into(),
            grant_type,
            issuer: None,
            scopes,
            tokens: BTreeMap::new(),
            attributes: HashMap::new(),
            device: None,
            version: 0,
            created_at: OffsetDateTime::now_utc(),
            last_used_at: None,
        }
    }

    /// Binds the record to an issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Stores a token in its slot.
    #[must_use]
    pub fn with_token(mut self, kind: TokenKind, token: TokenRecord) -> Self {
        self.tokens.insert(kind, token);
        self
    }

    /// Adds an authorization request attribute.
    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attaches device-flow state.
    #[must_use]
    pub fn with_device(mut self, device: DeviceAuthorizationState) -> Self {
        self.device = Some(device);
        self
    }

    /// Returns the token in the given slot.
    #[must_use]
    pub fn token(&self, kind: TokenKind) -> Option<&TokenRecord> {
        self.tokens.get(&kind)
    }

    /// Returns a mutable reference to the token in the given slot.
    pub fn token_mut(&mut self, kind: TokenKind) -> Option<&mut TokenRecord> {
        self.tokens.get_mut(&kind)
    }

    /// Finds which slot holds a token with the given hash.
    #[must_use]
    pub fn find_token_kind(&self, token_hash: &str) -> Option<TokenKind> {
        self.tokens
            .iter()
            .find(|(_, token)| token.token_hash == token_hash)
            .map(|(kind, _)| *kind)
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }

    /// Invalidates every token on the record.
    ///
    /// Used when an authorization code is replayed (RFC 6749 §4.1.2) and
    /// when a client is deleted.
    pub fn invalidate_all(&mut self, at: OffsetDateTime) {
        for token in self.tokens.values_mut() {
            token.invalidate(at);
        }
    }

    /// Returns `true` if no token on the record is still usable.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.tokens.values().all(|token| !token.is_active())
    }
}
