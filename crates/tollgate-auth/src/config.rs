//! Authorization server configuration.
//!
//! Configuration is plain serde data with `#[serde(default)]` on every
//! section, so a TOML file only needs the keys it overrides. Durations are
//! written in humantime form (`"5m"`, `"90d"`).
//!
//! Providers never read [`AuthConfig`] directly; they receive the
//! [`TokenSettings`] projection through the grant context.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::client::RegisteredClient;
use crate::types::grant_type::GrantType;

/// Root configuration.
///
/// # Example (TOML)
///
/// ```toml
/// issuer = "https://auth.example.com"
///
/// [oauth]
/// access_token_lifetime = "15m"
/// refresh_scope_policy = "intersect"
///
/// [registration]
/// enabled = true
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer identifier every grant request is bound to.
    pub issuer: String,

    /// Token endpoint settings.
    pub oauth: OAuthConfig,

    /// Dynamic client registration settings.
    pub registration: RegistrationConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
            registration: RegistrationConfig::default(),
        }
    }
}

/// How a refresh request's scopes are reconciled with the granted scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshScopePolicy {
    /// Every requested scope must have been granted (RFC 6749 §6).
    #[default]
    Subset,

    /// Issue the intersection of requested and granted scopes; reject only
    /// when the intersection is empty.
    Intersect,
}

/// OAuth 2.0 token endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// ID token lifetime.
    #[serde(with = "humantime_serde")]
    pub id_token_lifetime: Duration,

    /// Device code lifetime.
    #[serde(with = "humantime_serde")]
    pub device_code_lifetime: Duration,

    /// Minimum interval between device code polls.
    #[serde(with = "humantime_serde")]
    pub device_poll_interval: Duration,

    /// Rotate refresh tokens on use.
    pub refresh_token_rotation: bool,

    /// Scope reconciliation on refresh.
    pub refresh_scope_policy: RefreshScopePolicy,

    /// Upper bound on every storage call.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,

    /// Grant types the server accepts.
    pub grant_types: Vec<GrantType>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(300), // 5 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            refresh_token_lifetime: Duration::from_secs(90 * 24 * 3600), // 90 days
            id_token_lifetime: Duration::from_secs(1800),          // 30 minutes
            device_code_lifetime: Duration::from_secs(600),        // 10 minutes
            device_poll_interval: Duration::from_secs(5),
            refresh_token_rotation: true,
            refresh_scope_policy: RefreshScopePolicy::Subset,
            store_timeout: Duration::from_secs(5),
            grant_types: vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::ClientCredentials,
                GrantType::DeviceCode,
            ],
        }
    }
}

/// OpenID Connect dynamic client registration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Enable the registration endpoint.
    pub enabled: bool,

    /// Lifetime of the registration access token handed to new clients.
    #[serde(with = "humantime_serde")]
    pub registration_access_token_lifetime: Duration,

    /// Lifetime of generated client secrets. None means they never expire.
    #[serde(default, with = "humantime_serde::option")]
    pub client_secret_lifetime: Option<Duration>,

    /// Scopes given to clients that register without a `scope` value.
    pub default_scopes: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registration_access_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            client_secret_lifetime: None,
            default_scopes: vec!["openid".to_string()],
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration source could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl AuthConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML, otherwise whatever
    /// [`validate`](Self::validate) reports.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the issuer or the grant type list
    /// is empty, and `ConfigError::InvalidValue` if:
    /// - The issuer is not an absolute URL
    /// - A token lifetime or the store timeout is zero
    /// - The device poll interval is shorter than one second
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Missing("issuer".to_string()));
        }

        if url::Url::parse(&self.issuer).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "issuer '{}' is not an absolute URL",
                self.issuer
            )));
        }

        let lifetimes = [
            (
                "authorization_code_lifetime",
                self.oauth.authorization_code_lifetime,
            ),
            ("access_token_lifetime", self.oauth.access_token_lifetime),
            ("refresh_token_lifetime", self.oauth.refresh_token_lifetime),
            ("id_token_lifetime", self.oauth.id_token_lifetime),
            ("device_code_lifetime", self.oauth.device_code_lifetime),
            ("store_timeout", self.oauth.store_timeout),
            (
                "registration_access_token_lifetime",
                self.registration.registration_access_token_lifetime,
            ),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.oauth.device_poll_interval < Duration::from_secs(1) {
            return Err(ConfigError::InvalidValue(
                "device_poll_interval must be at least 1s".to_string(),
            ));
        }

        if self.oauth.grant_types.is_empty() {
            return Err(ConfigError::Missing("oauth.grant_types".to_string()));
        }

        Ok(())
    }

    /// Returns `true` if the grant type is enabled.
    #[must_use]
    pub fn is_grant_type_enabled(&self, grant_type: &GrantType) -> bool {
        self.oauth.grant_types.contains(grant_type)
    }

    /// Builds the settings handed to grant providers.
    #[must_use]
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings::from(self)
    }
}

// =============================================================================
// Token Settings
// =============================================================================

/// Token lifetimes and policies as seen by grant providers.
///
/// Lifetimes are `time::Duration` so they combine directly with
/// `OffsetDateTime`.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub authorization_code_lifetime: time::Duration,
    pub access_token_lifetime: time::Duration,
    pub refresh_token_lifetime: time::Duration,
    pub id_token_lifetime: time::Duration,
    pub device_code_lifetime: time::Duration,
    pub device_poll_interval: time::Duration,
    pub registration_access_token_lifetime: time::Duration,
    pub client_secret_lifetime: Option<time::Duration>,
    pub refresh_token_rotation: bool,
    pub refresh_scope_policy: RefreshScopePolicy,
    pub store_timeout: Duration,
    pub default_client_scopes: Vec<String>,
}

impl TokenSettings {
    /// Access token lifetime for a client, honouring its override.
    #[must_use]
    pub fn access_token_lifetime_for(&self, client: &RegisteredClient) -> time::Duration {
        client
            .access_token_lifetime
            .map(time::Duration::seconds)
            .unwrap_or(self.access_token_lifetime)
    }

    /// Refresh token lifetime for a client, honouring its override.
    #[must_use]
    pub fn refresh_token_lifetime_for(&self, client: &RegisteredClient) -> time::Duration {
        client
            .refresh_token_lifetime
            .map(time::Duration::seconds)
            .unwrap_or(self.refresh_token_lifetime)
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        AuthConfig::default().token_settings()
    }
}

impl From<&AuthConfig> for TokenSettings {
    fn from(config: &AuthConfig) -> Self {
        let oauth = &config.oauth;
        let registration = &config.registration;
        Self {
            authorization_code_lifetime: to_time(oauth.authorization_code_lifetime),
            access_token_lifetime: to_time(oauth.access_token_lifetime),
            refresh_token_lifetime: to_time(oauth.refresh_token_lifetime),
            id_token_lifetime: to_time(oauth.id_token_lifetime),
            device_code_lifetime: to_time(oauth.device_code_lifetime),
            device_poll_interval: to_time(oauth.device_poll_interval),
            registration_access_token_lifetime: to_time(
                registration.registration_access_token_lifetime,
            ),
            client_secret_lifetime: registration.client_secret_lifetime.map(to_time),
            refresh_token_rotation: oauth.refresh_token_rotation,
            refresh_scope_policy: oauth.refresh_scope_policy,
            store_timeout: oauth.store_timeout,
            default_client_scopes: registration.default_scopes.clone(),
        }
    }
}

fn to_time(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}
