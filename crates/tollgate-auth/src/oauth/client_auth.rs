//! Client authentication for the token endpoint.
//!
//! Produces the [`ClientPrincipal`] a grant request carries. Grant requests
//! never see a client secret: authentication happens here, before the typed
//! request is built.
//!
//! The supported `token_endpoint_auth_method` values are `none`,
//! `client_secret_basic` and `client_secret_post`. Credentials are looked for
//! in the `Authorization` header first, then in the form body; a bare
//! `client_id` identifies a public client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::token::TokenRequest;
use crate::storage::{RegisteredClientStore, with_timeout};
use crate::types::client::{RegisteredClient, TokenEndpointAuthMethod};
use crate::types::principal::ClientPrincipal;

/// Credentials presented at the token endpoint.
#[derive(Clone, Default)]
pub struct ClientCredentials {
    /// `(client_id, client_secret)` from an HTTP Basic header.
    pub basic: Option<(String, String)>,

    /// `client_id` from the request body.
    pub client_id: Option<String>,

    /// `client_secret` from the request body.
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    /// Collects credentials from the `Authorization` header value and the
    /// form body.
    ///
    /// # Errors
    ///
    /// `InvalidClient` if a `Basic` header is present but malformed.
    pub fn from_request(authorization: Option<&str>, request: &TokenRequest) -> AuthResult<Self> {
        let basic = match authorization {
            Some(header) if header.trim_start().starts_with("Basic ") => {
                let parsed = parse_basic_auth(header)
                    .ok_or_else(|| AuthError::invalid_client("Malformed Basic credentials"))?;
                Some(parsed)
            }
            _ => None,
        };

        Ok(Self {
            basic,
            client_id: request.client_id.clone(),
            client_secret: request.client_secret.clone(),
        })
    }

    /// Credentials of a public client identified only by `client_id`.
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field(
                "basic",
                &self.basic.as_ref().map(|(id, _)| (id, "[REDACTED]")),
            )
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Turns presented credentials into a client principal.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    /// Authenticates the client.
    ///
    /// # Errors
    ///
    /// `InvalidClient` when the client is unknown, inactive, or its
    /// credentials do not check out.
    async fn authenticate(&self, credentials: &ClientCredentials) -> AuthResult<ClientPrincipal>;
}

/// [`ClientAuthenticator`] backed by a [`RegisteredClientStore`].
#[derive(Clone)]
pub struct StoreClientAuthenticator {
    clients: Arc<dyn RegisteredClientStore>,
    timeout: Duration,
}

impl StoreClientAuthenticator {
    #[must_use]
    pub fn new(clients: Arc<dyn RegisteredClientStore>, timeout: Duration) -> Self {
        Self { clients, timeout }
    }

    async fn load_active(&self, client_id: &str) -> AuthResult<RegisteredClient> {
        let client = with_timeout(
            self.timeout,
            "clients.find_by_client_id",
            self.clients.find_by_client_id(client_id),
        )
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

        if !client.active {
            return Err(AuthError::invalid_client("Client is inactive"));
        }
        Ok(client)
    }

    async fn authenticate_secret(
        &self,
        client_id: &str,
        client_secret: &str,
        method: TokenEndpointAuthMethod,
    ) -> AuthResult<ClientPrincipal> {
        let client = self.load_active(client_id).await?;

        if !client.is_confidential() {
            return Err(AuthError::invalid_client(format!(
                "Public clients cannot use {method} authentication"
            )));
        }

        if client.is_secret_expired() {
            tracing::debug!(client_id, "Client secret expired");
            return Err(AuthError::invalid_client("Client secret has expired"));
        }

        let valid = with_timeout(
            self.timeout,
            "clients.verify_secret",
            self.clients.verify_secret(client_id, client_secret),
        )
        .await?;
        if !valid {
            tracing::debug!(client_id, auth_method = %method, "Invalid client secret");
            return Err(AuthError::invalid_client("Invalid client secret"));
        }

        Ok(ClientPrincipal::authenticated(client, method))
    }

    async fn authenticate_public(&self, client_id: &str) -> AuthResult<ClientPrincipal> {
        let client = self.load_active(client_id).await?;

        if client.is_confidential() {
            return Err(AuthError::invalid_client(
                "Confidential clients must provide client credentials",
            ));
        }

        Ok(ClientPrincipal::authenticated(client, TokenEndpointAuthMethod::None))
    }
}

#[async_trait]
impl ClientAuthenticator for StoreClientAuthenticator {
    async fn authenticate(&self, credentials: &ClientCredentials) -> AuthResult<ClientPrincipal> {
        if let Some((client_id, client_secret)) = &credentials.basic {
            if credentials
                .client_id
                .as_deref()
                .is_some_and(|body_id| body_id != client_id)
            {
                return Err(AuthError::invalid_client(
                    "client_id does not match the authenticated client",
                ));
            }
            return self
                .authenticate_secret(
                    client_id,
                    client_secret,
                    TokenEndpointAuthMethod::ClientSecretBasic,
                )
                .await;
        }

        match (&credentials.client_id, &credentials.client_secret) {
            (Some(client_id), Some(client_secret)) => {
                self.authenticate_secret(
                    client_id,
                    client_secret,
                    TokenEndpointAuthMethod::ClientSecretPost,
                )
                .await
            }
            (Some(client_id), None) => self.authenticate_public(client_id).await,
            (None, _) => Err(AuthError::invalid_client("No client credentials provided")),
        }
    }
}

/// Parses an HTTP Basic Auth header value.
///
/// Returns `Some((client_id, client_secret))` if valid, `None` otherwise.
/// The secret may itself contain colons.
///
/// ```
/// use tollgate_auth::oauth::client_auth::parse_basic_auth;
///
/// let parsed = parse_basic_auth("Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=");
/// assert_eq!(parsed, Some(("client_id".to_string(), "client_secret".to_string())));
/// ```
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = credentials.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }
    Some((client_id.to_string(), client_secret.to_string()))
}
