//! Authenticated identities consumed by the grant core.
//!
//! Client authentication and bearer-token validation happen upstream. The
//! grant core only ever receives their results:
//!
//! - [`ClientPrincipal`] - a client authenticated at the token endpoint
//! - [`BearerPrincipal`] - the holder of a validated bearer token (used by
//!   client registration, where the caller is not necessarily a client)
//!
//! Both implement [`Principal`]. Neither carries a plaintext secret.

use std::fmt;

use crate::types::client::{RegisteredClient, TokenEndpointAuthMethod};
use crate::types::scope::Scopes;

/// Any authenticated (or authentication-attempting) identity.
pub trait Principal: fmt::Debug + Send + Sync {
    /// Name of the identity (client id, subject, ...).
    fn name(&self) -> &str;

    /// Whether upstream authentication succeeded for this identity.
    fn is_authenticated(&self) -> bool;

    /// Whether the identity holds the given scope.
    fn has_scope(&self, _scope: &str) -> bool {
        false
    }

    /// The client this identity is bound to, if any.
    fn bound_client_id(&self) -> Option<&str> {
        None
    }
}

/// Result of client authentication at the token endpoint.
#[derive(Debug, Clone)]
pub struct ClientPrincipal {
    client: RegisteredClient,
    auth_method: TokenEndpointAuthMethod,
    authenticated: bool,
}

impl ClientPrincipal {
    /// Creates a principal for a client that passed authentication.
    #[must_use]
    pub fn authenticated(client: RegisteredClient, auth_method: TokenEndpointAuthMethod) -> Self {
        Self {
            client,
            auth_method,
            authenticated: true,
        }
    }

    /// Creates a principal for a client whose authentication has not
    /// succeeded. Grant requests carrying it are rejected by the dispatcher.
    #[must_use]
    pub fn unauthenticated(client: RegisteredClient) -> Self {
        let auth_method = client.token_endpoint_auth_method;
        Self {
            client,
            auth_method,
            authenticated: false,
        }
    }

    /// The registered client.
    #[must_use]
    pub fn client(&self) -> &RegisteredClient {
        &self.client
    }

    /// Shorthand for `client().client_id`.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    /// The method the client authenticated with.
    #[must_use]
    pub fn auth_method(&self) -> TokenEndpointAuthMethod {
        self.auth_method
    }

    /// Returns `true` if the client authenticated without a secret.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.auth_method == TokenEndpointAuthMethod::None
    }
}

impl Principal for ClientPrincipal {
    fn name(&self) -> &str {
        self.client_id()
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn has_scope(&self, scope: &str) -> bool {
        self.client.scopes.contains(scope)
    }

    fn bound_client_id(&self) -> Option<&str> {
        Some(self.client_id())
    }
}

/// The holder of a bearer access token that was validated upstream.
///
/// Client registration is authorized by initial access tokens (scope
/// `client.create`) and registration access tokens (scope `client.read`,
/// bound to one client).
#[derive(Debug, Clone)]
pub struct BearerPrincipal {
    subject: String,
    client_id: Option<String>,
    scopes: Scopes,
    authenticated: bool,
}

impl BearerPrincipal {
    /// Creates a principal for a validated bearer token.
    #[must_use]
    pub fn new(subject: impl Into<String>, scopes: Scopes) -> Self {
        Self {
            subject: subject.into(),
            client_id: None,
            scopes,
            authenticated: true,
        }
    }

    /// Creates a principal for a bearer token that failed validation.
    #[must_use]
    pub fn unauthenticated(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            client_id: None,
            scopes: Scopes::new(),
            authenticated: false,
        }
    }

    /// Binds the token to a client.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Scopes carried by the token.
    #[must_use]
    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }
}

impl Principal for BearerPrincipal {
    fn name(&self) -> &str {
        &self.subject
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    fn bound_client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}
