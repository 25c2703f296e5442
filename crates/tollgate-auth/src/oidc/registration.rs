//! OpenID Connect dynamic client registration requests and results.
//!
//! A registration request carries exactly one selector:
//!
//! - a [`ClientRegistration`] payload: register a new client, or update an
//!   existing one when the payload names its `client_id`
//! - a bare client id: read the client, or delete it when the delete flag is
//!   set
//!
//! The caller is represented by any [`Principal`] (usually a
//! [`BearerPrincipal`](crate::types::BearerPrincipal) built from the initial
//! or registration access token).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::client::RegisteredClient;
use crate::types::principal::Principal;
use crate::types::scope::format_scope;

/// Path of the client configuration endpoint, relative to the issuer.
pub const REGISTRATION_ENDPOINT_PATH: &str = "/connect/register";

// =============================================================================
// Metadata
// =============================================================================

/// Client metadata (RFC 7591 §2, OIDC Dynamic Client Registration §2).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Set on update requests and on every response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Grant type tags. Empty means `authorization_code`.
    #[serde(default)]
    pub grant_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,

    /// Space-separated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl ClientRegistration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    #[must_use]
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_types.push(grant_type.into());
        self
    }

    #[must_use]
    pub fn with_token_endpoint_auth_method(mut self, method: impl Into<String>) -> Self {
        self.token_endpoint_auth_method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Metadata describing a stored client.
    #[must_use]
    pub fn from_client(client: &RegisteredClient) -> Self {
        let auth_method = client.token_endpoint_auth_method.as_str().to_string();
        Self {
            client_id: Some(client.client_id.clone()),
            client_name: Some(client.client_name.clone()),
            redirect_uris: client.redirect_uris.clone(),
            grant_types: client
                .grant_types
                .iter()
                .map(|g| g.as_str().to_string())
                .collect(),
            token_endpoint_auth_method: Some(auth_method),
            scope: (!client.scopes.is_empty()).then(|| format_scope(&client.scopes)),
        }
    }
}

// =============================================================================
// Request
// =============================================================================

/// What a registration request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationAction {
    Register,
    Read,
    Update,
    Delete,
}

impl RegistrationAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RegistrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum Selector {
    Registration(ClientRegistration),
    ClientId(String),
}

/// A validated client registration request.
///
/// `is_authenticated()` is fixed from the principal when the request is
/// built and cannot be changed afterwards.
#[derive(Debug, Clone)]
pub struct ClientRegistrationRequest {
    issuer: String,
    principal: Arc<dyn Principal>,
    selector: Selector,
    delete: bool,
    authenticated: bool,
}

impl ClientRegistrationRequest {
    #[must_use]
    pub fn builder() -> ClientRegistrationRequestBuilder {
        ClientRegistrationRequestBuilder::default()
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn principal(&self) -> &Arc<dyn Principal> {
        &self.principal
    }

    /// The metadata payload, for register and update requests.
    #[must_use]
    pub fn client_registration(&self) -> Option<&ClientRegistration> {
        match &self.selector {
            Selector::Registration(registration) => Some(registration),
            Selector::ClientId(_) => None,
        }
    }

    /// The bare client id, for read and delete requests.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        match &self.selector {
            Selector::ClientId(client_id) => Some(client_id),
            Selector::Registration(_) => None,
        }
    }

    /// The existing client this request operates on, if any.
    #[must_use]
    pub fn target_client_id(&self) -> Option<&str> {
        match &self.selector {
            Selector::ClientId(client_id) => Some(client_id),
            Selector::Registration(registration) => registration.client_id.as_deref(),
        }
    }

    #[must_use]
    pub fn action(&self) -> RegistrationAction {
        match &self.selector {
            Selector::Registration(registration) if registration.client_id.is_some() => {
                RegistrationAction::Update
            }
            Selector::Registration(_) => RegistrationAction::Register,
            Selector::ClientId(_) if self.delete => RegistrationAction::Delete,
            Selector::ClientId(_) => RegistrationAction::Read,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Registration requests carry no credentials of their own.
    #[must_use]
    pub fn credentials(&self) -> &'static str {
        ""
    }
}

/// Builder for [`ClientRegistrationRequest`].
#[derive(Default)]
pub struct ClientRegistrationRequestBuilder {
    issuer: Option<String>,
    principal: Option<Arc<dyn Principal>>,
    registration: Option<ClientRegistration>,
    client_id: Option<String>,
    delete: bool,
}

impl ClientRegistrationRequestBuilder {
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn principal(mut self, principal: Arc<dyn Principal>) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn client_registration(mut self, registration: ClientRegistration) -> Self {
        self.registration = Some(registration);
        self
    }

    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Turns a read request into a delete request.
    #[must_use]
    pub fn delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    /// Validates and builds the request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty issuer, a missing principal, both or
    /// neither selectors, an empty client id, or a delete flag on a
    /// metadata payload.
    pub fn build(self) -> AuthResult<ClientRegistrationRequest> {
        let issuer = self
            .issuer
            .filter(|issuer| !issuer.is_empty())
            .ok_or_else(|| AuthError::invalid_request("issuer cannot be empty"))?;
        let principal = self
            .principal
            .ok_or_else(|| AuthError::invalid_request("principal cannot be null"))?;

        let selector = match (self.registration, self.client_id) {
            (Some(_), Some(_)) => {
                return Err(AuthError::invalid_request(
                    "clientRegistration and clientId cannot both be set",
                ));
            }
            (None, None) => {
                return Err(AuthError::invalid_request(
                    "either clientRegistration or clientId is required",
                ));
            }
            (Some(_), None) if self.delete => {
                return Err(AuthError::invalid_request("delete requires a clientId"));
            }
            (Some(registration), None) => Selector::Registration(registration),
            (None, Some(client_id)) if client_id.is_empty() => {
                return Err(AuthError::invalid_request("clientId cannot be empty"));
            }
            (None, Some(client_id)) => Selector::ClientId(client_id),
        };

        let authenticated = principal.is_authenticated();
        Ok(ClientRegistrationRequest {
            issuer,
            principal,
            selector,
            delete: self.delete,
            authenticated,
        })
    }
}

// =============================================================================
// Result
// =============================================================================

/// Client information response (RFC 7591 §3.2.1, RFC 7592 §3).
#[derive(Clone, Serialize)]
pub struct ClientRegistrationResult {
    /// Stored metadata, `client_id` always set.
    #[serde(flatten)]
    pub registration: ClientRegistration,

    /// Seconds since the epoch.
    pub client_id_issued_at: i64,

    /// Plaintext secret, only when one was just generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Seconds since the epoch; `0` means the secret never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,

    /// Only on registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_access_token: Option<String>,

    pub registration_client_uri: String,
}

impl ClientRegistrationResult {
    /// Builds the response for a stored client.
    ///
    /// # Errors
    ///
    /// `Configuration` if the issuer is not an absolute URL.
    pub fn for_client(issuer: &str, client: &RegisteredClient) -> AuthResult<Self> {
        Ok(Self {
            registration: ClientRegistration::from_client(client),
            client_id_issued_at: client.client_id_issued_at.unix_timestamp(),
            client_secret: None,
            client_secret_expires_at: client
                .client_secret
                .as_ref()
                .map(|_| client.client_secret_expires_at.map_or(0, OffsetDateTime::unix_timestamp)),
            registration_access_token: None,
            registration_client_uri: registration_client_uri(issuer, &client.client_id)?,
        })
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: Option<String>) -> Self {
        self.client_secret = secret;
        self
    }

    #[must_use]
    pub fn with_registration_access_token(mut self, token: String) -> Self {
        self.registration_access_token = Some(token);
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        self.registration.client_id.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for ClientRegistrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistrationResult")
            .field("registration", &self.registration)
            .field("client_id_issued_at", &self.client_id_issued_at)
            .field("client_secret", &redacted(&self.client_secret))
            .field("client_secret_expires_at", &self.client_secret_expires_at)
            .field(
                "registration_access_token",
                &redacted(&self.registration_access_token),
            )
            .field("registration_client_uri", &self.registration_client_uri)
            .finish()
    }
}

fn redacted<T>(value: &Option<T>) -> Option<&'static str> {
    value.as_ref().map(|_| "[REDACTED]")
}

/// `{issuer}/connect/register?client_id={client_id}`.
///
/// # Errors
///
/// `Configuration` if the issuer is not an absolute URL.
pub fn registration_client_uri(issuer: &str, client_id: &str) -> AuthResult<String> {
    let mut url = Url::parse(issuer)
        .map_err(|e| AuthError::configuration(format!("issuer is not a valid URL: {e}")))?;
    let path = format!(
        "{}{REGISTRATION_ENDPOINT_PATH}",
        url.path().trim_end_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair("client_id", client_id);
    Ok(url.into())
}
