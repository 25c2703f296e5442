//! Grant request model.
//!
//! Every token-endpoint request becomes one [`GrantRequest`] variant before
//! any business rule runs. Variants share a validated base,
//! [`GrantAuthentication`], holding:
//!
//! - the grant type tag used for dispatch
//! - the issuer the request is bound to (always present on variants)
//! - the authenticated [`ClientPrincipal`], shared and never mutated
//! - an owned, read-only copy of the remaining protocol parameters
//!
//! Requests are built with [`GrantRequestBuilder`], whose terminal methods
//! validate eagerly and fail with `AuthError::InvalidRequest`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tollgate_auth::grant::{GrantAuthenticationRequest, GrantRequestBuilder};
//! use tollgate_auth::types::scope::scopes;
//! use tollgate_auth::types::{ClientPrincipal, RegisteredClient, TokenEndpointAuthMethod};
//!
//! let method = TokenEndpointAuthMethod::ClientSecretBasic;
//! let client = RegisteredClient::new("client-1", "Client", method);
//! let principal = Arc::new(ClientPrincipal::authenticated(client, method));
//!
//! let request = GrantRequestBuilder::new()
//!     .issuer("https://example.com/issuer1")
//!     .client_principal(principal)
//!     .refresh_token("refresh-token", scopes(["scope1"]))
//!     .unwrap();
//!
//! assert_eq!(request.issuer(), Some("https://example.com/issuer1"));
//! assert_eq!(request.credentials(), "");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::grant_type::GrantType;
use crate::types::principal::ClientPrincipal;
use crate::types::scope::Scopes;

// =============================================================================
// Additional Parameters
// =============================================================================

/// Read-only protocol parameters attached to a grant request.
///
/// Always an owned copy of what the caller supplied; there is no way to
/// obtain a mutable view after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AdditionalParameters(HashMap<String, Value>);

impl AdditionalParameters {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns a parameter if it is a JSON string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&HashMap<String, Value>> for AdditionalParameters {
    fn from(source: &HashMap<String, Value>) -> Self {
        Self(source.clone())
    }
}

// =============================================================================
// Shared Base
// =============================================================================

/// Validated fields shared by every grant request.
#[derive(Debug, Clone)]
pub struct GrantAuthentication {
    grant_type: GrantType,
    issuer: Option<String>,
    client_principal: Arc<ClientPrincipal>,
    additional_parameters: AdditionalParameters,
}

impl GrantAuthentication {
    fn new(
        grant_type: GrantType,
        issuer: Option<String>,
        client_principal: Option<Arc<ClientPrincipal>>,
        additional_parameters: AdditionalParameters,
    ) -> AuthResult<Self> {
        let issuer = match issuer {
            Some(issuer) if !issuer.is_empty() => issuer,
            _ => return Err(AuthError::invalid_request("issuer cannot be empty")),
        };
        let client_principal = client_principal
            .ok_or_else(|| AuthError::invalid_request("clientPrincipal cannot be null"))?;

        Ok(Self {
            grant_type,
            issuer: Some(issuer),
            client_principal,
            additional_parameters,
        })
    }

    /// Builds a base without an issuer.
    ///
    /// Kept for callers that predate issuer binding. The result cannot be
    /// turned into a [`GrantRequest`], so no provider ever sees it.
    #[deprecated(note = "grant requests must be bound to an issuer; use GrantRequestBuilder")]
    #[must_use]
    pub fn legacy(
        grant_type: GrantType,
        client_principal: Arc<ClientPrincipal>,
        additional_parameters: &HashMap<String, Value>,
    ) -> Self {
        Self {
            grant_type,
            issuer: None,
            client_principal,
            additional_parameters: additional_parameters.into(),
        }
    }

    #[must_use]
    pub fn grant_type(&self) -> &GrantType {
        &self.grant_type
    }

    /// The issuer. `None` only for [`legacy`](Self::legacy) bases.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    #[must_use]
    pub fn client_principal(&self) -> &Arc<ClientPrincipal> {
        &self.client_principal
    }

    #[must_use]
    pub fn additional_parameters(&self) -> &AdditionalParameters {
        &self.additional_parameters
    }

    /// Always empty: client secrets live with client authentication, never
    /// on a grant request.
    #[must_use]
    pub fn credentials(&self) -> &'static str {
        ""
    }
}

/// Accessors shared by every grant request type.
pub trait GrantAuthenticationRequest {
    /// The validated shared fields.
    fn authentication(&self) -> &GrantAuthentication;

    fn grant_type(&self) -> &GrantType {
        self.authentication().grant_type()
    }

    fn issuer(&self) -> Option<&str> {
        self.authentication().issuer()
    }

    fn client_principal(&self) -> &Arc<ClientPrincipal> {
        self.authentication().client_principal()
    }

    fn additional_parameters(&self) -> &AdditionalParameters {
        self.authentication().additional_parameters()
    }

    fn credentials(&self) -> &str {
        self.authentication().credentials()
    }
}

impl GrantAuthenticationRequest for GrantAuthentication {
    fn authentication(&self) -> &GrantAuthentication {
        self
    }
}

// =============================================================================
// Variants
// =============================================================================

/// `authorization_code` grant (RFC 6749 §4.1.3).
#[derive(Clone)]
pub struct AuthorizationCodeGrantRequest {
    base: GrantAuthentication,
    code: String,
    redirect_uri: Option<String>,
    code_verifier: Option<String>,
}

impl AuthorizationCodeGrantRequest {
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// PKCE code verifier (RFC 7636).
    #[must_use]
    pub fn code_verifier(&self) -> Option<&str> {
        self.code_verifier.as_deref()
    }
}

/// `refresh_token` grant (RFC 6749 §6).
#[derive(Clone)]
pub struct RefreshTokenGrantRequest {
    base: GrantAuthentication,
    refresh_token: String,
    scopes: Scopes,
}

impl RefreshTokenGrantRequest {
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Requested scopes. Empty means no down-scoping.
    #[must_use]
    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }
}

/// `client_credentials` grant (RFC 6749 §4.4).
#[derive(Debug, Clone)]
pub struct ClientCredentialsGrantRequest {
    base: GrantAuthentication,
    scopes: Scopes,
}

impl ClientCredentialsGrantRequest {
    #[must_use]
    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }
}

/// Device authorization grant (RFC 8628 §3.4).
#[derive(Clone)]
pub struct DeviceCodeGrantRequest {
    base: GrantAuthentication,
    device_code: String,
}

impl DeviceCodeGrantRequest {
    #[must_use]
    pub fn device_code(&self) -> &str {
        &self.device_code
    }
}

/// Extension grant (RFC 6749 §4.5). Grant-specific values travel in the
/// additional parameters.
#[derive(Debug, Clone)]
pub struct ExtensionGrantRequest {
    base: GrantAuthentication,
}

macro_rules! impl_grant_request {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl GrantAuthenticationRequest for $ty {
                fn authentication(&self) -> &GrantAuthentication {
                    &self.base
                }
            }
        )+
    };
}

impl_grant_request!(
    AuthorizationCodeGrantRequest,
    RefreshTokenGrantRequest,
    ClientCredentialsGrantRequest,
    DeviceCodeGrantRequest,
    ExtensionGrantRequest,
);

// Token values stay out of Debug output so requests can be logged.

impl fmt::Debug for AuthorizationCodeGrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCodeGrantRequest")
            .field("base", &self.base)
            .field("code", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field(
                "code_verifier",
                &self.code_verifier.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl fmt::Debug for RefreshTokenGrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenGrantRequest")
            .field("base", &self.base)
            .field("refresh_token", &"[redacted]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl fmt::Debug for DeviceCodeGrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCodeGrantRequest")
            .field("base", &self.base)
            .field("device_code", &"[redacted]")
            .finish()
    }
}

/// A validated grant request, one variant per grant family.
#[derive(Debug, Clone)]
pub enum GrantRequest {
    AuthorizationCode(AuthorizationCodeGrantRequest),
    RefreshToken(RefreshTokenGrantRequest),
    ClientCredentials(ClientCredentialsGrantRequest),
    DeviceCode(DeviceCodeGrantRequest),
    Extension(ExtensionGrantRequest),
}

impl GrantAuthenticationRequest for GrantRequest {
    fn authentication(&self) -> &GrantAuthentication {
        match self {
            Self::AuthorizationCode(r) => r.authentication(),
            Self::RefreshToken(r) => r.authentication(),
            Self::ClientCredentials(r) => r.authentication(),
            Self::DeviceCode(r) => r.authentication(),
            Self::Extension(r) => r.authentication(),
        }
    }
}

impl From<AuthorizationCodeGrantRequest> for GrantRequest {
    fn from(request: AuthorizationCodeGrantRequest) -> Self {
        Self::AuthorizationCode(request)
    }
}

impl From<RefreshTokenGrantRequest> for GrantRequest {
    fn from(request: RefreshTokenGrantRequest) -> Self {
        Self::RefreshToken(request)
    }
}

impl From<ClientCredentialsGrantRequest> for GrantRequest {
    fn from(request: ClientCredentialsGrantRequest) -> Self {
        Self::ClientCredentials(request)
    }
}

impl From<DeviceCodeGrantRequest> for GrantRequest {
    fn from(request: DeviceCodeGrantRequest) -> Self {
        Self::DeviceCode(request)
    }
}

impl From<ExtensionGrantRequest> for GrantRequest {
    fn from(request: ExtensionGrantRequest) -> Self {
        Self::Extension(request)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds grant requests.
///
/// Shared fields are collected first; the terminal method picks the variant
/// and validates. Validation order: issuer, client principal, then the
/// variant's own fields.
#[derive(Debug, Clone, Default)]
pub struct GrantRequestBuilder {
    issuer: Option<String>,
    client_principal: Option<Arc<ClientPrincipal>>,
    additional_parameters: HashMap<String, Value>,
}

impl GrantRequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn client_principal(mut self, principal: Arc<ClientPrincipal>) -> Self {
        self.client_principal = Some(principal);
        self
    }

    /// Copies every entry of `parameters`. The caller keeps ownership of the
    /// source map; later changes to it are not observed.
    #[must_use]
    pub fn additional_parameters(mut self, parameters: &HashMap<String, Value>) -> Self {
        self.additional_parameters
            .extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn additional_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.additional_parameters.insert(name.into(), value.into());
        self
    }

    fn base(self, grant_type: GrantType) -> AuthResult<GrantAuthentication> {
        GrantAuthentication::new(
            grant_type,
            self.issuer,
            self.client_principal,
            AdditionalParameters(self.additional_parameters),
        )
    }

    /// Builds an `authorization_code` request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a shared field is missing or `code` is empty.
    pub fn authorization_code(
        self,
        code: impl Into<String>,
        redirect_uri: Option<String>,
        code_verifier: Option<String>,
    ) -> AuthResult<AuthorizationCodeGrantRequest> {
        let base = self.base(GrantType::AuthorizationCode)?;
        let code = non_empty(code.into(), "code cannot be empty")?;
        Ok(AuthorizationCodeGrantRequest {
            base,
            code,
            redirect_uri,
            code_verifier,
        })
    }

    /// Builds a `refresh_token` request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a shared field is missing or `refresh_token` is
    /// empty.
    pub fn refresh_token(
        self,
        refresh_token: impl Into<String>,
        scopes: Scopes,
    ) -> AuthResult<RefreshTokenGrantRequest> {
        let base = self.base(GrantType::RefreshToken)?;
        let refresh_token = non_empty(refresh_token.into(), "refreshToken cannot be empty")?;
        Ok(RefreshTokenGrantRequest {
            base,
            refresh_token,
            scopes,
        })
    }

    /// Builds a `client_credentials` request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a shared field is missing.
    pub fn client_credentials(self, scopes: Scopes) -> AuthResult<ClientCredentialsGrantRequest> {
        let base = self.base(GrantType::ClientCredentials)?;
        Ok(ClientCredentialsGrantRequest { base, scopes })
    }

    /// Builds a device code request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a shared field is missing or `device_code` is
    /// empty.
    pub fn device_code(self, device_code: impl Into<String>) -> AuthResult<DeviceCodeGrantRequest> {
        let base = self.base(GrantType::DeviceCode)?;
        let device_code = non_empty(device_code.into(), "deviceCode cannot be empty")?;
        Ok(DeviceCodeGrantRequest { base, device_code })
    }

    /// Builds an extension grant request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a shared field is missing, or if `grant_type` is
    /// empty or names a built-in grant.
    pub fn extension(self, grant_type: impl Into<GrantType>) -> AuthResult<ExtensionGrantRequest> {
        let grant_type = grant_type.into();
        let base = self.base(grant_type)?;
        match base.grant_type() {
            GrantType::Extension(uri) if !uri.is_empty() => Ok(ExtensionGrantRequest { base }),
            GrantType::Extension(_) => Err(AuthError::invalid_request("grantType cannot be empty")),
            builtin => Err(AuthError::invalid_request(format!(
                "'{builtin}' is a built-in grant type, not an extension"
            ))),
        }
    }
}

fn non_empty(value: String, message: &'static str) -> AuthResult<String> {
    if value.is_empty() {
        Err(AuthError::invalid_request(message))
    } else {
        Ok(value)
    }
}
