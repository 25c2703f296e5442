//! # tollgate-auth
//!
//! Grant authentication core for an OAuth 2.0 / OpenID Connect authorization
//! server.
//!
//! This crate provides:
//! - A typed, eagerly validated grant request model
//! - Grant providers for authorization code (with PKCE), refresh token,
//!   client credentials and device code grants
//! - A dispatcher that routes requests to providers by grant type
//! - OpenID Connect dynamic client registration
//! - Client authentication for the token endpoint
//! - Store and token issuer traits, plus an opaque token issuer
//!
//! ## Overview
//!
//! The core sits between the HTTP layer and storage. A transport decodes a
//! [`TokenRequest`](oauth::TokenRequest), authenticates the client, builds a
//! [`GrantRequest`](grant::GrantRequest) and hands it to the
//! [`GrantAuthenticationManager`](grant::GrantAuthenticationManager). The
//! manager returns an [`IssuedResult`](grant::IssuedResult) or an
//! [`AuthError`]; rendering either is left to the caller.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, enabled grants and registration settings
//! - [`grant`] - Grant requests, providers and the dispatcher
//! - [`oauth`] - Token endpoint bodies, client authentication and PKCE
//! - [`oidc`] - Dynamic client registration
//! - [`token`] - Token minting
//! - [`storage`] - Storage traits for authorization records and clients
//! - [`types`] - Shared domain types

pub mod client_secret;
pub mod config;
pub mod error;
pub mod grant;
pub mod oauth;
pub mod oidc;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, TokenSettings};
pub use error::{AuthError, ErrorCategory};
pub use grant::{
    GrantAuthenticationManager, GrantAuthenticationProvider, GrantContext, GrantRequest,
    GrantRequestBuilder, IssuedResult,
};
pub use oidc::{ClientRegistration, ClientRegistrationRequest, ClientRegistrationResult};
pub use storage::{AuthorizationRecordStore, RegisteredClientStore};
pub use token::{IssuedToken, OpaqueTokenIssuer, TokenIssueRequest, TokenIssuer};
pub use types::{
    AuthorizationRecord, ClientPrincipal, GrantType, RegisteredClient, Scopes, TokenKind,
};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tollgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError, RefreshScopePolicy, TokenSettings};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::grant::{
        AuthorizationCodeGrantRequest, ClientCredentialsGrantRequest, DeviceCodeGrantRequest,
        ExtensionGrantRequest, GrantAuthenticationManager, GrantAuthenticationProvider,
        GrantAuthenticationRequest, GrantContext, GrantRequest, GrantRequestBuilder, IssuedResult,
        RefreshTokenGrantRequest,
    };
    pub use crate::oauth::{
        ClientAuthenticator, ClientCredentials, StoreClientAuthenticator, TokenError,
        TokenErrorCode, TokenRequest, TokenResponse,
    };
    pub use crate::oidc::{
        ClientRegistration, ClientRegistrationRequest, ClientRegistrationResult, RegistrationAction,
    };
    pub use crate::storage::{AuthorizationRecordStore, RegisteredClientStore};
    pub use crate::token::{IssuedToken, OpaqueTokenIssuer, TokenIssueRequest, TokenIssuer};
    pub use crate::types::{
        AuthorizationRecord, BearerPrincipal, ClientPrincipal, GrantType, Principal,
        RegisteredClient, Scopes, TokenEndpointAuthMethod, TokenKind, TokenRecord,
    };
}
