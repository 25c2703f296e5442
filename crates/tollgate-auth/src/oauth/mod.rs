//! OAuth 2.0 token endpoint plumbing.
//!
//! Everything between a decoded HTTP request and a typed grant request:
//!
//! - [`client_auth`] - Client authentication producing a `ClientPrincipal`
//! - [`token`] - Token request/response/error bodies
//! - [`pkce`] - PKCE challenge/verifier implementation
//!
//! # Example
//!
//! ```ignore
//! use tollgate_auth::oauth::{ClientAuthenticator, ClientCredentials, TokenError};
//!
//! let credentials = ClientCredentials::from_request(authorization_header, &form)?;
//! let principal = authenticator.authenticate(&credentials).await?;
//! let request = form.into_grant_request(&issuer, Arc::new(principal))?;
//!
//! match manager.authenticate(&request).await {
//!     Ok(result) => respond(200, &result.to_token_response()),
//!     Err(e) => {
//!         let body = TokenError::from(&e);
//!         respond(body.http_status(), &body)
//!     }
//! }
//! ```

pub mod client_auth;
pub mod pkce;
pub mod token;

// Client authentication
pub use client_auth::{
    ClientAuthenticator, ClientCredentials, StoreClientAuthenticator, parse_basic_auth,
};

// PKCE types
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier, verify_code_exchange};

// Token endpoint types
pub use token::{TokenError, TokenErrorCode, TokenRequest, TokenResponse};
