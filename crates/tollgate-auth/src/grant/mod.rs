//! Grant authentication.
//!
//! A token-endpoint request is turned into a typed [`GrantRequest`], routed by
//! the [`GrantAuthenticationManager`] to the [`GrantAuthenticationProvider`]
//! registered for its grant type, and answered with an [`IssuedResult`].
//!
//! ## Built-in providers
//!
//! - [`AuthorizationCodeGrantProvider`] - `authorization_code` with PKCE
//! - [`RefreshTokenGrantProvider`] - `refresh_token` with rotation
//! - [`ClientCredentialsGrantProvider`] - `client_credentials`
//! - [`DeviceCodeGrantProvider`] - RFC 8628 device polling

pub mod authorization_code;
pub mod client_credentials;
pub mod device_code;
pub mod manager;
pub mod provider;
pub mod refresh_token;
pub mod request;
pub mod result;
pub(crate) mod support;

#[cfg(test)]
pub(crate) mod testing;

pub use authorization_code::AuthorizationCodeGrantProvider;
pub use client_credentials::ClientCredentialsGrantProvider;
pub use device_code::DeviceCodeGrantProvider;
pub use manager::GrantAuthenticationManager;
pub use provider::{GrantAuthenticationProvider, GrantContext};
pub use refresh_token::{RefreshTokenGrantProvider, reconcile_scopes};
pub use request::{
    AdditionalParameters, AuthorizationCodeGrantRequest, ClientCredentialsGrantRequest,
    DeviceCodeGrantRequest, ExtensionGrantRequest, GrantAuthentication, GrantAuthenticationRequest,
    GrantRequest, GrantRequestBuilder, RefreshTokenGrantRequest,
};
pub use result::IssuedResult;
