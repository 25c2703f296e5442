//! Common types used across the grant, registration, and storage modules.
//!
//! ## Domain Types
//!
//! - [`GrantType`] - OAuth grant type tag
//! - [`RegisteredClient`] - OAuth 2.0 client registration
//! - [`ClientPrincipal`] / [`BearerPrincipal`] - authenticated identities
//! - [`AuthorizationRecord`] - persisted grant state
//! - [`Scopes`] - scope sets

pub mod client;
pub mod grant_type;
pub mod principal;
pub mod record;
pub mod scope;

pub use client::{ClientValidationError, RegisteredClient, TokenEndpointAuthMethod};
pub use grant_type::GrantType;
pub use principal::{BearerPrincipal, ClientPrincipal, Principal};
pub use record::{
    AuthorizationRecord, DeviceAuthorizationState, DeviceAuthorizationStatus, TokenKind,
    TokenRecord,
};
pub use scope::{Scopes, format_scope, parse_scope};
