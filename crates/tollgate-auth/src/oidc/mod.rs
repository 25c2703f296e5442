//! OpenID Connect dynamic client registration.
//!
//! - [`registration`] - Request, metadata and response types
//! - [`registration_provider`] - Register, read, update and delete handling
//!
//! Registration is a separate request family, not a grant type: it is routed
//! through [`GrantAuthenticationManager::authenticate_registration`].
//!
//! [`GrantAuthenticationManager::authenticate_registration`]:
//!     crate::grant::GrantAuthenticationManager::authenticate_registration

pub mod registration;
pub mod registration_provider;

pub use registration::{
    ClientRegistration, ClientRegistrationRequest, ClientRegistrationRequestBuilder,
    ClientRegistrationResult, REGISTRATION_ENDPOINT_PATH, RegistrationAction,
    registration_client_uri,
};
pub use registration_provider::{CLIENT_CREATE_SCOPE, CLIENT_READ_SCOPE, ClientRegistrationProvider};
