//! Token minting.
//!
//! - [`TokenIssuer`] - pluggable token minting interface
//! - [`OpaqueTokenIssuer`] - random opaque handles

pub mod issuer;
pub mod opaque;

pub use issuer::{IssuedToken, TokenIssueRequest, TokenIssuer};
pub use opaque::OpaqueTokenIssuer;
