//! Opaque token issuer.
//!
//! Issues 256-bit random base64url handles. The handle carries no claims;
//! resource servers resolve it through the authorization record store.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::token::issuer::{IssuedToken, TokenIssueRequest, TokenIssuer};
use crate::types::record::TokenRecord;

/// [`TokenIssuer`] producing random opaque handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueTokenIssuer;

impl OpaqueTokenIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenIssuer for OpaqueTokenIssuer {
    async fn issue(&self, request: &TokenIssueRequest) -> AuthResult<IssuedToken> {
        let issued_at = OffsetDateTime::now_utc();
        Ok(IssuedToken {
            value: TokenRecord::generate_token(),
            kind: request.kind,
            token_type: "Bearer".to_string(),
            issued_at,
            expires_at: Some(issued_at + request.lifetime),
            scopes: request.scopes.clone(),
        })
    }
}
