//! Result of a successful grant.

use std::collections::HashMap;

use serde_json::Value;

use crate::oauth::token::TokenResponse;
use crate::token::issuer::IssuedToken;
use crate::types::grant_type::GrantType;
use crate::types::scope::{Scopes, format_scope};

/// Tokens issued for one grant request.
///
/// Returned to the caller only; persistence already happened on the
/// authorization record.
#[derive(Debug, Clone)]
pub struct IssuedResult {
    /// Client the tokens were issued to.
    pub client_id: String,

    /// Grant that produced the tokens.
    pub grant_type: GrantType,

    /// Access token.
    pub access_token: IssuedToken,

    /// Refresh token, when one was issued or rotated.
    pub refresh_token: Option<IssuedToken>,

    /// ID token, when `openid` was in scope.
    pub id_token: Option<IssuedToken>,

    /// Extra response parameters.
    pub additional_parameters: HashMap<String, Value>,
}

impl IssuedResult {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        grant_type: GrantType,
        access_token: IssuedToken,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            grant_type,
            access_token,
            refresh_token: None,
            id_token: None,
            additional_parameters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: Option<IssuedToken>) -> Self {
        self.refresh_token = token;
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, token: Option<IssuedToken>) -> Self {
        self.id_token = token;
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_parameters.insert(name.into(), value.into());
        self
    }

    /// Scopes carried by the access token.
    #[must_use]
    pub fn scopes(&self) -> &Scopes {
        &self.access_token.scopes
    }

    /// Renders the RFC 6749 §5.1 response body.
    #[must_use]
    pub fn to_token_response(&self) -> TokenResponse {
        let mut response = TokenResponse::new(
            self.access_token.value.clone(),
            self.access_token.token_type.clone(),
            self.access_token.expires_in(),
            format_scope(&self.access_token.scopes),
        );
        if let Some(token) = &self.refresh_token {
            response = response.with_refresh_token(token.value.clone());
        }
        if let Some(token) = &self.id_token {
            response = response.with_id_token(token.value.clone());
        }
        for (name, value) in &self.additional_parameters {
            response = response.with_parameter(name.clone(), value.clone());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::TokenKind;
    use crate::types::scope::scopes;
    use time::{Duration, OffsetDateTime};

    fn token(kind: TokenKind, value: &str) -> IssuedToken {
        let issued_at = OffsetDateTime::now_utc();
        IssuedToken {
            value: value.to_string(),
            kind,
            token_type: "Bearer".to_string(),
            issued_at,
            expires_at: Some(issued_at + Duration::hours(1)),
            scopes: scopes(["openid", "scope1"]),
        }
    }

    #[test]
    fn test_to_token_response() {
        let result = IssuedResult::new(
            "client-1",
            GrantType::AuthorizationCode,
            token(TokenKind::AccessToken, "access"),
        )
        .with_refresh_token(Some(token(TokenKind::RefreshToken, "refresh")))
        .with_id_token(Some(token(TokenKind::IdToken, "id")))
        .with_parameter("tenant", "acme");

        let response = result.to_token_response();
        assert_eq!(response.access_token, "access");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.scope, "openid scope1");
        assert_eq!(response.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(response.id_token.as_deref(), Some("id"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["tenant"], "acme");
    }

    #[test]
    fn test_debug_hides_token_values() {
        let result = IssuedResult::new(
            "client-1",
            GrantType::ClientCredentials,
            token(TokenKind::AccessToken, "plaintext-access-token"),
        );
        assert!(!format!("{result:?}").contains("plaintext-access-token"));
    }
}
