//! Authorization code grant (RFC 6749 §4.1.3).
//!
//! The record was created by the authorization endpoint with the code, the
//! consented scopes and the request attributes (redirect URI, PKCE
//! challenge, nonce). Exchanging the code consumes it.
//!
//! # Security
//!
//! - A replayed code invalidates every token issued under the record
//!   (RFC 6749 §4.1.2)
//! - PKCE is mandatory for public clients and for clients with
//!   `require_pkce`

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::grant::provider::{GrantAuthenticationProvider, GrantContext};
use crate::grant::request::{
    AuthorizationCodeGrantRequest, GrantAuthenticationRequest, GrantRequest,
};
use crate::grant::result::IssuedResult;
use crate::grant::support::{
    commit, ensure_bound, issue_id_token, issue_onto, may_receive_refresh_token,
};
use crate::oauth::pkce::{PkceChallenge, PkceChallengeMethod, verify_code_exchange};
use crate::types::grant_type::GrantType;
use crate::types::record::{
    ATTR_CODE_CHALLENGE, ATTR_CODE_CHALLENGE_METHOD, ATTR_NONCE, ATTR_REDIRECT_URI,
    AuthorizationRecord, TokenKind,
};
use crate::types::scope::format_scope;

/// Provider for the `authorization_code` grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationCodeGrantProvider;

#[async_trait]
impl GrantAuthenticationProvider for AuthorizationCodeGrantProvider {
    fn grant_type(&self) -> GrantType {
        GrantType::AuthorizationCode
    }

    async fn authenticate(
        &self,
        request: &GrantRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<IssuedResult> {
        let GrantRequest::AuthorizationCode(request) = request else {
            return Err(AuthError::internal(format!(
                "authorization code provider cannot handle '{}'",
                request.grant_type()
            )));
        };
        let principal = request.client_principal();
        let client_id = principal.client_id();

        let mut record = context
            .find_record(request.code(), TokenKind::AuthorizationCode)
            .await?
            .ok_or_else(|| {
                tracing::debug!(client_id, "Unknown authorization code");
                AuthError::invalid_grant("Invalid authorization code")
            })?;

        ensure_bound(&record, request, "Authorization code")?;

        let code = record
            .token(TokenKind::AuthorizationCode)
            .ok_or_else(|| AuthError::invalid_grant("Invalid authorization code"))?;
        if code.is_invalidated() {
            return Err(revoke_on_replay(context, record).await);
        }
        if code.is_expired() {
            return Err(AuthError::invalid_grant("Authorization code has expired"));
        }

        check_redirect_uri(&record, request)?;

        let challenge = stored_challenge(&record)?;
        let required = principal.is_public() || principal.client().require_pkce;
        verify_code_exchange(challenge.as_ref(), request.code_verifier(), required)?;

        let now = OffsetDateTime::now_utc();
        if let Some(code) = record.token_mut(TokenKind::AuthorizationCode) {
            code.invalidate(now);
        }

        let scopes = record.scopes.clone();
        let access_token = issue_onto(
            context,
            request,
            &mut record,
            TokenKind::AccessToken,
            &scopes,
        )
        .await?;

        let refreshable = may_receive_refresh_token(principal.client(), principal.is_public());
        let refresh_token = if refreshable {
            let kind = TokenKind::RefreshToken;
            let token = issue_onto(context, request, &mut record, kind, &scopes).await?;
            Some(token)
        } else {
            None
        };

        let nonce = record.attribute_str(ATTR_NONCE).map(str::to_string);
        let id_token =
            issue_id_token(context, request, &mut record, &scopes, nonce.as_deref()).await?;

        record.last_used_at = Some(now);
        commit(context, record, "Authorization code").await?;

        tracing::info!(
            client_id,
            grant_type = "authorization_code",
            scope = %format_scope(&scopes),
            refresh_token = refresh_token.is_some(),
            "Authorization code exchanged"
        );

        let result = IssuedResult::new(client_id, GrantType::AuthorizationCode, access_token)
            .with_refresh_token(refresh_token)
            .with_id_token(id_token);
        Ok(result)
    }
}

/// Invalidates everything issued under a record whose code is replayed.
async fn revoke_on_replay(
    context: &GrantContext<'_>,
    mut record: AuthorizationRecord,
) -> AuthError {
    tracing::warn!(
        client_id = %record.client_id,
        record_id = %record.id,
        "Authorization code replay detected; invalidating issued tokens"
    );
    record.invalidate_all(OffsetDateTime::now_utc());
    if let Err(e) = context.save_record(record).await {
        tracing::warn!(error = %e, "Failed to invalidate tokens after code replay");
    }
    AuthError::invalid_grant("Authorization code has already been used")
}

fn check_redirect_uri(
    record: &AuthorizationRecord,
    request: &AuthorizationCodeGrantRequest,
) -> AuthResult<()> {
    let expected = record.attribute_str(ATTR_REDIRECT_URI);
    if expected.is_some() && request.redirect_uri() != expected {
        return Err(AuthError::invalid_grant(
            "redirect_uri does not match the authorization request",
        ));
    }
    Ok(())
}

fn stored_challenge(record: &AuthorizationRecord) -> AuthResult<Option<PkceChallenge>> {
    let Some(value) = record.attribute_str(ATTR_CODE_CHALLENGE) else {
        return Ok(None);
    };
    // RFC 7636 §4.3: an absent method means plain
    let method = record
        .attribute_str(ATTR_CODE_CHALLENGE_METHOD)
        .map(PkceChallengeMethod::parse)
        .transpose()?
        .unwrap_or(PkceChallengeMethod::Plain);
    Ok(Some(PkceChallenge::new(value.to_string(), method)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::testing::{Fixture, ISSUER, builder_for, confidential_client};
    use crate::oauth::pkce::PkceVerifier;
    use crate::types::client::{RegisteredClient, TokenEndpointAuthMethod};
    use crate::types::record::TokenRecord;
    use crate::types::scope::scopes;
    use time::Duration;

    const CODE: &str = "SplxlOBeZQQYbYS6WxSbIA";
    const REDIRECT_URI: &str = "https://client.example.com/cb";

    fn code_record(client_id: &str) -> AuthorizationRecord {
        let now = OffsetDateTime::now_utc();
        AuthorizationRecord::new(
            client_id,
            "alice",
            GrantType::AuthorizationCode,
            scopes(["openid", "scope1"]),
        )
        .with_issuer(ISSUER)
        .with_attribute(ATTR_REDIRECT_URI, REDIRECT_URI)
        .with_token(
            TokenKind::AuthorizationCode,
            TokenRecord::with_lifetime(CODE, now, Duration::minutes(5)),
        )
    }

    fn exchange(client: RegisteredClient, verifier: Option<&str>) -> GrantRequest {
        builder_for(client)
            .authorization_code(
                CODE,
                Some(REDIRECT_URI.to_string()),
                verifier.map(str::to_string),
            )
            .unwrap()
            .into()
    }

    fn public_client() -> RegisteredClient {
        RegisteredClient::new("spa", "SPA", TokenEndpointAuthMethod::None)
            .with_grant_types([GrantType::AuthorizationCode, GrantType::RefreshToken])
            .with_redirect_uris([REDIRECT_URI])
    }

    async fn redeem(fixture: &Fixture, request: GrantRequest) -> AuthResult<IssuedResult> {
        AuthorizationCodeGrantProvider
            .authenticate(&request, &fixture.context())
            .await
    }

    #[tokio::test]
    async fn test_exchange_issues_all_tokens() {
        let fixture = Fixture::new();
        let record = code_record("client-1").with_attribute(ATTR_NONCE, "n-0S6");
        let id = fixture.records.insert(record);

        let request = exchange(confidential_client("client-1"), None);
        let result = redeem(&fixture, request).await.unwrap();

        assert_eq!(result.scopes(), &scopes(["openid", "scope1"]));
        assert!(result.refresh_token.is_some());
        assert!(result.id_token.is_some());

        let stored = fixture.records.get(id);
        let code = stored.token(TokenKind::AuthorizationCode).unwrap();
        assert!(code.is_invalidated());
        assert!(stored.token(TokenKind::AccessToken).unwrap().is_active());
        assert!(stored.token(TokenKind::IdToken).is_some());
    }

    #[tokio::test]
    async fn test_replay_invalidates_issued_tokens() {
        let fixture = Fixture::new();
        let id = fixture.records.insert(code_record("client-1"));

        let request = exchange(confidential_client("client-1"), None);
        redeem(&fixture, request).await.unwrap();
        let replay = exchange(confidential_client("client-1"), None);
        let err = redeem(&fixture, replay).await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert!(fixture.records.get(id).is_spent());
    }

    #[tokio::test]
    async fn test_redirect_uri_mismatch() {
        let fixture = Fixture::new();
        fixture.records.insert(code_record("client-1"));

        let request: GrantRequest = builder_for(confidential_client("client-1"))
            .authorization_code(CODE, Some("https://evil.example.com/cb".to_string()), None)
            .unwrap()
            .into();
        let err = redeem(&fixture, request).await.unwrap_err();

        assert!(err.to_string().contains("redirect_uri"));
    }

    #[tokio::test]
    async fn test_expired_code() {
        let fixture = Fixture::new();
        let now = OffsetDateTime::now_utc();
        let issued_at = now - Duration::minutes(10);
        let expired = TokenRecord::new(CODE, issued_at, Some(now - Duration::minutes(5)));
        let record = code_record("client-1").with_token(TokenKind::AuthorizationCode, expired);
        fixture.records.insert(record);

        let request = exchange(confidential_client("client-1"), None);
        let err = redeem(&fixture, request).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_public_client_requires_pkce() {
        let fixture = Fixture::new();
        fixture.records.insert(code_record("spa"));

        let err = redeem(&fixture, exchange(public_client(), None))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_public_client_with_pkce_gets_no_refresh_token() {
        let fixture = Fixture::new();
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier);
        let record = code_record("spa")
            .with_attribute(ATTR_CODE_CHALLENGE, challenge.as_str())
            .with_attribute(ATTR_CODE_CHALLENGE_METHOD, "S256");
        fixture.records.insert(record);

        let request = exchange(public_client(), Some(verifier.as_str()));
        let result = redeem(&fixture, request).await.unwrap();
        assert!(result.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_wrong_verifier_rejected() {
        let fixture = Fixture::new();
        let challenge = PkceChallenge::from_verifier(&PkceVerifier::generate());
        let record = code_record("client-1")
            .with_attribute(ATTR_CODE_CHALLENGE, challenge.as_str())
            .with_attribute(ATTR_CODE_CHALLENGE_METHOD, "S256");
        fixture.records.insert(record);

        let other = PkceVerifier::generate();
        let request = exchange(confidential_client("client-1"), Some(other.as_str()));
        let err = redeem(&fixture, request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_code_of_other_client_rejected() {
        let fixture = Fixture::new();
        fixture.records.insert(code_record("client-1"));

        let request = exchange(confidential_client("client-2"), None);
        let err = redeem(&fixture, request).await.unwrap_err();
        assert!(err.to_string().contains("different client"));
    }
}
