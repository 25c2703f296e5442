//! Checks and issuance steps shared by the built-in providers.

use crate::AuthResult;
use crate::error::AuthError;
use crate::grant::provider::GrantContext;
use crate::grant::request::GrantAuthenticationRequest;
use crate::token::issuer::{IssuedToken, TokenIssueRequest};
use crate::types::client::RegisteredClient;
use crate::types::record::{AuthorizationRecord, TokenKind};
use crate::types::scope::{OPENID, Scopes};

/// Rejects a record bound to another client or issuer.
///
/// Records persisted without an issuer predate issuer binding and match any
/// issuer.
pub(crate) fn ensure_bound<R: GrantAuthenticationRequest>(
    record: &AuthorizationRecord,
    request: &R,
    artifact: &str,
) -> AuthResult<()> {
    let client_id = request.client_principal().client_id();
    if record.client_id != client_id {
        tracing::warn!(
            client_id,
            grant_type = %request.grant_type(),
            "{artifact} presented by a client it was not issued to"
        );
        return Err(AuthError::invalid_grant(format!(
            "{artifact} was issued to a different client"
        )));
    }

    if let Some(bound) = record.issuer.as_deref() {
        if Some(bound) != request.issuer() {
            return Err(AuthError::invalid_grant(format!(
                "{artifact} was issued by a different issuer"
            )));
        }
    }

    Ok(())
}

/// Starts a token request for the given kind with the lifetime the client
/// and settings call for.
pub(crate) fn token_request<R: GrantAuthenticationRequest>(
    context: &GrantContext<'_>,
    request: &R,
    kind: TokenKind,
    subject: &str,
    scopes: &Scopes,
) -> TokenIssueRequest {
    let client = request.client_principal().client();
    let settings = context.settings;
    let lifetime = match kind {
        TokenKind::AccessToken => settings.access_token_lifetime_for(client),
        TokenKind::RefreshToken => settings.refresh_token_lifetime_for(client),
        TokenKind::IdToken => settings.id_token_lifetime,
        TokenKind::AuthorizationCode => settings.authorization_code_lifetime,
        TokenKind::DeviceCode | TokenKind::UserCode => settings.device_code_lifetime,
        TokenKind::RegistrationAccessToken => settings.registration_access_token_lifetime,
    };

    TokenIssueRequest::new(kind, client.client_id.clone(), subject, lifetime)
        .with_issuer(request.issuer())
        .with_scopes(scopes.clone())
}

/// Issues a token and records its hash in the matching slot.
pub(crate) async fn issue_onto<R: GrantAuthenticationRequest>(
    context: &GrantContext<'_>,
    request: &R,
    record: &mut AuthorizationRecord,
    kind: TokenKind,
    scopes: &Scopes,
) -> AuthResult<IssuedToken> {
    let token = context
        .issue(&token_request(context, request, kind, &record.principal_name, scopes))
        .await?;
    record.tokens.insert(kind, token.to_record());
    Ok(token)
}

/// Issues an ID token when `openid` is in scope.
pub(crate) async fn issue_id_token<R: GrantAuthenticationRequest>(
    context: &GrantContext<'_>,
    request: &R,
    record: &mut AuthorizationRecord,
    scopes: &Scopes,
    nonce: Option<&str>,
) -> AuthResult<Option<IssuedToken>> {
    if !scopes.contains(OPENID) {
        return Ok(None);
    }

    let mut token_request = token_request(
        context,
        request,
        TokenKind::IdToken,
        &record.principal_name,
        scopes,
    );
    if let Some(nonce) = nonce {
        token_request = token_request.with_claim("nonce", nonce);
    }

    let token = context.issue(&token_request).await?;
    record.tokens.insert(TokenKind::IdToken, token.to_record());
    Ok(Some(token))
}

/// Whether a refresh token should accompany the access token.
///
/// Public clients never receive one.
pub(crate) fn may_receive_refresh_token(client: &RegisteredClient, is_public: bool) -> bool {
    !is_public
        && client.is_grant_type_allowed(&crate::types::grant_type::GrantType::RefreshToken)
}

/// Saves an exchanged record. A lost compare-and-swap means another request
/// consumed the same artifact first.
pub(crate) async fn commit(
    context: &GrantContext<'_>,
    record: AuthorizationRecord,
    artifact: &str,
) -> AuthResult<AuthorizationRecord> {
    let client_id = record.client_id.clone();
    match context.save_record(record).await {
        Err(AuthError::Conflict { .. }) => {
            tracing::warn!(
                client_id = %client_id,
                "{artifact} was exchanged concurrently; rejecting the later request"
            );
            Err(AuthError::invalid_grant(format!("{artifact} has already been used")))
        }
        other => other,
    }
}
