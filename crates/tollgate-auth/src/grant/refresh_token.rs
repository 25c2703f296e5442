//! Refresh token grant (RFC 6749 §6).
//!
//! # Flow
//!
//! 1. Find the authorization record by refresh token hash
//! 2. Reject unknown, expired, invalidated, or foreign tokens (`invalid_grant`)
//! 3. Reconcile requested scopes with the granted scopes
//! 4. Rotate the refresh token when configured
//! 5. Issue an access token (and an ID token for `openid`)
//! 6. Save the record with compare-and-swap
//!
//! # Security
//!
//! - Scopes can be narrowed, never widened
//! - Rotated tokens share one record version, so two concurrent exchanges
//!   of the same token cannot both commit

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::RefreshScopePolicy;
use crate::error::AuthError;
use crate::grant::provider::{GrantAuthenticationProvider, GrantContext};
use crate::grant::request::{GrantAuthenticationRequest, GrantRequest};
use crate::grant::result::IssuedResult;
use crate::grant::support::{commit, ensure_bound, issue_id_token, issue_onto};
use crate::types::grant_type::GrantType;
use crate::types::record::TokenKind;
use crate::types::scope::{Scopes, format_scope};

/// Provider for the `refresh_token` grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshTokenGrantProvider;

#[async_trait]
impl GrantAuthenticationProvider for RefreshTokenGrantProvider {
    fn grant_type(&self) -> GrantType {
        GrantType::RefreshToken
    }

    async fn authenticate(
        &self,
        request: &GrantRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<IssuedResult> {
        let GrantRequest::RefreshToken(request) = request else {
            return Err(AuthError::internal(format!(
                "refresh token provider cannot handle '{}'",
                request.grant_type()
            )));
        };
        let client_id = request.client_principal().client_id();

        let mut record = context
            .find_record(request.refresh_token(), TokenKind::RefreshToken)
            .await?
            .ok_or_else(|| {
                tracing::debug!(client_id, "Unknown refresh token");
                AuthError::invalid_grant("Invalid refresh token")
            })?;

        ensure_bound(&record, request, "Refresh token")?;

        let stored = record
            .token(TokenKind::RefreshToken)
            .ok_or_else(|| AuthError::invalid_grant("Invalid refresh token"))?;
        if stored.is_invalidated() {
            tracing::warn!(
                client_id,
                record_id = %record.id,
                "Invalidated refresh token presented"
            );
            return Err(AuthError::invalid_grant("Refresh token has been revoked"));
        }
        if stored.is_expired() {
            return Err(AuthError::invalid_grant("Refresh token has expired"));
        }

        let scopes = reconcile_scopes(
            context.settings.refresh_scope_policy,
            request.scopes(),
            &record.scopes,
        )?;

        // A rotated token carries the original grant so later refreshes can
        // still reach every granted scope.
        let refresh_token = if context.settings.refresh_token_rotation {
            let granted = record.scopes.clone();
            let kind = TokenKind::RefreshToken;
            Some(issue_onto(context, request, &mut record, kind, &granted).await?)
        } else {
            None
        };

        let access_token = issue_onto(
            context,
            request,
            &mut record,
            TokenKind::AccessToken,
            &scopes,
        )
        .await?;
        let id_token = issue_id_token(context, request, &mut record, &scopes, None).await?;

        record.last_used_at = Some(OffsetDateTime::now_utc());
        commit(context, record, "Refresh token").await?;

        tracing::info!(
            client_id,
            grant_type = "refresh_token",
            scope = %format_scope(&scopes),
            rotated = refresh_token.is_some(),
            "Refresh token exchanged"
        );

        Ok(IssuedResult::new(client_id, GrantType::RefreshToken, access_token)
            .with_refresh_token(refresh_token)
            .with_id_token(id_token))
    }
}

/// Computes the scopes of a refreshed access token.
///
/// An empty request keeps the full granted set. Otherwise the policy
/// decides; a request sharing nothing with the grant always fails.
///
/// # Errors
///
/// `AuthError::InvalidScope` when the request cannot be satisfied.
pub fn reconcile_scopes(
    policy: RefreshScopePolicy,
    requested: &Scopes,
    granted: &Scopes,
) -> AuthResult<Scopes> {
    if requested.is_empty() {
        return Ok(granted.clone());
    }

    match policy {
        RefreshScopePolicy::Subset => {
            if requested.is_subset(granted) {
                Ok(requested.clone())
            } else {
                let excess: Scopes = requested.difference(granted).cloned().collect();
                Err(AuthError::invalid_scope(format!(
                    "Requested scope exceeds original grant: {}",
                    format_scope(&excess)
                )))
            }
        }
        RefreshScopePolicy::Intersect => {
            let effective: Scopes = requested.intersection(granted).cloned().collect();
            if effective.is_empty() {
                Err(AuthError::invalid_scope("Requested scope is outside the original grant"))
            } else {
                Ok(effective)
            }
        }
    }
}
