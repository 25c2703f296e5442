//! Device authorization grant (RFC 8628 §3.4-3.5).
//!
//! The device polls the token endpoint with its device code while the user
//! approves the request on another device. Polling answers follow the
//! record's [`DeviceAuthorizationStatus`]:
//!
//! | status     | answer                                   |
//! |------------|------------------------------------------|
//! | `Pending`  | `authorization_pending`, or `slow_down`  |
//! | `Denied`   | `access_denied`                          |
//! | `Approved` | tokens, then the record becomes consumed |
//! | `Consumed` | `invalid_grant`                          |

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::grant::provider::{GrantAuthenticationProvider, GrantContext};
use crate::grant::request::{DeviceCodeGrantRequest, GrantAuthenticationRequest, GrantRequest};
use crate::grant::result::IssuedResult;
use crate::grant::support::{
    commit, ensure_bound, issue_id_token, issue_onto, may_receive_refresh_token,
};
use crate::types::grant_type::GrantType;
use crate::types::record::{AuthorizationRecord, DeviceAuthorizationStatus, TokenKind};
use crate::types::scope::format_scope;

/// Provider for `urn:ietf:params:oauth:grant-type:device_code`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCodeGrantProvider;

#[async_trait]
impl GrantAuthenticationProvider for DeviceCodeGrantProvider {
    fn grant_type(&self) -> GrantType {
        GrantType::DeviceCode
    }

    async fn authenticate(
        &self,
        request: &GrantRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<IssuedResult> {
        let GrantRequest::DeviceCode(request) = request else {
            return Err(AuthError::internal(format!(
                "device code provider cannot handle '{}'",
                request.grant_type()
            )));
        };

        let mut record = context
            .find_record(request.device_code(), TokenKind::DeviceCode)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Invalid device code"))?;

        ensure_bound(&record, request, "Device code")?;

        let device_code = record
            .token(TokenKind::DeviceCode)
            .ok_or_else(|| AuthError::invalid_grant("Invalid device code"))?;
        if device_code.is_invalidated() {
            return Err(AuthError::invalid_grant("Device code has already been used"));
        }
        if device_code.is_expired() {
            return Err(AuthError::expired_token("The device code has expired"));
        }

        let now = OffsetDateTime::now_utc();
        let status = record
            .device
            .as_ref()
            .map(|device| device.status)
            .ok_or_else(|| AuthError::invalid_grant("Not a device authorization"))?;

        match status {
            DeviceAuthorizationStatus::Pending => Err(record_poll(context, record, now).await),
            DeviceAuthorizationStatus::Denied => {
                Err(AuthError::access_denied("The end user denied the authorization request"))
            }
            DeviceAuthorizationStatus::Consumed => {
                Err(AuthError::invalid_grant("Device code has already been used"))
            }
            DeviceAuthorizationStatus::Approved => exchange(context, request, record, now).await,
        }
    }
}

/// Consumes an approved device authorization and issues its tokens.
async fn exchange(
    context: &GrantContext<'_>,
    request: &DeviceCodeGrantRequest,
    mut record: AuthorizationRecord,
    now: OffsetDateTime,
) -> AuthResult<IssuedResult> {
    let principal = request.client_principal();
    let client_id = principal.client_id();

    for kind in [TokenKind::DeviceCode, TokenKind::UserCode] {
        if let Some(token) = record.token_mut(kind) {
            token.invalidate(now);
        }
    }
    if let Some(device) = record.device.as_mut() {
        device.status = DeviceAuthorizationStatus::Consumed;
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
    let id_token = issue_id_token(context, request, &mut record, &scopes, None).await?;

    record.last_used_at = Some(now);
    commit(context, record, "Device code").await?;

    tracing::info!(
        client_id,
        grant_type = GrantType::DEVICE_CODE_URN,
        scope = %format_scope(&scopes),
        "Device code exchanged"
    );

    let result = IssuedResult::new(client_id, GrantType::DeviceCode, access_token)
        .with_refresh_token(refresh_token)
        .with_id_token(id_token);
    Ok(result)
}

/// Records a pending poll and answers `slow_down` or `authorization_pending`.
async fn record_poll(
    context: &GrantContext<'_>,
    mut record: AuthorizationRecord,
    now: OffsetDateTime,
) -> AuthError {
    let Some(device) = record.device.as_mut() else {
        return AuthError::invalid_grant("Not a device authorization");
    };
    let too_fast = device.is_polling_too_fast(now);
    device.last_polled_at = Some(now);

    // A concurrent poll already moved the timestamp forward.
    match context.save_record(record).await {
        Ok(_) | Err(AuthError::Conflict { .. }) => {}
        Err(e) => return e,
    }

    if too_fast {
        AuthError::SlowDown
    } else {
        AuthError::AuthorizationPending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::testing::{Fixture, ISSUER, builder_for, confidential_client};
    use crate::types::record::{DeviceAuthorizationState, TokenRecord};
    use crate::types::scope::scopes;
    use time::Duration;
    use uuid::Uuid;

    const DEVICE_CODE: &str = "GmRhmhcxhwAzkoEqiMEg_DnyEysNkuNhszIySk9eS";

    fn seed(fixture: &Fixture, status: DeviceAuthorizationStatus, minutes: i64) -> Uuid {
        let now = OffsetDateTime::now_utc();
        let expires_at = Some(now + Duration::minutes(minutes));
        let mut device = DeviceAuthorizationState::pending(5);
        device.status = status;
        let device_code = TokenRecord::new(DEVICE_CODE, now, expires_at);
        let user_code = TokenRecord::new("WDJB-MJHT", now, expires_at);
        let granted = scopes(["scope1"]);
        let record = AuthorizationRecord::new("tv", "alice", GrantType::DeviceCode, granted)
            .with_issuer(ISSUER)
            .with_device(device)
            .with_token(TokenKind::DeviceCode, device_code)
            .with_token(TokenKind::UserCode, user_code);
        fixture.records.insert(record)
    }

    fn poll() -> GrantRequest {
        builder_for(confidential_client("tv"))
            .device_code(DEVICE_CODE)
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_pending_then_slow_down() {
        let fixture = Fixture::new();
        let id = seed(&fixture, DeviceAuthorizationStatus::Pending, 10);

        let err = DeviceCodeGrantProvider
            .authenticate(&poll(), &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationPending));
        let device = fixture.records.get(id).device.unwrap();
        assert!(device.last_polled_at.is_some());

        let err = DeviceCodeGrantProvider
            .authenticate(&poll(), &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SlowDown));
        assert_eq!(err.oauth_error_code(), "slow_down");
    }

    #[tokio::test]
    async fn test_denied() {
        let fixture = Fixture::new();
        seed(&fixture, DeviceAuthorizationStatus::Denied, 10);

        let err = DeviceCodeGrantProvider
            .authenticate(&poll(), &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_expired() {
        let fixture = Fixture::new();
        seed(&fixture, DeviceAuthorizationStatus::Approved, -1);

        let err = DeviceCodeGrantProvider
            .authenticate(&poll(), &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken { .. }));
    }

    #[tokio::test]
    async fn test_approved_issues_once() {
        let fixture = Fixture::new();
        let id = seed(&fixture, DeviceAuthorizationStatus::Approved, 10);

        let result = DeviceCodeGrantProvider
            .authenticate(&poll(), &fixture.context())
            .await
            .unwrap();
        assert_eq!(result.scopes(), &scopes(["scope1"]));
        assert!(result.refresh_token.is_some());

        let stored = fixture.records.get(id);
        assert_eq!(
            stored.device.as_ref().unwrap().status,
            DeviceAuthorizationStatus::Consumed
        );
        assert!(stored.token(TokenKind::UserCode).unwrap().is_invalidated());

        let err = DeviceCodeGrantProvider
            .authenticate(&poll(), &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }
}
