//! Client credentials grant (RFC 6749 §4.4).
//!
//! The client acts on its own behalf: the resource owner is the client
//! itself, only an access token is issued, and an authorization record is
//! kept so the token can be introspected and revoked.

use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;
use crate::grant::provider::{GrantAuthenticationProvider, GrantContext};
use crate::grant::request::{GrantAuthenticationRequest, GrantRequest};
use crate::grant::result::IssuedResult;
use crate::grant::support::{commit, issue_onto};
use crate::types::grant_type::GrantType;
use crate::types::record::{AuthorizationRecord, TokenKind};
use crate::types::scope::{Scopes, format_scope};

/// Provider for the `client_credentials` grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCredentialsGrantProvider;

#[async_trait]
impl GrantAuthenticationProvider for ClientCredentialsGrantProvider {
    fn grant_type(&self) -> GrantType {
        GrantType::ClientCredentials
    }

    async fn authenticate(
        &self,
        request: &GrantRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<IssuedResult> {
        let GrantRequest::ClientCredentials(request) = request else {
            return Err(AuthError::internal(format!(
                "client credentials provider cannot handle '{}'",
                request.grant_type()
            )));
        };
        let principal = request.client_principal();
        let client = principal.client();

        if principal.is_public() {
            return Err(AuthError::unauthorized_client(
                "Public clients cannot use the client_credentials grant",
            ));
        }

        let scopes: Scopes = if request.scopes().is_empty() {
            client.scopes.clone()
        } else {
            let requested = request.scopes();
            if let Some(denied) = requested.iter().find(|s| !client.is_scope_allowed(s)) {
                tracing::debug!(
                    client_id = %client.client_id,
                    scope = %denied,
                    "Scope not registered"
                );
                return Err(AuthError::invalid_scope(format!(
                    "Scope '{denied}' is not allowed for this client"
                )));
            }
            request.scopes().clone()
        };

        let mut record = AuthorizationRecord::new(
            client.client_id.clone(),
            client.client_id.clone(),
            GrantType::ClientCredentials,
            scopes.clone(),
        );
        if let Some(issuer) = request.issuer() {
            record = record.with_issuer(issuer);
        }

        let access_token = issue_onto(
            context,
            request,
            &mut record,
            TokenKind::AccessToken,
            &scopes,
        )
        .await?;
        commit(context, record, "Client credentials grant").await?;

        tracing::info!(
            client_id = %client.client_id,
            grant_type = "client_credentials",
            scope = %format_scope(&scopes),
            "Client credentials token issued"
        );

        Ok(IssuedResult::new(
            client.client_id.clone(),
            GrantType::ClientCredentials,
            access_token,
        ))
    }
}
