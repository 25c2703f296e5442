//! Dynamic client registration (RFC 7591) and client configuration
//! (RFC 7592).
//!
//! - Register: initial access token with `client.create`
//! - Read, update, delete: registration access token with `client.read`,
//!   bound to the client being managed
//!
//! Registration hands out the only plaintext copy of the client secret and
//! of the registration access token. Both are stored hashed.

use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::client_secret::{generate_client_secret, hash_client_secret};
use crate::error::AuthError;
use crate::grant::provider::GrantContext;
use crate::oidc::registration::{
    ClientRegistration, ClientRegistrationRequest, ClientRegistrationResult, RegistrationAction,
};
use crate::token::issuer::TokenIssueRequest;
use crate::types::client::{RegisteredClient, TokenEndpointAuthMethod};
use crate::types::grant_type::GrantType;
use crate::types::principal::Principal;
use crate::types::record::{AuthorizationRecord, TokenKind};
use crate::types::scope::{Scopes, parse_scope, scopes};

/// Scope an initial access token needs to register clients.
pub const CLIENT_CREATE_SCOPE: &str = "client.create";

/// Scope of registration access tokens.
pub const CLIENT_READ_SCOPE: &str = "client.read";

/// Handles [`ClientRegistrationRequest`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientRegistrationProvider;

impl ClientRegistrationProvider {
    /// Runs a registration request.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` for an unauthenticated principal or one bound to a
    ///   different client
    /// - `InsufficientScope` when the principal lacks the required scope
    /// - `InvalidClientMetadata` / `InvalidRedirectUri` for bad metadata
    /// - `InvalidClient` when the client to manage does not exist
    pub async fn authenticate(
        &self,
        request: &ClientRegistrationRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<ClientRegistrationResult> {
        if !request.is_authenticated() {
            return Err(AuthError::invalid_token(
                "Client registration requires an authenticated principal",
            ));
        }

        match request.action() {
            RegistrationAction::Register => self.register(request, context).await,
            action => {
                let client = self.authorize_existing(request, context).await?;
                match action {
                    RegistrationAction::Update => self.update(request, client, context).await,
                    RegistrationAction::Delete => self.delete(request, client, context).await,
                    _ => ClientRegistrationResult::for_client(request.issuer(), &client),
                }
            }
        }
    }

    async fn register(
        &self,
        request: &ClientRegistrationRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<ClientRegistrationResult> {
        require_scope(request, CLIENT_CREATE_SCOPE)?;
        let metadata = request
            .client_registration()
            .ok_or_else(|| AuthError::invalid_request("clientRegistration cannot be null"))?;

        let client_id = Uuid::new_v4().to_string();
        let mut client = client_from_metadata(&client_id, metadata, context)?;
        let secret = assign_secret(&mut client, context)?;

        let lifetime = context.settings.registration_access_token_lifetime;
        let token_request = TokenIssueRequest::new(
            TokenKind::RegistrationAccessToken,
            client_id.as_str(),
            client_id.as_str(),
            lifetime,
        )
        .with_issuer(Some(request.issuer()))
        .with_scopes(scopes([CLIENT_READ_SCOPE]));
        let token = context.issue(&token_request).await?;

        let record = AuthorizationRecord::new(
            client_id.as_str(),
            client_id.as_str(),
            GrantType::ClientCredentials,
            token.scopes.clone(),
        )
        .with_issuer(request.issuer())
        .with_token(TokenKind::RegistrationAccessToken, token.to_record());

        context.save_client(&client).await?;
        if let Err(e) = context.save_record(record).await {
            // Without its registration access token the client cannot be
            // managed, so it must not outlive a failed registration.
            if let Err(cleanup) = context.delete_client(&client_id).await {
                tracing::error!(
                    client_id = %client_id,
                    error = %cleanup,
                    "Failed to remove client after aborted registration"
                );
            }
            return Err(e);
        }

        tracing::info!(
            client_id = %client_id,
            registrar = %request.principal().name(),
            auth_method = %client.token_endpoint_auth_method,
            "Client registered"
        );

        Ok(ClientRegistrationResult::for_client(request.issuer(), &client)?
            .with_client_secret(secret)
            .with_registration_access_token(token.value))
    }

    async fn authorize_existing(
        &self,
        request: &ClientRegistrationRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<RegisteredClient> {
        require_scope(request, CLIENT_READ_SCOPE)?;
        let client_id = request
            .target_client_id()
            .ok_or_else(|| AuthError::invalid_request("clientId cannot be empty"))?;

        if request.principal().bound_client_id() != Some(client_id) {
            tracing::warn!(
                client_id,
                principal = %request.principal().name(),
                "Registration access token used for another client"
            );
            return Err(AuthError::invalid_token(
                "The access token is not bound to the requested client",
            ));
        }

        context
            .find_client(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Client not found"))
    }

    async fn update(
        &self,
        request: &ClientRegistrationRequest,
        existing: RegisteredClient,
        context: &GrantContext<'_>,
    ) -> AuthResult<ClientRegistrationResult> {
        let metadata = request
            .client_registration()
            .ok_or_else(|| AuthError::invalid_request("clientRegistration cannot be null"))?;

        let mut client = client_from_metadata(&existing.client_id, metadata, context)?;
        client.client_id_issued_at = existing.client_id_issued_at;
        client.active = existing.active;
        client.require_pkce = existing.require_pkce;
        client.access_token_lifetime = existing.access_token_lifetime;
        client.refresh_token_lifetime = existing.refresh_token_lifetime;

        let secret = if client.is_confidential() && existing.client_secret.is_some() {
            client.client_secret = existing.client_secret;
            client.client_secret_expires_at = existing.client_secret_expires_at;
            None
        } else {
            assign_secret(&mut client, context)?
        };
        context.save_client(&client).await?;

        tracing::info!(client_id = %client.client_id, "Client registration updated");

        Ok(ClientRegistrationResult::for_client(request.issuer(), &client)?
            .with_client_secret(secret))
    }

    async fn delete(
        &self,
        request: &ClientRegistrationRequest,
        client: RegisteredClient,
        context: &GrantContext<'_>,
    ) -> AuthResult<ClientRegistrationResult> {
        // Records go first: a failure here leaves the client in place and the
        // delete can be retried with the same registration access token.
        let removed = context.remove_client_records(&client.client_id).await?;
        context.delete_client(&client.client_id).await?;

        tracing::info!(
            client_id = %client.client_id,
            records_removed = removed,
            "Client registration deleted"
        );

        ClientRegistrationResult::for_client(request.issuer(), &client)
    }
}

fn require_scope(request: &ClientRegistrationRequest, scope: &str) -> AuthResult<()> {
    if request.principal().has_scope(scope) {
        Ok(())
    } else {
        Err(AuthError::insufficient_scope(scope))
    }
}

/// Generates a secret for confidential clients and clears it for public ones.
/// Returns the plaintext when one was generated.
fn assign_secret(
    client: &mut RegisteredClient,
    context: &GrantContext<'_>,
) -> AuthResult<Option<String>> {
    if !client.is_confidential() {
        client.client_secret = None;
        client.client_secret_expires_at = None;
        return Ok(None);
    }

    let secret = generate_client_secret();
    client.client_secret = Some(hash_client_secret(&secret)?);
    client.client_secret_expires_at = context
        .settings
        .client_secret_lifetime
        .map(|lifetime| OffsetDateTime::now_utc() + lifetime);
    Ok(Some(secret))
}

/// Validates registration metadata and builds the client it describes.
///
/// The returned client has no secret yet.
fn client_from_metadata(
    client_id: &str,
    metadata: &ClientRegistration,
    context: &GrantContext<'_>,
) -> AuthResult<RegisteredClient> {
    for uri in &metadata.redirect_uris {
        validate_redirect_uri(uri)?;
    }

    let grant_types = if metadata.grant_types.is_empty() {
        vec![GrantType::AuthorizationCode]
    } else {
        metadata
            .grant_types
            .iter()
            .map(|tag| match GrantType::from(tag.as_str()) {
                GrantType::Extension(_) => Err(AuthError::invalid_client_metadata(format!(
                    "Unsupported grant type: {tag}"
                ))),
                grant_type => Ok(grant_type),
            })
            .collect::<AuthResult<Vec<_>>>()?
    };

    let auth_method = match metadata.token_endpoint_auth_method.as_deref() {
        None => TokenEndpointAuthMethod::ClientSecretBasic,
        Some(value) => TokenEndpointAuthMethod::parse(value).ok_or_else(|| {
            AuthError::invalid_client_metadata(format!(
                "Unsupported token_endpoint_auth_method: {value}"
            ))
        })?,
    };

    if grant_types.contains(&GrantType::ClientCredentials) && !auth_method.requires_secret() {
        return Err(AuthError::invalid_client_metadata(
            "client_credentials requires a confidential token_endpoint_auth_method",
        ));
    }
    if grant_types.contains(&GrantType::AuthorizationCode) && metadata.redirect_uris.is_empty() {
        return Err(AuthError::invalid_redirect_uri(
            "redirect_uris is required for the authorization_code grant",
        ));
    }

    let requested: Scopes = metadata
        .scope
        .as_deref()
        .map(parse_scope)
        .unwrap_or_default();
    let scopes = if requested.is_empty() {
        let defaults = &context.settings.default_client_scopes;
        defaults.iter().cloned().collect()
    } else {
        requested
    };

    let name = metadata
        .client_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| client_id.to_string());

    let mut client = RegisteredClient::new(client_id, name, auth_method)
        .with_grant_types(grant_types)
        .with_redirect_uris(metadata.redirect_uris.iter().cloned());
    client.scopes = scopes;
    Ok(client)
}

fn validate_redirect_uri(uri: &str) -> AuthResult<()> {
    let parsed = Url::parse(uri)
        .map_err(|_| AuthError::invalid_redirect_uri(format!("'{uri}' is not an absolute URI")))?;
    if parsed.fragment().is_some() {
        return Err(AuthError::invalid_redirect_uri(format!("'{uri}' has a fragment")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::client_secret::verify_client_secret;
    use crate::grant::testing::{Fixture, ISSUER};
    use crate::types::principal::BearerPrincipal;
    use crate::types::record::TokenRecord;

    fn registrar() -> Arc<dyn Principal> {
        Arc::new(BearerPrincipal::new("registrar", scopes([CLIENT_CREATE_SCOPE])))
    }

    fn bound_to(client_id: &str) -> Arc<dyn Principal> {
        Arc::new(
            BearerPrincipal::new(client_id, scopes([CLIENT_READ_SCOPE])).with_client_id(client_id),
        )
    }

    fn metadata() -> ClientRegistration {
        ClientRegistration::new()
            .with_client_name("My App")
            .with_redirect_uri("https://app.example.com/cb")
            .with_grant_type("authorization_code")
            .with_grant_type("refresh_token")
            .with_scope("openid scope1")
    }

    fn register_request(metadata: ClientRegistration) -> ClientRegistrationRequest {
        ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(registrar())
            .client_registration(metadata)
            .build()
            .unwrap()
    }

    async fn register(fixture: &Fixture) -> ClientRegistrationResult {
        ClientRegistrationProvider
            .authenticate(&register_request(metadata()), &fixture.context())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register() {
        let fixture = Fixture::new();
        let result = register(&fixture).await;

        let client_id = result.client_id().to_string();
        assert!(Uuid::parse_str(&client_id).is_ok());
        assert_eq!(
            result.registration_client_uri,
            format!("{ISSUER}/connect/register?client_id={client_id}")
        );
        assert_eq!(result.client_secret_expires_at, Some(0));

        let stored = fixture.clients.clients.read().unwrap()[&client_id].clone();
        assert_eq!(stored.client_name, "My App");
        let secret = result.client_secret.as_deref().unwrap();
        assert!(verify_client_secret(secret, stored.client_secret.as_deref().unwrap()).unwrap());

        let token = result.registration_access_token.as_deref().unwrap();
        let records = fixture.records.records.read().unwrap();
        let record = records.values().next().unwrap();
        assert_eq!(record.client_id, client_id);
        assert!(record.scopes.contains(CLIENT_READ_SCOPE));
        let stored_token = record.token(TokenKind::RegistrationAccessToken).unwrap();
        assert_eq!(stored_token.token_hash, TokenRecord::hash_token(token));
    }

    #[tokio::test]
    async fn test_register_requires_create_scope() {
        let fixture = Fixture::new();
        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(Arc::new(BearerPrincipal::new("someone", Scopes::new())))
            .client_registration(metadata())
            .build()
            .unwrap();

        let err = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsufficientScope { .. }));
    }

    #[tokio::test]
    async fn test_unauthenticated_principal() {
        let fixture = Fixture::new();
        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(Arc::new(BearerPrincipal::unauthenticated("anonymous")))
            .client_registration(metadata())
            .build()
            .unwrap();

        let err = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_invalid_metadata() {
        let fixture = Fixture::new();
        let cases = [
            (
                ClientRegistration::new().with_redirect_uri("/relative"),
                "invalid_redirect_uri",
            ),
            (
                ClientRegistration::new().with_redirect_uri("https://app.example.com/cb#frag"),
                "invalid_redirect_uri",
            ),
            (ClientRegistration::new(), "invalid_redirect_uri"),
            (
                metadata().with_grant_type("urn:example:unknown"),
                "invalid_client_metadata",
            ),
            (
                metadata().with_token_endpoint_auth_method("private_key_jwt"),
                "invalid_client_metadata",
            ),
            (
                ClientRegistration::new()
                    .with_grant_type("client_credentials")
                    .with_token_endpoint_auth_method("none"),
                "invalid_client_metadata",
            ),
        ];

        for (metadata, code) in cases {
            let err = ClientRegistrationProvider
                .authenticate(&register_request(metadata), &fixture.context())
                .await
                .unwrap_err();
            assert_eq!(err.oauth_error_code(), code);
        }
        assert!(fixture.clients.clients.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_public_client_gets_no_secret() {
        let fixture = Fixture::new();
        let result = ClientRegistrationProvider
            .authenticate(
                &register_request(metadata().with_token_endpoint_auth_method("none")),
                &fixture.context(),
            )
            .await
            .unwrap();
        assert!(result.client_secret.is_none());
        assert!(result.client_secret_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_default_scopes() {
        let fixture = Fixture::new();
        let mut metadata = metadata();
        metadata.scope = None;
        let result = ClientRegistrationProvider
            .authenticate(&register_request(metadata), &fixture.context())
            .await
            .unwrap();
        assert_eq!(result.registration.scope.as_deref(), Some("openid"));
    }

    #[tokio::test]
    async fn test_read() {
        let fixture = Fixture::new();
        let client_id = register(&fixture).await.client_id().to_string();

        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(bound_to(&client_id))
            .client_id(client_id.as_str())
            .build()
            .unwrap();
        let result = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap();

        assert_eq!(result.client_id(), client_id);
        assert!(result.client_secret.is_none());
        assert!(result.registration_access_token.is_none());
        assert_eq!(result.registration.client_name.as_deref(), Some("My App"));
    }

    #[tokio::test]
    async fn test_read_with_token_for_other_client() {
        let fixture = Fixture::new();
        let client_id = register(&fixture).await.client_id().to_string();

        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(bound_to("someone-else"))
            .client_id(client_id.as_str())
            .build()
            .unwrap();
        let err = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_read_unknown_client() {
        let fixture = Fixture::new();
        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(bound_to("ghost"))
            .client_id("ghost")
            .build()
            .unwrap();
        let err = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_secret() {
        let fixture = Fixture::new();
        let client_id = register(&fixture).await.client_id().to_string();
        let before = fixture.clients.clients.read().unwrap()[&client_id].clone();

        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(bound_to(&client_id))
            .client_registration(
                metadata()
                    .with_client_id(client_id.as_str())
                    .with_client_name("Renamed"),
            )
            .build()
            .unwrap();
        let result = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap();

        assert!(result.client_secret.is_none());
        let after = fixture.clients.clients.read().unwrap()[&client_id].clone();
        assert_eq!(after.client_name, "Renamed");
        assert_eq!(after.client_secret, before.client_secret);
        assert_eq!(after.client_id_issued_at, before.client_id_issued_at);
    }

    #[tokio::test]
    async fn test_delete_removes_client_and_records() {
        let fixture = Fixture::new();
        let client_id = register(&fixture).await.client_id().to_string();

        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(bound_to(&client_id))
            .client_id(client_id.as_str())
            .delete(true)
            .build()
            .unwrap();
        ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap();

        assert!(fixture.clients.clients.read().unwrap().is_empty());
        assert!(fixture.records.records.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_leaves_no_client_when_record_save_fails() {
        let fixture = Fixture::new();
        fixture.records.fail_saves.store(true, Ordering::SeqCst);

        let err = ClientRegistrationProvider
            .authenticate(&register_request(metadata()), &fixture.context())
            .await
            .unwrap_err();

        assert!(err.is_server_error());
        assert!(fixture.clients.clients.read().unwrap().is_empty());
        assert!(fixture.records.records.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_keeps_client_when_record_removal_fails() {
        let fixture = Fixture::new();
        let client_id = register(&fixture).await.client_id().to_string();
        fixture.records.fail_removes.store(true, Ordering::SeqCst);

        let request = ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(bound_to(&client_id))
            .client_id(client_id.as_str())
            .delete(true)
            .build()
            .unwrap();
        let err = ClientRegistrationProvider
            .authenticate(&request, &fixture.context())
            .await
            .unwrap_err();

        assert!(err.is_server_error());
        let clients = fixture.clients.clients.read().unwrap();
        assert!(clients.contains_key(&client_id));
        assert_eq!(fixture.records.records.read().unwrap().len(), 1);
    }
}
