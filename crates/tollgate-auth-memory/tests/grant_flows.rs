//! End-to-end grant flows over the in-memory stores.
//!
//! Each test drives the same path a token endpoint would: decode the form,
//! authenticate the client, build the typed request, dispatch, render.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};
use tokio_test::assert_ok;
use tollgate_auth::client_secret::hash_client_secret;
use tollgate_auth::oauth::{
    ClientAuthenticator, ClientCredentials, PkceChallenge, PkceVerifier, StoreClientAuthenticator,
    TokenError, TokenErrorCode, TokenRequest,
};
use tollgate_auth::oidc::{
    ClientRegistration, ClientRegistrationRequest, ClientRegistrationResult, RegistrationAction,
};
use tollgate_auth::storage::{AuthorizationRecordStore, RegisteredClientStore};
use tollgate_auth::types::record::{
    ATTR_CODE_CHALLENGE, ATTR_CODE_CHALLENGE_METHOD, ATTR_NONCE, ATTR_REDIRECT_URI,
};
use tollgate_auth::types::scope::scopes;
use tollgate_auth::types::{
    AuthorizationRecord, BearerPrincipal, ClientPrincipal, DeviceAuthorizationState,
    DeviceAuthorizationStatus, GrantType, RegisteredClient, TokenEndpointAuthMethod, TokenKind,
    TokenRecord,
};
use tollgate_auth::{
    AuthConfig, AuthError, GrantAuthenticationManager, GrantRequest, IssuedResult,
    OpaqueTokenIssuer,
};
use tollgate_auth_memory::InMemoryAuthStorage;
use tracing_subscriber::EnvFilter;

const ISSUER: &str = "https://example.com/issuer1";
const SECRET: &str = "s3cret-for-tests";
const REDIRECT_URI: &str = "https://client.example.com/cb";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Server {
    storage: InMemoryAuthStorage,
    manager: GrantAuthenticationManager,
    authenticator: StoreClientAuthenticator,
}

impl Server {
    fn new() -> Self {
        let mut config = AuthConfig::default();
        config.issuer = ISSUER.to_string();
        config.registration.enabled = true;
        Self::with_config(config)
    }

    fn with_config(config: AuthConfig) -> Self {
        init_tracing();
        config.validate().unwrap();

        let storage = InMemoryAuthStorage::new();
        let manager = GrantAuthenticationManager::from_config(
            &config,
            storage.records(),
            storage.clients(),
            Arc::new(OpaqueTokenIssuer::new()),
        );
        let authenticator =
            StoreClientAuthenticator::new(storage.clients(), StdDuration::from_secs(5));

        Self {
            storage,
            manager,
            authenticator,
        }
    }

    async fn add_client(&self, client: RegisteredClient) {
        self.storage.clients().save(&client).await.unwrap();
    }

    async fn seed(&self, record: AuthorizationRecord) -> AuthorizationRecord {
        self.storage.records().save(record).await.unwrap()
    }

    /// Runs a form body through client authentication and the manager.
    async fn token(
        &self,
        credentials: ClientCredentials,
        form: serde_json::Value,
    ) -> Result<IssuedResult, AuthError> {
        let form: TokenRequest = serde_json::from_value(form).unwrap();
        let principal = self.authenticator.authenticate(&credentials).await?;
        let request = form.into_grant_request(ISSUER, Arc::new(principal))?;
        self.manager.authenticate(&request).await
    }

    async fn register(
        &self,
        request: &ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResult, AuthError> {
        self.manager.authenticate_registration(request).await
    }
}

fn basic(client_id: &str) -> ClientCredentials {
    ClientCredentials {
        basic: Some((client_id.to_string(), SECRET.to_string())),
        ..ClientCredentials::default()
    }
}

fn web_app(client_id: &str) -> RegisteredClient {
    let method = TokenEndpointAuthMethod::ClientSecretBasic;
    RegisteredClient::new(client_id, "Web App", method)
        .with_secret_hash(hash_client_secret(SECRET).unwrap())
        .with_grant_types([
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::ClientCredentials,
            GrantType::DeviceCode,
        ])
        .with_redirect_uris([REDIRECT_URI])
}

fn refresh_record(client_id: &str) -> AuthorizationRecord {
    let now = OffsetDateTime::now_utc();
    AuthorizationRecord::new(
        client_id,
        "alice",
        GrantType::AuthorizationCode,
        scopes(["scope1", "scope2"]),
    )
    .with_issuer(ISSUER)
    .with_token(
        TokenKind::RefreshToken,
        TokenRecord::with_lifetime("refresh-token", now, Duration::days(1)),
    )
}

#[tokio::test]
async fn test_refresh_with_subset_and_disjoint_scopes() {
    let server = Server::new();
    server.add_client(web_app("client-1")).await;
    server.seed(refresh_record("client-1")).await;

    let err = server
        .token(
            basic("client-1"),
            serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-token",
                "scope": "scope3"
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidScope { .. }));

    let result = server
        .token(
            basic("client-1"),
            serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-token",
                "scope": "scope1"
            }),
        )
        .await
        .unwrap();
    assert_eq!(result.scopes(), &scopes(["scope1"]));

    // Rotated: the presented token is now spent, the new one carries the
    // full grant.
    let new_refresh = result.refresh_token.as_ref().unwrap().value.clone();
    assert_ne!(new_refresh, "refresh-token");
    let err = server
        .token(
            basic("client-1"),
            serde_json::json!({"grant_type": "refresh_token", "refresh_token": "refresh-token"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));

    let result = server
        .token(
            basic("client-1"),
            serde_json::json!({"grant_type": "refresh_token", "refresh_token": new_refresh}),
        )
        .await
        .unwrap();
    assert_eq!(result.scopes(), &scopes(["scope1", "scope2"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_succeeds_once() {
    let server = Arc::new(Server::new());
    server.add_client(web_app("client-1")).await;
    server.seed(refresh_record("client-1")).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let server = Arc::clone(&server);
        handles.push(tokio::spawn(async move {
            server
                .token(
                    basic("client-1"),
                    serde_json::json!({
                        "grant_type": "refresh_token",
                        "refresh_token": "refresh-token"
                    }),
                )
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert_eq!(err.oauth_error_code(), "invalid_grant"),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_authorization_code_with_pkce_then_replay() {
    let server = Server::new();
    let public = RegisteredClient::new("spa", "SPA", TokenEndpointAuthMethod::None)
        .with_grant_types([GrantType::AuthorizationCode, GrantType::RefreshToken])
        .with_redirect_uris([REDIRECT_URI]);
    server.add_client(public).await;

    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::from_verifier(&verifier);
    let code = TokenRecord::generate_token();
    let now = OffsetDateTime::now_utc();
    let code_record = TokenRecord::with_lifetime(&code, now, Duration::minutes(5));
    let record = AuthorizationRecord::new(
        "spa",
        "alice",
        GrantType::AuthorizationCode,
        scopes(["openid", "profile"]),
    )
    .with_issuer(ISSUER)
    .with_token(TokenKind::AuthorizationCode, code_record)
    .with_attribute(ATTR_REDIRECT_URI, REDIRECT_URI)
    .with_attribute(ATTR_CODE_CHALLENGE, challenge.as_str())
    .with_attribute(ATTR_CODE_CHALLENGE_METHOD, "S256")
    .with_attribute(ATTR_NONCE, "n-0S6_WzA2Mj");
    let seeded = server.seed(record).await;

    let form = serde_json::json!({
        "grant_type": "authorization_code",
        "client_id": "spa",
        "code": code,
        "redirect_uri": REDIRECT_URI,
        "code_verifier": verifier.as_str()
    });

    let result = server
        .token(ClientCredentials::public("spa"), form.clone())
        .await
        .unwrap();
    assert!(result.id_token.is_some());
    // Public clients get no refresh token.
    assert!(result.refresh_token.is_none());

    let body = serde_json::to_value(result.to_token_response()).unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "openid profile");
    assert_eq!(body["expires_in"], 3600);

    let err = server
        .token(ClientCredentials::public("spa"), form)
        .await
        .unwrap_err();
    let rendered = TokenError::from(&err);
    assert_eq!(rendered.error, TokenErrorCode::InvalidGrant);
    assert_eq!(rendered.http_status(), 400);

    // Replay revokes everything issued from the code.
    let record = server
        .storage
        .records()
        .find_by_id(seeded.id)
        .await
        .unwrap()
        .unwrap();
    let access = record.token(TokenKind::AccessToken).unwrap();
    assert!(access.is_invalidated());
}

#[tokio::test]
async fn test_authorization_code_with_wrong_verifier() {
    let server = Server::new();
    server.add_client(web_app("client-1")).await;

    let challenge = PkceChallenge::from_verifier(&PkceVerifier::generate());
    let now = OffsetDateTime::now_utc();
    let code = TokenRecord::with_lifetime("the-code", now, Duration::minutes(5));
    let record = AuthorizationRecord::new(
        "client-1",
        "alice",
        GrantType::AuthorizationCode,
        scopes(["scope1"]),
    )
    .with_issuer(ISSUER)
    .with_token(TokenKind::AuthorizationCode, code)
    .with_attribute(ATTR_REDIRECT_URI, REDIRECT_URI)
    .with_attribute(ATTR_CODE_CHALLENGE, challenge.as_str())
    .with_attribute(ATTR_CODE_CHALLENGE_METHOD, "S256");
    server.seed(record).await;

    let err = server
        .token(
            basic("client-1"),
            serde_json::json!({
                "grant_type": "authorization_code",
                "code": "the-code",
                "redirect_uri": REDIRECT_URI,
                "code_verifier": PkceVerifier::generate().as_str()
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");
}

#[tokio::test]
async fn test_client_credentials_round_trip() {
    let server = Server::new();
    let backend = web_app("backend").with_scopes(["system/read", "system/write"]);
    server.add_client(backend).await;

    let result = server
        .token(
            ClientCredentials {
                client_id: Some("backend".to_string()),
                client_secret: Some(SECRET.to_string()),
                ..ClientCredentials::default()
            },
            serde_json::json!({"grant_type": "client_credentials", "scope": "system/read"}),
        )
        .await
        .unwrap();
    assert_eq!(result.scopes(), &scopes(["system/read"]));
    assert!(result.refresh_token.is_none());
    assert_eq!(server.storage.records().len().await, 1);

    let err = server
        .token(
            ClientCredentials {
                client_id: Some("backend".to_string()),
                client_secret: Some("wrong".to_string()),
                ..ClientCredentials::default()
            },
            serde_json::json!({"grant_type": "client_credentials"}),
        )
        .await
        .unwrap_err();
    assert_eq!(TokenError::from(&err).http_status(), 401);
}

#[tokio::test]
async fn test_unsupported_and_unauthorized_grants() {
    let mut config = AuthConfig::default();
    config.issuer = ISSUER.to_string();
    config.oauth.grant_types = vec![GrantType::RefreshToken, GrantType::ClientCredentials];
    let server = Server::with_config(config);
    let limited = web_app("limited").with_grant_types([GrantType::RefreshToken]);
    server.add_client(limited).await;

    let err = server
        .token(
            basic("limited"),
            serde_json::json!({"grant_type": GrantType::DEVICE_CODE_URN, "device_code": "abc"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedGrantType { .. }));

    let form = serde_json::json!({"grant_type": "client_credentials"});
    let err = server.token(basic("limited"), form).await.unwrap_err();
    assert!(matches!(err, AuthError::UnauthorizedClient { .. }));
}

#[tokio::test]
async fn test_device_code_polling() {
    let server = Server::new();
    server.add_client(web_app("tv")).await;

    let now = OffsetDateTime::now_utc();
    let lifetime = Duration::minutes(10);
    let device_code = TokenRecord::with_lifetime("device-code", now, lifetime);
    let user_code = TokenRecord::with_lifetime("WDJB-MJHT", now, lifetime);
    let granted = scopes(["scope1"]);
    let record = AuthorizationRecord::new("tv", "alice", GrantType::DeviceCode, granted)
        .with_issuer(ISSUER)
        .with_device(DeviceAuthorizationState::pending(0))
        .with_token(TokenKind::DeviceCode, device_code)
        .with_token(TokenKind::UserCode, user_code);
    let seeded = server.seed(record).await;
    let poll = serde_json::json!({
        "grant_type": GrantType::DEVICE_CODE_URN,
        "device_code": "device-code"
    });

    let err = server.token(basic("tv"), poll.clone()).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthorizationPending));
    assert_eq!(
        serde_json::to_string(&TokenError::from(&err)).unwrap(),
        r#"{"error":"authorization_pending"}"#
    );

    // The user approves on their phone.
    let records = server.storage.records();
    let mut record = records.find_by_id(seeded.id).await.unwrap().unwrap();
    if let Some(device) = record.device.as_mut() {
        device.status = DeviceAuthorizationStatus::Approved;
    }
    assert_ok!(records.save(record).await);

    let result = server.token(basic("tv"), poll.clone()).await.unwrap();
    assert_eq!(result.grant_type, GrantType::DeviceCode);
    assert!(result.refresh_token.is_some());

    let err = server.token(basic("tv"), poll).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
}

#[tokio::test]
async fn test_dynamic_registration_lifecycle() {
    let server = Server::new();

    let registrar = BearerPrincipal::new("registrar", scopes(["client.create"]));
    let request = ClientRegistrationRequest::builder()
        .issuer(ISSUER)
        .principal(Arc::new(registrar))
        .client_registration(
            ClientRegistration::new()
                .with_client_name("Reporting Job")
                .with_grant_type("client_credentials")
                .with_token_endpoint_auth_method("client_secret_post")
                .with_scope("reports.read"),
        )
        .build()
        .unwrap();
    assert_eq!(request.action(), RegistrationAction::Register);

    let registered = server.register(&request).await.unwrap();
    let client_id = registered.client_id().to_string();
    let secret = registered.client_secret.clone().unwrap();
    assert!(registered.registration_access_token.is_some());

    // The issued secret works at the token endpoint.
    let result = server
        .token(
            ClientCredentials {
                client_id: Some(client_id.clone()),
                client_secret: Some(secret),
                ..ClientCredentials::default()
            },
            serde_json::json!({"grant_type": "client_credentials"}),
        )
        .await
        .unwrap();
    assert_eq!(result.scopes(), &scopes(["reports.read"]));

    let manage = |delete: bool| {
        let owner = BearerPrincipal::new(client_id.as_str(), scopes(["client.read"]))
            .with_client_id(client_id.as_str());
        ClientRegistrationRequest::builder()
            .issuer(ISSUER)
            .principal(Arc::new(owner))
            .client_id(client_id.as_str())
            .delete(delete)
            .build()
            .unwrap()
    };

    let read = server.register(&manage(false)).await.unwrap();
    let name = read.registration.client_name.as_deref();
    assert_eq!(name, Some("Reporting Job"));
    assert!(read.client_secret.is_none());

    server.register(&manage(true)).await.unwrap();
    assert!(server.storage.clients().is_empty());
    assert!(server.storage.records().is_empty().await);

    let err = server
        .token(
            ClientCredentials::public(client_id.as_str()),
            serde_json::json!({"grant_type": "client_credentials"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidClient { .. }));
}

#[tokio::test]
async fn test_unauthenticated_principal_is_rejected_by_manager() {
    let server = Server::new();
    let principal = Arc::new(ClientPrincipal::unauthenticated(web_app("client-1")));
    let request: GrantRequest = TokenRequest {
        grant_type: "client_credentials".to_string(),
        ..TokenRequest::default()
    }
    .into_grant_request(ISSUER, principal)
    .unwrap();

    let err = server.manager.authenticate(&request).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClient { .. }));
}
