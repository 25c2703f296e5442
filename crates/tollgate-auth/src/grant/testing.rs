//! Mock collaborators for provider tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::client_secret::verify_client_secret;
use crate::config::TokenSettings;
use crate::error::AuthError;
use crate::grant::provider::GrantContext;
use crate::grant::request::GrantRequestBuilder;
use crate::storage::{AuthorizationRecordStore, RegisteredClientStore};
use crate::token::opaque::OpaqueTokenIssuer;
use crate::types::client::{RegisteredClient, TokenEndpointAuthMethod};
use crate::types::grant_type::GrantType;
use crate::types::principal::ClientPrincipal;
use crate::types::record::{AuthorizationRecord, TokenKind};

pub(crate) const ISSUER: &str = "https://example.com/issuer1";

#[derive(Default)]
pub(crate) struct MockRecordStore {
    pub records: RwLock<HashMap<Uuid, AuthorizationRecord>>,
    /// Makes `save` fail with a storage error.
    pub fail_saves: AtomicBool,
    /// Makes `remove_by_client` fail with a storage error.
    pub fail_removes: AtomicBool,
}

impl MockRecordStore {
    pub fn insert(&self, record: AuthorizationRecord) -> Uuid {
        let id = record.id;
        self.records.write().unwrap().insert(id, record);
        id
    }

    pub fn get(&self, id: Uuid) -> AuthorizationRecord {
        self.records.read().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl AuthorizationRecordStore for MockRecordStore {
    async fn find_by_token(
        &self,
        token_hash: &str,
        kind: Option<TokenKind>,
    ) -> AuthResult<Option<AuthorizationRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .find(|r| match kind {
                Some(kind) => r.token(kind).is_some_and(|t| t.token_hash == token_hash),
                None => r.find_token_kind(token_hash).is_some(),
            })
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<AuthorizationRecord>> {
        Ok(self.records.read().unwrap().get(&id).cloned())
    }

    async fn save(&self, mut record: AuthorizationRecord) -> AuthResult<AuthorizationRecord> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AuthError::storage("record store unavailable"));
        }
        let mut records = self.records.write().unwrap();
        let stored_version = records.get(&record.id).map(|r| r.version).unwrap_or(0);
        if stored_version != record.version {
            return Err(AuthError::conflict("version mismatch"));
        }
        record.version += 1;
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn remove(&self, id: Uuid) -> AuthResult<()> {
        self.records.write().unwrap().remove(&id);
        Ok(())
    }

    async fn remove_by_client(&self, client_id: &str) -> AuthResult<u64> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(AuthError::storage("record store unavailable"));
        }
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|_, r| r.client_id != client_id);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct MockClientStore {
    pub clients: RwLock<HashMap<String, RegisteredClient>>,
}

#[async_trait]
impl RegisteredClientStore for MockClientStore {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self.clients.read().unwrap().get(client_id).cloned())
    }

    async fn save(&self, client: &RegisteredClient) -> AuthResult<()> {
        self.clients
            .write()
            .unwrap()
            .insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn delete(&self, client_id: &str) -> AuthResult<()> {
        self.clients
            .write()
            .unwrap()
            .remove(client_id)
            .map(|_| ())
            .ok_or_else(|| AuthError::invalid_client("Client not found"))
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        let hash = self
            .clients
            .read()
            .unwrap()
            .get(client_id)
            .and_then(|c| c.client_secret.clone());
        match hash {
            Some(hash) => verify_client_secret(secret, &hash),
            None => Ok(false),
        }
    }
}

pub(crate) struct Fixture {
    pub records: MockRecordStore,
    pub clients: MockClientStore,
    pub issuer: OpaqueTokenIssuer,
    pub settings: TokenSettings,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            records: MockRecordStore::default(),
            clients: MockClientStore::default(),
            issuer: OpaqueTokenIssuer::new(),
            settings: TokenSettings::default(),
        }
    }

    pub fn context(&self) -> GrantContext<'_> {
        GrantContext::new(&self.records, &self.clients, &self.issuer, &self.settings)
    }
}

pub(crate) fn confidential_client(client_id: &str) -> RegisteredClient {
    RegisteredClient::new(
        client_id,
        "Test Client",
        TokenEndpointAuthMethod::ClientSecretBasic,
    )
    .with_secret_hash("$argon2id$unused")
    .with_grant_types([
        GrantType::AuthorizationCode,
        GrantType::RefreshToken,
        GrantType::ClientCredentials,
        GrantType::DeviceCode,
    ])
    .with_redirect_uris(["https://client.example.com/cb"])
}

pub(crate) fn principal(client: RegisteredClient) -> Arc<ClientPrincipal> {
    let method = client.token_endpoint_auth_method;
    Arc::new(ClientPrincipal::authenticated(client, method))
}

pub(crate) fn builder_for(client: RegisteredClient) -> GrantRequestBuilder {
    GrantRequestBuilder::new()
        .issuer(ISSUER)
        .client_principal(principal(client))
}
