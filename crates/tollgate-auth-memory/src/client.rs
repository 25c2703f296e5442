//! Registered client storage.

use async_trait::async_trait;
use dashmap::DashMap;

use tollgate_auth::client_secret::verify_client_secret;
use tollgate_auth::storage::RegisteredClientStore;
use tollgate_auth::types::RegisteredClient;
use tollgate_auth::{AuthError, AuthResult};

/// In-memory [`RegisteredClientStore`] keyed by `client_id`.
#[derive(Default)]
pub struct InMemoryRegisteredClientStore {
    clients: DashMap<String, RegisteredClient>,
}

impl InMemoryRegisteredClientStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl RegisteredClientStore for InMemoryRegisteredClientStore {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }

    async fn save(&self, client: &RegisteredClient) -> AuthResult<()> {
        client
            .validate()
            .map_err(|e| AuthError::invalid_client_metadata(e.to_string()))?;
        let client_id = client.client_id.clone();
        self.clients.insert(client_id, client.clone());
        Ok(())
    }

    async fn delete(&self, client_id: &str) -> AuthResult<()> {
        self.clients
            .remove(client_id)
            .map(|_| ())
            .ok_or_else(|| AuthError::invalid_client(format!("Client not found: {client_id}")))
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        // Clone the hash out so the shard lock is not held during Argon2.
        let hash = self
            .clients
            .get(client_id)
            .and_then(|entry| entry.client_secret.clone());

        match hash {
            Some(hash) => verify_client_secret(secret, &hash),
            None => Ok(false),
        }
    }
}
