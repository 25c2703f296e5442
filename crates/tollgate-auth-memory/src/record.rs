//! Authorization record storage.
//!
//! Records live in a map keyed by id, next to an index from token hash to
//! record id. Both sit behind one `RwLock` so a save, its version check and
//! its index update happen atomically.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use tollgate_auth::storage::AuthorizationRecordStore;
use tollgate_auth::types::{AuthorizationRecord, TokenKind};
use tollgate_auth::{AuthError, AuthResult};

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, AuthorizationRecord>,
    by_token: HashMap<String, Uuid>,
}

impl Inner {
    fn unindex(&mut self, record: &AuthorizationRecord) {
        for token in record.tokens.values() {
            if self.by_token.get(&token.token_hash) == Some(&record.id) {
                self.by_token.remove(&token.token_hash);
            }
        }
    }

    fn index(&mut self, record: &AuthorizationRecord) {
        for token in record.tokens.values() {
            self.by_token.insert(token.token_hash.clone(), record.id);
        }
    }

    fn remove(&mut self, id: &Uuid) -> Option<AuthorizationRecord> {
        let record = self.records.remove(id)?;
        self.unindex(&record);
        Some(record)
    }
}

/// In-memory [`AuthorizationRecordStore`].
#[derive(Default)]
pub struct InMemoryAuthorizationRecordStore {
    inner: RwLock<Inner>,
}

impl InMemoryAuthorizationRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[async_trait]
impl AuthorizationRecordStore for InMemoryAuthorizationRecordStore {
    async fn find_by_token(
        &self,
        token_hash: &str,
        kind: Option<TokenKind>,
    ) -> AuthResult<Option<AuthorizationRecord>> {
        let inner = self.inner.read().await;
        let Some(record) = inner
            .by_token
            .get(token_hash)
            .and_then(|id| inner.records.get(id))
        else {
            return Ok(None);
        };

        let matches = match kind {
            Some(kind) => record
                .token(kind)
                .is_some_and(|token| token.token_hash == token_hash),
            None => true,
        };
        Ok(matches.then(|| record.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<AuthorizationRecord>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn save(&self, mut record: AuthorizationRecord) -> AuthResult<AuthorizationRecord> {
        let mut inner = self.inner.write().await;

        let stored_version = inner.records.get(&record.id).map_or(0, |r| r.version);
        if stored_version != record.version {
            tracing::debug!(
                record_id = %record.id,
                client_id = %record.client_id,
                expected = record.version,
                actual = stored_version,
                "Authorization record version conflict"
            );
            return Err(AuthError::conflict(format!(
                "authorization record {} was modified concurrently",
                record.id
            )));
        }

        if let Some(previous) = inner.records.get(&record.id).cloned() {
            inner.unindex(&previous);
        }
        record.version += 1;
        inner.index(&record);
        inner.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn remove(&self, id: Uuid) -> AuthResult<()> {
        self.inner.write().await.remove(&id);
        Ok(())
    }

    async fn remove_by_client(&self, client_id: &str) -> AuthResult<u64> {
        let mut inner = self.inner.write().await;
        let ids: Vec<Uuid> = inner
            .records
            .values()
            .filter(|r| r.client_id == client_id)
            .map(|r| r.id)
            .collect();
        for id in &ids {
            inner.remove(id);
        }
        Ok(ids.len() as u64)
    }
}
