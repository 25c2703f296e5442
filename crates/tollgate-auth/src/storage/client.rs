//! Registered client storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::client::RegisteredClient;

/// Storage trait for OAuth client registrations.
#[async_trait]
pub trait RegisteredClientStore: Send + Sync {
    /// Finds a client by its client ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>>;

    /// Inserts or replaces a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn save(&self, client: &RegisteredClient) -> AuthResult<()>;

    /// Deletes a client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidClient` if the client does not exist.
    async fn delete(&self, client_id: &str) -> AuthResult<()>;

    /// Verifies a plaintext secret against the client's stored hash.
    ///
    /// Returns `Ok(false)` for unknown clients, clients without a secret,
    /// and mismatches.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool>;
}
