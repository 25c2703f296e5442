//! Authorization record storage trait.
//!
//! # Security Considerations
//!
//! - Records are looked up by token hash only; plaintext tokens never reach
//!   the store
//! - `save` must be an atomic compare-and-swap on `version`, otherwise two
//!   concurrent refreshes can both succeed with the same refresh token

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::record::{AuthorizationRecord, TokenKind};

/// Storage trait for authorization records.
///
/// # Implementations
///
/// - `tollgate-auth-memory` - in-process backend
#[async_trait]
pub trait AuthorizationRecordStore: Send + Sync {
    /// Finds the record holding a token with the given hash.
    ///
    /// When `kind` is `Some`, only that slot is matched. Records are returned
    /// regardless of token expiry or invalidation; callers check.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_token(
        &self,
        token_hash: &str,
        kind: Option<TokenKind>,
    ) -> AuthResult<Option<AuthorizationRecord>>;

    /// Finds a record by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<AuthorizationRecord>>;

    /// Inserts or updates a record.
    ///
    /// The record's `version` must equal the stored version (0 for a new
    /// record). On success the store persists the record with
    /// `version + 1` and returns it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Conflict` if the stored version differs, or a
    /// storage error if the operation fails.
    async fn save(&self, record: AuthorizationRecord) -> AuthResult<AuthorizationRecord>;

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove(&self, id: Uuid) -> AuthResult<()>;

    /// Removes every record belonging to a client.
    ///
    /// Used when a client is deleted. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove_by_client(&self, client_id: &str) -> AuthResult<u64>;
}
