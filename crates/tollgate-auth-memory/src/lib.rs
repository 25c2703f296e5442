//! In-memory storage backend for tollgate-auth.
//!
//! Provides process-local implementations of:
//!
//! - [`AuthorizationRecordStore`](tollgate_auth::AuthorizationRecordStore) -
//!   records indexed by token hash, compare-and-swap on `version`
//! - [`RegisteredClientStore`](tollgate_auth::RegisteredClientStore) -
//!   client registrations with Argon2 secret verification
//!
//! Nothing survives a restart. Suited to tests, demos and single-node
//! deployments that accept losing grants on restart.
//!
//! # Example
//!
//! ```ignore
//! use tollgate_auth_memory::InMemoryAuthStorage;
//!
//! let storage = InMemoryAuthStorage::new();
//! let manager = GrantAuthenticationManager::from_config(
//!     &config,
//!     storage.records(),
//!     storage.clients(),
//!     Arc::new(OpaqueTokenIssuer::new()),
//! );
//! ```

pub mod client;
pub mod record;

use std::sync::Arc;

pub use client::InMemoryRegisteredClientStore;
pub use record::InMemoryAuthorizationRecordStore;

/// Both in-memory stores, shared behind `Arc`s.
#[derive(Clone, Default)]
pub struct InMemoryAuthStorage {
    records: Arc<InMemoryAuthorizationRecordStore>,
    clients: Arc<InMemoryRegisteredClientStore>,
}

impl InMemoryAuthStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The authorization record store.
    #[must_use]
    pub fn records(&self) -> Arc<InMemoryAuthorizationRecordStore> {
        Arc::clone(&self.records)
    }

    /// The registered client store.
    #[must_use]
    pub fn clients(&self) -> Arc<InMemoryRegisteredClientStore> {
        Arc::clone(&self.clients)
    }
}
