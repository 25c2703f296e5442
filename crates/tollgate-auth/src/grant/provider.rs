//! Grant provider contract.
//!
//! A provider implements the business rules of one grant type. Providers hold
//! no state: stores, the token issuer and token settings arrive through a
//! [`GrantContext`] on every call, so the same provider instance can serve
//! concurrent requests and tests can hand it mock collaborators.
//!
//! New grants are added by implementing [`GrantAuthenticationProvider`]
//! (typically over [`ExtensionGrantRequest`](super::ExtensionGrantRequest))
//! and registering it with the
//! [`GrantAuthenticationManager`](super::GrantAuthenticationManager).

use async_trait::async_trait;

use crate::AuthResult;
use crate::config::TokenSettings;
use crate::grant::request::GrantRequest;
use crate::grant::result::IssuedResult;
use crate::storage::{AuthorizationRecordStore, RegisteredClientStore, with_timeout};
use crate::token::issuer::{IssuedToken, TokenIssueRequest, TokenIssuer};
use crate::types::client::RegisteredClient;
use crate::types::grant_type::GrantType;
use crate::types::record::{AuthorizationRecord, TokenKind, TokenRecord};

/// Handles one grant type.
#[async_trait]
pub trait GrantAuthenticationProvider: Send + Sync {
    /// The grant type tag this provider is registered under.
    fn grant_type(&self) -> GrantType;

    /// Validates the request and issues tokens.
    ///
    /// The dispatcher has already checked that the client principal is
    /// authenticated and that the client may use this grant type.
    ///
    /// # Errors
    ///
    /// Returns the OAuth error describing why the grant was refused.
    async fn authenticate(
        &self,
        request: &GrantRequest,
        context: &GrantContext<'_>,
    ) -> AuthResult<IssuedResult>;
}

/// Collaborators handed to a provider for one call.
///
/// Every store and issuer call made through the context is bounded by
/// `settings.store_timeout`.
#[derive(Clone, Copy)]
pub struct GrantContext<'a> {
    pub records: &'a dyn AuthorizationRecordStore,
    pub clients: &'a dyn RegisteredClientStore,
    pub token_issuer: &'a dyn TokenIssuer,
    pub settings: &'a TokenSettings,
}

impl<'a> GrantContext<'a> {
    #[must_use]
    pub fn new(
        records: &'a dyn AuthorizationRecordStore,
        clients: &'a dyn RegisteredClientStore,
        token_issuer: &'a dyn TokenIssuer,
        settings: &'a TokenSettings,
    ) -> Self {
        Self {
            records,
            clients,
            token_issuer,
            settings,
        }
    }

    /// Looks up the record holding a plaintext token value.
    ///
    /// # Errors
    ///
    /// Storage failures and timeouts.
    pub async fn find_record(
        &self,
        token_value: &str,
        kind: TokenKind,
    ) -> AuthResult<Option<AuthorizationRecord>> {
        let hash = TokenRecord::hash_token(token_value);
        with_timeout(
            self.settings.store_timeout,
            "records.find_by_token",
            self.records.find_by_token(&hash, Some(kind)),
        )
        .await
    }

    /// Saves a record with compare-and-swap on its version.
    ///
    /// # Errors
    ///
    /// `AuthError::Conflict` if the record changed since it was loaded,
    /// storage failures and timeouts otherwise.
    pub async fn save_record(
        &self,
        record: AuthorizationRecord,
    ) -> AuthResult<AuthorizationRecord> {
        with_timeout(
            self.settings.store_timeout,
            "records.save",
            self.records.save(record),
        )
        .await
    }

    /// Removes every record belonging to a client.
    ///
    /// # Errors
    ///
    /// Storage failures and timeouts.
    pub async fn remove_client_records(&self, client_id: &str) -> AuthResult<u64> {
        with_timeout(
            self.settings.store_timeout,
            "records.remove_by_client",
            self.records.remove_by_client(client_id),
        )
        .await
    }

    /// Loads a registered client.
    ///
    /// # Errors
    ///
    /// Storage failures and timeouts.
    pub async fn find_client(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        with_timeout(
            self.settings.store_timeout,
            "clients.find_by_client_id",
            self.clients.find_by_client_id(client_id),
        )
        .await
    }

    /// Stores a registered client.
    ///
    /// # Errors
    ///
    /// Storage failures and timeouts.
    pub async fn save_client(&self, client: &RegisteredClient) -> AuthResult<()> {
        with_timeout(
            self.settings.store_timeout,
            "clients.save",
            self.clients.save(client),
        )
        .await
    }

    /// Deletes a registered client.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidClient` for unknown clients, storage failures and
    /// timeouts.
    pub async fn delete_client(&self, client_id: &str) -> AuthResult<()> {
        with_timeout(
            self.settings.store_timeout,
            "clients.delete",
            self.clients.delete(client_id),
        )
        .await
    }

    /// Mints a token.
    ///
    /// # Errors
    ///
    /// Issuer failures and timeouts.
    pub async fn issue(&self, request: &TokenIssueRequest) -> AuthResult<IssuedToken> {
        with_timeout(
            self.settings.store_timeout,
            "token_issuer.issue",
            self.token_issuer.issue(request),
        )
        .await
    }
}
