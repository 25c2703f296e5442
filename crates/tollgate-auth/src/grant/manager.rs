//! Grant dispatcher.
//!
//! [`GrantAuthenticationManager`] owns the collaborators, maps grant type
//! tags to providers, and applies the checks every grant shares before a
//! provider runs:
//!
//! 1. The client principal must be authenticated (`invalid_client`)
//! 2. A provider must be registered for the tag (`unsupported_grant_type`)
//! 3. The client must be allowed to use the grant (`unauthorized_client`)
//!
//! Errors are returned to the caller as-is; the manager never renders a
//! protocol response.

use std::collections::HashMap;
use std::sync::Arc;

use crate::AuthResult;
use crate::config::{AuthConfig, TokenSettings};
use crate::error::AuthError;
use crate::grant::authorization_code::AuthorizationCodeGrantProvider;
use crate::grant::client_credentials::ClientCredentialsGrantProvider;
use crate::grant::device_code::DeviceCodeGrantProvider;
use crate::grant::provider::{GrantAuthenticationProvider, GrantContext};
use crate::grant::refresh_token::RefreshTokenGrantProvider;
use crate::grant::request::{GrantAuthenticationRequest, GrantRequest};
use crate::grant::result::IssuedResult;
use crate::oidc::registration::{ClientRegistrationRequest, ClientRegistrationResult};
use crate::oidc::registration_provider::ClientRegistrationProvider;
use crate::storage::{AuthorizationRecordStore, RegisteredClientStore};
use crate::token::issuer::TokenIssuer;
use crate::types::grant_type::GrantType;
use crate::types::principal::Principal;

/// Routes grant and registration requests to their providers.
pub struct GrantAuthenticationManager {
    providers: HashMap<GrantType, Arc<dyn GrantAuthenticationProvider>>,
    registration: Option<ClientRegistrationProvider>,
    records: Arc<dyn AuthorizationRecordStore>,
    clients: Arc<dyn RegisteredClientStore>,
    token_issuer: Arc<dyn TokenIssuer>,
    settings: TokenSettings,
}

impl GrantAuthenticationManager {
    /// Creates a manager with no providers registered.
    #[must_use]
    pub fn new(
        records: Arc<dyn AuthorizationRecordStore>,
        clients: Arc<dyn RegisteredClientStore>,
        token_issuer: Arc<dyn TokenIssuer>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            registration: None,
            records,
            clients,
            token_issuer,
            settings,
        }
    }

    /// Creates a manager with the built-in providers for every grant type
    /// the configuration enables, plus client registration when enabled.
    ///
    /// Extension grant types listed in the configuration still need their
    /// provider registered with [`with_provider`](Self::with_provider).
    #[must_use]
    pub fn from_config(
        config: &AuthConfig,
        records: Arc<dyn AuthorizationRecordStore>,
        clients: Arc<dyn RegisteredClientStore>,
        token_issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        let builtin: [Arc<dyn GrantAuthenticationProvider>; 4] = [
            Arc::new(AuthorizationCodeGrantProvider),
            Arc::new(RefreshTokenGrantProvider),
            Arc::new(ClientCredentialsGrantProvider),
            Arc::new(DeviceCodeGrantProvider),
        ];

        let mut manager = Self::new(records, clients, token_issuer, config.token_settings());
        for provider in builtin {
            if config.is_grant_type_enabled(&provider.grant_type()) {
                manager.register(provider);
            }
        }
        if config.registration.enabled {
            manager.registration = Some(ClientRegistrationProvider);
        }
        manager
    }

    /// Registers a provider, replacing any provider for the same tag.
    pub fn register(&mut self, provider: Arc<dyn GrantAuthenticationProvider>) {
        let grant_type = provider.grant_type();
        let replaced = self.providers.insert(grant_type.clone(), provider);
        if replaced.is_some() {
            tracing::debug!(grant_type = %grant_type, "Replaced grant provider");
        }
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn GrantAuthenticationProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Enables dynamic client registration.
    #[must_use]
    pub fn with_registration(mut self) -> Self {
        self.registration = Some(ClientRegistrationProvider);
        self
    }

    /// Returns `true` if a provider handles the tag.
    #[must_use]
    pub fn supports(&self, grant_type: &GrantType) -> bool {
        self.providers.contains_key(grant_type)
    }

    /// Registered grant type tags.
    pub fn grant_types(&self) -> impl Iterator<Item = &GrantType> {
        self.providers.keys()
    }

    #[must_use]
    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    fn context(&self) -> GrantContext<'_> {
        GrantContext::new(
            self.records.as_ref(),
            self.clients.as_ref(),
            self.token_issuer.as_ref(),
            &self.settings,
        )
    }

    /// Authenticates a grant request and issues tokens.
    ///
    /// # Errors
    ///
    /// `InvalidClient`, `UnsupportedGrantType` and `UnauthorizedClient` from
    /// the shared checks, otherwise whatever the provider returns.
    pub async fn authenticate(&self, request: &GrantRequest) -> AuthResult<IssuedResult> {
        let grant_type = request.grant_type();
        let principal = request.client_principal();
        let client_id = principal.client_id();

        if !principal.is_authenticated() {
            tracing::debug!(client_id, grant_type = %grant_type, "Unauthenticated client");
            return Err(AuthError::invalid_client("Client authentication failed"));
        }

        let provider = self.providers.get(grant_type).ok_or_else(|| {
            tracing::debug!(client_id, grant_type = %grant_type, "No provider for grant type");
            AuthError::unsupported_grant_type(grant_type.as_str())
        })?;

        if !principal.client().is_grant_type_allowed(grant_type) {
            tracing::debug!(
                client_id,
                grant_type = %grant_type,
                "Grant type not allowed for client"
            );
            return Err(AuthError::unauthorized_client(format!(
                "Client is not authorized for the {grant_type} grant"
            )));
        }

        match provider.authenticate(request, &self.context()).await {
            Ok(result) => Ok(result),
            Err(error) => {
                if error.is_server_error() {
                    tracing::warn!(
                        client_id,
                        grant_type = %grant_type,
                        error = %error,
                        "Grant failed"
                    );
                } else {
                    tracing::debug!(
                        client_id,
                        grant_type = %grant_type,
                        error = %error,
                        "Grant rejected"
                    );
                }
                Err(error)
            }
        }
    }

    /// Handles a dynamic client registration request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when registration is disabled, otherwise whatever
    /// the registration provider returns.
    pub async fn authenticate_registration(
        &self,
        request: &ClientRegistrationRequest,
    ) -> AuthResult<ClientRegistrationResult> {
        let provider = self
            .registration
            .as_ref()
            .ok_or_else(|| AuthError::invalid_request("Client registration is not enabled"))?;

        let result = provider.authenticate(request, &self.context()).await;
        if let Err(error) = &result {
            tracing::debug!(
                principal = %request.principal().name(),
                action = %request.action(),
                error = %error,
                "Client registration rejected"
            );
        }
        result
    }
}
