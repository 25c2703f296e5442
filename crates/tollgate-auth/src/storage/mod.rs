//! Storage traits for grant and client data.
//!
//! - [`AuthorizationRecordStore`] - authorization records and their tokens
//! - [`RegisteredClientStore`] - client registrations
//!
//! The core never calls a store without a deadline: every call goes through
//! [`with_timeout`].
//!
//! # Implementations
//!
//! - `tollgate-auth-memory` - in-process backends

pub mod client;
pub mod record;

use std::future::Future;
use std::time::Duration;

pub use client::RegisteredClientStore;
pub use record::AuthorizationRecordStore;

use crate::AuthResult;
use crate::error::AuthError;

/// Runs a store call under a deadline.
///
/// # Errors
///
/// Returns `AuthError::Timeout` naming `operation` if the deadline passes,
/// otherwise whatever the call returned.
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, call: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Storage call timed out"
            );
            Err(AuthError::timeout(operation))
        }
    }
}
