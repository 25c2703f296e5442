//! PKCE (Proof Key for Code Exchange), RFC 7636.
//!
//! Both `S256` and `plain` challenge methods are accepted. A challenge
//! stored with the authorization code is verified against the
//! `code_verifier` of the token request.
//!
//! # Example
//!
//! ```
//! use tollgate_auth::oauth::pkce::{PkceChallenge, PkceChallengeMethod, PkceVerifier};
//!
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::from_verifier(&verifier);
//! assert_eq!(challenge.method(), PkceChallengeMethod::S256);
//!
//! let stored =
//!     PkceChallenge::new(challenge.as_str().to_string(), PkceChallengeMethod::S256).unwrap();
//! assert!(stored.verify(&verifier).is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

// =============================================================================
// Error Types
// =============================================================================

/// PKCE validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PkceError {
    /// Verifier is shorter than 43 or longer than 128 characters.
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains characters outside the unreserved set.
    #[error("Invalid verifier characters: must be [A-Za-z0-9-._~]")]
    InvalidVerifierCharacters,

    /// S256 challenge is not base64url.
    #[error("Invalid challenge format: must be valid base64url")]
    InvalidChallengeFormat,

    /// Challenge method is neither `S256` nor `plain`.
    #[error("Unsupported challenge method: {0}")]
    UnsupportedMethod(String),

    /// A challenge was stored but the token request carried no verifier.
    #[error("code_verifier is required")]
    MissingVerifier,

    /// Verifier does not match the stored challenge.
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

impl PkceError {
    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidVerifierLength(_)
            | Self::InvalidVerifierCharacters
            | Self::InvalidChallengeFormat
            | Self::UnsupportedMethod(_)
            | Self::MissingVerifier => "invalid_request",
            Self::VerificationFailed => "invalid_grant",
        }
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::VerificationFailed => AuthError::invalid_grant(err.to_string()),
            other => AuthError::invalid_request(other.to_string()),
        }
    }
}

// =============================================================================
// Challenge Method
// =============================================================================

/// PKCE code challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkceChallengeMethod {
    /// SHA-256 of the verifier, base64url without padding.
    #[default]
    S256,

    /// The verifier itself.
    Plain,
}

impl PkceChallengeMethod {
    /// Parses a `code_challenge_method` value.
    ///
    /// # Errors
    ///
    /// `PkceError::UnsupportedMethod` for anything but `S256` and `plain`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Verifier
// =============================================================================

/// A validated `code_verifier`.
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Validates a verifier (RFC 7636 §4.1).
    ///
    /// # Errors
    ///
    /// Length outside 43-128 or characters outside `[A-Za-z0-9-._~]`.
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();
        if !(43..=128).contains(&len) {
            return Err(PkceError::InvalidVerifierLength(len));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        {
            return Err(PkceError::InvalidVerifierCharacters);
        }

        Ok(Self(verifier))
    }

    /// Generates a random 43-character verifier.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let bytes: [u8; 32] = rand::thread_rng().r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Challenge
// =============================================================================

/// A stored `code_challenge` with its method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    value: String,
    method: PkceChallengeMethod,
}

impl PkceChallenge {
    /// Derives the S256 challenge for a verifier.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        Self {
            value: s256(verifier.as_str()),
            method: PkceChallengeMethod::S256,
        }
    }

    /// Wraps a challenge received in an authorization request.
    ///
    /// # Errors
    ///
    /// `PkceError::InvalidChallengeFormat` if an S256 challenge is not
    /// base64url.
    pub fn new(value: String, method: PkceChallengeMethod) -> Result<Self, PkceError> {
        if method == PkceChallengeMethod::S256 && URL_SAFE_NO_PAD.decode(&value).is_err() {
            return Err(PkceError::InvalidChallengeFormat);
        }
        Ok(Self { value, method })
    }

    /// Checks a verifier against this challenge.
    ///
    /// # Errors
    ///
    /// `PkceError::VerificationFailed` on mismatch.
    pub fn verify(&self, verifier: &PkceVerifier) -> Result<(), PkceError> {
        let derived = match self.method {
            PkceChallengeMethod::S256 => s256(verifier.as_str()),
            PkceChallengeMethod::Plain => verifier.as_str().to_string(),
        };
        if derived == self.value {
            Ok(())
        } else {
            Err(PkceError::VerificationFailed)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn method(&self) -> PkceChallengeMethod {
        self.method
    }
}

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Verifies an optional token-request verifier against an optional stored
/// challenge.
///
/// `required` forces a challenge to exist (public clients, clients with
/// `require_pkce`).
///
/// # Errors
///
/// `invalid_request` style errors for missing or malformed values,
/// `VerificationFailed` on mismatch.
pub fn verify_code_exchange(
    challenge: Option<&PkceChallenge>,
    verifier: Option<&str>,
    required: bool,
) -> Result<(), PkceError> {
    match (challenge, verifier) {
        (None, _) if required => Err(PkceError::MissingVerifier),
        (None, _) => Ok(()),
        (Some(_), None) => Err(PkceError::MissingVerifier),
        (Some(challenge), Some(verifier)) => {
            let verifier = PkceVerifier::new(verifier.to_string())?;
            challenge.verify(&verifier)
        }
    }
}
