// Error codes raised by adapters, matching the auth library's `LuciaErrorCode` strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of typed errors an adapter may raise.
///
/// Serializes to the wire strings the auth library compares against
/// (`AUTH_DUPLICATE_KEY_ID`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthDuplicateUserId,
    AuthDuplicateProviderId,
    AuthDuplicateKeyId,
    AuthDuplicateSessionId,
    AuthInvalidUserId,
    AuthInvalidKeyId,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthDuplicateUserId => "AUTH_DUPLICATE_USER_ID",
            Self::AuthDuplicateProviderId => "AUTH_DUPLICATE_PROVIDER_ID",
            Self::AuthDuplicateKeyId => "AUTH_DUPLICATE_KEY_ID",
            Self::AuthDuplicateSessionId => "AUTH_DUPLICATE_SESSION_ID",
            Self::AuthInvalidUserId => "AUTH_INVALID_USER_ID",
            Self::AuthInvalidKeyId => "AUTH_INVALID_KEY_ID",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified error: one of the [`ErrorCode`]s the auth library expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{code}")]
pub struct LuciaError {
    pub code: ErrorCode,
}

impl LuciaError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code }
    }
}

impl From<ErrorCode> for LuciaError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

/// Error returned by every adapter operation.
///
/// Callers must be prepared for both a classified [`LuciaError`] and a raw
/// backend error, which is carried unmodified in [`AdapterError::Backend`].
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Lucia(#[from] LuciaError),

    /// Unclassified failure from the backing store, passed through as-is.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Wrap any backend error without altering it.
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(error))
    }

    /// The classified error code, if this is a [`LuciaError`].
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Lucia(e) => Some(e.code),
            _ => None,
        }
    }

    /// Borrow the wrapped backend error as a concrete type.
    pub fn downcast_backend<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Backend(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<ErrorCode> for AdapterError {
    fn from(code: ErrorCode) -> Self {
        Self::Lucia(LuciaError::new(code))
    }
}
