// Error classifier — maps raw SurrealDB failures onto Lucia's typed error codes.
//
// Only uniqueness violations are recognised here, by matching the datastore's
// error text. Foreign-key failures never reach this point: the adapter checks
// for the owning user (or key) before writing.

use std::fmt;
use std::sync::Arc;

use lucia_core::{AdapterError, ErrorCode};

use crate::error::SurrealError;
use crate::options::ErrorHook;
use crate::query::{KEY_ID_FIELD, PROVIDER_ID_FIELD};

/// Adapter operation in which a backend error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetUser,
    SetUser,
    DeleteUser,
    UpdateUserAttributes,
    GetSessionAndUser,
    GetSession,
    GetSessionsByUserId,
    SetSession,
    DeleteSession,
    DeleteSessionsByUserId,
    GetKey,
    /// Key creation, either through `set_key` or as part of `set_user`.
    SetKey,
    GetKeysByUserId,
    UpdateKeyPassword,
    DeleteKeysByUserId,
    DeleteNonPrimaryKey,
    DefineSchema,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetUser => "get_user",
            Self::SetUser => "set_user",
            Self::DeleteUser => "delete_user",
            Self::UpdateUserAttributes => "update_user_attributes",
            Self::GetSessionAndUser => "get_session_and_user",
            Self::GetSession => "get_session",
            Self::GetSessionsByUserId => "get_sessions_by_user_id",
            Self::SetSession => "set_session",
            Self::DeleteSession => "delete_session",
            Self::DeleteSessionsByUserId => "delete_sessions_by_user_id",
            Self::GetKey => "get_key",
            Self::SetKey => "set_key",
            Self::GetKeysByUserId => "get_keys_by_user_id",
            Self::UpdateKeyPassword => "update_key_password",
            Self::DeleteKeysByUserId => "delete_keys_by_user_id",
            Self::DeleteNonPrimaryKey => "delete_non_primary_key",
            Self::DefineSchema => "define_schema",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a backend error is one of the expected conflicts.
///
/// Returning `None` means "not mine": the error goes to the error hook and
/// then back to the caller unchanged.
pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    fn classify(&self, operation: Operation, error: &SurrealError) -> Option<ErrorCode>;
}

/// SurrealDB's unique-index violation: "Database index `...` already contains ...".
const INDEX_CONFLICT: &str = "already contains";
/// SurrealDB's record-id collision: "Database record `...` already exists".
const RECORD_CONFLICT: &str = "already exists";

/// Default classifier, matching SurrealDB's own error messages.
///
/// Index conflicts are attributed by field name, which the index names created
/// by [`SurrealAdapter::create_schema`](crate::SurrealAdapter::create_schema)
/// always contain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurrealErrorClassifier;

impl ErrorClassifier for SurrealErrorClassifier {
    fn classify(&self, operation: Operation, error: &SurrealError) -> Option<ErrorCode> {
        let SurrealError::Db(message) = error else {
            return None;
        };
        let index_conflict =
            |field: &str| message.contains(INDEX_CONFLICT) && message.contains(field);

        match operation {
            Operation::SetUser if index_conflict(PROVIDER_ID_FIELD) => {
                Some(ErrorCode::AuthDuplicateProviderId)
            }
            Operation::SetUser if message.contains(RECORD_CONFLICT) => {
                Some(ErrorCode::AuthDuplicateUserId)
            }
            Operation::SetKey if index_conflict(KEY_ID_FIELD) => Some(ErrorCode::AuthDuplicateKeyId),
            Operation::SetSession if message.contains(RECORD_CONFLICT) => {
                Some(ErrorCode::AuthDuplicateSessionId)
            }
            _ => None,
        }
    }
}

/// Classifier plus error hook, applied to every failed backend call.
#[derive(Clone)]
pub struct ErrorPolicy {
    classifier: Arc<dyn ErrorClassifier>,
    hook: Option<ErrorHook>,
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPolicy")
            .field("classifier", &self.classifier)
            .field("hook", &self.hook.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ErrorPolicy {
    pub fn new(classifier: Option<Arc<dyn ErrorClassifier>>, hook: Option<ErrorHook>) -> Self {
        Self {
            classifier: classifier.unwrap_or_else(|| Arc::new(SurrealErrorClassifier)),
            hook,
        }
    }

    /// Turn a backend failure into the error returned to the caller.
    pub fn resolve(&self, operation: Operation, error: SurrealError) -> AdapterError {
        if let Some(code) = self.classifier.classify(operation, &error) {
            return code.into();
        }

        tracing::warn!(
            operation = %operation,
            error = %error,
            "[SurrealDB Adapter] unclassified error"
        );
        if let Some(hook) = &self.hook {
            hook(&error, operation);
        }
        error.into()
    }
}
