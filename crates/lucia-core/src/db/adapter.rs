// Database adapter trait — the contract every Lucia storage backend implements.
//
// One method per call the auth library makes: user CRUD, session CRUD plus the
// combined session/user fetch, key CRUD, and bulk deletes by owning user.

use std::fmt;

use async_trait::async_trait;

use crate::db::models::{Key, Session, SessionAndUser, User, UserAttributes};
use crate::error::AdapterError;

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// The adapter contract.
///
/// Foreign-key failures (a session or key naming a user that does not exist)
/// surface as `AUTH_INVALID_USER_ID`; unique-constraint failures as the
/// matching `AUTH_DUPLICATE_*` code. Every other failure is the backend's
/// own error, unmodified. Deleting a user never cascades: the auth library
/// calls [`Adapter::delete_sessions_by_user_id`] and
/// [`Adapter::delete_keys_by_user_id`] itself.
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    // ─── Users ───────────────────────────────────────────────────

    /// Fetch a user by id.
    async fn get_user(&self, user_id: &str) -> AdapterResult<Option<User>>;

    /// Create a user, and optionally its first key.
    async fn set_user(
        &self,
        user_id: &str,
        attributes: UserAttributes,
        key: Option<Key>,
    ) -> AdapterResult<User>;

    /// Delete a user. Sessions and keys are left in place.
    async fn delete_user(&self, user_id: &str) -> AdapterResult<()>;

    /// Merge attributes into an existing user and return the updated user.
    async fn update_user_attributes(
        &self,
        user_id: &str,
        attributes: UserAttributes,
    ) -> AdapterResult<User>;

    // ─── Sessions ────────────────────────────────────────────────

    /// Fetch a session together with the user that owns it.
    async fn get_session_and_user_by_session_id(
        &self,
        session_id: &str,
    ) -> AdapterResult<Option<SessionAndUser>>;

    async fn get_session(&self, session_id: &str) -> AdapterResult<Option<Session>>;

    async fn get_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<Session>>;

    /// Create a session. The owning user must exist.
    async fn set_session(&self, session: Session) -> AdapterResult<()>;

    async fn delete_session(&self, session_id: &str) -> AdapterResult<()>;

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<()>;

    // ─── Keys ────────────────────────────────────────────────────

    async fn get_key(&self, key_id: &str) -> AdapterResult<Option<Key>>;

    /// Create a key. The owning user must exist.
    async fn set_key(&self, key: Key) -> AdapterResult<()>;

    async fn get_keys_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<Key>>;

    /// Replace a key's password hash and return the updated key.
    async fn update_key_password(
        &self,
        key_id: &str,
        hashed_password: Option<String>,
    ) -> AdapterResult<Key>;

    async fn delete_keys_by_user_id(&self, user_id: &str) -> AdapterResult<()>;

    /// Delete a key unless it is the user's primary key.
    async fn delete_non_primary_key(&self, key_id: &str) -> AdapterResult<()>;
}
