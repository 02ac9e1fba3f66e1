// Authentication adapter trait: the storage contract the authentication
// library calls. Sixteen operations over users, sessions, and keys.
//
// Absence is never an error: lookups by id return `None` and lookups by user
// return an empty `Vec`. Only integrity violations (unknown user, duplicate
// id, constraint failures surfaced by storage) become `AuthError`s.

use std::fmt;

use async_trait::async_trait;

use crate::db::context::Row;
use crate::db::models::{KeySchema, SessionSchema, UserSchema};
use crate::error::AdapterResult;

#[async_trait]
pub trait AuthAdapter: Send + Sync + fmt::Debug {
    // ─── Sessions ────────────────────────────────────────────────

    /// The session with this id, or `None`.
    async fn get_session(&self, session_id: &str) -> AdapterResult<Option<SessionSchema>>;

    /// Every session owned by the user.
    async fn get_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<SessionSchema>>;

    /// Create a session. Fails with `AuthInvalidUserId` if the owner does not
    /// exist and with `AuthInvalidSessionId` if storage rejects the insert.
    async fn set_session(&self, session: SessionSchema) -> AdapterResult<()>;

    /// Apply canonical-keyed `partial` fields to the session.
    async fn update_session(&self, session_id: &str, partial: Row) -> AdapterResult<()>;

    async fn delete_session(&self, session_id: &str) -> AdapterResult<()>;

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<()>;

    // ─── Users ───────────────────────────────────────────────────

    /// The user with this id, or `None`.
    async fn get_user(&self, user_id: &str) -> AdapterResult<Option<UserSchema>>;

    /// Create a user, and when `key` is given, its key in the same unit of work.
    async fn set_user(&self, user: UserSchema, key: Option<KeySchema>) -> AdapterResult<()>;

    async fn update_user(&self, user_id: &str, partial: Row) -> AdapterResult<()>;

    async fn delete_user(&self, user_id: &str) -> AdapterResult<()>;

    // ─── Keys ────────────────────────────────────────────────────

    /// The key with this id, or `None`.
    async fn get_key(&self, key_id: &str) -> AdapterResult<Option<KeySchema>>;

    async fn get_keys_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<KeySchema>>;

    /// Create a key. Fails with `AuthInvalidUserId` if the owner does not
    /// exist and with `AuthDuplicateKeyId` if storage rejects the insert.
    async fn set_key(&self, key: KeySchema) -> AdapterResult<()>;

    async fn update_key(&self, key_id: &str, partial: Row) -> AdapterResult<()>;

    async fn delete_key(&self, key_id: &str) -> AdapterResult<()>;

    async fn delete_keys_by_user_id(&self, user_id: &str) -> AdapterResult<()>;
}
