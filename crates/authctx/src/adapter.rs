// ContextAdapter: forwards every auth adapter operation to one injected
// context, renaming columns at the boundary.
//
// Writes: canonical row → storage row (destructive remap for inserts,
// non-destructive for partial updates) → context call.
// Reads: context call → storage rows → canonical rows → typed models.
//
// Storage failures on create/update are re-raised as fixed `AuthError` codes
// with the original failure chained as the source. Read and delete failures
// bubble as `AdapterError::Context`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use authctx_core::db::adapter::AuthAdapter;
use authctx_core::db::columns::{ColumnMap, ColumnMaps};
use authctx_core::db::context::{Connection, DataContext, Row, Transaction, WhereClause};
use authctx_core::db::models::{from_row, to_row, KeySchema, SessionSchema, UserSchema};
use authctx_core::error::{
    AdapterError, AdapterResult, AuthError, ContextError, ContextResult, ErrorCode,
};
use authctx_core::options::{AdapterOptions, UserCreationMode};

use crate::factory::AuthContexts;
use crate::user_check::ensure_user_exists;

/// Build the error mapper for a mutating operation: logs the storage failure
/// and wraps it under `code`.
fn translated(code: ErrorCode, operation: &'static str) -> impl FnOnce(ContextError) -> AdapterError {
    move |err| {
        tracing::warn!(operation, code = code.as_str(), "storage rejected write: {err}");
        AuthError::with_source(code, err).into()
    }
}

/// Auth adapter over three data contexts.
#[derive(Debug, Clone)]
pub struct ContextAdapter {
    contexts: AuthContexts,
    columns: Arc<ColumnMaps>,
    options: AdapterOptions,
    connection: Option<Arc<dyn Connection>>,
}

impl ContextAdapter {
    pub(crate) fn new(
        contexts: AuthContexts,
        columns: ColumnMaps,
        options: AdapterOptions,
        connection: Option<Arc<dyn Connection>>,
    ) -> Self {
        Self {
            contexts,
            columns: Arc::new(columns),
            options,
            connection,
        }
    }

    /// Get the adapter ID.
    pub fn adapter_id(&self) -> &str {
        "context"
    }

    pub fn columns(&self) -> &ColumnMaps {
        &self.columns
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    fn log(&self, operation: &str, context: &dyn DataContext) {
        if self.options.debug_logs {
            tracing::debug!("[{}] {} on '{}'", self.adapter_id(), operation, context.table());
        }
    }

    // ─── Shared forwarding helpers ───────────────────────────────

    async fn find_one<T: DeserializeOwned + Send>(
        &self,
        context: &dyn DataContext,
        map: &ColumnMap,
        field: &str,
        value: &str,
    ) -> AdapterResult<Option<T>> {
        let row = context
            .filter(WhereClause::eq(map.storage_name(field), value))
            .first()
            .await?;
        Ok(row.map(|r| from_row(map.to_canonical(r))).transpose()?)
    }

    async fn find_many<T: DeserializeOwned + Send>(
        &self,
        context: &dyn DataContext,
        map: &ColumnMap,
        field: &str,
        value: &str,
    ) -> AdapterResult<Vec<T>> {
        let rows = context
            .filter(WhereClause::eq(map.storage_name(field), value))
            .select()
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| from_row(map.to_canonical(r)))
            .collect::<ContextResult<Vec<T>>>()?)
    }

    /// Partial update of the rows whose `id` matches. A storage failure or a
    /// missing target both surface as `code`.
    async fn update_by_id(
        &self,
        context: &dyn DataContext,
        map: &ColumnMap,
        id: &str,
        partial: Row,
        code: ErrorCode,
        operation: &'static str,
    ) -> AdapterResult<()> {
        let changes = map.to_storage(&partial);
        let affected = context
            .filter(WhereClause::eq(map.storage_name("id"), id))
            .update(changes)
            .await
            .map_err(translated(code, operation))?;
        if affected == 0 {
            tracing::debug!(operation, id, "update matched no rows");
            return Err(AuthError::new(code).into());
        }
        Ok(())
    }

    async fn delete_where(
        &self,
        context: &dyn DataContext,
        map: &ColumnMap,
        field: &str,
        value: &str,
    ) -> AdapterResult<()> {
        let removed = context
            .filter(WhereClause::eq(map.storage_name(field), value))
            .delete()
            .await?;
        if self.options.debug_logs {
            tracing::debug!(table = context.table(), removed, "rows deleted");
        }
        Ok(())
    }

    fn user_row(&self, user: &UserSchema) -> ContextResult<Row> {
        let mut row = to_row(user)?;
        self.columns.user.to_storage_in_place(&mut row);
        Ok(row)
    }

    fn key_row(&self, key: &KeySchema) -> ContextResult<Row> {
        let mut row = to_row(key)?;
        self.columns.key.to_storage_in_place(&mut row);
        Ok(row)
    }

    // ─── User + key creation ─────────────────────────────────────

    /// Insert the user and key inside one transaction scope; commit only if
    /// both inserts succeed.
    async fn create_user_transactional(&self, user: Row, key: Option<Row>) -> AdapterResult<()> {
        let code = ErrorCode::AuthDuplicateKeyId;
        let connection = self.connection.as_ref().ok_or_else(|| {
            AdapterError::Config("transactional user creation requires a connection".into())
        })?;

        let tx = connection
            .begin_transaction()
            .await
            .map_err(translated(code, "set_user"))?;

        let outcome = self.insert_user_and_key(tx.as_ref(), user, key).await;
        match outcome {
            Ok(()) => tx.commit().await.map_err(translated(code, "set_user")),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("rollback after failed set_user also failed: {rollback_err}");
                }
                Err(translated(code, "set_user")(err))
            }
        }
    }

    async fn insert_user_and_key(
        &self,
        tx: &dyn Transaction,
        user: Row,
        key: Option<Row>,
    ) -> ContextResult<()> {
        let users = self.contexts.user.with_transaction(tx)?;
        users.insert(vec![user]).await?;
        if let Some(key) = key {
            let keys = self.contexts.key.with_transaction(tx)?;
            keys.insert(vec![key]).await?;
        }
        Ok(())
    }

    /// Legacy path: check the key id is free, then two independent inserts.
    /// A key insert failure leaves the user row in place.
    async fn create_user_sequential(
        &self,
        user: Row,
        key: Option<(String, Row)>,
    ) -> AdapterResult<()> {
        let code = ErrorCode::AuthDuplicateKeyId;
        if let Some((key_id, _)) = &key {
            let taken = self
                .contexts
                .key
                .filter(WhereClause::eq(self.columns.key.storage_name("id"), key_id.as_str()))
                .count()
                .await?;
            if taken > 0 {
                return Err(AuthError::new(code).into());
            }
        }

        self.contexts
            .user
            .insert(vec![user])
            .await
            .map_err(translated(code, "set_user"))?;

        if let Some((_, key)) = key {
            self.contexts
                .key
                .insert(vec![key])
                .await
                .map_err(translated(code, "set_user"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AuthAdapter for ContextAdapter {
    // ─── Sessions ────────────────────────────────────────────────

    async fn get_session(&self, session_id: &str) -> AdapterResult<Option<SessionSchema>> {
        self.log("GET_SESSION", self.contexts.session.as_ref());
        self.find_one(self.contexts.session.as_ref(), &self.columns.session, "id", session_id)
            .await
    }

    async fn get_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<SessionSchema>> {
        self.log("GET_SESSIONS_BY_USER_ID", self.contexts.session.as_ref());
        self.find_many(self.contexts.session.as_ref(), &self.columns.session, "user_id", user_id)
            .await
    }

    async fn set_session(&self, session: SessionSchema) -> AdapterResult<()> {
        self.log("SET_SESSION", self.contexts.session.as_ref());
        ensure_user_exists(
            self.contexts.user.as_ref(),
            self.columns.user.storage_name("id"),
            &session.user_id,
        )
        .await?;

        let mut row = to_row(&session)?;
        self.columns.session.to_storage_in_place(&mut row);
        self.contexts
            .session
            .insert(vec![row])
            .await
            .map_err(translated(ErrorCode::AuthInvalidSessionId, "set_session"))?;
        Ok(())
    }

    async fn update_session(&self, session_id: &str, partial: Row) -> AdapterResult<()> {
        self.log("UPDATE_SESSION", self.contexts.session.as_ref());
        self.update_by_id(
            self.contexts.session.as_ref(),
            &self.columns.session,
            session_id,
            partial,
            ErrorCode::AuthInvalidSessionId,
            "update_session",
        )
        .await
    }

    async fn delete_session(&self, session_id: &str) -> AdapterResult<()> {
        self.log("DELETE_SESSION", self.contexts.session.as_ref());
        self.delete_where(self.contexts.session.as_ref(), &self.columns.session, "id", session_id)
            .await
    }

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<()> {
        self.log("DELETE_SESSIONS_BY_USER_ID", self.contexts.session.as_ref());
        self.delete_where(self.contexts.session.as_ref(), &self.columns.session, "user_id", user_id)
            .await
    }

    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> AdapterResult<Option<UserSchema>> {
        self.log("GET_USER", self.contexts.user.as_ref());
        self.find_one(self.contexts.user.as_ref(), &self.columns.user, "id", user_id)
            .await
    }

    async fn set_user(&self, user: UserSchema, key: Option<KeySchema>) -> AdapterResult<()> {
        self.log("SET_USER", self.contexts.user.as_ref());
        let user_row = self.user_row(&user)?;
        let key_row = match &key {
            Some(k) => Some((k.id.clone(), self.key_row(k)?)),
            None => None,
        };

        match self.options.user_creation {
            UserCreationMode::Transactional => {
                self.create_user_transactional(user_row, key_row.map(|(_, row)| row))
                    .await
            }
            UserCreationMode::Sequential => self.create_user_sequential(user_row, key_row).await,
        }
    }

    async fn update_user(&self, user_id: &str, partial: Row) -> AdapterResult<()> {
        self.log("UPDATE_USER", self.contexts.user.as_ref());
        self.update_by_id(
            self.contexts.user.as_ref(),
            &self.columns.user,
            user_id,
            partial,
            ErrorCode::AuthInvalidUserId,
            "update_user",
        )
        .await
    }

    async fn delete_user(&self, user_id: &str) -> AdapterResult<()> {
        self.log("DELETE_USER", self.contexts.user.as_ref());
        self.delete_where(self.contexts.user.as_ref(), &self.columns.user, "id", user_id)
            .await
    }

    // ─── Keys ────────────────────────────────────────────────────

    async fn get_key(&self, key_id: &str) -> AdapterResult<Option<KeySchema>> {
        self.log("GET_KEY", self.contexts.key.as_ref());
        self.find_one(self.contexts.key.as_ref(), &self.columns.key, "id", key_id)
            .await
    }

    async fn get_keys_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<KeySchema>> {
        self.log("GET_KEYS_BY_USER_ID", self.contexts.key.as_ref());
        self.find_many(self.contexts.key.as_ref(), &self.columns.key, "user_id", user_id)
            .await
    }

    async fn set_key(&self, key: KeySchema) -> AdapterResult<()> {
        self.log("SET_KEY", self.contexts.key.as_ref());
        ensure_user_exists(
            self.contexts.user.as_ref(),
            self.columns.user.storage_name("id"),
            &key.user_id,
        )
        .await?;

        let row = self.key_row(&key)?;
        self.contexts
            .key
            .insert(vec![row])
            .await
            .map_err(translated(ErrorCode::AuthDuplicateKeyId, "set_key"))?;
        Ok(())
    }

    async fn update_key(&self, key_id: &str, partial: Row) -> AdapterResult<()> {
        self.log("UPDATE_KEY", self.contexts.key.as_ref());
        self.update_by_id(
            self.contexts.key.as_ref(),
            &self.columns.key,
            key_id,
            partial,
            ErrorCode::AuthInvalidKeyId,
            "update_key",
        )
        .await
    }

    async fn delete_key(&self, key_id: &str) -> AdapterResult<()> {
        self.log("DELETE_KEY", self.contexts.key.as_ref());
        self.delete_where(self.contexts.key.as_ref(), &self.columns.key, "id", key_id)
            .await
    }

    async fn delete_keys_by_user_id(&self, user_id: &str) -> AdapterResult<()> {
        self.log("DELETE_KEYS_BY_USER_ID", self.contexts.key.as_ref());
        self.delete_where(self.contexts.key.as_ref(), &self.columns.key, "user_id", user_id)
            .await
    }
}
