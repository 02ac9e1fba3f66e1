// Direct storage access for tests: writes and reads canonical records
// through the same contexts and column maps an adapter uses, without going
// through the adapter itself.

use std::sync::Arc;

use authctx_core::db::columns::{ColumnMap, ColumnMaps};
use authctx_core::db::context::{DataContext, Row, WhereClause};
use authctx_core::db::models::{from_row, to_row, KeySchema, SessionSchema, UserSchema};
use authctx_core::error::ContextResult;

/// One entity's table plus the map between canonical and storage names.
#[derive(Debug, Clone)]
pub struct EntityTable {
    context: Arc<dyn DataContext>,
    map: ColumnMap,
}

impl EntityTable {
    pub fn new(context: Arc<dyn DataContext>, map: ColumnMap) -> Self {
        Self { context, map }
    }

    pub fn context(&self) -> &dyn DataContext {
        self.context.as_ref()
    }

    /// Insert a canonical row.
    pub async fn insert(&self, canonical: Row) -> ContextResult<()> {
        let mut row = canonical;
        self.map.to_storage_in_place(&mut row);
        self.context.insert(vec![row]).await?;
        Ok(())
    }

    /// Canonical row with the given `id`.
    pub async fn find(&self, id: &str) -> ContextResult<Option<Row>> {
        let row = self
            .context
            .filter(WhereClause::eq(self.map.storage_name("id"), id))
            .first()
            .await?;
        Ok(row.map(|r| self.map.to_canonical(r)))
    }

    /// Every row, canonical.
    pub async fn all(&self) -> ContextResult<Vec<Row>> {
        let rows = self.context.select(&[]).await?;
        Ok(rows.into_iter().map(|r| self.map.to_canonical(r)).collect())
    }

    pub async fn clear(&self) -> ContextResult<u64> {
        self.context.delete(&[]).await
    }
}

/// The three auth tables, addressed canonically.
#[derive(Debug, Clone)]
pub struct Database {
    pub user: EntityTable,
    pub session: EntityTable,
    pub key: EntityTable,
}

impl Database {
    pub fn new(
        user: Arc<dyn DataContext>,
        session: Arc<dyn DataContext>,
        key: Arc<dyn DataContext>,
        columns: ColumnMaps,
    ) -> Self {
        Self {
            user: EntityTable::new(user, columns.user),
            session: EntityTable::new(session, columns.session),
            key: EntityTable::new(key, columns.key),
        }
    }

    /// Remove every key, session, and user row, in that order.
    pub async fn clear(&self) -> ContextResult<()> {
        self.key.clear().await?;
        self.session.clear().await?;
        self.user.clear().await?;
        Ok(())
    }

    pub async fn insert_user(&self, user: &UserSchema) -> ContextResult<()> {
        self.user.insert(to_row(user)?).await
    }

    pub async fn insert_session(&self, session: &SessionSchema) -> ContextResult<()> {
        self.session.insert(to_row(session)?).await
    }

    pub async fn insert_key(&self, key: &KeySchema) -> ContextResult<()> {
        self.key.insert(to_row(key)?).await
    }

    pub async fn user(&self, id: &str) -> ContextResult<Option<UserSchema>> {
        self.user.find(id).await?.map(from_row).transpose()
    }

    pub async fn session(&self, id: &str) -> ContextResult<Option<SessionSchema>> {
        self.session.find(id).await?.map(from_row).transpose()
    }

    pub async fn key(&self, id: &str) -> ContextResult<Option<KeySchema>> {
        self.key.find(id).await?.map(from_row).transpose()
    }
}
