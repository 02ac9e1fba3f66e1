// In-memory storage contexts: HashMap-backed tables implementing the core
// `DataContext`, `Connection`, and `Transaction` traits.
//
// All tables of one `MemoryConnection` live in a single store behind
// `tokio::sync::RwLock`, so a transaction can snapshot every table at once.
// Declared constraints (unique primary key, foreign keys) are enforced on
// insert and update; a batch insert is all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use authctx_core::db::context::{matches_all, Connection, DataContext, Row, Transaction, WhereClause};
use authctx_core::error::{ContextError, ContextResult};

// ─── Table definitions ───────────────────────────────────────────

/// A column that must reference an existing value in another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub target_column: String,
}

/// Declares a table and its constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    /// Column whose values must be unique.
    pub primary_key: Option<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// `column` must hold a value present in `table.target_column`. Null is allowed.
    pub fn references(
        mut self,
        column: impl Into<String>,
        table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            table: table.into(),
            target_column: target_column.into(),
        });
        self
    }
}

// ─── Store ───────────────────────────────────────────────────────

/// Table name → rows.
pub type Tables = HashMap<String, Vec<Row>>;

#[derive(Debug, Clone, Default)]
struct Store {
    definitions: HashMap<String, TableDefinition>,
    tables: Tables,
}

impl Store {
    fn rows(&self, table: &str) -> ContextResult<&Vec<Row>> {
        self.tables
            .get(table)
            .ok_or_else(|| ContextError::UnknownTable(table.to_string()))
    }

    fn definition(&self, table: &str) -> ContextResult<&TableDefinition> {
        self.definitions
            .get(table)
            .ok_or_else(|| ContextError::UnknownTable(table.to_string()))
    }

    /// Check `row` against the foreign keys of `definition`.
    fn check_references(&self, definition: &TableDefinition, row: &Row) -> ContextResult<()> {
        for fk in &definition.foreign_keys {
            let value = match row.get(&fk.column) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let target = self.rows(&fk.table)?;
            if !target.iter().any(|r| r.get(&fk.target_column) == Some(value)) {
                return Err(ContextError::ForeignKey {
                    table: definition.name.clone(),
                    column: fk.column.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fail if any row of another table still points at `value` in
    /// `table.column`. Used before a referenced value is rewritten.
    fn check_not_referenced(&self, table: &str, column: &str, value: &serde_json::Value) -> ContextResult<()> {
        for definition in self.definitions.values() {
            for fk in definition
                .foreign_keys
                .iter()
                .filter(|fk| fk.table == table && fk.target_column == column)
            {
                let referencing = self.rows(&definition.name)?;
                if referencing.iter().any(|r| r.get(&fk.column) == Some(value)) {
                    return Err(ContextError::ForeignKey {
                        table: definition.name.clone(),
                        column: fk.column.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, rows: Vec<Row>) -> ContextResult<Vec<Row>> {
        let definition = self.definition(table)?.clone();
        let existing = self.rows(table)?;

        if let Some(pk) = &definition.primary_key {
            let mut seen: Vec<&serde_json::Value> = existing.iter().filter_map(|r| r.get(pk)).collect();
            for row in &rows {
                let value = row.get(pk).filter(|v| !v.is_null()).ok_or_else(|| {
                    ContextError::InvalidRow {
                        table: table.to_string(),
                        reason: format!("missing primary key column {pk}"),
                    }
                })?;
                if seen.contains(&value) {
                    return Err(ContextError::Duplicate {
                        table: table.to_string(),
                        column: pk.clone(),
                        value: value.clone(),
                    });
                }
                seen.push(value);
            }
        }

        for row in &rows {
            self.check_references(&definition, row)?;
        }

        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    fn update(&mut self, table: &str, where_clauses: &[WhereClause], changes: &Row) -> ContextResult<u64> {
        let definition = self.definition(table)?.clone();
        let rows = self.rows(table)?;

        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| matches_all(r, where_clauses))
            .map(|(i, _)| i)
            .collect();

        if let Some(pk) = &definition.primary_key {
            if let Some(new_value) = changes.get(pk) {
                if new_value.is_null() {
                    return Err(ContextError::InvalidRow {
                        table: table.to_string(),
                        reason: format!("primary key column {pk} cannot be null"),
                    });
                }
                let collides_with_other = rows
                    .iter()
                    .enumerate()
                    .any(|(i, r)| !targets.contains(&i) && r.get(pk) == Some(new_value));
                if targets.len() > 1 || (!targets.is_empty() && collides_with_other) {
                    return Err(ContextError::Duplicate {
                        table: table.to_string(),
                        column: pk.clone(),
                        value: new_value.clone(),
                    });
                }
            }
        }

        if !targets.is_empty() {
            self.check_references(&definition, changes)?;
        }

        // Rewriting a value other rows point at would orphan them.
        for (column, new_value) in changes {
            for &i in &targets {
                if let Some(old) = rows[i].get(column).filter(|old| *old != new_value && !old.is_null()) {
                    self.check_not_referenced(table, column, old)?;
                }
            }
        }

        let rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| ContextError::UnknownTable(table.to_string()))?;
        for &i in &targets {
            for (k, v) in changes {
                rows[i].insert(k.clone(), v.clone());
            }
        }
        Ok(targets.len() as u64)
    }

    fn delete(&mut self, table: &str, where_clauses: &[WhereClause]) -> ContextResult<u64> {
        let rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| ContextError::UnknownTable(table.to_string()))?;
        let before = rows.len();
        rows.retain(|r| !matches_all(r, where_clauses));
        Ok((before - rows.len()) as u64)
    }
}

// ─── Connection ──────────────────────────────────────────────────

/// A set of in-memory tables shared by the contexts created from it.
///
/// Cloning is cheap and shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    store: Arc<RwLock<Store>>,
}

impl MemoryConnection {
    /// Create a connection with the given (empty) tables.
    pub fn new(definitions: impl IntoIterator<Item = TableDefinition>) -> Self {
        let mut store = Store::default();
        for definition in definitions {
            store.tables.insert(definition.name.clone(), Vec::new());
            store.definitions.insert(definition.name.clone(), definition);
        }
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// A context over one of this connection's tables.
    pub fn context(&self, table: impl Into<String>) -> MemoryContext {
        MemoryContext {
            store: self.store.clone(),
            table: table.into(),
        }
    }

    /// Copy of every table's rows (for debugging/testing).
    pub async fn snapshot(&self) -> Tables {
        self.store.read().await.tables.clone()
    }

    /// Remove every row of every table, keeping the definitions.
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        for rows in store.tables.values_mut() {
            rows.clear();
        }
    }

    /// Remove every row of one table.
    pub async fn truncate(&self, table: &str) -> ContextResult<()> {
        let mut store = self.store.write().await;
        store
            .tables
            .get_mut(table)
            .ok_or_else(|| ContextError::UnknownTable(table.to_string()))?
            .clear();
        Ok(())
    }

    /// Number of rows in a table; zero for unknown tables.
    pub async fn row_count(&self, table: &str) -> usize {
        self.store
            .read()
            .await
            .tables
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn begin_transaction(&self) -> ContextResult<Box<dyn Transaction>> {
        let parent = self.store.clone().write_owned().await;
        let snapshot = parent.clone();
        Ok(Box::new(MemoryTransaction {
            parent,
            snapshot: Arc::new(RwLock::new(snapshot)),
        }))
    }
}

// ─── Context ─────────────────────────────────────────────────────

/// One table of a `MemoryConnection`, or of an open `MemoryTransaction`.
#[derive(Debug, Clone)]
pub struct MemoryContext {
    store: Arc<RwLock<Store>>,
    table: String,
}

#[async_trait]
impl DataContext for MemoryContext {
    fn table(&self) -> &str {
        &self.table
    }

    async fn select(&self, where_clauses: &[WhereClause]) -> ContextResult<Vec<Row>> {
        let store = self.store.read().await;
        Ok(store
            .rows(&self.table)?
            .iter()
            .filter(|r| matches_all(r, where_clauses))
            .cloned()
            .collect())
    }

    async fn insert(&self, rows: Vec<Row>) -> ContextResult<Vec<Row>> {
        let mut store = self.store.write().await;
        store.insert(&self.table, rows).inspect_err(|err| {
            tracing::debug!(table = %self.table, "memory insert rejected: {err}");
        })
    }

    async fn update(&self, where_clauses: &[WhereClause], changes: Row) -> ContextResult<u64> {
        let mut store = self.store.write().await;
        store.update(&self.table, where_clauses, &changes).inspect_err(|err| {
            tracing::debug!(table = %self.table, "memory update rejected: {err}");
        })
    }

    async fn delete(&self, where_clauses: &[WhereClause]) -> ContextResult<u64> {
        let mut store = self.store.write().await;
        store.delete(&self.table, where_clauses)
    }

    async fn count(&self, where_clauses: &[WhereClause]) -> ContextResult<u64> {
        let store = self.store.read().await;
        Ok(store
            .rows(&self.table)?
            .iter()
            .filter(|r| matches_all(r, where_clauses))
            .count() as u64)
    }
}

// ─── Transaction ─────────────────────────────────────────────────

/// In-memory transaction.
///
/// Holds the connection's write lock from begin until commit, rollback, or
/// drop, so transactions and plain writers are serialized and a commit never
/// overwrites a write it did not see. Scoped contexts operate on a snapshot
/// taken at begin; commit publishes it through the held lock.
///
/// Plain contexts of the same connection block while a transaction is open.
/// Use only scoped contexts inside the transaction's task.
#[derive(Debug)]
pub struct MemoryTransaction {
    parent: OwnedRwLockWriteGuard<Store>,
    snapshot: Arc<RwLock<Store>>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn scoped(&self, table: &str) -> ContextResult<Box<dyn DataContext>> {
        Ok(Box::new(MemoryContext {
            store: self.snapshot.clone(),
            table: table.to_string(),
        }))
    }

    async fn commit(self: Box<Self>) -> ContextResult<()> {
        let MemoryTransaction { mut parent, snapshot } = *self;
        *parent = snapshot.read().await.clone();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ContextResult<()> {
        Ok(())
    }
}
