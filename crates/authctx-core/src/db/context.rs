// Storage context contract: the narrow interface the adapter consumes.
//
// A `DataContext` is bound to one table and exposes equality filtering,
// select, insert, update, delete, and count. Rows are JSON objects keyed by
// storage column names. Atomic multi-table work goes through a `Connection`,
// which opens a `Transaction`; contexts bound to the transaction see its
// uncommitted writes until it is committed or rolled back.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ContextResult;

/// A storage row: column name → value.
pub type Row = serde_json::Map<String, serde_json::Value>;

// ─── Where Clause ────────────────────────────────────────────────

/// Equality condition on a single storage column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub column: String,
    pub value: serde_json::Value,
}

impl WhereClause {
    pub fn eq(column: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether `row` satisfies this clause. A missing column only matches null.
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(&self.column) {
            Some(v) => v == &self.value,
            None => self.value.is_null(),
        }
    }
}

/// Whether `row` satisfies every clause. No clauses match every row.
pub fn matches_all(row: &Row, clauses: &[WhereClause]) -> bool {
    clauses.iter().all(|c| c.matches(row))
}

// ─── Context Trait ───────────────────────────────────────────────

/// One table's worth of storage.
///
/// Implementations must reject inserts and updates that violate their
/// constraints (duplicate keys, dangling references) with an error rather
/// than silently succeeding.
#[async_trait]
pub trait DataContext: Send + Sync + fmt::Debug {
    /// The table this context reads and writes.
    fn table(&self) -> &str;

    /// Rows matching every clause.
    async fn select(&self, where_clauses: &[WhereClause]) -> ContextResult<Vec<Row>>;

    /// Insert rows, returning them as stored.
    async fn insert(&self, rows: Vec<Row>) -> ContextResult<Vec<Row>>;

    /// Merge `changes` into every matching row. Returns the number of rows affected.
    async fn update(&self, where_clauses: &[WhereClause], changes: Row) -> ContextResult<u64>;

    /// Delete every matching row. Returns the number of rows removed.
    async fn delete(&self, where_clauses: &[WhereClause]) -> ContextResult<u64>;

    /// Number of matching rows.
    async fn count(&self, where_clauses: &[WhereClause]) -> ContextResult<u64>;

    /// This context bound to an open transaction scope.
    fn with_transaction(&self, transaction: &dyn Transaction) -> ContextResult<Box<dyn DataContext>> {
        transaction.scoped(self.table())
    }
}

impl dyn DataContext + '_ {
    /// Start a filtered query against this context.
    pub fn filter(&self, clause: WhereClause) -> Query<'_> {
        Query {
            context: self,
            where_clauses: vec![clause],
        }
    }
}

// ─── Query Builder ───────────────────────────────────────────────

/// A filtered view over a context. Further clauses are ANDed.
#[derive(Debug)]
pub struct Query<'a> {
    context: &'a dyn DataContext,
    where_clauses: Vec<WhereClause>,
}

impl<'a> Query<'a> {
    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.where_clauses.push(clause);
        self
    }

    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.where_clauses
    }

    pub async fn select(self) -> ContextResult<Vec<Row>> {
        self.context.select(&self.where_clauses).await
    }

    /// First matching row, if any.
    pub async fn first(self) -> ContextResult<Option<Row>> {
        Ok(self.context.select(&self.where_clauses).await?.into_iter().next())
    }

    pub async fn update(self, changes: Row) -> ContextResult<u64> {
        self.context.update(&self.where_clauses, changes).await
    }

    pub async fn delete(self) -> ContextResult<u64> {
        self.context.delete(&self.where_clauses).await
    }

    pub async fn count(self) -> ContextResult<u64> {
        self.context.count(&self.where_clauses).await
    }
}

// ─── Transactions ────────────────────────────────────────────────

/// A shared connection that can open transaction scopes spanning several tables.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    async fn begin_transaction(&self) -> ContextResult<Box<dyn Transaction>>;
}

/// An open transaction scope.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait Transaction: Send + Sync + fmt::Debug {
    /// A context for `table` whose reads and writes happen inside this scope.
    fn scoped(&self, table: &str) -> ContextResult<Box<dyn DataContext>>;

    /// Publish every write made in this scope.
    async fn commit(self: Box<Self>) -> ContextResult<()>;

    /// Discard every write made in this scope.
    async fn rollback(self: Box<Self>) -> ContextResult<()>;
}
