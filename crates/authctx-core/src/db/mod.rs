pub mod adapter;
pub mod columns;
pub mod context;
pub mod models;

pub use adapter::AuthAdapter;
pub use columns::{ColumnMap, ColumnMaps, Entity, NamingConvention};
pub use context::{Connection, DataContext, Query, Row, Transaction, WhereClause};
pub use models::{KeySchema, SessionSchema, UserSchema};
