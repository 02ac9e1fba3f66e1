#![doc = include_str!("../README.md")]

pub mod db;
pub mod env;
pub mod error;
pub mod options;

// Re-exports for convenience
pub use db::adapter::AuthAdapter;
pub use db::columns::{ColumnMap, ColumnMaps, Entity, NamingConvention};
pub use db::context::{Connection, DataContext, Query, Row, Transaction, WhereClause};
pub use db::models::{KeySchema, SessionSchema, UserSchema};
pub use error::{AdapterError, AdapterResult, AuthError, ContextError, ContextResult, ErrorCode, MappingError};
pub use options::{AdapterOptions, UserCreationMode};
