// authctx: auth storage adapter over injected data contexts.
//
// `AdapterFactory` takes one context per entity (user, session, key), the
// column maps that rename canonical fields to storage columns, and the adapter
// options, and builds a `ContextAdapter` implementing `AuthAdapter`.

pub mod adapter;
pub mod factory;
pub mod user_check;

pub use adapter::ContextAdapter;
pub use factory::{AdapterFactory, AuthContexts};
pub use user_check::ensure_user_exists;

pub use authctx_core::{
    AdapterError, AdapterOptions, AdapterResult, AuthAdapter, AuthError, ColumnMap, ColumnMaps,
    Connection, DataContext, Entity, ErrorCode, KeySchema, NamingConvention, Row, SessionSchema,
    Transaction, UserCreationMode, UserSchema, WhereClause,
};
