// Error vocabulary shared by the adapter, the storage contexts, and callers.
//
// `ErrorCode` is the fixed set of kinds the authentication library understands.
// `AuthError` pairs a code with the storage failure that caused it, so the
// external kind stays stable while the low-level detail remains reachable
// through `std::error::Error::source`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::columns::Entity;

/// Error codes surfaced to the authentication library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthInvalidUserId,
    AuthInvalidSessionId,
    AuthInvalidKeyId,
    AuthDuplicateKeyId,
}

impl ErrorCode {
    /// The wire name of the code (e.g. `AUTH_INVALID_USER_ID`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthInvalidUserId => "AUTH_INVALID_USER_ID",
            Self::AuthInvalidSessionId => "AUTH_INVALID_SESSION_ID",
            Self::AuthInvalidKeyId => "AUTH_INVALID_KEY_ID",
            Self::AuthDuplicateKeyId => "AUTH_DUPLICATE_KEY_ID",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::AuthInvalidUserId => "Invalid user id",
            Self::AuthInvalidSessionId => "Invalid session id",
            Self::AuthInvalidKeyId => "Invalid key id",
            Self::AuthDuplicateKeyId => "Duplicate key id",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.message())
    }
}

/// Failures reported by a storage context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("duplicate value {value} for unique column {table}.{column}")]
    Duplicate {
        table: String,
        column: String,
        value: serde_json::Value,
    },

    #[error("{table}.{column} references missing value {value}")]
    ForeignKey {
        table: String,
        column: String,
        value: serde_json::Value,
    },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid row for table {table}: {reason}")]
    InvalidRow { table: String, reason: String },

    #[error("transaction is no longer open")]
    TransactionClosed,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Typed authentication error: a fixed code plus the storage failure behind it.
#[derive(Debug, thiserror::Error)]
#[error("{code}")]
pub struct AuthError {
    pub code: ErrorCode,
    #[source]
    source: Option<ContextError>,
}

impl AuthError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, source: None }
    }

    /// Wrap a storage failure under a fixed code.
    pub fn with_source(code: ErrorCode, source: ContextError) -> Self {
        Self {
            code,
            source: Some(source),
        }
    }

    /// The storage failure that triggered this error, if any.
    pub fn cause(&self) -> Option<&ContextError> {
        self.source.as_ref()
    }

    pub fn invalid_user_id() -> Self {
        Self::new(ErrorCode::AuthInvalidUserId)
    }

    pub fn invalid_session_id() -> Self {
        Self::new(ErrorCode::AuthInvalidSessionId)
    }

    pub fn invalid_key_id() -> Self {
        Self::new(ErrorCode::AuthInvalidKeyId)
    }

    pub fn duplicate_key_id() -> Self {
        Self::new(ErrorCode::AuthDuplicateKeyId)
    }

    /// JSON body in the shape the authentication library reports errors.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.code.message(),
        })
    }
}

/// Column-map construction failures. Raised while building an adapter, never per call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("invalid column mapping key {key:?} for {entity}: names must be non-empty strings")]
    InvalidMappingKey { entity: Entity, key: String },

    #[error("storage column {column:?} of {entity} is mapped more than once")]
    DuplicateStorageColumn { entity: Entity, column: String },
}

/// Umbrella error returned by every adapter operation.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("storage error: {0}")]
    Context(#[from] ContextError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// The authentication error code, when this is a translated auth error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Auth(err) => Some(err.code),
            _ => None,
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Result type for storage context operations.
pub type ContextResult<T> = std::result::Result<T, ContextError>;
