// Canonical models: the shapes the authentication library reads and writes,
// independent of how the backing tables name their columns.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::db::context::Row;
use crate::error::{ContextError, ContextResult};

/// A user. Only `id` is known; everything else is an opaque attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSchema {
    pub id: String,
    /// Additional user attributes, flattened into the stored row.
    #[serde(flatten)]
    pub attributes: Row,
}

impl UserSchema {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Row::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A session belonging to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSchema {
    pub id: String,
    pub user_id: String,
    /// Epoch milliseconds at which the active period ends.
    pub active_expires: i64,
    /// Epoch milliseconds at which the idle period ends.
    pub idle_expires: i64,
    #[serde(flatten)]
    pub attributes: Row,
}

impl SessionSchema {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        active_expires: i64,
        idle_expires: i64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            active_expires,
            idle_expires,
            attributes: Row::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A credential/provider key belonging to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySchema {
    pub id: String,
    pub user_id: String,
    /// Marks the user's primary credential.
    #[serde(default, deserialize_with = "bool_like")]
    pub primary_key: bool,
    #[serde(default)]
    pub hashed_password: Option<String>,
    /// Epoch milliseconds at which the key expires.
    #[serde(default)]
    pub expires: Option<i64>,
}

impl KeySchema {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            primary_key: false,
            hashed_password: None,
            expires: None,
        }
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary_key = primary;
        self
    }

    pub fn hashed_password(mut self, hash: impl Into<String>) -> Self {
        self.hashed_password = Some(hash.into());
        self
    }

    pub fn expires(mut self, expires: i64) -> Self {
        self.expires = Some(expires);
        self
    }
}

/// Storage engines often keep booleans as 0/1 integers; accept either, and null as false.
fn bool_like<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        serde_json::Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean-like value, found {other}"
        ))),
    }
}

/// Serialize a canonical model into a canonical-keyed row.
pub fn to_row<T: Serialize>(model: &T) -> ContextResult<Row> {
    match serde_json::to_value(model)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ContextError::Other(format!(
            "expected a JSON object, found {other}"
        ))),
    }
}

/// Deserialize a canonical-keyed row into a model.
pub fn from_row<T: DeserializeOwned>(row: Row) -> ContextResult<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}
