// Adapter options: behavior switches that are fixed at construction time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How `set_user` creates a user together with its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCreationMode {
    /// Both inserts run in one transaction scope; either both land or neither does.
    /// Requires a `Connection`.
    #[default]
    Transactional,
    /// Legacy mode: check the key id is free, then insert the user and the key
    /// as two independent calls. A failed key insert leaves the user behind.
    Sequential,
}

impl fmt::Display for UserCreationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transactional => write!(f, "transactional"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for UserCreationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transactional" | "transaction" => Ok(Self::Transactional),
            "sequential" | "legacy" => Ok(Self::Sequential),
            other => Err(format!("unknown user creation mode: {other}")),
        }
    }
}

/// Configuration for an adapter instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOptions {
    /// Log every forwarded operation at debug level.
    ///
    /// Default: false
    #[serde(default)]
    pub debug_logs: bool,

    /// Atomicity policy for creating a user with a key.
    ///
    /// Default: transactional
    #[serde(default)]
    pub user_creation: UserCreationMode,
}

impl AdapterOptions {
    /// Defaults overridden by `AUTHCTX_DEBUG_LOGS` and `AUTHCTX_USER_CREATION`.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(raw) = std::env::var("AUTHCTX_DEBUG_LOGS") {
            options.debug_logs = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        if let Ok(raw) = std::env::var("AUTHCTX_USER_CREATION") {
            match raw.parse() {
                Ok(mode) => options.user_creation = mode,
                Err(err) => tracing::warn!("ignoring AUTHCTX_USER_CREATION: {err}"),
            }
        }

        options
    }
}
