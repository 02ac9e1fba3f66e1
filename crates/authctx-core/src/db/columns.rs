// Column maps: canonical field names (what the auth library expects) to
// storage column names (what the backing table actually uses), per entity.
//
// Every map starts as identity over the entity's canonical fields; caller
// overrides are merged on top. Maps may also rename extra, non-canonical
// attributes (e.g. `username -> Username`). A map is validated once when it is
// built and is immutable afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::context::Row;
use crate::error::MappingError;

// ─── Entities ────────────────────────────────────────────────────

/// The three entities the adapter stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    User,
    Session,
    Key,
}

/// Canonical user fields.
pub const USER_FIELDS: &[&str] = &["id"];

/// Canonical session fields.
pub const SESSION_FIELDS: &[&str] = &["id", "user_id", "active_expires", "idle_expires"];

/// Canonical key fields.
pub const KEY_FIELDS: &[&str] = &["id", "user_id", "primary_key", "hashed_password", "expires"];

impl Entity {
    /// The canonical field set every map for this entity must cover.
    pub fn canonical_fields(&self) -> &'static [&'static str] {
        match self {
            Self::User => USER_FIELDS,
            Self::Session => SESSION_FIELDS,
            Self::Key => KEY_FIELDS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Session => "session",
            Self::Key => "key",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Naming conventions ──────────────────────────────────────────

/// Derives storage names from the canonical snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    /// Storage names equal canonical names.
    #[default]
    SnakeCase,
    /// `user_id -> userId`
    CamelCase,
    /// `user_id -> UserId`
    PascalCase,
}

impl NamingConvention {
    pub fn apply(&self, canonical: &str) -> String {
        match self {
            Self::SnakeCase => canonical.to_string(),
            Self::CamelCase => snake_to_camel(canonical),
            Self::PascalCase => snake_to_pascal(canonical),
        }
    }
}

/// Convert a snake_case string to camelCase.
pub fn snake_to_camel(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert a snake_case string to PascalCase.
pub fn snake_to_pascal(s: &str) -> String {
    let camel = snake_to_camel(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ─── Column map ──────────────────────────────────────────────────

/// Canonical-to-storage column map for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    entity: Entity,
    columns: BTreeMap<String, String>,
}

impl ColumnMap {
    /// The default map: every canonical field maps to itself.
    pub fn identity(entity: Entity) -> Self {
        let columns = entity
            .canonical_fields()
            .iter()
            .map(|f| (f.to_string(), f.to_string()))
            .collect();
        Self { entity, columns }
    }

    /// Merge caller overrides on top of the identity map.
    pub fn new<I, K, V>(entity: Entity, overrides: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::identity(entity);
        for (canonical, storage) in overrides {
            let canonical = canonical.into();
            let storage = storage.into();
            if canonical.trim().is_empty() {
                return Err(MappingError::InvalidMappingKey {
                    entity,
                    key: canonical,
                });
            }
            if storage.trim().is_empty() {
                return Err(MappingError::InvalidMappingKey {
                    entity,
                    key: canonical,
                });
            }
            map.columns.insert(canonical, storage);
        }
        map.validate()?;
        Ok(map)
    }

    /// Build a map from a JSON object of `canonical -> storage` names.
    ///
    /// Any value that is not a string is rejected with `InvalidMappingKey`,
    /// as is a non-object input (reported under the key `"<root>"`).
    pub fn from_json(entity: Entity, value: &serde_json::Value) -> Result<Self, MappingError> {
        let obj = value.as_object().ok_or_else(|| MappingError::InvalidMappingKey {
            entity,
            key: "<root>".to_string(),
        })?;

        let mut overrides = Vec::with_capacity(obj.len());
        for (canonical, storage) in obj {
            let storage = storage.as_str().ok_or_else(|| MappingError::InvalidMappingKey {
                entity,
                key: canonical.clone(),
            })?;
            overrides.push((canonical.clone(), storage.to_string()));
        }
        Self::new(entity, overrides)
    }

    /// Derive every canonical column from a naming convention.
    pub fn from_convention(entity: Entity, convention: NamingConvention) -> Self {
        let columns = entity
            .canonical_fields()
            .iter()
            .map(|f| (f.to_string(), convention.apply(f)))
            .collect();
        Self { entity, columns }
    }

    /// Add or replace a single mapping, returning the validated map.
    pub fn with(mut self, canonical: &str, storage: &str) -> Result<Self, MappingError> {
        if canonical.trim().is_empty() || storage.trim().is_empty() {
            return Err(MappingError::InvalidMappingKey {
                entity: self.entity,
                key: canonical.to_string(),
            });
        }
        self.columns.insert(canonical.to_string(), storage.to_string());
        self.validate()?;
        Ok(self)
    }

    /// Every storage name must be claimed by exactly one canonical name,
    /// otherwise the reverse remap is ambiguous.
    fn validate(&self) -> Result<(), MappingError> {
        let mut seen = BTreeMap::new();
        for (canonical, storage) in &self.columns {
            if seen.insert(storage.as_str(), canonical.as_str()).is_some() {
                return Err(MappingError::DuplicateStorageColumn {
                    entity: self.entity,
                    column: storage.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Storage column for a canonical field. Unmapped fields are identity.
    pub fn storage_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.columns
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    /// Canonical field for a storage column. Unmapped columns are identity.
    pub fn canonical_name<'a>(&'a self, storage: &'a str) -> &'a str {
        self.columns
            .iter()
            .find(|(_, s)| s.as_str() == storage)
            .map(|(c, _)| c.as_str())
            .unwrap_or(storage)
    }

    /// Iterate over `(canonical, storage)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(c, s)| (c.as_str(), s.as_str()))
    }

    pub fn is_identity(&self) -> bool {
        self.columns.iter().all(|(c, s)| c == s)
    }

    // ─── Remapping ───────────────────────────────────────────────

    /// Destructive canonical → storage remap, used before full inserts.
    ///
    /// Every mapped canonical key present in `row` is moved to its storage
    /// name. All moves are collected before any insertion, so swapped names
    /// (`a -> b`, `b -> a`) do not clobber each other.
    ///
    /// The mapped value wins a collision: if `row` also carries an unmapped
    /// key spelled like a target storage column (`Username` next to
    /// `username -> Username`), that key is replaced and a warning is logged.
    pub fn to_storage_in_place(&self, row: &mut Row) {
        let moved: Vec<(String, serde_json::Value)> = self
            .columns
            .iter()
            .filter(|(canonical, storage)| canonical != storage)
            .filter_map(|(canonical, storage)| {
                row.remove(canonical.as_str()).map(|v| (storage.clone(), v))
            })
            .collect();
        for (storage, value) in moved {
            if row.insert(storage.clone(), value).is_some() {
                tracing::warn!(
                    entity = %self.entity,
                    column = %storage,
                    "mapped field replaced an existing storage column"
                );
            }
        }
    }

    /// Non-destructive canonical → storage remap, used for partial updates.
    ///
    /// Clones `row`; only keys present in the input are remapped and every
    /// other attribute is carried over untouched.
    pub fn to_storage(&self, row: &Row) -> Row {
        let mut out = row.clone();
        self.to_storage_in_place(&mut out);
        out
    }

    /// Storage → canonical remap, used after reads. Unmapped storage columns
    /// pass through under their own names.
    pub fn to_canonical(&self, row: Row) -> Row {
        row.into_iter()
            .map(|(column, value)| (self.canonical_name(&column).to_string(), value))
            .collect()
    }
}

// ─── Map bundle ──────────────────────────────────────────────────

/// The three per-entity maps an adapter is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMaps {
    pub user: ColumnMap,
    pub session: ColumnMap,
    pub key: ColumnMap,
}

impl Default for ColumnMaps {
    fn default() -> Self {
        Self {
            user: ColumnMap::identity(Entity::User),
            session: ColumnMap::identity(Entity::Session),
            key: ColumnMap::identity(Entity::Key),
        }
    }
}

impl ColumnMaps {
    /// All three maps derived from one naming convention.
    pub fn from_convention(convention: NamingConvention) -> Self {
        Self {
            user: ColumnMap::from_convention(Entity::User, convention),
            session: ColumnMap::from_convention(Entity::Session, convention),
            key: ColumnMap::from_convention(Entity::Key, convention),
        }
    }

    /// Build from a JSON object with optional `user`, `session`, `key` members.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, MappingError> {
        let mut maps = Self::default();
        let empty = serde_json::Value::Object(serde_json::Map::new());
        let section = |name: &str| value.get(name).unwrap_or(&empty);
        maps.user = ColumnMap::from_json(Entity::User, section("user"))?;
        maps.session = ColumnMap::from_json(Entity::Session, section("session"))?;
        maps.key = ColumnMap::from_json(Entity::Key, section("key"))?;
        Ok(maps)
    }

    /// Check each map belongs to its slot and covers its canonical fields.
    pub fn validate(&self) -> Result<(), MappingError> {
        for (expected, map) in [
            (Entity::User, &self.user),
            (Entity::Session, &self.session),
            (Entity::Key, &self.key),
        ] {
            if map.entity != expected {
                return Err(MappingError::InvalidMappingKey {
                    entity: expected,
                    key: format!("<map for {}>", map.entity),
                });
            }
            for field in expected.canonical_fields() {
                if !map.columns.contains_key(*field) {
                    return Err(MappingError::InvalidMappingKey {
                        entity: expected,
                        key: field.to_string(),
                    });
                }
            }
            map.validate()?;
        }
        Ok(())
    }
}
