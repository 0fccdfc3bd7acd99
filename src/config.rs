//! Outbox mapping configuration and database adapter capabilities.
//!
//! ## Example
//!
//! ```
//! use transactional_outbox::{Adapter, Configuration};
//!
//! let config = Configuration::new()
//!     .with_adapter(Adapter::Postgresql)
//!     .map("default", "Outbox")
//!     .map("Billing", "Billing::Outbox");
//!
//! assert_eq!(config.outbox_for("billing"), Some("Billing::Outbox"));
//! assert_eq!(config.outbox_for("default"), Some("Outbox"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigurationError;
use crate::inflector::underscore;

/// Mapping key consulted when an aggregate's namespace has no entry of its own.
pub const DEFAULT_KEY: &str = "default";

/// Database adapter the outbox tables live on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Adapter {
    #[default]
    Sqlite,
    Postgresql,
    Mysql,
}

/// Column types the outbox schema can be declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Uuid,
    Integer,
    Json,
    Jsonb,
    Timestamp,
}

impl ColumnType {
    /// True when the column stores structured JSON natively.
    pub fn is_native_json(self) -> bool {
        matches!(self, ColumnType::Json | ColumnType::Jsonb)
    }
}

impl Adapter {
    /// Column type used for UUID values.
    pub fn uuid_type(self) -> ColumnType {
        match self {
            Adapter::Postgresql => ColumnType::Uuid,
            Adapter::Sqlite | Adapter::Mysql => ColumnType::String,
        }
    }

    /// Column type used for the outbox payload.
    pub fn json_type(self) -> ColumnType {
        match self {
            Adapter::Postgresql => ColumnType::Jsonb,
            Adapter::Mysql => ColumnType::Json,
            Adapter::Sqlite => ColumnType::String,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Adapter::Sqlite => "sqlite",
            Adapter::Postgresql => "postgresql",
            Adapter::Mysql => "mysql",
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Adapter {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Adapter::Sqlite),
            "postgresql" | "postgres" | "postgis" => Ok(Adapter::Postgresql),
            "mysql" | "mysql2" | "trilogy" => Ok(Adapter::Mysql),
            _ => Err(ConfigurationError::UnknownAdapter(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Adapter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Key type of the aggregate table, which decides the type of the
/// `aggregate_identifier` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Uuid,
    String,
}

/// One column of the outbox table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
    pub unique: bool,
    pub indexed: bool,
}

impl Column {
    fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: true,
            unique: false,
            indexed: false,
        }
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self.indexed = true;
        self
    }

    fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Column layout of an outbox table for a given adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboxSchema {
    pub adapter: Adapter,
    pub columns: Vec<Column>,
}

impl OutboxSchema {
    pub fn for_adapter(adapter: Adapter, aggregate_key: KeyKind) -> Self {
        let aggregate_identifier = match aggregate_key {
            KeyKind::Integer => ColumnType::Integer,
            KeyKind::Uuid => adapter.uuid_type(),
            KeyKind::String => ColumnType::String,
        };

        Self {
            adapter,
            columns: vec![
                Column::new("identifier", adapter.uuid_type()).unique(),
                Column::new("event", ColumnType::String),
                Column::new("payload", adapter.json_type()),
                Column::new("aggregate", ColumnType::String),
                Column::new("aggregate_identifier", aggregate_identifier).indexed(),
                Column::new("created_at", ColumnType::Timestamp),
                Column::new("updated_at", ColumnType::Timestamp),
            ],
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// True when payloads are handed to the store as structured JSON.
    pub fn native_payload(&self) -> bool {
        self.column("payload")
            .is_some_and(|column| column.column_type.is_native_json())
    }
}

/// Namespace to outbox store mapping plus the adapter setting.
///
/// `adapter` decides the outbox column types, and with them whether payloads
/// are written as structured JSON or as JSON text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub adapter: Adapter,
    #[serde(deserialize_with = "deserialize_mapping")]
    outbox_mapping: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON, e.g.
    /// `{"adapter": "postgresql", "outbox_mapping": {"default": "Outbox"}}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigurationError::InvalidConfiguration(e.to_string()))
    }

    pub fn with_adapter(mut self, adapter: Adapter) -> Self {
        self.adapter = adapter;
        self
    }

    /// Map a namespace (or [`DEFAULT_KEY`]) to an outbox store name.
    pub fn map(mut self, namespace: impl AsRef<str>, store: impl Into<String>) -> Self {
        self.insert(namespace, store);
        self
    }

    pub fn insert(&mut self, namespace: impl AsRef<str>, store: impl Into<String>) {
        self.outbox_mapping
            .insert(normalize_key(namespace.as_ref()), store.into());
    }

    pub fn remove(&mut self, namespace: &str) -> Option<String> {
        self.outbox_mapping.remove(&normalize_key(namespace))
    }

    /// Store name mapped to `namespace`. Blank entries count as missing.
    pub fn outbox_for(&self, namespace: &str) -> Option<&str> {
        self.outbox_mapping
            .get(&normalize_key(namespace))
            .map(|store| store.trim())
            .filter(|store| !store.is_empty())
    }

    /// Outbox table layout for the configured adapter.
    pub fn outbox_schema(&self, aggregate_key: KeyKind) -> OutboxSchema {
        OutboxSchema::for_adapter(self.adapter, aggregate_key)
    }

    pub fn outbox_mapping(&self) -> &BTreeMap<String, String> {
        &self.outbox_mapping
    }
}

fn normalize_key(key: &str) -> String {
    underscore(key.trim())
}

fn deserialize_mapping<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let raw = BTreeMap::<String, Option<String>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (normalize_key(&key), value.unwrap_or_default()))
        .collect())
}

fn global() -> &'static RwLock<Configuration> {
    static CONFIGURATION: OnceLock<RwLock<Configuration>> = OnceLock::new();
    CONFIGURATION.get_or_init(|| RwLock::new(Configuration::default()))
}

/// Mutate the process-wide configuration.
///
/// `f` edits a copy that replaces the stored configuration once `f` returns,
/// so a panicking `f` leaves the previous configuration in place.
pub fn configure<F: FnOnce(&mut Configuration)>(f: F) {
    let mut config = global().write().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut next = config.clone();
    f(&mut next);
    *config = next;
}

/// Snapshot of the process-wide configuration.
pub fn configuration() -> Configuration {
    global()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Restore the process-wide configuration to its defaults.
pub fn reset() {
    configure(|config| *config = Configuration::default());
}
