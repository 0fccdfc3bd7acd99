use std::collections::BTreeMap;
use std::fmt;

/// Raised when no outbox store can be resolved for an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Neither the aggregate's namespace nor `"default"` maps to a registered store.
    OutboxClassNotFound {
        namespace: Option<String>,
        store: Option<String>,
    },
    UnknownAdapter(String),
    InvalidConfiguration(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::OutboxClassNotFound { namespace, store } => {
                match store {
                    Some(store) => write!(f, "outbox store `{}` is not registered", store)?,
                    None => write!(
                        f,
                        "missing outbox store for namespace `{}`",
                        namespace.as_deref().unwrap_or("<root>")
                    )?,
                }
                write!(
                    f,
                    ". Register the store and map it in the configuration, \
                     e.g. Configuration::new().map(\"default\", \"Outbox\").map(\"meetings\", \"Meetings::Outbox\")"
                )
            }
            ConfigurationError::UnknownAdapter(name) => {
                write!(f, "unknown database adapter: {}", name)
            }
            ConfigurationError::InvalidConfiguration(msg) => {
                write!(f, "invalid outbox configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Error type for database operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    LockPoisoned(&'static str),
    DuplicateKey { table: String, key: String },
    NotFound { table: String, key: String },
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned(operation) => {
                write!(f, "database lock poisoned during {}", operation)
            }
            StoreError::DuplicateKey { table, key } => {
                write!(f, "duplicate key {} in {}", key, table)
            }
            StoreError::NotFound { table, key } => write!(f, "row not found: {}:{}", table, key),
            StoreError::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// A single attribute-level validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub attribute: String,
    pub message: String,
}

/// Ordered collection of validation errors keyed by attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    entries: Vec<FieldError>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.entries.push(FieldError {
            attribute: attribute.into(),
            message: message.into(),
        });
    }

    /// Copy every error of `other`, re-keyed as `"<prefix>.<attribute>"`.
    pub fn import(&mut self, other: &Errors, prefix: &str) {
        for error in &other.entries {
            self.add(format!("{}.{}", prefix, error.attribute), error.message.clone());
        }
    }

    pub fn merge(&mut self, other: Errors) {
        self.entries.extend(other.entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.entries.iter()
    }

    /// Messages for one attribute.
    pub fn get(&self, attribute: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|error| error.attribute == attribute)
            .map(|error| error.message.as_str())
            .collect()
    }

    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        let mut messages: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.entries {
            messages
                .entry(error.attribute.clone())
                .or_default()
                .push(error.message.clone());
        }
        messages
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|error| format!("{} {}", error.attribute, error.message))
            .collect()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

/// Error type for outboxed mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxError {
    Configuration(ConfigurationError),
    /// The aggregate or its outbox row failed validation.
    RecordInvalid(Errors),
    /// The mutation could not be recorded.
    RecordNotSaved(String),
    Store(StoreError),
    Serialization(String),
}

impl fmt::Display for OutboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboxError::Configuration(err) => write!(f, "{}", err),
            OutboxError::RecordInvalid(errors) => write!(f, "validation failed: {}", errors),
            OutboxError::RecordNotSaved(msg) => write!(f, "record not saved: {}", msg),
            OutboxError::Store(err) => write!(f, "{}", err),
            OutboxError::Serialization(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for OutboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutboxError::Configuration(err) => Some(err),
            OutboxError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for OutboxError {
    fn from(err: ConfigurationError) -> Self {
        OutboxError::Configuration(err)
    }
}

impl From<StoreError> for OutboxError {
    fn from(err: StoreError) -> Self {
        OutboxError::Store(err)
    }
}

impl From<serde_json::Error> for OutboxError {
    fn from(err: serde_json::Error) -> Self {
        OutboxError::Serialization(err.to_string())
    }
}
