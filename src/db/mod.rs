use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

mod memory;
mod sqlite;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Largest number of values a membership (`in`) filter may carry
pub const MAX_IN_VALUES: usize = 30;

/// Raw document payload as stored
pub type DocumentData = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} does not exist")]
    NotFound { collection: String, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document {collection}/{id} holds malformed data: {source}")]
    DataLoss {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Stable error code returned to API clients
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not-found",
            StoreError::InvalidArgument(_) => "invalid-argument",
            StoreError::DataLoss { .. } => "data-loss",
            StoreError::Database(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => "unavailable",
            StoreError::Database(_) => "internal",
        }
    }
}

/// A document read from a collection. `data` is `None` when nothing is stored under `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Option<DocumentData>,
}

impl DocumentSnapshot {
    pub fn found(id: impl Into<String>, data: DocumentData) -> Self {
        Self { id: id.into(), data: Some(data) }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        Self { id: id.into(), data: None }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field in values`
    In { field: String, values: Vec<Value> },
}

/// Collection query: at most one filter and one ascending order-by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::Eq { field: field.into(), value: value.into() });
        self
    }

    pub fn where_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter = Some(Filter::In { field: field.into(), values });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Rejects queries the store cannot serve
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(Filter::In { values, .. }) = &self.filter {
            if values.is_empty() {
                return Err(StoreError::InvalidArgument(
                    "'in' filters require a non-empty array".to_string(),
                ));
            }
            if values.len() > MAX_IN_VALUES {
                return Err(StoreError::InvalidArgument(format!(
                    "'in' filters support a maximum of {MAX_IN_VALUES} elements, got {}",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

/// Schema-flexible document storage grouped into named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a single document. Absence is reported through the snapshot, not as an error.
    async fn get(&self, collection: &str, id: &str) -> Result<DocumentSnapshot, StoreError>;

    /// Run a filtered and optionally ordered query. With an order-by field,
    /// documents lacking that field are excluded.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// Insert a new document and return the id the store assigned to it
    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError>;

    /// Overwrite the named top-level fields of an existing document
    async fn update(&self, collection: &str, id: &str, fields: DocumentData) -> Result<(), StoreError>;
}

static RESERVED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__.*__$").expect("reserved id pattern is valid"));

/// Document ids must be non-empty, at most 1500 bytes, contain no `/`,
/// and must not be `.`, `..` or of the form `__name__`.
pub fn validate_document_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= 1500
        && !id.contains('/')
        && id != "."
        && id != ".."
        && !RESERVED_ID.is_match(id);

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!("invalid document id: {id:?}")))
    }
}

pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Overwrites top-level keys of `target` with those in `fields`
pub(crate) fn apply_update(target: &mut DocumentData, fields: DocumentData) {
    for (key, value) in fields {
        target.insert(key, value);
    }
}
