//! Champion record service: reads, creation and partial updates over the
//! `champions` collection of a [`DocumentStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};

use crate::db::{validate_document_id, DocumentSnapshot, DocumentStore, Query, StoreError, MAX_IN_VALUES};
use crate::models::Champion;

pub const COLLECTION: &str = "champions";

#[derive(Debug, thiserror::Error)]
pub enum ChampionError {
    #[error("A champion uid is required")]
    MissingUid,

    #[error("Put body must not be empty")]
    EmptyBody,

    #[error("Invalid champion: {0}")]
    InvalidBody(String),

    #[error("Invalid champion uid: {0}")]
    InvalidUid(String),

    #[error("No champion found with the uid: {0}")]
    NotFound(String),

    #[error("At most {limit} names can be looked up at once, got {count}")]
    TooManyNames { count: usize, limit: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChampionError {
    pub fn code(&self) -> &'static str {
        match self {
            ChampionError::MissingUid
            | ChampionError::EmptyBody
            | ChampionError::InvalidBody(_)
            | ChampionError::InvalidUid(_)
            | ChampionError::TooManyNames { .. } => "invalid-argument",
            ChampionError::NotFound(_) => "not-found",
            ChampionError::Store(err) => err.code(),
        }
    }

    /// Client-facing error payload: `{field: message}` for validation
    /// failures, the bare error code for store failures.
    pub fn payload(&self) -> Value {
        match self {
            ChampionError::MissingUid | ChampionError::InvalidUid(_) | ChampionError::NotFound(_) => {
                json!({ "uid": self.to_string() })
            }
            ChampionError::EmptyBody | ChampionError::InvalidBody(_) => json!({ "body": self.to_string() }),
            ChampionError::TooManyNames { .. } => json!({ "names": self.to_string() }),
            ChampionError::Store(err) => json!(err.code()),
        }
    }
}

/// Outcome of one entry of a batch update
#[derive(Debug)]
pub enum BatchStatus {
    Updated,
    Failed(ChampionError),
}

impl Serialize for BatchStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BatchStatus::Updated => serializer.serialize_str("updated"),
            BatchStatus::Failed(err) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &err.payload())?;
                map.end()
            }
        }
    }
}

/// Parse a raw update body. Anything but a JSON object counts as an empty body.
pub fn parse_update(body: Value) -> Result<Champion, ChampionError> {
    match body {
        Value::Object(_) => serde_json::from_value(body).map_err(|e| ChampionError::InvalidBody(e.to_string())),
        _ => Err(ChampionError::EmptyBody),
    }
}

#[derive(Clone)]
pub struct ChampionService {
    store: Arc<dyn DocumentStore>,
}

impl ChampionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get_champion(&self, uid: &str) -> Result<Option<Champion>, ChampionError> {
        let snapshot = self.store.get(COLLECTION, uid).await?;
        Ok(Champion::from_snapshot(&snapshot, COLLECTION)?)
    }

    /// All champions with an `order`, sorted by it
    pub async fn get_champions(&self) -> Result<Vec<Champion>, ChampionError> {
        self.run_query(Query::new().order_by("order")).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Vec<Champion>, ChampionError> {
        self.run_query(Query::new().where_eq("name", name)).await
    }

    pub async fn find_by_name_in(&self, names: &[String]) -> Result<Vec<Champion>, ChampionError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        if names.len() > MAX_IN_VALUES {
            return Err(ChampionError::TooManyNames { count: names.len(), limit: MAX_IN_VALUES });
        }

        let values = names.iter().cloned().map(Value::String).collect();
        self.run_query(Query::new().where_in("name", values)).await
    }

    /// Insert a new champion. Any `uid` in the input is discarded in favour of the assigned id.
    pub async fn create_champion(&self, input: Champion) -> Result<Champion, ChampionError> {
        let champion = Champion { uid: None, ..input }.cleaned();
        let uid = self.store.add(COLLECTION, champion.clone().into_document()).await?;

        tracing::info!(champion_id = %uid, "Created champion");
        Ok(Champion { uid: Some(uid), ..champion })
    }

    /// Apply a partial update to an existing champion. `attributes` are
    /// merged into the stored map rather than replacing it.
    pub async fn update_champion(&self, update: Champion) -> Result<Champion, ChampionError> {
        let uid = update
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or(ChampionError::MissingUid)?;
        validate_document_id(&uid).map_err(|_| ChampionError::InvalidUid(uid.clone()))?;

        let snapshot = self.store.get(COLLECTION, &uid).await?;
        if !snapshot.exists() {
            return Err(ChampionError::NotFound(uid));
        }
        let existing = snapshot.data.unwrap_or_default();

        let mut changes = Champion { uid: None, ..update };
        if let Some(attributes) = changes.attributes.take() {
            let mut merged = match existing.get("attributes") {
                Some(Value::Object(current)) => current.clone(),
                _ => Map::new(),
            };
            merged.extend(attributes);
            changes.attributes = Some(merged);
        }

        let cleaned = changes.cleaned();
        tracing::debug!(champion_id = %uid, changes = ?cleaned, "Updating champion");
        self.store.update(COLLECTION, &uid, cleaned.clone().into_document()).await?;

        Ok(Champion { uid: Some(uid), ..cleaned })
    }

    /// Run independent updates concurrently. Results are keyed by the entry's
    /// uid, or `Entry:<index>` when the entry has none. When a uid is listed
    /// more than once, the outcome of the last listed entry is reported.
    pub async fn update_champions(&self, entries: Vec<Value>) -> BTreeMap<String, BatchStatus> {
        let updates = entries.into_iter().enumerate().map(|(index, entry)| async move {
            let key = entry
                .get("uid")
                .and_then(Value::as_str)
                .filter(|uid| !uid.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Entry:{index}"));

            let result = match parse_update(entry) {
                Ok(update) => self.update_champion(update).await,
                Err(err) => Err(err),
            };

            let status = match result {
                Ok(_) => BatchStatus::Updated,
                Err(err) => {
                    if let ChampionError::Store(source) = &err {
                        tracing::error!(entry = %key, error = ?source, "Batch champion update failed");
                    }
                    BatchStatus::Failed(err)
                }
            };
            (key, status)
        });

        join_all(updates).await.into_iter().collect()
    }

    async fn run_query(&self, query: Query) -> Result<Vec<Champion>, ChampionError> {
        let snapshots = self.store.query(COLLECTION, &query).await?;
        champions_from(&snapshots)
    }
}

fn champions_from(snapshots: &[DocumentSnapshot]) -> Result<Vec<Champion>, ChampionError> {
    let mut champions = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        if let Some(champion) = Champion::from_snapshot(snapshot, COLLECTION)? {
            champions.push(champion);
        }
    }
    Ok(champions)
}
