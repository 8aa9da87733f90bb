use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    apply_update, new_document_id, validate_document_id, DocumentData, DocumentSnapshot,
    DocumentStore, Filter, Query, StoreError,
};

/// Document store kept in process memory. Documents are returned in id order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, DocumentData>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under a caller-chosen id, replacing any existing document
    pub async fn insert(&self, collection: &str, id: &str, data: DocumentData) -> Result<(), StoreError> {
        validate_document_id(id)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<DocumentSnapshot, StoreError> {
        validate_document_id(id)?;
        let collections = self.collections.read().await;
        let data = collections.get(collection).and_then(|docs| docs.get(id)).cloned();
        Ok(DocumentSnapshot { id: id.to_string(), data })
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<DocumentSnapshot>, StoreError> {
        query.validate()?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<DocumentSnapshot> = docs
            .iter()
            .filter(|(_, data)| matches_filter(data, query.filter.as_ref()))
            .filter(|(_, data)| query.order_by.as_ref().is_none_or(|field| data.contains_key(field)))
            .map(|(id, data)| DocumentSnapshot::found(id.clone(), data.clone()))
            .collect();

        if let Some(field) = &query.order_by {
            // Stable sort keeps id order between equal keys
            matched.sort_by(|a, b| {
                let left = a.data.as_ref().and_then(|d| d.get(field));
                let right = b.data.as_ref().and_then(|d| d.get(field));
                match (left, right) {
                    (Some(l), Some(r)) => compare_values(l, r),
                    _ => Ordering::Equal,
                }
            });
        }

        Ok(matched)
    }

    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError> {
        let id = new_document_id();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: DocumentData) -> Result<(), StoreError> {
        validate_document_id(id)?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        apply_update(doc, fields);
        Ok(())
    }
}

fn matches_filter(data: &DocumentData, filter: Option<&Filter>) -> bool {
    match filter {
        None => true,
        Some(Filter::Eq { field, value }) => data.get(field) == Some(value),
        Some(Filter::In { field, values }) => data.get(field).is_some_and(|v| values.contains(v)),
    }
}

// null < booleans < numbers < strings < arrays < objects
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::Number(l), Value::Number(r)) => {
            let (l, r) = (l.as_f64().unwrap_or(f64::NAN), r.as_f64().unwrap_or(f64::NAN));
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Array(l), Value::Array(r)) => l
            .iter()
            .zip(r.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| l.len().cmp(&r.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
