use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use super::{
    new_document_id, validate_document_id, DocumentData, DocumentSnapshot,
    DocumentStore, Filter, Query, StoreError,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Document store persisted in a single SQLite table, one JSON blob per document.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

/// Row from the documents table
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: String,
}

impl DocumentRow {
    fn parse(self, collection: &str) -> Result<DocumentSnapshot, StoreError> {
        let data = serde_json::from_str::<DocumentData>(&self.data).map_err(|source| {
            StoreError::DataLoss {
                collection: collection.to_string(),
                id: self.id.clone(),
                source,
            }
        })?;
        Ok(DocumentSnapshot::found(self.id, data))
    }
}

impl SqliteDocumentStore {
    /// Open (creating if needed) the database at `database_url`
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the documents table if missing
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS documents (
                   collection TEXT NOT NULL,
                   id TEXT NOT NULL,
                   data TEXT NOT NULL,
                   PRIMARY KEY (collection, id)
               )"#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn fetch_row(&self, collection: &str, id: &str) -> Result<Option<DocumentRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"SELECT id, data FROM documents WHERE collection = ? AND id = ?"#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<DocumentSnapshot, StoreError> {
        validate_document_id(id)?;
        match self.fetch_row(collection, id).await? {
            Some(row) => row.parse(collection),
            None => Ok(DocumentSnapshot::missing(id)),
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<DocumentSnapshot>, StoreError> {
        query.validate()?;

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());

        match &query.filter {
            Some(Filter::Eq { field, value }) => {
                builder.push(" AND json_extract(data, ").push_bind(json_path(field)).push(") = ");
                push_value(&mut builder, value);
            }
            Some(Filter::In { field, values }) => {
                builder.push(" AND json_extract(data, ").push_bind(json_path(field)).push(") IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        builder.push(", ");
                    }
                    push_value(&mut builder, value);
                }
                builder.push(")");
            }
            None => {}
        }

        match &query.order_by {
            Some(field) => {
                // json_type is NULL only when the path is absent
                builder.push(" AND json_type(data, ").push_bind(json_path(field)).push(") IS NOT NULL");
                builder.push(" ORDER BY json_extract(data, ").push_bind(json_path(field)).push("), id");
            }
            None => {
                builder.push(" ORDER BY id");
            }
        }

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|row| row.parse(collection)).collect()
    }

    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError> {
        let id = new_document_id();
        sqlx::query(r#"INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)"#)
            .bind(collection)
            .bind(&id)
            .bind(Value::Object(data).to_string())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: DocumentData) -> Result<(), StoreError> {
        validate_document_id(id)?;

        // One statement: no read lock is held while waiting for the write lock
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE documents SET data = ");
        if fields.is_empty() {
            builder.push("data");
        } else {
            builder.push("json_set(data");
            for (field, value) in fields {
                builder
                    .push(", ")
                    .push_bind(json_path(&field))
                    .push(", json(")
                    .push_bind(value.to_string())
                    .push(")");
            }
            builder.push(")");
        }
        builder
            .push(" WHERE collection = ")
            .push_bind(collection.to_string())
            .push(" AND id = ")
            .push_bind(id.to_string());

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::String(s) => builder.push_bind(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => builder.push_bind(i),
            None => builder.push_bind(n.as_f64().unwrap_or_default()),
        },
        // json_extract yields 1/0 for booleans
        Value::Bool(b) => builder.push_bind(i64::from(*b)),
        Value::Null => builder.push("NULL"),
        other => builder.push_bind(other.to_string()),
    };
}
