//! Document store collaborator.
//!
//! The ingestion stage only depends on [`DocumentStore`]; which engine sits
//! behind it is a deployment decision. Two implementations ship here: a
//! SQLite-backed store that keeps one JSON document per row, and an
//! in-memory store for tests and dry runs.

use crate::error::StoreError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A schemaless record. Field order is preserved.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Name of the store-assigned identifier field.
pub const ID_FIELD: &str = "_id";

/// Minimal contract the pipeline needs from a document store.
pub trait DocumentStore: Send + Sync {
    /// Return every document of `collection`, each carrying a store-assigned `_id`.
    fn fetch_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Append `docs` to `collection`, returning how many were written.
    fn insert_many(&self, collection: &str, docs: &[Document]) -> Result<usize, StoreError>;
}

fn with_id(id: i64, body: Document) -> Document {
    let mut doc = Document::with_capacity(body.len() + 1);
    doc.insert(ID_FIELD.to_string(), serde_json::json!(id));
    doc.extend(body.into_iter().filter(|(k, _)| k != ID_FIELD));
    doc
}

fn check_collection(collection: &str) -> Result<(), StoreError> {
    if collection.trim().is_empty() {
        return Err(StoreError::InvalidCollection {
            name: collection.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteDocumentStore
// ---------------------------------------------------------------------------

/// SQLite-backed document store.
///
/// A connection is opened per call; the pipeline touches the store twice per
/// run at most.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    path: PathBuf,
    database: String,
}

impl SqliteDocumentStore {
    pub fn new(path: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            database: database.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<rusqlite::Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                    url: self.path.display().to_string(),
                    message: e.to_string(),
                })?;
            }
        }
        let conn =
            rusqlite::Connection::open(&self.path).map_err(|e| StoreError::Connection {
                url: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                database TEXT NOT NULL,
                collection TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection
                ON documents (database, collection);",
        )?;
        Ok(conn)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn fetch_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, body FROM documents WHERE database = ?1 AND collection = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(rusqlite::params![self.database, collection], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let parsed: Document =
                serde_json::from_str(&body).map_err(|e| StoreError::MalformedDocument {
                    collection: collection.to_string(),
                    message: format!("document {id}: {e}"),
                })?;
            docs.push(with_id(id, parsed));
        }
        tracing::debug!(collection, count = docs.len(), "Fetched documents from SQLite store");
        Ok(docs)
    }

    fn insert_many(&self, collection: &str, docs: &[Document]) -> Result<usize, StoreError> {
        check_collection(collection)?;
        if docs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (database, collection, body) VALUES (?1, ?2, ?3)",
            )?;
            for doc in docs {
                let body = serde_json::Value::Object(doc.clone()).to_string();
                stmt.execute(rusqlite::params![self.database, collection, body])?;
            }
        }
        tx.commit()?;
        tracing::info!(collection, count = docs.len(), "Inserted documents into SQLite store");
        Ok(docs.len())
    }
}

// ---------------------------------------------------------------------------
// MemoryDocumentStore
// ---------------------------------------------------------------------------

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: i64,
    collections: HashMap<String, Vec<Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn fetch_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.collections.get(collection).cloned().unwrap_or_default())
    }

    fn insert_many(&self, collection: &str, docs: &[Document]) -> Result<usize, StoreError> {
        check_collection(collection)?;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut stamped = Vec::with_capacity(docs.len());
        for doc in docs {
            inner.next_id += 1;
            stamped.push(with_id(inner.next_id, doc.clone()));
        }
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(stamped);
        Ok(docs.len())
    }
}
