//! SQLite-backed document store.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{is_valid_order_key, Document, DocumentStore, OrderedQuery};

/// Document store persisted in a local SQLite database.
///
/// Each document is one row holding its JSON fields as text; ordered scans
/// use SQLite's JSON functions so any top-level string field can serve as
/// the order key.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  collection: String,
}

/// Schema for the document table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
);
"#;

impl SqliteStore {
  /// Open or create the store at `path` for `collection`.
  pub fn open(path: &Path, collection: &str) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store database at {}: {}", path.display(), e))?;

    Self::with_connection(conn, collection)
  }

  /// Create a store backed by a private in-memory database.
  pub fn open_in_memory(collection: &str) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn, collection)
  }

  fn with_connection(conn: Connection, collection: &str) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
      collection: collection.to_string(),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    Ok(crate::config::data_dir()?.join("store.db"))
  }

  /// Run database migrations for the document table.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }

  /// Fetch a single document by id.
  pub fn get(&self, id: &str) -> Result<Option<Document>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<String> = conn
      .query_row(
        "SELECT data FROM documents WHERE collection = ? AND id = ?",
        params![self.collection, id],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to load document {}: {}", id, e))?;

    data
      .map(|data| decode_fields(id, &data).map(|fields| Document::new(id, fields)))
      .transpose()
  }
}

impl DocumentStore for SqliteStore {
  async fn query_ordered(&self, query: OrderedQuery<'_>) -> Result<Vec<Document>> {
    if !is_valid_order_key(query.key) {
      return Err(eyre!("Invalid order key: {}", query.key));
    }
    let path = format!("$.{}", query.key);
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let (after_key, after_id) = match query.after {
      Some(cursor) => (Some(cursor.key()), Some(cursor.id())),
      None => (None, None),
    };

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT id, data FROM documents
         WHERE collection = ?1
           AND json_type(data, ?2) = 'text'
           AND (?3 IS NULL
                OR json_extract(data, ?2) > ?3
                OR (json_extract(data, ?2) = ?3 AND id > ?4))
         ORDER BY json_extract(data, ?2), id
         LIMIT ?5",
      )
      .map_err(|e| eyre!("Failed to prepare ordered query: {}", e))?;

    let rows: Vec<(String, String)> = stmt
      .query_map(
        params![self.collection, path, after_key, after_id, limit],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .map_err(|e| eyre!("Failed to run ordered query: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read query row: {}", e))?;

    rows
      .into_iter()
      .map(|(id, data)| decode_fields(&id, &data).map(|fields| Document::new(id, fields)))
      .collect()
  }

  async fn put(&self, document: &Document) -> Result<()> {
    let data = serde_json::to_string(&document.fields)
      .map_err(|e| eyre!("Failed to serialize document {}: {}", document.id, e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO documents (collection, id, data, updated_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![self.collection, document.id, data],
      )
      .map_err(|e| eyre!("Failed to store document {}: {}", document.id, e))?;

    Ok(())
  }

  async fn delete(&self, id: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![self.collection, id],
      )
      .map_err(|e| eyre!("Failed to delete document {}: {}", id, e))?;

    Ok(())
  }
}

fn decode_fields(id: &str, data: &str) -> Result<Map<String, Value>> {
  serde_json::from_str(data).map_err(|e| eyre!("Failed to parse document {}: {}", id, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::Cursor;
  use serde_json::json;

  fn doc(id: &str, fields: Value) -> Document {
    match fields {
      Value::Object(map) => Document::new(id, map),
      _ => panic!("fields must be an object"),
    }
  }

  async fn scan(store: &SqliteStore, after: Option<&Cursor>, limit: usize) -> Vec<String> {
    store
      .query_ordered(OrderedQuery {
        key: "title",
        after,
        limit,
      })
      .await
      .unwrap()
      .into_iter()
      .map(|d| d.id)
      .collect()
  }

  #[tokio::test]
  async fn test_ordered_scan_with_cursor() {
    let store = SqliteStore::open_in_memory("products").unwrap();
    for (id, title) in [("1", "b"), ("2", "a"), ("3", "b"), ("4", "c")] {
      store.put(&doc(id, json!({ "title": title }))).await.unwrap();
    }

    assert_eq!(scan(&store, None, 10).await, vec!["2", "1", "3", "4"]);

    let cursor = doc("1", json!({ "title": "b" })).cursor("title").unwrap();
    assert_eq!(scan(&store, Some(&cursor), 2).await, vec!["3", "4"]);
  }

  #[tokio::test]
  async fn test_non_string_keys_excluded() {
    let store = SqliteStore::open_in_memory("products").unwrap();
    store.put(&doc("1", json!({ "title": "a" }))).await.unwrap();
    store.put(&doc("2", json!({ "title": 5 }))).await.unwrap();
    store.put(&doc("3", json!({ "price": 1 }))).await.unwrap();

    assert_eq!(scan(&store, None, 10).await, vec!["1"]);
  }

  #[tokio::test]
  async fn test_get_and_delete() {
    let store = SqliteStore::open_in_memory("products").unwrap();
    store.put(&doc("1", json!({ "title": "a" }))).await.unwrap();
    let fetched = store.get("1").unwrap().unwrap();
    assert_eq!(fetched.fields["title"], json!("a"));

    store.delete("1").await.unwrap();
    assert!(store.get("1").unwrap().is_none());
    assert!(scan(&store, None, 10).await.is_empty());
  }

  #[tokio::test]
  async fn test_rejects_unsafe_order_key() {
    let store = SqliteStore::open_in_memory("products").unwrap();
    let result = store
      .query_ordered(OrderedQuery {
        key: "title') --",
        after: None,
        limit: 1,
      })
      .await;
    assert!(result.is_err());
  }
}
