//! Document store abstraction consumed by the page cache.
//!
//! A store holds one collection of schemaless documents and answers a single
//! kind of read: an ascending scan by an order key that resumes strictly
//! after a [`Cursor`]. Documents whose order key is not a string are not
//! part of the scan, matching how the hosted backend treats documents that
//! lack an `orderBy` field.

mod configured;
mod firestore;
mod memory;
mod sqlite;

pub use configured::ConfiguredStore;
pub use firestore::{FirestoreStore, FIRESTORE_BASE_URL};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use color_eyre::Result;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::future::Future;

/// A raw backend document: identity plus untyped fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  pub id: String,
  pub fields: Map<String, Value>,
}

impl Document {
  pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
    Self {
      id: id.into(),
      fields,
    }
  }

  /// The string value of the order key, if the document has one.
  pub fn order_value(&self, key: &str) -> Option<&str> {
    self.fields.get(key).and_then(Value::as_str)
  }

  /// Position marker that resumes a scan on `key` right after this document.
  pub fn cursor(&self, key: &str) -> Option<Cursor> {
    self.order_value(key).map(|value| Cursor {
      key: value.to_string(),
      id: self.id.clone(),
    })
  }
}

/// Resumable position in a scan ordered by `(order key, document id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor {
  key: String,
  id: String,
}

impl Cursor {
  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Where a `(key, id)` position falls relative to this cursor.
  pub(crate) fn cmp_position(&self, key: &str, id: &str) -> Ordering {
    (key, id).cmp(&(self.key.as_str(), self.id.as_str()))
  }
}

/// A bounded ordered range read.
#[derive(Debug, Clone, Copy)]
pub struct OrderedQuery<'a> {
  /// Field the scan is ordered by
  pub key: &'a str,
  /// Resume strictly after this position; `None` starts at the beginning
  pub after: Option<&'a Cursor>,
  /// Maximum number of documents to return
  pub limit: usize,
}

/// Trait for document store backends.
pub trait DocumentStore: Send + Sync {
  /// Up to `query.limit` documents strictly after `query.after`, ascending by
  /// `(query.key, id)`.
  fn query_ordered(
    &self,
    query: OrderedQuery<'_>,
  ) -> impl Future<Output = Result<Vec<Document>>> + Send;

  /// Insert or replace a document.
  fn put(&self, document: &Document) -> impl Future<Output = Result<()>> + Send;

  /// Delete a document by id. Deleting a missing document is not an error.
  fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Order keys are interpolated into JSON paths and field paths, so only
/// plain identifiers are accepted.
pub(crate) fn is_valid_order_key(key: &str) -> bool {
  !key.is_empty()
    && key
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_')
    && !key.starts_with(|c: char| c.is_ascii_digit())
}
