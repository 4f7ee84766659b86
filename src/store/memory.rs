//! In-memory document store.

use color_eyre::{eyre::eyre, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Document, DocumentStore, OrderedQuery};

/// Document store kept entirely in memory, keyed by document id.
#[derive(Debug, Default)]
pub struct MemoryStore {
  documents: Mutex<BTreeMap<String, Document>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a store pre-populated with `documents`.
  pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
    let documents = documents
      .into_iter()
      .map(|doc| (doc.id.clone(), doc))
      .collect();
    Self {
      documents: Mutex::new(documents),
    }
  }

  pub fn len(&self) -> usize {
    self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl DocumentStore for MemoryStore {
  async fn query_ordered(&self, query: OrderedQuery<'_>) -> Result<Vec<Document>> {
    let documents = self
      .documents
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut matching: Vec<(&str, &Document)> = documents
      .values()
      .filter_map(|doc| doc.order_value(query.key).map(|value| (value, doc)))
      .filter(|(value, doc)| match query.after {
        Some(cursor) => cursor.cmp_position(value, &doc.id) == Ordering::Greater,
        None => true,
      })
      .collect();

    matching.sort_by(|(a, da), (b, db)| (*a, da.id.as_str()).cmp(&(*b, db.id.as_str())));

    Ok(
      matching
        .into_iter()
        .take(query.limit)
        .map(|(_, doc)| doc.clone())
        .collect(),
    )
  }

  async fn put(&self, document: &Document) -> Result<()> {
    self
      .documents
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(document.id.clone(), document.clone());
    Ok(())
  }

  async fn delete(&self, id: &str) -> Result<()> {
    self
      .documents
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .remove(id);
    Ok(())
  }
}
