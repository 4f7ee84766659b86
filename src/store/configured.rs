//! Store selected by configuration.

use color_eyre::{eyre::eyre, Result};
use tracing::info;

use crate::config::{Backend, Config, StoreConfig};

use super::{Document, DocumentStore, FirestoreStore, OrderedQuery, SqliteStore};

/// The backend named in the configuration file.
pub enum ConfiguredStore {
  Sqlite(SqliteStore),
  Firestore(FirestoreStore),
}

impl ConfiguredStore {
  pub fn open(config: &StoreConfig) -> Result<Self> {
    match config.backend {
      Backend::Sqlite => {
        let path = match &config.path {
          Some(path) => path.clone(),
          None => SqliteStore::default_path()?,
        };
        info!(path = %path.display(), collection = %config.collection, "Opening SQLite store");
        Ok(Self::Sqlite(SqliteStore::open(&path, &config.collection)?))
      }
      Backend::Firestore => {
        let firestore = config
          .firestore
          .as_ref()
          .ok_or_else(|| eyre!("Missing store.firestore section for the firestore backend"))?;
        info!(
          project = %firestore.project_id,
          collection = %config.collection,
          "Using Firestore store"
        );
        Ok(Self::Firestore(FirestoreStore::new(
          &firestore.base_url,
          &firestore.project_id,
          &config.collection,
          Config::get_firestore_token(),
        )?))
      }
    }
  }
}

impl DocumentStore for ConfiguredStore {
  async fn query_ordered(&self, query: OrderedQuery<'_>) -> Result<Vec<Document>> {
    match self {
      Self::Sqlite(store) => store.query_ordered(query).await,
      Self::Firestore(store) => store.query_ordered(query).await,
    }
  }

  async fn put(&self, document: &Document) -> Result<()> {
    match self {
      Self::Sqlite(store) => store.put(document).await,
      Self::Firestore(store) => store.put(document).await,
    }
  }

  async fn delete(&self, id: &str) -> Result<()> {
    match self {
      Self::Sqlite(store) => store.delete(id).await,
      Self::Firestore(store) => store.delete(id).await,
    }
  }
}
