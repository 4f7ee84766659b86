use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::pager::{DEFAULT_ORDER_KEY, DEFAULT_PAGE_SIZE};
use crate::store::FIRESTORE_BASE_URL;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Records per listing page
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  /// Top-level string field the listing is ordered by
  #[serde(default = "default_order_key")]
  pub order_key: String,
  #[serde(default)]
  pub store: StoreConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      order_key: default_order_key(),
      store: StoreConfig::default(),
    }
  }
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

fn default_order_key() -> String {
  DEFAULT_ORDER_KEY.to_string()
}

fn default_collection() -> String {
  "products".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// Local SQLite file
  #[default]
  Sqlite,
  /// Hosted Firestore database over REST
  Firestore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  #[serde(default)]
  pub backend: Backend,
  /// Collection holding the product documents
  #[serde(default = "default_collection")]
  pub collection: String,
  /// SQLite database file (defaults to the user data directory)
  pub path: Option<PathBuf>,
  pub firestore: Option<FirestoreConfig>,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      backend: Backend::default(),
      collection: default_collection(),
      path: None,
      firestore: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirestoreConfig {
  pub project_id: String,
  /// API root; point this at the emulator for local work
  #[serde(default = "default_base_url")]
  pub base_url: String,
}

fn default_base_url() -> String {
  FIRESTORE_BASE_URL.to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shopkeep.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shopkeep/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        debug!("No configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shopkeep.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shopkeep").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;
    debug!(path = %path.display(), "Loaded configuration");

    Ok(config)
  }

  /// Parse and validate YAML configuration.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.page_size == 0 {
      return Err(eyre!("page_size must be greater than zero"));
    }
    if self.store.backend == Backend::Firestore && self.store.firestore.is_none() {
      return Err(eyre!(
        "store.firestore.project_id is required for the firestore backend"
      ));
    }
    Ok(())
  }

  /// Get the Firestore bearer token from environment variables.
  ///
  /// Checks SHOPKEEP_FIRESTORE_TOKEN. The emulator accepts unauthenticated
  /// requests, so a missing token is not an error.
  pub fn get_firestore_token() -> Option<String> {
    std::env::var("SHOPKEEP_FIRESTORE_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
  }
}

/// Per-user directory for the store database and log files.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("shopkeep"))
}
