//! Conversion of imported JSON product objects into store documents.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::store::Document;

/// Length of generated document ids, matching the backend's auto-id length.
const GENERATED_ID_LEN: usize = 20;

/// Build a document from a JSON object.
///
/// The `id` field (string or integer) becomes the document id and is removed
/// from the fields. Objects without one get an id derived from their
/// content, so importing the same file twice does not duplicate products.
pub fn document_from_json(value: Value) -> Result<Document> {
  let mut fields = match value {
    Value::Object(fields) => fields,
    other => return Err(eyre!("Expected a JSON object, got {}", json_kind(&other))),
  };

  let id = match fields.remove("id") {
    Some(Value::String(id)) if !id.is_empty() => id,
    Some(Value::Number(n)) => n.to_string(),
    None | Some(Value::Null) | Some(Value::String(_)) => content_id(&fields)?,
    Some(other) => return Err(eyre!("Unsupported document id: {}", other)),
  };

  Ok(Document::new(id, fields))
}

/// Parse a JSON array of product objects.
pub fn documents_from_json(contents: &str) -> Result<Vec<Document>> {
  let value: Value =
    serde_json::from_str(contents).map_err(|e| eyre!("Failed to parse product file: {}", e))?;

  match value {
    Value::Array(items) => items.into_iter().map(document_from_json).collect(),
    other => Err(eyre!(
      "Expected a JSON array of products, got {}",
      json_kind(&other)
    )),
  }
}

fn content_id(fields: &serde_json::Map<String, Value>) -> Result<String> {
  let bytes = serde_json::to_vec(fields).map_err(|e| eyre!("Failed to serialize fields: {}", e))?;

  // SHA256 hash for stable ids
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  let result = hasher.finalize();
  let mut id = hex::encode(result);
  id.truncate(GENERATED_ID_LEN);
  Ok(id)
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
