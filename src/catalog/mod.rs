//! Record normalization for catalog documents.
//!
//! Backend documents are not schema-enforced. Optional fields that are
//! missing or carry the wrong JSON type fall back to zero values; a document
//! without identity (an id and a string title) cannot be listed and is
//! skipped.

mod seed;
mod types;

pub use seed::{document_from_json, documents_from_json};
pub use types::{Product, Rating};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::store::Document;

/// Projection of a raw document into an application record.
pub trait FromDocument: Sized + Send {
  /// Returns `None` when the document lacks the identity needed to list it.
  fn from_document(document: &Document) -> Option<Self>;
}

impl FromDocument for Document {
  fn from_document(document: &Document) -> Option<Self> {
    Some(document.clone())
  }
}

impl FromDocument for Product {
  fn from_document(document: &Document) -> Option<Self> {
    if document.id.is_empty() {
      warn!("Skipping product document with empty id");
      return None;
    }

    let fields = &document.fields;
    let Some(title) = fields.get("title").and_then(Value::as_str) else {
      warn!(id = %document.id, "Skipping product document without a title");
      return None;
    };

    let mut defaulted = Vec::new();
    let product = Product {
      id: document.id.clone(),
      title: title.to_string(),
      price: number_or_zero(fields, "price", &mut defaulted),
      category: text_or_empty(fields, "category", &mut defaulted),
      image: text_or_empty(fields, "image", &mut defaulted),
      description: text_or_empty(fields, "description", &mut defaulted),
      rating: rating(fields.get("rating"), &mut defaulted),
    };

    if !defaulted.is_empty() {
      debug!(id = %product.id, fields = ?defaulted, "Defaulted malformed product fields");
    }

    Some(product)
  }
}

fn number_or_zero(
  fields: &Map<String, Value>,
  name: &'static str,
  defaulted: &mut Vec<&'static str>,
) -> f64 {
  match fields.get(name).and_then(Value::as_f64) {
    Some(value) if value.is_finite() => value,
    _ => {
      defaulted.push(name);
      0.0
    }
  }
}

fn text_or_empty(
  fields: &Map<String, Value>,
  name: &'static str,
  defaulted: &mut Vec<&'static str>,
) -> String {
  match fields.get(name).and_then(Value::as_str) {
    Some(value) => value.to_string(),
    None => {
      defaulted.push(name);
      String::new()
    }
  }
}

fn rating(value: Option<&Value>, defaulted: &mut Vec<&'static str>) -> Rating {
  let Some(rating) = value.and_then(Value::as_object) else {
    defaulted.push("rating");
    return Rating::default();
  };

  let rate = match rating.get("rate").and_then(Value::as_f64) {
    Some(rate) if rate.is_finite() => rate,
    _ => {
      defaulted.push("rating.rate");
      0.0
    }
  };

  // Counts stored as floats (e.g. 120.0) are accepted; negatives are not
  let count = match rating.get("count") {
    Some(count) => count
      .as_u64()
      .or_else(|| count.as_f64().filter(|c| c.is_finite() && *c >= 0.0).map(|c| c as u64)),
    None => None,
  };

  Rating {
    rate,
    count: count.unwrap_or_else(|| {
      defaulted.push("rating.count");
      0
    }),
  }
}
