//! Document store backed by the Firestore REST API.
//!
//! Firestore wraps every field in a typed envelope (`stringValue`,
//! `integerValue`, `mapValue`, ...). Documents are converted to and from
//! plain JSON at this boundary so the rest of the crate never sees the wire
//! encoding.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use super::{is_valid_order_key, Document, DocumentStore, OrderedQuery};

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/";

/// One element of a `:runQuery` response stream.
#[derive(Debug, Deserialize)]
struct RunQueryItem {
  document: Option<ApiDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiDocument {
  name: String,
  #[serde(default)]
  fields: Map<String, Value>,
}

/// Firestore collection accessed over REST.
#[derive(Clone)]
pub struct FirestoreStore {
  client: reqwest::Client,
  base_url: Url,
  project_id: String,
  collection: String,
  token: Option<String>,
}

impl FirestoreStore {
  pub fn new(
    base_url: &str,
    project_id: &str,
    collection: &str,
    token: Option<String>,
  ) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid Firestore URL {}: {}", base_url, e))?;
    if project_id.is_empty() {
      return Err(eyre!("Firestore project id must not be empty"));
    }

    let client = reqwest::Client::builder()
      .gzip(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      project_id: project_id.to_string(),
      collection: collection.to_string(),
      token,
    })
  }

  /// Resource name of the database's document root.
  fn documents_root(&self) -> String {
    format!("projects/{}/databases/(default)/documents", self.project_id)
  }

  /// Full resource name of a document in this collection.
  fn document_name(&self, id: &str) -> String {
    format!("{}/{}/{}", self.documents_root(), self.collection, id)
  }

  /// REST URL of a document, with the id encoded as a single path segment.
  fn document_url(&self, id: &str) -> Result<Url> {
    let mut url = self.endpoint(&format!("{}/{}", self.documents_root(), self.collection))?;
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Firestore URL {} cannot take a document path", self.base_url))?
      .push(id);
    Ok(url)
  }

  fn endpoint(&self, resource: &str) -> Result<Url> {
    self
      .base_url
      .join(&format!("v1/{}", resource))
      .map_err(|e| eyre!("Failed to build Firestore URL for {}: {}", resource, e))
  }

  fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
    let builder = self.client.request(method, url);
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  /// `structuredQuery` body for an ordered range read.
  fn structured_query(&self, query: &OrderedQuery<'_>) -> Value {
    let mut structured = json!({
      "from": [{ "collectionId": self.collection }],
      "orderBy": [
        { "field": { "fieldPath": query.key }, "direction": "ASCENDING" },
        { "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" },
      ],
      "limit": query.limit,
    });

    if let Some(cursor) = query.after {
      structured["startAt"] = json!({
        "values": [
          { "stringValue": cursor.key() },
          { "referenceValue": self.document_name(cursor.id()) },
        ],
        "before": false,
      });
    }

    json!({ "structuredQuery": structured })
  }
}

async fn check_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(eyre!("Firestore {} failed ({}): {}", action, status, body))
}

impl DocumentStore for FirestoreStore {
  async fn query_ordered(&self, query: OrderedQuery<'_>) -> Result<Vec<Document>> {
    if !is_valid_order_key(query.key) {
      return Err(eyre!("Invalid order key: {}", query.key));
    }

    let url = self.endpoint(&format!("{}:runQuery", self.documents_root()))?;
    let response = self
      .request(reqwest::Method::POST, url)
      .json(&self.structured_query(&query))
      .send()
      .await
      .map_err(|e| eyre!("Failed to query Firestore: {}", e))?;

    let items: Vec<RunQueryItem> = check_status(response, "query")
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse Firestore query response: {}", e))?;

    Ok(
      items
        .into_iter()
        .filter_map(|item| item.document)
        .map(|doc| {
          let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
          Document::new(id, decode_fields(&doc.fields))
        })
        .collect(),
    )
  }

  async fn put(&self, document: &Document) -> Result<()> {
    let url = self.document_url(&document.id)?;
    let body = json!({ "fields": encode_fields(&document.fields) });

    let response = self
      .request(reqwest::Method::PATCH, url)
      .json(&body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to write document {}: {}", document.id, e))?;
    check_status(response, "write").await?;

    Ok(())
  }

  async fn delete(&self, id: &str) -> Result<()> {
    let url = self.document_url(id)?;

    let response = self
      .request(reqwest::Method::DELETE, url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete document {}: {}", id, e))?;
    check_status(response, "delete").await?;

    Ok(())
  }
}

// ============================================================================
// Value envelopes
// ============================================================================

fn encode_fields(fields: &Map<String, Value>) -> Value {
  Value::Object(
    fields
      .iter()
      .map(|(name, value)| (name.clone(), encode_value(value)))
      .collect(),
  )
}

fn encode_value(value: &Value) -> Value {
  match value {
    Value::Null => json!({ "nullValue": null }),
    Value::Bool(b) => json!({ "booleanValue": b }),
    Value::Number(n) => match n.as_i64() {
      // Firestore carries 64-bit integers as strings
      Some(i) => json!({ "integerValue": i.to_string() }),
      None => json!({ "doubleValue": n.as_f64() }),
    },
    Value::String(s) => json!({ "stringValue": s }),
    Value::Array(items) => json!({
      "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
    }),
    Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
  }
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
  fields
    .iter()
    .map(|(name, value)| (name.clone(), decode_value(value)))
    .collect()
}

/// Unwrap a typed envelope. Unknown envelopes decode to `null` and are left
/// to record normalization.
fn decode_value(value: &Value) -> Value {
  let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
    return Value::Null;
  };

  match kind.as_str() {
    "integerValue" => match inner {
      Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
      other => other.clone(),
    },
    "doubleValue" | "booleanValue" | "stringValue" | "timestampValue" | "referenceValue"
    | "bytesValue" => inner.clone(),
    "mapValue" => Value::Object(
      inner
        .get("fields")
        .and_then(Value::as_object)
        .map(decode_fields)
        .unwrap_or_default(),
    ),
    "arrayValue" => Value::Array(
      inner
        .get("values")
        .and_then(Value::as_array)
        .map(|values| values.iter().map(decode_value).collect())
        .unwrap_or_default(),
    ),
    "geoPointValue" => inner.clone(),
    _ => Value::Null,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> FirestoreStore {
    FirestoreStore::new("http://localhost:8080/", "shop", "products", None).unwrap()
  }

  #[test]
  fn test_decode_rating_envelope() {
    let raw = json!({
      "title": { "stringValue": "Lamp" },
      "price": { "doubleValue": 12.5 },
      "rating": { "mapValue": { "fields": {
        "rate": { "doubleValue": 4.1 },
        "count": { "integerValue": "120" },
      }}},
      "tags": { "arrayValue": {} },
    });

    let decoded = decode_fields(raw.as_object().unwrap());

    assert_eq!(
      Value::Object(decoded),
      json!({
        "title": "Lamp",
        "price": 12.5,
        "rating": { "rate": 4.1, "count": 120 },
        "tags": [],
      })
    );
  }

  #[test]
  fn test_encode_integer_as_string() {
    assert_eq!(encode_value(&json!(7)), json!({ "integerValue": "7" }));
    assert_eq!(encode_value(&json!(7.5)), json!({ "doubleValue": 7.5 }));
    assert_eq!(
      encode_value(&json!({ "rate": null })),
      json!({ "mapValue": { "fields": { "rate": { "nullValue": null } } } })
    );
  }

  #[test]
  fn test_unknown_envelope_decodes_to_null() {
    assert_eq!(decode_value(&json!({ "mysteryValue": 1 })), Value::Null);
    assert_eq!(decode_value(&json!("bare")), Value::Null);
    assert_eq!(decode_value(&json!({ "integerValue": "x" })), Value::Null);
  }

  #[test]
  fn test_structured_query_starts_after_cursor() {
    let store = store();
    let mut fields = Map::new();
    fields.insert("title".to_string(), json!("Lamp"));
    let cursor = Document::new("abc", fields).cursor("title").unwrap();

    let body = store.structured_query(&OrderedQuery {
      key: "title",
      after: Some(&cursor),
      limit: 11,
    });

    let structured = &body["structuredQuery"];
    assert_eq!(structured["limit"], json!(11));
    assert_eq!(structured["orderBy"][0]["field"]["fieldPath"], json!("title"));
    assert_eq!(structured["startAt"]["before"], json!(false));
    assert_eq!(
      structured["startAt"]["values"][1]["referenceValue"],
      json!("projects/shop/databases/(default)/documents/products/abc")
    );
  }

  #[test]
  fn test_structured_query_from_start_has_no_bound() {
    let body = store().structured_query(&OrderedQuery {
      key: "title",
      after: None,
      limit: 3,
    });
    assert!(body["structuredQuery"].get("startAt").is_none());
  }

  #[test]
  fn test_document_url_joins_resource_path() {
    let url = store().document_url("abc").unwrap();
    assert_eq!(
      url.as_str(),
      "http://localhost:8080/v1/projects/shop/databases/(default)/documents/products/abc"
    );
  }

  #[test]
  fn test_document_url_escapes_id() {
    let url = store().document_url("a/b?c#d").unwrap();
    assert_eq!(
      url.as_str(),
      "http://localhost:8080/v1/projects/shop/databases/(default)/documents/products/a%2Fb%3Fc%23d"
    );
    assert!(url.query().is_none());
    assert!(url.fragment().is_none());
  }

  #[test]
  fn test_rejects_empty_project() {
    assert!(FirestoreStore::new(FIRESTORE_BASE_URL, "", "products", None).is_err());
  }
}
