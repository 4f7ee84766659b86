use serde::{Deserialize, Serialize};

/// Product as shown in the admin listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: String,
  pub title: String,
  pub price: f64,
  pub category: String,
  pub image: String,
  pub description: String,
  pub rating: Rating,
}

/// Aggregate review score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
  pub rate: f64,
  pub count: u64,
}
