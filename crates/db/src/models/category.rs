//! Category domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::CategoryName;

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub name: CategoryName,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: CategoryName,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Partial update; the name is the key and cannot change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub description: Option<String>,
    /// An empty string clears the image.
    pub image_url: Option<String>,
}
