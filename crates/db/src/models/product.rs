//! Product domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{CategoryName, Cents, ProductId};

/// Longest accepted product name.
pub const MAX_NAME_LENGTH: usize = 200;

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price_cents: Cents,
    pub description: String,
    pub story: Option<String>,
    pub image_url: Option<String>,
    pub category_name: Option<CategoryName>,
    /// Units on hand, including units currently held by carts.
    pub inventory: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product with read-time availability attached.
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithAvailability {
    #[serde(flatten)]
    pub product: Product,
    pub reserved: i64,
    pub available: i64,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price_cents: Cents,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_name: Option<CategoryName>,
    #[serde(default)]
    pub inventory: i32,
}

impl NewProduct {
    /// Check field values the column constraints would otherwise reject.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)?;
        if self.price_cents.as_i64() < 0 {
            return Err("price_cents cannot be negative".to_owned());
        }
        if self.inventory < 0 {
            return Err("inventory cannot be negative".to_owned());
        }
        Ok(())
    }
}

/// Partial product update. Absent fields are left unchanged.
///
/// Inventory is not part of this; it changes through inventory adjustments
/// so the product row lock is always taken.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price_cents: Option<Cents>,
    pub description: Option<String>,
    /// An empty string clears the story.
    pub story: Option<String>,
    /// An empty string clears the image.
    pub image_url: Option<String>,
    pub category_name: Option<CategoryName>,
}

impl ProductUpdate {
    /// Check the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if self.price_cents.is_some_and(|p| p.as_i64() < 0) {
            return Err("price_cents cannot be negative".to_owned());
        }
        Ok(())
    }

    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price_cents.is_none()
            && self.description.is_none()
            && self.story.is_none()
            && self.image_url.is_none()
            && self.category_name.is_none()
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name cannot be empty".to_owned());
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("name must be at most {MAX_NAME_LENGTH} characters"));
    }
    Ok(())
}
