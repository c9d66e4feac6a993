//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use larder_core::CategoryName;

use crate::models::{Category, CategoryUpdate, NewCategory};
use crate::{RepositoryError, map_constraint, map_foreign_key};

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    name: String,
    description: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        let name = CategoryName::parse(&row.name).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid category name in database: {e}"))
        })?;
        Ok(Self {
            name,
            description: row.description,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT name, description, image_url, created_at, updated_at
            FROM categories
            ORDER BY name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a category by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, name: &CategoryName) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT name, description, image_url, created_at, updated_at
            FROM categories
            WHERE name = $1
            ",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    #[tracing::instrument(skip(self, input), fields(category = %input.name))]
    pub async fn create(&self, input: &NewCategory) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO categories (name, description, image_url)
            VALUES ($1, $2, $3)
            RETURNING name, description, image_url, created_at, updated_at
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.image_url.as_deref().filter(|s| !s.is_empty()))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "category already exists", || RepositoryError::NotFound))?;

        row.try_into()
    }

    /// Update a category's description or image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn update(
        &self,
        name: &CategoryName,
        input: &CategoryUpdate,
    ) -> Result<Category, RepositoryError> {
        // $3 distinguishes "leave image alone" (NULL) from "clear image" ('').
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            UPDATE categories
            SET description = COALESCE($2, description),
                image_url = CASE
                    WHEN $3::text IS NULL THEN image_url
                    ELSE NULLIF($3, '')
                END,
                updated_at = now()
            WHERE name = $1
            RETURNING name, description, image_url, created_at, updated_at
            ",
        )
        .bind(name)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a category.
    ///
    /// Returns `false` if no such category existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products still reference it.
    #[tracing::instrument(skip(self), fields(category = %name))]
    pub async fn delete(&self, name: &CategoryName) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE name = $1")
            .bind(name)
            .execute(self.pool)
            .await
            .map_err(|e| {
                map_foreign_key(e, || {
                    RepositoryError::Conflict("category still has products".to_owned())
                })
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(name: &str) -> CategoryRow {
        CategoryRow {
            name: name.to_owned(),
            description: "Dried chiles".to_owned(),
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_converts() {
        let category: Category = row("Chiles").try_into().unwrap();
        assert_eq!(category.name.as_str(), "Chiles");
        assert_eq!(category.description, "Dried chiles");
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let result: Result<Category, _> = row("").try_into();
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
