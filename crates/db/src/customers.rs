//! Customer repository.
//!
//! Customers are upserted by email. An OAuth login and a guest checkout with
//! the same address land on the same row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use larder_core::{CustomerId, Email};

use crate::models::{Customer, OAuthIdentity, Page};
use crate::{RepositoryError, map_constraint};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    email: String,
    name: String,
    oauth_subject: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            email,
            name: row.name,
            oauth_subject: row.oauth_subject,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List customers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Page<Customer>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, email, name, oauth_subject, created_at, updated_at
            FROM customers
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            total,
            limit,
            offset,
        })
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, email, name, oauth_subject, created_at, updated_at
            FROM customers
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a customer by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, email, name, oauth_subject, created_at, updated_at
            FROM customers
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find or create the customer for a checkout email.
    ///
    /// A non-empty `name` replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_email(
        &self,
        email: &Email,
        name: &str,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            INSERT INTO customers (email, name)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE
            SET name = CASE WHEN EXCLUDED.name = '' THEN customers.name ELSE EXCLUDED.name END,
                updated_at = now()
            RETURNING id, email, name, oauth_subject, created_at, updated_at
            ",
        )
        .bind(email)
        .bind(name.trim())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Find or create the customer for an OAuth login.
    ///
    /// Links the provider subject to an existing email row the first time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the subject is already linked to
    /// a different email.
    #[tracing::instrument(skip(self, identity), fields(email = %identity.email))]
    pub async fn upsert_oauth(&self, identity: &OAuthIdentity) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            INSERT INTO customers (email, name, oauth_subject)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET oauth_subject = COALESCE(customers.oauth_subject, EXCLUDED.oauth_subject),
                name = CASE WHEN EXCLUDED.name = '' THEN customers.name ELSE EXCLUDED.name END,
                updated_at = now()
            RETURNING id, email, name, oauth_subject, created_at, updated_at
            ",
        )
        .bind(&identity.email)
        .bind(identity.name.trim())
        .bind(&identity.subject)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            map_constraint(e, "identity is linked to another account", || {
                RepositoryError::NotFound
            })
        })?;

        row.try_into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_row_rejects_bad_email() {
        let row = CustomerRow {
            id: CustomerId::new(1),
            email: "nope".to_owned(),
            name: String::new(),
            oauth_subject: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let result: Result<Customer, _> = row.try_into();
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_subject_is_not_serialized() {
        let customer = Customer {
            id: CustomerId::new(4),
            email: Email::parse("cook@example.com").unwrap(),
            name: "Cook".to_owned(),
            oauth_subject: Some("sub-123".to_owned()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&customer).unwrap();
        assert!(json.get("oauth_subject").is_none());
        assert_eq!(json["email"], "cook@example.com");
    }
}
