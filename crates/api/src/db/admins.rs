//! Admin account repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use haat_core::{AdminId, Email, PhoneNumber};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Admin;

#[derive(sqlx::FromRow)]
struct AdminRow {
    id: i32,
    phone_number: String,
    email: Option<String>,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AdminWithHashRow {
    #[sqlx(flatten)]
    admin: AdminRow,
    password_hash: String,
}

impl TryFrom<AdminRow> for Admin {
    type Error = RepositoryError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        let phone_number = PhoneNumber::parse(&row.phone_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone number in database: {e}"))
        })?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(Self {
            id: AdminId::new(row.id),
            phone_number,
            email,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for admin accounts.
pub struct AdminRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminRepository<'a> {
    /// Create a new admin repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number is taken.
    pub async fn create(
        &self,
        phone_number: &PhoneNumber,
        email: Option<&Email>,
        name: &str,
        password_hash: &str,
    ) -> Result<Admin, RepositoryError> {
        let row = sqlx::query_as::<_, AdminRow>(
            r"
            INSERT INTO shop.admin (phone_number, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, phone_number, email, name, created_at, updated_at
            ",
        )
        .bind(phone_number)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("admin phone number already registered"))?;

        row.try_into()
    }

    /// Get an admin by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminRow>(
            r"
            SELECT id, phone_number, email, name, created_at, updated_at
            FROM shop.admin
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Admin::try_from).transpose()
    }

    /// Get an admin and their password hash by phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        phone_number: &PhoneNumber,
    ) -> Result<Option<(Admin, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminWithHashRow>(
            r"
            SELECT id, phone_number, email, name, created_at, updated_at, password_hash
            FROM shop.admin
            WHERE phone_number = $1
            ",
        )
        .bind(phone_number)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((Admin::try_from(r.admin)?, r.password_hash)))
            .transpose()
    }
}
