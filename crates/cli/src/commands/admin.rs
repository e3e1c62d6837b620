//! Admin account management commands.
//!
//! The HTTP endpoint for creating admins requires an admin token, so the
//! first account on a fresh database is created here.
//!
//! # Usage
//!
//! ```bash
//! haat admin create -p 9876543210 --password 'long-passphrase' -n "Ops Admin"
//! ```
//!
//! # Environment Variables
//!
//! - `HAAT_DATABASE_URL` - `PostgreSQL` connection string
//! - `HAAT_ADMIN_PASSWORD` - Used when `--password` is omitted

use haat_api::db;
use haat_api::services::auth::{AdminSignup, AuthError, AuthService, Credentials};
use haat_core::AdminId;
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: HAAT_DATABASE_URL")]
    MissingDatabaseUrl,

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Rejected input or an existing account.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a new admin account.
///
/// # Errors
///
/// Returns `AdminError::Auth` for an invalid phone, email or password, or
/// when the phone number is already registered.
pub async fn create(
    phone: String,
    password: String,
    name: Option<String>,
    email: Option<String>,
) -> Result<AdminId, AdminError> {
    let database_url = super::database_url().ok_or(AdminError::MissingDatabaseUrl)?;
    let pool = db::create_pool(&database_url).await?;

    let signup = AdminSignup {
        credentials: Credentials {
            phone_number: phone,
            password,
        },
        email,
        name,
    };
    let admin = AuthService::new(&pool).create_admin(signup).await?;

    tracing::info!("Admin created successfully!");
    tracing::info!("  ID: {}", admin.id);
    tracing::info!("  Phone: {}", admin.phone_number);
    tracing::info!("  Name: {}", admin.name);

    Ok(admin.id)
}
