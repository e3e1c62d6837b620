//! Authentication service.
//!
//! Password accounts for all three roles. Every account logs in with its phone
//! number; the namespace decides which table is searched and which role the
//! issued token carries.

mod error;
mod token;

pub use error::AuthError;
pub use token::{Claims, TokenService};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use haat_core::{Email, PhoneNumber, SellerStatus};

use crate::db::{AdminRepository, RepositoryError, SellerRepository, UserRepository};
use crate::models::{Admin, NewSeller, NewUser, Seller, User, clean};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Phone number and password as posted to a login endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    fn parse(&self) -> Result<PhoneNumber, AuthError> {
        if self.phone_number.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok(PhoneNumber::parse(&self.phone_number)?)
    }
}

/// Shopper sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSignup {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Seller sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSignup {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shop_name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub aadhaar_id: Option<String>,
}

/// Admin creation form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSignup {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub email: Option<String>,
    pub name: Option<String>,
}

fn parse_email(email: Option<String>) -> Result<Option<Email>, AuthError> {
    Ok(clean(email).map(|e| Email::parse(&e)).transpose()?)
}

fn exists_as(label: &'static str) -> impl FnOnce(RepositoryError) -> AuthError {
    move |e| match e {
        RepositoryError::Conflict(_) => AuthError::AccountExists(label),
        other => AuthError::Repository(other),
    }
}

/// Authentication service.
///
/// Handles registration and password login for shoppers, sellers and admins.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    sellers: SellerRepository<'a>,
    admins: AdminRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            sellers: SellerRepository::new(pool),
            admins: AdminRepository::new(pool),
        }
    }

    // =========================================================================
    // Shoppers
    // =========================================================================

    /// Register a shopper.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone`/`InvalidEmail` for malformed input,
    /// `AuthError::WeakPassword` for short passwords and
    /// `AuthError::AccountExists` if the phone or email is taken.
    pub async fn register_user(&self, signup: UserSignup) -> Result<User, AuthError> {
        let phone_number = signup.credentials.parse()?;
        validate_password(&signup.credentials.password)?;
        let email = parse_email(signup.email)?;

        let password_hash = hash_password(&signup.credentials.password)?;
        let new_user = NewUser {
            phone_number,
            email,
            first_name: clean(signup.first_name),
            last_name: clean(signup.last_name),
        };

        let user = self
            .users
            .create(&new_user, &password_hash)
            .await
            .map_err(exists_as("User"))?;

        tracing::info!(user_id = %user.id, "Shopper registered");
        Ok(user)
    }

    /// Log a shopper in and stamp `last_login`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone/password is wrong.
    pub async fn login_user(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let phone_number = credentials.parse()?;

        let (mut user, password_hash) = self
            .users
            .get_password_hash(&phone_number)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(&credentials.password, &password_hash)?;

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        user.last_login = Some(now);
        Ok(user)
    }

    // =========================================================================
    // Sellers
    // =========================================================================

    /// Register a seller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` when the name or shop name is blank,
    /// plus the same errors as [`Self::register_user`].
    pub async fn register_seller(&self, signup: SellerSignup) -> Result<Seller, AuthError> {
        let phone_number = signup.credentials.parse()?;
        validate_password(&signup.credentials.password)?;

        let name = clean(Some(signup.name)).ok_or(AuthError::MissingField("Name"))?;
        let shop_name = clean(Some(signup.shop_name)).ok_or(AuthError::MissingField("Shop name"))?;
        let new_seller = NewSeller {
            name,
            shop_name,
            phone_number,
            email: parse_email(signup.email)?,
            address: clean(signup.address),
            aadhaar_id: clean(signup.aadhaar_id),
        };

        let password_hash = hash_password(&signup.credentials.password)?;
        let seller = self
            .sellers
            .create(&new_seller, &password_hash)
            .await
            .map_err(exists_as("Seller"))?;

        tracing::info!(seller_id = %seller.id, "Seller registered");
        Ok(seller)
    }

    /// Log a seller in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone/password is wrong
    /// and `AuthError::AccountDisabled` if an admin disabled the seller.
    pub async fn login_seller(&self, credentials: &Credentials) -> Result<Seller, AuthError> {
        let phone_number = credentials.parse()?;

        let (seller, password_hash) = self
            .sellers
            .get_password_hash(&phone_number)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(&credentials.password, &password_hash)?;

        if seller.status == SellerStatus::Disabled {
            return Err(AuthError::AccountDisabled);
        }
        Ok(seller)
    }

    // =========================================================================
    // Admins
    // =========================================================================

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` when phone or password is
    /// absent and `AuthError::AccountExists` for a taken phone number.
    pub async fn create_admin(&self, signup: AdminSignup) -> Result<Admin, AuthError> {
        let phone_number = signup.credentials.parse()?;
        validate_password(&signup.credentials.password)?;
        let email = parse_email(signup.email)?;
        let name = clean(signup.name).unwrap_or_else(|| "Admin".to_owned());

        let password_hash = hash_password(&signup.credentials.password)?;
        let admin = self
            .admins
            .create(&phone_number, email.as_ref(), &name, &password_hash)
            .await
            .map_err(exists_as("Admin"))?;

        tracing::info!(admin_id = %admin.id, "Admin created");
        Ok(admin)
    }

    /// Log an admin in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone/password is wrong.
    pub async fn login_admin(&self, credentials: &Credentials) -> Result<Admin, AuthError> {
        let phone_number = credentials.parse()?;

        let (admin, password_hash) = self
            .admins
            .get_password_hash(&phone_number)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(&credentials.password, &password_hash)?;

        Ok(admin)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("chai-and-samosa").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("chai-and-samosa", &hash).is_ok());
        assert!(matches!(
            verify_password("chai-and-pakora", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "plaintext"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_credentials_require_phone_and_password() {
        let missing = Credentials {
            phone_number: "  ".to_owned(),
            password: "secret123".to_owned(),
        };
        assert!(matches!(missing.parse(), Err(AuthError::MissingCredentials)));

        let no_password = Credentials {
            phone_number: "+919876543210".to_owned(),
            password: String::new(),
        };
        assert!(matches!(
            no_password.parse(),
            Err(AuthError::MissingCredentials)
        ));

        let bad_phone = Credentials {
            phone_number: "012345".to_owned(),
            password: "secret123".to_owned(),
        };
        assert!(matches!(bad_phone.parse(), Err(AuthError::InvalidPhone(_))));
    }

    #[test]
    fn test_signup_deserializes_flat_credentials() {
        let signup: SellerSignup = serde_json::from_str(
            r#"{"phoneNumber": "+919812345678", "password": "handloom1", "name": "Ravi", "shopName": "Ravi Weaves"}"#,
        )
        .unwrap();
        assert_eq!(signup.credentials.phone_number, "+919812345678");
        assert_eq!(signup.shop_name, "Ravi Weaves");
        assert!(signup.email.is_none());
    }
}
