//! Seller repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use haat_core::{Email, PhoneNumber, SellerId, SellerStatus};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{BankAccount, NewSeller, PaymentDetails, Seller, SellerUpdate};

const SELLER_COLUMNS: &str = r"
    id, name, shop_name, phone_number, email, address, profile_picture,
    payment_id, aadhaar_id, bank_account_number, ifsc_code, account_holder_name,
    upi_id, razorpay_account_id, status, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct SellerRow {
    id: i32,
    name: String,
    shop_name: String,
    phone_number: String,
    email: Option<String>,
    address: Option<String>,
    profile_picture: Option<String>,
    payment_id: Option<String>,
    aadhaar_id: Option<String>,
    bank_account_number: Option<String>,
    ifsc_code: Option<String>,
    account_holder_name: Option<String>,
    upi_id: Option<String>,
    razorpay_account_id: Option<String>,
    status: SellerStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SellerWithHashRow {
    #[sqlx(flatten)]
    seller: SellerRow,
    password_hash: String,
}

impl TryFrom<SellerRow> for Seller {
    type Error = RepositoryError;

    fn try_from(row: SellerRow) -> Result<Self, Self::Error> {
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
            id: SellerId::new(row.id),
            name: row.name,
            shop_name: row.shop_name,
            phone_number,
            email,
            address: row.address,
            profile_picture: row.profile_picture,
            payment_id: row.payment_id,
            aadhaar_id: row.aadhaar_id,
            payment_details: PaymentDetails {
                bank_account: BankAccount {
                    account_number: row.bank_account_number,
                    ifsc_code: row.ifsc_code,
                    account_holder_name: row.account_holder_name,
                },
                upi_id: row.upi_id,
                razorpay_account_id: row.razorpay_account_id,
            },
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for seller database operations.
pub struct SellerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SellerRepository<'a> {
    /// Create a new seller repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a seller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number or email is taken.
    pub async fn create(
        &self,
        new_seller: &NewSeller,
        password_hash: &str,
    ) -> Result<Seller, RepositoryError> {
        let row = sqlx::query_as::<_, SellerRow>(&format!(
            r"
            INSERT INTO shop.seller
                (name, shop_name, phone_number, email, address, aadhaar_id, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SELLER_COLUMNS}
            "
        ))
        .bind(&new_seller.name)
        .bind(&new_seller.shop_name)
        .bind(&new_seller.phone_number)
        .bind(new_seller.email.as_ref())
        .bind(new_seller.address.as_deref())
        .bind(new_seller.aadhaar_id.as_deref())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("phone number or email already registered"))?;

        row.try_into()
    }

    /// Get a seller by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: SellerId) -> Result<Option<Seller>, RepositoryError> {
        let row = sqlx::query_as::<_, SellerRow>(&format!(
            "SELECT {SELLER_COLUMNS} FROM shop.seller WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Seller::try_from).transpose()
    }

    /// Get a seller and their password hash by phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        phone_number: &PhoneNumber,
    ) -> Result<Option<(Seller, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, SellerWithHashRow>(&format!(
            "SELECT {SELLER_COLUMNS}, password_hash FROM shop.seller WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((Seller::try_from(r.seller)?, r.password_hash)))
            .transpose()
    }

    /// All sellers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Seller>, RepositoryError> {
        let rows = sqlx::query_as::<_, SellerRow>(&format!(
            "SELECT {SELLER_COLUMNS} FROM shop.seller ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Seller::try_from).collect()
    }

    /// Apply a partial profile update. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the seller does not exist and
    /// `RepositoryError::Conflict` if the new email is taken.
    pub async fn update(
        &self,
        id: SellerId,
        update: &SellerUpdate,
    ) -> Result<Seller, RepositoryError> {
        let payment = update.payment_details.as_ref();
        let bank = payment.map(|p| &p.bank_account);

        let row = sqlx::query_as::<_, SellerRow>(&format!(
            r"
            UPDATE shop.seller SET
                name = COALESCE($2, name),
                shop_name = COALESCE($3, shop_name),
                email = COALESCE($4, email),
                address = COALESCE($5, address),
                profile_picture = COALESCE($6, profile_picture),
                payment_id = COALESCE($7, payment_id),
                aadhaar_id = COALESCE($8, aadhaar_id),
                bank_account_number = CASE WHEN $9 THEN $10 ELSE bank_account_number END,
                ifsc_code = CASE WHEN $9 THEN $11 ELSE ifsc_code END,
                account_holder_name = CASE WHEN $9 THEN $12 ELSE account_holder_name END,
                upi_id = CASE WHEN $9 THEN $13 ELSE upi_id END,
                razorpay_account_id = CASE WHEN $9 THEN $14 ELSE razorpay_account_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SELLER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.shop_name.as_deref())
        .bind(update.email.as_ref())
        .bind(update.address.as_deref())
        .bind(update.profile_picture.as_deref())
        .bind(update.payment_id.as_deref())
        .bind(update.aadhaar_id.as_deref())
        .bind(payment.is_some())
        .bind(bank.and_then(|b| b.account_number.as_deref()))
        .bind(bank.and_then(|b| b.ifsc_code.as_deref()))
        .bind(bank.and_then(|b| b.account_holder_name.as_deref()))
        .bind(payment.and_then(|p| p.upi_id.as_deref()))
        .bind(payment.and_then(|p| p.razorpay_account_id.as_deref()))
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("email already in use"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Enable or disable a seller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the seller does not exist.
    pub async fn set_status(
        &self,
        id: SellerId,
        status: SellerStatus,
    ) -> Result<Seller, RepositoryError> {
        let row = sqlx::query_as::<_, SellerRow>(&format!(
            r"
            UPDATE shop.seller SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {SELLER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a seller. Their products and orders go with them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: SellerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.seller WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
