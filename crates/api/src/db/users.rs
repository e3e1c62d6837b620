//! Shopper repository.
//!
//! Covers the `shop.user` row, its addresses, and the three per-user lists.
//! A list is always written back whole: the rows for the user are deleted and
//! the current list is inserted again inside one transaction, so list order
//! and the one-row-per-key rule come from the domain type.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use haat_core::cart::{CartLine, LineKey, LineList, ListKind, Wishlist, WishlistEntry};
use haat_core::{CategoryId, Email, PhoneNumber, ProductId, Role, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Address, BankAccount, NewUser, PaymentDetails, Preferences, User};

const USER_COLUMNS: &str = r"
    id, phone_number, email, first_name, last_name, date_of_birth, role,
    profile_picture, bio, notifications_enabled, preferred_categories,
    recent_searches, bank_account_number, ifsc_code, account_holder_name,
    upi_id, razorpay_account_id, last_login, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    phone_number: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    date_of_birth: Option<NaiveDate>,
    role: Role,
    profile_picture: Option<String>,
    bio: Option<String>,
    notifications_enabled: bool,
    preferred_categories: Vec<i32>,
    recent_searches: Vec<String>,
    bank_account_number: Option<String>,
    ifsc_code: Option<String>,
    account_holder_name: Option<String>,
    upi_id: Option<String>,
    razorpay_account_id: Option<String>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl UserRow {
    fn into_user(self, addresses: Vec<Address>) -> Result<User, RepositoryError> {
        let phone_number = PhoneNumber::parse(&self.phone_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone number in database: {e}"))
        })?;
        let email = self
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(User {
            id: UserId::new(self.id),
            phone_number,
            email,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            role: self.role,
            profile_picture: self.profile_picture,
            bio: self.bio,
            preferences: Preferences {
                notifications: self.notifications_enabled,
                categories: self
                    .preferred_categories
                    .into_iter()
                    .map(CategoryId::new)
                    .collect(),
            },
            recent_searches: self.recent_searches,
            addresses,
            payment_details: PaymentDetails {
                bank_account: BankAccount {
                    account_number: self.bank_account_number,
                    ifsc_code: self.ifsc_code,
                    account_holder_name: self.account_holder_name,
                },
                upi_id: self.upi_id,
                razorpay_account_id: self.razorpay_account_id,
            },
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    user_id: i32,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: String,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            street: row.street,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    product_id: i32,
    size: String,
    color: String,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl From<LineRow> for CartLine {
    fn from(row: LineRow) -> Self {
        Self {
            key: LineKey {
                product_id: ProductId::new(row.product_id),
                size: row.size,
                color: row.color,
            },
            quantity: row.quantity,
            added_at: row.added_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WishlistRow {
    product_id: i32,
    added_at: DateTime<Utc>,
}

const fn lines_table(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Cart => "shop.cart_item",
        ListKind::SavedForLater => "shop.saved_item",
    }
}

/// Rewrite one of a user's line lists on an open connection.
///
/// Used directly by checkout, which clears the cart in the same transaction
/// that creates the orders.
pub(crate) async fn write_lines(
    conn: &mut PgConnection,
    user_id: UserId,
    kind: ListKind,
    list: &LineList,
) -> Result<(), RepositoryError> {
    let table = lines_table(kind);
    sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if list.is_empty() {
        return Ok(());
    }

    let lines = list.lines();
    let product_ids: Vec<i32> = lines.iter().map(|l| l.key.product_id.as_i32()).collect();
    let sizes: Vec<String> = lines.iter().map(|l| l.key.size.clone()).collect();
    let colors: Vec<String> = lines.iter().map(|l| l.key.color.clone()).collect();
    let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
    let added: Vec<DateTime<Utc>> = lines.iter().map(|l| l.added_at).collect();

    sqlx::query(&format!(
        r"
        INSERT INTO {table} (user_id, product_id, size, color, quantity, position, added_at)
        SELECT $1, t.product_id, t.size, t.color, t.quantity, t.position - 1, t.added_at
        FROM UNNEST($2::INTEGER[], $3::TEXT[], $4::TEXT[], $5::INTEGER[], $6::TIMESTAMPTZ[])
             WITH ORDINALITY AS t(product_id, size, color, quantity, added_at, position)
        "
    ))
    .bind(user_id)
    .bind(&product_ids)
    .bind(&sizes)
    .bind(&colors)
    .bind(&quantities)
    .bind(&added)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Repository for shopper database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn addresses_for(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT user_id, street, city, state, postal_code, country
            FROM shop.user_address
            WHERE user_id = $1
            ORDER BY position
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// Create a shopper.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number or email is taken.
    pub async fn create(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO shop.user (phone_number, email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&new_user.phone_number)
        .bind(new_user.email.as_ref())
        .bind(new_user.first_name.as_deref())
        .bind(new_user.last_name.as_deref())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("phone number or email already registered"))?;

        row.into_user(Vec::new())
    }

    /// Get a shopper by id, with addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => {
                let addresses = self.addresses_for(id).await?;
                row.into_user(addresses).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Get a shopper and their password hash by phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        phone_number: &PhoneNumber,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let addresses = self.addresses_for(UserId::new(row.user.id)).await?;
        Ok(Some((row.user.into_user(addresses)?, row.password_hash)))
    }

    /// Stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.user SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// All shoppers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        let address_rows = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT user_id, street, city, state, postal_code, country
            FROM shop.user_address
            ORDER BY user_id, position
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let mut addresses: std::collections::HashMap<i32, Vec<Address>> =
            std::collections::HashMap::new();
        for row in address_rows {
            addresses.entry(row.user_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let own = addresses.remove(&row.id).unwrap_or_default();
                row.into_user(own)
            })
            .collect()
    }

    /// Write every profile field of `user`, replacing its addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user no longer exists and
    /// `RepositoryError::Conflict` if the phone number or email is taken.
    pub async fn save_profile(&self, user: &User) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let categories: Vec<i32> = user
            .preferences
            .categories
            .iter()
            .map(CategoryId::as_i32)
            .collect();
        let bank = &user.payment_details.bank_account;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.user SET
                phone_number = $2, email = $3, first_name = $4, last_name = $5,
                date_of_birth = $6, profile_picture = $7, bio = $8,
                notifications_enabled = $9, preferred_categories = $10,
                recent_searches = $11, bank_account_number = $12, ifsc_code = $13,
                account_holder_name = $14, upi_id = $15, razorpay_account_id = $16,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(&user.phone_number)
        .bind(user.email.as_ref())
        .bind(user.first_name.as_deref())
        .bind(user.last_name.as_deref())
        .bind(user.date_of_birth)
        .bind(user.profile_picture.as_deref())
        .bind(user.bio.as_deref())
        .bind(user.preferences.notifications)
        .bind(&categories)
        .bind(&user.recent_searches)
        .bind(bank.account_number.as_deref())
        .bind(bank.ifsc_code.as_deref())
        .bind(bank.account_holder_name.as_deref())
        .bind(user.payment_details.upi_id.as_deref())
        .bind(user.payment_details.razorpay_account_id.as_deref())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conflict_on_unique("phone number or email already in use"))?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM shop.user_address WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        for (position, address) in (0_i32..).zip(&user.addresses) {
            sqlx::query(
                r"
                INSERT INTO shop.user_address
                    (user_id, position, street, city, state, postal_code, country)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(user.id)
            .bind(position)
            .bind(address.street.as_deref())
            .bind(address.city.as_deref())
            .bind(address.state.as_deref())
            .bind(address.postal_code.as_deref())
            .bind(&address.country)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        row.into_user(user.addresses.clone())
    }

    /// Delete a shopper. Their lists and orders go with them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Cart and saved-for-later
    // =========================================================================

    /// Load the cart or the saved-for-later list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load_lines(
        &self,
        user_id: UserId,
        kind: ListKind,
    ) -> Result<LineList, RepositoryError> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            r"
            SELECT product_id, size, color, quantity, added_at
            FROM {}
            WHERE user_id = $1
            ORDER BY position
            ",
            lines_table(kind)
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(LineList::from_lines(rows.into_iter().map(CartLine::from)))
    }

    /// Persist the cart or the saved-for-later list in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails, for example
    /// when a line references a deleted product.
    pub async fn save_lines(
        &self,
        user_id: UserId,
        kind: ListKind,
        list: &LineList,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        write_lines(&mut *tx, user_id, kind, list).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist both lists together, for moves between them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either write fails.
    pub async fn save_cart_and_saved(
        &self,
        user_id: UserId,
        cart: &LineList,
        saved: &LineList,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        write_lines(&mut *tx, user_id, ListKind::Cart, cart).await?;
        write_lines(&mut *tx, user_id, ListKind::SavedForLater, saved).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Load the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load_wishlist(&self, user_id: UserId) -> Result<Wishlist, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(
            r"
            SELECT product_id, added_at
            FROM shop.wishlist_item
            WHERE user_id = $1
            ORDER BY position
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(Wishlist::from_entries(rows.into_iter().map(|r| {
            WishlistEntry {
                product_id: ProductId::new(r.product_id),
                added_at: r.added_at,
            }
        })))
    }

    /// Persist the wishlist in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn save_wishlist(
        &self,
        user_id: UserId,
        wishlist: &Wishlist,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM shop.wishlist_item WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !wishlist.is_empty() {
            let product_ids: Vec<i32> = wishlist
                .entries()
                .iter()
                .map(|e| e.product_id.as_i32())
                .collect();
            let added: Vec<DateTime<Utc>> = wishlist.entries().iter().map(|e| e.added_at).collect();

            sqlx::query(
                r"
                INSERT INTO shop.wishlist_item (user_id, product_id, position, added_at)
                SELECT $1, t.product_id, t.position - 1, t.added_at
                FROM UNNEST($2::INTEGER[], $3::TIMESTAMPTZ[])
                     WITH ORDINALITY AS t(product_id, added_at, position)
                ",
            )
            .bind(user_id)
            .bind(&product_ids)
            .bind(&added)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
