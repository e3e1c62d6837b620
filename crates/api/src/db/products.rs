//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use haat_core::order::Dimensions;
use haat_core::{ApprovalStatus, CategoryId, ProductId, ProductStatus, SellerId};

use super::RepositoryError;
use crate::models::{AdminProductUpdate, Product, ProductInput, ProductQuery};

/// Default page size for catalog listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

const PRODUCT_COLUMNS: &str = r"
    p.id, p.seller_id, p.category_id, p.name, p.description, p.price, p.stock,
    p.sizes, p.colors, p.material, p.gender, p.brand, p.fit, p.care_instructions,
    p.is_returnable, p.return_period, p.chest, p.length, p.sleeve, p.weight,
    p.images, p.cod_available, p.online_payment_percentage, p.status, p.approval,
    p.created_at, p.updated_at,
    COALESCE(
        (SELECT ps.status = 'enabled' FROM shop.seller ps WHERE ps.id = p.seller_id),
        FALSE
    ) AS seller_enabled
";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    seller_id: i32,
    category_id: Option<i32>,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    sizes: Vec<String>,
    colors: Vec<String>,
    material: Option<String>,
    gender: Option<String>,
    brand: Option<String>,
    fit: Option<String>,
    care_instructions: Option<String>,
    is_returnable: bool,
    return_period: i32,
    chest: Option<Decimal>,
    length: Option<Decimal>,
    sleeve: Option<Decimal>,
    weight: Option<Decimal>,
    images: Vec<String>,
    cod_available: bool,
    online_payment_percentage: i32,
    status: ProductStatus,
    approval: ApprovalStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    seller_enabled: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            seller_id: SellerId::new(row.seller_id),
            category_id: row.category_id.map(CategoryId::new),
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            sizes: row.sizes,
            colors: row.colors,
            material: row.material,
            gender: row.gender,
            brand: row.brand,
            fit: row.fit,
            care_instructions: row.care_instructions,
            is_returnable: row.is_returnable,
            return_period: row.return_period,
            dimensions: Dimensions {
                chest: row.chest,
                length: row.length,
                sleeve: row.sleeve,
            },
            weight: row.weight,
            images: row.images,
            cod_available: row.cod_available,
            online_payment_percentage: row.online_payment_percentage,
            status: row.status,
            approval: row.approval,
            created_at: row.created_at,
            updated_at: row.updated_at,
            seller_enabled: row.seller_enabled,
        }
    }
}

/// Clamp client paging input.
fn page(query: &ProductQuery) -> (i64, i64) {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Take `quantity` units of stock if that many are left.
///
/// Returns `false` without changing anything when stock is short.
pub(crate) async fn take_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.product SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Repository for product listings.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a listing for a seller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails, for example
    /// when the category does not exist.
    pub async fn create(
        &self,
        seller_id: SellerId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product AS p (
                seller_id, category_id, name, description, price, stock, sizes, colors,
                material, gender, brand, fit, care_instructions, is_returnable,
                return_period, chest, length, sleeve, weight, images, cod_available,
                online_payment_percentage
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(seller_id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.sizes)
        .bind(&input.colors)
        .bind(input.material.as_deref())
        .bind(input.gender.as_deref())
        .bind(input.brand.as_deref())
        .bind(input.fit.as_deref())
        .bind(input.care_instructions.as_deref())
        .bind(input.is_returnable)
        .bind(input.return_period)
        .bind(input.dimensions.chest)
        .bind(input.dimensions.length)
        .bind(input.dimensions.sleeve)
        .bind(input.weight)
        .bind(&input.images)
        .bind(input.cod_available)
        .bind(input.online_payment_percentage)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a product by id, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get several products by id. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Catalog for shoppers: enabled, approved listings of enabled sellers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_listed(&self, query: &ProductQuery) -> Result<Vec<Product>, RepositoryError> {
        let (limit, offset) = page(query);
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p
            JOIN shop.seller s ON s.id = p.seller_id
            WHERE p.status = 'enabled'
              AND p.approval = 'approved'
              AND s.status = 'enabled'
              AND ($1::INTEGER IS NULL OR p.category_id = $1)
              AND ($2::INTEGER IS NULL OR p.seller_id = $2)
              AND ($3::TEXT IS NULL OR p.name ILIKE $3 OR p.brand ILIKE $3
                   OR p.description ILIKE $3)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(query.category)
        .bind(query.seller)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// A seller's own listings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_seller(&self, seller_id: SellerId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p
            WHERE p.seller_id = $1
            ORDER BY p.created_at DESC, p.id DESC
            "
        ))
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Every listing, for the admin console.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p ORDER BY p.created_at DESC, p.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Replace a seller's listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist or
    /// belongs to another seller.
    pub async fn update(
        &self,
        id: ProductId,
        seller_id: SellerId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET
                category_id = $3, name = $4, description = $5, price = $6, stock = $7,
                sizes = $8, colors = $9, material = $10, gender = $11, brand = $12,
                fit = $13, care_instructions = $14, is_returnable = $15,
                return_period = $16, chest = $17, length = $18, sleeve = $19,
                weight = $20, images = $21, cod_available = $22,
                online_payment_percentage = $23, updated_at = NOW()
            WHERE p.id = $1 AND p.seller_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(seller_id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.sizes)
        .bind(&input.colors)
        .bind(input.material.as_deref())
        .bind(input.gender.as_deref())
        .bind(input.brand.as_deref())
        .bind(input.fit.as_deref())
        .bind(input.care_instructions.as_deref())
        .bind(input.is_returnable)
        .bind(input.return_period)
        .bind(input.dimensions.chest)
        .bind(input.dimensions.length)
        .bind(input.dimensions.sleeve)
        .bind(input.weight)
        .bind(&input.images)
        .bind(input.cod_available)
        .bind(input.online_payment_percentage)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Set the seller-controlled status of a listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist or
    /// belongs to another seller.
    pub async fn set_status(
        &self,
        id: ProductId,
        seller_id: SellerId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET status = $3, updated_at = NOW()
            WHERE p.id = $1 AND p.seller_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(seller_id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Apply admin moderation. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn moderate(
        &self,
        id: ProductId,
        update: &AdminProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p SET
                status = COALESCE($2, status),
                approval = COALESCE($3, approval),
                updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.status)
        .bind(update.approval)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a listing and return it. With `seller_id` set, only that
    /// seller's listing is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(
        &self,
        id: ProductId,
        seller_id: Option<SellerId>,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            DELETE FROM shop.product AS p
            WHERE p.id = $1 AND ($2::INTEGER IS NULL OR p.seller_id = $2)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(seller_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamps() {
        assert_eq!(page(&ProductQuery::default()), (DEFAULT_PAGE_SIZE, 0));

        let greedy = ProductQuery {
            limit: Some(10_000),
            offset: Some(-5),
            ..ProductQuery::default()
        };
        assert_eq!(page(&greedy), (MAX_PAGE_SIZE, 0));
    }
}
