//! `CatalogStore` implementation for `PostgreSQL`.

use crate::{
    is_unique_violation, map_sqlx_error, serialization, timestamp_from_row, version_from_i64,
    version_to_i64, PostgresStore,
};
use async_trait::async_trait;
use ordercore::catalog::{
    Category, CategoryPatch, ImagePatch, NewCategory, NewImage, NewProduct, NewReview, Product,
    ProductImage, ProductPatch, ProductReview, ReviewPatch,
};
use ordercore::errors::{StoreError, StoreResult};
use ordercore::store::CatalogStore;
use ordercore::types::{
    AuthorName, CategoryId, CategoryName, ImageId, ImageUrl, Money, ProductId, ProductName,
    Rating, RecordVersion, ReviewComment, ReviewId, Sku, StockLevel, Timestamp, UserId,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;

#[derive(Debug)]
struct CategoryRow {
    id: i64,
    name: String,
    description: Option<String>,
}

impl TryFrom<&PgRow> for CategoryRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

impl CategoryRow {
    fn into_category(self) -> StoreResult<Category> {
        Ok(Category {
            id: CategoryId::try_new(self.id).map_err(serialization)?,
            name: CategoryName::try_new(self.name).map_err(serialization)?,
            description: self.description,
        })
    }
}

#[derive(Debug)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock_quantity: i64,
    sku: String,
    category_id: i64,
    record_version: i64,
}

impl TryFrom<&PgRow> for ProductRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            stock_quantity: row.try_get("stock_quantity")?,
            sku: row.try_get("sku")?,
            category_id: row.try_get("category_id")?,
            record_version: row.try_get("record_version")?,
        })
    }
}

impl ProductRow {
    fn into_product(self) -> StoreResult<Product> {
        let stock = u32::try_from(self.stock_quantity).map_err(serialization)?;
        Ok(Product {
            id: ProductId::try_new(self.id).map_err(serialization)?,
            name: ProductName::try_new(self.name).map_err(serialization)?,
            description: self.description,
            price: Money::new(self.price).map_err(serialization)?,
            stock: StockLevel::new(stock),
            sku: Sku::try_new(self.sku).map_err(serialization)?,
            category_id: CategoryId::try_new(self.category_id).map_err(serialization)?,
            version: version_from_i64(self.record_version)?,
        })
    }
}

#[derive(Debug)]
struct ImageRow {
    id: i64,
    product_id: i64,
    url: String,
    alt_text: Option<String>,
}

impl TryFrom<&PgRow> for ImageRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            url: row.try_get("url")?,
            alt_text: row.try_get("alt_text")?,
        })
    }
}

impl ImageRow {
    fn into_image(self) -> StoreResult<ProductImage> {
        Ok(ProductImage {
            id: ImageId::try_new(self.id).map_err(serialization)?,
            product_id: ProductId::try_new(self.product_id).map_err(serialization)?,
            url: ImageUrl::try_new(self.url).map_err(serialization)?,
            alt_text: self.alt_text,
        })
    }
}

#[derive(Debug)]
struct ReviewRow {
    id: i64,
    product_id: i64,
    author_id: i64,
    author_name: String,
    rating: i16,
    comment: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<&PgRow> for ReviewRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            author_id: row.try_get("author_id")?,
            author_name: row.try_get("author_name")?,
            rating: row.try_get("rating")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl ReviewRow {
    fn into_review(self) -> StoreResult<ProductReview> {
        let rating = u8::try_from(self.rating).map_err(serialization)?;
        Ok(ProductReview {
            id: ReviewId::try_new(self.id).map_err(serialization)?,
            product_id: ProductId::try_new(self.product_id).map_err(serialization)?,
            author_id: UserId::try_new(self.author_id).map_err(serialization)?,
            author_name: AuthorName::try_new(self.author_name).map_err(serialization)?,
            rating: Rating::try_new(rating).map_err(serialization)?,
            comment: ReviewComment::try_new(self.comment).map_err(serialization)?,
            created_at: timestamp_from_row(self.created_at),
            updated_at: self.updated_at.map(timestamp_from_row),
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock_quantity, sku, category_id, record_version";

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(name = "postgres.insert_category", skip(self, category))]
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(category.name.as_ref())
        .bind(category.description.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        Ok(Category {
            id: CategoryId::try_new(id).map_err(serialization)?,
            name: category.name,
            description: category.description,
        })
    }

    async fn fetch_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(i64::from(id))
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        row.map(|row| {
            CategoryRow::try_from(&row)
                .map_err(serialization)
                .and_then(CategoryRow::into_category)
        })
        .transpose()
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        rows.iter()
            .map(|row| {
                CategoryRow::try_from(row)
                    .map_err(serialization)
                    .and_then(CategoryRow::into_category)
            })
            .collect()
    }

    #[instrument(name = "postgres.update_category", skip(self, patch))]
    async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> StoreResult<Category> {
        let result =
            sqlx::query("UPDATE categories SET name = $1, description = $2 WHERE id = $3")
                .bind(patch.name.as_ref())
                .bind(patch.description.as_deref())
                .bind(i64::from(id))
                .execute(self.pool())
                .await
                .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CategoryNotFound(id));
        }
        Ok(Category {
            id,
            name: patch.name,
            description: patch.description,
        })
    }

    #[instrument(name = "postgres.delete_category", skip(self))]
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CategoryNotFound(id));
        }
        Ok(())
    }

    #[instrument(name = "postgres.insert_product", skip(self, product))]
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (name, description, price, stock_quantity, sku, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(product.name.as_ref())
        .bind(product.description.as_deref())
        .bind(product.price.amount())
        .bind(i64::from(product.stock.value()))
        .bind(product.sku.as_ref())
        .bind(i64::from(product.category_id))
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateSku(product.sku.clone())
            } else {
                map_sqlx_error(&e)
            }
        })?;

        Ok(Product {
            id: ProductId::try_new(id).map_err(serialization)?,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            sku: product.sku,
            category_id: product.category_id,
            version: RecordVersion::initial(),
        })
    }

    async fn fetch_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(i64::from(id))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        row.map(|row| {
            ProductRow::try_from(&row)
                .map_err(serialization)
                .and_then(ProductRow::into_product)
        })
        .transpose()
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        rows.iter()
            .map(|row| {
                ProductRow::try_from(row)
                    .map_err(serialization)
                    .and_then(ProductRow::into_product)
            })
            .collect()
    }

    async fn list_products_in_category(&self, id: CategoryId) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = $1 ORDER BY id"
        ))
        .bind(i64::from(id))
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        rows.iter()
            .map(|row| {
                ProductRow::try_from(row)
                    .map_err(serialization)
                    .and_then(ProductRow::into_product)
            })
            .collect()
    }

    #[instrument(name = "postgres.update_product", skip(self, patch))]
    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        expected_version: RecordVersion,
    ) -> StoreResult<Product> {
        let result = sqlx::query(
            "UPDATE products \
             SET name = $1, description = $2, price = $3, stock_quantity = $4, sku = $5, \
                 category_id = $6, record_version = record_version + 1 \
             WHERE id = $7 AND record_version = $8",
        )
        .bind(patch.name.as_ref())
        .bind(patch.description.as_deref())
        .bind(patch.price.amount())
        .bind(i64::from(patch.stock.value()))
        .bind(patch.sku.as_ref())
        .bind(i64::from(patch.category_id))
        .bind(i64::from(id))
        .bind(version_to_i64(expected_version))
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateSku(patch.sku.clone())
            } else {
                map_sqlx_error(&e)
            }
        })?;

        if result.rows_affected() == 0 {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT record_version FROM products WHERE id = $1")
                    .bind(i64::from(id))
                    .fetch_optional(self.pool())
                    .await
                    .map_err(|e| map_sqlx_error(&e))?;
            return Err(match current {
                None => StoreError::ProductNotFound(id),
                Some(raw) => StoreError::VersionConflict {
                    entity: "product",
                    id: i64::from(id),
                    expected: expected_version,
                    current: version_from_i64(raw)?,
                },
            });
        }

        self.fetch_product(id)
            .await?
            .ok_or(StoreError::ProductNotFound(id))
    }

    #[instrument(name = "postgres.delete_product", skip(self))]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }

    async fn sku_taken(&self, sku: &Sku, exclude: Option<ProductId>) -> StoreResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                SELECT 1 FROM products \
                WHERE sku = $1 AND ($2::BIGINT IS NULL OR id <> $2) \
             )",
        )
        .bind(sku.as_ref())
        .bind(exclude.map(i64::from))
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;
        Ok(taken)
    }

    #[instrument(name = "postgres.insert_image", skip(self, image))]
    async fn insert_image(&self, image: NewImage) -> StoreResult<ProductImage> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO product_images (product_id, url, alt_text) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(i64::from(image.product_id))
        .bind(image.url.as_ref())
        .bind(image.alt_text.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        Ok(ProductImage {
            id: ImageId::try_new(id).map_err(serialization)?,
            product_id: image.product_id,
            url: image.url,
            alt_text: image.alt_text,
        })
    }

    async fn fetch_image(&self, id: ImageId) -> StoreResult<Option<ProductImage>> {
        let row =
            sqlx::query("SELECT id, product_id, url, alt_text FROM product_images WHERE id = $1")
                .bind(i64::from(id))
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error(&e))?;

        row.map(|row| {
            ImageRow::try_from(&row)
                .map_err(serialization)
                .and_then(ImageRow::into_image)
        })
        .transpose()
    }

    async fn list_images(&self, product_id: ProductId) -> StoreResult<Vec<ProductImage>> {
        let rows = sqlx::query(
            "SELECT id, product_id, url, alt_text FROM product_images \
             WHERE product_id = $1 ORDER BY id",
        )
        .bind(i64::from(product_id))
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        rows.iter()
            .map(|row| {
                ImageRow::try_from(row)
                    .map_err(serialization)
                    .and_then(ImageRow::into_image)
            })
            .collect()
    }

    #[instrument(name = "postgres.update_image", skip(self, patch))]
    async fn update_image(&self, id: ImageId, patch: ImagePatch) -> StoreResult<ProductImage> {
        let result = sqlx::query("UPDATE product_images SET url = $1, alt_text = $2 WHERE id = $3")
            .bind(patch.url.as_ref())
            .bind(patch.alt_text.as_deref())
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ImageNotFound(id));
        }
        self.fetch_image(id)
            .await?
            .ok_or(StoreError::ImageNotFound(id))
    }

    #[instrument(name = "postgres.delete_image", skip(self))]
    async fn delete_image(&self, id: ImageId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM product_images WHERE id = $1")
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ImageNotFound(id));
        }
        Ok(())
    }

    #[instrument(name = "postgres.insert_review", skip(self, review))]
    async fn insert_review(&self, review: NewReview) -> StoreResult<ProductReview> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO product_reviews \
             (product_id, author_id, author_name, rating, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(i64::from(review.product_id))
        .bind(i64::from(review.author_id))
        .bind(review.author_name.as_ref())
        .bind(i16::from(u8::from(review.rating)))
        .bind(review.comment.as_ref())
        .bind(*review.created_at.as_datetime())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        Ok(ProductReview {
            id: ReviewId::try_new(id).map_err(serialization)?,
            product_id: review.product_id,
            author_id: review.author_id,
            author_name: review.author_name,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: None,
        })
    }

    async fn fetch_review(&self, id: ReviewId) -> StoreResult<Option<ProductReview>> {
        let row = sqlx::query(
            "SELECT id, product_id, author_id, author_name, rating, comment, created_at, \
             updated_at FROM product_reviews WHERE id = $1",
        )
        .bind(i64::from(id))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        row.map(|row| {
            ReviewRow::try_from(&row)
                .map_err(serialization)
                .and_then(ReviewRow::into_review)
        })
        .transpose()
    }

    async fn list_reviews(&self, product_id: ProductId) -> StoreResult<Vec<ProductReview>> {
        let rows = sqlx::query(
            "SELECT id, product_id, author_id, author_name, rating, comment, created_at, \
             updated_at FROM product_reviews WHERE product_id = $1 ORDER BY id",
        )
        .bind(i64::from(product_id))
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        rows.iter()
            .map(|row| {
                ReviewRow::try_from(row)
                    .map_err(serialization)
                    .and_then(ReviewRow::into_review)
            })
            .collect()
    }

    #[instrument(name = "postgres.update_review", skip(self, patch))]
    async fn update_review(
        &self,
        id: ReviewId,
        patch: ReviewPatch,
        updated_at: Timestamp,
    ) -> StoreResult<ProductReview> {
        let result = sqlx::query(
            "UPDATE product_reviews SET rating = $1, comment = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(i16::from(u8::from(patch.rating)))
        .bind(patch.comment.as_ref())
        .bind(*updated_at.as_datetime())
        .bind(i64::from(id))
        .execute(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ReviewNotFound(id));
        }
        self.fetch_review(id)
            .await?
            .ok_or(StoreError::ReviewNotFound(id))
    }

    #[instrument(name = "postgres.delete_review", skip(self))]
    async fn delete_review(&self, id: ReviewId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM product_reviews WHERE id = $1")
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ReviewNotFound(id));
        }
        Ok(())
    }
}
