//! Catalog entities and their CRUD service: categories, products, images
//! and reviews.
//!
//! This is deliberately conventional data access. The only rules enforced
//! here beyond referential checks are the delete guards (a category with
//! products, or a product with reviews/images, cannot be removed) and SKU
//! uniqueness. Stock edits through [`CatalogService::update_product`] are
//! version-guarded like every other product write, so a catalog edit racing
//! an order placement surfaces as a conflict instead of silently clobbering
//! a reservation.

use crate::access::{require_admin, Principal};
use crate::errors::{ServiceError, ServiceResult};
use crate::store::CatalogStore;
use crate::types::{
    AuthorName, CategoryId, CategoryName, ImageId, ImageUrl, Money, ProductId, ProductName,
    Rating, RecordVersion, ReviewComment, ReviewId, Sku, StockLevel, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identity assigned by the store.
    pub id: CategoryId,
    /// Category name.
    pub name: CategoryName,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// Fields for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    /// Category name.
    pub name: CategoryName,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// Replacement fields for an existing category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    /// New name.
    pub name: CategoryName,
    /// New description.
    pub description: Option<String>,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Identity assigned by the store.
    pub id: ProductId,
    /// Product name.
    pub name: ProductName,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Current unit price.
    pub price: Money,
    /// Units available in the warehouse. Never negative.
    pub stock: StockLevel,
    /// Unique stock keeping unit.
    pub sku: Sku,
    /// Owning category.
    pub category_id: CategoryId,
    /// Optimistic concurrency version.
    pub version: RecordVersion,
}

/// Fields for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    /// Product name.
    pub name: ProductName,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Unit price.
    pub price: Money,
    /// Initial stock level.
    pub stock: StockLevel,
    /// Unique stock keeping unit.
    pub sku: Sku,
    /// Owning category.
    pub category_id: CategoryId,
}

/// Replacement fields for an existing product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    /// New name.
    pub name: ProductName,
    /// New description.
    pub description: Option<String>,
    /// New unit price.
    pub price: Money,
    /// New stock level (explicit warehouse correction).
    pub stock: StockLevel,
    /// New SKU.
    pub sku: Sku,
    /// New owning category.
    pub category_id: CategoryId,
}

/// An image attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Identity assigned by the store.
    pub id: ImageId,
    /// Owning product.
    pub product_id: ProductId,
    /// Location of the stored file.
    pub url: ImageUrl,
    /// Optional alternative text.
    pub alt_text: Option<String>,
}

/// Fields for attaching an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImage {
    /// Owning product.
    pub product_id: ProductId,
    /// Location of the stored file.
    pub url: ImageUrl,
    /// Optional alternative text.
    pub alt_text: Option<String>,
}

/// Replacement fields for an existing image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePatch {
    /// New location.
    pub url: ImageUrl,
    /// New alternative text.
    pub alt_text: Option<String>,
}

/// A review attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReview {
    /// Identity assigned by the store.
    pub id: ReviewId,
    /// Owning product.
    pub product_id: ProductId,
    /// The user who wrote the review.
    pub author_id: UserId,
    /// Display name of the author.
    pub author_name: AuthorName,
    /// Star rating, 1 through 5.
    pub rating: Rating,
    /// Review body.
    pub comment: ReviewComment,
    /// When the review was created.
    pub created_at: Timestamp,
    /// When the review was last edited, if ever.
    pub updated_at: Option<Timestamp>,
}

/// Fields for creating a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    /// Owning product.
    pub product_id: ProductId,
    /// The user who wrote the review.
    pub author_id: UserId,
    /// Display name of the author.
    pub author_name: AuthorName,
    /// Star rating.
    pub rating: Rating,
    /// Review body.
    pub comment: ReviewComment,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// Replacement fields for an existing review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPatch {
    /// New rating.
    pub rating: Rating,
    /// New body.
    pub comment: ReviewComment,
}

/// Content of a review as submitted by a caller; the author identity is
/// taken from the principal, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    /// Display name of the author.
    pub author_name: AuthorName,
    /// Star rating.
    pub rating: Rating,
    /// Review body.
    pub comment: ReviewComment,
}

/// CRUD service over the catalog store.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S> CatalogService<S>
where
    S: CatalogStore,
{
    /// Creates the service over a catalog store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    // Categories

    /// Creates a category. Admin only.
    #[instrument(skip(self, category))]
    pub async fn create_category(
        &self,
        principal: &Principal,
        category: NewCategory,
    ) -> ServiceResult<Category> {
        require_admin(principal)?;
        Ok(self.store.insert_category(category).await?)
    }

    /// Lists all categories.
    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    /// Fetches one category.
    pub async fn get_category(&self, id: CategoryId) -> ServiceResult<Category> {
        self.store
            .fetch_category(id)
            .await?
            .ok_or(ServiceError::CategoryNotFound(id))
    }

    /// Lists the products belonging to one category.
    pub async fn products_in_category(&self, id: CategoryId) -> ServiceResult<Vec<Product>> {
        self.get_category(id).await?;
        Ok(self.store.list_products_in_category(id).await?)
    }

    /// Replaces a category's fields. Admin only.
    #[instrument(skip(self, patch))]
    pub async fn update_category(
        &self,
        principal: &Principal,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> ServiceResult<Category> {
        require_admin(principal)?;
        Ok(self.store.update_category(id, patch).await?)
    }

    /// Deletes a category. Admin only; rejected while products reference it.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, principal: &Principal, id: CategoryId) -> ServiceResult<()> {
        require_admin(principal)?;
        self.get_category(id).await?;
        if !self.store.list_products_in_category(id).await?.is_empty() {
            return Err(ServiceError::CategoryInUse(id));
        }
        Ok(self.store.delete_category(id).await?)
    }

    // Products

    /// Creates a product. Admin only; the category must exist and the SKU
    /// must be free.
    #[instrument(skip(self, product))]
    pub async fn create_product(
        &self,
        principal: &Principal,
        product: NewProduct,
    ) -> ServiceResult<Product> {
        require_admin(principal)?;
        if self
            .store
            .fetch_category(product.category_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::CategoryNotFound(product.category_id));
        }
        if self.store.sku_taken(&product.sku, None).await? {
            return Err(ServiceError::DuplicateSku(product.sku));
        }
        Ok(self.store.insert_product(product).await?)
    }

    /// Lists all products.
    pub async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }

    /// Fetches one product.
    pub async fn get_product(&self, id: ProductId) -> ServiceResult<Product> {
        self.store
            .fetch_product(id)
            .await?
            .ok_or(ServiceError::ProductNotFound(id))
    }

    /// Replaces a product's fields. Admin only.
    ///
    /// The write is guarded by the version read here; if an order placement
    /// adjusts the product in between, the edit surfaces as a conflict for
    /// the caller to retry rather than overwriting the reservation.
    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        principal: &Principal,
        id: ProductId,
        patch: ProductPatch,
    ) -> ServiceResult<Product> {
        require_admin(principal)?;
        let current = self.get_product(id).await?;
        if self
            .store
            .fetch_category(patch.category_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::CategoryNotFound(patch.category_id));
        }
        if patch.sku != current.sku && self.store.sku_taken(&patch.sku, Some(id)).await? {
            return Err(ServiceError::DuplicateSku(patch.sku));
        }
        Ok(self
            .store
            .update_product(id, patch, current.version)
            .await?)
    }

    /// Deletes a product. Admin only; rejected while reviews or images are
    /// attached. Historical order items keep their snapshots.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, principal: &Principal, id: ProductId) -> ServiceResult<()> {
        require_admin(principal)?;
        self.get_product(id).await?;
        if !self.store.list_reviews(id).await?.is_empty()
            || !self.store.list_images(id).await?.is_empty()
        {
            return Err(ServiceError::ProductInUse(id));
        }
        Ok(self.store.delete_product(id).await?)
    }

    // Images

    /// Attaches an image to a product. Admin only.
    #[instrument(skip(self, image))]
    pub async fn add_image(
        &self,
        principal: &Principal,
        image: NewImage,
    ) -> ServiceResult<ProductImage> {
        require_admin(principal)?;
        self.get_product(image.product_id).await?;
        Ok(self.store.insert_image(image).await?)
    }

    /// Lists a product's images.
    pub async fn list_images(&self, product_id: ProductId) -> ServiceResult<Vec<ProductImage>> {
        self.get_product(product_id).await?;
        Ok(self.store.list_images(product_id).await?)
    }

    /// Fetches one image of a product.
    pub async fn get_image(&self, product_id: ProductId, id: ImageId) -> ServiceResult<ProductImage> {
        self.get_product(product_id).await?;
        let image = self
            .store
            .fetch_image(id)
            .await?
            .filter(|image| image.product_id == product_id);
        image.ok_or(ServiceError::ImageNotFound(id))
    }

    /// Replaces an image's fields. Admin only.
    #[instrument(skip(self, patch))]
    pub async fn update_image(
        &self,
        principal: &Principal,
        product_id: ProductId,
        id: ImageId,
        patch: ImagePatch,
    ) -> ServiceResult<ProductImage> {
        require_admin(principal)?;
        self.get_image(product_id, id).await?;
        Ok(self.store.update_image(id, patch).await?)
    }

    /// Detaches and removes an image. Admin only.
    #[instrument(skip(self))]
    pub async fn remove_image(
        &self,
        principal: &Principal,
        product_id: ProductId,
        id: ImageId,
    ) -> ServiceResult<()> {
        require_admin(principal)?;
        self.get_image(product_id, id).await?;
        Ok(self.store.delete_image(id).await?)
    }

    // Reviews

    /// Adds a review to a product on behalf of the calling user.
    #[instrument(skip(self, draft))]
    pub async fn add_review(
        &self,
        principal: &Principal,
        product_id: ProductId,
        draft: ReviewDraft,
    ) -> ServiceResult<ProductReview> {
        self.get_product(product_id).await?;
        let review = NewReview {
            product_id,
            author_id: principal.user_id,
            author_name: draft.author_name,
            rating: draft.rating,
            comment: draft.comment,
            created_at: Timestamp::now(),
        };
        Ok(self.store.insert_review(review).await?)
    }

    /// Lists a product's reviews.
    pub async fn list_reviews(&self, product_id: ProductId) -> ServiceResult<Vec<ProductReview>> {
        self.get_product(product_id).await?;
        Ok(self.store.list_reviews(product_id).await?)
    }

    /// Fetches one review of a product.
    pub async fn get_review(
        &self,
        product_id: ProductId,
        id: ReviewId,
    ) -> ServiceResult<ProductReview> {
        self.get_product(product_id).await?;
        let review = self
            .store
            .fetch_review(id)
            .await?
            .filter(|review| review.product_id == product_id);
        review.ok_or(ServiceError::ReviewNotFound(id))
    }

    /// Replaces a review's rating and body.
    ///
    /// Any authenticated user may edit reviews; there is no ownership check.
    #[instrument(skip(self, patch), fields(user = %principal.user_id))]
    pub async fn update_review(
        &self,
        principal: &Principal,
        product_id: ProductId,
        id: ReviewId,
        patch: ReviewPatch,
    ) -> ServiceResult<ProductReview> {
        self.get_review(product_id, id).await?;
        Ok(self
            .store
            .update_review(id, patch, Timestamp::now())
            .await?)
    }

    /// Removes a review.
    #[instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn remove_review(
        &self,
        principal: &Principal,
        product_id: ProductId,
        id: ReviewId,
    ) -> ServiceResult<()> {
        self.get_review(product_id, id).await?;
        Ok(self.store.delete_review(id).await?)
    }
}
