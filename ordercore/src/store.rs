//! Store abstraction for `OrderCore`.
//!
//! These traits are the port interface between the services and a backing
//! store. They are backend-independent; the workspace ships an in-memory
//! adapter (`ordercore-memory`) and a `PostgreSQL` adapter
//! (`ordercore-postgres`).
//!
//! The two order operations that span several tables —
//! [`OrderStore::create_order`] and [`OrderStore::delete_order`] — are
//! *atomic commits*: an adapter must verify every [`StockWrite`] version
//! guard before mutating anything, and either apply the whole batch or none
//! of it. A stock adjustment must never be observable without its order, nor
//! the other way around.

use crate::catalog::{
    Category, CategoryPatch, ImagePatch, NewCategory, NewImage, NewProduct, NewReview, Product,
    ProductImage, ProductPatch, ProductReview, ReviewPatch,
};
use crate::errors::StoreResult;
use crate::ledger::{NewOrder, NewOrderItem, Order, OrderStatus};
use crate::types::{
    CategoryId, ImageId, Login, OrderId, ProductId, RecordVersion, ReviewId, Sku, StockLevel,
    Timestamp, UserId,
};
use crate::users::{NewUser, User};
use async_trait::async_trait;

/// A guarded stock mutation within an atomic order commit.
///
/// `stock` is the absolute level the product should end up at; the decision
/// that produced it was based on `expected_version`, and the write must be
/// rejected as a conflict when the product has moved on since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockWrite {
    /// The product whose stock is being adjusted.
    pub product_id: ProductId,
    /// The new absolute stock level.
    pub stock: StockLevel,
    /// The product version the new level was computed from.
    pub expected_version: RecordVersion,
}

/// Scope filter for order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderFilter {
    /// When set, only orders owned by this user are returned.
    pub owner: Option<UserId>,
}

impl OrderFilter {
    /// All orders, regardless of owner.
    pub const fn all() -> Self {
        Self { owner: None }
    }

    /// Only orders owned by `user_id`.
    pub const fn owned_by(user_id: UserId) -> Self {
        Self {
            owner: Some(user_id),
        }
    }
}

/// Persistence operations for categories, products, images and reviews.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a category and assigns its identity.
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category>;

    /// Fetches a category by id.
    async fn fetch_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    /// Lists all categories.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Replaces a category's mutable fields.
    async fn update_category(&self, id: CategoryId, patch: CategoryPatch)
        -> StoreResult<Category>;

    /// Removes a category. The caller is responsible for the products guard.
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;

    /// Inserts a product and assigns its identity and initial version.
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;

    /// Fetches a product by id, including its current record version.
    async fn fetch_product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Lists all products.
    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    /// Lists the products belonging to one category.
    async fn list_products_in_category(&self, id: CategoryId) -> StoreResult<Vec<Product>>;

    /// Replaces a product's mutable fields behind a version guard.
    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        expected_version: RecordVersion,
    ) -> StoreResult<Product>;

    /// Removes a product. The caller is responsible for the reviews/images
    /// guard; historical order items keep their snapshots.
    async fn delete_product(&self, id: ProductId) -> StoreResult<()>;

    /// Whether any product other than `exclude` already uses this SKU.
    async fn sku_taken(&self, sku: &Sku, exclude: Option<ProductId>) -> StoreResult<bool>;

    /// Inserts an image record.
    async fn insert_image(&self, image: NewImage) -> StoreResult<ProductImage>;

    /// Fetches an image record by id.
    async fn fetch_image(&self, id: ImageId) -> StoreResult<Option<ProductImage>>;

    /// Lists the images attached to a product.
    async fn list_images(&self, product_id: ProductId) -> StoreResult<Vec<ProductImage>>;

    /// Replaces an image record's mutable fields.
    async fn update_image(&self, id: ImageId, patch: ImagePatch) -> StoreResult<ProductImage>;

    /// Removes an image record.
    async fn delete_image(&self, id: ImageId) -> StoreResult<()>;

    /// Inserts a review.
    async fn insert_review(&self, review: NewReview) -> StoreResult<ProductReview>;

    /// Fetches a review by id.
    async fn fetch_review(&self, id: ReviewId) -> StoreResult<Option<ProductReview>>;

    /// Lists the reviews attached to a product.
    async fn list_reviews(&self, product_id: ProductId) -> StoreResult<Vec<ProductReview>>;

    /// Replaces a review's mutable fields and stamps `updated_at`.
    async fn update_review(
        &self,
        id: ReviewId,
        patch: ReviewPatch,
        updated_at: Timestamp,
    ) -> StoreResult<ProductReview>;

    /// Removes a review.
    async fn delete_review(&self, id: ReviewId) -> StoreResult<()>;
}

/// Persistence operations for orders and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically persists an order, its line items, and the stock
    /// decrements that reserve inventory for it.
    ///
    /// Every guard in `stock_writes` must hold or the whole commit is
    /// rejected: [`crate::errors::StoreError::VersionConflict`] when a
    /// product moved on, [`crate::errors::StoreError::ProductNotFound`] when
    /// it disappeared entirely. On success the returned order carries all
    /// generated identities.
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        stock_writes: Vec<StockWrite>,
    ) -> StoreResult<Order>;

    /// Fetches an order with its line items.
    async fn fetch_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Lists orders matching the filter, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;

    /// Sets an order's status and stamps `updated_at`.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: Timestamp,
    ) -> StoreResult<Order>;

    /// Atomically restores stock per `stock_writes` and removes the order
    /// together with its line items.
    ///
    /// Fails with [`crate::errors::StoreError::OrderNotFound`] when the
    /// order is already gone, so a duplicate delete can never restock twice.
    /// Guard semantics match [`OrderStore::create_order`].
    async fn delete_order(&self, id: OrderId, stock_writes: Vec<StockWrite>) -> StoreResult<()>;
}

/// Persistence operations for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user, enforcing login uniqueness.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    /// Fetches a user by id.
    async fn fetch_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Fetches a user by login.
    async fn fetch_user_by_login(&self, login: &Login) -> StoreResult<Option<User>>;

    /// Replaces a user's stored password hash.
    async fn update_password(&self, id: UserId, password_hash: String) -> StoreResult<()>;

    /// Counts registered users.
    async fn count_users(&self) -> StoreResult<u64>;
}
