//! Error types for `OrderCore`.
//!
//! Two layers, mirroring the service/store split:
//!
//! - [`ServiceError`]: business-level failures surfaced to callers. Each
//!   variant is distinct and user-actionable; none is silently swallowed or
//!   retried on the caller's behalf (conflict retries inside the order
//!   ledger are bounded and still surface [`ServiceError::Conflict`] when
//!   exhausted).
//! - [`StoreError`]: persistence-level failures reported by store adapters.
//!
//! Validation failures are rare at these layers because inputs are parsed
//! into validated domain types at construction time; the `Validation`
//! variant exists for the few structural checks that span values (for
//! example, an empty order line list).

use crate::types::{
    AuthorNameError, CategoryId, CategoryNameError, CustomerNameError, CustomerPhoneError,
    DeliveryAddressError, ImageId, ImageUrlError, Login, LoginError, MoneyError, OrderId,
    ProductId, ProductName, ProductNameError, QuantityError, RatingError, RecordVersion,
    ReviewCommentError, ReviewId, Sku, SkuError, StockLevel, UserId, UsernameError,
};
use thiserror::Error;

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Business-level failures surfaced by the services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request was structurally invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced category does not exist.
    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// The referenced product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The referenced order does not exist.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The referenced user does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The referenced product image does not exist.
    #[error("image {0} not found")]
    ImageNotFound(ImageId),

    /// The referenced product review does not exist.
    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),

    /// A requested quantity exceeded the available stock.
    #[error(
        "insufficient stock for '{name}': available {available}, requested {requested}"
    )]
    InsufficientStock {
        /// The product that is short.
        product_id: ProductId,
        /// Product name, for a user-facing message.
        name: ProductName,
        /// Units currently available.
        available: StockLevel,
        /// Units requested across the order.
        requested: u64,
    },

    /// Another product already uses this SKU.
    #[error("sku '{0}' is already in use")]
    DuplicateSku(Sku),

    /// Another account already uses this login.
    #[error("login '{0}' is already registered")]
    DuplicateLogin(Login),

    /// The category still contains products and cannot be deleted.
    #[error("category {0} still contains products")]
    CategoryInUse(CategoryId),

    /// The product still has reviews or images attached and cannot be deleted.
    #[error("product {0} still has reviews or images attached")]
    ProductInUse(ProductId),

    /// The caller lacks ownership or the required role.
    #[error("forbidden")]
    Forbidden,

    /// Login or password verification failed.
    #[error("invalid login or password")]
    InvalidCredentials,

    /// A concurrent write invalidated this operation.
    ///
    /// The operation was aborted without side effects; the caller may retry
    /// against fresh state.
    #[error("concurrent update conflict on {entity} {id}")]
    Conflict {
        /// The kind of record that conflicted.
        entity: &'static str,
        /// Raw surrogate key of the conflicting record.
        id: i64,
    },

    /// An unexpected persistence failure. The transaction was rolled back.
    #[error("store error: {0}")]
    Store(StoreError),
}

/// Persistence-level failures reported by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The category row was not found.
    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// The product row was not found.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The order row was not found.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The user row was not found.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The image row was not found.
    #[error("image {0} not found")]
    ImageNotFound(ImageId),

    /// The review row was not found.
    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),

    /// A uniqueness constraint on SKU was violated.
    #[error("sku '{0}' is already in use")]
    DuplicateSku(Sku),

    /// A uniqueness constraint on login was violated.
    #[error("login '{0}' is already registered")]
    DuplicateLogin(Login),

    /// A guarded write presented a stale record version.
    ///
    /// The whole commit was rejected; no write in the batch was applied.
    #[error("version conflict on {entity} {id}: expected {expected}, current {current}")]
    VersionConflict {
        /// The kind of record that conflicted.
        entity: &'static str,
        /// Raw surrogate key of the conflicting record.
        id: i64,
        /// The version the writer based its decision on.
        expected: RecordVersion,
        /// The version actually present in the store.
        current: RecordVersion,
    },

    /// The connection to the backing store failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A row could not be converted to or from its domain representation.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CategoryNotFound(id) => Self::CategoryNotFound(id),
            StoreError::ProductNotFound(id) => Self::ProductNotFound(id),
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::UserNotFound(id) => Self::UserNotFound(id),
            StoreError::ImageNotFound(id) => Self::ImageNotFound(id),
            StoreError::ReviewNotFound(id) => Self::ReviewNotFound(id),
            StoreError::DuplicateSku(sku) => Self::DuplicateSku(sku),
            StoreError::DuplicateLogin(login) => Self::DuplicateLogin(login),
            StoreError::VersionConflict { entity, id, .. } => Self::Conflict { entity, id },
            other => Self::Store(other),
        }
    }
}

impl From<MoneyError> for ServiceError {
    fn from(err: MoneyError) -> Self {
        Self::Validation(err.to_string())
    }
}

// From impls for the smart-constructor error types, so request builders can
// use `?` when parsing raw input.

impl From<CategoryNameError> for ServiceError {
    fn from(err: CategoryNameError) -> Self {
        Self::Validation(format!("invalid category name: {err}"))
    }
}

impl From<ProductNameError> for ServiceError {
    fn from(err: ProductNameError) -> Self {
        Self::Validation(format!("invalid product name: {err}"))
    }
}

impl From<SkuError> for ServiceError {
    fn from(err: SkuError) -> Self {
        Self::Validation(format!("invalid sku: {err}"))
    }
}

impl From<CustomerNameError> for ServiceError {
    fn from(err: CustomerNameError) -> Self {
        Self::Validation(format!("invalid customer name: {err}"))
    }
}

impl From<CustomerPhoneError> for ServiceError {
    fn from(err: CustomerPhoneError) -> Self {
        Self::Validation(format!("invalid customer phone: {err}"))
    }
}

impl From<DeliveryAddressError> for ServiceError {
    fn from(err: DeliveryAddressError) -> Self {
        Self::Validation(format!("invalid delivery address: {err}"))
    }
}

impl From<LoginError> for ServiceError {
    fn from(err: LoginError) -> Self {
        Self::Validation(format!("invalid login: {err}"))
    }
}

impl From<UsernameError> for ServiceError {
    fn from(err: UsernameError) -> Self {
        Self::Validation(format!("invalid username: {err}"))
    }
}

impl From<AuthorNameError> for ServiceError {
    fn from(err: AuthorNameError) -> Self {
        Self::Validation(format!("invalid author name: {err}"))
    }
}

impl From<ReviewCommentError> for ServiceError {
    fn from(err: ReviewCommentError) -> Self {
        Self::Validation(format!("invalid review comment: {err}"))
    }
}

impl From<RatingError> for ServiceError {
    fn from(err: RatingError) -> Self {
        Self::Validation(format!("invalid rating: {err}"))
    }
}

impl From<ImageUrlError> for ServiceError {
    fn from(err: ImageUrlError) -> Self {
        Self::Validation(format!("invalid image url: {err}"))
    }
}

impl From<QuantityError> for ServiceError {
    fn from(err: QuantityError) -> Self {
        Self::Validation(format!("invalid quantity: {err}"))
    }
}
