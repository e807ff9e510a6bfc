//! In-memory adapter for the `OrderCore` store traits
//!
//! This crate provides an in-memory implementation of the `CatalogStore`,
//! `OrderStore` and `UserStore` traits from the ordercore crate, useful for
//! testing and development scenarios where persistence is not required.
//!
//! All tables live behind a single `RwLock`, so every multi-table commit
//! ([`create_order`](ordercore::OrderStore::create_order),
//! [`delete_order`](ordercore::OrderStore::delete_order)) is serialized and
//! trivially atomic: version guards are verified for the whole batch before
//! any row is touched, and a rejected guard leaves the store byte-for-byte
//! unchanged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ordercore::catalog::{
    Category, CategoryPatch, ImagePatch, NewCategory, NewImage, NewProduct, NewReview, Product,
    ProductImage, ProductPatch, ProductReview, ReviewPatch,
};
use ordercore::errors::{StoreError, StoreResult};
use ordercore::ledger::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
use ordercore::store::{CatalogStore, OrderFilter, OrderStore, StockWrite, UserStore};
use ordercore::types::{
    CategoryId, ImageId, Login, OrderId, OrderItemId, ProductId, RecordVersion, ReviewId, Sku,
    Timestamp, UserId,
};
use ordercore::users::{NewUser, User};

#[derive(Debug, Default)]
struct IdCounters {
    category: i64,
    product: i64,
    image: i64,
    review: i64,
    user: i64,
    order: i64,
    order_item: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    categories: HashMap<i64, Category>,
    products: HashMap<i64, Product>,
    images: HashMap<i64, ProductImage>,
    reviews: HashMap<i64, ProductReview>,
    users: HashMap<i64, User>,
    orders: HashMap<i64, Order>,
    ids: IdCounters,
}

impl Tables {
    /// Verifies every stock guard in the batch without mutating anything.
    fn check_stock_guards(&self, stock_writes: &[StockWrite]) -> StoreResult<()> {
        for write in stock_writes {
            let product = self
                .products
                .get(&i64::from(write.product_id))
                .ok_or(StoreError::ProductNotFound(write.product_id))?;
            if product.version != write.expected_version {
                return Err(StoreError::VersionConflict {
                    entity: "product",
                    id: i64::from(write.product_id),
                    expected: write.expected_version,
                    current: product.version,
                });
            }
        }
        Ok(())
    }

    /// Applies a batch of stock writes. Guards must have been checked.
    fn apply_stock_writes(&mut self, stock_writes: &[StockWrite]) {
        for write in stock_writes {
            let product = self
                .products
                .get_mut(&i64::from(write.product_id))
                .expect("stock guard checked before apply");
            product.stock = write.stock;
            product.version = product.version.next();
        }
    }
}

/// Thread-safe in-memory store for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let id = next_id(&mut tables.ids.category);
        let category = Category {
            id: CategoryId::try_new(id).expect("generated id is positive"),
            name: category.name,
            description: category.description,
        };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn fetch_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.categories.get(&i64::from(id)).cloned())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by_key(|category| i64::from(category.id));
        Ok(categories)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> StoreResult<Category> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let category = tables
            .categories
            .get_mut(&i64::from(id))
            .ok_or(StoreError::CategoryNotFound(id))?;
        category.name = patch.name;
        category.description = patch.description;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        tables
            .categories
            .remove(&i64::from(id))
            .map(|_| ())
            .ok_or(StoreError::CategoryNotFound(id))
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        if tables
            .products
            .values()
            .any(|existing| existing.sku == product.sku)
        {
            return Err(StoreError::DuplicateSku(product.sku));
        }
        let id = next_id(&mut tables.ids.product);
        let product = Product {
            id: ProductId::try_new(id).expect("generated id is positive"),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            sku: product.sku,
            category_id: product.category_id,
            version: RecordVersion::initial(),
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn fetch_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.products.get(&i64::from(id)).cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by_key(|product| i64::from(product.id));
        Ok(products)
    }

    async fn list_products_in_category(&self, id: CategoryId) -> StoreResult<Vec<Product>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|product| product.category_id == id)
            .cloned()
            .collect();
        products.sort_by_key(|product| i64::from(product.id));
        Ok(products)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        expected_version: RecordVersion,
    ) -> StoreResult<Product> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let current = tables
            .products
            .get(&i64::from(id))
            .ok_or(StoreError::ProductNotFound(id))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity: "product",
                id: i64::from(id),
                expected: expected_version,
                current: current.version,
            });
        }
        let product = tables
            .products
            .get_mut(&i64::from(id))
            .expect("present above");
        product.name = patch.name;
        product.description = patch.description;
        product.price = patch.price;
        product.stock = patch.stock;
        product.sku = patch.sku;
        product.category_id = patch.category_id;
        product.version = product.version.next();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        tables
            .products
            .remove(&i64::from(id))
            .map(|_| ())
            .ok_or(StoreError::ProductNotFound(id))
    }

    async fn sku_taken(&self, sku: &Sku, exclude: Option<ProductId>) -> StoreResult<bool> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables
            .products
            .values()
            .any(|product| product.sku == *sku && Some(product.id) != exclude))
    }

    async fn insert_image(&self, image: NewImage) -> StoreResult<ProductImage> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let id = next_id(&mut tables.ids.image);
        let image = ProductImage {
            id: ImageId::try_new(id).expect("generated id is positive"),
            product_id: image.product_id,
            url: image.url,
            alt_text: image.alt_text,
        };
        tables.images.insert(id, image.clone());
        Ok(image)
    }

    async fn fetch_image(&self, id: ImageId) -> StoreResult<Option<ProductImage>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.images.get(&i64::from(id)).cloned())
    }

    async fn list_images(&self, product_id: ProductId) -> StoreResult<Vec<ProductImage>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        let mut images: Vec<ProductImage> = tables
            .images
            .values()
            .filter(|image| image.product_id == product_id)
            .cloned()
            .collect();
        images.sort_by_key(|image| i64::from(image.id));
        Ok(images)
    }

    async fn update_image(&self, id: ImageId, patch: ImagePatch) -> StoreResult<ProductImage> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let image = tables
            .images
            .get_mut(&i64::from(id))
            .ok_or(StoreError::ImageNotFound(id))?;
        image.url = patch.url;
        image.alt_text = patch.alt_text;
        Ok(image.clone())
    }

    async fn delete_image(&self, id: ImageId) -> StoreResult<()> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        tables
            .images
            .remove(&i64::from(id))
            .map(|_| ())
            .ok_or(StoreError::ImageNotFound(id))
    }

    async fn insert_review(&self, review: NewReview) -> StoreResult<ProductReview> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let id = next_id(&mut tables.ids.review);
        let review = ProductReview {
            id: ReviewId::try_new(id).expect("generated id is positive"),
            product_id: review.product_id,
            author_id: review.author_id,
            author_name: review.author_name,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: None,
        };
        tables.reviews.insert(id, review.clone());
        Ok(review)
    }

    async fn fetch_review(&self, id: ReviewId) -> StoreResult<Option<ProductReview>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.reviews.get(&i64::from(id)).cloned())
    }

    async fn list_reviews(&self, product_id: ProductId) -> StoreResult<Vec<ProductReview>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        let mut reviews: Vec<ProductReview> = tables
            .reviews
            .values()
            .filter(|review| review.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by_key(|review| i64::from(review.id));
        Ok(reviews)
    }

    async fn update_review(
        &self,
        id: ReviewId,
        patch: ReviewPatch,
        updated_at: Timestamp,
    ) -> StoreResult<ProductReview> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let review = tables
            .reviews
            .get_mut(&i64::from(id))
            .ok_or(StoreError::ReviewNotFound(id))?;
        review.rating = patch.rating;
        review.comment = patch.comment;
        review.updated_at = Some(updated_at);
        Ok(review.clone())
    }

    async fn delete_review(&self, id: ReviewId) -> StoreResult<()> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        tables
            .reviews
            .remove(&i64::from(id))
            .map(|_| ())
            .ok_or(StoreError::ReviewNotFound(id))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        stock_writes: Vec<StockWrite>,
    ) -> StoreResult<Order> {
        let mut tables = self.inner.write().expect("RwLock poisoned");

        // Verify every guard before touching anything.
        tables.check_stock_guards(&stock_writes)?;
        tables.apply_stock_writes(&stock_writes);

        let order_id = next_id(&mut tables.ids.order);
        let id = OrderId::try_new(order_id).expect("generated id is positive");
        let items = items
            .into_iter()
            .map(|item| {
                let item_id = next_id(&mut tables.ids.order_item);
                OrderItem {
                    id: OrderItemId::try_new(item_id).expect("generated id is positive"),
                    order_id: id,
                    product_id: item.product_id,
                    product_name: item.product_name,
                    price_at_purchase: item.price_at_purchase,
                    quantity: item.quantity,
                    subtotal: item.subtotal,
                }
            })
            .collect();

        let order = Order {
            id,
            user_id: order.user_id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            delivery_address: order.delivery_address,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
            updated_at: None,
            version: RecordVersion::initial(),
            items,
        };
        tables.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.orders.get(&i64::from(id)).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| filter.owner.map_or(true, |owner| order.user_id == owner))
            .cloned()
            .collect();
        // Newest first; id breaks same-instant ties deterministically.
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| i64::from(b.id).cmp(&i64::from(a.id)))
        });
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: Timestamp,
    ) -> StoreResult<Order> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let order = tables
            .orders
            .get_mut(&i64::from(id))
            .ok_or(StoreError::OrderNotFound(id))?;
        order.status = status;
        order.updated_at = Some(updated_at);
        order.version = order.version.next();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId, stock_writes: Vec<StockWrite>) -> StoreResult<()> {
        let mut tables = self.inner.write().expect("RwLock poisoned");

        if !tables.orders.contains_key(&i64::from(id)) {
            return Err(StoreError::OrderNotFound(id));
        }
        tables.check_stock_guards(&stock_writes)?;
        tables.apply_stock_writes(&stock_writes);
        tables.orders.remove(&i64::from(id));
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        if tables
            .users
            .values()
            .any(|existing| existing.login == user.login)
        {
            return Err(StoreError::DuplicateLogin(user.login));
        }
        let id = next_id(&mut tables.ids.user);
        let user = User {
            id: UserId::try_new(id).expect("generated id is positive"),
            login: user.login,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn fetch_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.users.get(&i64::from(id)).cloned())
    }

    async fn fetch_user_by_login(&self, login: &Login) -> StoreResult<Option<User>> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables
            .users
            .values()
            .find(|user| user.login == *login)
            .cloned())
    }

    async fn update_password(&self, id: UserId, password_hash: String) -> StoreResult<()> {
        let mut tables = self.inner.write().expect("RwLock poisoned");
        let user = tables
            .users
            .get_mut(&i64::from(id))
            .ok_or(StoreError::UserNotFound(id))?;
        user.password_hash = password_hash;
        Ok(())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        let tables = self.inner.read().expect("RwLock poisoned");
        Ok(tables.users.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordercore::ledger::PaymentMethod;
    use ordercore::types::{
        CategoryName, CustomerName, CustomerPhone, DeliveryAddress, Money, ProductName, Quantity,
        Sku, StockLevel,
    };
    use rust_decimal_macros::dec;

    async fn seed_product(store: &InMemoryStore, stock: u32) -> Product {
        let category = store
            .insert_category(NewCategory {
                name: CategoryName::try_new("Electronics").unwrap(),
                description: None,
            })
            .await
            .unwrap();
        store
            .insert_product(NewProduct {
                name: ProductName::try_new("Laptop").unwrap(),
                description: Some("15 inch".to_string()),
                price: Money::new(dec!(100.00)).unwrap(),
                stock: StockLevel::new(stock),
                sku: Sku::try_new("LAPTOP-15").unwrap(),
                category_id: category.id,
            })
            .await
            .unwrap()
    }

    fn new_order(user: i64, total: Money) -> NewOrder {
        NewOrder {
            user_id: UserId::try_new(user).unwrap(),
            customer_name: CustomerName::try_new("Jane Doe").unwrap(),
            customer_phone: CustomerPhone::try_new("+1 555 0100").unwrap(),
            delivery_address: DeliveryAddress::try_new("1 Long Street, Springfield").unwrap(),
            payment_method: PaymentMethod::Card,
            total_amount: total,
            status: OrderStatus::Pending,
            created_at: Timestamp::now(),
        }
    }

    fn item_for(product: &Product, quantity: u32) -> NewOrderItem {
        let quantity = Quantity::try_new(quantity).unwrap();
        NewOrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            price_at_purchase: product.price,
            quantity,
            subtotal: product.price.times(quantity).unwrap(),
        }
    }

    #[tokio::test]
    async fn clone_shares_storage() {
        let store1 = InMemoryStore::new();
        let store2 = store1.clone();
        assert!(Arc::ptr_eq(&store1.inner, &store2.inner));
    }

    #[tokio::test]
    async fn insert_product_assigns_sequential_ids_and_initial_version() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10).await;
        assert_eq!(i64::from(product.id), 1);
        assert_eq!(product.version, RecordVersion::initial());
    }

    #[tokio::test]
    async fn insert_product_rejects_duplicate_sku() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10).await;
        let result = store
            .insert_product(NewProduct {
                name: ProductName::try_new("Other").unwrap(),
                description: None,
                price: Money::new(dec!(1.00)).unwrap(),
                stock: StockLevel::new(1),
                sku: product.sku.clone(),
                category_id: product.category_id,
            })
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateSku(_))));
    }

    #[tokio::test]
    async fn create_order_applies_guarded_stock_writes() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10).await;

        let order = store
            .create_order(
                new_order(1, Money::new(dec!(300.00)).unwrap()),
                vec![item_for(&product, 3)],
                vec![StockWrite {
                    product_id: product.id,
                    stock: StockLevel::new(7),
                    expected_version: product.version,
                }],
            )
            .await
            .unwrap();

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].order_id, order.id);

        let stored = store.fetch_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, StockLevel::new(7));
        assert_eq!(stored.version, product.version.next());
    }

    #[tokio::test]
    async fn create_order_rejects_stale_guard_without_side_effects() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10).await;

        let result = store
            .create_order(
                new_order(1, Money::new(dec!(300.00)).unwrap()),
                vec![item_for(&product, 3)],
                vec![StockWrite {
                    product_id: product.id,
                    stock: StockLevel::new(7),
                    expected_version: product.version.next(), // stale-simulating mismatch
                }],
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::VersionConflict { entity: "product", .. })
        ));

        // Nothing moved: no order, stock untouched.
        let stored = store.fetch_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, StockLevel::new(10));
        assert!(store
            .list_orders(&OrderFilter::all())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn create_order_with_partially_stale_batch_touches_nothing() {
        let store = InMemoryStore::new();
        let category = store
            .insert_category(NewCategory {
                name: CategoryName::try_new("Electronics").unwrap(),
                description: None,
            })
            .await
            .unwrap();
        let mut products = Vec::new();
        for n in 0..2 {
            products.push(
                store
                    .insert_product(NewProduct {
                        name: ProductName::try_new(format!("Product {n}")).unwrap(),
                        description: None,
                        price: Money::new(dec!(10.00)).unwrap(),
                        stock: StockLevel::new(5),
                        sku: Sku::try_new(format!("SKU-{n}")).unwrap(),
                        category_id: category.id,
                    })
                    .await
                    .unwrap(),
            );
        }

        let result = store
            .create_order(
                new_order(1, Money::new(dec!(20.00)).unwrap()),
                vec![item_for(&products[0], 1), item_for(&products[1], 1)],
                vec![
                    StockWrite {
                        product_id: products[0].id,
                        stock: StockLevel::new(4),
                        expected_version: products[0].version,
                    },
                    StockWrite {
                        product_id: products[1].id,
                        stock: StockLevel::new(4),
                        expected_version: products[1].version.next(),
                    },
                ],
            )
            .await;

        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        // The valid first write must not have been applied either.
        let first = store.fetch_product(products[0].id).await.unwrap().unwrap();
        assert_eq!(first.stock, StockLevel::new(5));
        assert_eq!(first.version, products[0].version);
    }

    #[tokio::test]
    async fn delete_order_rejects_missing_order_before_restocking() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10).await;

        let result = store
            .delete_order(
                OrderId::try_new(42).unwrap(),
                vec![StockWrite {
                    product_id: product.id,
                    stock: StockLevel::new(13),
                    expected_version: product.version,
                }],
            )
            .await;

        assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
        let stored = store.fetch_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, StockLevel::new(10));
    }

    #[tokio::test]
    async fn list_orders_filters_by_owner_and_sorts_newest_first() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 100).await;

        for user in [1, 2, 1] {
            store
                .create_order(
                    new_order(user, Money::new(dec!(100.00)).unwrap()),
                    vec![item_for(&product, 1)],
                    vec![],
                )
                .await
                .unwrap();
        }

        let all = store.list_orders(&OrderFilter::all()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|pair| {
            (pair[0].created_at, i64::from(pair[0].id))
                >= (pair[1].created_at, i64::from(pair[1].id))
        }));

        let owned = store
            .list_orders(&OrderFilter::owned_by(UserId::try_new(1).unwrap()))
            .await
            .unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned
            .iter()
            .all(|order| order.user_id == UserId::try_new(1).unwrap()));
    }

    #[tokio::test]
    async fn update_order_status_stamps_updated_at() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10).await;
        let order = store
            .create_order(
                new_order(1, Money::new(dec!(100.00)).unwrap()),
                vec![item_for(&product, 1)],
                vec![],
            )
            .await
            .unwrap();
        assert!(order.updated_at.is_none());

        let updated = store
            .update_order_status(order.id, OrderStatus::Processing, Timestamp::now())
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.version, order.version.next());
    }

    #[tokio::test]
    async fn user_login_uniqueness() {
        let store = InMemoryStore::new();
        let user = NewUser {
            login: Login::try_new("jane@example.com").unwrap(),
            username: ordercore::types::Username::try_new("Jane").unwrap(),
            password_hash: "hash".to_string(),
            role: ordercore::Role::User,
        };
        store.insert_user(user.clone()).await.unwrap();
        assert!(matches!(
            store.insert_user(user).await,
            Err(StoreError::DuplicateLogin(_))
        ));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }
}
