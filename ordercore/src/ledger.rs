//! The order ledger: order entities, their lifecycle, and the placement /
//! fulfillment workflow.
//!
//! This is the one subsystem with real invariants. Placement reads current
//! product state, validates and plans the inventory reservation, then hands
//! the store a single atomic commit covering the order row, every line item
//! and every guarded stock decrement. Deletion reverses the reservation the
//! same way. A concurrent writer invalidating a cycle surfaces as a version
//! conflict at commit time, and the ledger re-runs the whole cycle under a
//! bounded retry policy with backoff.

use crate::access::{can_access, require_admin, Principal};
use crate::errors::{ServiceError, ServiceResult};
use crate::inventory::{self, ResolvedLine};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::store::{CatalogStore, OrderFilter, OrderStore};
use crate::types::{
    CustomerName, CustomerPhone, DeliveryAddress, Money, OrderId, OrderItemId, ProductId,
    ProductName, Quantity, RecordVersion, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

/// How the buyer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Payment by card.
    Card,
    /// Payment in cash on delivery.
    Cash,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card => write!(f, "Card"),
            Self::Cash => write!(f, "Cash"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Card" => Ok(Self::Card),
            "Cash" => Ok(Self::Cash),
            other => Err(ServiceError::Validation(format!(
                "payment method must be 'Card' or 'Cash', got '{other}'"
            ))),
        }
    }
}

/// Lifecycle state of an order.
///
/// `Pending` is the initial state. Any state may move to any other state,
/// and terminal-looking states are not locked; the only inventory-affecting
/// operation is full deletion, never a status change (including a change to
/// `Cancelled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Placed but not yet picked up by staff.
    Pending,
    /// Being assembled and shipped.
    Processing,
    /// Fulfilled.
    Completed,
    /// Called off. Stock is NOT restored by this status.
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Processing => write!(f, "Processing"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(ServiceError::Validation(format!(
                "status must be Pending, Processing, Completed or Cancelled, got '{other}'"
            ))),
        }
    }
}

/// A line item within an order.
///
/// `product_name` and `price_at_purchase` are snapshots captured at
/// placement time; they never track later catalog changes, and the product
/// itself may be deleted while the item remains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Identity assigned by the store.
    pub id: OrderItemId,
    /// The owning order.
    pub order_id: OrderId,
    /// The product this line was priced from. A reference, not ownership.
    pub product_id: ProductId,
    /// Product name at the time of purchase.
    pub product_name: ProductName,
    /// Unit price at the time of purchase.
    pub price_at_purchase: Money,
    /// Units purchased.
    pub quantity: Quantity,
    /// `price_at_purchase × quantity`, fixed at creation.
    pub subtotal: Money,
}

/// A customer order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identity assigned by the store.
    pub id: OrderId,
    /// The user who placed the order.
    pub user_id: UserId,
    /// Buyer name, captured at placement.
    pub customer_name: CustomerName,
    /// Buyer phone, captured at placement.
    pub customer_phone: CustomerPhone,
    /// Delivery address, captured at placement.
    pub delivery_address: DeliveryAddress,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Sum of all item subtotals.
    pub total_amount: Money,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// When the order was placed.
    pub created_at: Timestamp,
    /// When the order was last updated, if ever.
    pub updated_at: Option<Timestamp>,
    /// Optimistic concurrency version.
    pub version: RecordVersion,
    /// The line items. An item cannot exist without its order.
    pub items: Vec<OrderItem>,
}

/// Fields for inserting an order row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// The user who placed the order.
    pub user_id: UserId,
    /// Buyer name.
    pub customer_name: CustomerName,
    /// Buyer phone.
    pub customer_phone: CustomerPhone,
    /// Delivery address.
    pub delivery_address: DeliveryAddress,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Computed total.
    pub total_amount: Money,
    /// Initial status.
    pub status: OrderStatus,
    /// Placement timestamp.
    pub created_at: Timestamp,
}

/// Fields for inserting a line item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    /// The product the line was priced from.
    pub product_id: ProductId,
    /// Name snapshot.
    pub product_name: ProductName,
    /// Price snapshot.
    pub price_at_purchase: Money,
    /// Units purchased.
    pub quantity: Quantity,
    /// `price_at_purchase × quantity`.
    pub subtotal: Money,
}

/// One requested line in a placement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The product to order.
    pub product_id: ProductId,
    /// Units requested.
    pub quantity: Quantity,
}

/// A request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    /// Buyer name.
    pub customer_name: CustomerName,
    /// Buyer phone.
    pub customer_phone: CustomerPhone,
    /// Delivery address.
    pub delivery_address: DeliveryAddress,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Requested lines. Must not be empty.
    pub items: Vec<OrderLine>,
}

/// The order ledger service.
#[derive(Debug, Clone)]
pub struct OrderLedger<S> {
    store: S,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
}

impl<S> OrderLedger<S>
where
    S: OrderStore + CatalogStore,
{
    /// Creates a ledger over the given store with default retry behavior.
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry_config: RetryConfig::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Sets the retry policy used for order placement.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Places an order for the calling user.
    ///
    /// Resolves every requested line against the catalog in request order,
    /// failing fast with `ProductNotFound` or `InsufficientStock`; on any
    /// failure no order exists and no stock anywhere has moved. On success
    /// the order, its item snapshots and all stock decrements were committed
    /// as one atomic unit, and the returned order carries every generated
    /// identity.
    #[instrument(
        skip(self, request),
        fields(user = %principal.user_id, correlation = %Uuid::now_v7())
    )]
    pub async fn place_order(
        &self,
        principal: &Principal,
        request: PlaceOrder,
    ) -> ServiceResult<Order> {
        if request.items.is_empty() {
            return Err(ServiceError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }

        let mut attempt = 1;
        loop {
            match self.try_place(principal, &request).await {
                Err(error)
                    if self.retry_policy.should_retry(&error)
                        && attempt < self.retry_config.max_attempts =>
                {
                    warn!(%error, attempt, "order placement conflicted, retrying");
                    tokio::time::sleep(self.retry_config.delay_for(attempt)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// One placement cycle: read, validate, plan, commit.
    async fn try_place(
        &self,
        principal: &Principal,
        request: &PlaceOrder,
    ) -> ServiceResult<Order> {
        let mut lines = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product = self
                .store
                .fetch_product(line.product_id)
                .await?
                .ok_or(ServiceError::ProductNotFound(line.product_id))?;
            lines.push(ResolvedLine {
                product,
                quantity: line.quantity,
            });
        }

        let stock_writes = inventory::reserve(&lines)?;

        let mut items = Vec::with_capacity(lines.len());
        let mut total = Money::zero();
        for line in &lines {
            let subtotal = line.product.price.times(line.quantity)?;
            total = total.checked_add(subtotal)?;
            items.push(NewOrderItem {
                product_id: line.product.id,
                product_name: line.product.name.clone(),
                price_at_purchase: line.product.price,
                quantity: line.quantity,
                subtotal,
            });
        }

        let order = NewOrder {
            user_id: principal.user_id,
            customer_name: request.customer_name.clone(),
            customer_phone: request.customer_phone.clone(),
            delivery_address: request.delivery_address.clone(),
            payment_method: request.payment_method,
            total_amount: total,
            status: OrderStatus::Pending,
            created_at: Timestamp::now(),
        };

        Ok(self.store.create_order(order, items, stock_writes).await?)
    }

    /// Fetches one order. Owner or admin.
    #[instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn get_order(&self, principal: &Principal, id: OrderId) -> ServiceResult<Order> {
        let order = self
            .store
            .fetch_order(id)
            .await?
            .ok_or(ServiceError::OrderNotFound(id))?;
        if !can_access(order.user_id, principal) {
            return Err(ServiceError::Forbidden);
        }
        Ok(order)
    }

    /// Lists orders visible to the caller, newest first: all orders for an
    /// admin, the caller's own otherwise.
    #[instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn list_orders(&self, principal: &Principal) -> ServiceResult<Vec<Order>> {
        let filter = if principal.is_admin() {
            OrderFilter::all()
        } else {
            OrderFilter::owned_by(principal.user_id)
        };
        Ok(self.store.list_orders(&filter).await?)
    }

    /// Lists one user's orders, newest first. Admin only.
    #[instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn orders_for_user(
        &self,
        principal: &Principal,
        user_id: UserId,
    ) -> ServiceResult<Vec<Order>> {
        require_admin(principal)?;
        Ok(self
            .store
            .list_orders(&OrderFilter::owned_by(user_id))
            .await?)
    }

    /// Sets an order's status. Admin only.
    ///
    /// Any status may move to any status, and a change to `Cancelled` does
    /// not restore stock; only [`OrderLedger::delete_order`] does. Inventory
    /// is never touched here.
    #[instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: OrderId,
        status: OrderStatus,
    ) -> ServiceResult<Order> {
        require_admin(principal)?;
        Ok(self
            .store
            .update_order_status(id, status, Timestamp::now())
            .await?)
    }

    /// Deletes an order, returning its reserved units to stock. Owner or
    /// admin.
    ///
    /// Every line whose product still exists is restocked; lines whose
    /// product has been removed from the catalog are skipped. Restocking and
    /// removal commit as one atomic unit, and a delete of an already-absent
    /// order fails with `OrderNotFound` rather than restocking twice.
    #[instrument(
        skip(self),
        fields(user = %principal.user_id, correlation = %Uuid::now_v7())
    )]
    pub async fn delete_order(&self, principal: &Principal, id: OrderId) -> ServiceResult<()> {
        // Products vanishing mid-cycle are retried: the next cycle simply
        // skips their restock.
        let policy = RetryPolicy::ConflictsAndMissing;

        let mut attempt = 1;
        loop {
            match self.try_delete(principal, id).await {
                Err(error)
                    if policy.should_retry(&error) && attempt < self.retry_config.max_attempts =>
                {
                    warn!(%error, attempt, "order deletion conflicted, retrying");
                    tokio::time::sleep(self.retry_config.delay_for(attempt)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// One deletion cycle: read, authorize, plan restock, commit.
    async fn try_delete(&self, principal: &Principal, id: OrderId) -> ServiceResult<()> {
        let order = self
            .store
            .fetch_order(id)
            .await?
            .ok_or(ServiceError::OrderNotFound(id))?;
        if !can_access(order.user_id, principal) {
            return Err(ServiceError::Forbidden);
        }

        let mut products = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for item in &order.items {
            if seen.insert(item.product_id) {
                if let Some(product) = self.store.fetch_product(item.product_id).await? {
                    products.push(product);
                }
            }
        }

        let stock_writes = inventory::restock(&order.items, &products);
        Ok(self.store.delete_order(id, stock_writes).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_method_round_trips() {
        assert_eq!("Card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("Cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("Crypto".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::Card.to_string(), "Card");
    }

    #[test]
    fn order_status_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("Shipped".parse::<OrderStatus>().is_err());
    }
}
