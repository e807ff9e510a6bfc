//! `OrderStore` implementation for `PostgreSQL`.

use crate::{
    map_sqlx_error, serialization, timestamp_from_row, version_from_i64, version_to_i64,
    PostgresStore,
};
use async_trait::async_trait;
use ordercore::errors::{StoreError, StoreResult};
use ordercore::ledger::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, PaymentMethod};
use ordercore::store::{OrderFilter, OrderStore, StockWrite};
use ordercore::types::{
    CustomerName, CustomerPhone, DeliveryAddress, Money, OrderId, OrderItemId, ProductId,
    Quantity, ProductName, Timestamp, UserId,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, instrument};

#[derive(Debug)]
struct OrderRow {
    id: i64,
    user_id: i64,
    customer_name: String,
    customer_phone: String,
    delivery_address: String,
    payment_method: String,
    total_amount: Decimal,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    record_version: i64,
}

impl TryFrom<&PgRow> for OrderRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            delivery_address: row.try_get("delivery_address")?,
            payment_method: row.try_get("payment_method")?,
            total_amount: row.try_get("total_amount")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            record_version: row.try_get("record_version")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        Ok(Order {
            id: OrderId::try_new(self.id).map_err(serialization)?,
            user_id: UserId::try_new(self.user_id).map_err(serialization)?,
            customer_name: CustomerName::try_new(self.customer_name).map_err(serialization)?,
            customer_phone: CustomerPhone::try_new(self.customer_phone).map_err(serialization)?,
            delivery_address: DeliveryAddress::try_new(self.delivery_address)
                .map_err(serialization)?,
            payment_method: self
                .payment_method
                .parse::<PaymentMethod>()
                .map_err(serialization)?,
            total_amount: Money::new(self.total_amount).map_err(serialization)?,
            status: self.status.parse::<OrderStatus>().map_err(serialization)?,
            created_at: timestamp_from_row(self.created_at),
            updated_at: self.updated_at.map(timestamp_from_row),
            version: version_from_i64(self.record_version)?,
            items,
        })
    }
}

#[derive(Debug)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    price_at_purchase: Decimal,
    quantity: i64,
    subtotal: Decimal,
}

impl TryFrom<&PgRow> for OrderItemRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            price_at_purchase: row.try_get("price_at_purchase")?,
            quantity: row.try_get("quantity")?,
            subtotal: row.try_get("subtotal")?,
        })
    }
}

impl OrderItemRow {
    fn into_item(self) -> StoreResult<OrderItem> {
        let quantity = u32::try_from(self.quantity).map_err(serialization)?;
        Ok(OrderItem {
            id: OrderItemId::try_new(self.id).map_err(serialization)?,
            order_id: OrderId::try_new(self.order_id).map_err(serialization)?,
            product_id: ProductId::try_new(self.product_id).map_err(serialization)?,
            product_name: ProductName::try_new(self.product_name).map_err(serialization)?,
            price_at_purchase: Money::new(self.price_at_purchase).map_err(serialization)?,
            quantity: Quantity::try_new(quantity).map_err(serialization)?,
            subtotal: Money::new(self.subtotal).map_err(serialization)?,
        })
    }
}

/// Applies a batch of guarded stock writes inside `tx`.
///
/// A statement affecting zero rows means the guard failed; the follow-up
/// read distinguishes a vanished product from a stale version. The caller's
/// transaction is rolled back on drop, so a failed guard leaves no trace.
async fn apply_stock_writes(
    tx: &mut Transaction<'_, Postgres>,
    stock_writes: &[StockWrite],
) -> StoreResult<()> {
    for write in stock_writes {
        let result = sqlx::query(
            "UPDATE products \
             SET stock_quantity = $1, record_version = record_version + 1 \
             WHERE id = $2 AND record_version = $3",
        )
        .bind(i64::from(write.stock.value()))
        .bind(i64::from(write.product_id))
        .bind(version_to_i64(write.expected_version))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT record_version FROM products WHERE id = $1")
                    .bind(i64::from(write.product_id))
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error(&e))?;

            return Err(match current {
                None => StoreError::ProductNotFound(write.product_id),
                Some(raw) => StoreError::VersionConflict {
                    entity: "product",
                    id: i64::from(write.product_id),
                    expected: write.expected_version,
                    current: version_from_i64(raw)?,
                },
            });
        }
    }
    Ok(())
}

async fn fetch_items_for(
    pool: &sqlx::Pool<Postgres>,
    order_ids: &[i64],
) -> StoreResult<Vec<OrderItem>> {
    let rows = sqlx::query(
        "SELECT id, order_id, product_id, product_name, price_at_purchase, quantity, subtotal \
         FROM order_items WHERE order_id = ANY($1) ORDER BY id",
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| map_sqlx_error(&e))?;

    rows.iter()
        .map(|row| {
            OrderItemRow::try_from(row)
                .map_err(serialization)
                .and_then(OrderItemRow::into_item)
        })
        .collect()
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(name = "postgres.create_order", skip(self, order, items, stock_writes))]
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        stock_writes: Vec<StockWrite>,
    ) -> StoreResult<Order> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error(&e))?;

        apply_stock_writes(&mut tx, &stock_writes).await?;

        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders \
             (user_id, customer_name, customer_phone, delivery_address, payment_method, \
              total_amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(i64::from(order.user_id))
        .bind(order.customer_name.as_ref())
        .bind(order.customer_phone.as_ref())
        .bind(order.delivery_address.as_ref())
        .bind(order.payment_method.to_string())
        .bind(order.total_amount.amount())
        .bind(order.status.to_string())
        .bind(*order.created_at.as_datetime())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        let mut stored_items = Vec::with_capacity(items.len());
        for item in items {
            let item_id: i64 = sqlx::query_scalar(
                "INSERT INTO order_items \
                 (order_id, product_id, product_name, price_at_purchase, quantity, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(order_id)
            .bind(i64::from(item.product_id))
            .bind(item.product_name.as_ref())
            .bind(item.price_at_purchase.amount())
            .bind(i64::from(u32::from(item.quantity)))
            .bind(item.subtotal.amount())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&e))?;

            stored_items.push(OrderItem {
                id: OrderItemId::try_new(item_id).map_err(serialization)?,
                order_id: OrderId::try_new(order_id).map_err(serialization)?,
                product_id: item.product_id,
                product_name: item.product_name,
                price_at_purchase: item.price_at_purchase,
                quantity: item.quantity,
                subtotal: item.subtotal,
            });
        }

        tx.commit().await.map_err(|e| map_sqlx_error(&e))?;
        debug!(order_id, "order committed");

        Ok(Order {
            id: OrderId::try_new(order_id).map_err(serialization)?,
            user_id: order.user_id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            delivery_address: order.delivery_address,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
            updated_at: None,
            version: ordercore::types::RecordVersion::initial(),
            items: stored_items,
        })
    }

    #[instrument(name = "postgres.fetch_order", skip(self))]
    async fn fetch_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, customer_name, customer_phone, delivery_address, \
             payment_method, total_amount, status, created_at, updated_at, record_version \
             FROM orders WHERE id = $1",
        )
        .bind(i64::from(id))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order_row = OrderRow::try_from(&row).map_err(serialization)?;
        let items = fetch_items_for(self.pool(), &[order_row.id]).await?;
        Ok(Some(order_row.into_order(items)?))
    }

    #[instrument(name = "postgres.list_orders", skip(self))]
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let rows = match filter.owner {
            Some(owner) => {
                sqlx::query(
                    "SELECT id, user_id, customer_name, customer_phone, delivery_address, \
                     payment_method, total_amount, status, created_at, updated_at, record_version \
                     FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
                )
                .bind(i64::from(owner))
                .fetch_all(self.pool())
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, customer_name, customer_phone, delivery_address, \
                     payment_method, total_amount, status, created_at, updated_at, record_version \
                     FROM orders ORDER BY created_at DESC, id DESC",
                )
                .fetch_all(self.pool())
                .await
            }
        }
        .map_err(|e| map_sqlx_error(&e))?;

        let order_rows: Vec<OrderRow> = rows
            .iter()
            .map(|row| OrderRow::try_from(row).map_err(serialization))
            .collect::<StoreResult<_>>()?;

        let ids: Vec<i64> = order_rows.iter().map(|row| row.id).collect();
        let mut items_by_order: std::collections::HashMap<i64, Vec<OrderItem>> =
            std::collections::HashMap::new();
        for item in fetch_items_for(self.pool(), &ids).await? {
            items_by_order
                .entry(i64::from(item.order_id))
                .or_default()
                .push(item);
        }

        order_rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    #[instrument(name = "postgres.update_order_status", skip(self))]
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: Timestamp,
    ) -> StoreResult<Order> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status = $1, updated_at = $2, record_version = record_version + 1 \
             WHERE id = $3",
        )
        .bind(status.to_string())
        .bind(*updated_at.as_datetime())
        .bind(i64::from(id))
        .execute(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        self.fetch_order(id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }

    #[instrument(name = "postgres.delete_order", skip(self, stock_writes))]
    async fn delete_order(&self, id: OrderId, stock_writes: Vec<StockWrite>) -> StoreResult<()> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error(&e))?;

        // Lock the order row first so a duplicate delete cannot restock
        // twice.
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
                .bind(i64::from(id))
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(&e))?;
        if existing.is_none() {
            return Err(StoreError::OrderNotFound(id));
        }

        apply_stock_writes(&mut tx, &stock_writes).await?;

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        tx.commit().await.map_err(|e| map_sqlx_error(&e))?;
        debug!(order_id = i64::from(id), "order deleted and stock restored");
        Ok(())
    }
}
