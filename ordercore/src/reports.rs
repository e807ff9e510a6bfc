//! Administrative sales reporting.
//!
//! Reporting never mutates anything and is computed from plain snapshots of
//! the ledger and catalog, so the aggregation itself is pure functions over
//! slices; [`ReportingService`] only fetches the inputs and gates access.
//! Orders with status `Cancelled` are excluded from every revenue figure;
//! the dashboard's status breakdown and recent-order feed intentionally
//! count all orders.
//!
//! Rendering (CSV, spreadsheets) is out of scope; every report type is a
//! serde-serializable value.

use crate::access::{require_admin, Principal};
use crate::catalog::{Category, Product};
use crate::errors::ServiceResult;
use crate::ledger::{Order, OrderStatus, PaymentMethod};
use crate::store::{CatalogStore, OrderFilter, OrderStore, UserStore};
use crate::types::{CategoryId, OrderId, ProductId, Timestamp};
use chrono::{Datelike, Days, Month, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::instrument;

/// Products at or below this level count as "low stock" on the dashboard.
const LOW_STOCK_THRESHOLD: u32 = 10;

/// Sales figures for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    /// The day (UTC).
    pub date: NaiveDate,
    /// Orders placed that day.
    pub orders_count: u64,
    /// Revenue across those orders.
    pub total_revenue: Decimal,
    /// Units sold across all line items.
    pub items_sold: u64,
    /// Mean order total, rounded to cents.
    pub average_order_value: Decimal,
}

/// Sales figures for a date range, with a per-day breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodReport {
    /// First day of the range (inclusive).
    pub from: NaiveDate,
    /// Last day of the range (inclusive).
    pub to: NaiveDate,
    /// Orders placed in the range.
    pub total_orders: u64,
    /// Revenue across those orders.
    pub total_revenue: Decimal,
    /// Units sold across all line items.
    pub total_items_sold: u64,
    /// Mean order total, rounded to cents.
    pub average_order_value: Decimal,
    /// Day-by-day figures, oldest first.
    pub daily: Vec<DailySales>,
}

/// Revenue figures for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1 through 12.
    pub month: u32,
    /// English month name.
    pub month_name: String,
    /// Orders placed that month.
    pub orders_count: u64,
    /// Revenue across those orders.
    pub total_revenue: Decimal,
    /// Units sold across all line items.
    pub items_sold: u64,
}

/// A best-selling product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    /// The product the line items referenced.
    pub product_id: ProductId,
    /// Name as snapshotted on the line items.
    pub product_name: String,
    /// Current SKU, or `"N/A"` when the product left the catalog.
    pub sku: String,
    /// Units sold in the range.
    pub total_quantity_sold: u64,
    /// Revenue from those units.
    pub total_revenue: Decimal,
    /// Distinct orders the product appeared in.
    pub orders_count: u64,
}

/// Sales figures for one catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySales {
    /// The category.
    pub category_id: CategoryId,
    /// Category name.
    pub category_name: String,
    /// Distinct products of the category that sold in the range.
    pub products_count: u64,
    /// Units sold.
    pub total_quantity_sold: u64,
    /// Revenue from those units.
    pub total_revenue: Decimal,
    /// Distinct orders involved.
    pub orders_count: u64,
    /// Mean snapshot unit price, rounded to cents.
    pub average_price: Decimal,
}

/// Order distribution for one payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodBreakdown {
    /// The payment method.
    pub payment_method: PaymentMethod,
    /// Orders paid this way.
    pub orders_count: u64,
    /// Revenue across those orders.
    pub total_revenue: Decimal,
    /// Share of total revenue, in percent, rounded to two places.
    pub percentage: Decimal,
}

/// A compact order line for the dashboard's recent-orders feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentOrder {
    /// The order.
    pub id: OrderId,
    /// Buyer name.
    pub customer_name: String,
    /// Order total.
    pub total_amount: Decimal,
    /// Current status.
    pub status: OrderStatus,
    /// Placement time.
    pub created_at: Timestamp,
}

/// The admin dashboard summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// All non-cancelled orders ever placed.
    pub total_orders: u64,
    /// Products in the catalog.
    pub total_products: u64,
    /// Categories in the catalog.
    pub total_categories: u64,
    /// Registered users.
    pub total_users: u64,
    /// Revenue across all non-cancelled orders.
    pub total_revenue: Decimal,
    /// Orders placed today.
    pub today_orders: u64,
    /// Revenue from today's orders.
    pub today_revenue: Decimal,
    /// Orders placed in the last 7 days.
    pub week_orders: u64,
    /// Revenue from the last 7 days.
    pub week_revenue: Decimal,
    /// Orders placed in the last month.
    pub month_orders: u64,
    /// Revenue from the last month.
    pub month_revenue: Decimal,
    /// Mean order total, rounded to cents.
    pub average_order_value: Decimal,
    /// Products with stock between 1 and the low-stock threshold.
    pub low_stock_products_count: u64,
    /// Products with zero stock.
    pub out_of_stock_products_count: u64,
    /// Orders currently pending.
    pub pending_orders_count: u64,
    /// All orders (cancelled included) bucketed by status name.
    pub orders_by_status: BTreeMap<String, u64>,
    /// The five most recently placed orders, cancelled included.
    pub recent_orders: Vec<RecentOrder>,
}

/// Severity of a dashboard alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Something needs attention soon.
    Warning,
    /// Informational.
    Info,
    /// Something is already broken.
    Error,
}

/// A dashboard alert about a critical catalog or ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAlert {
    /// Severity.
    pub kind: AlertKind,
    /// Human-readable message.
    pub message: String,
    /// How many records triggered the alert.
    pub count: u64,
}

fn is_counted(order: &Order) -> bool {
    order.status != OrderStatus::Cancelled
}

fn order_day(order: &Order) -> NaiveDate {
    order.created_at.as_datetime().date_naive()
}

fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    }
}

fn items_sold(order: &Order) -> u64 {
    order
        .items
        .iter()
        .map(|item| u64::from(u32::from(item.quantity)))
        .sum()
}

#[derive(Default)]
struct DayAccum {
    orders: u64,
    revenue: Decimal,
    items: u64,
}

fn group_daily<'a, I>(orders: I) -> BTreeMap<NaiveDate, DayAccum>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut days: BTreeMap<NaiveDate, DayAccum> = BTreeMap::new();
    for order in orders {
        let day = days.entry(order_day(order)).or_default();
        day.orders += 1;
        day.revenue += order.total_amount.amount();
        day.items += items_sold(order);
    }
    days
}

fn day_report(date: NaiveDate, accum: &DayAccum) -> DailySales {
    DailySales {
        date,
        orders_count: accum.orders,
        total_revenue: accum.revenue,
        items_sold: accum.items,
        average_order_value: average(accum.revenue, accum.orders),
    }
}

/// Daily sales for all non-cancelled orders on or after `from`, newest day
/// first.
pub fn daily_sales(orders: &[Order], from: NaiveDate) -> Vec<DailySales> {
    let days = group_daily(
        orders
            .iter()
            .filter(|order| is_counted(order) && order_day(order) >= from),
    );
    days.iter()
        .rev()
        .map(|(date, accum)| day_report(*date, accum))
        .collect()
}

/// Period totals with a per-day breakdown (oldest day first) over
/// non-cancelled orders placed between `from` and `to`, both inclusive.
pub fn period_report(orders: &[Order], from: NaiveDate, to: NaiveDate) -> PeriodReport {
    let in_range: Vec<&Order> = orders
        .iter()
        .filter(|order| {
            let day = order_day(order);
            is_counted(order) && day >= from && day <= to
        })
        .collect();

    let total_orders = in_range.len() as u64;
    let total_revenue: Decimal = in_range
        .iter()
        .map(|order| order.total_amount.amount())
        .sum();
    let total_items_sold: u64 = in_range.iter().map(|order| items_sold(order)).sum();

    let daily = group_daily(in_range.iter().copied())
        .iter()
        .map(|(date, accum)| day_report(*date, accum))
        .collect();

    PeriodReport {
        from,
        to,
        total_orders,
        total_revenue,
        total_items_sold,
        average_order_value: average(total_revenue, total_orders),
        daily,
    }
}

/// Monthly revenue for non-cancelled orders on or after `from`, newest month
/// first.
pub fn monthly_revenue(orders: &[Order], from: NaiveDate) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<(i32, u32), DayAccum> = BTreeMap::new();
    for order in orders
        .iter()
        .filter(|order| is_counted(order) && order_day(order) >= from)
    {
        let day = order_day(order);
        let month = months.entry((day.year(), day.month())).or_default();
        month.orders += 1;
        month.revenue += order.total_amount.amount();
        month.items += items_sold(order);
    }

    months
        .iter()
        .rev()
        .map(|(&(year, month), accum)| MonthlyRevenue {
            year,
            month,
            month_name: Month::try_from(u8::try_from(month).unwrap_or(1))
                .map_or_else(|_| month.to_string(), |m| m.name().to_string()),
            orders_count: accum.orders,
            total_revenue: accum.revenue,
            items_sold: accum.items,
        })
        .collect()
}

/// The `limit` best-selling products between `from` and `to` inclusive, by
/// units sold.
///
/// Grouping is by `(product_id, snapshot name)`, so a product renamed
/// mid-range shows up once per name, exactly as its line items recorded it.
/// SKUs are resolved against the live catalog; products that have left it
/// report `"N/A"`.
pub fn top_products(
    orders: &[Order],
    products: &[Product],
    from: NaiveDate,
    to: NaiveDate,
    limit: usize,
) -> Vec<TopProduct> {
    let skus: HashMap<ProductId, &Product> =
        products.iter().map(|product| (product.id, product)).collect();

    struct ProductAccum {
        quantity: u64,
        revenue: Decimal,
        orders: HashSet<OrderId>,
    }

    let mut grouped: BTreeMap<(i64, String), ProductAccum> = BTreeMap::new();
    for order in orders.iter().filter(|order| {
        let day = order_day(order);
        is_counted(order) && day >= from && day <= to
    }) {
        for item in &order.items {
            let key = (
                i64::from(item.product_id),
                item.product_name.to_string(),
            );
            let accum = grouped.entry(key).or_insert_with(|| ProductAccum {
                quantity: 0,
                revenue: Decimal::ZERO,
                orders: HashSet::new(),
            });
            accum.quantity += u64::from(u32::from(item.quantity));
            accum.revenue += item.subtotal.amount();
            accum.orders.insert(order.id);
        }
    }

    let mut rows: Vec<TopProduct> = grouped
        .into_iter()
        .filter_map(|((raw_id, name), accum)| {
            let product_id = ProductId::try_new(raw_id).ok()?;
            Some(TopProduct {
                product_id,
                product_name: name,
                sku: skus
                    .get(&product_id)
                    .map_or_else(|| "N/A".to_string(), |p| p.sku.to_string()),
                total_quantity_sold: accum.quantity,
                total_revenue: accum.revenue,
                orders_count: accum.orders.len() as u64,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.total_quantity_sold.cmp(&a.total_quantity_sold));
    rows.truncate(limit);
    rows
}

/// Sales per catalog category between `from` and `to` inclusive, highest
/// revenue first.
///
/// Line items whose product (or whose product's category) has left the
/// catalog drop out, mirroring an inner join.
pub fn sales_by_category(
    orders: &[Order],
    products: &[Product],
    categories: &[Category],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<CategorySales> {
    let products_by_id: HashMap<ProductId, &Product> =
        products.iter().map(|product| (product.id, product)).collect();
    let categories_by_id: HashMap<CategoryId, &Category> = categories
        .iter()
        .map(|category| (category.id, category))
        .collect();

    struct CategoryAccum {
        products: HashSet<ProductId>,
        quantity: u64,
        revenue: Decimal,
        orders: HashSet<OrderId>,
        price_sum: Decimal,
        price_samples: u64,
    }

    let mut grouped: BTreeMap<i64, CategoryAccum> = BTreeMap::new();
    for order in orders.iter().filter(|order| {
        let day = order_day(order);
        is_counted(order) && day >= from && day <= to
    }) {
        for item in &order.items {
            let Some(product) = products_by_id.get(&item.product_id) else {
                continue;
            };
            let Some(category) = categories_by_id.get(&product.category_id) else {
                continue;
            };
            let accum = grouped
                .entry(i64::from(category.id))
                .or_insert_with(|| CategoryAccum {
                    products: HashSet::new(),
                    quantity: 0,
                    revenue: Decimal::ZERO,
                    orders: HashSet::new(),
                    price_sum: Decimal::ZERO,
                    price_samples: 0,
                });
            accum.products.insert(product.id);
            accum.quantity += u64::from(u32::from(item.quantity));
            accum.revenue += item.subtotal.amount();
            accum.orders.insert(order.id);
            accum.price_sum += item.price_at_purchase.amount();
            accum.price_samples += 1;
        }
    }

    let mut rows: Vec<CategorySales> = grouped
        .into_iter()
        .filter_map(|(raw_id, accum)| {
            let category_id = CategoryId::try_new(raw_id).ok()?;
            let category = categories_by_id.get(&category_id)?;
            Some(CategorySales {
                category_id,
                category_name: category.name.to_string(),
                products_count: accum.products.len() as u64,
                total_quantity_sold: accum.quantity,
                total_revenue: accum.revenue,
                orders_count: accum.orders.len() as u64,
                average_price: average(accum.price_sum, accum.price_samples),
            })
        })
        .collect();

    rows.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    rows
}

/// Order distribution by payment method between `from` and `to` inclusive,
/// highest revenue first.
pub fn payment_method_stats(
    orders: &[Order],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<PaymentMethodBreakdown> {
    let in_range: Vec<&Order> = orders
        .iter()
        .filter(|order| {
            let day = order_day(order);
            is_counted(order) && day >= from && day <= to
        })
        .collect();

    let total_revenue: Decimal = in_range
        .iter()
        .map(|order| order.total_amount.amount())
        .sum();

    let mut grouped: BTreeMap<String, (PaymentMethod, u64, Decimal)> = BTreeMap::new();
    for order in &in_range {
        let entry = grouped
            .entry(order.payment_method.to_string())
            .or_insert((order.payment_method, 0, Decimal::ZERO));
        entry.1 += 1;
        entry.2 += order.total_amount.amount();
    }

    let mut rows: Vec<PaymentMethodBreakdown> = grouped
        .into_values()
        .map(|(payment_method, orders_count, revenue)| PaymentMethodBreakdown {
            payment_method,
            orders_count,
            total_revenue: revenue,
            percentage: if total_revenue > Decimal::ZERO {
                (revenue / total_revenue * Decimal::from(100)).round_dp(2)
            } else {
                Decimal::ZERO
            },
        })
        .collect();

    rows.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    rows
}

/// The dashboard summary, computed at `now`.
pub fn dashboard(
    orders: &[Order],
    products: &[Product],
    total_categories: u64,
    total_users: u64,
    now: Timestamp,
) -> DashboardSummary {
    let today_start = now.as_datetime().date_naive();
    let week_start = today_start
        .checked_sub_days(Days::new(7))
        .unwrap_or(today_start);
    let month_start = today_start
        .checked_sub_months(Months::new(1))
        .unwrap_or(today_start);

    let counted: Vec<&Order> = orders.iter().filter(|order| is_counted(order)).collect();
    let revenue_since = |start: NaiveDate| -> (u64, Decimal) {
        let subset: Vec<&&Order> = counted
            .iter()
            .filter(|order| order_day(order) >= start)
            .collect();
        (
            subset.len() as u64,
            subset.iter().map(|order| order.total_amount.amount()).sum(),
        )
    };

    let total_revenue: Decimal = counted
        .iter()
        .map(|order| order.total_amount.amount())
        .sum();
    let (today_orders, today_revenue) = revenue_since(today_start);
    let (week_orders, week_revenue) = revenue_since(week_start);
    let (month_orders, month_revenue) = revenue_since(month_start);

    let mut orders_by_status: BTreeMap<String, u64> = BTreeMap::new();
    for order in orders {
        *orders_by_status.entry(order.status.to_string()).or_insert(0) += 1;
    }

    let mut recent: Vec<&Order> = orders.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent_orders = recent
        .into_iter()
        .take(5)
        .map(|order| RecentOrder {
            id: order.id,
            customer_name: order.customer_name.to_string(),
            total_amount: order.total_amount.amount(),
            status: order.status,
            created_at: order.created_at,
        })
        .collect();

    DashboardSummary {
        total_orders: counted.len() as u64,
        total_products: products.len() as u64,
        total_categories,
        total_users,
        total_revenue,
        today_orders,
        today_revenue,
        week_orders,
        week_revenue,
        month_orders,
        month_revenue,
        average_order_value: average(total_revenue, counted.len() as u64),
        low_stock_products_count: products
            .iter()
            .filter(|p| !p.stock.is_empty() && p.stock.value() <= LOW_STOCK_THRESHOLD)
            .count() as u64,
        out_of_stock_products_count: products.iter().filter(|p| p.stock.is_empty()).count() as u64,
        pending_orders_count: orders_by_status
            .get(&OrderStatus::Pending.to_string())
            .copied()
            .unwrap_or(0),
        orders_by_status,
        recent_orders,
    }
}

/// Alerts about critical catalog and ledger states.
pub fn alerts(orders: &[Order], products: &[Product]) -> Vec<DashboardAlert> {
    let mut list = Vec::new();

    let low_stock = products
        .iter()
        .filter(|p| !p.stock.is_empty() && p.stock.value() <= LOW_STOCK_THRESHOLD)
        .count() as u64;
    if low_stock > 0 {
        list.push(DashboardAlert {
            kind: AlertKind::Warning,
            message: "Products running low on stock".to_string(),
            count: low_stock,
        });
    }

    let out_of_stock = products.iter().filter(|p| p.stock.is_empty()).count() as u64;
    if out_of_stock > 0 {
        list.push(DashboardAlert {
            kind: AlertKind::Error,
            message: "Products out of stock".to_string(),
            count: out_of_stock,
        });
    }

    let pending = orders
        .iter()
        .filter(|order| order.status == OrderStatus::Pending)
        .count() as u64;
    if pending > 0 {
        list.push(DashboardAlert {
            kind: AlertKind::Info,
            message: "Orders awaiting processing".to_string(),
            count: pending,
        });
    }

    list
}

/// Admin-gated reporting over a store.
#[derive(Debug, Clone)]
pub struct ReportingService<S> {
    store: S,
}

impl<S> ReportingService<S>
where
    S: OrderStore + CatalogStore + UserStore,
{
    /// Creates the service over a store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    fn window(from: Option<Timestamp>, to: Option<Timestamp>) -> (NaiveDate, NaiveDate) {
        let now = Timestamp::now();
        let from_date = from
            .map(|t| t.as_datetime().date_naive())
            .unwrap_or_else(|| {
                now.as_datetime()
                    .checked_sub_months(Months::new(1))
                    .unwrap_or_else(|| *now.as_datetime())
                    .date_naive()
            });
        let to_date = to
            .map(|t| t.as_datetime().date_naive())
            .unwrap_or_else(|| now.as_datetime().date_naive());
        (from_date, to_date)
    }

    /// Daily sales over the trailing `days` days. Admin only.
    #[instrument(skip(self))]
    pub async fn daily_sales(
        &self,
        principal: &Principal,
        days: u64,
    ) -> ServiceResult<Vec<DailySales>> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let from = Timestamp::now()
            .as_datetime()
            .date_naive()
            .checked_sub_days(Days::new(days))
            .unwrap_or_else(|| Timestamp::now().as_datetime().date_naive());
        Ok(daily_sales(&orders, from))
    }

    /// Period totals with a daily breakdown. Admin only. Defaults to the
    /// trailing month.
    #[instrument(skip(self))]
    pub async fn period_sales(
        &self,
        principal: &Principal,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> ServiceResult<PeriodReport> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let (from, to) = Self::window(from, to);
        Ok(period_report(&orders, from, to))
    }

    /// Monthly revenue over the trailing `months` months. Admin only.
    #[instrument(skip(self))]
    pub async fn monthly_revenue(
        &self,
        principal: &Principal,
        months: u32,
    ) -> ServiceResult<Vec<MonthlyRevenue>> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let now = Timestamp::now();
        let from = now
            .as_datetime()
            .checked_sub_months(Months::new(months))
            .unwrap_or_else(|| *now.as_datetime())
            .date_naive();
        Ok(monthly_revenue(&orders, from))
    }

    /// The best-selling products in a range. Admin only.
    #[instrument(skip(self))]
    pub async fn top_products(
        &self,
        principal: &Principal,
        limit: usize,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> ServiceResult<Vec<TopProduct>> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let products = self.store.list_products().await?;
        let (from, to) = Self::window(from, to);
        Ok(top_products(&orders, &products, from, to, limit))
    }

    /// Sales per category in a range. Admin only.
    #[instrument(skip(self))]
    pub async fn sales_by_category(
        &self,
        principal: &Principal,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> ServiceResult<Vec<CategorySales>> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let products = self.store.list_products().await?;
        let categories = self.store.list_categories().await?;
        let (from, to) = Self::window(from, to);
        Ok(sales_by_category(&orders, &products, &categories, from, to))
    }

    /// Order distribution by payment method in a range. Admin only.
    #[instrument(skip(self))]
    pub async fn payment_method_stats(
        &self,
        principal: &Principal,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> ServiceResult<Vec<PaymentMethodBreakdown>> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let (from, to) = Self::window(from, to);
        Ok(payment_method_stats(&orders, from, to))
    }

    /// The dashboard summary. Admin only.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, principal: &Principal) -> ServiceResult<DashboardSummary> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let products = self.store.list_products().await?;
        let categories = self.store.list_categories().await?;
        let users = self.store.count_users().await?;
        Ok(dashboard(
            &orders,
            &products,
            categories.len() as u64,
            users,
            Timestamp::now(),
        ))
    }

    /// Dashboard alerts. Admin only.
    #[instrument(skip(self))]
    pub async fn alerts(&self, principal: &Principal) -> ServiceResult<Vec<DashboardAlert>> {
        require_admin(principal)?;
        let orders = self.store.list_orders(&OrderFilter::all()).await?;
        let products = self.store.list_products().await?;
        Ok(alerts(&orders, &products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CustomerName, CustomerPhone, DeliveryAddress, Money, OrderItemId, ProductName, Quantity,
        RecordVersion, Sku, StockLevel, UserId,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn order(id: i64, day: u32, status: OrderStatus, total: Decimal, items: Vec<(i64, u32, Decimal)>) -> Order {
        let created = Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap();
        let order_id = OrderId::try_new(id).unwrap();
        Order {
            id: order_id,
            user_id: UserId::try_new(1).unwrap(),
            customer_name: CustomerName::try_new("Jane Doe").unwrap(),
            customer_phone: CustomerPhone::try_new("+1 555 0100").unwrap(),
            delivery_address: DeliveryAddress::try_new("1 Long Street, Springfield").unwrap(),
            payment_method: if id % 2 == 0 {
                PaymentMethod::Card
            } else {
                PaymentMethod::Cash
            },
            total_amount: Money::new(total).unwrap(),
            status,
            created_at: Timestamp::new(created),
            updated_at: None,
            version: RecordVersion::initial(),
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, (product_id, quantity, price))| {
                    let quantity = Quantity::try_new(quantity).unwrap();
                    let price = Money::new(price).unwrap();
                    OrderItem {
                        id: OrderItemId::try_new(i as i64 + 1).unwrap(),
                        order_id,
                        product_id: ProductId::try_new(product_id).unwrap(),
                        product_name: ProductName::try_new(format!("Product {product_id}"))
                            .unwrap(),
                        price_at_purchase: price,
                        quantity,
                        subtotal: price.times(quantity).unwrap(),
                    }
                })
                .collect(),
        }
    }

    use crate::ledger::OrderItem;

    fn product(id: i64, category: i64, stock: u32) -> Product {
        Product {
            id: ProductId::try_new(id).unwrap(),
            name: ProductName::try_new(format!("Product {id}")).unwrap(),
            description: None,
            price: Money::new(dec!(10.00)).unwrap(),
            stock: StockLevel::new(stock),
            sku: Sku::try_new(format!("SKU-{id}")).unwrap(),
            category_id: CategoryId::try_new(category).unwrap(),
            version: RecordVersion::initial(),
        }
    }

    fn category(id: i64, name: &str) -> Category {
        Category {
            id: CategoryId::try_new(id).unwrap(),
            name: crate::types::CategoryName::try_new(name).unwrap(),
            description: None,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn daily_sales_excludes_cancelled_orders() {
        let orders = vec![
            order(1, 10, OrderStatus::Pending, dec!(100.00), vec![(1, 2, dec!(50.00))]),
            order(2, 10, OrderStatus::Cancelled, dec!(900.00), vec![(1, 9, dec!(100.00))]),
            order(3, 11, OrderStatus::Completed, dec!(50.00), vec![(1, 1, dec!(50.00))]),
        ];

        let report = daily_sales(&orders, date(1));
        assert_eq!(report.len(), 2);
        // Newest first.
        assert_eq!(report[0].date, date(11));
        assert_eq!(report[0].total_revenue, dec!(50.00));
        assert_eq!(report[1].date, date(10));
        assert_eq!(report[1].orders_count, 1);
        assert_eq!(report[1].total_revenue, dec!(100.00));
        assert_eq!(report[1].items_sold, 2);
    }

    #[test]
    fn period_report_totals_and_breakdown() {
        let orders = vec![
            order(1, 5, OrderStatus::Pending, dec!(100.00), vec![(1, 1, dec!(100.00))]),
            order(2, 6, OrderStatus::Completed, dec!(200.00), vec![(1, 2, dec!(100.00))]),
            order(3, 20, OrderStatus::Pending, dec!(400.00), vec![(1, 4, dec!(100.00))]),
        ];

        let report = period_report(&orders, date(1), date(10));
        assert_eq!(report.total_orders, 2);
        assert_eq!(report.total_revenue, dec!(300.00));
        assert_eq!(report.total_items_sold, 3);
        assert_eq!(report.average_order_value, dec!(150.00));
        // Oldest first.
        assert_eq!(report.daily[0].date, date(5));
        assert_eq!(report.daily[1].date, date(6));
    }

    #[test]
    fn monthly_revenue_groups_by_month() {
        let mut orders = vec![
            order(1, 1, OrderStatus::Pending, dec!(10.00), vec![(1, 1, dec!(10.00))]),
            order(2, 28, OrderStatus::Pending, dec!(20.00), vec![(1, 2, dec!(10.00))]),
        ];
        // Push one order into July.
        orders.push({
            let mut o = order(3, 15, OrderStatus::Pending, dec!(30.00), vec![(1, 3, dec!(10.00))]);
            o.created_at =
                Timestamp::new(Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap());
            o
        });

        let report = monthly_revenue(&orders, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(report.len(), 2);
        // Newest month first.
        assert_eq!((report[0].year, report[0].month), (2025, 7));
        assert_eq!(report[0].month_name, "July");
        assert_eq!(report[0].total_revenue, dec!(30.00));
        assert_eq!((report[1].year, report[1].month), (2025, 6));
        assert_eq!(report[1].total_revenue, dec!(30.00));
        assert_eq!(report[1].items_sold, 3);
    }

    #[test]
    fn top_products_sorts_by_quantity_and_falls_back_sku() {
        let orders = vec![
            order(1, 10, OrderStatus::Pending, dec!(100.00), vec![(1, 2, dec!(10.00)), (2, 5, dec!(16.00))]),
            order(2, 11, OrderStatus::Pending, dec!(30.00), vec![(1, 3, dec!(10.00))]),
        ];
        // Product 2 left the catalog.
        let products = vec![product(1, 1, 5)];

        let report = top_products(&orders, &products, date(1), date(30), 10);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].total_quantity_sold, 5);
        assert_eq!(report[1].total_quantity_sold, 5);
        let missing = report.iter().find(|p| p.sku == "N/A").unwrap();
        assert_eq!(i64::from(missing.product_id), 2);
        let present = report.iter().find(|p| p.sku == "SKU-1").unwrap();
        assert_eq!(present.orders_count, 2);
        assert_eq!(present.total_revenue, dec!(50.00));
    }

    #[test]
    fn sales_by_category_drops_orphaned_items() {
        let orders = vec![order(
            1,
            10,
            OrderStatus::Pending,
            dec!(100.00),
            vec![(1, 2, dec!(10.00)), (99, 1, dec!(80.00))],
        )];
        let products = vec![product(1, 1, 5)];
        let categories = vec![category(1, "Electronics")];

        let report = sales_by_category(&orders, &products, &categories, date(1), date(30));
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].category_name, "Electronics");
        assert_eq!(report[0].total_quantity_sold, 2);
        assert_eq!(report[0].total_revenue, dec!(20.00));
        assert_eq!(report[0].average_price, dec!(10.00));
    }

    #[test]
    fn payment_method_percentages_sum_to_hundred() {
        let orders = vec![
            order(2, 10, OrderStatus::Pending, dec!(75.00), vec![(1, 1, dec!(75.00))]),
            order(3, 10, OrderStatus::Pending, dec!(25.00), vec![(1, 1, dec!(25.00))]),
        ];

        let report = payment_method_stats(&orders, date(1), date(30));
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].payment_method, PaymentMethod::Card);
        assert_eq!(report[0].percentage, dec!(75.00));
        assert_eq!(report[1].percentage, dec!(25.00));
    }

    #[test]
    fn dashboard_counts_statuses_over_all_orders() {
        let orders = vec![
            order(1, 10, OrderStatus::Pending, dec!(100.00), vec![(1, 1, dec!(100.00))]),
            order(2, 11, OrderStatus::Cancelled, dec!(50.00), vec![(1, 1, dec!(50.00))]),
        ];
        let products = vec![product(1, 1, 5), product(2, 1, 0)];
        let now = Timestamp::new(Utc.with_ymd_and_hms(2025, 6, 12, 0, 0, 0).unwrap());

        let summary = dashboard(&orders, &products, 3, 4, now);
        assert_eq!(summary.total_orders, 1); // cancelled excluded
        assert_eq!(summary.total_revenue, dec!(100.00));
        assert_eq!(summary.orders_by_status.get("Cancelled"), Some(&1));
        assert_eq!(summary.pending_orders_count, 1);
        assert_eq!(summary.low_stock_products_count, 1);
        assert_eq!(summary.out_of_stock_products_count, 1);
        assert_eq!(summary.total_categories, 3);
        assert_eq!(summary.total_users, 4);
        assert_eq!(summary.recent_orders.len(), 2);
        assert_eq!(i64::from(summary.recent_orders[0].id), 2);
    }

    #[test]
    fn alerts_cover_stock_and_pending() {
        let orders = vec![order(1, 10, OrderStatus::Pending, dec!(10.00), vec![(1, 1, dec!(10.00))])];
        let products = vec![product(1, 1, 3), product(2, 1, 0)];

        let list = alerts(&orders, &products);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].kind, AlertKind::Warning);
        assert_eq!(list[1].kind, AlertKind::Error);
        assert_eq!(list[2].kind, AlertKind::Info);
        assert!(list.iter().all(|alert| alert.count == 1));
    }

    #[test]
    fn empty_ledger_produces_empty_reports() {
        assert!(daily_sales(&[], date(1)).is_empty());
        let report = period_report(&[], date(1), date(30));
        assert_eq!(report.total_orders, 0);
        assert_eq!(report.average_order_value, Decimal::ZERO);
        assert!(payment_method_stats(&[], date(1), date(30)).is_empty());
    }
}
