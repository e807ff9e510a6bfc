//! Inventory reservation logic.
//!
//! Pure planning functions invoked by the order ledger; nothing here touches
//! the store. Given products that were already fetched (version included),
//! they compute the guarded stock writes for a commit:
//!
//! - [`reserve`] validates every requested quantity against available stock
//!   *before* producing a single write (reject-first, fail-fast), so no
//!   rollback of earlier lines is ever needed;
//! - [`restock`] is the inverse: unconditional addition with no upper bound
//!   check. It is not idempotent — running the same plan twice restocks
//!   twice — so the transaction layer must guard against duplicate
//!   invocation.

use crate::catalog::Product;
use crate::errors::{ServiceError, ServiceResult};
use crate::ledger::OrderItem;
use crate::store::StockWrite;
use crate::types::{ProductId, Quantity};
use std::collections::HashMap;

/// One requested order line resolved against the catalog.
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    /// The product as read from the store, version included.
    pub product: Product,
    /// Units requested.
    pub quantity: Quantity,
}

/// Plans the stock decrements for an order placement.
///
/// Lines referencing the same product are aggregated: the availability check
/// runs against the summed quantity and a single write is produced per
/// product. Returns [`ServiceError::InsufficientStock`] for the first line
/// whose aggregate exceeds availability; in that case no write is produced
/// at all.
pub fn reserve(lines: &[ResolvedLine]) -> ServiceResult<Vec<StockWrite>> {
    // Aggregate per product, preserving first-seen order for error reporting.
    let mut order: Vec<ProductId> = Vec::new();
    let mut requested: HashMap<ProductId, u64> = HashMap::new();
    let mut products: HashMap<ProductId, &Product> = HashMap::new();

    for line in lines {
        let id = line.product.id;
        let entry = requested.entry(id).or_insert_with(|| {
            order.push(id);
            products.insert(id, &line.product);
            0
        });
        *entry += u64::from(u32::from(line.quantity));
    }

    let mut writes = Vec::with_capacity(order.len());
    for id in order {
        let product = products[&id];
        let total = requested[&id];
        let total_quantity = u32::try_from(total)
            .ok()
            .and_then(|units| Quantity::try_new(units).ok());
        let remaining = total_quantity.and_then(|quantity| product.stock.reserve(quantity));

        match remaining {
            Some(stock) => writes.push(StockWrite {
                product_id: id,
                stock,
                expected_version: product.version,
            }),
            None => {
                return Err(ServiceError::InsufficientStock {
                    product_id: id,
                    name: product.name.clone(),
                    available: product.stock,
                    requested: total,
                })
            }
        }
    }

    Ok(writes)
}

/// Plans the stock increments for an order deletion.
///
/// `products` holds the current state of every product that still exists;
/// items whose product has since been removed from the catalog are skipped
/// rather than treated as an error. Items referencing the same product are
/// folded into one write.
pub fn restock(items: &[OrderItem], products: &[Product]) -> Vec<StockWrite> {
    let by_id: HashMap<ProductId, &Product> =
        products.iter().map(|product| (product.id, product)).collect();

    let mut order: Vec<ProductId> = Vec::new();
    let mut levels: HashMap<ProductId, StockWrite> = HashMap::new();

    for item in items {
        let Some(product) = by_id.get(&item.product_id) else {
            continue;
        };
        let write = levels.entry(item.product_id).or_insert_with(|| {
            order.push(item.product_id);
            StockWrite {
                product_id: item.product_id,
                stock: product.stock,
                expected_version: product.version,
            }
        });
        write.stock = write.stock.restock(item.quantity);
    }

    order
        .into_iter()
        .map(|id| levels[&id])
        .collect()
}
