//! Storefront demo: seeds a small catalog, registers users, places and
//! fulfills orders, and prints the admin dashboard.
//!
//! Run with: `cargo run --example storefront_demo`

use anyhow::Result;
use ordercore::types::{
    CategoryName, CustomerName, CustomerPhone, DeliveryAddress, Login, ProductName, Quantity,
    Sku, StockLevel, Username,
};
use ordercore::{
    AccessGate, CatalogService, NewCategory, NewProduct, OrderLedger, OrderLine, OrderStatus,
    PaymentMethod, PlaceOrder, Registration, ReportingService, Role, StaticCredentials,
    UserDirectory,
};
use ordercore_memory::InMemoryStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = InMemoryStore::new();
    let credentials = Arc::new(StaticCredentials::new());

    let directory = UserDirectory::new(store.clone(), credentials.clone());
    let catalog = CatalogService::new(store.clone());
    let ledger = OrderLedger::new(store.clone());
    let reporting = ReportingService::new(store);
    let gate = AccessGate::new(credentials);

    // Accounts.
    let admin = directory
        .register(Registration {
            login: Login::try_new("admin@store.example")?,
            username: Username::try_new("Administrator")?,
            password: "admin-password".to_string(),
            role: Role::Admin,
        })
        .await?;
    let shopper = directory
        .register(Registration {
            login: Login::try_new("jane@example.com")?,
            username: Username::try_new("Jane Doe")?,
            password: "password123".to_string(),
            role: Role::User,
        })
        .await?;

    let admin_session = directory
        .login(&admin.login, "admin-password")
        .await?;
    let admin_principal = gate.authenticate(&admin_session.token).await?;

    let shopper_session = directory.login(&shopper.login, "password123").await?;
    let shopper_principal = gate.authenticate(&shopper_session.token).await?;

    // Catalog.
    let electronics = catalog
        .create_category(
            &admin_principal,
            NewCategory {
                name: CategoryName::try_new("Electronics")?,
                description: Some("Computers and accessories".to_string()),
            },
        )
        .await?;

    let laptop = catalog
        .create_product(
            &admin_principal,
            NewProduct {
                name: ProductName::try_new("Laptop 15\"")?,
                description: Some("16 GB RAM, 1 TB SSD".to_string()),
                price: "999.99".parse()?,
                stock: StockLevel::new(10),
                sku: Sku::try_new("LAPTOP-15-1TB")?,
                category_id: electronics.id,
            },
        )
        .await?;
    let mouse = catalog
        .create_product(
            &admin_principal,
            NewProduct {
                name: ProductName::try_new("Wireless Mouse")?,
                description: None,
                price: "24.90".parse()?,
                stock: StockLevel::new(100),
                sku: Sku::try_new("MOUSE-W1")?,
                category_id: electronics.id,
            },
        )
        .await?;

    // Place an order as the shopper.
    let order = ledger
        .place_order(
            &shopper_principal,
            PlaceOrder {
                customer_name: CustomerName::try_new("Jane Doe")?,
                customer_phone: CustomerPhone::try_new("+1 555 0100")?,
                delivery_address: DeliveryAddress::try_new("1 Long Street, Springfield")?,
                payment_method: PaymentMethod::Card,
                items: vec![
                    OrderLine {
                        product_id: laptop.id,
                        quantity: Quantity::try_new(1)?,
                    },
                    OrderLine {
                        product_id: mouse.id,
                        quantity: Quantity::try_new(2)?,
                    },
                ],
            },
        )
        .await?;
    println!(
        "placed order {} for {} ({} items)",
        order.id,
        order.total_amount,
        order.items.len()
    );

    // Move it through the lifecycle.
    let processed = ledger
        .update_status(&admin_principal, order.id, OrderStatus::Processing)
        .await?;
    println!("order {} is now {}", processed.id, processed.status);

    let remaining = catalog.get_product(laptop.id).await?;
    println!(
        "laptop stock after placement: {} (was 10)",
        remaining.stock
    );

    // Admin-side reporting.
    let summary = reporting.dashboard(&admin_principal).await?;
    println!(
        "dashboard: {} orders, revenue {}, {} products, {} users",
        summary.total_orders, summary.total_revenue, summary.total_products, summary.total_users
    );
    for alert in reporting.alerts(&admin_principal).await? {
        println!("alert [{:?}] {} ({})", alert.kind, alert.message, alert.count);
    }

    Ok(())
}
