//! Account management and reporting tests against the in-memory store.

use ordercore::types::{
    CategoryName, CustomerName, CustomerPhone, DeliveryAddress, Login, Money, ProductName,
    Quantity, Sku, StockLevel, UserId, Username,
};
use ordercore::{
    AccessGate, CatalogService, NewCategory, NewProduct, OrderLedger, OrderLine, OrderStatus,
    PaymentMethod, PlaceOrder, Principal, Registration, ReportingService, ReviewDraft, Role,
    ServiceError, StaticCredentials, UserDirectory,
};
use ordercore_memory::InMemoryStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn admin() -> Principal {
    Principal::new(UserId::try_new(1).unwrap(), Role::Admin)
}

fn registration(login: &str, name: &str, role: Role) -> Registration {
    Registration {
        login: Login::try_new(login).unwrap(),
        username: Username::try_new(name).unwrap(),
        password: "password123".to_string(),
        role,
    }
}

#[tokio::test]
async fn register_login_and_authenticate() {
    let store = InMemoryStore::new();
    let credentials = Arc::new(StaticCredentials::new());
    let directory = UserDirectory::new(store, credentials.clone());

    let user = directory
        .register(registration("jane@example.com", "Jane", Role::User))
        .await
        .unwrap();
    assert_eq!(user.role, Role::User);

    // Duplicate login is rejected.
    assert!(matches!(
        directory
            .register(registration("jane@example.com", "Imposter", Role::User))
            .await,
        Err(ServiceError::DuplicateLogin(_))
    ));

    let session = directory
        .login(&Login::try_new("jane@example.com").unwrap(), "password123")
        .await
        .unwrap();
    assert_eq!(session.user.id, user.id);

    // The issued token resolves back to the same principal.
    let gate = AccessGate::new(credentials);
    let principal = gate.authenticate(&session.token).await.unwrap();
    assert_eq!(principal.user_id, user.id);
    assert_eq!(principal.role, Role::User);

    // Wrong password and unknown login are indistinguishable.
    assert!(matches!(
        directory
            .login(&Login::try_new("jane@example.com").unwrap(), "wrong")
            .await,
        Err(ServiceError::InvalidCredentials)
    ));
    assert!(matches!(
        directory
            .login(&Login::try_new("ghost@example.com").unwrap(), "password123")
            .await,
        Err(ServiceError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let store = InMemoryStore::new();
    let credentials = Arc::new(StaticCredentials::new());
    let directory = UserDirectory::new(store, credentials);

    let user = directory
        .register(registration("jane@example.com", "Jane", Role::User))
        .await
        .unwrap();
    let principal = user.principal();

    assert!(matches!(
        directory
            .change_password(&principal, "wrong", "newpassword")
            .await,
        Err(ServiceError::InvalidCredentials)
    ));

    directory
        .change_password(&principal, "password123", "newpassword")
        .await
        .unwrap();

    let login = Login::try_new("jane@example.com").unwrap();
    assert!(directory.login(&login, "password123").await.is_err());
    assert!(directory.login(&login, "newpassword").await.is_ok());
}

#[tokio::test]
async fn reviews_require_an_existing_product_and_record_the_author() {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store);

    let category = catalog
        .create_category(
            &admin(),
            NewCategory {
                name: CategoryName::try_new("Electronics").unwrap(),
                description: None,
            },
        )
        .await
        .unwrap();
    let product = catalog
        .create_product(
            &admin(),
            NewProduct {
                name: ProductName::try_new("Laptop").unwrap(),
                description: None,
                price: Money::new(dec!(100.00)).unwrap(),
                stock: StockLevel::new(10),
                sku: Sku::try_new("LAPTOP").unwrap(),
                category_id: category.id,
            },
        )
        .await
        .unwrap();

    let reviewer = Principal::new(UserId::try_new(7).unwrap(), Role::User);
    let draft = ReviewDraft {
        author_name: ordercore::types::AuthorName::try_new("Jane").unwrap(),
        rating: ordercore::types::Rating::try_new(5).unwrap(),
        comment: ordercore::types::ReviewComment::try_new("Great laptop").unwrap(),
    };

    let review = catalog
        .add_review(&reviewer, product.id, draft.clone())
        .await
        .unwrap();
    assert_eq!(review.author_id, reviewer.user_id);
    assert!(review.updated_at.is_none());

    assert!(matches!(
        catalog
            .add_review(&reviewer, ordercore::ProductId::try_new(404).unwrap(), draft)
            .await,
        Err(ServiceError::ProductNotFound(_))
    ));

    // A product with reviews cannot be deleted.
    assert!(matches!(
        catalog.delete_product(&admin(), product.id).await,
        Err(ServiceError::ProductInUse(_))
    ));
}

#[tokio::test]
async fn category_with_products_cannot_be_deleted() {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store);

    let category = catalog
        .create_category(
            &admin(),
            NewCategory {
                name: CategoryName::try_new("Electronics").unwrap(),
                description: None,
            },
        )
        .await
        .unwrap();
    catalog
        .create_product(
            &admin(),
            NewProduct {
                name: ProductName::try_new("Laptop").unwrap(),
                description: None,
                price: Money::new(dec!(100.00)).unwrap(),
                stock: StockLevel::new(10),
                sku: Sku::try_new("LAPTOP").unwrap(),
                category_id: category.id,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        catalog.delete_category(&admin(), category.id).await,
        Err(ServiceError::CategoryInUse(_))
    ));

    // Non-admins cannot mutate the catalog at all.
    let user = Principal::new(UserId::try_new(9).unwrap(), Role::User);
    assert!(matches!(
        catalog.delete_category(&user, category.id).await,
        Err(ServiceError::Forbidden)
    ));
}

#[tokio::test]
async fn reporting_reflects_placed_orders_and_is_admin_gated() {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store.clone());

    let category = catalog
        .create_category(
            &admin(),
            NewCategory {
                name: CategoryName::try_new("Electronics").unwrap(),
                description: None,
            },
        )
        .await
        .unwrap();
    let product = catalog
        .create_product(
            &admin(),
            NewProduct {
                name: ProductName::try_new("Laptop").unwrap(),
                description: None,
                price: Money::new(dec!(100.00)).unwrap(),
                stock: StockLevel::new(50),
                sku: Sku::try_new("LAPTOP").unwrap(),
                category_id: category.id,
            },
        )
        .await
        .unwrap();

    let ledger = OrderLedger::new(store.clone());
    let caller = Principal::new(UserId::try_new(2).unwrap(), Role::User);
    for quantity in [1u32, 2, 3] {
        ledger
            .place_order(
                &caller,
                PlaceOrder {
                    customer_name: CustomerName::try_new("Jane Doe").unwrap(),
                    customer_phone: CustomerPhone::try_new("+1 555 0100").unwrap(),
                    delivery_address: DeliveryAddress::try_new("1 Long Street, Springfield")
                        .unwrap(),
                    payment_method: PaymentMethod::Card,
                    items: vec![OrderLine {
                        product_id: product.id,
                        quantity: Quantity::try_new(quantity).unwrap(),
                    }],
                },
            )
            .await
            .unwrap();
    }

    // Cancel the last order; it must vanish from revenue but stay in the
    // status breakdown.
    let orders = ledger.list_orders(&admin()).await.unwrap();
    ledger
        .update_status(&admin(), orders[0].id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let reporting = ReportingService::new(store);

    assert!(matches!(
        reporting.dashboard(&caller).await,
        Err(ServiceError::Forbidden)
    ));

    let summary = reporting.dashboard(&admin()).await.unwrap();
    assert_eq!(summary.total_orders, 2);
    assert_eq!(summary.total_revenue, dec!(300.00));
    assert_eq!(summary.orders_by_status.get("Cancelled"), Some(&1));
    assert_eq!(summary.recent_orders.len(), 3);

    let daily = reporting.daily_sales(&admin(), 30).await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].orders_count, 2);
    assert_eq!(daily[0].total_revenue, dec!(300.00));
    assert_eq!(daily[0].items_sold, 3);

    let top = reporting
        .top_products(&admin(), 10, None, None)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].sku, "LAPTOP");
    assert_eq!(top[0].total_quantity_sold, 3);

    let by_category = reporting
        .sales_by_category(&admin(), None, None)
        .await
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].category_name, "Electronics");
    assert_eq!(by_category[0].total_revenue, dec!(300.00));

    let methods = reporting
        .payment_method_stats(&admin(), None, None)
        .await
        .unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].payment_method, PaymentMethod::Card);
    assert_eq!(methods[0].percentage, dec!(100.00));
}
