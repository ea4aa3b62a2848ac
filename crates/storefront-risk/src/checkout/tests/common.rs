use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::checkout::admin::AdminService;
use crate::checkout::domain::{
    CartLine, CheckoutRequest, CustomerId, CustomerProfile, OrderId, OrderRecord, OrderStatus,
    ProductId, ShippingAddress,
};
use crate::checkout::memory::MemoryStorefront;
use crate::checkout::repository::{BlocklistRepository, OrderRepository};
use crate::checkout::risk::{
    BlocklistEntry, BlocklistKind, BlocklistSeverity, NewBlocklistEntry, RiskEvaluator, RiskRules,
};
use crate::checkout::router::checkout_router;
use crate::checkout::service::CheckoutService;
use crate::config::CheckoutConfig;

pub(super) const PHONE: &str = "01712345678";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn customer_id(suffix: &str) -> CustomerId {
    CustomerId(format!("cust-{suffix}"))
}

pub(super) fn established_profile(suffix: &str) -> CustomerProfile {
    let mut profile = CustomerProfile::new(customer_id(suffix), now() - Duration::days(120));
    profile.total_orders = 8;
    profile.delivered_orders = 7;
    profile
}

pub(super) fn new_profile(suffix: &str) -> CustomerProfile {
    CustomerProfile::new(customer_id(suffix), now() - Duration::hours(1))
}

pub(super) fn address() -> ShippingAddress {
    ShippingAddress {
        address: "House 12, Road 4".to_string(),
        area: Some("Dhanmondi".to_string()),
        city: Some("Dhaka".to_string()),
        district: Some("Dhaka".to_string()),
        ..ShippingAddress::default()
    }
}

pub(super) fn request(customer: &CustomerId) -> CheckoutRequest {
    CheckoutRequest {
        customer_id: customer.clone(),
        phone: PHONE.to_string(),
        shipping_address: address(),
        client_ip: None,
        customer_note: None,
    }
}

pub(super) fn cart_line(product: &str, unit_price: Decimal, quantity: u32) -> CartLine {
    CartLine {
        product_id: ProductId(product.to_string()),
        product_name: format!("Product {product}"),
        unit_price,
        quantity,
    }
}

/// Cart worth `subtotal`, stocked with 10 units.
pub(super) fn stock_cart(store: &MemoryStorefront, customer: &CustomerId, subtotal: Decimal) {
    let line = cart_line("sku-1", subtotal, 1);
    store.set_stock(&line.product_id, 10);
    store.set_cart(customer, vec![line]);
}

pub(super) fn blocklist_entry(
    kind: BlocklistKind,
    value: &str,
    severity: BlocklistSeverity,
    reason: &str,
) -> NewBlocklistEntry {
    NewBlocklistEntry {
        kind,
        value: value.to_string(),
        severity,
        expires_at: None,
        reason: reason.to_string(),
    }
}

pub(super) fn block(
    store: &MemoryStorefront,
    kind: BlocklistKind,
    value: &str,
    severity: BlocklistSeverity,
) -> BlocklistEntry {
    store
        .insert(blocklist_entry(kind, value, severity, "Repeated refusals"))
        .expect("blocklist insert succeeds")
}

/// Orders for `phone` from other customers, created an hour before `now()`.
pub(super) fn seed_orders(store: &MemoryStorefront, phone: &str, count: usize, status: OrderStatus) {
    for index in 0..count {
        let order = OrderRecord {
            order_id: OrderId(format!("seed-{phone}-{status:?}-{index}")),
            customer_id: customer_id(&format!("other-{index}")),
            phone: phone.to_string(),
            shipping_address: address(),
            subtotal: dec!(500),
            delivery_fee: dec!(60),
            total_amount: dec!(560),
            status,
            customer_note: None,
            admin_notes: None,
            created_at: now() - Duration::hours(1),
        };
        store.insert_order(order).expect("seed order inserted");
    }
}

pub(super) fn evaluator(store: &MemoryStorefront) -> RiskEvaluator {
    let stores = store.stores();
    RiskEvaluator::new(stores.blocklist, stores.history)
}

pub(super) fn default_rules() -> RiskRules {
    RiskRules::default()
}

pub(super) fn build_services() -> (CheckoutService, AdminService, MemoryStorefront) {
    let store = MemoryStorefront::new();
    let checkout = CheckoutService::new(store.stores(), CheckoutConfig::default());
    let admin = AdminService::new(store.stores());
    (checkout, admin, store)
}

pub(super) fn router_with_store() -> (axum::Router, MemoryStorefront) {
    let (checkout, admin, store) = build_services();
    (checkout_router(Arc::new(checkout), Arc::new(admin)), store)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
