use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_risk::checkout::risk::{parse_blocklist_csv, BlocklistSeverity};
use storefront_risk::checkout::{
    AdminService, CartLine, CheckoutError, CheckoutRequest, CheckoutService, CustomerId,
    CustomerProfile, MemoryStorefront, OrderStatus, ProductId, RiskDecision, ShippingAddress,
};
use storefront_risk::config::CheckoutConfig;

const PHONE: &str = "01911223344";

fn launch_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 9, 30, 0)
        .single()
        .expect("valid launch timestamp")
}

struct Storefront {
    store: MemoryStorefront,
    checkout: CheckoutService,
    admin: AdminService,
}

fn storefront() -> Storefront {
    let store = MemoryStorefront::new();
    let checkout = CheckoutService::new(store.stores(), CheckoutConfig::default());
    let admin = AdminService::new(store.stores());
    Storefront {
        store,
        checkout,
        admin,
    }
}

fn register(store: &MemoryStorefront, id: &str, age: Duration) -> CustomerId {
    let customer = CustomerId(id.to_string());
    store.add_customer(CustomerProfile::new(customer.clone(), launch_day() - age));
    customer
}

fn fill_cart(store: &MemoryStorefront, customer: &CustomerId, unit_price: Decimal, quantity: u32) {
    let product = ProductId("saree-silk".to_string());
    store.set_stock(&product, 50);
    store.set_cart(
        customer,
        vec![CartLine {
            product_id: product,
            product_name: "Silk saree".to_string(),
            unit_price,
            quantity,
        }],
    );
}

fn checkout_request(customer: &CustomerId, phone: &str) -> CheckoutRequest {
    CheckoutRequest {
        customer_id: customer.clone(),
        phone: phone.to_string(),
        shipping_address: ShippingAddress {
            address: "Flat 3B, Lake View Road".to_string(),
            area: Some("Gulshan".to_string()),
            city: Some("Dhaka".to_string()),
            ..ShippingAddress::default()
        },
        client_ip: "198.51.100.20".parse().ok(),
        customer_note: Some("Call before delivery".to_string()),
    }
}

#[test]
fn repeat_buyer_on_one_phone_escalates_from_approve_to_block() {
    let shop = storefront();
    let buyers: Vec<CustomerId> = (0..4)
        .map(|index| register(&shop.store, &format!("buyer-{index}"), Duration::days(90)))
        .collect();

    let mut decisions = Vec::new();
    for buyer in &buyers {
        fill_cart(&shop.store, buyer, dec!(1200), 1);
        match shop
            .checkout
            .checkout_at(checkout_request(buyer, PHONE), launch_day())
        {
            Ok(placed) => decisions.push(placed.assessment.decision),
            Err(CheckoutError::Rejected) => decisions.push(RiskDecision::Block),
            Err(other) => panic!("unexpected checkout error: {other}"),
        }
    }

    assert_eq!(
        decisions,
        vec![
            RiskDecision::Approve,
            RiskDecision::Approve,
            RiskDecision::Approve,
            RiskDecision::Flag
        ]
    );

    let new_buyer = register(&shop.store, "buyer-new", Duration::hours(2));
    fill_cart(&shop.store, &new_buyer, dec!(2600), 2);
    let err = shop
        .checkout
        .checkout_at(checkout_request(&new_buyer, PHONE), launch_day())
        .expect_err("new account, high value and four live orders is blocked");
    assert!(matches!(err, CheckoutError::Rejected));
    assert_eq!(shop.store.orders().len(), 4);
}

#[test]
fn delivered_orders_stop_counting_towards_velocity() {
    let shop = storefront();
    let buyer = register(&shop.store, "regular", Duration::days(400));

    let mut placed_ids = Vec::new();
    for _ in 0..3 {
        fill_cart(&shop.store, &buyer, dec!(300), 1);
        let placed = shop
            .checkout
            .checkout_at(checkout_request(&buyer, PHONE), launch_day())
            .expect("order placed");
        placed_ids.push(placed.order.order_id);
    }

    for order_id in &placed_ids {
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            shop.admin
                .transition_order_at(order_id, next, None, launch_day())
                .expect("fulfilment step");
        }
    }

    let other = register(&shop.store, "household", Duration::days(400));
    fill_cart(&shop.store, &other, dec!(300), 1);
    let placed = shop
        .checkout
        .checkout_at(checkout_request(&other, PHONE), launch_day())
        .expect("order placed");
    assert_eq!(placed.assessment.score, 0);
    assert_eq!(placed.order.status, OrderStatus::Pending);
}

#[test]
fn imported_blocklist_applies_to_the_next_checkout() {
    let shop = storefront();
    let buyer = register(&shop.store, "imported", Duration::days(30));
    let export = format!(
        "kind,value,severity,reason,expires_at\n\
         address_keyword,lake view,flag_only,Repeated failed deliveries,\n\
         phone,{PHONE},hard_block,Fraud ring,2025-11-01\n"
    );

    let entries = parse_blocklist_csv(export.as_bytes()).expect("export parses");
    assert_eq!(entries[1].severity, BlocklistSeverity::HardBlock);
    let added = shop.admin.import_blocklist(entries).expect("import succeeds");
    assert_eq!(added, 2);

    fill_cart(&shop.store, &buyer, dec!(900), 1);
    let placed = shop
        .checkout
        .checkout_at(checkout_request(&buyer, PHONE), launch_day())
        .expect("expired hard block no longer applies");

    assert_eq!(placed.assessment.score, 30);
    assert_eq!(placed.order.status, OrderStatus::PendingConfirmation);
    assert_eq!(
        placed.order.admin_notes.as_deref(),
        Some("Flagged (score: 30): Repeated failed deliveries")
    );
    assert_eq!(
        shop.store.stock(&ProductId("saree-silk".to_string())),
        Some(49)
    );
}
