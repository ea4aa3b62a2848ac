use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::checkout::domain::OrderStatus;
use crate::checkout::memory::StoreOperation;
use crate::checkout::risk::{BlocklistKind, BlocklistSeverity};
use crate::checkout::router::{checkout_handler, order_risk_handler, StorefrontState};
use crate::checkout::service::GENERIC_REJECTION;

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("build request")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

fn checkout_payload(customer: &str) -> Value {
    json!({
        "customer_id": customer,
        "phone": PHONE,
        "shipping_address": {
            "address": "House 12, Road 4",
            "area": "Dhanmondi",
            "city": "Dhaka"
        }
    })
}

fn state() -> (StorefrontState, crate::checkout::memory::MemoryStorefront) {
    let (checkout, admin, store) = build_services();
    (
        StorefrontState {
            checkout: Arc::new(checkout),
            admin: Arc::new(admin),
        },
        store,
    )
}

#[tokio::test]
async fn checkout_route_returns_receipt_without_risk_details() {
    let (router, store) = router_with_store();
    let customer = customer_id("route");
    stock_cart(&store, &customer, dec!(1000));
    block(&store, BlocklistKind::Phone, PHONE, BlocklistSeverity::FlagOnly);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/checkout",
            &checkout_payload(&customer.0),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "placed");
    assert_eq!(payload["total"], "1060");
    assert!(payload.get("order_id").is_some());
    assert!(payload.get("score").is_none());
    assert!(payload.get("decision").is_none());

    let orders = store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::PendingConfirmation);
}

#[tokio::test]
async fn rejected_checkout_returns_generic_message() {
    let (state, store) = state();
    let customer = customer_id("rejected");
    stock_cart(&store, &customer, dec!(100));
    block(&store, BlocklistKind::Phone, PHONE, BlocklistSeverity::HardBlock);

    let request = serde_json::from_value(checkout_payload(&customer.0)).expect("payload");
    let response = checkout_handler(State(state), None, axum::Json(request)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!({ "error": GENERIC_REJECTION }));
}

#[tokio::test]
async fn checkout_handler_maps_limits_and_failures() {
    let (state, store) = state();
    let customer = customer_id("limits");

    let request = serde_json::from_value(checkout_payload(&customer.0)).expect("payload");
    let response = checkout_handler(State(state.clone()), None, axum::Json(request)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    store.set_rule("max_daily_orders", json!(0));
    stock_cart(&store, &customer, dec!(100));
    let request = serde_json::from_value(checkout_payload(&customer.0)).expect("payload");
    let response = checkout_handler(State(state.clone()), None, axum::Json(request)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    store.fail(StoreOperation::BlocklistLookup);
    let request = serde_json::from_value(checkout_payload(&customer.0)).expect("payload");
    let response = checkout_handler(State(state), None, axum::Json(request)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn risk_details_are_exposed_to_admins_only() {
    let (state, store) = state();
    let customer = customer_id("admin-view");
    stock_cart(&store, &customer, dec!(100));
    block(&store, BlocklistKind::Phone, PHONE, BlocklistSeverity::FlagOnly);
    let placed = state
        .checkout
        .checkout(request(&customer))
        .expect("flagged order placed");

    let response = order_risk_handler(
        State(state.clone()),
        Path(placed.order.order_id.0.clone()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["order_id"], placed.order.order_id.0.as_str());
    assert_eq!(payload["score"], 30);
    assert_eq!(payload["decision"], "flag");
    assert_eq!(payload["signals"][0]["name"], "Repeated refusals");

    let missing = order_risk_handler(State(state), Path("ord-missing".to_string())).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_route_applies_valid_transitions_only() {
    let (state, store) = state();
    let customer = customer_id("status");
    stock_cart(&store, &customer, dec!(100));
    let placed = state
        .checkout
        .checkout(request(&customer))
        .expect("order placed");
    let router = crate::checkout::router::checkout_router(state.checkout, state.admin);
    let uri = format!("/api/v1/admin/orders/{}/status", placed.order.order_id.0);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &uri,
            &json!({ "status": "confirmed", "note": "called customer" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "confirmed");

    let response = router
        .oneshot(json_request(Method::POST, &uri, &json!({ "status": "returned" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn blocklist_routes_manage_entries() {
    let (router, _) = router_with_store();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/blocklist",
            &json!({ "kind": "phone", "value": PHONE, "severity": "hard_block", "reason": "Fake orders" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let entry_id = created["id"].as_str().expect("id assigned").to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/blocklist",
            &json!({ "kind": "phone", "value": PHONE, "severity": "flag_only" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/blocklist",
            &json!({ "kind": "ip", "value": "  ", "severity": "flag_only" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/admin/blocklist"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json_body(response).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let uri = format!("/api/v1/admin/blocklist/{entry_id}");
    let response = router
        .clone()
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn risk_rule_routes_validate_updates() {
    let (router, _) = router_with_store();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/admin/risk-rules/risk_threshold_block",
            &json!({ "value": 90 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let rules = read_json_body(response).await;
    assert_eq!(rules["risk_threshold_block"], 90);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/admin/risk-rules/cancellation_rate_threshold",
            &json!({ "value": 1.5 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/admin/risk-rules"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let rules = read_json_body(response).await;
    assert_eq!(rules["risk_threshold_block"], 90);
    assert_eq!(rules["high_value_threshold"], "5000");
}

#[tokio::test]
async fn risk_rule_route_rejects_inverted_thresholds() {
    let (router, _) = router_with_store();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/admin/risk-rules/risk_threshold_block",
            &json!({ "value": 60 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/admin/risk-rules/risk_threshold_flag",
            &json!({ "value": 65 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/admin/risk-rules"))
        .await
        .expect("route executes");
    let rules = read_json_body(response).await;
    assert_eq!(rules["risk_threshold_flag"], 30);
    assert_eq!(rules["risk_threshold_block"], 60);
}

#[tokio::test]
async fn checkout_matches_ip_entries_against_the_connection_address() {
    let (router, store) = router_with_store();
    let customer = customer_id("ip-route");
    stock_cart(&store, &customer, dec!(100));
    block(&store, BlocklistKind::Ip, "203.0.113.9", BlocklistSeverity::HardBlock);
    let peer: SocketAddr = "203.0.113.9:52100".parse().expect("socket address");

    let mut payload = checkout_payload(&customer.0);
    payload["client_ip"] = json!("198.51.100.7");
    let response = router
        .layer(MockConnectInfo(peer))
        .oneshot(json_request(Method::POST, "/api/v1/checkout", &payload))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn client_ip_in_the_request_body_is_ignored() {
    let (router, store) = router_with_store();
    let customer = customer_id("ip-body");
    stock_cart(&store, &customer, dec!(100));
    block(&store, BlocklistKind::Ip, "198.51.100.7", BlocklistSeverity::HardBlock);
    let peer: SocketAddr = "192.0.2.44:40000".parse().expect("socket address");

    let mut payload = checkout_payload(&customer.0);
    payload["client_ip"] = json!("198.51.100.7");
    let response = router
        .layer(MockConnectInfo(peer))
        .oneshot(json_request(Method::POST, "/api/v1/checkout", &payload))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(store.orders().len(), 1);
}
