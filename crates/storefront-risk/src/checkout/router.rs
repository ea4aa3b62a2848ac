use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::admin::{AdminError, AdminService};
use super::domain::{CheckoutRequest, OrderId, OrderStatus};
use super::repository::RepositoryError;
use super::risk::{BlocklistEntryId, NewBlocklistEntry};
use super::service::{CheckoutError, CheckoutService};

/// Shared handler state.
#[derive(Clone)]
pub struct StorefrontState {
    pub checkout: Arc<CheckoutService>,
    pub admin: Arc<AdminService>,
}

/// Router exposing checkout plus the back-office risk endpoints.
pub fn checkout_router(checkout: Arc<CheckoutService>, admin: Arc<AdminService>) -> Router {
    Router::new()
        .route("/api/v1/checkout", post(checkout_handler))
        .route(
            "/api/v1/admin/orders/:order_id/risk",
            get(order_risk_handler),
        )
        .route(
            "/api/v1/admin/orders/:order_id/status",
            post(order_status_handler),
        )
        .route(
            "/api/v1/admin/blocklist",
            get(list_blocklist_handler).post(add_blocklist_handler),
        )
        .route(
            "/api/v1/admin/blocklist/:entry_id",
            delete(remove_blocklist_handler),
        )
        .route("/api/v1/admin/risk-rules", get(risk_rules_handler))
        .route("/api/v1/admin/risk-rules/:key", put(set_risk_rule_handler))
        .with_state(StorefrontState { checkout, admin })
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// The client IP screened against the blocklist is the peer address of the connection.
pub(crate) async fn checkout_handler(
    State(state): State<StorefrontState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(mut request): Json<CheckoutRequest>,
) -> Response {
    request.client_ip = peer.map(|ConnectInfo(addr)| addr.ip());
    match state.checkout.checkout(request) {
        Ok(placed) => (StatusCode::CREATED, Json(placed.receipt())).into_response(),
        Err(err @ CheckoutError::Rejected) => error_body(StatusCode::FORBIDDEN, err.to_string()),
        Err(err @ CheckoutError::DailyLimitReached { .. }) => {
            error_body(StatusCode::TOO_MANY_REQUESTS, err.to_string())
        }
        Err(err @ (CheckoutError::EmptyCart | CheckoutError::AmountOverflow)) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(CheckoutError::Repository(err)) => {
            error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn admin_error_response(err: AdminError) -> Response {
    let status = match &err {
        AdminError::OrderNotFound(_) | AdminError::BlocklistEntryNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AdminError::InvalidTransition { .. } | AdminError::Repository(RepositoryError::Conflict) => {
            StatusCode::CONFLICT
        }
        AdminError::Rule(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdminError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AdminError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, err.to_string())
}

pub(crate) async fn order_risk_handler(
    State(state): State<StorefrontState>,
    Path(order_id): Path<String>,
) -> Response {
    let id = OrderId(order_id);
    match state.admin.order_assessment(&id) {
        Ok(Some(assessment)) => {
            let mut payload = serde_json::to_value(&assessment).unwrap_or(Value::Null);
            if let Value::Object(fields) = &mut payload {
                fields.insert("order_id".to_string(), Value::String(id.0));
            }
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            format!("no risk assessment recorded for order {}", id.0),
        ),
        Err(err) => admin_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    status: OrderStatus,
    #[serde(default)]
    note: Option<String>,
}

pub(crate) async fn order_status_handler(
    State(state): State<StorefrontState>,
    Path(order_id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Response {
    let id = OrderId(order_id);
    match state.admin.transition_order(&id, change.status, change.note) {
        Ok(order) => (
            StatusCode::OK,
            Json(json!({
                "order_id": order.order_id,
                "status": order.status.label(),
            })),
        )
            .into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn list_blocklist_handler(State(state): State<StorefrontState>) -> Response {
    match state.admin.blocklist() {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn add_blocklist_handler(
    State(state): State<StorefrontState>,
    Json(entry): Json<NewBlocklistEntry>,
) -> Response {
    if entry.value.trim().is_empty() {
        return error_body(StatusCode::UNPROCESSABLE_ENTITY, "blocklist value is required");
    }
    match state.admin.add_blocklist_entry(entry) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn remove_blocklist_handler(
    State(state): State<StorefrontState>,
    Path(entry_id): Path<String>,
) -> Response {
    match state
        .admin
        .remove_blocklist_entry(&BlocklistEntryId(entry_id))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => admin_error_response(err),
    }
}

pub(crate) async fn risk_rules_handler(State(state): State<StorefrontState>) -> Response {
    match state.admin.risk_rules() {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(err) => admin_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleUpdate {
    value: Value,
}

pub(crate) async fn set_risk_rule_handler(
    State(state): State<StorefrontState>,
    Path(key): Path<String>,
    Json(update): Json<RuleUpdate>,
) -> Response {
    match state.admin.set_risk_rule(&key, update.value) {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(err) => admin_error_response(err),
    }
}
