use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use storefront_risk::checkout::risk::parse_blocklist_csv;
use storefront_risk::checkout::{checkout_router, AdminService, CheckoutService};
use storefront_risk::error::AppError;

#[derive(Debug, Deserialize)]
pub(crate) struct BlocklistImportRequest {
    /// Export with a `kind,value,severity,reason,expires_at` header row.
    pub(crate) csv: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct BlocklistImportResponse {
    pub(crate) parsed: usize,
    pub(crate) added: usize,
    pub(crate) skipped: usize,
}

pub(crate) fn with_storefront_routes(
    checkout: Arc<CheckoutService>,
    admin: Arc<AdminService>,
) -> axum::Router {
    checkout_router(checkout, admin.clone())
        .route(
            "/api/v1/admin/blocklist/import",
            axum::routing::post(blocklist_import_endpoint),
        )
        .layer(Extension(admin))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn blocklist_import_endpoint(
    Extension(admin): Extension<Arc<AdminService>>,
    Json(payload): Json<BlocklistImportRequest>,
) -> Result<Json<BlocklistImportResponse>, AppError> {
    let entries = parse_blocklist_csv(Cursor::new(payload.csv.into_bytes()))?;
    let parsed = entries.len();
    let added = admin.import_blocklist(entries)?;

    Ok(Json(BlocklistImportResponse {
        parsed,
        added,
        skipped: parsed - added,
    }))
}
