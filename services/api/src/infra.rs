use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use storefront_risk::checkout::risk::{parse_blocklist_csv, NewBlocklistEntry};
use storefront_risk::checkout::{AdminService, CheckoutService, MemoryStorefront};
use storefront_risk::config::CheckoutConfig;
use storefront_risk::error::AppError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services sharing one in-memory store.
pub(crate) struct Storefront {
    pub(crate) store: MemoryStorefront,
    pub(crate) checkout: Arc<CheckoutService>,
    pub(crate) admin: Arc<AdminService>,
}

pub(crate) fn build_storefront(config: CheckoutConfig) -> Storefront {
    let store = MemoryStorefront::new();
    let checkout = Arc::new(CheckoutService::new(store.stores(), config));
    let admin = Arc::new(AdminService::new(store.stores()));
    Storefront {
        store,
        checkout,
        admin,
    }
}

pub(crate) fn read_blocklist_file(path: &Path) -> Result<Vec<NewBlocklistEntry>, AppError> {
    let file = File::open(path)?;
    Ok(parse_blocklist_csv(file)?)
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("failed to parse '{raw}' as RFC 3339 or YYYY-MM-DD"))
}
