use crate::cli::ServeArgs;
use crate::infra::{build_storefront, read_blocklist_file, AppState};
use crate::routes::with_storefront_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use storefront_risk::config::AppConfig;
use storefront_risk::error::AppError;
use storefront_risk::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let storefront = build_storefront(config.checkout.clone());
    if let Some(path) = args.blocklist_csv.take() {
        let entries = read_blocklist_file(&path)?;
        let parsed = entries.len();
        let added = storefront.admin.import_blocklist(entries)?;
        info!(path = %path.display(), parsed, added, "blocklist seeded");
    }

    let app = with_storefront_routes(storefront.checkout, storefront.admin)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        delivery_fee = %config.checkout.delivery_fee,
        "storefront risk service ready"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
