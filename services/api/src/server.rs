use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryPortalStore};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use drivehub::config::AppConfig;
use drivehub::error::AppError;
use drivehub::notifications::OutboxNotifier;
use drivehub::portal::PortalService;
use drivehub::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let store = Arc::new(InMemoryPortalStore::default());
    let notifier = Arc::new(OutboxNotifier::new(&config.notifications));
    let portal_service = Arc::new(PortalService::new(
        store,
        notifier,
        config.portal.clone(),
    ));

    let app = with_portal_routes(portal_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "drivehub portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
