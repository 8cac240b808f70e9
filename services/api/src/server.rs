use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryConceptStore};
use crate::routes::with_patient_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pediatric_cds::clinical::PatientService;
use pediatric_cds::config::AppConfig;
use pediatric_cds::error::AppError;
use pediatric_cds::etl::OmopCsvImporter;
use pediatric_cds::telemetry;
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

    let store = Arc::new(InMemoryConceptStore::with_standard_vocabulary());
    if let Some(dir) = &config.store.csv_dir {
        let summary = OmopCsvImporter::new(config.store.id_max_attempts)
            .from_dir(dir, store.as_ref())?;
        info!(
            dir = %dir.display(),
            persons = summary.persons,
            conditions = summary.conditions,
            procedures = summary.procedures,
            measurements = summary.measurements,
            skipped = summary.skipped,
            "seeded concept store from hospital export"
        );
    }
    let patient_service = Arc::new(PatientService::new(store, config.store.id_max_attempts));

    let app = with_patient_routes(patient_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "pediatric decision support ready");

    axum::serve(listener, app).await?;
    Ok(())
}
