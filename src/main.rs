use aoi_watch::{
    app_state::AppState,
    config::AppConfig,
    db::{self, PgAoiStore, PgChangeRecordStore},
    monitor::{ChangePipeline, Dispatcher, PipelineSettings, Scheduler, SubmitOutcome, WorkerPool},
    routes,
    services::{
        detector::GeoComputeClient,
        notifier::EmailNotifier,
        queue::TriggerQueue,
    },
};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing aoi-watch");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    describe_metrics();

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Connecting to Redis trigger queue");
    let triggers = Arc::new(TriggerQueue::new(&config.redis_url).expect("Failed to initialize trigger queue"));

    tracing::info!(url = %config.detector_url, "Initializing geospatial compute client");
    let geo_client = Arc::new(
        GeoComputeClient::new(
            &config.detector_url,
            &config.detector_api_token,
            config.thresholds(),
            config.detector_timeout(),
        )
        .expect("Failed to initialize geospatial compute client"),
    );

    let notifier = Arc::new(
        EmailNotifier::new(
            config.sendgrid_api_key.clone(),
            config.sender_email.clone(),
            geo_client.clone(),
            config.notify_timeout(),
        )
        .expect("Failed to initialize email notifier"),
    );

    let aois = Arc::new(PgAoiStore::new(db_pool.clone()));
    let records = Arc::new(PgChangeRecordStore::new(db_pool.clone()));

    let pipeline = Arc::new(ChangePipeline::new(
        aois.clone(),
        geo_client,
        records,
        notifier,
        PipelineSettings {
            baseline: config.baseline_window(),
            recent: config.recent_window(),
            detector_timeout: config.detector_timeout(),
            notify_timeout: config.notify_timeout(),
        },
    ));

    let pool = WorkerPool::new(pipeline, config.max_concurrent_checks);
    let dispatcher = Arc::new(Dispatcher::new(pool));

    let scheduler = Arc::new(Scheduler::new(aois, dispatcher.clone()));
    let mut cron = scheduler
        .start(&config.check_schedule)
        .await
        .expect("Failed to start check scheduler");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(consume_triggers(
        triggers.clone(),
        dispatcher.clone(),
        config.trigger_poll_interval(),
        shutdown_rx,
    ));

    let state = AppState::new(db_pool, triggers, dispatcher.clone());
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!(
        bind_addr = %config.bind_addr,
        schedule = %config.check_schedule,
        max_concurrent_checks = config.max_concurrent_checks,
        "aoi-watch running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("Server error");

    tracing::info!("Shutting down, waiting for in-flight checks");
    let _ = shutdown_tx.send(true);
    if let Err(e) = cron.shutdown().await {
        tracing::warn!(error = ?e, "Cron scheduler did not shut down cleanly");
    }
    let _ = consumer.await;
    dispatcher.wait_idle().await;
    tracing::info!("Shutdown complete");
}

/// Feed manual triggers from Redis through the same dedup gate as the scheduler.
async fn consume_triggers(
    triggers: Arc<TriggerQueue>,
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        match triggers.dequeue().await {
            Ok(Some(trigger)) => match dispatcher.submit(trigger.aoi_id) {
                SubmitOutcome::Accepted => {
                    tracing::info!(aoi_id = %trigger.aoi_id, "Manual check dispatched");
                }
                SubmitOutcome::RejectedDuplicate => {
                    tracing::debug!(aoi_id = %trigger.aoi_id, "Manual check already in flight");
                }
            },
            Ok(None) => {
                tracing::trace!("No manual triggers, sleeping");
                tokio::select! {
                    _ = sleep(poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read manual trigger queue, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!("aoi_checks_submitted_total", "AOI checks accepted by the dispatcher");
    metrics::describe_counter!(
        "aoi_checks_rejected_total",
        "AOI checks rejected because one was already in flight"
    );
    metrics::describe_counter!("aoi_checks_completed_total", "AOI checks finished, by outcome");
    metrics::describe_counter!("aoi_alerts_failed_total", "Change alerts that could not be delivered");
    metrics::describe_counter!("aoi_scheduler_firings_total", "Scheduler firings, by result");
    metrics::describe_gauge!("aoi_checks_in_flight", "AOI checks queued or running");
    metrics::describe_histogram!("aoi_check_duration_seconds", "Time to run one AOI check");
}
