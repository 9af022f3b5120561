use anyhow::{Context, Result};
use dicom_metadata_service::api::{start_api_server, AppState};
use dicom_metadata_service::config::Config;
use dicom_metadata_service::events::{EventHandler, SqsEventConsumer};
use dicom_metadata_service::{DicomTagReader, DynamoIndexStore, MetadataPipeline, S3BlobStore};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting DICOM metadata service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Initialize store gateways
    let blob_store = Arc::new(
        S3BlobStore::new(&config.s3)
            .await
            .context("Failed to initialize S3 blob store")?,
    );

    let index_store = Arc::new(
        DynamoIndexStore::new(&config.dynamodb)
            .await
            .context("Failed to initialize DynamoDB index store")?,
    );

    let pipeline = Arc::new(MetadataPipeline::new(
        blob_store,
        index_store,
        Arc::new(DicomTagReader),
        config.s3.json_bucket.clone(),
        config.s3.json_prefix.clone(),
    ));

    // Spawn event consumer if a queue is configured
    let consumer_handle = match config.sqs.queue_url.clone() {
        Some(queue_url) => {
            let handler = EventHandler::new(pipeline.clone(), config.events.clone());
            let consumer = SqsEventConsumer::new(&config.sqs, queue_url, handler)
                .await
                .context("Failed to initialize SQS event consumer")?;

            Some(tokio::spawn(async move {
                if let Err(e) = consumer.run().await {
                    error!(error = %e, "SQS event consumer error");
                }
            }))
        }
        None => {
            warn!("no SQS queue configured; event-driven ingestion disabled");
            None
        }
    };

    // Spawn API server task
    let api_state = AppState { pipeline };
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("DICOM metadata service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down DICOM metadata service");

    // Abort tasks
    if let Some(handle) = consumer_handle {
        handle.abort();
    }
    api_handle.abort();

    info!("DICOM metadata service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
