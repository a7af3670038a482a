//! Transaction Risk Pipeline - Main Entry Point
//!
//! Loads the classifier, then serves batch scoring requests over NATS
//! request/reply until interrupted.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tx_risk_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{ClassifierState, OnnxClassifier},
    pipeline::ScoringPipeline,
    producer::ReplyPublisher,
    service::{RiskService, Subjects},
};

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("warn,tx_risk_pipeline={}", logging.level))
            .context("Invalid logging.level")?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Transaction Risk Pipeline");
    info!(
        models_dir = %config.models.models_dir,
        candidates = ?config.models.candidates,
        workers = config.pipeline.workers,
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(PipelineMetrics::new());

    // Classifier availability is decided once, here
    let classifier = OnnxClassifier::load(&config.models);
    match &classifier {
        ClassifierState::Ready(model) => info!(model = %model.name(), "Classifier ready"),
        ClassifierState::Unavailable { attempts } => {
            for attempt in attempts {
                error!(candidate = %attempt.candidate, error = %attempt.error, "Model load attempt failed");
            }
            warn!("No classifier loaded, batch requests will be refused until restart");
        }
    }

    let pipeline = Arc::new(ScoringPipeline::new(classifier).with_metrics(metrics.clone()));
    let service = Arc::new(RiskService::new(pipeline, metrics.clone()));

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.queue_group);
    let publisher = ReplyPublisher::new(client);
    let subjects = Subjects::from(&config.nats);

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    tokio::select! {
        result = service.run(&consumer, publisher, &subjects, config.pipeline.workers) => {
            if let Err(e) = result {
                error!(error = %e, "Request loop terminated");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
        }
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
