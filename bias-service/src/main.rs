use bias_service::config::BiasConfig;
use bias_service::services::metrics::init_metrics;
use bias_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let otlp_endpoint =
        std::env::var("OTLP_ENDPOINT").unwrap_or_else(|_| "http://tempo:4317".to_string());
    init_tracing("bias-service", "info", Some(&otlp_endpoint));

    // Recorder must be installed before any metric is recorded.
    init_metrics()?;

    let config = BiasConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let application = Application::build(config).await?;
    tracing::info!(port = application.port(), "bias-service started");

    application.run_until_stopped().await?;
    Ok(())
}
