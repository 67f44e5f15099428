//! Fila Consumer - RabbitMQ worker for the message bridge.
//!
//! Consumes messages from the durable queue with manual acknowledgment,
//! applies the processing step to each, and settles every delivery as
//! acknowledged, requeued, or dropped. Reconnects and resubscribes when the
//! broker session is lost.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fila::{consumer, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("consumer_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        rabbitmq_host = %config.rabbitmq_host,
        rabbitmq_port = config.rabbitmq_port,
        connect_attempts = config.connect_attempts,
        connect_retry_delay_ms = config.connect_retry_delay_ms,
        "config_loaded"
    );

    // Run the consumer loop
    consumer::run(config).await?;

    Ok(())
}
