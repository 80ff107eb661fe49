use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wmscout::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (before anything else reads the environment)
    let _ = dotenvy::dotenv();

    let default_filter = std::env::var("LOG_LEVEL")
        .map(|level| format!("wmscout={level}"))
        .unwrap_or_else(|_| "wmscout=info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
