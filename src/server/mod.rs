//! Admin API server.
//!
//! Exposes orchestrator control, run logs, and the content store over
//! HTTP/JSON. All responses share the `{success, data|error}` envelope.

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::repository::DbContext;
use crate::scrapers::Scraper;

/// Shared state for the admin API.
#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
    pub db: DbContext,
    pub settings: Arc<Settings>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(scraper: Arc<Scraper>, db: DbContext, settings: Arc<Settings>) -> Self {
        Self {
            scraper,
            db,
            settings,
            started_at: Instant::now(),
        }
    }
}

/// Start the admin API server.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", state.settings.port).parse()?;
    let app = create_router(state);

    tracing::info!("admin API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
