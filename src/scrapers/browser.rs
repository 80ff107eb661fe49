//! Headless-browser fetch path for JS-rendered sources.
//!
//! Wraps chromiumoxide behind the `browser` cargo feature. The browser
//! instance is launched lazily, reused across calls, and shut down at run
//! cleanup; the page is closed on every exit path.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ScrapeError;

/// Lazily launched, reusable headless browser.
pub struct BrowserFetcher {
    timeout: Duration,
    state: Option<BrowserState>,
}

struct BrowserState {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: None,
        }
    }

    /// Navigate to `url` and return the fully rendered DOM.
    pub async fn fetch_rendered(
        &mut self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        let browser = self.browser().await?;

        let page = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            page = browser.new_page(url) => {
                page.map_err(|e| ScrapeError::Browser(e.to_string()))?
            }
        };

        let content = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = page.close().await;
                return Err(ScrapeError::Cancelled);
            }
            result = tokio::time::timeout(self.timeout, async {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| ScrapeError::Browser(e.to_string()))?;
                page.content()
                    .await
                    .map_err(|e| ScrapeError::Browser(e.to_string()))
            }) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ScrapeError::Browser(format!(
                    "navigation to {url} timed out"
                ))),
            },
        };

        if let Err(e) = page.close().await {
            debug!("page close failed: {}", e);
        }
        content
    }

    async fn browser(&mut self) -> Result<&Browser, ScrapeError> {
        if self.state.is_none() {
            let config = BrowserConfig::builder()
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .build()
                .map_err(ScrapeError::Browser)?;
            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| ScrapeError::Browser(e.to_string()))?;
            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            self.state = Some(BrowserState {
                browser,
                handler: handle,
            });
        }
        Ok(&self.state.as_ref().unwrap().browser)
    }

    /// Close the browser instance. Called at run cleanup.
    pub async fn shutdown(&mut self) {
        if let Some(mut state) = self.state.take() {
            if let Err(e) = state.browser.close().await {
                warn!("browser close failed: {}", e);
            }
            let _ = state.browser.wait().await;
            state.handler.abort();
        }
    }
}
