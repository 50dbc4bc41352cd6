//! Headless Chromium renderer built on the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use url::Url;

use metaenrich_shared::{CaptureSettings, EnrichError, Result};

use crate::{PageRenderer, RendererLauncher};

/// A4 in inches.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// Launches [`ChromiumRenderer`]s from capture settings.
pub struct ChromiumLauncher {
    settings: CaptureSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl RendererLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageRenderer>> {
        Ok(Box::new(ChromiumRenderer::launch(&self.settings).await?))
    }
}

/// One headless browser shared by every page of a capture run.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    navigation_timeout: std::time::Duration,
}

impl ChromiumRenderer {
    /// Launch a headless browser.
    #[instrument(skip_all)]
    pub async fn launch(settings: &CaptureSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if let Some(exe) = &settings.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder
            .build()
            .map_err(|e| EnrichError::Capture(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EnrichError::Capture(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event error");
                }
            }
        });

        info!("headless browser launched");
        Ok(Self {
            browser,
            handler,
            navigation_timeout: settings.navigation_timeout,
        })
    }

    async fn print(&self, page: &Page, url: &Url) -> Result<Vec<u8>> {
        tokio::time::timeout(self.navigation_timeout, page.goto(url.as_str()))
            .await
            .map_err(|_| {
                EnrichError::Capture(format!(
                    "{url}: navigation timed out after {}s",
                    self.navigation_timeout.as_secs()
                ))
            })?
            .map_err(|e| EnrichError::Capture(format!("{url}: navigation failed: {e}")))?;

        let params = PrintToPdfParams {
            paper_width: Some(A4_WIDTH_IN),
            paper_height: Some(A4_HEIGHT_IN),
            print_background: Some(true),
            ..Default::default()
        };
        page.pdf(params)
            .await
            .map_err(|e| EnrichError::Capture(format!("{url}: print to PDF failed: {e}")))
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    /// Each page gets its own tab, closed afterwards whatever the outcome.
    async fn render_pdf(&self, url: &Url) -> Result<Vec<u8>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| EnrichError::Capture(format!("failed to open tab: {e}")))?;

        let result = self.print(&page, url).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "failed to close tab");
        }
        result
    }

    async fn shutdown(&mut self) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed.map_err(|e| EnrichError::Capture(format!("failed to close browser: {e}")))?;
        debug!("headless browser closed");
        Ok(())
    }
}
