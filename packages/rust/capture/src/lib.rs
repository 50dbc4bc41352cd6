//! Documentation capture: render each documentation link to an A4 PDF.
//!
//! Links are rendered one at a time in a single browser. A failing link is
//! logged and skipped; its position is not reused, so saved files keep the
//! link's 1-based position.

pub mod browser;

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use url::Url;

use metaenrich_shared::{ArtifactStore, Identifier, Result};

pub use browser::{ChromiumLauncher, ChromiumRenderer};

/// Renders web pages to PDF bytes.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_pdf(&self, url: &Url) -> Result<Vec<u8>>;

    /// Release the renderer's resources.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Starts a renderer on demand, so runs with no links never launch one.
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageRenderer>>;
}

/// Outcome of a capture run.
#[derive(Debug, Clone, Default)]
pub struct CaptureReport {
    /// Written documents, in link order.
    pub saved: Vec<PathBuf>,
    /// `(link, reason)` for every link that could not be captured.
    pub failures: Vec<(String, String)>,
}

/// Render every link in `links` and store it as `<id>_doc<N>.pdf`.
#[instrument(skip_all, fields(id = %id, links = links.len()))]
pub async fn capture_documents(
    renderer: &dyn PageRenderer,
    store: &ArtifactStore,
    id: &Identifier,
    links: &[String],
) -> Result<CaptureReport> {
    let mut report = CaptureReport::default();
    if links.is_empty() {
        warn!("no documentation links to capture");
        return Ok(report);
    }
    store.ensure_dir()?;

    for (index, link) in links.iter().enumerate() {
        let position = index + 1;
        let path = store.document_path(id, position);
        let saved = match render_one(renderer, link).await {
            Ok(bytes) => store.write_bytes(&path, &bytes).map_err(|e| e.to_string()),
            Err(reason) => Err(reason),
        };
        match saved {
            Ok(()) => {
                info!(position, %link, path = %path.display(), "document captured");
                report.saved.push(path);
            }
            Err(reason) => {
                warn!(position, %link, %reason, "document capture failed");
                report.failures.push((link.clone(), reason));
            }
        }
    }

    info!(
        saved = report.saved.len(),
        failed = report.failures.len(),
        "capture finished"
    );
    Ok(report)
}

async fn render_one(renderer: &dyn PageRenderer, link: &str) -> std::result::Result<Vec<u8>, String> {
    let url = Url::parse(link).map_err(|e| format!("invalid URL: {e}"))?;
    renderer.render_pdf(&url).await.map_err(|e| e.to_string())
}
