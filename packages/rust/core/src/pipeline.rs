//! End-to-end pipeline: catalog → sample → capture → synthesis.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument};

use metaenrich_capture::RendererLauncher;
use metaenrich_catalog::TokenProvider;
use metaenrich_sampling::QueryEngine;
use metaenrich_shared::{ArtifactStore, CatalogSettings, Identifier, Result};
use metaenrich_synthesis::LanguageModel;

use crate::stages::{
    CaptureOutcome, run_capture, run_catalog_fetch, run_sampling, run_synthesis,
};

/// External collaborators and per-stage settings for one pipeline run.
pub struct PipelineServices<'a> {
    pub catalog: &'a CatalogSettings,
    pub token_provider: &'a dyn TokenProvider,
    pub engine: &'a dyn QueryEngine,
    pub sample_limit: usize,
    pub launcher: &'a dyn RendererLauncher,
    pub model: &'a dyn LanguageModel,
    pub preview_rows: usize,
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub catalog_path: PathBuf,
    pub sample_path: PathBuf,
    pub capture: CaptureOutcome,
    pub synthesis_path: PathBuf,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &PipelineResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &PipelineResult) {}
}

/// Run stages 2 to 5 for an identifier with an existing intake record,
/// stopping at the first stage error.
///
/// 1. Catalog fetch
/// 2. Sampling
/// 3. Capture (no browser when the intake record has no links)
/// 4. Synthesis
#[instrument(skip_all, fields(id = %id))]
pub async fn run_pipeline(
    store: &ArtifactStore,
    id: &Identifier,
    services: &PipelineServices<'_>,
    progress: &dyn ProgressReporter,
) -> Result<PipelineResult> {
    let start = Instant::now();
    let intake = store.load_intake(id)?;
    info!(table = %intake.target_table, links = intake.documentation_links.len(), "starting pipeline");

    progress.phase("Fetching catalog metadata");
    let catalog_path = run_catalog_fetch(store, services.catalog, services.token_provider, id).await?;

    progress.phase("Sampling table");
    let sample_path = run_sampling(store, services.engine, services.sample_limit, id).await?;

    if !intake.documentation_links.is_empty() {
        progress.phase("Capturing documentation");
    }
    let capture = run_capture(store, services.launcher, id).await?;

    progress.phase("Synthesizing description");
    let synthesis_path = run_synthesis(store, services.model, services.preview_rows, id).await?;

    let result = PipelineResult {
        catalog_path,
        sample_path,
        capture,
        synthesis_path,
        elapsed: start.elapsed(),
    };
    info!(elapsed_ms = result.elapsed.as_millis() as u64, "pipeline complete");
    progress.done(&result);
    Ok(result)
}
