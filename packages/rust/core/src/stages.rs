//! The five pipeline stages as standalone operations.
//!
//! Stages never read configuration themselves: every external collaborator
//! and runtime setting is passed in explicitly.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use metaenrich_capture::{CaptureReport, RendererLauncher, capture_documents};
use metaenrich_catalog::{TokenProvider, fetch_catalog_record};
use metaenrich_sampling::{QueryEngine, draw_sample};
use metaenrich_shared::{ArtifactStore, CatalogSettings, Identifier, IntakeRecord, Result};
use metaenrich_synthesis::{LanguageModel, load_inputs, synthesize};

// ---------------------------------------------------------------------------
// Stage 1: intake
// ---------------------------------------------------------------------------

/// Write the intake record, replacing any earlier one for the same identifier.
#[instrument(skip_all, fields(id = %record.identifier))]
pub fn submit_intake(store: &ArtifactStore, record: &IntakeRecord) -> Result<PathBuf> {
    let path = store.write_intake(record)?;
    info!(
        path = %path.display(),
        links = record.documentation_links.len(),
        "intake record written"
    );
    Ok(path)
}

// ---------------------------------------------------------------------------
// Stage 2: catalog fetch
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(id = %id))]
pub async fn run_catalog_fetch(
    store: &ArtifactStore,
    settings: &CatalogSettings,
    provider: &dyn TokenProvider,
    id: &Identifier,
) -> Result<PathBuf> {
    let record = fetch_catalog_record(settings, provider, id).await?;
    let path = store.write_catalog(&record)?;
    info!(path = %path.display(), "catalog record written");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Stage 3: sampling
// ---------------------------------------------------------------------------

/// Sample the intake record's target table. The CSV is only written once the
/// whole sample is in hand.
#[instrument(skip_all, fields(id = %id))]
pub async fn run_sampling(
    store: &ArtifactStore,
    engine: &dyn QueryEngine,
    sample_limit: usize,
    id: &Identifier,
) -> Result<PathBuf> {
    let table_name = store.load_target_table(id)?;
    let table = draw_sample(engine, &table_name, sample_limit).await?;

    store.ensure_dir()?;
    let path = store.sample_path(id);
    table.write_csv(&path)?;
    info!(path = %path.display(), rows = table.len(), "sample written");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Stage 4: capture
// ---------------------------------------------------------------------------

/// What the capture stage did.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// The intake record has no links; no browser was launched.
    Skipped,
    Captured(CaptureReport),
}

#[instrument(skip_all, fields(id = %id))]
pub async fn run_capture(
    store: &ArtifactStore,
    launcher: &dyn RendererLauncher,
    id: &Identifier,
) -> Result<CaptureOutcome> {
    let intake = store.load_intake(id)?;
    let removed = store.clear_documents(id)?;
    if removed > 0 {
        info!(removed, "removed documents from an earlier capture");
    }
    if intake.documentation_links.is_empty() {
        info!("intake record has no documentation links; skipping capture");
        return Ok(CaptureOutcome::Skipped);
    }

    let mut renderer = launcher.launch().await?;
    let report = capture_documents(renderer.as_ref(), store, id, &intake.documentation_links).await;
    if let Err(e) = renderer.shutdown().await {
        warn!(error = %e, "renderer did not shut down cleanly");
    }
    Ok(CaptureOutcome::Captured(report?))
}

// ---------------------------------------------------------------------------
// Stage 5: synthesis
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(id = %id))]
pub async fn run_synthesis(
    store: &ArtifactStore,
    model: &dyn LanguageModel,
    preview_rows: usize,
    id: &Identifier,
) -> Result<PathBuf> {
    let inputs = load_inputs(store, id)?;
    let text = synthesize(model, &inputs, preview_rows).await?;

    let path = store.synthesis_path(id);
    store.write_bytes(&path, text.as_bytes())?;
    info!(path = %path.display(), "synthesis written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use metaenrich_sampling::{QuerySession, SampleTable};
    use metaenrich_shared::EnrichError;

    struct NeverEngine;

    #[async_trait]
    impl QueryEngine for NeverEngine {
        async fn connect(&self) -> Result<Box<dyn QuerySession>> {
            panic!("sampling must fail before connecting");
        }
    }

    struct FailingEngine;

    struct FailingSession;

    #[async_trait]
    impl QueryEngine for FailingEngine {
        async fn connect(&self) -> Result<Box<dyn QuerySession>> {
            Ok(Box::new(FailingSession))
        }
    }

    #[async_trait]
    impl QuerySession for FailingSession {
        async fn fetch(&mut self, _sql: &str, _limit: usize) -> Result<SampleTable> {
            Err(EnrichError::Query("connection reset".into()))
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct NoLauncher;

    #[async_trait]
    impl RendererLauncher for NoLauncher {
        async fn launch(&self) -> Result<Box<dyn metaenrich_capture::PageRenderer>> {
            Err(EnrichError::Capture("browser unavailable".into()))
        }
    }

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("history"));
        (tmp, store)
    }

    #[test]
    fn intake_overwrites_previous_record() {
        let (_tmp, store) = store();
        let first = IntakeRecord::from_submission("abc-123", "orders", "https://a").unwrap();
        let second = IntakeRecord::from_submission("abc-123", "sales.orders", "").unwrap();

        submit_intake(&store, &first).unwrap();
        let path = submit_intake(&store, &second).unwrap();

        assert!(path.ends_with("abc-123.yaml"));
        let id = Identifier::parse("abc-123").unwrap();
        assert_eq!(store.load_intake(&id).unwrap(), second);
    }

    #[tokio::test]
    async fn sampling_without_intake_fails_fast() {
        let (_tmp, store) = store();
        let id = Identifier::parse("abc-123").unwrap();

        let err = run_sampling(&store, &NeverEngine, 200, &id).await.unwrap_err();

        assert!(matches!(err, EnrichError::MissingArtifact { .. }));
        assert!(!store.sample_path(&id).exists());
    }

    #[tokio::test]
    async fn sampling_without_target_table_is_missing_field() {
        let (_tmp, store) = store();
        let id = Identifier::parse("abc-123").unwrap();
        store.ensure_dir().unwrap();
        std::fs::write(store.intake_path(&id), "identifier: abc-123\n").unwrap();

        let err = run_sampling(&store, &NeverEngine, 200, &id).await.unwrap_err();

        assert!(matches!(err, EnrichError::MissingField { ref field, .. } if field == "target_table"));
        assert!(!store.sample_path(&id).exists());
    }

    #[tokio::test]
    async fn failed_query_writes_no_csv() {
        let (_tmp, store) = store();
        let record = IntakeRecord::from_submission("abc-123", "orders", "").unwrap();
        submit_intake(&store, &record).unwrap();

        let err = run_sampling(&store, &FailingEngine, 200, &record.identifier)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Query(_)));
        assert!(!store.sample_path(&record.identifier).exists());
    }

    #[tokio::test]
    async fn capture_without_links_never_launches() {
        let (_tmp, store) = store();
        let record = IntakeRecord::from_submission("abc-123", "orders", "  \n ").unwrap();
        submit_intake(&store, &record).unwrap();

        let outcome = run_capture(&store, &NoLauncher, &record.identifier).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::Skipped));
    }

    #[tokio::test]
    async fn capture_removes_documents_from_an_earlier_run() {
        let (_tmp, store) = store();
        let id = Identifier::parse("abc-123").unwrap();
        store.write_bytes(&store.document_path(&id, 1), b"%PDF old").unwrap();
        store.write_bytes(&store.document_path(&id, 2), b"%PDF old").unwrap();

        let record = IntakeRecord::from_submission("abc-123", "orders", "").unwrap();
        submit_intake(&store, &record).unwrap();

        let outcome = run_capture(&store, &NoLauncher, &id).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::Skipped));
        assert!(store.document_paths(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn capture_launch_failure_is_fatal() {
        let (_tmp, store) = store();
        let record =
            IntakeRecord::from_submission("abc-123", "orders", "https://docs.example.com").unwrap();
        submit_intake(&store, &record).unwrap();

        let err = run_capture(&store, &NoLauncher, &record.identifier).await.unwrap_err();
        assert!(matches!(err, EnrichError::Capture(_)));
    }
}
