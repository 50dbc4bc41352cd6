//! Stage orchestration for metaenrich.
//!
//! Each stage reads its upstream artifacts from the [`ArtifactStore`], calls
//! one external collaborator through a trait, and writes its own artifact.
//! [`pipeline`] chains stages 2 to 5 for an identifier that already has an
//! intake record.
//!
//! [`ArtifactStore`]: metaenrich_shared::ArtifactStore

pub mod pipeline;
pub mod stages;

pub use pipeline::{PipelineResult, PipelineServices, ProgressReporter, SilentProgress, run_pipeline};
pub use stages::{
    CaptureOutcome, run_capture, run_catalog_fetch, run_sampling, run_synthesis, submit_intake,
};
