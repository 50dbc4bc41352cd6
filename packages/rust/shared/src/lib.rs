//! Shared types, error model, configuration and artifact layout for metaenrich.
//!
//! This crate is the foundation depended on by all other metaenrich crates.
//! It provides:
//! - [`EnrichError`]: the unified error type
//! - Domain types ([`Identifier`], [`IntakeRecord`], [`CatalogRecord`])
//! - Configuration ([`AppConfig`], per-stage runtime settings, [`SecretSource`])
//! - [`ArtifactStore`]: where every stage reads and writes its files

pub mod artifacts;
pub mod config;
pub mod error;
pub mod secrets;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use artifacts::ArtifactStore;
pub use config::{
    AppConfig, AuthSettings, AuthStrategy, CaptureSettings, CatalogSettings, LlmSettings,
    MAX_SAMPLE_ROWS, QueryEngineSettings, SecretBackend, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{EnrichError, Result};
pub use secrets::SecretSource;
pub use types::{AttachedSchema, CatalogRecord, ColumnMap, Identifier, IntakeRecord, split_links};
