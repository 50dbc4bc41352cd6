//! Description synthesis: combine catalog metadata, the sample and the
//! captured documentation into one model request, then append a mechanical
//! per-column listing.

pub mod llm;
pub mod pdf;
pub mod prompt;

use tracing::{info, instrument};

use metaenrich_sampling::SampleTable;
use metaenrich_shared::{ArtifactStore, EnrichError, Identifier, Result};

pub use llm::{ChatCompletionsClient, LanguageModel};

/// Separator between the narrative and the column listing.
pub const COLUMN_SECTION_HEADER: &str = "=== COLUMN DESCRIPTIONS ===";

/// Everything the prompt is built from.
#[derive(Debug, Clone)]
pub struct SynthesisInputs {
    /// Catalog record rendered as YAML.
    pub metadata: String,
    pub sample: SampleTable,
    /// Catalog column names, used when the sample has no header.
    pub catalog_columns: Vec<String>,
    /// Extracted documentation text, possibly empty.
    pub documentation: String,
}

impl SynthesisInputs {
    /// Columns listed in the output.
    pub fn columns(&self) -> Vec<String> {
        if self.sample.columns.is_empty() {
            self.catalog_columns.clone()
        } else {
            self.sample.columns.clone()
        }
    }
}

/// Load the catalog record, sample and documents for `id`.
///
/// A missing catalog record or sample fails fast; zero documents is fine.
/// Documents beyond the current intake record's link count are ignored.
#[instrument(skip_all, fields(id = %id))]
pub fn load_inputs(store: &ArtifactStore, id: &Identifier) -> Result<SynthesisInputs> {
    let catalog = store.load_catalog(id)?;
    let sample_path = store.require_sample(id)?;
    let sample = SampleTable::read_csv(&sample_path)?;

    let metadata =
        serde_yaml::to_string(&catalog).map_err(|e| EnrichError::Serialization(e.to_string()))?;

    let documents = store.linked_document_paths(id)?;
    let documentation = pdf::documentation_text(&documents);
    info!(
        documents = documents.len(),
        sample_rows = sample.len(),
        "synthesis inputs loaded"
    );

    Ok(SynthesisInputs {
        metadata,
        sample,
        catalog_columns: catalog.column_names(),
        documentation,
    })
}

/// Ask the model for the narrative and assemble the full output text.
#[instrument(skip_all, fields(columns = inputs.sample.columns.len()))]
pub async fn synthesize(
    model: &dyn LanguageModel,
    inputs: &SynthesisInputs,
    preview_rows: usize,
) -> Result<String> {
    let user = prompt::build_prompt(
        &inputs.metadata,
        &inputs.sample.preview(preview_rows),
        &inputs.documentation,
    );
    let narrative = model.complete(prompt::SYSTEM_PROMPT, &user).await?;
    Ok(render_output(&narrative, &inputs.columns()))
}

/// One templated line per column.
pub fn describe_columns(columns: &[String]) -> String {
    columns
        .iter()
        .map(|col| format!("- {col}: Table field used to store information related to '{col}'."))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Narrative, separator, column listing.
pub fn render_output(narrative: &str, columns: &[String]) -> String {
    format!(
        "{}\n\n{COLUMN_SECTION_HEADER}\n{}",
        narrative.trim(),
        describe_columns(columns)
    )
}
