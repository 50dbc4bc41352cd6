//! Per-identifier artifact layout in the shared output directory.
//!
//! ```text
//! <output_dir>/
//! ├── <id>.yaml              intake record
//! ├── <id>_catalog.yaml      catalog record
//! ├── <id>_sample.csv        sample table
//! ├── <id>_doc1.pdf ...      captured documents
//! └── <id>_synthesis.txt     synthesis output
//! ```
//!
//! Writers overwrite; there is no locking, so the last writer wins.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{EnrichError, Result};
use crate::types::{CatalogRecord, Identifier, IntakeRecord};

const INTAKE_HINT: &str = "run `metaenrich intake` first";
const CATALOG_HINT: &str = "run `metaenrich catalog` first";
const SAMPLE_HINT: &str = "run `metaenrich sample` first";

/// Resolves and reads/writes artifacts under one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn intake_path(&self, id: &Identifier) -> PathBuf {
        self.root.join(format!("{id}.yaml"))
    }

    pub fn catalog_path(&self, id: &Identifier) -> PathBuf {
        self.root.join(format!("{id}_catalog.yaml"))
    }

    pub fn sample_path(&self, id: &Identifier) -> PathBuf {
        self.root.join(format!("{id}_sample.csv"))
    }

    /// Path of the `position`-th captured document (1-based).
    pub fn document_path(&self, id: &Identifier, position: usize) -> PathBuf {
        self.root.join(format!("{id}_doc{position}.pdf"))
    }

    pub fn synthesis_path(&self, id: &Identifier) -> PathBuf {
        self.root.join(format!("{id}_synthesis.txt"))
    }

    /// Create the output directory if needed.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| EnrichError::io(&self.root, e))
    }

    // -- intake --------------------------------------------------------------

    pub fn write_intake(&self, record: &IntakeRecord) -> Result<PathBuf> {
        let path = self.intake_path(&record.identifier);
        self.write_yaml(&path, record)?;
        Ok(path)
    }

    /// Load the intake record; the stored identifier must match `id`.
    pub fn load_intake(&self, id: &Identifier) -> Result<IntakeRecord> {
        let path = self.intake_path(id);
        let record: IntakeRecord = read_yaml(&path, INTAKE_HINT)?;
        if &record.identifier != id {
            return Err(EnrichError::validation(format!(
                "{} belongs to identifier '{}', not '{id}'",
                path.display(),
                record.identifier
            )));
        }
        Ok(record)
    }

    /// Load the intake record and return its non-blank target table.
    pub fn load_target_table(&self, id: &Identifier) -> Result<String> {
        let record = self.load_intake(id)?;
        if record.target_table.trim().is_empty() {
            return Err(EnrichError::missing_field("target_table", self.intake_path(id)));
        }
        Ok(record.target_table)
    }

    // -- catalog -------------------------------------------------------------

    pub fn write_catalog(&self, record: &CatalogRecord) -> Result<PathBuf> {
        let path = self.catalog_path(&record.identifier);
        self.write_yaml(&path, record)?;
        Ok(path)
    }

    pub fn load_catalog(&self, id: &Identifier) -> Result<CatalogRecord> {
        read_yaml(&self.catalog_path(id), CATALOG_HINT)
    }

    // -- sample --------------------------------------------------------------

    /// Fail with `MissingArtifact` unless the sample CSV exists.
    pub fn require_sample(&self, id: &Identifier) -> Result<PathBuf> {
        let path = self.sample_path(id);
        if !path.is_file() {
            return Err(EnrichError::missing_artifact(path, SAMPLE_HINT));
        }
        Ok(path)
    }

    // -- documents -----------------------------------------------------------

    /// Captured documents for `id`, ordered by position.
    pub fn document_paths(&self, id: &Identifier) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = document_prefix(id);
        let entries = std::fs::read_dir(&self.root).map_err(|e| EnrichError::io(&self.root, e))?;

        let mut docs: Vec<(usize, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EnrichError::io(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(position) = parse_position(&prefix, name) {
                docs.push((position, entry.path()));
            }
        }

        docs.sort_by_key(|(position, _)| *position);
        Ok(docs.into_iter().map(|(_, path)| path).collect())
    }

    /// Captured documents that belong to the current intake record: only
    /// positions `1..=links` count. Without an intake record every document
    /// is returned.
    pub fn linked_document_paths(&self, id: &Identifier) -> Result<Vec<PathBuf>> {
        let docs = self.document_paths(id)?;
        if !self.intake_path(id).is_file() {
            return Ok(docs);
        }
        let links = self.load_intake(id)?.documentation_links.len();
        Ok(docs
            .into_iter()
            .filter(|path| document_position(id, path).is_some_and(|p| (1..=links).contains(&p)))
            .collect())
    }

    /// Remove every captured document for `id`. Returns how many were removed.
    pub fn clear_documents(&self, id: &Identifier) -> Result<usize> {
        let docs = self.document_paths(id)?;
        for path in &docs {
            std::fs::remove_file(path).map_err(|e| EnrichError::io(path, e))?;
        }
        if !docs.is_empty() {
            debug!(id = %id, removed = docs.len(), "previous documents removed");
        }
        Ok(docs.len())
    }

    // -- raw writers ---------------------------------------------------------

    pub fn write_yaml<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let content =
            serde_yaml::to_string(value).map_err(|e| EnrichError::Serialization(e.to_string()))?;
        self.write_bytes(path, content.as_bytes())
    }

    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        std::fs::write(path, bytes).map_err(|e| EnrichError::io(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }
}

fn document_prefix(id: &Identifier) -> String {
    format!("{id}_doc")
}

fn parse_position(prefix: &str, file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".pdf"))
        .and_then(|n| n.parse::<usize>().ok())
}

fn document_position(id: &Identifier, path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    parse_position(&document_prefix(id), name)
}

/// Read and deserialize a YAML artifact, reporting a missing file as
/// `MissingArtifact` with the given hint.
pub fn read_yaml<T: DeserializeOwned>(path: &Path, hint: &str) -> Result<T> {
    if !path.is_file() {
        return Err(EnrichError::missing_artifact(path, hint));
    }
    let content = std::fs::read_to_string(path).map_err(|e| EnrichError::io(path, e))?;
    serde_yaml::from_str(&content)
        .map_err(|e| EnrichError::Serialization(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn paths_concatenate_identifier_and_suffix() {
        let store = ArtifactStore::new("history");
        let id = id("abc-123");
        assert_eq!(store.intake_path(&id), PathBuf::from("history/abc-123.yaml"));
        assert_eq!(store.catalog_path(&id), PathBuf::from("history/abc-123_catalog.yaml"));
        assert_eq!(store.sample_path(&id), PathBuf::from("history/abc-123_sample.csv"));
        assert_eq!(store.document_path(&id, 2), PathBuf::from("history/abc-123_doc2.pdf"));
        assert_eq!(store.synthesis_path(&id), PathBuf::from("history/abc-123_synthesis.txt"));
    }

    #[test]
    fn intake_roundtrip_and_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("out"));

        let first = IntakeRecord::from_submission("abc-123", "orders", "https://a.example").unwrap();
        store.write_intake(&first).unwrap();
        let second = IntakeRecord::from_submission("abc-123", "orders_v2", "").unwrap();
        store.write_intake(&second).unwrap();

        let loaded = store.load_intake(&id("abc-123")).unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn missing_intake_is_named() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let err = store.load_intake(&id("nope")).unwrap_err();
        assert!(matches!(err, EnrichError::MissingArtifact { .. }));
        assert!(err.to_string().contains("metaenrich intake"));
    }

    #[test]
    fn missing_target_table_is_named() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        std::fs::write(tmp.path().join("abc.yaml"), "identifier: abc\n").unwrap();

        let err = store.load_target_table(&id("abc")).unwrap_err();
        assert!(matches!(err, EnrichError::MissingField { ref field, .. } if field == "target_table"));
    }

    #[test]
    fn mismatched_identifier_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        std::fs::write(tmp.path().join("abc.yaml"), "identifier: other\ntarget_table: t\n").unwrap();

        assert!(matches!(
            store.load_intake(&id("abc")),
            Err(EnrichError::Validation { .. })
        ));
    }

    #[test]
    fn document_paths_sorted_numerically_and_scoped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        for name in [
            "abc_doc10.pdf",
            "abc_doc2.pdf",
            "abc_doc1.pdf",
            "abcd_doc3.pdf",
            "abc_docx.pdf",
            "abc_doc4.txt",
        ] {
            std::fs::write(tmp.path().join(name), b"%PDF").unwrap();
        }

        let docs = store.document_paths(&id("abc")).unwrap();
        let names: Vec<_> = docs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["abc_doc1.pdf", "abc_doc2.pdf", "abc_doc10.pdf"]);
    }

    #[test]
    fn linked_documents_follow_current_intake() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        for name in ["abc_doc1.pdf", "abc_doc2.pdf", "abc_doc3.pdf"] {
            std::fs::write(tmp.path().join(name), b"%PDF").unwrap();
        }

        assert_eq!(store.linked_document_paths(&id("abc")).unwrap().len(), 3);

        let two_links =
            IntakeRecord::from_submission("abc", "orders", "https://a.example\nhttps://b.example")
                .unwrap();
        store.write_intake(&two_links).unwrap();
        assert_eq!(
            store.linked_document_paths(&id("abc")).unwrap(),
            vec![tmp.path().join("abc_doc1.pdf"), tmp.path().join("abc_doc2.pdf")]
        );

        let no_links = IntakeRecord::from_submission("abc", "orders", "").unwrap();
        store.write_intake(&no_links).unwrap();
        assert!(store.linked_document_paths(&id("abc")).unwrap().is_empty());
    }

    #[test]
    fn clear_documents_leaves_other_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        for name in ["abc_doc1.pdf", "abc_doc7.pdf", "abcd_doc1.pdf", "abc_sample.csv"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }

        assert_eq!(store.clear_documents(&id("abc")).unwrap(), 2);
        assert!(store.document_paths(&id("abc")).unwrap().is_empty());
        assert!(tmp.path().join("abcd_doc1.pdf").exists());
        assert!(tmp.path().join("abc_sample.csv").exists());
    }

    #[test]
    fn document_paths_empty_when_dir_missing() {
        let store = ArtifactStore::new("/nonexistent/metaenrich/out");
        assert!(store.document_paths(&id("abc")).unwrap().is_empty());
    }
}
