//! Core domain types shared by every stage.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EnrichError, Result};

/// Characters allowed in an identifier so it is always a single file-name
/// component inside the output directory.
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid identifier regex"));

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// The key threading every stage artifact together (usually a catalog GUID).
///
/// Only the file-name shape is checked. Nothing verifies that an intake run
/// actually produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(EnrichError::validation("identifier is required"));
        }
        if raw == "." || raw == ".." || !IDENTIFIER_RE.is_match(raw) {
            return Err(EnrichError::validation(format!(
                "identifier '{raw}' may only contain letters, digits, '.', '_' and '-'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = EnrichError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// IntakeRecord
// ---------------------------------------------------------------------------

/// Linkage metadata recorded by the intake stage (`<id>.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub identifier: Identifier,
    /// Table sampled by the query engine stage.
    #[serde(default)]
    pub target_table: String,
    /// Documentation pages rendered by the capture stage, in order.
    #[serde(default)]
    pub documentation_links: Vec<String>,
}

impl IntakeRecord {
    /// Build a record from raw form input.
    ///
    /// `links_text` is newline-delimited; blank lines are dropped and each
    /// link is trimmed.
    pub fn from_submission(identifier: &str, target_table: &str, links_text: &str) -> Result<Self> {
        if identifier.trim().is_empty() || target_table.trim().is_empty() {
            return Err(EnrichError::validation(
                "identifier and target table are both required",
            ));
        }

        Ok(Self {
            identifier: Identifier::parse(identifier)?,
            target_table: target_table.to_string(),
            documentation_links: split_links(links_text),
        })
    }
}

/// Split newline-delimited link text into trimmed, non-blank entries.
pub fn split_links(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// CatalogRecord
// ---------------------------------------------------------------------------

/// Column attributes keyed by the column entity guid.
pub type ColumnMap = BTreeMap<String, serde_yaml::Value>;

/// Technical metadata written by the catalog stage (`<id>_catalog.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub identifier: Identifier,
    pub qualified_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub columns: ColumnMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_schema: Option<AttachedSchema>,
}

impl CatalogRecord {
    /// Column names in key order, falling back to the guid when a column has
    /// no `name` attribute.
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|(guid, attrs)| {
                attrs
                    .get("name")
                    .and_then(serde_yaml::Value::as_str)
                    .unwrap_or(guid)
                    .to_string()
            })
            .collect()
    }
}

/// Schema entity attached to a resource-set entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedSchema {
    pub guid: String,
    pub name: Option<String>,
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub columns: ColumnMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_accepts_guid_shapes() {
        assert!(Identifier::parse("abc-123").is_ok());
        assert!(Identifier::parse("6a1f3c2e-0b8d-4f5e-9c7a-2d4b6e8f0a1c").is_ok());
        assert!(Identifier::parse("orders_v2.snapshot").is_ok());
    }

    #[test]
    fn identifier_rejects_path_components() {
        for bad in ["", "  ", ".", "..", "a/b", "..\\x", "id with space"] {
            assert!(Identifier::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn submission_keeps_required_fields_verbatim() {
        let rec = IntakeRecord::from_submission("abc-123", "space.orders", "").unwrap();
        assert_eq!(rec.identifier.as_str(), "abc-123");
        assert_eq!(rec.target_table, "space.orders");
        assert!(rec.documentation_links.is_empty());
    }

    #[test]
    fn submission_rejects_blank_required_fields() {
        assert!(IntakeRecord::from_submission("", "orders", "").is_err());
        assert!(IntakeRecord::from_submission("abc", "   ", "").is_err());
    }

    #[test]
    fn links_empty_iff_blank_text() {
        assert!(split_links("").is_empty());
        assert!(split_links("  \n\t\n   ").is_empty());

        let links = split_links("  https://a.example/x \n\n https://b.example/y\n");
        assert_eq!(links, vec!["https://a.example/x", "https://b.example/y"]);
    }

    #[test]
    fn intake_yaml_preserves_field_order() {
        let rec = IntakeRecord::from_submission("abc-123", "orders", "https://a.example").unwrap();
        let yaml = serde_yaml::to_string(&rec).unwrap();
        let id_pos = yaml.find("identifier").unwrap();
        let table_pos = yaml.find("target_table").unwrap();
        let links_pos = yaml.find("documentation_links").unwrap();
        assert!(id_pos < table_pos && table_pos < links_pos);
    }

    #[test]
    fn intake_yaml_with_bad_identifier_fails_to_load() {
        let yaml = "identifier: ../etc\ntarget_table: t\n";
        assert!(serde_yaml::from_str::<IntakeRecord>(yaml).is_err());
    }

    #[test]
    fn column_names_prefer_name_attribute() {
        let mut columns = ColumnMap::new();
        columns.insert(
            "guid-1".into(),
            serde_yaml::from_str("name: order_id\ntype: int").unwrap(),
        );
        columns.insert("guid-2".into(), serde_yaml::from_str("type: string").unwrap());

        let rec = CatalogRecord {
            identifier: Identifier::parse("abc").unwrap(),
            qualified_name: None,
            name: None,
            description: None,
            columns,
            lineage: None,
            attached_schema: None,
        };
        assert_eq!(rec.column_names(), vec!["order_id", "guid-2"]);
    }
}
