use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read disease info: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid disease info json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Descriptive record for one label. Fields other than the known ones are
/// kept as-is so they can be echoed back to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cure: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DiseaseInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.cause.is_none() && self.cure.is_none() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entries: HashMap<String, DiseaseInfo>,
}

impl MetadataStore {
    /// Builds the table from a JSON array of records keyed by their `name`.
    /// Later duplicates overwrite earlier ones.
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let records: Vec<DiseaseInfo> = serde_json::from_str(json)?;
        let entries = records
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();

        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Exact-name lookup. Unknown labels get an empty record.
    pub fn lookup(&self, label: &str) -> DiseaseInfo {
        self.entries.get(label).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"name": "Tomato___Late_blight", "cause": "Phytophthora infestans", "cure": "Copper sprays"},
        {"name": "Apple___healthy", "cause": "None", "severity": 0}
    ]"#;

    #[test]
    fn lookup_by_exact_name() {
        let store = MetadataStore::from_json(SAMPLE).unwrap();
        assert_eq!(store.len(), 2);

        let info = store.lookup("Tomato___Late_blight");
        assert_eq!(info.cause.as_deref(), Some("Phytophthora infestans"));
        assert_eq!(info.cure.as_deref(), Some("Copper sprays"));

        let healthy = store.lookup("Apple___healthy");
        assert_eq!(healthy.extra.get("severity"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn missing_label_is_empty_record() {
        let store = MetadataStore::from_json(SAMPLE).unwrap();
        let info = store.lookup("tomato___late_blight");
        assert!(info.is_empty());
        assert_eq!(info, DiseaseInfo::default());
    }

    #[test]
    fn rejects_non_array_json() {
        assert!(matches!(
            MetadataStore::from_json(r#"{"name": "x"}"#),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MetadataStore::load(dir.path().join("nope.json")),
            Err(MetadataError::Io(_))
        ));
    }
}
