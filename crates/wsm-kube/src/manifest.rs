//! Multi-document YAML manifests

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{KubeError, Result};

/// Split a rendered manifest into its non-empty documents
pub fn parse_documents(manifest: &str) -> Result<Vec<JsonValue>> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let value = JsonValue::deserialize(document).map_err(|e| {
            KubeError::InvalidManifest(format!("document {}: {}", index, e))
        })?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}
