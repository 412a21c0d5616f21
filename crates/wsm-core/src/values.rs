//! Values handling with deep merge support
//!
//! A [`Values`] tree is always rooted at a mapping. Leaves are scalars or
//! sequences; sequences are never merged element-wise.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{CoreError, Result};

/// How a merge treats a key holding a mapping on one side and a non-mapping
/// on the other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The overlay's value replaces the base's value wholesale
    #[default]
    OverrideWins,
    /// Fail with [`CoreError::TypeConflict`]
    Reject,
}

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct Values(Map<String, JsonValue>);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::try_from(value)
    }

    /// Parse values from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Deep merge `overlay` on top of these values, returning a new tree
    ///
    /// Neither input is modified. Scalars and sequences from the overlay
    /// replace the base; mappings present on both sides merge recursively;
    /// keys only in the base are kept.
    pub fn merge(&self, overlay: &Values) -> Result<Values> {
        self.merge_with(overlay, ConflictPolicy::OverrideWins)
    }

    /// Deep merge with an explicit policy for mapping/scalar conflicts
    pub fn merge_with(&self, overlay: &Values, policy: ConflictPolicy) -> Result<Values> {
        let mut merged = self.0.clone();
        merge_maps(&mut merged, &overlay.0, policy, "")?;
        Ok(Values(merged))
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: impl Into<JsonValue>) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        self.set_path(&segments, value)
    }

    /// Set a value by path segments, creating intermediate mappings
    ///
    /// Intermediate keys holding something other than a mapping are replaced.
    pub fn set_path(&mut self, segments: &[&str], value: impl Into<JsonValue>) -> Result<()> {
        let (last, parents) = match segments.split_last() {
            Some(split) if segments.iter().all(|s| !s.is_empty()) => split,
            _ => {
                return Err(CoreError::InvalidPath {
                    path: segments.join("."),
                });
            }
        };

        let mut current = &mut self.0;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            current = entry
                .as_object_mut()
                .expect("entry should be a mapping after initialization");
        }

        current.insert(last.to_string(), value.into());
        Ok(())
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let mut parts = path.split('.');
        let first = self.0.get(parts.next()?)?;
        parts.try_fold(first, |value, key| value.as_object()?.get(key))
    }

    /// Extract the mapping stored under a top-level key
    ///
    /// Returns `Ok(None)` when the key is absent and an empty tree when it
    /// holds `null`.
    pub fn subtree(&self, key: &str) -> Result<Option<Values>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(JsonValue::Null) => Ok(Some(Values::new())),
            Some(JsonValue::Object(map)) => Ok(Some(Values(map.clone()))),
            Some(other) => Err(CoreError::NotAMapping {
                path: key.to_string(),
                found: kind_name(other),
            }),
        }
    }

    /// Whether a top-level key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The root mapping, as handed to the chart installer
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Consume into the root mapping
    pub fn into_map(self) -> Map<String, JsonValue> {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, JsonValue>> for Values {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl TryFrom<JsonValue> for Values {
    type Error = CoreError;

    fn try_from(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(CoreError::NotAMapping {
                path: "<root>".to_string(),
                found: kind_name(&other),
            }),
        }
    }
}

impl From<Values> for JsonValue {
    fn from(values: Values) -> Self {
        JsonValue::Object(values.0)
    }
}

/// Values supplied with `--values`
///
/// A file with top-level `wandb` and/or `operator` keys splits into
/// application and operator values; any other file overrides the
/// application values as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalValues {
    pub app: Values,
    pub operator: Values,
}

impl LocalValues {
    pub const APP_KEY: &'static str = "wandb";
    pub const OPERATOR_KEY: &'static str = "operator";

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CoreError::ValuesFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::split(Values::from_file(path)?)
    }

    pub fn split(values: Values) -> Result<Self> {
        if !values.contains_key(Self::APP_KEY) && !values.contains_key(Self::OPERATOR_KEY) {
            return Ok(Self {
                app: values,
                operator: Values::new(),
            });
        }

        Ok(Self {
            app: values.subtree(Self::APP_KEY)?.unwrap_or_default(),
            operator: values.subtree(Self::OPERATOR_KEY)?.unwrap_or_default(),
        })
    }
}

fn merge_maps(
    base: &mut Map<String, JsonValue>,
    overlay: &Map<String, JsonValue>,
    policy: ConflictPolicy,
    prefix: &str,
) -> Result<()> {
    for (key, overlay_value) in overlay {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        let Some(base_value) = base.get_mut(key) else {
            base.insert(key.clone(), overlay_value.clone());
            continue;
        };

        match (base_value, overlay_value) {
            (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
                merge_maps(base_map, overlay_map, policy, &path)?;
            }
            (base_value, overlay_value) => {
                if base_value.is_object() != overlay_value.is_object() {
                    match policy {
                        ConflictPolicy::Reject => return Err(CoreError::TypeConflict { path }),
                        ConflictPolicy::OverrideWins => {
                            tracing::debug!(%path, "values type conflict, overlay replaces base");
                        }
                    }
                }
                *base_value = overlay_value.clone();
            }
        }
    }
    Ok(())
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(v: JsonValue) -> Values {
        Values::try_from(v).unwrap()
    }

    #[test]
    fn test_deep_merge() {
        let base = Values::from_yaml(
            r#"
image:
  repository: wandb/local
  tag: "0.50.0"
replicas: 1
"#,
        )
        .unwrap();

        let overlay = Values::from_yaml(
            r#"
image:
  tag: "0.51.0"
  pullPolicy: Always
replicas: 3
"#,
        )
        .unwrap();

        let merged = base.merge(&overlay).unwrap();

        assert_eq!(merged.get("image.repository").unwrap(), "wandb/local");
        assert_eq!(merged.get("image.tag").unwrap(), "0.51.0");
        assert_eq!(merged.get("image.pullPolicy").unwrap(), "Always");
        assert_eq!(merged.get("replicas").unwrap(), 3);
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let base = values(json!({"a": 1, "b": {"c": 2}}));
        let overlay = values(json!({"b": {"c": 3}}));
        let before = (base.clone(), overlay.clone());

        let _ = base.merge(&overlay).unwrap();

        assert_eq!((base, overlay), before);
    }

    #[test]
    fn test_merge_override_precedence() {
        let base = values(json!({"a": 1, "b": {"c": 2}}));
        let overlay = values(json!({"b": {"c": 3, "d": 4}}));

        let merged = base.merge(&overlay).unwrap();

        assert_eq!(merged, values(json!({"a": 1, "b": {"c": 3, "d": 4}})));
    }

    #[test]
    fn test_merge_identity_and_idempotence() {
        let tree = values(json!({
            "global": {"host": "https://wandb.example.com"},
            "app": {"replicas": 2, "env": ["A", "B"]},
            "enabled": true
        }));

        assert_eq!(tree.merge(&Values::new()).unwrap(), tree);
        assert_eq!(tree.merge(&tree).unwrap(), tree);
        assert_eq!(Values::new().merge(&tree).unwrap(), tree);
    }

    #[test]
    fn test_merge_is_not_commutative() {
        let left = values(json!({"a": 1}));
        let right = values(json!({"a": 2}));

        assert_eq!(left.merge(&right).unwrap().get("a").unwrap(), 2);
        assert_eq!(right.merge(&left).unwrap().get("a").unwrap(), 1);
    }

    #[test]
    fn test_merge_scalar_replaces_mapping() {
        let base = values(json!({"a": {"x": 1}}));
        let overlay = values(json!({"a": 5}));

        let merged = base.merge(&overlay).unwrap();

        assert_eq!(merged, values(json!({"a": 5})));
    }

    #[test]
    fn test_merge_mapping_replaces_scalar() {
        let base = values(json!({"a": "plain"}));
        let overlay = values(json!({"a": {"x": 1}}));

        let merged = base.merge(&overlay).unwrap();

        assert_eq!(merged, values(json!({"a": {"x": 1}})));
    }

    #[test]
    fn test_merge_reject_policy_reports_path() {
        let base = values(json!({"outer": {"a": {"x": 1}}}));
        let overlay = values(json!({"outer": {"a": 5}}));

        let err = base
            .merge_with(&overlay, ConflictPolicy::Reject)
            .unwrap_err();

        match err {
            CoreError::TypeConflict { path } => assert_eq!(path, "outer.a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_sequences_are_replaced() {
        let base = values(json!({"hosts": ["a", "b", "c"]}));
        let overlay = values(json!({"hosts": ["z"]}));

        let merged = base.merge(&overlay).unwrap();

        assert_eq!(merged.get("hosts").unwrap(), &json!(["z"]));
    }

    #[test]
    fn test_set_nested() {
        let mut values = Values::new();
        values.set("image.tag", "v1").unwrap();
        values.set("replicas", 3).unwrap();
        values.set_path(&["airgapped"], true).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v1");
        assert_eq!(values.get("replicas").unwrap(), 3);
        assert_eq!(values.get("airgapped").unwrap(), true);
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut tree = values(json!({"image": "nginx"}));
        tree.set("image.tag", "1.0").unwrap();

        assert_eq!(tree, values(json!({"image": {"tag": "1.0"}})));
    }

    #[test]
    fn test_set_rejects_empty_segments() {
        let mut values = Values::new();
        assert!(matches!(
            values.set("a..b", 1),
            Err(CoreError::InvalidPath { .. })
        ));
        assert!(matches!(
            values.set_path(&[], 1),
            Err(CoreError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = Values::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotAMapping {
                found: "sequence",
                ..
            }
        ));

        assert!(Values::from_yaml("").unwrap().is_empty());
        assert!(Values::from_yaml("~").unwrap().is_empty());
    }

    #[test]
    fn test_subtree_typed_extraction() {
        let tree = values(json!({"wandb": {"a": 1}, "operator": null, "name": "x"}));

        assert_eq!(tree.subtree("wandb").unwrap(), Some(values(json!({"a": 1}))));
        assert_eq!(tree.subtree("operator").unwrap(), Some(Values::new()));
        assert_eq!(tree.subtree("missing").unwrap(), None);
        assert!(matches!(
            tree.subtree("name"),
            Err(CoreError::NotAMapping { found: "string", .. })
        ));
    }

    #[test]
    fn test_serde_round_trip_keeps_order() {
        let tree = Values::from_yaml("zeta: 1\nalpha: 2\nmid: {b: 1, a: 2}\n").unwrap();
        let json = serde_json::to_string(&tree).unwrap();

        assert_eq!(json, r#"{"zeta":1,"alpha":2,"mid":{"b":1,"a":2}}"#);
    }

    #[test]
    fn test_local_values_split() {
        let split = LocalValues::split(values(json!({
            "wandb": {"global": {"host": "x"}},
            "operator": {"image": {"tag": "1.0.0"}}
        })))
        .unwrap();

        assert_eq!(split.app, values(json!({"global": {"host": "x"}})));
        assert_eq!(split.operator, values(json!({"image": {"tag": "1.0.0"}})));
    }

    #[test]
    fn test_local_values_without_sections_override_app() {
        let split = LocalValues::split(values(json!({"global": {"host": "x"}}))).unwrap();

        assert_eq!(split.app, values(json!({"global": {"host": "x"}})));
        assert!(split.operator.is_empty());
    }

    #[test]
    fn test_local_values_missing_file() {
        let err = LocalValues::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ValuesFileNotFound { .. }));
    }
}
