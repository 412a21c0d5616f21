//! Deployment spec: where the application chart comes from and which values
//! it is installed with

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::values::Values;

/// Chart reference
///
/// Either the remote form (`url` + `name` + `version`) or the local form
/// (`path`). Absent fields are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ChartRef {
    /// Chart served by a Helm repository
    pub fn remote(
        url: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            url: Some(url.into()),
            name: Some(name.into()),
            version: Some(version.into()),
            path: None,
        }
    }

    /// Chart available at a path, e.g. mounted inside the cluster
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Keep only the remote coordinates
    pub fn to_remote(&self) -> Self {
        Self {
            url: self.url.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            path: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.path.is_some()
    }

    /// Fails unless one of the two forms is fully populated
    pub fn check_complete(&self) -> std::result::Result<(), String> {
        if self.path.as_deref().is_some_and(|p| !p.is_empty()) {
            return Ok(());
        }

        let missing: Vec<&str> = [
            ("url", &self.url),
            ("name", &self.name),
            ("version", &self.version),
        ]
        .into_iter()
        .filter(|(_, field)| field.as_deref().is_none_or(str::is_empty))
        .map(|(key, _)| key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "chart needs either `path` or `url`, `name` and `version` (missing: {})",
                missing.join(", ")
            ))
        }
    }
}

/// Chart source plus values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default)]
    pub chart: ChartRef,

    #[serde(default)]
    pub values: Values,
}

impl Spec {
    pub fn new(chart: ChartRef, values: Values) -> Self {
        Self { chart, values }
    }

    /// Parse a spec document, `origin` names where it came from for errors
    ///
    /// A document whose chart reference is incomplete is rejected.
    pub fn from_yaml(yaml: &str, origin: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(yaml).map_err(|e| parse_error(origin, e))?;
        spec.chart.check_complete().map_err(|e| parse_error(origin, e))?;
        Ok(spec)
    }

    pub fn from_json(json: &str, origin: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json).map_err(|e| parse_error(origin, e))?;
        spec.chart.check_complete().map_err(|e| parse_error(origin, e))?;
        Ok(spec)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_error(origin: &str, message: impl ToString) -> CoreError {
    CoreError::SpecParse {
        origin: origin.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_json() {
        let spec = Spec::from_json(
            r#"{
                "chart": {"url": "https://charts.wandb.ai", "name": "operator-wandb", "version": "0.18.0"},
                "values": {"global": {"host": "https://wandb.example.com"}}
            }"#,
            "channel",
        )
        .unwrap();

        assert_eq!(
            spec.chart,
            ChartRef::remote("https://charts.wandb.ai", "operator-wandb", "0.18.0")
        );
        assert_eq!(
            spec.values.get("global.host").unwrap(),
            "https://wandb.example.com"
        );
    }

    #[test]
    fn test_parse_bundle_yaml() {
        let spec = Spec::from_yaml(
            r#"
chart:
  url: https://charts.wandb.ai
  name: operator-wandb
  version: 0.18.0
values:
  app:
    image:
      tag: 0.59.2
"#,
            "spec.yaml",
        )
        .unwrap();

        assert_eq!(spec.chart.version.as_deref(), Some("0.18.0"));
        assert_eq!(spec.values.get("app.image.tag").unwrap(), "0.59.2");
    }

    #[test]
    fn test_empty_values_are_an_empty_mapping() {
        let spec = Spec::from_yaml("chart:\n  path: /charts/x\nvalues:\n", "spec.yaml").unwrap();
        assert!(spec.values.is_empty());
        assert!(spec.chart.is_local());
    }

    #[test]
    fn test_malformed_spec_is_rejected() {
        let err = Spec::from_json("{not json", "channel").unwrap_err();
        assert!(matches!(err, CoreError::SpecParse { ref origin, .. } if origin == "channel"));

        let err = Spec::from_yaml("values: [1, 2]", "spec.yaml").unwrap_err();
        assert!(matches!(err, CoreError::SpecParse { .. }));
    }

    #[test]
    fn test_incomplete_chart_is_rejected() {
        for json in [
            "{}",
            r#"{"values": {}}"#,
            r#"{"values": {"foo": 1}}"#,
            r#"{"chart": {"name": "x"}}"#,
            r#"{"chart": {"url": "https://charts.wandb.ai", "name": "x", "version": ""}}"#,
        ] {
            let err = Spec::from_json(json, "channel").unwrap_err();
            assert!(matches!(err, CoreError::SpecParse { .. }), "input: {json}");
        }

        let err = Spec::from_yaml("values:\n  foo: 1\n", "spec.yaml").unwrap_err();
        match err {
            CoreError::SpecParse { origin, message } => {
                assert_eq!(origin, "spec.yaml");
                assert!(message.contains("url, name, version"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_complete() {
        assert!(ChartRef::local("/charts/operator-wandb").check_complete().is_ok());
        assert!(
            ChartRef::remote("https://charts.wandb.ai", "operator-wandb", "0.18.0")
                .check_complete()
                .is_ok()
        );

        let partial = ChartRef {
            name: Some("operator-wandb".to_string()),
            ..ChartRef::default()
        };
        assert!(partial.check_complete().unwrap_err().contains("url, version"));
    }

    #[test]
    fn test_local_chart_omits_url() {
        let json = serde_json::to_value(ChartRef::local("/charts/operator-wandb")).unwrap();
        assert_eq!(json, serde_json::json!({"path": "/charts/operator-wandb"}));
    }

    #[test]
    fn test_to_remote_drops_path() {
        let mut chart = ChartRef::remote("https://charts.wandb.ai", "operator-wandb", "1.0.0");
        chart.path = Some("/tmp/x.tgz".to_string());

        assert_eq!(
            chart.to_remote(),
            ChartRef::remote("https://charts.wandb.ai", "operator-wandb", "1.0.0")
        );
    }
}
