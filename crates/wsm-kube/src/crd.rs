//! The `WeightsAndBiases` custom resource reconciled by the operator

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wsm_core::{ChartRef, Spec, Values};

pub const GROUP: &str = "apps.wandb.com";
pub const VERSION: &str = "v1";
pub const KIND: &str = "WeightsAndBiases";
pub const PLURAL: &str = "weightsandbiases";

/// The single instance wsm manages
pub const RESOURCE_NAME: &str = "wandb";
pub const RESOURCE_NAMESPACE: &str = "default";

/// Field manager for server-side apply, shared with the operator
pub const FIELD_MANAGER: &str = "wandb-controller-manager";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "apps.wandb.com",
    version = "v1",
    kind = "WeightsAndBiases",
    plural = "weightsandbiases",
    namespaced,
    schema = "disabled"
)]
pub struct WeightsAndBiasesSpec {
    pub chart: ChartRef,
    pub values: Values,
}

impl From<Spec> for WeightsAndBiasesSpec {
    fn from(spec: Spec) -> Self {
        Self {
            chart: spec.chart,
            values: spec.values,
        }
    }
}

impl From<WeightsAndBiasesSpec> for Spec {
    fn from(spec: WeightsAndBiasesSpec) -> Self {
        Spec::new(spec.chart, spec.values)
    }
}

impl WeightsAndBiases {
    /// The `wandb` instance in `default`, labelled for the operator
    pub fn for_chart(chart: ChartRef, values: Values) -> Self {
        let mut resource = WeightsAndBiases::new(RESOURCE_NAME, WeightsAndBiasesSpec { chart, values });
        resource.metadata.namespace = Some(RESOURCE_NAMESPACE.to_string());
        resource.metadata.labels = Some(BTreeMap::from([
            ("app.kubernetes.io/name".to_string(), PLURAL.to_string()),
            ("app.kubernetes.io/instance".to_string(), RESOURCE_NAME.to_string()),
        ]));
        resource
    }
}
