// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(
    group = "opentelemetry.io",
    version = "v1alpha1",
    kind = "OpenTelemetryCollector",
    shortname = "otelcol"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryCollectorSpec {
    #[serde(default)]
    pub mode: Mode,
    /// Desired replicas, or the lower bound when `max_replicas` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Raw collector configuration (YAML)
    #[serde(default)]
    pub config: String,
    /// Existing service account to run as. A dedicated one is generated when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub target_allocator: TargetAllocatorSpec,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Deployment,
    DaemonSet,
    Sidecar,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetAllocatorSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, rename = "prometheusCR")]
    pub prometheus_cr: PrometheusCrSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
pub struct PrometheusCrSpec {
    #[serde(default)]
    pub enabled: bool,
}

impl OpenTelemetryCollector {
    /// Value of the `instance` identity label: `<namespace>.<name>`
    pub fn instance_identity(&self) -> String {
        crate::naming::truncate(
            &format!("{}.{}", self.namespace().unwrap_or_default(), self.name_any()),
            63,
        )
    }

    pub fn target_allocator_enabled(&self) -> bool {
        self.spec.target_allocator.enabled
    }

    pub fn is_sidecar(&self) -> bool {
        self.spec.mode == Mode::Sidecar
    }
}
