// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(
    group = "opentelemetry.io",
    version = "v1alpha1",
    kind = "Instrumentation",
    shortname = "otelinst"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationSpec {
    /// Injected into every instrumented container, regardless of language
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub java: LanguageSpec,
    #[serde(default)]
    pub nodejs: LanguageSpec,
    #[serde(default)]
    pub python: LanguageSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSpec {
    /// Image carrying the agent artifact. Falls back to the operator default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_languages_default_when_omitted() {
        let spec: InstrumentationSpec = serde_json::from_value(serde_json::json!({
            "java": { "image": "example.com/java-agent:1.0" }
        }))
        .unwrap();

        assert_eq!(spec.java.image.as_deref(), Some("example.com/java-agent:1.0"));
        assert!(spec.nodejs.image.is_none());
        assert!(spec.python.env.is_empty());
    }
}
