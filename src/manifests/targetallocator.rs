// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Target allocator deployment, configuration and service account.

use super::labels::{identity_selector, labels};
use super::resolve_image;
use crate::config::Config;
use crate::constants::{config_files, labels as label_keys};
use crate::error::{OperatorError, Result};
use crate::naming;
use crate::types::OpenTelemetryCollector;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, EnvVarSource, KeyToPath,
    ObjectFieldSelector, PodSpec, PodTemplateSpec, ServiceAccount, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

const ALLOCATION_STRATEGY: &str = "least-weighted";

pub fn service_account_name(otelcol: &OpenTelemetryCollector) -> String {
    match otelcol.spec.target_allocator.service_account.as_deref() {
        Some(sa) if !sa.is_empty() => sa.to_string(),
        _ => naming::target_allocator_service_account(otelcol),
    }
}

pub fn container(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<Container> {
    let ta = &otelcol.spec.target_allocator;
    let image = resolve_image(ta.image.as_deref(), &config.target_allocator_image, "target allocator")?;

    let mut env = vec![EnvVar {
        name: "OTELCOL_NAMESPACE".to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: "metadata.namespace".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }];
    env.extend(ta.env.iter().cloned());

    let args = ta
        .prometheus_cr
        .enabled
        .then(|| vec!["--enable-prometheus-cr-watcher".to_string()]);

    Ok(Container {
        name: naming::TARGET_ALLOCATOR_CONTAINER.to_string(),
        image: Some(image),
        env: Some(env),
        volume_mounts: Some(vec![VolumeMount {
            name: config_files::TARGET_ALLOCATOR_VOLUME.to_string(),
            mount_path: config_files::TARGET_ALLOCATOR_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        resources: ta.resources.clone(),
        args,
        ..Default::default()
    })
}

pub fn volumes(otelcol: &OpenTelemetryCollector) -> Vec<Volume> {
    vec![Volume {
        name: config_files::TARGET_ALLOCATOR_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: naming::target_allocator_config_map(otelcol),
            items: Some(vec![KeyToPath {
                key: config_files::TARGET_ALLOCATOR_KEY.to_string(),
                path: config_files::TARGET_ALLOCATOR_KEY.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }]
}

pub fn deployment(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<Deployment> {
    let name = naming::target_allocator(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_TARGET_ALLOCATOR);
    let pod_annotations = &otelcol.spec.pod_annotations;

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: otelcol.namespace(),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: otelcol.spec.target_allocator.replicas,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: (!pod_annotations.is_empty()).then(|| pod_annotations.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(service_account_name(otelcol)),
                    containers: vec![container(otelcol, config)?],
                    volumes: Some(volumes(otelcol)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Target allocator configuration: the collector's prometheus scrape config plus the
/// selector the allocator uses to find collector pods.
pub fn config_map(otelcol: &OpenTelemetryCollector) -> Result<ConfigMap> {
    let name = naming::target_allocator_config_map(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_TARGET_ALLOCATOR);

    let mut ta_config = Mapping::new();
    ta_config.insert(
        Value::from("allocation_strategy"),
        Value::from(ALLOCATION_STRATEGY),
    );
    ta_config.insert(Value::from("config"), prometheus_config(&otelcol.spec.config)?);
    ta_config.insert(
        Value::from("label_selector"),
        serde_yaml::to_value(identity_selector(otelcol)).map_err(invalid_config)?,
    );

    let rendered = serde_yaml::to_string(&ta_config).map_err(invalid_config)?;

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: otelcol.namespace(),
            labels: Some(labels),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            config_files::TARGET_ALLOCATOR_KEY.to_string(),
            rendered,
        )])),
        ..Default::default()
    })
}

pub fn service_account(otelcol: &OpenTelemetryCollector) -> ServiceAccount {
    let name = naming::target_allocator_service_account(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_TARGET_ALLOCATOR);
    let annotations = otelcol.annotations();

    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: otelcol.namespace(),
            labels: Some(labels),
            annotations: (!annotations.is_empty()).then(|| annotations.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn invalid_config(e: serde_yaml::Error) -> OperatorError {
    OperatorError::Validation(format!("collector config is not valid YAML: {}", e))
}

/// Extract `receivers.prometheus.config` from the collector configuration
fn prometheus_config(raw: &str) -> Result<Value> {
    let parsed: Value = serde_yaml::from_str(raw).map_err(invalid_config)?;

    parsed
        .get("receivers")
        .and_then(|r| r.get("prometheus"))
        .and_then(|p| p.get("config"))
        .cloned()
        .ok_or_else(|| {
            OperatorError::Validation(
                "target allocator is enabled but the collector config has no prometheus receiver config"
                    .to_string(),
            )
        })
}
