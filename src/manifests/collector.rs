// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Collector workload, configuration and service account.

use super::labels::labels;
use super::resolve_image;
use crate::config::Config;
use crate::constants::{config_files, injection, labels as label_keys};
use crate::error::Result;
use crate::naming;
use crate::types::OpenTelemetryCollector;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec, Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, EnvVarSource, KeyToPath,
    ObjectFieldSelector, PodSpec, PodTemplateSpec, ServiceAccount, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Service account the collector pods run as
pub fn service_account_name(otelcol: &OpenTelemetryCollector) -> String {
    match otelcol.spec.service_account.as_deref() {
        Some(sa) if !sa.is_empty() => sa.to_string(),
        _ => naming::collector_service_account(otelcol),
    }
}

fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then(|| map.clone())
}

/// The collector container, also used as the injected sidecar
pub fn container(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<Container> {
    let image = resolve_image(otelcol.spec.image.as_deref(), &config.collector_image, "collector")?;

    Ok(Container {
        name: naming::COLLECTOR_CONTAINER.to_string(),
        image: Some(image),
        args: Some(vec![format!(
            "--config={}/{}",
            config_files::COLLECTOR_MOUNT_PATH,
            config_files::COLLECTOR_KEY
        )]),
        env: Some(vec![pod_name_env()]),
        volume_mounts: Some(vec![VolumeMount {
            name: config_files::COLLECTOR_VOLUME.to_string(),
            mount_path: config_files::COLLECTOR_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        resources: otelcol.spec.resources.clone(),
        ..Default::default()
    })
}

pub(crate) fn pod_name_env() -> EnvVar {
    EnvVar {
        name: "POD_NAME".to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: "metadata.name".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn volumes(otelcol: &OpenTelemetryCollector) -> Vec<Volume> {
    vec![Volume {
        name: config_files::COLLECTOR_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: naming::collector_config_map(otelcol),
            items: Some(vec![KeyToPath {
                key: config_files::COLLECTOR_KEY.to_string(),
                path: config_files::COLLECTOR_KEY.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }]
}

fn pod_template(
    otelcol: &OpenTelemetryCollector,
    config: &Config,
    labels: &BTreeMap<String, String>,
) -> Result<PodTemplateSpec> {
    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.clone()),
            annotations: non_empty(&otelcol.spec.pod_annotations),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(service_account_name(otelcol)),
            containers: vec![container(otelcol, config)?],
            volumes: Some(volumes(otelcol)),
            ..Default::default()
        }),
    })
}

fn metadata(otelcol: &OpenTelemetryCollector, name: String, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: otelcol.namespace(),
        labels: Some(labels),
        annotations: non_empty(otelcol.annotations()),
        ..Default::default()
    }
}

pub fn deployment(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<Deployment> {
    let name = naming::collector(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_COLLECTOR);

    Ok(Deployment {
        spec: Some(DeploymentSpec {
            replicas: otelcol.spec.replicas,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: pod_template(otelcol, config, &labels)?,
            ..Default::default()
        }),
        metadata: metadata(otelcol, name, labels),
        ..Default::default()
    })
}

pub fn daemon_set(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<DaemonSet> {
    let name = naming::collector(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_COLLECTOR);

    Ok(DaemonSet {
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: pod_template(otelcol, config, &labels)?,
            ..Default::default()
        }),
        metadata: metadata(otelcol, name, labels),
        ..Default::default()
    })
}

pub fn config_map(otelcol: &OpenTelemetryCollector) -> ConfigMap {
    let name = naming::collector_config_map(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_COLLECTOR);

    ConfigMap {
        metadata: metadata(otelcol, name, labels),
        data: Some(BTreeMap::from([(
            config_files::COLLECTOR_KEY.to_string(),
            otelcol.spec.config.clone(),
        )])),
        ..Default::default()
    }
}

pub fn service_account(otelcol: &OpenTelemetryCollector) -> ServiceAccount {
    let name = naming::collector_service_account(otelcol);
    let labels = labels(otelcol, &name, label_keys::COMPONENT_COLLECTOR);

    ServiceAccount {
        metadata: metadata(otelcol, name, labels),
        ..Default::default()
    }
}

/// Container injected into application pods for sidecar-mode collectors.
///
/// Sidecars have no ConfigMap of their own, the configuration travels in an env var.
pub fn sidecar(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<Container> {
    let image = resolve_image(otelcol.spec.image.as_deref(), &config.collector_image, "collector")?;

    Ok(Container {
        name: injection::SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(image),
        args: Some(vec![format!("--config=env:{}", injection::SIDECAR_CONFIG_ENV)]),
        env: Some(vec![
            EnvVar {
                name: injection::SIDECAR_CONFIG_ENV.to_string(),
                value: Some(otelcol.spec.config.clone()),
                ..Default::default()
            },
            pod_name_env(),
        ]),
        resources: otelcol.spec.resources.clone(),
        ..Default::default()
    })
}
