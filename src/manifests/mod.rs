// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired state of the children of a collector instance.
//!
//! Everything in here is a pure function of the instance and the operator configuration.
//! Nothing reads from the cluster.

pub mod collector;
pub mod labels;
pub mod targetallocator;

use crate::config::Config;
use crate::error::{OperatorError, Result};
use crate::types::{Mode, OpenTelemetryCollector};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};

/// All children that should exist for one instance, grouped by kind
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub deployments: Vec<Deployment>,
    pub daemon_sets: Vec<DaemonSet>,
    pub config_maps: Vec<ConfigMap>,
    pub service_accounts: Vec<ServiceAccount>,
}

/// Compute the desired children of `otelcol`.
///
/// Fails with a validation error when the instance cannot be rendered, for example when no
/// image can be resolved or the target allocator has no scrape configuration to work with.
pub fn build(otelcol: &OpenTelemetryCollector, config: &Config) -> Result<DesiredState> {
    let mut desired = DesiredState::default();

    match otelcol.spec.mode {
        Mode::Deployment => desired.deployments.push(collector::deployment(otelcol, config)?),
        Mode::DaemonSet => desired.daemon_sets.push(collector::daemon_set(otelcol, config)?),
        // injected into application pods by the webhook
        Mode::Sidecar => {}
    }

    if otelcol.spec.mode != Mode::Sidecar {
        desired.config_maps.push(collector::config_map(otelcol));
        if otelcol.spec.service_account.is_none() {
            desired.service_accounts.push(collector::service_account(otelcol));
        }
    }

    if otelcol.target_allocator_enabled() {
        desired.deployments.push(targetallocator::deployment(otelcol, config)?);
        desired.config_maps.push(targetallocator::config_map(otelcol)?);
        if otelcol.spec.target_allocator.service_account.is_none() {
            desired.service_accounts.push(targetallocator::service_account(otelcol));
        }
    }

    Ok(desired)
}

/// Pick the image named by the resource, falling back to the operator default
pub(crate) fn resolve_image(requested: Option<&str>, default: &str, component: &str) -> Result<String> {
    match requested {
        Some(image) if !image.is_empty() => Ok(image.to_string()),
        _ if !default.is_empty() => Ok(default.to_string()),
        _ => Err(OperatorError::Validation(format!(
            "no image set for the {} and no default configured",
            component
        ))),
    }
}
