// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Collector reconciler - watches OpenTelemetryCollector resources and converges their children.

use super::objects::{apply, ObjectOutcome};
use super::prune::prune;
use crate::config::Config;
use crate::error::{OperatorError, Result};
use crate::kubernetes::{KubeObjectClient, ObjectClient};
use crate::manifests::{self, labels::identity_selector};
use crate::naming;
use crate::types::OpenTelemetryCollector;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const REQUEUE_AFTER_ERROR: Duration = Duration::from_secs(60);
const REQUEUE_AFTER_INVALID: Duration = Duration::from_secs(300);

pub struct CollectorReconciler {
    client: Client,
    objects: KubeObjectClient,
    config: Config,
}

impl CollectorReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self {
            objects: KubeObjectClient::new(client.clone()),
            client,
            config,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
    {
        match &self.config.watch_namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let collectors: Api<OpenTelemetryCollector> = self.api();
        let deployments: Api<Deployment> = self.api();
        let daemon_sets: Api<DaemonSet> = self.api();
        let config_maps: Api<ConfigMap> = self.api();
        let service_accounts: Api<ServiceAccount> = self.api();
        let context = Arc::new(self);

        Controller::new(collectors, WatcherConfig::default())
            .owns(deployments, WatcherConfig::default())
            .owns(daemon_sets, WatcherConfig::default())
            .owns(config_maps, WatcherConfig::default())
            .owns(service_accounts, WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled collector: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(
    otelcol: Arc<OpenTelemetryCollector>,
    ctx: Arc<CollectorReconciler>,
) -> Result<Action> {
    let deadline = ctx.config.reconcile_timeout;
    tokio::time::timeout(
        deadline,
        reconcile_children(&ctx.objects, &otelcol, &ctx.config),
    )
    .await
    .map_err(|_| {
        OperatorError::Cancelled(format!(
            "reconciling {} took longer than {:?}",
            otelcol.instance_identity(),
            deadline
        ))
    })??;

    Ok(Action::await_change())
}

/// One reconcile pass: build the desired children, apply every kind, then prune every kind.
///
/// Nothing is pruned unless all kinds were applied, so a failing pass leaves unrelated
/// children alone.
#[instrument(skip_all, fields(name = %otelcol.name_any(), namespace = %otelcol.namespace().unwrap_or_default()))]
pub async fn reconcile_children<C>(
    client: &C,
    otelcol: &OpenTelemetryCollector,
    config: &Config,
) -> Result<()>
where
    C: ObjectClient<Deployment>
        + ObjectClient<DaemonSet>
        + ObjectClient<ConfigMap>
        + ObjectClient<ServiceAccount>,
{
    let desired = manifests::build(otelcol, config)?;

    let collector_name = naming::collector(otelcol);
    let min_replicas = otelcol.spec.replicas;
    let max_replicas = otelcol.spec.max_replicas;

    let mut outcomes = Vec::new();
    outcomes.extend(apply(client, otelcol, &desired.config_maps, |_, _| {}).await?);
    outcomes.extend(apply(client, otelcol, &desired.service_accounts, |_, _| {}).await?);
    outcomes.extend(
        apply(client, otelcol, &desired.deployments, |existing, updated| {
            let Some(max) = max_replicas else { return };
            if updated.name_any() != collector_name {
                return;
            }
            let current = existing.spec.as_ref().and_then(|s| s.replicas);
            if let Some(spec) = updated.spec.as_mut() {
                spec.replicas = Some(current_replicas_with_hpa(current, min_replicas, max));
            }
        })
        .await?,
    );
    outcomes.extend(apply(client, otelcol, &desired.daemon_sets, |_, _| {}).await?);

    let namespace = otelcol.namespace().unwrap_or_default();
    let identity = identity_selector(otelcol);
    let mut pruned = Vec::new();
    pruned.extend(prune(client, &namespace, &identity, &desired.deployments).await?);
    pruned.extend(prune(client, &namespace, &identity, &desired.daemon_sets).await?);
    pruned.extend(prune(client, &namespace, &identity, &desired.config_maps).await?);
    pruned.extend(prune(client, &namespace, &identity, &desired.service_accounts).await?);

    let changed = outcomes
        .iter()
        .filter(|o| **o != ObjectOutcome::Unchanged)
        .count();
    if changed > 0 || !pruned.is_empty() {
        info!(
            "Reconciled {}: {} children changed, {} pruned",
            otelcol.instance_identity(),
            changed,
            pruned.len()
        );
    }

    Ok(())
}

/// Keep whatever scale an autoscaler picked, within the bounds of the resource
pub fn current_replicas_with_hpa(current: Option<i32>, min: Option<i32>, max: i32) -> i32 {
    let min = min.unwrap_or(1).min(max);
    current.unwrap_or(min).clamp(min, max)
}

fn error_policy(
    otelcol: Arc<OpenTelemetryCollector>,
    error: &OperatorError,
    _ctx: Arc<CollectorReconciler>,
) -> Action {
    error!(
        "Reconciliation of {} failed: {}",
        otelcol.instance_identity(),
        error
    );
    if error.is_retryable() {
        Action::requeue(REQUEUE_AFTER_ERROR)
    } else {
        Action::requeue(REQUEUE_AFTER_INVALID)
    }
}
