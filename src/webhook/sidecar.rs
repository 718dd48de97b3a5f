// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Collector sidecar injection for pods annotated with `sidecar.opentelemetry.io/inject`.

use super::{MutationContext, PodMutator};
use crate::config::Config;
use crate::constants::{annotations, injection};
use crate::error::{OperatorError, Result};
use crate::kubernetes::ObjectClient;
use crate::manifests::collector;
use crate::types::OpenTelemetryCollector;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct SidecarMutator<C> {
    client: Arc<C>,
    config: Config,
}

impl<C> SidecarMutator<C>
where
    C: ObjectClient<OpenTelemetryCollector>,
{
    pub fn new(client: Arc<C>, config: Config) -> Self {
        Self { client, config }
    }

    async fn lookup(&self, namespace: &str, requested: &str) -> Result<OpenTelemetryCollector> {
        if requested.eq_ignore_ascii_case("true") {
            let mut sidecars: Vec<_> = self
                .client
                .list(namespace, &BTreeMap::new())
                .await?
                .into_iter()
                .filter(|c| c.is_sidecar())
                .collect();
            return match sidecars.len() {
                1 => Ok(sidecars.remove(0)),
                0 => Err(OperatorError::Validation(format!(
                    "no sidecar collector in namespace {}",
                    namespace
                ))),
                n => Err(OperatorError::Validation(format!(
                    "{} sidecar collectors in namespace {}, name the one to inject",
                    n, namespace
                ))),
            };
        }

        let otelcol = self.client.get(namespace, requested).await?.ok_or_else(|| {
            OperatorError::Validation(format!("collector {}/{} not found", namespace, requested))
        })?;
        if !otelcol.is_sidecar() {
            return Err(OperatorError::Validation(format!(
                "collector {}/{} is not in sidecar mode",
                namespace, requested
            )));
        }
        Ok(otelcol)
    }
}

#[async_trait]
impl<C> PodMutator for SidecarMutator<C>
where
    C: ObjectClient<OpenTelemetryCollector>,
{
    fn name(&self) -> &'static str {
        "sidecar"
    }

    #[instrument(skip_all, fields(namespace = %ctx.namespace))]
    async fn mutate(&self, ctx: &MutationContext, mut pod: Pod) -> Result<Pod> {
        let requested = pod
            .annotations()
            .get(annotations::INJECT_SIDECAR)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("false"))
            .cloned();
        let Some(requested) = requested else {
            return Ok(pod);
        };

        let otelcol = self.lookup(&ctx.namespace, &requested).await?;
        let sidecar = collector::sidecar(&otelcol, &self.config)?;

        let containers = &mut pod
            .spec
            .as_mut()
            .ok_or_else(|| OperatorError::Validation("pod has no spec".to_string()))?
            .containers;
        match containers
            .iter_mut()
            .find(|c| c.name == injection::SIDECAR_CONTAINER_NAME)
        {
            Some(existing) => *existing = sidecar,
            None => containers.push(sidecar),
        }

        info!(
            "Injected sidecar collector {} into pod {}",
            otelcol.name_any(),
            pod.name_any()
        );
        Ok(pod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeObjectClient;
    use crate::types::{Mode, OpenTelemetryCollectorSpec};
    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use kube::api::ObjectMeta;

    fn make_collector(name: &str, mode: Mode) -> OpenTelemetryCollector {
        let mut otelcol = OpenTelemetryCollector::new(
            name,
            OpenTelemetryCollectorSpec {
                mode,
                image: Some("otel/collector:1.0".to_string()),
                config: "receivers: {}".to_string(),
                ..Default::default()
            },
        );
        otelcol.metadata.namespace = Some("apps".to_string());
        otelcol
    }

    fn make_pod(inject: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("app".to_string()),
                annotations: Some(BTreeMap::from([(
                    annotations::INJECT_SIDECAR.to_string(),
                    inject.to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn ctx() -> MutationContext {
        MutationContext {
            namespace: "apps".to_string(),
            dry_run: false,
        }
    }

    fn mutator(collectors: Vec<OpenTelemetryCollector>) -> SidecarMutator<FakeObjectClient<OpenTelemetryCollector>> {
        let client = collectors
            .into_iter()
            .fold(FakeObjectClient::new(), |client, c| client.with_object(c));
        SidecarMutator::new(Arc::new(client), Config::default())
    }

    fn sidecar_containers(pod: &Pod) -> Vec<&Container> {
        pod.spec
            .as_ref()
            .unwrap()
            .containers
            .iter()
            .filter(|c| c.name == injection::SIDECAR_CONTAINER_NAME)
            .collect()
    }

    #[tokio::test]
    async fn test_injects_named_collector() {
        let mutator = mutator(vec![make_collector("sidecar", Mode::Sidecar)]);

        let pod = mutator.mutate(&ctx(), make_pod("sidecar")).await.unwrap();

        let sidecars = sidecar_containers(&pod);
        assert_eq!(sidecars.len(), 1);
        assert_eq!(sidecars[0].image.as_deref(), Some("otel/collector:1.0"));
        assert_eq!(sidecars[0].args.clone().unwrap(), vec!["--config=env:OTEL_CONFIG"]);
    }

    #[tokio::test]
    async fn test_true_picks_the_only_sidecar_collector() {
        let mutator = mutator(vec![
            make_collector("gateway", Mode::Deployment),
            make_collector("sidecar", Mode::Sidecar),
        ]);

        let pod = mutator.mutate(&ctx(), make_pod("true")).await.unwrap();
        assert_eq!(sidecar_containers(&pod).len(), 1);
    }

    #[tokio::test]
    async fn test_reinjection_replaces_in_place() {
        let mutator = mutator(vec![make_collector("sidecar", Mode::Sidecar)]);

        let once = mutator.mutate(&ctx(), make_pod("sidecar")).await.unwrap();
        let twice = mutator.mutate(&ctx(), once.clone()).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.spec.unwrap().containers.len(), 2);
    }

    #[tokio::test]
    async fn test_non_sidecar_collector_is_rejected() {
        let mutator = mutator(vec![make_collector("gateway", Mode::Deployment)]);

        let err = mutator.mutate(&ctx(), make_pod("gateway")).await.unwrap_err();
        assert!(matches!(err, OperatorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ambiguous_true_is_rejected() {
        let mutator = mutator(vec![
            make_collector("one", Mode::Sidecar),
            make_collector("two", Mode::Sidecar),
        ]);

        let err = mutator.mutate(&ctx(), make_pod("true")).await.unwrap_err();
        assert!(matches!(err, OperatorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_false_leaves_pod_alone() {
        let mutator = mutator(vec![make_collector("sidecar", Mode::Sidecar)]);
        let pod = make_pod("false");

        assert_eq!(mutator.mutate(&ctx(), pod.clone()).await.unwrap(), pod);
    }
}
