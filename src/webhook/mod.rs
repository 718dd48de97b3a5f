// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod admission: an ordered chain of mutators behind a mutating webhook.

pub mod admission;
pub mod instrumentation;
pub mod server;
pub mod sidecar;

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tracing::debug;

pub use admission::admit;
pub use instrumentation::InstrumentationMutator;
pub use server::WebhookServer;
pub use sidecar::SidecarMutator;

/// Request-scoped facts a mutator may need beyond the pod itself
#[derive(Debug, Clone, Default)]
pub struct MutationContext {
    /// Namespace the pod is created in. Pods often omit it from their own metadata.
    pub namespace: String,
    /// Set for dry-run admissions. The built-in mutators only read from the cluster, so
    /// they behave the same either way; a mutator with side effects must skip them when set.
    pub dry_run: bool,
}

/// One step of the admission chain.
///
/// Mutators must be idempotent: running one on a pod it already mutated changes nothing. Prior
/// injections are recognised by their reserved container, volume and env var names.
#[async_trait]
pub trait PodMutator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return the mutated pod, or an error to reject the admission
    async fn mutate(&self, ctx: &MutationContext, pod: Pod) -> Result<Pod>;
}

/// Mutators applied in order, each to the output of the previous one
#[derive(Default)]
pub struct MutationPipeline {
    mutators: Vec<Box<dyn PodMutator>>,
}

impl MutationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mutator: impl PodMutator + 'static) -> Self {
        self.mutators.push(Box::new(mutator));
        self
    }

    /// The first rejection aborts the chain; later mutators never see the pod
    pub async fn mutate(&self, ctx: &MutationContext, mut pod: Pod) -> Result<Pod> {
        for mutator in &self.mutators {
            debug!("Running {} mutator", mutator.name());
            pod = mutator.mutate(ctx, pod).await?;
        }
        Ok(pod)
    }
}
