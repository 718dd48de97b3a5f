// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use otel_operator::config::Config;
use otel_operator::kubernetes::{wait_for_operator_crds, KubeObjectClient};
use otel_operator::reconcilers::CollectorReconciler;
use otel_operator::webhook::{
    InstrumentationMutator, MutationPipeline, SidecarMutator, WebhookServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting OpenTelemetry operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: webhook_addr={}, enable_webhooks={}, watch_namespace={:?}",
        config.webhook_addr, config.enable_webhooks, config.watch_namespace
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Wait for the operator CRDs before starting the controller
    info!("Waiting for OpenTelemetry CRDs to become available...");
    wait_for_operator_crds(&client).await?;

    let reconciler = CollectorReconciler::new(client.clone(), config.clone());

    if !config.enable_webhooks {
        info!("Admission webhooks disabled, starting controller only");
        reconciler.run().await?;
        warn!("Controller stopped");
        return Ok(());
    }

    let objects = Arc::new(KubeObjectClient::new(client));
    let pipeline = MutationPipeline::new()
        .with(SidecarMutator::new(objects.clone(), config.clone()))
        .with(InstrumentationMutator::new(objects, config.clone()));
    let webhook = WebhookServer::new(config.webhook_addr, pipeline, config.admission_timeout);

    info!("Starting controller and admission webhook...");

    // Run the controller and the webhook concurrently
    tokio::try_join!(reconciler.run(), webhook.run())?;

    warn!("Controller and webhook stopped");
    Ok(())
}
