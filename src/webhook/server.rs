// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP endpoint the API server calls for pod admission.
//!
//! Serves plain HTTP; TLS is expected to be terminated in front of the operator.

use super::{admission, MutationPipeline};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::AdmissionReview;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub const MUTATE_POD_PATH: &str = "/mutate-v1-pod";
pub const HEALTH_PATH: &str = "/healthz";

pub struct WebhookServer {
    addr: SocketAddr,
    pipeline: MutationPipeline,
    deadline: Duration,
}

impl WebhookServer {
    pub fn new(addr: SocketAddr, pipeline: MutationPipeline, deadline: Duration) -> Self {
        Self {
            addr,
            pipeline,
            deadline,
        }
    }

    /// Routes for pod mutation and health. Malformed bodies are rejected by the JSON extractor.
    pub fn router(self) -> Router {
        Router::new()
            .route(MUTATE_POD_PATH, post(mutate_pod))
            .route(HEALTH_PATH, get(health))
            .with_state(Arc::new(self))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.addr;
        let listener = TcpListener::bind(addr).await?;
        info!("Admission webhook listening on {}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn mutate_pod(
    State(server): State<Arc<WebhookServer>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    debug!("Received pod admission review");
    Json(admission::review(&server.pipeline, review, server.deadline).await)
}

async fn health() -> &'static str {
    "ok"
}
