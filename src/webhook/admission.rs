// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns an AdmissionReview into a mutation pipeline run and the pipeline result into a
//! JSON patch response.

use super::{MutationContext, MutationPipeline};
use crate::error::{OperatorError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Handle a full review, including requests that cannot be parsed
pub async fn review(
    pipeline: &MutationPipeline,
    body: AdmissionReview<Pod>,
    deadline: Duration,
) -> AdmissionReview<DynamicObject> {
    let req: AdmissionRequest<Pod> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!("Invalid admission request: {}", e);
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };

    admit(pipeline, &req, deadline).await.into_review()
}

/// Run `pipeline` over the pod in `req` within `deadline`.
///
/// Allows the pod unchanged when nothing was mutated, attaches a JSON patch when something
/// was, and denies with a status code matching the error otherwise. Dry-run requests are
/// mutated the same way; the flag is passed to mutators in the context.
#[instrument(skip_all, fields(uid = %req.uid, namespace = ?req.namespace))]
pub async fn admit(
    pipeline: &MutationPipeline,
    req: &AdmissionRequest<Pod>,
    deadline: Duration,
) -> AdmissionResponse {
    let Some(pod) = &req.object else {
        debug!("No pod in admission request, allowing unchanged");
        return AdmissionResponse::from(req);
    };

    let ctx = MutationContext {
        namespace: req
            .namespace
            .clone()
            .or_else(|| pod.namespace())
            .unwrap_or_default(),
        dry_run: req.dry_run,
    };

    let mutated = match tokio::time::timeout(deadline, pipeline.mutate(&ctx, pod.clone())).await {
        Ok(result) => result,
        Err(_) => Err(OperatorError::Cancelled(format!(
            "pod mutation took longer than {:?}",
            deadline
        ))),
    };

    match mutated.and_then(|mutated| patch_between(pod, &mutated)) {
        Ok(None) => AdmissionResponse::from(req),
        Ok(Some(patch)) => {
            info!(
                "Mutated pod {} with {} patch operations",
                pod.name_any(),
                patch.0.len()
            );
            match AdmissionResponse::from(req).with_patch(patch) {
                Ok(res) => res,
                Err(e) => {
                    error!("Failed to serialize patch: {}", e);
                    deny(req, &OperatorError::Internal(format!("patch serialization error: {}", e)))
                }
            }
        }
        Err(e) => {
            warn!("Rejecting pod {}: {}", pod.name_any(), e);
            deny(req, &e)
        }
    }
}

fn deny(req: &AdmissionRequest<Pod>, err: &OperatorError) -> AdmissionResponse {
    let mut res = AdmissionResponse::from(req).deny(err.to_string());
    res.result.code = err.http_status();
    res
}

/// `None` when the pipeline left the pod as it was
fn patch_between(original: &Pod, mutated: &Pod) -> Result<Option<json_patch::Patch>> {
    let patch = json_patch::diff(
        &serde_json::to_value(original)?,
        &serde_json::to_value(mutated)?,
    );
    Ok((!patch.0.is_empty()).then_some(patch))
}
