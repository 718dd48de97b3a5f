// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Converges one kind of child object toward its desired state.
//!
//! For every desired object: attach the owner reference, read the current object, then
//! either create it, delete it when a field that cannot be updated in place changed, or
//! merge-patch it against the version that was read. Objects are never re-read after a
//! write; convergence is reached over successive passes.

use super::prune::prune;
use crate::error::{OperatorError, Result};
use crate::kubernetes::ObjectClient;
use crate::manifests::labels::identity_selector;
use crate::types::OpenTelemetryCollector;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;
use tracing::{debug, info, instrument};

/// A child kind the engine knows how to update
pub trait ManagedObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Whether going from `existing` to `self` touches a field the API server refuses to
    /// update in place
    fn immutable_fields_changed(&self, _existing: &Self) -> bool {
        false
    }

    /// Overwrite the mutable body of `self` with the one from `desired`
    fn replace_body(&mut self, desired: &Self);
}

/// Selectors compare equal when they match the same labels, treating absent and empty alike
fn selectors_equal(a: Option<&LabelSelector>, b: Option<&LabelSelector>) -> bool {
    let labels = |s: Option<&LabelSelector>| {
        s.and_then(|s| s.match_labels.clone()).unwrap_or_default()
    };
    let expressions = |s: Option<&LabelSelector>| {
        s.and_then(|s| s.match_expressions.clone()).unwrap_or_default()
    };
    labels(a) == labels(b) && expressions(a) == expressions(b)
}

impl ManagedObject for Deployment {
    fn immutable_fields_changed(&self, existing: &Self) -> bool {
        !selectors_equal(
            self.spec.as_ref().map(|s| &s.selector),
            existing.spec.as_ref().map(|s| &s.selector),
        )
    }

    fn replace_body(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl ManagedObject for DaemonSet {
    fn immutable_fields_changed(&self, existing: &Self) -> bool {
        !selectors_equal(
            self.spec.as_ref().map(|s| &s.selector),
            existing.spec.as_ref().map(|s| &s.selector),
        )
    }

    fn replace_body(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl ManagedObject for ConfigMap {
    fn immutable_fields_changed(&self, existing: &Self) -> bool {
        existing.immutable == Some(true)
            && (self.data != existing.data || self.binary_data != existing.binary_data)
    }

    fn replace_body(&mut self, desired: &Self) {
        self.data = desired.data.clone();
        self.binary_data = desired.binary_data.clone();
        self.immutable = desired.immutable;
    }
}

impl ManagedObject for ServiceAccount {
    // tokens and pull secrets are filled in by other controllers
    fn replace_body(&mut self, _desired: &Self) {}
}

/// What a pass did to a single object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectOutcome {
    Created,
    Patched,
    Unchanged,
    /// Deleted because an immutable field changed; recreated on the next pass
    Deleted,
}

/// Converge `desired` and prune what is no longer wanted.
///
/// Stops at the first failing object. Pruning only runs once every desired object was
/// processed, so a partial pass never deletes objects based on an incomplete view.
pub async fn converge<K, C>(
    client: &C,
    owner: &OpenTelemetryCollector,
    desired: &[K],
) -> Result<Vec<ObjectOutcome>>
where
    K: ManagedObject,
    C: ObjectClient<K>,
{
    let outcomes = apply(client, owner, desired, |_, _| {}).await?;

    let namespace = owner.namespace().unwrap_or_default();
    prune(client, &namespace, &identity_selector(owner), desired).await?;

    Ok(outcomes)
}

/// Create, patch or delete each desired object without pruning.
///
/// `adjust` sees the existing object and the merged one right before the diff is taken.
pub async fn apply<K, C, F>(
    client: &C,
    owner: &OpenTelemetryCollector,
    desired: &[K],
    adjust: F,
) -> Result<Vec<ObjectOutcome>>
where
    K: ManagedObject,
    C: ObjectClient<K>,
    F: Fn(&K, &mut K) + Send + Sync,
{
    let mut outcomes = Vec::with_capacity(desired.len());
    for obj in desired {
        outcomes.push(reconcile_object(client, owner, obj, &adjust).await?);
    }
    Ok(outcomes)
}

#[instrument(skip_all, fields(kind = %K::kind(&()), name = %desired.name_any()))]
async fn reconcile_object<K, C, F>(
    client: &C,
    owner: &OpenTelemetryCollector,
    desired: &K,
    adjust: &F,
) -> Result<ObjectOutcome>
where
    K: ManagedObject,
    C: ObjectClient<K>,
    F: Fn(&K, &mut K) + Send + Sync,
{
    let mut desired = desired.clone();
    let owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        OperatorError::OwnerReference(format!(
            "{} has no uid yet",
            owner.name_any()
        ))
    })?;
    desired.meta_mut().owner_references = Some(vec![owner_ref]);

    let name = desired.name_any();
    let namespace = desired.namespace().ok_or_else(|| {
        OperatorError::Validation(format!("{} {} has no namespace", K::kind(&()), name))
    })?;

    let Some(existing) = client.get(&namespace, &name).await? else {
        client.create(&desired).await?;
        info!("Created {} {}/{}", K::kind(&()), namespace, name);
        return Ok(ObjectOutcome::Created);
    };

    if desired.immutable_fields_changed(&existing) {
        info!(
            "Immutable field of {} {}/{} changed, deleting it; it will be recreated on the next reconcile",
            K::kind(&()),
            namespace,
            name
        );
        client.delete(&existing).await?;
        return Ok(ObjectOutcome::Deleted);
    }

    let mut target = desired.clone();
    adjust(&existing, &mut target);
    if is_subset(&serde_json::to_value(&target)?, &serde_json::to_value(&existing)?) {
        debug!("{} {}/{} is up to date", K::kind(&()), namespace, name);
        return Ok(ObjectOutcome::Unchanged);
    }

    let mut updated = existing.clone();
    merge_metadata(updated.meta_mut(), desired.meta());
    updated.replace_body(&desired);
    adjust(&existing, &mut updated);

    match merge_patch(&existing, &updated)? {
        Some(patch) => {
            client.patch(&existing, &patch).await?;
            info!("Applied changes to {} {}/{}", K::kind(&()), namespace, name);
            Ok(ObjectOutcome::Patched)
        }
        None => {
            debug!("{} {}/{} is up to date", K::kind(&()), namespace, name);
            Ok(ObjectOutcome::Unchanged)
        }
    }
}

/// Desired labels and annotations win on collision; keys only present on the existing object
/// are kept. Owner references are taken from desired as a whole.
pub fn merge_metadata(existing: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(labels) = &desired.labels {
        existing
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(annotations) = &desired.annotations {
        existing
            .annotations
            .get_or_insert_with(Default::default)
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    existing.owner_references = desired.owner_references.clone();
}

/// RFC 7386 merge patch turning `existing` into `updated`, guarded by the resourceVersion of
/// `existing`. `None` when there is nothing to change.
pub fn merge_patch<K: Resource + Serialize>(existing: &K, updated: &K) -> Result<Option<Value>> {
    let diff = diff_values(&serde_json::to_value(existing)?, &serde_json::to_value(updated)?);

    let Value::Object(mut patch) = diff else {
        return Ok(Some(diff));
    };
    if patch.is_empty() {
        return Ok(None);
    }

    if let Some(version) = existing.meta().resource_version.clone() {
        let metadata = patch
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(metadata) = metadata {
            metadata.insert("resourceVersion".to_string(), Value::String(version));
        }
    }

    Ok(Some(Value::Object(patch)))
}

/// Whether every field set in `desired` holds the same value in `existing`.
///
/// Fields `desired` leaves out are not compared, so values the API server fills in on
/// admission (strategy, restartPolicy, terminationMessagePath, ...) never count as drift.
/// Arrays compare element-wise and must have the same length. An empty array or object
/// matches an absent field.
pub fn is_subset(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Null, _) => true,
        (Value::Object(d), Value::Object(e)) => d
            .iter()
            .all(|(k, v)| is_subset(v, e.get(k).unwrap_or(&Value::Null))),
        (Value::Object(d), Value::Null) => d.values().all(|v| is_subset(v, &Value::Null)),
        (Value::Array(d), Value::Array(e)) => {
            d.len() == e.len() && d.iter().zip(e).all(|(d, e)| is_subset(d, e))
        }
        (Value::Array(d), Value::Null) => d.is_empty(),
        (d, e) => d == e,
    }
}

fn diff_values(original: &Value, modified: &Value) -> Value {
    let (Value::Object(original), Value::Object(modified)) = (original, modified) else {
        return modified.clone();
    };

    let mut patch = Map::new();
    for key in original.keys() {
        if !modified.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    for (key, value) in modified {
        match original.get(key) {
            Some(current) if current == value => {}
            Some(current @ Value::Object(_)) if value.is_object() => {
                patch.insert(key.clone(), diff_values(current, value));
            }
            _ => {
                patch.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(patch)
}
