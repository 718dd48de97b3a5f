// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Label sets shared by every generated object.

use crate::constants::{labels, OPERATOR_NAME};
use crate::types::OpenTelemetryCollector;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Labels for an object named `name` playing `component` for the instance.
///
/// User labels on the instance are copied first. The identity labels are written on top of
/// them so a user can never shadow `managed-by`, `instance`, `part-of` or `component`. The
/// `name` label defaults to the object name unless the user already set one.
pub fn labels(otelcol: &OpenTelemetryCollector, name: &str, component: &str) -> BTreeMap<String, String> {
    let mut base = otelcol.labels().clone();

    base.insert(labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string());
    base.insert(labels::INSTANCE.to_string(), otelcol.instance_identity());
    base.insert(labels::PART_OF.to_string(), labels::PART_OF_VALUE.to_string());
    base.insert(labels::COMPONENT.to_string(), component.to_string());

    base.entry(labels::NAME.to_string())
        .or_insert_with(|| name.to_string());

    base
}

/// The subset used to discover every child of an instance
pub fn identity_selector(otelcol: &OpenTelemetryCollector) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        (labels::INSTANCE.to_string(), otelcol.instance_identity()),
    ])
}

/// Render a label map as a `key=value,...` selector string
pub fn to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
