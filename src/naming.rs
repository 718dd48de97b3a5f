// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic names for the objects generated from a collector instance.

use crate::types::OpenTelemetryCollector;
use kube::ResourceExt;

/// Object names must be valid DNS labels
const MAX_NAME_LEN: usize = 63;

/// Cut `value` down to `max` characters, dropping trailing separators left by the cut.
pub fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].trim_end_matches(['-', '.']).to_string()
}

fn with_suffix(otelcol: &OpenTelemetryCollector, suffix: &str) -> String {
    truncate(&format!("{}-{}", otelcol.name_any(), suffix), MAX_NAME_LEN)
}

pub fn collector(otelcol: &OpenTelemetryCollector) -> String {
    with_suffix(otelcol, "collector")
}

pub fn collector_config_map(otelcol: &OpenTelemetryCollector) -> String {
    with_suffix(otelcol, "collector")
}

pub fn collector_service_account(otelcol: &OpenTelemetryCollector) -> String {
    with_suffix(otelcol, "collector")
}

pub fn target_allocator(otelcol: &OpenTelemetryCollector) -> String {
    with_suffix(otelcol, "targetallocator")
}

pub fn target_allocator_config_map(otelcol: &OpenTelemetryCollector) -> String {
    with_suffix(otelcol, "targetallocator")
}

pub fn target_allocator_service_account(otelcol: &OpenTelemetryCollector) -> String {
    with_suffix(otelcol, "targetallocator")
}

pub const COLLECTOR_CONTAINER: &str = "otc-container";
pub const TARGET_ALLOCATOR_CONTAINER: &str = "ta-container";
