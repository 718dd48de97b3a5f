// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Value of the `managed-by` identity label
pub const OPERATOR_NAME: &str = "opentelemetry-operator";

/// Recommended Kubernetes labels carried by every generated object
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const INSTANCE: &str = "app.kubernetes.io/instance";
    pub const PART_OF: &str = "app.kubernetes.io/part-of";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const NAME: &str = "app.kubernetes.io/name";

    pub const PART_OF_VALUE: &str = "opentelemetry";
    pub const COMPONENT_COLLECTOR: &str = "opentelemetry-collector";
    pub const COMPONENT_TARGET_ALLOCATOR: &str = "opentelemetry-targetallocator";
}

/// Pod annotations read by the admission webhook
pub mod annotations {
    /// "true", "false" or the name of a sidecar-mode collector
    pub const INJECT_SIDECAR: &str = "sidecar.opentelemetry.io/inject";
    pub const INJECT_JAVA: &str = "instrumentation.opentelemetry.io/inject-java";
    pub const INJECT_NODEJS: &str = "instrumentation.opentelemetry.io/inject-nodejs";
    pub const INJECT_PYTHON: &str = "instrumentation.opentelemetry.io/inject-python";
    /// Comma separated container names to instrument, defaults to the first container
    pub const CONTAINER_NAMES: &str = "instrumentation.opentelemetry.io/container-names";
}

/// Names recognised on re-admission. Changing any of these breaks already injected pods.
pub mod injection {
    pub const VOLUME_NAME: &str = "opentelemetry-auto-instrumentation";
    pub const INIT_CONTAINER_NAME: &str = "opentelemetry-auto-instrumentation";
    pub const MOUNT_PATH: &str = "/otel-auto-instrumentation";
    pub const SIDECAR_CONTAINER_NAME: &str = "otc-container";
    pub const SIDECAR_CONFIG_ENV: &str = "OTEL_CONFIG";
}

/// ConfigMap keys and mount points shared between the builder and the running components
pub mod config_files {
    pub const COLLECTOR_KEY: &str = "collector.yaml";
    pub const COLLECTOR_VOLUME: &str = "otc-internal";
    pub const COLLECTOR_MOUNT_PATH: &str = "/conf";
    pub const TARGET_ALLOCATOR_KEY: &str = "targetallocator.yaml";
    pub const TARGET_ALLOCATOR_VOLUME: &str = "ta-internal";
    pub const TARGET_ALLOCATOR_MOUNT_PATH: &str = "/conf";
}

/// CRD polling configuration
pub mod crd {
    pub const GROUP: &str = "opentelemetry.io";
    pub const VERSION: &str = "v1alpha1";
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
