// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_COLLECTOR_IMAGE: &str =
    "ghcr.io/open-telemetry/opentelemetry-collector-releases/opentelemetry-collector:latest";
const DEFAULT_TARGET_ALLOCATOR_IMAGE: &str =
    "ghcr.io/open-telemetry/opentelemetry-operator/target-allocator:latest";
const DEFAULT_JAVA_IMAGE: &str =
    "ghcr.io/open-telemetry/opentelemetry-operator/autoinstrumentation-java:latest";
const DEFAULT_NODEJS_IMAGE: &str =
    "ghcr.io/open-telemetry/opentelemetry-operator/autoinstrumentation-nodejs:latest";
const DEFAULT_PYTHON_IMAGE: &str =
    "ghcr.io/open-telemetry/opentelemetry-operator/autoinstrumentation-python:latest";

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Fallback images when a resource does not name one
    pub collector_image: String,
    pub target_allocator_image: String,
    pub java_image: String,
    pub nodejs_image: String,
    pub python_image: String,
    pub webhook_addr: SocketAddr,
    pub enable_webhooks: bool,
    /// Deadline for a single reconcile pass
    pub reconcile_timeout: Duration,
    /// Deadline for a single admission request
    pub admission_timeout: Duration,
    /// Restrict the collector controller to one namespace
    pub watch_namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            collector_image: DEFAULT_COLLECTOR_IMAGE.to_string(),
            target_allocator_image: DEFAULT_TARGET_ALLOCATOR_IMAGE.to_string(),
            java_image: DEFAULT_JAVA_IMAGE.to_string(),
            nodejs_image: DEFAULT_NODEJS_IMAGE.to_string(),
            python_image: DEFAULT_PYTHON_IMAGE.to_string(),
            webhook_addr: SocketAddr::from(([0, 0, 0, 0], 9443)),
            enable_webhooks: true,
            reconcile_timeout: Duration::from_secs(30),
            admission_timeout: Duration::from_secs(10),
            watch_namespace: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let webhook_addr = match env::var("WEBHOOK_ADDR") {
            Ok(addr) => addr
                .parse()
                .with_context(|| format!("WEBHOOK_ADDR '{}' is not a socket address", addr))?,
            Err(_) => defaults.webhook_addr,
        };

        Ok(Config {
            collector_image: env::var("COLLECTOR_IMAGE").unwrap_or(defaults.collector_image),
            target_allocator_image: env::var("TARGET_ALLOCATOR_IMAGE")
                .unwrap_or(defaults.target_allocator_image),
            java_image: env::var("AUTO_INSTRUMENTATION_JAVA_IMAGE").unwrap_or(defaults.java_image),
            nodejs_image: env::var("AUTO_INSTRUMENTATION_NODEJS_IMAGE")
                .unwrap_or(defaults.nodejs_image),
            python_image: env::var("AUTO_INSTRUMENTATION_PYTHON_IMAGE")
                .unwrap_or(defaults.python_image),
            webhook_addr,
            enable_webhooks: env::var("ENABLE_WEBHOOKS")
                .map(|v| v != "false")
                .unwrap_or(true),
            reconcile_timeout: secs_from_env("RECONCILE_TIMEOUT_SECS", defaults.reconcile_timeout)?,
            admission_timeout: secs_from_env("ADMISSION_TIMEOUT_SECS", defaults.admission_timeout)?,
            watch_namespace: env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty()),
        })
    }
}

fn secs_from_env(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(v) => {
            let secs: u64 = v
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", key, v))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}
