// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Language auto-instrumentation injected into application containers.
//!
//! An init container copies the language agent into a shared emptyDir; the application
//! container mounts it and picks the agent up through a language specific env var.

use super::{MutationContext, PodMutator};
use crate::config::Config;
use crate::constants::{annotations, injection};
use crate::error::{OperatorError, Result};
use crate::kubernetes::ObjectClient;
use crate::manifests::resolve_image;
use crate::types::{Instrumentation, LanguageSpec};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, Pod, Volume, VolumeMount,
};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Java,
    NodeJs,
    Python,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Java, Language::NodeJs, Language::Python];

    pub fn annotation(self) -> &'static str {
        match self {
            Language::Java => annotations::INJECT_JAVA,
            Language::NodeJs => annotations::INJECT_NODEJS,
            Language::Python => annotations::INJECT_PYTHON,
        }
    }

    /// The env var the runtime reads the agent from
    pub fn env_var(self) -> &'static str {
        match self {
            Language::Java => "JAVA_TOOL_OPTIONS",
            Language::NodeJs => "NODE_OPTIONS",
            Language::Python => "PYTHONPATH",
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Language::Java => "-javaagent:/otel-auto-instrumentation/javaagent.jar",
            Language::NodeJs => "--require /otel-auto-instrumentation/autoinstrumentation.js",
            Language::Python => {
                "/otel-auto-instrumentation/opentelemetry/instrumentation/auto_instrumentation:/otel-auto-instrumentation"
            }
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Language::Python => ":",
            Language::Java | Language::NodeJs => " ",
        }
    }

    fn copy_command(self) -> Vec<String> {
        let args: &[&str] = match self {
            Language::Java => &["cp", "/javaagent.jar", "/otel-auto-instrumentation/javaagent.jar"],
            Language::NodeJs | Language::Python => {
                &["cp", "-a", "/autoinstrumentation/.", "/otel-auto-instrumentation/"]
            }
        };
        args.iter().map(|a| a.to_string()).collect()
    }

    fn spec(self, instrumentation: &Instrumentation) -> &LanguageSpec {
        match self {
            Language::Java => &instrumentation.spec.java,
            Language::NodeJs => &instrumentation.spec.nodejs,
            Language::Python => &instrumentation.spec.python,
        }
    }

    fn default_image(self, config: &Config) -> &str {
        match self {
            Language::Java => &config.java_image,
            Language::NodeJs => &config.nodejs_image,
            Language::Python => &config.python_image,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Java => "java",
            Language::NodeJs => "nodejs",
            Language::Python => "python",
        };
        f.write_str(name)
    }
}

/// Inject `language` into the container at `index`.
///
/// `shared_env` comes from the Instrumentation itself and is applied before the language env.
/// Both are first-writer-wins: entries already on the container are left untouched.
pub fn inject(
    language: Language,
    spec: &LanguageSpec,
    shared_env: &[EnvVar],
    image: &str,
    mut pod: Pod,
    index: usize,
) -> Result<Pod> {
    let pod_spec = pod
        .spec
        .as_mut()
        .ok_or_else(|| OperatorError::Validation("pod has no spec".to_string()))?;
    let container = pod_spec.containers.get_mut(index).ok_or_else(|| {
        OperatorError::Validation(format!("pod has no container at index {}", index))
    })?;

    let env = container.env.get_or_insert_with(Vec::new);
    if let Some(existing) = env.iter().find(|e| e.name == language.env_var()) {
        if existing.value_from.is_some() {
            return Err(OperatorError::Validation(format!(
                "container {} sets {} from a reference, which cannot be combined with {} auto-instrumentation",
                container.name,
                language.env_var(),
                language
            )));
        }
    }

    for entry in shared_env.iter().chain(spec.env.iter()) {
        if !env.iter().any(|e| e.name == entry.name) {
            env.push(entry.clone());
        }
    }

    match env.iter_mut().find(|e| e.name == language.env_var()) {
        Some(existing) => {
            let value = existing.value.get_or_insert_with(String::new);
            if value.is_empty() {
                *value = language.flag().to_string();
            } else if !value.contains(language.flag()) {
                value.push_str(language.separator());
                value.push_str(language.flag());
            }
        }
        None => env.push(EnvVar {
            name: language.env_var().to_string(),
            value: Some(language.flag().to_string()),
            ..Default::default()
        }),
    }

    let mounts = container.volume_mounts.get_or_insert_with(Vec::new);
    if !mounts.iter().any(|m| m.name == injection::VOLUME_NAME) {
        mounts.push(agent_mount());
    }

    let init_containers = pod_spec.init_containers.get_or_insert_with(Vec::new);
    if !init_containers
        .iter()
        .any(|c| c.name == injection::INIT_CONTAINER_NAME)
    {
        init_containers.push(Container {
            name: injection::INIT_CONTAINER_NAME.to_string(),
            image: Some(image.to_string()),
            command: Some(language.copy_command()),
            resources: spec.resources.clone(),
            volume_mounts: Some(vec![agent_mount()]),
            ..Default::default()
        });

        let volumes = pod_spec.volumes.get_or_insert_with(Vec::new);
        if !volumes.iter().any(|v| v.name == injection::VOLUME_NAME) {
            volumes.push(Volume {
                name: injection::VOLUME_NAME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            });
        }
    }

    Ok(pod)
}

fn agent_mount() -> VolumeMount {
    VolumeMount {
        name: injection::VOLUME_NAME.to_string(),
        mount_path: injection::MOUNT_PATH.to_string(),
        ..Default::default()
    }
}

/// Which language to inject and from which Instrumentation, based on the pod annotations.
///
/// Only one language is injected per pod; they share the init container and the volume.
/// Requesting more than one is a validation error.
fn requested_language(pod: &Pod) -> Result<Option<(Language, String)>> {
    let pod_annotations = pod.annotations();
    let mut requested = Language::ALL.into_iter().filter_map(|language| {
        pod_annotations
            .get(language.annotation())
            .filter(|v| !v.eq_ignore_ascii_case("false") && !v.is_empty())
            .map(|v| (language, v.clone()))
    });

    let first = requested.next();
    let others: Vec<String> = requested.map(|(language, _)| language.to_string()).collect();
    if let Some((language, _)) = &first {
        if !others.is_empty() {
            return Err(OperatorError::Validation(format!(
                "pod requests {} and {} instrumentation, only one language can be injected",
                language,
                others.join(", ")
            )));
        }
    }
    Ok(first)
}

/// Indices of the containers to instrument: the ones named in the container-names annotation,
/// otherwise the first container
fn target_containers(pod: &Pod) -> Result<Vec<usize>> {
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();
    if containers.is_empty() {
        return Err(OperatorError::Validation("pod has no containers".to_string()));
    }

    let Some(names) = pod.annotations().get(annotations::CONTAINER_NAMES) else {
        return Ok(vec![0]);
    };

    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|name| {
            containers
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| {
                    OperatorError::Validation(format!(
                        "{} names container {} which is not in the pod",
                        annotations::CONTAINER_NAMES,
                        name
                    ))
                })
        })
        .collect()
}

/// Injects auto-instrumentation when a pod asks for it through annotations
pub struct InstrumentationMutator<C> {
    client: Arc<C>,
    config: Config,
}

impl<C> InstrumentationMutator<C>
where
    C: ObjectClient<Instrumentation>,
{
    pub fn new(client: Arc<C>, config: Config) -> Self {
        Self { client, config }
    }

    async fn lookup(&self, namespace: &str, requested: &str) -> Result<Instrumentation> {
        if requested.eq_ignore_ascii_case("true") {
            let mut all = self.client.list(namespace, &BTreeMap::new()).await?;
            return match all.len() {
                1 => Ok(all.remove(0)),
                0 => Err(OperatorError::Validation(format!(
                    "no Instrumentation in namespace {}",
                    namespace
                ))),
                n => Err(OperatorError::Validation(format!(
                    "{} Instrumentations in namespace {}, name the one to use",
                    n, namespace
                ))),
            };
        }

        self.client.get(namespace, requested).await?.ok_or_else(|| {
            OperatorError::Validation(format!(
                "Instrumentation {}/{} not found",
                namespace, requested
            ))
        })
    }
}

#[async_trait]
impl<C> PodMutator for InstrumentationMutator<C>
where
    C: ObjectClient<Instrumentation>,
{
    fn name(&self) -> &'static str {
        "instrumentation"
    }

    #[instrument(skip_all, fields(namespace = %ctx.namespace))]
    async fn mutate(&self, ctx: &MutationContext, mut pod: Pod) -> Result<Pod> {
        let Some((language, requested)) = requested_language(&pod)? else {
            return Ok(pod);
        };

        let instrumentation = self.lookup(&ctx.namespace, &requested).await?;
        let spec = language.spec(&instrumentation);
        let image = resolve_image(
            spec.image.as_deref(),
            language.default_image(&self.config),
            &format!("{} auto-instrumentation", language),
        )?;

        for index in target_containers(&pod)? {
            pod = inject(
                language,
                spec,
                &instrumentation.spec.env,
                &image,
                pod,
                index,
            )?;
            debug!("Injected {} agent into container {}", language, index);
        }

        info!(
            "Applied {} instrumentation {} to pod {}",
            language,
            instrumentation.name_any(),
            pod.name_any()
        );
        Ok(pod)
    }
}
