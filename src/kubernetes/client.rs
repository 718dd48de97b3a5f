// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read/write access to namespaced objects

use crate::error::{OperatorError, Result};
use crate::manifests::labels::to_selector;
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

/// The platform operations the reconcilers and mutators depend on.
///
/// Implemented over the API server by [`KubeObjectClient`]; tests use an in-memory store.
#[async_trait]
pub trait ObjectClient<K>: Send + Sync {
    /// `None` when the object does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    async fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<K>>;

    async fn create(&self, obj: &K) -> Result<K>;

    /// Apply a JSON merge patch to `existing`. The patch is expected to carry the
    /// resourceVersion that was read, so a concurrent write surfaces as `Conflict`.
    async fn patch(&self, existing: &K, patch: &serde_json::Value) -> Result<K>;

    /// Deleting an object that is already gone is not an error
    async fn delete(&self, obj: &K) -> Result<()>;
}

/// [`ObjectClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeObjectClient {
    client: Client,
}

impl KubeObjectClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Namespace and name of an object we are about to write
pub(crate) fn object_key<K: Resource>(obj: &K) -> Result<(String, String)> {
    let name = obj.meta().name.clone().ok_or_else(|| {
        OperatorError::Validation("object has no name".to_string())
    })?;
    let namespace = obj.meta().namespace.clone().ok_or_else(|| {
        OperatorError::Validation(format!("object {} has no namespace", name))
    })?;
    Ok((namespace, name))
}

#[async_trait]
impl<K> ObjectClient<K> for KubeObjectClient
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<K>> {
        let lp = ListParams::default().labels(&to_selector(selector));
        Ok(self.api::<K>(namespace).list(&lp).await?.items)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let (namespace, _) = object_key(obj)?;
        Ok(self.api::<K>(&namespace).create(&PostParams::default(), obj).await?)
    }

    async fn patch(&self, existing: &K, patch: &serde_json::Value) -> Result<K> {
        let (namespace, name) = object_key(existing)?;
        Ok(self
            .api::<K>(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn delete(&self, obj: &K) -> Result<()> {
        let (namespace, name) = object_key(obj)?;
        match self
            .api::<K>(&namespace)
            .delete(&name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("{}/{} already deleted", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
