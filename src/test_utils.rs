// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses.

use crate::error::{OperatorError, Result};
use crate::kubernetes::client::{object_key, ObjectClient};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, ServiceAccount};
use kube::client::Body;
use kube::{Client, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PATCH requests matching the path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            match response {
                Some((status, body)) => Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body.into_bytes()))
                    .unwrap()),
                None => {
                    // Default 404 for unmatched requests
                    let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                    Ok(Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(body.as_bytes().to_vec()))
                        .unwrap())
                }
            }
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// A write observed by [`FakeObjectClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(String),
    Patch(String),
    Delete(String),
}

/// In-memory object store with the API server's optimistic concurrency rules.
///
/// Every stored object carries a resourceVersion. A patch naming a stale
/// resourceVersion fails with `Conflict`, like the real API server.
pub struct FakeObjectClient<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    writes: Mutex<Vec<Write>>,
    version: Mutex<u64>,
    fail_writes: Mutex<Option<u16>>,
}

impl<K> Default for FakeObjectClient<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(Vec::new()),
            version: Mutex::new(0),
            fail_writes: Mutex::new(None),
        }
    }
}

impl<K> FakeObjectClient<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store without recording a write
    pub fn with_object(self, mut obj: K) -> Self {
        self.stamp(&mut obj);
        let key = object_key(&obj).unwrap();
        self.objects.lock().unwrap().insert(key, obj);
        self
    }

    /// Make every subsequent write fail with an API error carrying `code`
    pub fn fail_writes_with(&self, code: u16) {
        *self.fail_writes.lock().unwrap() = Some(code);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Change the stored copy behind the reconciler's back
    pub fn modify(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("object to modify exists");
        f(obj);
        let mut version = self.version.lock().unwrap();
        *version += 1;
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    fn stamp(&self, obj: &mut K) {
        let mut version = self.version.lock().unwrap();
        *version += 1;
        let meta = obj.meta_mut();
        meta.resource_version = Some(version.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}", version));
        }
    }

    fn check_failure(&self) -> Result<()> {
        match *self.fail_writes.lock().unwrap() {
            Some(code) => Err(api_error(code, "injected failure").into()),
            None => Ok(()),
        }
    }

    fn record(&self, write: Write) {
        self.writes.lock().unwrap().push(write);
    }
}

pub fn api_error(code: u16, message: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: String::new(),
        code,
    })
}

#[async_trait]
impl<K> ObjectClient<K> for FakeObjectClient<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.object(namespace, name))
    }

    async fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), obj)| {
                ns == namespace
                    && selector
                        .iter()
                        .all(|(k, v)| obj.labels().get(k) == Some(v))
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, obj: &K) -> Result<K> {
        self.check_failure()?;
        let key = object_key(obj)?;
        if self.objects.lock().unwrap().contains_key(&key) {
            return Err(api_error(409, "already exists").into());
        }

        let mut created = obj.clone();
        self.stamp(&mut created);
        self.objects.lock().unwrap().insert(key.clone(), created.clone());
        self.record(Write::Create(key.1));
        Ok(created)
    }

    async fn patch(&self, existing: &K, patch: &serde_json::Value) -> Result<K> {
        self.check_failure()?;
        let key = object_key(existing)?;
        let stored = self
            .object(&key.0, &key.1)
            .ok_or_else(|| OperatorError::from(api_error(404, "not found")))?;

        let expected = patch["metadata"]["resourceVersion"].as_str();
        if expected.is_some() && expected != stored.resource_version().as_deref() {
            return Err(OperatorError::Conflict(key.1));
        }

        let mut doc = serde_json::to_value(&stored)?;
        json_patch::merge(&mut doc, patch);
        let mut patched: K = serde_json::from_value(doc)?;
        self.stamp(&mut patched);

        self.objects.lock().unwrap().insert(key.clone(), patched.clone());
        self.record(Write::Patch(key.1));
        Ok(patched)
    }

    async fn delete(&self, obj: &K) -> Result<()> {
        self.check_failure()?;
        let key = object_key(obj)?;
        self.objects.lock().unwrap().remove(&key);
        self.record(Write::Delete(key.1));
        Ok(())
    }
}

/// One in-memory store per child kind, addressed as a single client
#[derive(Default)]
pub struct FakeCluster {
    pub deployments: FakeObjectClient<Deployment>,
    pub daemon_sets: FakeObjectClient<DaemonSet>,
    pub config_maps: FakeObjectClient<ConfigMap>,
    pub service_accounts: FakeObjectClient<ServiceAccount>,
}

impl FakeCluster {
    pub fn clear_writes(&self) {
        self.deployments.clear_writes();
        self.daemon_sets.clear_writes();
        self.config_maps.clear_writes();
        self.service_accounts.clear_writes();
    }
}

macro_rules! delegate_object_client {
    ($kind:ty, $field:ident) => {
        #[async_trait]
        impl ObjectClient<$kind> for FakeCluster {
            async fn get(&self, namespace: &str, name: &str) -> Result<Option<$kind>> {
                self.$field.get(namespace, name).await
            }

            async fn list(
                &self,
                namespace: &str,
                selector: &BTreeMap<String, String>,
            ) -> Result<Vec<$kind>> {
                self.$field.list(namespace, selector).await
            }

            async fn create(&self, obj: &$kind) -> Result<$kind> {
                self.$field.create(obj).await
            }

            async fn patch(&self, existing: &$kind, patch: &serde_json::Value) -> Result<$kind> {
                self.$field.patch(existing, patch).await
            }

            async fn delete(&self, obj: &$kind) -> Result<()> {
                self.$field.delete(obj).await
            }
        }
    };
}

delegate_object_client!(Deployment, deployments);
delegate_object_client!(DaemonSet, daemon_sets);
delegate_object_client!(ConfigMap, config_maps);
delegate_object_client!(ServiceAccount, service_accounts);
