// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Garbage collection of children that dropped out of the desired set

use crate::error::Result;
use crate::kubernetes::ObjectClient;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Delete every object in `namespace` labelled with `identity` whose name and namespace do
/// not appear in `desired`. Content is never compared. Returns the names deleted.
pub async fn prune<K, C>(
    client: &C,
    namespace: &str,
    identity: &BTreeMap<String, String>,
    desired: &[K],
) -> Result<Vec<String>>
where
    K: Resource<DynamicType = ()> + Send + Sync,
    C: ObjectClient<K>,
{
    let keep: BTreeSet<(String, String)> = desired
        .iter()
        .map(|obj| (obj.namespace().unwrap_or_default(), obj.name_any()))
        .collect();

    let mut deleted = Vec::new();
    for existing in client.list(namespace, identity).await? {
        let key = (existing.namespace().unwrap_or_default(), existing.name_any());
        if keep.contains(&key) {
            continue;
        }

        client.delete(&existing).await?;
        info!("Pruned {} {}/{}", K::kind(&()), key.0, key.1);
        deleted.push(key.1);
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeObjectClient, Write};
    use k8s_openapi::api::core::v1::ServiceAccount;
    use kube::api::ObjectMeta;

    fn identity() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app.kubernetes.io/managed-by".to_string(), "opentelemetry-operator".to_string()),
            ("app.kubernetes.io/instance".to_string(), "default.my-instance".to_string()),
        ])
    }

    fn account(name: &str, labels: BTreeMap<String, String>) -> ServiceAccount {
        ServiceAccount {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_deletes_exactly_the_undesired_object() {
        let client = FakeObjectClient::new()
            .with_object(account("a", identity()))
            .with_object(account("b", identity()));

        let deleted = prune(&client, "default", &identity(), &[account("a", identity())])
            .await
            .unwrap();

        assert_eq!(deleted, vec!["b".to_string()]);
        assert_eq!(client.writes(), vec![Write::Delete("b".to_string())]);
        assert_eq!(client.names(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_ignores_objects_of_other_instances() {
        let mut other = identity();
        other.insert("app.kubernetes.io/instance".to_string(), "default.other".to_string());
        let client = FakeObjectClient::new().with_object(account("foreign", other));

        let deleted = prune::<ServiceAccount, _>(&client, "default", &identity(), &[])
            .await
            .unwrap();

        assert!(deleted.is_empty());
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_differing_content_is_not_pruned() {
        let mut existing = account("a", identity());
        existing.automount_service_account_token = Some(false);
        let client = FakeObjectClient::new().with_object(existing);

        let deleted = prune(&client, "default", &identity(), &[account("a", identity())])
            .await
            .unwrap();

        assert!(deleted.is_empty());
    }
}
