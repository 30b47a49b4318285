//! Tag reconciliation
//!
//! Desired and actual tags are compared pairwise; the control plane only
//! receives the pairs that actually changed.

use std::collections::HashMap;
use tfplug::context::Context;

use crate::api::{ApiError, Client};

/// Returns `(remove, create)`. A pair present on both sides with the same
/// value is left alone; a changed value is removed and created again.
pub fn diff_tags(
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> (HashMap<String, String>, HashMap<String, String>) {
    let remove = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let create = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    (remove, create)
}

/// Applies the difference between `old` and `new` to a resource.
/// Removals go first so a changed value is never rejected as a duplicate key.
pub async fn reconcile_tags(
    ctx: &Context,
    client: &Client,
    resource_id: &str,
    resource_type: &str,
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> Result<(), ApiError> {
    let (remove, create) = diff_tags(old, new);

    if !remove.is_empty() {
        tracing::debug!("Removing {} tags from {} {}", remove.len(), resource_type, resource_id);
        client
            .tags()
            .delete(ctx, resource_id, resource_type, &remove)
            .await?;
    }

    if !create.is_empty() {
        tracing::debug!("Creating {} tags on {} {}", create.len(), resource_type, resource_id);
        client
            .tags()
            .create(ctx, resource_id, resource_type, &create)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, mock_async_job_with, API_PATH};
    use serde_json::json;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unchanged_pairs_are_left_alone() {
        let old = tags(&[("env", "prod"), ("team", "core")]);
        let new = tags(&[("env", "prod"), ("team", "edge"), ("owner", "ops")]);

        let (remove, create) = diff_tags(&old, &new);

        assert_eq!(remove, tags(&[("team", "core")]));
        assert_eq!(create, tags(&[("team", "edge"), ("owner", "ops")]));
    }

    #[test]
    fn removing_everything() {
        let (remove, create) = diff_tags(&tags(&[("env", "prod")]), &HashMap::new());
        assert_eq!(remove, tags(&[("env", "prod")]));
        assert!(create.is_empty());
    }

    #[tokio::test]
    async fn identical_sets_make_no_calls() {
        let mut server = mockito::Server::new_async().await;
        let never = server
            .mock("POST", API_PATH)
            .expect(0)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let same = tags(&[("env", "prod")]);
        reconcile_tags(&Context::new(), &client, "vpc-1", "Vpc", &same, &same)
            .await
            .unwrap();

        never.assert_async().await;
    }

    #[tokio::test]
    async fn changed_value_is_deleted_then_created() {
        let mut server = mockito::Server::new_async().await;
        let (delete, _) = mock_async_job_with(
            &mut server,
            "deleteTags",
            &[("resourceids", "vm-1"), ("tags[0].key", "env"), ("tags[0].value", "test")],
            "job-del",
            json!({"success": true}),
        )
        .await;
        let (create, _) = mock_async_job_with(
            &mut server,
            "createTags",
            &[("resourcetype", "UserVm"), ("tags[0].key", "env"), ("tags[0].value", "prod")],
            "job-new",
            json!({"success": true}),
        )
        .await;

        let client = create_test_client(&server.url());
        reconcile_tags(
            &Context::new(),
            &client,
            "vm-1",
            "UserVm",
            &tags(&[("env", "test")]),
            &tags(&[("env", "prod")]),
        )
        .await
        .unwrap();

        delete.assert_async().await;
        create.assert_async().await;
    }
}
