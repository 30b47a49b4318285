//! Affinity group API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::ApiParams;
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AffinityGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub project: String,
    pub projectid: String,
    #[serde(rename = "virtualmachineIds")]
    pub virtual_machine_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateAffinityGroupRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
}

/// Affinity group operations
pub struct AffinityGroupsApi<'a> {
    client: &'a Client,
}

impl<'a> AffinityGroupsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// listAffinityGroups by id
    pub async fn get(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<AffinityGroup>, ApiError> {
        self.client
            .get_by_id(
                "listAffinityGroups",
                "affinitygroup",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    /// createAffinityGroup (async)
    pub async fn create(
        &self,
        ctx: &Context,
        request: &CreateAffinityGroupRequest,
    ) -> Result<AffinityGroup, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createAffinityGroup",
                ApiParams::from_request(request)?,
                "affinitygroup",
            )
            .await
    }

    /// deleteAffinityGroup (async)
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteAffinityGroup", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}
