//! Volume (data disk) API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{string_or_i64, ApiParams, Tag};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub id: String,
    pub name: String,
    /// Size in bytes
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub size: Option<i64>,
    pub diskofferingid: String,
    pub diskofferingname: String,
    pub virtualmachineid: String,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub deviceid: Option<i64>,
    pub zoneid: String,
    pub zonename: String,
    pub project: String,
    pub projectid: String,
    pub state: String,
    pub tags: Vec<Tag>,
}

impl Volume {
    pub fn is_attached(&self) -> bool {
        !self.virtualmachineid.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub diskofferingid: String,
    pub zoneid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResizeVolumeRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diskofferingid: Option<String>,
    /// New size in GiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub shrinkok: bool,
}

pub struct VolumesApi<'a> {
    client: &'a Client,
}

impl<'a> VolumesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str, project_id: Option<&str>) -> Result<Option<Volume>, ApiError> {
        self.client
            .get_by_id(
                "listVolumes",
                "volume",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn create(
        &self,
        ctx: &Context,
        request: &CreateVolumeRequest,
    ) -> Result<Volume, ApiError> {
        self.client
            .request_async_entity(ctx, "createVolume", ApiParams::from_request(request)?, "volume")
            .await
    }

    pub async fn attach(
        &self,
        ctx: &Context,
        id: &str,
        virtual_machine_id: &str,
        device_id: Option<i64>,
    ) -> Result<Volume, ApiError> {
        let params = ApiParams::new()
            .add("id", id)
            .add("virtualmachineid", virtual_machine_id)
            .add_optional("deviceid", device_id);

        self.client
            .request_async_entity(ctx, "attachVolume", params, "volume")
            .await
    }

    pub async fn detach(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "detachVolume", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn resize(
        &self,
        ctx: &Context,
        request: &ResizeVolumeRequest,
    ) -> Result<Volume, ApiError> {
        self.client
            .request_async_entity(ctx, "resizeVolume", ApiParams::from_request(request)?, "volume")
            .await
    }

    /// deleteVolume is synchronous
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .request("deleteVolume", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}
