//! Resource tag API

use std::collections::HashMap;
use tfplug::context::Context;

use super::client::Client;
use super::common::ApiParams;
use super::error::ApiError;

pub struct TagsApi<'a> {
    client: &'a Client,
}

impl<'a> TagsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        ctx: &Context,
        resource_id: &str,
        resource_type: &str,
        tags: &HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "createTags", tag_params(resource_id, resource_type, tags))
            .await
            .map(|_| ())
    }

    pub async fn delete(
        &self,
        ctx: &Context,
        resource_id: &str,
        resource_type: &str,
        tags: &HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteTags", tag_params(resource_id, resource_type, tags))
            .await
            .map(|_| ())
    }
}

fn tag_params(resource_id: &str, resource_type: &str, tags: &HashMap<String, String>) -> ApiParams {
    ApiParams::new()
        .add("resourceids", resource_id)
        .add("resourcetype", resource_type)
        .add_tags(tags)
}
