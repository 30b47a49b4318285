//! Template API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{bool_or_string, ApiParams};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub displaytext: String,
    pub format: String,
    pub hypervisor: String,
    pub ostypeid: String,
    pub ostypename: String,
    pub zoneid: String,
    pub zonename: String,
    pub project: String,
    pub projectid: String,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub isdynamicallyscalable: bool,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub isextractable: bool,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub isfeatured: bool,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub ispublic: bool,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub passwordenabled: bool,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub isready: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterTemplateRequest {
    pub name: String,
    pub displaytext: String,
    pub format: String,
    pub hypervisor: String,
    pub ostypeid: String,
    pub url: String,
    pub zoneid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isdynamicallyscalable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isextractable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isfeatured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ispublic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwordenabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTemplateRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displaytext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ostypeid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isdynamicallyscalable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwordenabled: Option<bool>,
}

pub struct TemplatesApi<'a> {
    client: &'a Client,
}

impl<'a> TemplatesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str, project_id: Option<&str>) -> Result<Option<Template>, ApiError> {
        self.client
            .get_by_id(
                "listTemplates",
                "template",
                id,
                ApiParams::new()
                    .add("templatefilter", "executable")
                    .add_optional("projectid", project_id),
            )
            .await
    }

    /// registerTemplate answers with a one-element list
    pub async fn register(&self, request: &RegisterTemplateRequest) -> Result<Template, ApiError> {
        let mut templates: Vec<Template> = self
            .client
            .request_entity("registerTemplate", ApiParams::from_request(request)?, "template")
            .await?;

        templates
            .pop()
            .ok_or_else(|| ApiError::ParseError("registerTemplate: empty template list".to_string()))
    }

    pub async fn update(&self, request: &UpdateTemplateRequest) -> Result<(), ApiError> {
        self.client
            .request("updateTemplate", ApiParams::from_request(request)?)
            .await
            .map(|_| ())
    }

    /// Changes the public/featured/extractable flags
    pub async fn update_permissions(&self, id: &str, is_public: bool) -> Result<(), ApiError> {
        self.client
            .request(
                "updateTemplatePermissions",
                ApiParams::new().add("id", id).add("ispublic", is_public),
            )
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, ctx: &Context, id: &str, zone_id: Option<&str>) -> Result<(), ApiError> {
        self.client
            .request_async(
                ctx,
                "deleteTemplate",
                ApiParams::new().add("id", id).add_optional("zoneid", zone_id),
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{
        create_test_client, list_body, mock_async_job_with, mock_command_with, response_body,
    };
    use serde_json::json;

    #[tokio::test]
    async fn register_unwraps_template_list() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(
            &mut server,
            "registerTemplate",
            &[("url", "http://images.example.com/debian.qcow2"), ("format", "QCOW2")],
        )
        .with_body(response_body(
            "registerTemplate",
            json!({"count": 1, "template": [{"id": "tpl-1", "name": "debian", "isready": false}]}),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let template = client
            .templates()
            .register(&RegisterTemplateRequest {
                name: "debian".to_string(),
                displaytext: "debian".to_string(),
                format: "QCOW2".to_string(),
                hypervisor: "KVM".to_string(),
                ostypeid: "os-1".to_string(),
                url: "http://images.example.com/debian.qcow2".to_string(),
                zoneid: "z-1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(template.id, "tpl-1");
        assert!(!template.isready);
    }

    #[tokio::test]
    async fn get_lists_executable_templates() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(
            &mut server,
            "listTemplates",
            &[("id", "tpl-1"), ("templatefilter", "executable")],
        )
        .with_body(list_body(
            "listTemplates",
            "template",
            json!([{"id": "tpl-1", "name": "debian", "isready": "true", "ispublic": true}]),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let template = client.templates().get("tpl-1", None).await.unwrap().unwrap();

        assert!(template.isready);
        assert!(template.ispublic);
    }

    #[tokio::test]
    async fn update_permissions_sends_public_flag() {
        let mut server = mockito::Server::new_async().await;
        let m = mock_command_with(
            &mut server,
            "updateTemplatePermissions",
            &[("id", "tpl-1"), ("ispublic", "true")],
        )
        .with_body(response_body("updateTemplatePermissions", json!({"success": true})))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        client.templates().update_permissions("tpl-1", true).await.unwrap();

        m.assert_async().await;
    }

    #[tokio::test]
    async fn delete_template_in_zone() {
        let mut server = mockito::Server::new_async().await;
        let (start, _job) = mock_async_job_with(
            &mut server,
            "deleteTemplate",
            &[("id", "tpl-1"), ("zoneid", "z-1")],
            "job-d",
            json!({"success": true}),
        )
        .await;

        let client = create_test_client(&server.url());
        client
            .templates()
            .delete(&Context::new(), "tpl-1", Some("z-1"))
            .await
            .unwrap();

        start.assert_async().await;
    }
}
