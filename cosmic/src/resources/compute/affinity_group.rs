//! Affinity group resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::affinity_groups::CreateAffinityGroupRequest;
use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_optional_string,
    get_string, gone, id_attribute, import_by_id, project_attribute, read_back, read_response,
    set_project, set_string, OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct AffinityGroupResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl AffinityGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");
        let project = project_id(client, &state)
            .await
            .map_err(|e| api_error("Error reading affinity group", e))?;

        let Some(group) = client
            .affinity_groups()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading affinity group {}", id), e))?
        else {
            return Ok(gone("Affinity group", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &group.name);
        set_string(&mut state, "description", &group.description);
        set_string(&mut state, "type", &group.group_type);
        set_project(&mut state, &group.project, &group.projectid);

        Ok(Some(state))
    }

    async fn create_group(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let projectid = project_id(client, &planned)
            .await
            .map_err(|e| api_error(format!("Error creating affinity group {}", name), e))?;

        let request = CreateAffinityGroupRequest {
            name: name.clone(),
            group_type: get_string(&planned, "type"),
            description: Some(get_optional_string(&planned, "description").unwrap_or_else(|| name.clone())),
            projectid,
        };

        let group = client
            .affinity_groups()
            .create(ctx, &request)
            .await
            .map_err(|e| api_error(format!("Error creating affinity group {}", name), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &group.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Affinity group", state, result)
    }
}

#[async_trait]
impl Resource for AffinityGroupResource {
    fn type_name(&self) -> &str {
        "cosmic_affinity_group"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an affinity group")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the affinity group")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("The description of the affinity group, defaults to the name")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The affinity group type, e.g. host anti-affinity")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(project_attribute())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_group(&ctx, request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => Self::read_state(client, request.current_state.clone()).await,
            Err(diagnostic) => Err(diagnostic),
        };
        read_response(request.current_state, request.private, result)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        // Every attribute forces a new group
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let id = get_string(&request.prior_state, "id");
                ignore_gone(client.affinity_groups().delete(&ctx, &id).await, &id).map_err(|e| {
                    api_error(
                        format!("Error deleting affinity group {}", get_string(&request.prior_state, "name")),
                        e,
                    )
                })
            }
            Err(diagnostic) => Err(diagnostic),
        };
        delete_response(result)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for AffinityGroupResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for AffinityGroupResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{list_body, mock_async_job_with, mock_command_with};
    use crate::resources::test_support::*;
    use serde_json::json;
    use tfplug::types::Dynamic;

    const GROUP_ID: &str = "0f6a2e52-5d2b-4d7e-9b43-7b52b5f1d1a0";

    fn group_json() -> serde_json::Value {
        json!({
            "id": GROUP_ID,
            "name": "web",
            "description": "web",
            "type": "host anti-affinity"
        })
    }

    #[tokio::test]
    async fn create_defaults_description_to_name() {
        let mut server = mockito::Server::new_async().await;
        let _create = mock_async_job_with(
            &mut server,
            "createAffinityGroup",
            &[("name", "web"), ("description", "web"), ("type", "host anti-affinity")],
            "job-1",
            json!({"affinitygroup": group_json()}),
        )
        .await;
        let _list = mock_command_with(&mut server, "listAffinityGroups", &[("id", GROUP_ID)])
            .with_body(list_body("listAffinityGroups", "affinitygroup", json!([group_json()])))
            .create_async()
            .await;

        let mut resource = AffinityGroupResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let planned = state(&[
            ("id", Dynamic::Unknown),
            ("name", s("web")),
            ("description", Dynamic::Unknown),
            ("type", s("host anti-affinity")),
            ("project", Dynamic::Unknown),
        ]);
        let response = resource
            .create(Context::new(), create_request("cosmic_affinity_group", planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(get_string(&response.new_state, "id"), GROUP_ID);
        assert_eq!(get_string(&response.new_state, "description"), "web");
        assert!(response
            .new_state
            .get(&tfplug::types::AttributePath::new("project"))
            .is_some_and(Dynamic::is_null));
    }

    #[tokio::test]
    async fn read_removes_missing_group() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_command_with(&mut server, "listAffinityGroups", &[("id", GROUP_ID)])
            .with_body(list_body("listAffinityGroups", "affinitygroup", json!([])))
            .create_async()
            .await;

        let mut resource = AffinityGroupResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let current = state(&[("id", s(GROUP_ID)), ("name", s("web"))]);
        let response = resource
            .read(Context::new(), read_request("cosmic_affinity_group", current))
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn delete_ignores_missing_group() {
        let mut server = mockito::Server::new_async().await;
        let _delete = mock_command_with(&mut server, "deleteAffinityGroup", &[("id", GROUP_ID)])
            .with_status(431)
            .with_body(format!(
                r#"{{"deleteaffinitygroupresponse":{{"errorcode":431,"cserrorcode":4350,"errortext":"Invalid parameter id value={} due to incorrect long value format, or entity does not exist"}}}}"#,
                GROUP_ID
            ))
            .create_async()
            .await;

        let mut resource = AffinityGroupResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let prior = state(&[("id", s(GROUP_ID)), ("name", s("web"))]);
        let response = resource
            .delete(Context::new(), delete_request("cosmic_affinity_group", prior))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn unconfigured_resource_reports_error() {
        let resource = AffinityGroupResource::new();
        let response = resource
            .delete(
                Context::new(),
                delete_request("cosmic_affinity_group", state(&[("id", s(GROUP_ID))])),
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }
}
