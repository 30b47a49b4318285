//! Security group resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::SchemaBuilder;
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_optional_string, get_string, gone, id_attribute, import_by_id, project_attribute,
    read_back, read_response, set_project, set_string, OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct SecurityGroupResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl SecurityGroupResource {
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
            .map_err(|e| api_error("Error reading security group", e))?;

        let Some(group) = client
            .security_groups()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading security group {}", id), e))?
        else {
            return Ok(gone("Security group", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &group.name);
        set_string(&mut state, "description", &group.description);
        set_project(&mut state, &group.project, &group.projectid);

        Ok(Some(state))
    }

    async fn create_group(&self, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating security group {}", name);

        let project = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;
        let description = get_optional_string(&planned, "description").unwrap_or_else(|| name.clone());

        let group = client
            .security_groups()
            .create(&name, &description, project.as_deref())
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &group.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Security group", state, result)
    }

    async fn delete_group(&self, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let summary = format!("Error deleting security group {}", get_string(&prior, "name"));

        let project = project_id(client, &prior)
            .await
            .map_err(|e| api_error(&summary, e))?;

        ignore_gone(
            client.security_groups().delete(&id, project.as_deref()).await,
            &id,
        )
        .map_err(|e| api_error(&summary, e))
    }
}

#[async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &str {
        "cosmic_security_group"
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
            .description("Manages a security group")
            .attribute(id_attribute())
            .attribute(force_new("name", "The name of the security group", true))
            .attribute(force_new("description", "The description, defaults to the name", false))
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

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_group(request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => Self::read_state(client, request.current_state.clone()).await,
            Err(diagnostic) => Err(diagnostic),
        };
        read_response(request.current_state, request.private, result)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_group(request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for SecurityGroupResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for SecurityGroupResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
