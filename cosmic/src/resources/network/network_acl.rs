//! Network ACL list resource implementation

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
    api_error, client, configure_resource, create_response, delete_response, force_new, get_optional_string,
    get_string, gone, id_attribute, import_by_id, null_if_unknown, read_back, read_response,
    set_string, OperationResult,
};
use crate::retry::{ignore_gone, retry, RetryPolicy};

#[derive(Default)]
pub struct NetworkAclResource {
    provider_data: Option<crate::CosmicProviderData>,
    delete_policy: RetryPolicy,
}

impl NetworkAclResource {
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
            .map_err(|e| api_error("Error reading network ACL list", e))?;

        let Some(acl) = client
            .network_acls()
            .get_list(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading network ACL list {}", id), e))?
        else {
            return Ok(gone("Network ACL list", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &acl.name);
        set_string(&mut state, "description", &acl.description);
        set_string(&mut state, "vpc_id", &acl.vpcid);
        null_if_unknown(&mut state, "project");

        Ok(Some(state))
    }

    async fn create_acl(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let description = get_optional_string(&planned, "description").unwrap_or_else(|| name.clone());

        let acl = client
            .network_acls()
            .create_list(ctx, &name, &description, &get_string(&planned, "vpc_id"))
            .await
            .map_err(|e| api_error(format!("Error creating network ACL list {}", name), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &acl.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Network ACL list", state, result)
    }

    /// ACL lists stay in use for a while after the tiers using them are gone
    async fn delete_acl(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        let acl_id = id.as_str();
        let result = retry(ctx, &self.delete_policy, move || async move {
            client.network_acls().delete_list(ctx, acl_id).await
        })
        .await;
        ignore_gone(result, &id).map_err(|e| {
            api_error(
                format!("Error deleting network ACL list {}", get_string(&prior, "name")),
                e,
            )
        })
    }
}

#[async_trait]
impl Resource for NetworkAclResource {
    fn type_name(&self) -> &str {
        "cosmic_network_acl"
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
            .description("Manages a network ACL list of a VPC")
            .attribute(id_attribute())
            .attribute(force_new("name", "The name of the ACL list", true))
            .attribute(force_new("description", "The description, defaults to the name", false))
            .attribute(force_new("project", "The name or ID of the project", false))
            .attribute(force_new("vpc_id", "The VPC the ACL list belongs to", true))
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
        create_response(self.create_acl(&ctx, request.planned_state).await)
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

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_acl(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for NetworkAclResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkAclResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
