//! VPC private gateway resource implementation

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
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_string, gone, id_attribute, import_by_id, read_back, read_response, set_string,
    OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct PrivateGatewayResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl PrivateGatewayResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");

        let Some(gateway) = client
            .vpcs()
            .get_private_gateway(&id)
            .await
            .map_err(|e| api_error(format!("Error reading private gateway {}", id), e))?
        else {
            return Ok(gone("Private gateway", &get_string(&state, "ip_address")));
        };

        set_string(&mut state, "ip_address", &gateway.ipaddress);
        set_string(&mut state, "network_id", &gateway.networkid);
        set_string(&mut state, "acl_id", &gateway.aclid);
        set_string(&mut state, "vpc_id", &gateway.vpcid);

        Ok(Some(state))
    }

    async fn create_gateway(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let ip_address = get_string(&planned, "ip_address");

        let gateway = client
            .vpcs()
            .create_private_gateway(
                ctx,
                &ip_address,
                &get_string(&planned, "network_id"),
                &get_string(&planned, "vpc_id"),
                &get_string(&planned, "acl_id"),
            )
            .await
            .map_err(|e| api_error(format!("Error creating private gateway for {}", ip_address), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &gateway.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Private gateway", state, result)
    }

    async fn delete_gateway(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.vpcs().delete_private_gateway(ctx, &id).await, &id).map_err(|e| {
            api_error(
                format!("Error deleting private gateway {}", get_string(&prior, "ip_address")),
                e,
            )
        })
    }
}

#[async_trait]
impl Resource for PrivateGatewayResource {
    fn type_name(&self) -> &str {
        "cosmic_private_gateway"
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
            .description("Manages a private gateway of a VPC")
            .attribute(id_attribute())
            .attribute(force_new("ip_address", "The IP address of the gateway", true))
            .attribute(force_new("network_id", "The network the gateway is placed in", true))
            .attribute(force_new("acl_id", "The ACL list applied to the gateway", true))
            .attribute(force_new("vpc_id", "The VPC the gateway belongs to", true))
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
        create_response(self.create_gateway(&ctx, request.planned_state).await)
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
        delete_response(self.delete_gateway(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for PrivateGatewayResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for PrivateGatewayResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
