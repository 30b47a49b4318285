//! Site-to-site VPN gateway of a VPC

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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::Client;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_string, gone, id_attribute, import_by_id, read_back, read_response, set_string,
    OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct VpnGatewayResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl VpnGatewayResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");

        let Some(gateway) = client
            .vpn()
            .get_gateway(&id)
            .await
            .map_err(|e| api_error(format!("Error reading VPN gateway {}", id), e))?
        else {
            return Ok(gone("VPN gateway", &id));
        };

        set_string(&mut state, "vpc_id", &gateway.vpcid);
        set_string(&mut state, "public_ip", &gateway.publicip);

        Ok(Some(state))
    }

    async fn create_gateway(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let vpc_id = get_string(&planned, "vpc_id");

        let gateway = client
            .vpn()
            .create_gateway(ctx, &vpc_id)
            .await
            .map_err(|e| api_error(format!("Error creating VPN gateway for VPC {}", vpc_id), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &gateway.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("VPN gateway", state, result)
    }

    async fn delete_gateway(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.vpn().delete_gateway(ctx, &id).await, &id)
            .map_err(|e| api_error(format!("Error deleting VPN gateway {}", id), e))
    }
}

#[async_trait]
impl Resource for VpnGatewayResource {
    fn type_name(&self) -> &str {
        "cosmic_vpn_gateway"
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
            .description("Manages the VPN gateway of a VPC")
            .attribute(id_attribute())
            .attribute(force_new("vpc_id", "The VPC to create the gateway in", true))
            .attribute(
                AttributeBuilder::new("public_ip", AttributeType::String)
                    .description("The public IP address of the gateway")
                    .computed()
                    .build(),
            )
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
impl ResourceWithImportState for VpnGatewayResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpnGatewayResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
