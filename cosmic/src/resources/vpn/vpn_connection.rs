//! Site-to-site VPN connection between a VPN gateway and a customer gateway

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
pub struct VpnConnectionResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl VpnConnectionResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");

        let Some(connection) = client
            .vpn()
            .get_connection(&id)
            .await
            .map_err(|e| api_error(format!("Error reading VPN connection {}", id), e))?
        else {
            return Ok(gone("VPN connection", &id));
        };

        set_string(&mut state, "customer_gateway_id", &connection.s2scustomergatewayid);
        set_string(&mut state, "vpn_gateway_id", &connection.s2svpngatewayid);

        Ok(Some(state))
    }

    async fn create_connection(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let customer_gateway_id = get_string(&planned, "customer_gateway_id");
        let vpn_gateway_id = get_string(&planned, "vpn_gateway_id");

        let connection = client
            .vpn()
            .create_connection(ctx, &customer_gateway_id, &vpn_gateway_id)
            .await
            .map_err(|e| {
                api_error(
                    format!(
                        "Error creating VPN connection from {} to {}",
                        vpn_gateway_id, customer_gateway_id
                    ),
                    e,
                )
            })?;
        tracing::debug!("VPN connection {} is {}", connection.id, connection.state);

        let mut state = planned;
        set_string(&mut state, "id", &connection.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("VPN connection", state, result)
    }

    async fn delete_connection(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.vpn().delete_connection(ctx, &id).await, &id)
            .map_err(|e| api_error(format!("Error deleting VPN connection {}", id), e))
    }
}

#[async_trait]
impl Resource for VpnConnectionResource {
    fn type_name(&self) -> &str {
        "cosmic_vpn_connection"
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
            .description("Manages a site-to-site VPN connection")
            .attribute(id_attribute())
            .attribute(force_new("customer_gateway_id", "The customer gateway to connect to", true))
            .attribute(force_new("vpn_gateway_id", "The VPN gateway to connect from", true))
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
        create_response(self.create_connection(&ctx, request.planned_state).await)
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
        delete_response(self.delete_connection(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for VpnConnectionResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpnConnectionResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
