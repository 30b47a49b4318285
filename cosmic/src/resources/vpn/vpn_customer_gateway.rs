//! VPN customer gateway resource implementation

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
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::vpn::VpnCustomerGatewayRequest;
use crate::api::Client;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_i64,
    get_optional_bool, get_string, get_strings, gone, id_attribute, import_by_id, read_back,
    read_response, set_bool, set_i64, set_string, set_strings, update_response,
    OperationResult,
};
use crate::retry::ignore_gone;
use crate::rules::{parse_cidr, split_cidr_list};

fn gateway_request(state: &DynamicValue) -> VpnCustomerGatewayRequest {
    VpnCustomerGatewayRequest {
        id: None,
        name: get_string(state, "name"),
        cidrlist: get_strings(state, "cidr_list"),
        esppolicy: get_string(state, "esp_policy"),
        gateway: get_string(state, "gateway"),
        ikepolicy: get_string(state, "ike_policy"),
        ipsecpsk: get_string(state, "ipsec_psk"),
        dpd: get_optional_bool(state, "dpd"),
        esplifetime: get_i64(state, "esp_lifetime"),
        ikelifetime: get_i64(state, "ike_lifetime"),
    }
}

#[derive(Default)]
pub struct VpnCustomerGatewayResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl VpnCustomerGatewayResource {
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
            .get_customer_gateway(&id)
            .await
            .map_err(|e| api_error(format!("Error reading VPN customer gateway {}", id), e))?
        else {
            return Ok(gone("VPN customer gateway", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &gateway.name);
        set_strings(&mut state, "cidr_list", split_cidr_list(&gateway.cidrlist));
        set_string(&mut state, "esp_policy", &gateway.esppolicy);
        set_string(&mut state, "gateway", &gateway.gateway);
        set_string(&mut state, "ike_policy", &gateway.ikepolicy);
        // Some versions do not return the key
        if !gateway.ipsecpsk.is_empty() {
            set_string(&mut state, "ipsec_psk", &gateway.ipsecpsk);
        }
        set_bool(&mut state, "dpd", gateway.dpd);
        set_i64(&mut state, "esp_lifetime", gateway.esplifetime);
        set_i64(&mut state, "ike_lifetime", gateway.ikelifetime);

        Ok(Some(state))
    }

    async fn create_gateway(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");

        let gateway = client
            .vpn()
            .create_customer_gateway(ctx, &gateway_request(&planned))
            .await
            .map_err(|e| api_error(format!("Error creating VPN customer gateway {}", name), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &gateway.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("VPN customer gateway", state, result)
    }

    async fn update_gateway(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&planned, "id");

        let request = VpnCustomerGatewayRequest {
            id: Some(id.clone()),
            ..gateway_request(&planned)
        };
        client
            .vpn()
            .update_customer_gateway(ctx, &request)
            .await
            .map_err(|e| {
                api_error(format!("Error updating VPN customer gateway {}", request.name), e)
            })?;

        let result = Self::read_state(client, planned.clone()).await;
        read_back("VPN customer gateway", planned, result)
    }

    async fn delete_gateway(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.vpn().delete_customer_gateway(ctx, &id).await, &id).map_err(|e| {
            api_error(
                format!("Error deleting VPN customer gateway {}", get_string(&prior, "name")),
                e,
            )
        })
    }
}

#[async_trait]
impl Resource for VpnCustomerGatewayResource {
    fn type_name(&self) -> &str {
        "cosmic_vpn_customer_gateway"
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
        let required = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .required()
                .build()
        };
        let lifetime = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::Number)
                .description(description)
                .optional()
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a VPN customer gateway")
            .attribute(id_attribute())
            .attribute(required("name", "The name of the customer gateway"))
            .attribute(
                AttributeBuilder::new("cidr_list", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("The guest CIDRs behind the customer gateway")
                    .required()
                    .build(),
            )
            .attribute(required("esp_policy", "The ESP policy, e.g. aes256-sha1"))
            .attribute(required("gateway", "The public IP address of the customer gateway"))
            .attribute(required("ike_policy", "The IKE policy, e.g. aes256-sha1;modp1536"))
            .attribute(
                AttributeBuilder::new("ipsec_psk", AttributeType::String)
                    .description("The IPsec pre-shared key")
                    .required()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("dpd", AttributeType::Bool)
                    .description("Whether dead peer detection is enabled")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(lifetime("esp_lifetime", "The ESP lifetime in seconds"))
            .attribute(lifetime("ike_lifetime", "The IKE lifetime in seconds"))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let path = AttributePath::new("cidr_list");
        let diagnostics = get_strings(&request.config, "cidr_list")
            .iter()
            .filter_map(|cidr| parse_cidr(cidr).err())
            .map(|e| Diagnostic::error("Invalid CIDR", e.to_string()).with_attribute(path.clone()))
            .collect();

        ValidateResourceConfigResponse { diagnostics }
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

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self.update_gateway(&ctx, request.planned_state).await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_gateway(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for VpnCustomerGatewayResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpnCustomerGatewayResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
#[path = "./vpn_customer_gateway_test.rs"]
mod vpn_customer_gateway_test;
