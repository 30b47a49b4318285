//! Static NAT resource implementation
//!
//! Static NAT is a property of a public IP address rather than an entity of
//! its own, so the resource shares the ID of the address it is enabled on.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::SchemaBuilder;
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_optional_string, get_string, gone, id_attribute, project_attribute, read_back,
    read_response, set_project, set_string, OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct StaticNatResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl StaticNatResource {
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
            .map_err(|e| api_error("Error reading static NAT", e))?;

        let address = client
            .addresses()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading static NAT on {}", id), e))?;

        let Some(address) = address.filter(|a| a.isstaticnat) else {
            return Ok(gone("Static NAT", &id));
        };

        set_string(&mut state, "ip_address_id", &address.id);
        set_string(&mut state, "virtual_machine_id", &address.virtualmachineid);
        set_string(&mut state, "vm_guest_ip", &address.vmipaddress);
        set_project(&mut state, &address.project, &address.projectid);

        Ok(Some(state))
    }

    async fn enable(&self, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let ip_address_id = get_string(&planned, "ip_address_id");

        client
            .addresses()
            .enable_static_nat(
                &ip_address_id,
                &get_string(&planned, "virtual_machine_id"),
                get_optional_string(&planned, "vm_guest_ip").as_deref(),
                None,
            )
            .await
            .map_err(|e| api_error(format!("Error enabling static NAT on {}", ip_address_id), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &ip_address_id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Static NAT", state, result)
    }

    async fn disable(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.addresses().disable_static_nat(ctx, &id).await, &id)
            .map_err(|e| api_error(format!("Error disabling static NAT on {}", id), e))
    }
}

#[async_trait]
impl Resource for StaticNatResource {
    fn type_name(&self) -> &str {
        "cosmic_static_nat"
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
            .description("Enables static NAT from a public IP address to an instance")
            .attribute(id_attribute())
            .attribute(force_new("ip_address_id", "The public IP address to enable static NAT on", true))
            .attribute(force_new("virtual_machine_id", "The instance traffic is forwarded to", true))
            .attribute(force_new(
                "vm_guest_ip",
                "The guest IP of the instance, defaults to its primary address",
                false,
            ))
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
        create_response(self.enable(request.planned_state).await)
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
        delete_response(self.disable(&ctx, request.prior_state).await)
    }
}

#[async_trait]
impl ResourceWithConfigure for StaticNatResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
