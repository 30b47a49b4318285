//! Additional NIC attached to an instance

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::Client;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_optional_string,
    get_string, gone, id_attribute, read_back, read_response, set_string, OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct NicResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl NicResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");
        let virtual_machine_id = get_string(&state, "virtual_machine_id");
        let network_id = get_string(&state, "network_id");

        let nics = client
            .virtual_machines()
            .list_nics(&virtual_machine_id, Some(&network_id))
            .await;

        let nics = match nics {
            Ok(nics) => nics,
            Err(e) if e.is_entity_gone(&virtual_machine_id) => return Ok(gone("NIC", &id)),
            Err(e) => return Err(api_error(format!("Error reading NIC {}", id), e)),
        };

        let Some(nic) = nics.into_iter().find(|n| n.id == id) else {
            return Ok(gone("NIC", &id));
        };

        set_string(&mut state, "ip_address", &nic.ipaddress);
        set_string(&mut state, "network_id", &nic.networkid);

        Ok(Some(state))
    }

    async fn create_nic(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let virtual_machine_id = get_string(&planned, "virtual_machine_id");
        let network_id = get_string(&planned, "network_id");
        let summary = format!("Error creating NIC for network {}", network_id);

        let vm = client
            .virtual_machines()
            .add_nic(
                ctx,
                &virtual_machine_id,
                &network_id,
                get_optional_string(&planned, "ip_address").as_deref(),
            )
            .await
            .map_err(|e| api_error(&summary, e))?;

        let nic = vm
            .nic
            .iter()
            .find(|n| n.networkid == network_id)
            .ok_or_else(|| {
                Diagnostic::error(
                    summary.clone(),
                    format!("Virtual machine {} has no NIC in network {}", virtual_machine_id, network_id),
                )
            })?;

        let mut state = planned;
        set_string(&mut state, "id", &nic.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("NIC", state, result)
    }

    async fn delete_nic(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        let result = client
            .virtual_machines()
            .remove_nic(ctx, &get_string(&prior, "virtual_machine_id"), &id)
            .await;
        ignore_gone(result, &id).map_err(|e| api_error(format!("Error deleting NIC {}", id), e))
    }
}

#[async_trait]
impl Resource for NicResource {
    fn type_name(&self) -> &str {
        "cosmic_nic"
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
            .description("Attaches an additional NIC to an instance")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("network_id", AttributeType::String)
                    .description("The ID of the network the NIC connects to")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ip_address", AttributeType::String)
                    .description("The IP address of the NIC")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_machine_id", AttributeType::String)
                    .description("The ID of the instance")
                    .required()
                    .plan_modifier(RequiresReplace::create())
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
        create_response(self.create_nic(&ctx, request.planned_state).await)
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
        delete_response(self.delete_nic(&ctx, request.prior_state).await)
    }
}

#[async_trait]
impl ResourceWithConfigure for NicResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
