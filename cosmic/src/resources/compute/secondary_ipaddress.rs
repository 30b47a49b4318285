//! Secondary IP address on an instance NIC

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

use crate::api::virtual_machines::Nic;
use crate::api::Client;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_optional_string,
    get_string, gone, id_attribute, read_back, read_response, set_string, OperationResult,
};
use crate::retry::ignore_gone;

#[derive(Default)]
pub struct SecondaryIpAddressResource {
    provider_data: Option<crate::CosmicProviderData>,
}

/// The configured NIC, or the default NIC of the instance
fn select_nic(nics: Vec<Nic>, nic_id: Option<&str>) -> Option<Nic> {
    nics.into_iter().find(|n| match nic_id {
        Some(id) => n.id == id,
        None => n.isdefault,
    })
}

impl SecondaryIpAddressResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");
        let virtual_machine_id = get_string(&state, "virtual_machine_id");

        let nics = match client.virtual_machines().list_nics(&virtual_machine_id, None).await {
            Ok(nics) => nics,
            Err(e) if e.is_entity_gone(&virtual_machine_id) => {
                return Ok(gone("Secondary IP address", &id))
            }
            Err(e) => return Err(api_error(format!("Error reading secondary IP address {}", id), e)),
        };

        let nic_id = get_optional_string(&state, "nic_id");
        let Some(nic) = select_nic(nics, nic_id.as_deref()) else {
            return Ok(gone("Secondary IP address", &id));
        };
        let Some(ip) = nic.secondaryip.iter().find(|ip| ip.id == id) else {
            return Ok(gone("Secondary IP address", &id));
        };

        set_string(&mut state, "ip_address", &ip.ipaddress);
        set_string(&mut state, "nic_id", &nic.id);

        Ok(Some(state))
    }

    async fn create_ip(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let virtual_machine_id = get_string(&planned, "virtual_machine_id");
        let summary = format!(
            "Error adding secondary IP address to virtual machine {}",
            virtual_machine_id
        );

        let nic_id = match get_optional_string(&planned, "nic_id") {
            Some(nic_id) => nic_id,
            None => {
                let nics = client
                    .virtual_machines()
                    .list_nics(&virtual_machine_id, None)
                    .await
                    .map_err(|e| api_error(&summary, e))?;
                select_nic(nics, None)
                    .map(|n| n.id)
                    .ok_or_else(|| Diagnostic::error(summary.clone(), "The virtual machine has no default NIC"))?
            }
        };

        let ip = client
            .virtual_machines()
            .add_ip_to_nic(ctx, &nic_id, get_optional_string(&planned, "ip_address").as_deref())
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &ip.id);
        set_string(&mut state, "nic_id", &nic_id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Secondary IP address", state, result)
    }

    async fn delete_ip(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        let result = client.virtual_machines().remove_ip_from_nic(ctx, &id).await;
        ignore_gone(result, &id)
            .map_err(|e| api_error(format!("Error removing secondary IP address {}", id), e))
    }
}

#[async_trait]
impl Resource for SecondaryIpAddressResource {
    fn type_name(&self) -> &str {
        "cosmic_secondary_ipaddress"
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
            .description("Assigns a secondary IP address to an instance NIC")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("ip_address", AttributeType::String)
                    .description("The secondary IP address; picked by the control plane when unset")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("nic_id", AttributeType::String)
                    .description("The ID of the NIC, defaults to the default NIC of the instance")
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
        create_response(self.create_ip(&ctx, request.planned_state).await)
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
        delete_response(self.delete_ip(&ctx, request.prior_state).await)
    }
}

#[async_trait]
impl ResourceWithConfigure for SecondaryIpAddressResource {
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
    use crate::api::test_helpers::{
        entity_gone_body, list_body, mock_async_job_with, mock_command_with,
    };
    use crate::resources::test_support::*;
    use serde_json::json;
    use tfplug::types::Dynamic;

    fn nics(with_secondary: bool) -> serde_json::Value {
        let secondary = if with_secondary {
            json!([{"id": "sip-1", "ipaddress": "10.0.0.20", "nicid": "nic-1"}])
        } else {
            json!([])
        };
        json!([
            {"id": "nic-0", "networkid": "net-0", "ipaddress": "10.9.0.2", "isdefault": false},
            {"id": "nic-1", "networkid": "net-1", "ipaddress": "10.0.0.10", "isdefault": true, "secondaryip": secondary}
        ])
    }

    #[tokio::test]
    async fn create_uses_default_nic() {
        let mut server = mockito::Server::new_async().await;
        let _initial = mock_command_with(&mut server, "listNics", &[("virtualmachineid", "vm-1")])
            .with_body(list_body("listNics", "nic", nics(true)))
            .create_async()
            .await;
        let add = mock_async_job_with(
            &mut server,
            "addIpToNic",
            &[("nicid", "nic-1")],
            "job-1",
            json!({"nicsecondaryip": {"id": "sip-1", "ipaddress": "10.0.0.20", "nicid": "nic-1"}}),
        )
        .await;

        let mut resource = SecondaryIpAddressResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let planned = state(&[
            ("id", Dynamic::Unknown),
            ("ip_address", Dynamic::Unknown),
            ("nic_id", Dynamic::Unknown),
            ("virtual_machine_id", s("vm-1")),
        ]);
        let response = resource
            .create(Context::new(), create_request("cosmic_secondary_ipaddress", planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        add.0.assert_async().await;
        assert_eq!(get_string(&response.new_state, "id"), "sip-1");
        assert_eq!(get_string(&response.new_state, "nic_id"), "nic-1");
        assert_eq!(get_string(&response.new_state, "ip_address"), "10.0.0.20");
    }

    #[tokio::test]
    async fn read_drops_released_address() {
        let mut server = mockito::Server::new_async().await;
        let _nics = mock_command_with(&mut server, "listNics", &[("virtualmachineid", "vm-1")])
            .with_body(list_body("listNics", "nic", nics(false)))
            .create_async()
            .await;

        let mut resource = SecondaryIpAddressResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let current = state(&[
            ("id", s("sip-1")),
            ("nic_id", s("nic-1")),
            ("virtual_machine_id", s("vm-1")),
        ]);
        let response = resource
            .read(Context::new(), read_request("cosmic_secondary_ipaddress", current))
            .await;

        assert!(response.new_state.is_none());
    }

    fn assigned() -> DynamicValue {
        state(&[
            ("id", s("sip-1")),
            ("ip_address", s("10.0.0.20")),
            ("nic_id", s("nic-1")),
            ("virtual_machine_id", s("vm-1")),
        ])
    }

    #[tokio::test]
    async fn read_keeps_assigned_address() {
        let mut server = mockito::Server::new_async().await;
        let _nics = mock_command_with(&mut server, "listNics", &[("virtualmachineid", "vm-1")])
            .with_body(list_body("listNics", "nic", nics(true)))
            .create_async()
            .await;

        let mut resource = SecondaryIpAddressResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .read(Context::new(), read_request("cosmic_secondary_ipaddress", assigned()))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let new_state = response.new_state.unwrap();
        assert_eq!(get_string(&new_state, "ip_address"), "10.0.0.20");
        assert_eq!(get_string(&new_state, "nic_id"), "nic-1");
    }

    #[tokio::test]
    async fn read_with_destroyed_instance_is_gone() {
        let mut server = mockito::Server::new_async().await;
        let _nics = mock_command_with(&mut server, "listNics", &[("virtualmachineid", "vm-1")])
            .with_status(431)
            .with_body(entity_gone_body("listNics", "vm-1"))
            .create_async()
            .await;

        let mut resource = SecondaryIpAddressResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .read(Context::new(), read_request("cosmic_secondary_ipaddress", assigned()))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn delete_removes_address_from_nic() {
        let mut server = mockito::Server::new_async().await;
        let remove = mock_async_job_with(
            &mut server,
            "removeIpFromNic",
            &[("id", "sip-1")],
            "job-2",
            json!({"success": true}),
        )
        .await;

        let mut resource = SecondaryIpAddressResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .delete(Context::new(), delete_request("cosmic_secondary_ipaddress", assigned()))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        remove.0.assert_async().await;
        remove.1.assert_async().await;
    }

    #[tokio::test]
    async fn delete_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _remove = mock_command_with(&mut server, "removeIpFromNic", &[("id", "sip-1")])
            .with_status(530)
            .with_body(
                r#"{"removeipfromnicresponse":{"errorcode":530,"cserrorcode":4250,"errortext":"The IP is used by a port forwarding rule"}}"#,
            )
            .create_async()
            .await;

        let mut resource = SecondaryIpAddressResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .delete(Context::new(), delete_request("cosmic_secondary_ipaddress", assigned()))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].summary,
            "Error removing secondary IP address sip-1"
        );
    }
}
