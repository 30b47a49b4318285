//! Public IP address resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, RequiresReplaceIf};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ImportedResource,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, PlanModifierRequest, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_optional_string,
    get_string, has_change, id_attribute, project_attribute, read_back, read_response,
    set_project, set_string, update_response, OperationError, OperationResult,
};
use crate::retry::ignore_gone;

/// `acl_id` value meaning no ACL list is attached
pub const NO_ACL: &str = "none";

#[derive(Default)]
pub struct IpAddressResource {
    provider_data: Option<crate::CosmicProviderData>,
}

/// Moving an address off `none` recreates it; switching between ACLs is in place
fn leaving_no_acl(request: &PlanModifierRequest) -> bool {
    matches!(&request.state_value.value, Dynamic::String(prior) if prior == NO_ACL)
}

/// Exactly one of `network_id` and `vpc_id` has to be set. Unknown values
/// count as set so the check does not fire on values computed elsewhere.
fn verify_placement(config: &DynamicValue) -> Result<(), Diagnostic> {
    let is_set = |name: &str| {
        config
            .get(&AttributePath::new(name))
            .is_some_and(|v| !matches!(v, Dynamic::Null) && v.as_str() != Some(""))
    };

    if is_set("network_id") == is_set("vpc_id") {
        return Err(Diagnostic::error(
            "Invalid IP address configuration",
            "You must supply a value for either (so not both) the 'network_id' or 'vpc_id' parameter",
        ));
    }
    Ok(())
}

impl IpAddressResource {
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
            .map_err(|e| api_error("Error reading IP address", e))?;

        let Some(ip) = client
            .addresses()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading IP address {}", id), e))?
        else {
            tracing::debug!("IP address with ID {} is no longer associated", id);
            return Ok(None);
        };

        set_string(&mut state, "ip_address", &ip.ipaddress);
        if get_optional_string(&state, "network_id").is_some() {
            set_string(&mut state, "network_id", &ip.associatednetworkid);
        }
        if get_optional_string(&state, "vpc_id").is_some() {
            set_string(&mut state, "vpc_id", &ip.vpcid);
        }
        let acl_id = if ip.aclid.is_empty() { NO_ACL } else { ip.aclid.as_str() };
        set_string(&mut state, "acl_id", acl_id);
        set_project(&mut state, &ip.project, &ip.projectid);

        Ok(Some(state))
    }

    async fn replace_acl(ctx: &Context, client: &Client, acl_id: &str, id: &str) -> Result<(), Diagnostic> {
        client
            .network_acls()
            .replace_for_public_ip(ctx, acl_id, id)
            .await
            .map_err(|e| api_error("Error replacing ACL", e))
    }

    async fn create_address(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let summary = "Error associating a new IP address";

        let network_id = get_optional_string(&planned, "network_id");
        let vpc_id = get_optional_string(&planned, "vpc_id");
        let project = project_id(client, &planned)
            .await
            .map_err(|e| api_error(summary, e))?;

        let ip = client
            .addresses()
            .associate(ctx, network_id.as_deref(), vpc_id.as_deref(), project.as_deref())
            .await
            .map_err(|e| api_error(summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &ip.id);

        if vpc_id.is_some() {
            if let Some(acl_id) = get_optional_string(&state, "acl_id").filter(|a| a != NO_ACL) {
                Self::replace_acl(ctx, client, &acl_id, &ip.id)
                    .await
                    .map_err(|d| OperationError::from(d).with_state(state.clone()))?;
            }
        }

        let result = Self::read_state(client, state.clone()).await;
        read_back("IP address", state, result)
    }

    async fn update_address(
        &self,
        ctx: &Context,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;

        if has_change(&prior, &planned, "acl_id") {
            let acl_id = get_string(&planned, "acl_id");
            Self::replace_acl(ctx, client, &acl_id, &get_string(&prior, "id")).await?;
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("IP address", planned, result)
    }

    async fn delete_address(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.addresses().disassociate(ctx, &id).await, &id)
            .map_err(|e| api_error(format!("Error disassociating IP address {}", id), e))
    }
}

#[async_trait]
impl Resource for IpAddressResource {
    fn type_name(&self) -> &str {
        "cosmic_ipaddress"
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
            .description("Acquires a public IP address on a network or VPC")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("network_id", AttributeType::String)
                    .description("The network to acquire the address on")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("The VPC to acquire the address on")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(project_attribute())
            .attribute(
                AttributeBuilder::new("ip_address", AttributeType::String)
                    .description("The acquired IP address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("acl_id", AttributeType::String)
                    .description("The ACL list applied to the address on a VPC")
                    .optional()
                    .default(StaticDefault::string(NO_ACL))
                    .plan_modifier(RequiresReplaceIf::create(
                        leaving_no_acl,
                        "attaching an ACL to an address without one forces a new resource",
                    ))
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: verify_placement(&request.config).err().into_iter().collect(),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_address(&ctx, request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => Self::read_state(client, request.current_state.clone()).await,
            Err(diagnostic) => Err(diagnostic),
        };
        read_response(request.current_state, request.private, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_address(&ctx, request.prior_state.clone(), request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_address(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for IpAddressResource {
    /// Addresses on a VPC get their `vpc_id` so a later read keeps it
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut state = DynamicValue::object();
        set_string(&mut state, "id", &request.id);

        if let Ok(client) = client(&self.provider_data) {
            if let Ok(Some(ip)) = client.addresses().get(&request.id, None).await {
                if !ip.vpcid.is_empty() {
                    set_string(&mut state, "vpc_id", &ip.vpcid);
                }
            }
        }

        ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state,
                private: vec![],
            }],
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for IpAddressResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
