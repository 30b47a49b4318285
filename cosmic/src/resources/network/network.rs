//! Network (and VPC tier) resource implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, RequiresReplaceIf};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, PlanModifierRequest, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::networks::{CreateNetworkRequest, UpdateNetworkRequest};
use crate::api::Client;
use crate::resolve::{project_id, retrieve_id, set_value_or_id};
use crate::resources::network::ipaddress::NO_ACL;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_optional_string,
    get_string, get_tags, gone, has_change, id_attribute, import_by_id, null_if_unknown,
    project_attribute, read_back, read_response, set_optional_string, set_project, set_string, set_tags,
    tags_attribute, update_response, zone_attribute, OperationError, OperationResult,
};
use crate::retry::ignore_gone;
use crate::rules::parse_cidr;
use crate::tags::reconcile_tags;

const RESOURCE_TYPE: &str = "Network";

/// IP settings createNetwork needs, derived from the CIDR unless configured
#[derive(Debug, PartialEq)]
pub struct Addressing {
    pub gateway: String,
    pub netmask: String,
    pub startip: Option<String>,
    pub endip: Option<String>,
}

impl Addressing {
    /// The gateway defaults to the first host address. Isolated networks
    /// also get an IP range from the second host up to the last one before
    /// broadcast; VPC tiers leave the range to the VPC router.
    pub fn derive(
        cidr: &str,
        gateway: Option<String>,
        startip: Option<String>,
        endip: Option<String>,
        specify_ip_range: bool,
    ) -> Result<Self, String> {
        let (addr, prefix) = parse_cidr(cidr).map_err(|e| e.to_string())?;
        let IpAddr::V4(addr) = addr else {
            return Err(format!("{} is not an IPv4 CIDR", cidr));
        };

        let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
        let network = u32::from(addr) & mask;
        let broadcast = network | !mask;
        let host = |n: u32| Ipv4Addr::from(n).to_string();

        let range = |configured: Option<String>, derived: u32| {
            configured.or_else(|| specify_ip_range.then(|| host(derived)))
        };

        Ok(Self {
            gateway: gateway.unwrap_or_else(|| host(network.wrapping_add(1))),
            netmask: Ipv4Addr::from(mask).to_string(),
            startip: range(startip, network.wrapping_add(2)),
            endip: range(endip, broadcast.wrapping_sub(1)),
        })
    }
}

/// An ACL list can be swapped in place but not removed
fn returning_to_no_acl(request: &PlanModifierRequest) -> bool {
    matches!(&request.plan_value.value, Dynamic::String(planned) if planned == NO_ACL)
}

#[derive(Default)]
pub struct NetworkResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl NetworkResource {
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
            .map_err(|e| api_error("Error reading network", e))?;

        let Some(network) = client
            .networks()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading network {}", id), e))?
        else {
            return Ok(gone("Network", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &network.name);
        set_string(&mut state, "display_text", &network.displaytext);
        set_string(&mut state, "cidr", &network.cidr);
        set_string(&mut state, "gateway", &network.gateway);
        set_optional_string(&mut state, "network_domain", &network.networkdomain);
        set_optional_string(&mut state, "vlan", &network.vlan);
        set_optional_string(&mut state, "vpc_id", &network.vpcid);
        let acl_id = if network.aclid.is_empty() { NO_ACL } else { network.aclid.as_str() };
        set_string(&mut state, "acl_id", acl_id);
        set_value_or_id(
            &mut state,
            "network_offering",
            &network.networkofferingname,
            &network.networkofferingid,
        );
        set_value_or_id(&mut state, "zone", &network.zonename, &network.zoneid);
        set_project(&mut state, &network.project, &network.projectid);
        set_tags(&mut state, &network.tags);

        null_if_unknown(&mut state, "startip");
        null_if_unknown(&mut state, "endip");

        Ok(Some(state))
    }

    async fn create_network(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating network {}", name);

        let networkofferingid =
            retrieve_id(client, "network_offering", &get_string(&planned, "network_offering"))
                .await
                .map_err(|e| api_error(&summary, e))?;
        let zoneid = retrieve_id(client, "zone", &get_string(&planned, "zone"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let projectid = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let vpcid = get_optional_string(&planned, "vpc_id");
        let addressing = Addressing::derive(
            &get_string(&planned, "cidr"),
            get_optional_string(&planned, "gateway"),
            get_optional_string(&planned, "startip"),
            get_optional_string(&planned, "endip"),
            vpcid.is_none(),
        )
        .map_err(|e| Diagnostic::error(summary.clone(), e))?;

        let aclid = vpcid
            .as_ref()
            .and(get_optional_string(&planned, "acl_id"))
            .filter(|acl| acl != NO_ACL);

        let request = CreateNetworkRequest {
            displaytext: get_optional_string(&planned, "display_text").unwrap_or_else(|| name.clone()),
            name: name.clone(),
            networkofferingid,
            zoneid,
            gateway: addressing.gateway.clone(),
            netmask: addressing.netmask.clone(),
            startip: addressing.startip.clone(),
            endip: addressing.endip.clone(),
            networkdomain: get_optional_string(&planned, "network_domain"),
            vlan: get_optional_string(&planned, "vlan"),
            vpcid,
            aclid,
            projectid,
        };

        let network = client
            .networks()
            .create(&request)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &network.id);
        set_optional_string(&mut state, "startip", addressing.startip.as_deref().unwrap_or_default());
        set_optional_string(&mut state, "endip", addressing.endip.as_deref().unwrap_or_default());

        let tags = get_tags(&state);
        if let Err(e) =
            reconcile_tags(ctx, client, &network.id, RESOURCE_TYPE, &HashMap::new(), &tags).await
        {
            return Err(
                OperationError::from(api_error(format!("Error setting tags on network {}", name), e))
                    .with_state(state),
            );
        }

        let result = Self::read_state(client, state.clone()).await;
        read_back("Network", state, result)
    }

    async fn update_network(
        &self,
        ctx: &Context,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let summary = format!("Error updating network {}", get_string(&prior, "name"));

        let mut request = UpdateNetworkRequest {
            id: id.clone(),
            ..Default::default()
        };
        let mut changed = false;

        if has_change(&prior, &planned, "name") {
            request.name = Some(get_string(&planned, "name"));
            changed = true;
        }
        if has_change(&prior, &planned, "display_text") {
            if let Some(display_text) = get_optional_string(&planned, "display_text") {
                request.displaytext = Some(display_text);
                changed = true;
            }
        }
        if has_change(&prior, &planned, "network_offering") {
            let offering =
                retrieve_id(client, "network_offering", &get_string(&planned, "network_offering"))
                    .await
                    .map_err(|e| api_error(&summary, e))?;
            request.networkofferingid = Some(offering);
            changed = true;
        }

        if changed {
            client
                .networks()
                .update(ctx, &request)
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        if has_change(&prior, &planned, "acl_id") {
            let acl_id = get_string(&planned, "acl_id");
            client
                .network_acls()
                .replace_for_network(ctx, &acl_id, &id)
                .await
                .map_err(|e| api_error("Error replacing ACL", e))?;
        }

        if has_change(&prior, &planned, "tags") {
            reconcile_tags(ctx, client, &id, RESOURCE_TYPE, &get_tags(&prior), &get_tags(&planned))
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("Network", planned, result)
    }

    async fn delete_network(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.networks().delete(ctx, &id).await, &id).map_err(|e| {
            api_error(format!("Error deleting network {}", get_string(&prior, "name")), e)
        })
    }
}

fn optional_force_new(name: &str, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .computed()
        .plan_modifier(RequiresReplace::create())
        .build()
}

#[async_trait]
impl Resource for NetworkResource {
    fn type_name(&self) -> &str {
        "cosmic_network"
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
            .description("Manages an isolated network or a VPC tier")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the network")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_text", AttributeType::String)
                    .description("The display text of the network, defaults to the name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr", AttributeType::String)
                    .description("The CIDR block of the network")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(optional_force_new("gateway", "The gateway, defaults to the first host address"))
            .attribute(optional_force_new("startip", "The first address handed out"))
            .attribute(optional_force_new("endip", "The last address handed out"))
            .attribute(optional_force_new("network_domain", "The DNS domain of the network"))
            .attribute(
                AttributeBuilder::new("network_offering", AttributeType::String)
                    .description("The name or ID of the network offering")
                    .required()
                    .build(),
            )
            .attribute(optional_force_new("vlan", "The VLAN of the network"))
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("The VPC the network is a tier of")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("acl_id", AttributeType::String)
                    .description("The ACL list applied to a VPC tier")
                    .optional()
                    .default(StaticDefault::string(NO_ACL))
                    .plan_modifier(RequiresReplaceIf::create(
                        returning_to_no_acl,
                        "removing the ACL of a VPC tier forces a new resource",
                    ))
                    .build(),
            )
            .attribute(project_attribute())
            .attribute(zone_attribute())
            .attribute(tags_attribute())
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
        let mut diagnostics = vec![];

        if let Ok(cidr) = request.config.get_string(&AttributePath::new("cidr")) {
            if let Err(e) = parse_cidr(&cidr) {
                diagnostics.push(
                    Diagnostic::error("Invalid CIDR", e.to_string())
                        .with_attribute(AttributePath::new("cidr")),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_network(&ctx, request.planned_state).await)
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
            .update_network(&ctx, request.prior_state.clone(), request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_network(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for NetworkResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
#[path = "./network_test.rs"]
mod network_test;
