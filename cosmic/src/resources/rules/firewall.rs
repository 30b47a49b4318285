//! Ingress firewall rules of a public IP address

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceMetadataRequest, ResourceMetadataResponse, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithModifyPlan, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::SchemaBuilder;
use tfplug::types::DynamicValue;

use super::rule_set::{
    create_rule_set, delete_rule_set, managed_attribute, parallelism_attribute, plan_uuids,
    read_rule_set, rule_block, update_rule_set, validate_rules, RemoteRule, RuleTarget,
};
use crate::api::firewall::{CreateFirewallRuleRequest, FirewallRule};
use crate::api::{ApiError, Client};
use crate::resources::{
    client, configure_resource, create_response, delete_response, force_new, get_string,
    id_attribute, read_response, update_response, OperationResult,
};
use crate::rules::{split_cidr_list, PortRange, Rule};

/// Maps a listed firewall rule, ingress or egress
pub(super) fn remote_rule(rule: FirewallRule) -> RemoteRule {
    RemoteRule {
        ports: PortRange::from_remote(rule.startport, rule.endport),
        cidr_list: split_cidr_list(&rule.cidrlist),
        id: rule.id,
        protocol: rule.protocol,
        icmp_type: rule.icmptype,
        icmp_code: rule.icmpcode,
        action: None,
        traffic_type: None,
    }
}

/// Request shared by ingress and egress rules; ICMP fields only go out for icmp
pub(super) fn firewall_request(rule: &Rule, ports: Option<PortRange>) -> CreateFirewallRuleRequest {
    let icmp = rule.protocol == "icmp";
    CreateFirewallRuleRequest {
        protocol: rule.protocol.clone(),
        cidrlist: rule.cidr_list.clone(),
        startport: ports.map(|p| p.start),
        endport: ports.map(|p| p.end),
        icmptype: rule.icmp_type.filter(|_| icmp),
        icmpcode: rule.icmp_code.filter(|_| icmp),
        ..Default::default()
    }
}

struct IpAddressFirewall {
    ip_address_id: String,
}

#[async_trait]
impl RuleTarget for IpAddressFirewall {
    async fn list(&self, client: &Client) -> Result<Vec<RemoteRule>, ApiError> {
        let rules = client.firewall().list_rules(&self.ip_address_id).await?;
        Ok(rules.into_iter().map(remote_rule).collect())
    }

    async fn create(
        &self,
        ctx: &Context,
        client: &Client,
        rule: &Rule,
        ports: Option<PortRange>,
    ) -> Result<String, ApiError> {
        let request = CreateFirewallRuleRequest {
            ipaddressid: Some(self.ip_address_id.clone()),
            ..firewall_request(rule, ports)
        };
        Ok(client.firewall().create_rule(ctx, &request).await?.id)
    }

    async fn delete(&self, ctx: &Context, client: &Client, id: &str) -> Result<(), ApiError> {
        client.firewall().delete_rule(ctx, id).await
    }
}

fn target(state: &DynamicValue) -> IpAddressFirewall {
    IpAddressFirewall {
        ip_address_id: get_string(state, "ip_address_id"),
    }
}

#[derive(Default)]
pub struct FirewallResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl FirewallResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_firewall(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let target = target(&planned);
        create_rule_set(ctx, client, &target, &target.ip_address_id, planned).await
    }
}

#[async_trait]
impl Resource for FirewallResource {
    fn type_name(&self) -> &str {
        "cosmic_firewall"
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
            .description("Manages the ingress firewall rules of a public IP address")
            .attribute(id_attribute())
            .attribute(force_new("ip_address_id", "The public IP address the rules apply to", true))
            .attribute(managed_attribute())
            .attribute(parallelism_attribute())
            .block(rule_block(false))
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
            diagnostics: validate_rules(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_firewall(&ctx, request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let target = target(&request.current_state);
                read_rule_set(client, &target, "Firewall", request.current_state.clone()).await
            }
            Err(diagnostic) => Err(diagnostic),
        };
        read_response(request.current_state, request.private, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let target = target(&request.prior_state);
                update_rule_set(&ctx, client, &target, &request.prior_state, request.planned_state)
                    .await
            }
            Err(diagnostic) => Err(diagnostic.into()),
        };
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let target = target(&request.prior_state);
                delete_rule_set(&ctx, client, &target, request.prior_state).await
            }
            Err(diagnostic) => Err(diagnostic),
        };
        delete_response(result)
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithModifyPlan for FirewallResource {
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut planned_state = request.proposed_new_state;
        plan_uuids(&request.prior_state, &mut planned_state);

        ModifyPlanResponse {
            planned_state,
            requires_replace: vec![],
            planned_private: request.prior_private,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for FirewallResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
#[path = "./firewall_test.rs"]
mod firewall_test;
