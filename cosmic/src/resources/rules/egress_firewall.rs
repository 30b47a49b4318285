//! Egress firewall rules of an isolated network

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

use super::firewall::{firewall_request, remote_rule};
use super::rule_set::{
    create_rule_set, delete_rule_set, managed_attribute, parallelism_attribute, plan_uuids,
    read_rule_set, rule_block, update_rule_set, validate_rules, RemoteRule, RuleTarget,
};
use crate::api::firewall::CreateFirewallRuleRequest;
use crate::api::{ApiError, Client};
use crate::resources::{
    client, configure_resource, create_response, delete_response, force_new, get_string,
    id_attribute, read_response, update_response,
};
use crate::rules::{PortRange, Rule};

struct NetworkEgress {
    network_id: String,
}

#[async_trait]
impl RuleTarget for NetworkEgress {
    async fn list(&self, client: &Client) -> Result<Vec<RemoteRule>, ApiError> {
        let rules = client.firewall().list_egress_rules(&self.network_id).await?;
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
            networkid: Some(self.network_id.clone()),
            ..firewall_request(rule, ports)
        };
        Ok(client.firewall().create_egress_rule(ctx, &request).await?.id)
    }

    async fn delete(&self, ctx: &Context, client: &Client, id: &str) -> Result<(), ApiError> {
        client.firewall().delete_egress_rule(ctx, id).await
    }
}

fn target(state: &DynamicValue) -> NetworkEgress {
    NetworkEgress {
        network_id: get_string(state, "network_id"),
    }
}

#[derive(Default)]
pub struct EgressFirewallResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl EgressFirewallResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for EgressFirewallResource {
    fn type_name(&self) -> &str {
        "cosmic_egress_firewall"
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
            .description("Manages the egress firewall rules of a network")
            .attribute(id_attribute())
            .attribute(force_new("network_id", "The network the rules apply to", true))
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
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let target = target(&request.planned_state);
                create_rule_set(&ctx, client, &target, &target.network_id, request.planned_state)
                    .await
            }
            Err(diagnostic) => Err(diagnostic.into()),
        };
        create_response(result)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let target = target(&request.current_state);
                read_rule_set(client, &target, "Egress firewall", request.current_state.clone())
                    .await
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
impl ResourceWithModifyPlan for EgressFirewallResource {
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
impl ResourceWithConfigure for EgressFirewallResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
