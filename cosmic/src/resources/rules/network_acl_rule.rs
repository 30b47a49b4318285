//! Rules of a VPC network ACL list

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
use crate::api::network_acls::{CreateNetworkAclRuleRequest, NetworkAclRule};
use crate::api::{ApiError, Client};
use crate::resources::{
    client, configure_resource, create_response, delete_response, force_new, get_string,
    id_attribute, null_if_unknown, project_attribute, read_response, update_response,
    OperationResult,
};
use crate::rules::{split_cidr_list, PortRange, Rule};

fn remote_rule(rule: NetworkAclRule) -> RemoteRule {
    RemoteRule {
        ports: PortRange::from_remote(rule.startport, rule.endport),
        cidr_list: split_cidr_list(&rule.cidrlist),
        id: rule.id,
        protocol: rule.protocol,
        icmp_type: rule.icmptype,
        icmp_code: rule.icmpcode,
        action: Some(rule.action),
        traffic_type: Some(rule.traffictype),
    }
}

struct AclList {
    acl_id: String,
}

#[async_trait]
impl RuleTarget for AclList {
    async fn list(&self, client: &Client) -> Result<Vec<RemoteRule>, ApiError> {
        let rules = client.network_acls().list_rules(&self.acl_id).await?;
        Ok(rules.into_iter().map(remote_rule).collect())
    }

    async fn create(
        &self,
        ctx: &Context,
        client: &Client,
        rule: &Rule,
        ports: Option<PortRange>,
    ) -> Result<String, ApiError> {
        let icmp = rule.protocol == "icmp";
        let request = CreateNetworkAclRuleRequest {
            aclid: self.acl_id.clone(),
            protocol: rule.protocol.clone(),
            cidrlist: rule.cidr_list.clone(),
            action: rule.action.clone().unwrap_or_else(|| "allow".to_string()),
            traffictype: rule
                .traffic_type
                .clone()
                .unwrap_or_else(|| "ingress".to_string()),
            startport: ports.map(|p| p.start),
            endport: ports.map(|p| p.end),
            icmptype: rule.icmp_type.filter(|_| icmp),
            icmpcode: rule.icmp_code.filter(|_| icmp),
        };
        Ok(client.network_acls().create_rule(ctx, &request).await?.id)
    }

    async fn delete(&self, ctx: &Context, client: &Client, id: &str) -> Result<(), ApiError> {
        client.network_acls().delete_rule(ctx, id).await
    }
}

fn target(state: &DynamicValue) -> AclList {
    AclList {
        acl_id: get_string(state, "acl_id"),
    }
}

#[derive(Default)]
pub struct NetworkAclRuleResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl NetworkAclRuleResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_rules(&self, ctx: &Context, mut planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        null_if_unknown(&mut planned, "project");

        let target = target(&planned);
        create_rule_set(ctx, client, &target, &target.acl_id, planned).await
    }
}

#[async_trait]
impl Resource for NetworkAclRuleResource {
    fn type_name(&self) -> &str {
        "cosmic_network_acl_rule"
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
            .description("Manages the rules of a network ACL list")
            .attribute(id_attribute())
            .attribute(force_new("acl_id", "The ACL list the rules belong to", true))
            .attribute(managed_attribute())
            .attribute(project_attribute())
            .attribute(parallelism_attribute())
            .block(rule_block(true))
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
        create_response(self.create_rules(&ctx, request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let target = target(&request.current_state);
                read_rule_set(client, &target, "Network ACL", request.current_state.clone()).await
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
impl ResourceWithModifyPlan for NetworkAclRuleResource {
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
impl ResourceWithConfigure for NetworkAclRuleResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
