//! Load balancer rule resource implementation

use async_trait::async_trait;
use std::collections::BTreeSet;
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
use tfplug::validator::{NumberRange, StringOneOf};

use crate::api::load_balancer::{CreateLoadBalancerRuleRequest, UpdateLoadBalancerRuleRequest};
use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_i64, get_optional_string, get_string, get_strings, gone, has_change, id_attribute,
    project_attribute, read_back, read_response, set_i64, set_project, set_string, set_strings,
    update_response, OperationError, OperationResult,
};
use crate::retry::ignore_gone;

pub const ALGORITHMS: &[&str] = &["roundrobin", "leastconn", "source"];

/// Members to remove and to assign when going from `old` to `new`
fn member_changes(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();

    (
        old.difference(&new).map(|id| id.to_string()).collect(),
        new.difference(&old).map(|id| id.to_string()).collect(),
    )
}

fn port(state: &DynamicValue, name: &str) -> Result<u16, Diagnostic> {
    get_i64(state, name)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| Diagnostic::error("Invalid port", format!("{} must be between 1 and 65535", name)))
}

#[derive(Default)]
pub struct LoadBalancerRuleResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl LoadBalancerRuleResource {
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
            .map_err(|e| api_error("Error reading load balancer rule", e))?;

        let Some(rule) = client
            .load_balancer()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading load balancer rule {}", id), e))?
        else {
            return Ok(gone("Load balancer rule", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &rule.name);
        set_string(&mut state, "description", &rule.description);
        set_string(&mut state, "algorithm", &rule.algorithm);
        set_string(&mut state, "ip_address_id", &rule.publicipid);
        set_string(&mut state, "network_id", &rule.networkid);
        set_i64(&mut state, "private_port", rule.privateport.parse().ok());
        set_i64(&mut state, "public_port", rule.publicport.parse().ok());
        set_project(&mut state, &rule.project, &rule.projectid);

        let members = client
            .load_balancer()
            .list_members(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading members of load balancer rule {}", rule.name), e))?;
        set_strings(&mut state, "member_ids", members.into_iter().map(|m| m.id).collect());

        Ok(Some(state))
    }

    async fn create_rule(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating load balancer rule {}", name);

        let request = CreateLoadBalancerRuleRequest {
            description: Some(get_optional_string(&planned, "description").unwrap_or_else(|| name.clone())),
            name: name.clone(),
            algorithm: get_string(&planned, "algorithm"),
            privateport: port(&planned, "private_port")?,
            publicport: port(&planned, "public_port")?,
            publicipid: get_string(&planned, "ip_address_id"),
            networkid: get_optional_string(&planned, "network_id"),
            openfirewall: false,
        };

        let rule = client
            .load_balancer()
            .create(ctx, &request)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &rule.id);

        let members = get_strings(&state, "member_ids");
        if let Err(e) = client.load_balancer().assign(ctx, &rule.id, &members).await {
            return Err(OperationError::from(api_error(
                format!("Error assigning members to load balancer rule {}", name),
                e,
            ))
            .with_state(state));
        }

        let result = Self::read_state(client, state.clone()).await;
        read_back("Load balancer rule", state, result)
    }

    async fn update_rule(
        &self,
        ctx: &Context,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let summary = format!("Error updating load balancer rule {}", get_string(&prior, "name"));

        let mut request = UpdateLoadBalancerRuleRequest {
            id: id.clone(),
            ..Default::default()
        };
        let mut changed = false;

        if has_change(&prior, &planned, "name") {
            request.name = Some(get_string(&planned, "name"));
            changed = true;
        }
        if has_change(&prior, &planned, "description") {
            if let Some(description) = get_optional_string(&planned, "description") {
                request.description = Some(description);
                changed = true;
            }
        }
        if has_change(&prior, &planned, "algorithm") {
            request.algorithm = Some(get_string(&planned, "algorithm"));
            changed = true;
        }

        if changed {
            client
                .load_balancer()
                .update(ctx, &request)
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        if has_change(&prior, &planned, "member_ids") {
            let (remove, assign) = member_changes(
                &get_strings(&prior, "member_ids"),
                &get_strings(&planned, "member_ids"),
            );
            tracing::debug!(
                "Load balancer rule {}: removing {} and assigning {} members",
                id,
                remove.len(),
                assign.len()
            );

            client
                .load_balancer()
                .remove(ctx, &id, &remove)
                .await
                .map_err(|e| api_error(&summary, e))?;
            client
                .load_balancer()
                .assign(ctx, &id, &assign)
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("Load balancer rule", planned, result)
    }

    async fn delete_rule(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.load_balancer().delete(ctx, &id).await, &id).map_err(|e| {
            api_error(
                format!("Error deleting load balancer rule {}", get_string(&prior, "name")),
                e,
            )
        })
    }
}

fn port_attribute(name: &str, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .description(description)
        .required()
        .validator(NumberRange::create(Some(1.0), Some(65535.0)))
        .plan_modifier(RequiresReplace::create())
        .build()
}

#[async_trait]
impl Resource for LoadBalancerRuleResource {
    fn type_name(&self) -> &str {
        "cosmic_loadbalancer_rule"
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
            .description("Manages a load balancer rule on a public IP address")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the rule")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("The description, defaults to the name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(force_new("ip_address_id", "The public IP address to balance", true))
            .attribute(force_new("network_id", "The network the members live in", false))
            .attribute(
                AttributeBuilder::new("algorithm", AttributeType::String)
                    .description("One of roundrobin, leastconn or source")
                    .required()
                    .validator(StringOneOf::create(ALGORITHMS))
                    .build(),
            )
            .attribute(port_attribute("private_port", "The port traffic is sent to"))
            .attribute(port_attribute("public_port", "The port traffic is received on"))
            .attribute(
                AttributeBuilder::new("member_ids", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("The instances balanced by the rule")
                    .required()
                    .build(),
            )
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

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_rule(&ctx, request.planned_state).await)
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
            .update_rule(&ctx, request.prior_state.clone(), request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_rule(&ctx, request.prior_state).await)
    }
}

#[async_trait]
impl ResourceWithConfigure for LoadBalancerRuleResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
