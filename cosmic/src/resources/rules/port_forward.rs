//! Port forwards from a public IP address to instances
//!
//! Unlike the other rule sets every forward maps to exactly one remote rule,
//! whose ID is kept in the forward's `uuid`.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceMetadataRequest, ResourceMetadataResponse, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithModifyPlan, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRange, StringOneOf};

use super::rule_set::{managed_attribute, rule_errors};
use crate::api::port_forwarding::{CreatePortForwardingRuleRequest, PortForwardingRule};
use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_bool, get_string, gone, id_attribute, null_if_unknown, project_attribute, read_response,
    set_string, update_response, OperationError, OperationResult,
};
use crate::retry::ignore_gone;
use crate::rules::hash_string;

const FORWARD_PROTOCOLS: &[&str] = &["tcp", "udp"];

/// Forwards created or deleted at the same time
const PARALLELISM: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
struct Forward {
    protocol: String,
    private_port: u16,
    public_port: u16,
    virtual_machine_id: String,
    vm_guest_ip: Option<String>,
    uuid: Option<String>,
}

impl Forward {
    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        let fields = value.as_map()?;
        let text = |name: &str| {
            fields
                .get(name)
                .and_then(Dynamic::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let port = |name: &str| {
            fields
                .get(name)
                .and_then(Dynamic::as_number)
                .and_then(|n| u16::try_from(n as i64).ok())
        };

        Some(Self {
            protocol: text("protocol").unwrap_or_default(),
            private_port: port("private_port")?,
            public_port: port("public_port")?,
            virtual_machine_id: text("virtual_machine_id").unwrap_or_default(),
            vm_guest_ip: text("vm_guest_ip"),
            uuid: text("uuid"),
        })
    }

    fn to_dynamic(&self) -> Dynamic {
        let text = |value: &Option<String>| {
            value
                .as_ref()
                .map(|s| Dynamic::String(s.clone()))
                .unwrap_or(Dynamic::Null)
        };

        let mut fields = HashMap::new();
        fields.insert("protocol".to_string(), Dynamic::String(self.protocol.clone()));
        fields.insert("private_port".to_string(), Dynamic::Number(f64::from(self.private_port)));
        fields.insert("public_port".to_string(), Dynamic::Number(f64::from(self.public_port)));
        fields.insert(
            "virtual_machine_id".to_string(),
            Dynamic::String(self.virtual_machine_id.clone()),
        );
        fields.insert("vm_guest_ip".to_string(), text(&self.vm_guest_ip));
        fields.insert("uuid".to_string(), text(&self.uuid));
        Dynamic::Map(fields)
    }

    fn from_remote(rule: PortForwardingRule) -> Option<Self> {
        Some(Self {
            private_port: rule.privateport.parse().ok()?,
            public_port: rule.publicport.parse().ok()?,
            protocol: rule.protocol.to_lowercase(),
            virtual_machine_id: rule.virtualmachineid,
            vm_guest_ip: Some(rule.vmguestip).filter(|ip| !ip.is_empty()),
            uuid: Some(rule.id),
        })
    }

    fn identity(&self) -> u32 {
        hash_string(&format!(
            "{}|{}|{}|{}",
            self.protocol, self.private_port, self.public_port, self.virtual_machine_id
        ))
    }

    /// Same forward; a guest IP left to the control plane matches any
    fn matches(&self, other: &Forward) -> bool {
        self.identity() == other.identity()
            && match (&self.vm_guest_ip, &other.vm_guest_ip) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

fn get_forwards(state: &DynamicValue) -> Vec<Forward> {
    state
        .get_list(&AttributePath::new("forward"))
        .unwrap_or_default()
        .iter()
        .filter_map(Forward::from_dynamic)
        .collect()
}

fn set_forwards(state: &mut DynamicValue, forwards: &[Forward]) {
    state.set_attribute(
        "forward",
        Dynamic::List(forwards.iter().map(Forward::to_dynamic).collect()),
    );
}

#[derive(Debug, Default)]
struct ForwardDiff {
    keep: Vec<Forward>,
    delete: Vec<Forward>,
    create: Vec<Forward>,
}

/// Pairs every new forward with an unused matching old one
fn diff_forwards(old: &[Forward], new: &[Forward]) -> ForwardDiff {
    let mut unused: Vec<Option<&Forward>> = old.iter().map(Some).collect();
    let mut diff = ForwardDiff::default();

    for forward in new {
        let found = unused
            .iter_mut()
            .find(|slot| slot.is_some_and(|o| o.uuid.is_some() && o.matches(forward)))
            .and_then(Option::take);

        match found {
            Some(old) => diff.keep.push(Forward {
                vm_guest_ip: forward.vm_guest_ip.clone().or_else(|| old.vm_guest_ip.clone()),
                uuid: old.uuid.clone(),
                ..forward.clone()
            }),
            None => diff.create.push(Forward {
                uuid: None,
                ..forward.clone()
            }),
        }
    }

    diff.delete = unused.into_iter().flatten().cloned().collect();
    diff
}

async fn create_forwards(
    ctx: &Context,
    client: &Client,
    ip_address_id: &str,
    forwards: Vec<Forward>,
) -> (Vec<Forward>, Vec<String>) {
    let results: Vec<Result<Forward, String>> = stream::iter(forwards.into_iter().map(|forward| async move {
        let request = CreatePortForwardingRuleRequest {
            ipaddressid: ip_address_id.to_string(),
            protocol: forward.protocol.clone(),
            privateport: forward.private_port,
            publicport: forward.public_port,
            virtualmachineid: forward.virtual_machine_id.clone(),
            vmguestip: forward.vm_guest_ip.clone(),
            openfirewall: false,
        };

        match client.port_forwarding().create(ctx, &request).await {
            Ok(rule) => Ok(Forward {
                vm_guest_ip: Some(rule.vmguestip)
                    .filter(|ip| !ip.is_empty())
                    .or_else(|| forward.vm_guest_ip.clone()),
                uuid: Some(rule.id),
                ..forward
            }),
            Err(e) => Err(format!(
                "Error creating port forward {}/{} to {}: {}",
                forward.protocol, forward.public_port, forward.virtual_machine_id, e
            )),
        }
    }))
    .buffer_unordered(PARALLELISM)
    .collect()
    .await;

    let mut created = vec![];
    let mut errors = vec![];
    for result in results {
        match result {
            Ok(forward) => created.push(forward),
            Err(e) => errors.push(e),
        }
    }
    (created, errors)
}

/// Deletes `forwards`; the ones that could not be deleted are returned
async fn delete_forwards(
    ctx: &Context,
    client: &Client,
    forwards: Vec<Forward>,
) -> (Vec<Forward>, Vec<String>) {
    let results: Vec<Result<(), (Forward, String)>> = stream::iter(forwards.into_iter().map(|forward| async move {
        let Some(id) = forward.uuid.clone() else {
            return Ok(());
        };
        ignore_gone(client.port_forwarding().delete(ctx, &id).await, &id)
            .map_err(|e| (forward, format!("Error deleting port forward {}: {}", id, e)))
    }))
    .buffer_unordered(PARALLELISM)
    .collect()
    .await;

    let mut left = vec![];
    let mut errors = vec![];
    for result in results {
        if let Err((forward, e)) = result {
            left.push(forward);
            errors.push(e);
        }
    }
    (left, errors)
}

fn forward_block() -> NestedBlock {
    let port = |name: &str, description: &str| {
        AttributeBuilder::new(name, AttributeType::Number)
            .description(description)
            .required()
            .validator(NumberRange::create(Some(1.0), Some(65535.0)))
            .build()
    };

    NestedBlockBuilder::new("forward", NestingMode::Set)
        .description("A forward from a public port to an instance")
        .attribute(
            AttributeBuilder::new("protocol", AttributeType::String)
                .description("Either tcp or udp")
                .required()
                .validator(StringOneOf::create(FORWARD_PROTOCOLS))
                .build(),
        )
        .attribute(port("private_port", "The port on the instance"))
        .attribute(port("public_port", "The port on the public IP address"))
        .attribute(
            AttributeBuilder::new("virtual_machine_id", AttributeType::String)
                .description("The instance to forward to")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("vm_guest_ip", AttributeType::String)
                .description("The guest IP of the instance, defaults to its primary IP")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("uuid", AttributeType::String)
                .description("The ID of the remote forwarding rule")
                .computed()
                .build(),
        )
        .build()
}

#[derive(Default)]
pub struct PortForwardResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl PortForwardResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let ip_address_id = get_string(&state, "ip_address_id");
        let managed = get_bool(&state, "managed");
        let project = project_id(client, &state)
            .await
            .map_err(|e| api_error("Error reading port forwards", e))?;

        let mut remote: HashMap<String, PortForwardingRule> = client
            .port_forwarding()
            .list(&ip_address_id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading port forwards of {}", ip_address_id), e))?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut forwards: Vec<Forward> = get_forwards(&state)
            .into_iter()
            .filter_map(|forward| {
                let id = forward.uuid.as_ref()?;
                remote.remove(id).and_then(Forward::from_remote)
            })
            .collect();

        if managed {
            let mut adopted: Vec<PortForwardingRule> = remote.into_values().collect();
            adopted.sort_by(|a, b| a.id.cmp(&b.id));
            forwards.extend(adopted.into_iter().filter_map(Forward::from_remote));
        }

        if forwards.is_empty() && !managed {
            return Ok(gone("Port forward", &get_string(&state, "id")));
        }

        set_forwards(&mut state, &forwards);
        Ok(Some(state))
    }

    async fn create_forward_set(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let ip_address_id = get_string(&planned, "ip_address_id");

        let (created, errors) =
            create_forwards(ctx, client, &ip_address_id, get_forwards(&planned)).await;

        let mut state = planned;
        set_string(&mut state, "id", &ip_address_id);
        null_if_unknown(&mut state, "project");
        set_forwards(&mut state, &created);

        match rule_errors("Error creating port forwards", &errors) {
            Some(diagnostic) if created.is_empty() => Err(diagnostic.into()),
            Some(diagnostic) => Err(OperationError::from(diagnostic).with_state(state)),
            None => Ok(state),
        }
    }

    async fn update_forward_set(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let ip_address_id = get_string(prior, "ip_address_id");
        let diff = diff_forwards(&get_forwards(prior), &get_forwards(&planned));
        tracing::debug!(
            "Port forwards of {}: keeping {}, deleting {}, creating {}",
            ip_address_id,
            diff.keep.len(),
            diff.delete.len(),
            diff.create.len()
        );

        let (mut forwards, mut errors) = delete_forwards(ctx, client, diff.delete).await;
        let (created, create_errors) =
            create_forwards(ctx, client, &ip_address_id, diff.create).await;
        forwards.extend(diff.keep);
        forwards.extend(created);
        errors.extend(create_errors);

        let mut state = planned;
        set_forwards(&mut state, &forwards);

        match rule_errors("Error updating port forwards", &errors) {
            Some(diagnostic) => Err(OperationError::from(diagnostic).with_state(state)),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl Resource for PortForwardResource {
    fn type_name(&self) -> &str {
        "cosmic_port_forward"
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
            .description("Manages the port forwards of a public IP address")
            .attribute(id_attribute())
            .attribute(force_new("ip_address_id", "The public IP address to forward from", true))
            .attribute(managed_attribute())
            .attribute(project_attribute())
            .block(forward_block())
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
        create_response(self.create_forward_set(&ctx, request.planned_state).await)
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
            .update_forward_set(&ctx, &request.prior_state, request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => {
                let (_, errors) =
                    delete_forwards(&ctx, client, get_forwards(&request.prior_state)).await;
                match rule_errors("Error deleting port forwards", &errors) {
                    Some(diagnostic) => Err(diagnostic),
                    None => Ok(()),
                }
            }
            Err(diagnostic) => Err(diagnostic),
        };
        delete_response(result)
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }
}

/// Whether a planned forward is known apart from what the control plane fills in
fn known_except_computed(item: &Dynamic) -> bool {
    item.as_map().is_some_and(|fields| {
        fields
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "uuid" | "vm_guest_ip"))
            .all(|(_, v)| v.is_fully_known())
    })
}

#[async_trait]
impl ResourceWithModifyPlan for PortForwardResource {
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut planned_state = request.proposed_new_state;
        let prior = get_forwards(&request.prior_state);
        let path = AttributePath::new("forward");

        if let (false, Ok(items)) = (prior.is_empty(), planned_state.get_list(&path)) {
            let mut unused: Vec<Option<&Forward>> = prior.iter().map(Some).collect();
            let items = items
                .into_iter()
                .map(|item| {
                    if !known_except_computed(&item) {
                        return item;
                    }
                    let Some(forward) = Forward::from_dynamic(&item) else {
                        return item;
                    };
                    let found = unused
                        .iter_mut()
                        .find(|slot| slot.is_some_and(|o| o.matches(&forward)))
                        .and_then(Option::take);
                    match found {
                        Some(old) => Forward {
                            vm_guest_ip: forward.vm_guest_ip.clone().or_else(|| old.vm_guest_ip.clone()),
                            uuid: old.uuid.clone(),
                            ..forward
                        }
                        .to_dynamic(),
                        None => item,
                    }
                })
                .collect();
            planned_state.set_attribute("forward", Dynamic::List(items));
        }

        ModifyPlanResponse {
            planned_state,
            requires_replace: vec![],
            planned_private: request.prior_private,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for PortForwardResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
#[path = "./port_forward_test.rs"]
mod port_forward_test;
