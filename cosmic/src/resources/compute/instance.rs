//! Instance (virtual machine) resource implementation

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
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
use tfplug::schema::{
    AttributeBuilder, AttributeType, PlanModifier, PlanModifierRequest, PlanModifierResponse,
    SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::virtual_machines::{DeployVirtualMachineRequest, UpdateVirtualMachineRequest};
use crate::api::Client;
use crate::resolve::{project_id, retrieve_id, retrieve_template_id, set_value_or_id};
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_bool, get_i64,
    get_optional_string, get_string, get_strings, get_tags, gone, has_change, id_attribute,
    import_by_id, null_if_unknown, project_attribute, read_back, read_response,
    set_optional_string, set_project, set_string, set_strings, set_tags, tags_attribute,
    update_response, zone_attribute, OperationError, OperationResult,
};
use crate::retry::ignore_gone;
use crate::tags::reconcile_tags;

const RESOURCE_TYPE: &str = "UserVm";

/// User data is kept in state as the hex SHA-1 of what was configured
pub(crate) fn user_data_hash(user_data: &str) -> String {
    hex::encode(Sha1::digest(user_data.as_bytes()))
}

/// Plans the hash of the configured user data instead of the raw value
struct HashUserData;

impl PlanModifier for HashUserData {
    fn description(&self) -> String {
        "stores the SHA-1 of the configured user data".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match &request.config_value.value {
            Dynamic::String(raw) => DynamicValue::new(Dynamic::String(user_data_hash(raw))),
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

fn string_set(name: &str, description: &str) -> AttributeBuilder {
    AttributeBuilder::new(name, AttributeType::Set(Box::new(AttributeType::String)))
        .description(description)
        .optional()
}

fn is_set(config: &DynamicValue, name: &str) -> bool {
    !matches!(config.get(&AttributePath::new(name)), None | Some(Dynamic::Null))
}

/// A key pair can be reset but never taken off a running instance
fn removing_keypair(request: &PlanModifierRequest) -> bool {
    request.plan_value.value.is_null() && !request.state_value.value.is_null()
}

#[derive(Default)]
pub struct InstanceResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl InstanceResource {
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
            .map_err(|e| api_error("Error reading instance", e))?;

        let Some(vm) = client
            .virtual_machines()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading instance {}", id), e))?
        else {
            return Ok(gone("Instance", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &vm.name);
        set_string(&mut state, "display_name", &vm.displayname);
        set_string(&mut state, "group", &vm.group);
        set_optional_string(&mut state, "keypair", &vm.keypair);

        if let Some(nic) = vm.default_nic() {
            set_string(&mut state, "network_id", &nic.networkid);
            set_string(&mut state, "ip_address", &nic.ipaddress);
        }

        if is_set(&state, "affinity_group_ids") {
            set_strings(&mut state, "affinity_group_ids", vm.affinitygroup.iter().map(|g| g.id.clone()).collect());
        }
        if is_set(&state, "affinity_group_names") {
            set_strings(&mut state, "affinity_group_names", vm.affinitygroup.iter().map(|g| g.name.clone()).collect());
        }
        if is_set(&state, "security_group_ids") {
            set_strings(&mut state, "security_group_ids", vm.securitygroup.iter().map(|g| g.id.clone()).collect());
        }
        if is_set(&state, "security_group_names") {
            set_strings(&mut state, "security_group_names", vm.securitygroup.iter().map(|g| g.name.clone()).collect());
        }

        set_value_or_id(
            &mut state,
            "service_offering",
            &vm.serviceofferingname,
            &vm.serviceofferingid,
        );
        set_value_or_id(&mut state, "template", &vm.templatename, &vm.templateid);
        set_value_or_id(&mut state, "zone", &vm.zonename, &vm.zoneid);
        set_project(&mut state, &vm.project, &vm.projectid);
        set_tags(&mut state, &vm.tags);

        for name in ["network_id", "ip_address", "root_disk_size", "user_data"] {
            null_if_unknown(&mut state, name);
        }

        Ok(Some(state))
    }

    async fn create_instance(
        &self,
        ctx: &Context,
        planned: DynamicValue,
        config: &DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating instance {}", name);

        let serviceofferingid =
            retrieve_id(client, "service_offering", &get_string(&planned, "service_offering"))
                .await
                .map_err(|e| api_error(&summary, e))?;
        let zoneid = retrieve_id(client, "zone", &get_string(&planned, "zone"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let templateid = retrieve_template_id(client, &zoneid, &get_string(&planned, "template"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let projectid = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let request = DeployVirtualMachineRequest {
            serviceofferingid,
            templateid,
            zoneid,
            name: name.clone(),
            displayname: Some(
                get_optional_string(&planned, "display_name").unwrap_or_else(|| name.clone()),
            ),
            networkids: get_optional_string(&planned, "network_id"),
            ipaddress: get_optional_string(&planned, "ip_address"),
            rootdisksize: get_i64(&planned, "root_disk_size"),
            group: get_optional_string(&planned, "group"),
            affinitygroupids: get_strings(&planned, "affinity_group_ids"),
            affinitygroupnames: get_strings(&planned, "affinity_group_names"),
            securitygroupids: get_strings(&planned, "security_group_ids"),
            securitygroupnames: get_strings(&planned, "security_group_names"),
            keypair: get_optional_string(&planned, "keypair"),
            userdata: get_optional_string(config, "user_data").map(|raw| STANDARD.encode(raw)),
            projectid,
        };

        let vm = client
            .virtual_machines()
            .deploy(ctx, &request)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &vm.id);

        let tags = get_tags(&state);
        if let Err(e) = reconcile_tags(ctx, client, &vm.id, RESOURCE_TYPE, &HashMap::new(), &tags).await {
            return Err(OperationError::from(api_error(format!("Error setting tags on instance {}", name), e))
                .with_state(state));
        }

        let result = Self::read_state(client, state.clone()).await;
        read_back("Instance", state, result)
    }

    async fn update_instance(
        &self,
        ctx: &Context,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let name = get_string(&planned, "name");
        let summary = format!("Error updating instance {}", name);
        let vms = client.virtual_machines();

        let renamed = has_change(&prior, &planned, "name");
        let relabeled = has_change(&prior, &planned, "display_name");
        let regrouped = has_change(&prior, &planned, "group");
        if renamed || relabeled || regrouped {
            let request = UpdateVirtualMachineRequest {
                id: id.clone(),
                name: renamed.then(|| name.clone()),
                displayname: relabeled.then(|| get_string(&planned, "display_name")),
                group: regrouped.then(|| get_string(&planned, "group")),
            };
            vms.update(&request).await.map_err(|e| api_error(&summary, e))?;
        }

        let offering_changed = has_change(&prior, &planned, "service_offering");
        let affinity_changed = has_change(&prior, &planned, "affinity_group_ids")
            || has_change(&prior, &planned, "affinity_group_names");
        let keypair_changed = has_change(&prior, &planned, "keypair")
            && get_optional_string(&planned, "keypair").is_some();

        if offering_changed || affinity_changed || keypair_changed {
            tracing::info!("Stopping instance {} to apply changes", name);
            vms.stop(ctx, &id).await.map_err(|e| api_error(&summary, e))?;

            if offering_changed {
                let offering = retrieve_id(client, "service_offering", &get_string(&planned, "service_offering"))
                    .await
                    .map_err(|e| api_error(&summary, e))?;
                vms.change_service_offering(&id, &offering)
                    .await
                    .map_err(|e| api_error(&summary, e))?;
            }

            if affinity_changed {
                vms.update_affinity_groups(
                    ctx,
                    &id,
                    &get_strings(&planned, "affinity_group_ids"),
                    &get_strings(&planned, "affinity_group_names"),
                )
                .await
                .map_err(|e| api_error(&summary, e))?;
            }

            if keypair_changed {
                let project = project_id(client, &planned)
                    .await
                    .map_err(|e| api_error(&summary, e))?;
                vms.reset_ssh_key(ctx, &id, &get_string(&planned, "keypair"), project.as_deref())
                    .await
                    .map_err(|e| api_error(&summary, e))?;
            }

            vms.start(ctx, &id).await.map_err(|e| api_error(&summary, e))?;
        }

        if has_change(&prior, &planned, "tags") {
            reconcile_tags(ctx, client, &id, RESOURCE_TYPE, &get_tags(&prior), &get_tags(&planned))
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("Instance", planned, result)
    }

    async fn delete_instance(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        tracing::debug!("Destroying instance {}", get_string(&prior, "name"));
        let result = client
            .virtual_machines()
            .destroy(ctx, &id, get_bool(&prior, "expunge"))
            .await;

        ignore_gone(result, &id).map_err(|e| {
            api_error(format!("Error destroying instance {}", get_string(&prior, "name")), e)
        })
    }
}

#[async_trait]
impl Resource for InstanceResource {
    fn type_name(&self) -> &str {
        "cosmic_instance"
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
            .description("Manages a virtual machine instance")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the instance")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .description("The display name of the instance, defaults to the name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("service_offering", AttributeType::String)
                    .description("The name or ID of the service offering")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_id", AttributeType::String)
                    .description("The ID of the network to deploy the instance in")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ip_address", AttributeType::String)
                    .description("The IP address of the default NIC")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("template", AttributeType::String)
                    .description("The name or ID of the template")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("root_disk_size", AttributeType::Number)
                    .description("The size of the root disk in GiB")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("group", AttributeType::String)
                    .description("The group of the instance")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(string_set("affinity_group_ids", "IDs of the affinity groups").build())
            .attribute(string_set("affinity_group_names", "Names of the affinity groups").build())
            .attribute(
                string_set("security_group_ids", "IDs of the security groups")
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                string_set("security_group_names", "Names of the security groups")
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("keypair", AttributeType::String)
                    .description("The name of the SSH key pair")
                    .optional()
                    .plan_modifier(RequiresReplaceIf::create(
                        removing_keypair,
                        "removing the key pair of an instance forces a new resource",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_data", AttributeType::String)
                    .description("User data passed to the instance; state keeps its SHA-1")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(HashUserData))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("expunge", AttributeType::Bool)
                    .description("Expunge the instance when it is destroyed")
                    .optional()
                    .default(StaticDefault::bool(false))
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

        for (ids, names) in [
            ("affinity_group_ids", "affinity_group_names"),
            ("security_group_ids", "security_group_names"),
        ] {
            if is_set(&request.config, ids) && is_set(&request.config, names) {
                diagnostics.push(
                    Diagnostic::error(
                        "Conflicting configuration",
                        format!("'{}' conflicts with '{}'", ids, names),
                    )
                    .with_attribute(AttributePath::new(names)),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(
            self.create_instance(&ctx, request.planned_state, &request.config)
                .await,
        )
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => Self::read_state(client, request.current_state.clone()).await,
            Err(diagnostic) => Err(diagnostic),
        };
        read_response(request.current_state, request.private, result)
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let prior = request.prior_state.clone();
        update_response(
            request.prior_state,
            self.update_instance(&ctx, prior, request.planned_state).await,
        )
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_instance(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for InstanceResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for InstanceResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
#[path = "./instance_test.rs"]
mod instance_test;
