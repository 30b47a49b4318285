//! VPC resource implementation

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::vpcs::{CreateVpcRequest, UpdateVpcRequest};
use crate::api::Client;
use crate::resolve::{project_id, retrieve_id, set_value_or_id};
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_optional_string, get_string, get_tags, gone, has_change, id_attribute, import_by_id,
    project_attribute, read_back, read_response, set_optional_string, set_project, set_string,
    set_tags, tags_attribute, update_response, zone_attribute, OperationError, OperationResult,
};
use crate::retry::ignore_gone;
use crate::rules::parse_cidr;
use crate::tags::reconcile_tags;

const RESOURCE_TYPE: &str = "Vpc";

#[derive(Default)]
pub struct VpcResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl VpcResource {
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
            .map_err(|e| api_error("Error reading VPC", e))?;

        let Some(vpc) = client
            .vpcs()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading VPC {}", id), e))?
        else {
            return Ok(gone("VPC", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &vpc.name);
        set_string(&mut state, "display_text", &vpc.displaytext);
        set_string(&mut state, "cidr", &vpc.cidr);
        set_string(&mut state, "network_domain", &vpc.networkdomain);
        set_optional_string(&mut state, "source_nat_list", &vpc.sourcenatlist);
        set_optional_string(&mut state, "syslog_server_list", &vpc.syslogserverlist);

        // listVPCs only reports the offering ID
        let offering_name = match client.vpcs().get_offering(&vpc.vpcofferingid).await {
            Ok(Some(offering)) => offering.name,
            Ok(None) => vpc.vpcofferingname.clone(),
            Err(e) => return Err(api_error(format!("Error reading VPC offering of {}", vpc.name), e)),
        };
        set_value_or_id(&mut state, "vpc_offering", &offering_name, &vpc.vpcofferingid);

        let source_nat = client
            .addresses()
            .source_nat(&vpc.id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading source NAT IP of VPC {}", vpc.name), e))?;
        set_string(
            &mut state,
            "source_nat_ip",
            source_nat.map(|ip| ip.ipaddress).unwrap_or_default(),
        );

        set_value_or_id(&mut state, "zone", &vpc.zonename, &vpc.zoneid);
        set_project(&mut state, &vpc.project, &vpc.projectid);
        set_tags(&mut state, &vpc.tags);

        Ok(Some(state))
    }

    async fn create_vpc(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating VPC {}", name);

        let vpcofferingid = retrieve_id(client, "vpc_offering", &get_string(&planned, "vpc_offering"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let zoneid = retrieve_id(client, "zone", &get_string(&planned, "zone"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let projectid = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let request = CreateVpcRequest {
            displaytext: get_optional_string(&planned, "display_text").unwrap_or_else(|| name.clone()),
            name: name.clone(),
            cidr: get_string(&planned, "cidr"),
            vpcofferingid,
            zoneid,
            networkdomain: get_optional_string(&planned, "network_domain"),
            sourcenatlist: get_optional_string(&planned, "source_nat_list"),
            syslogserverlist: get_optional_string(&planned, "syslog_server_list"),
            projectid,
        };

        let vpc = client
            .vpcs()
            .create(ctx, &request)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &vpc.id);

        let tags = get_tags(&state);
        if let Err(e) =
            reconcile_tags(ctx, client, &vpc.id, RESOURCE_TYPE, &HashMap::new(), &tags).await
        {
            return Err(
                OperationError::from(api_error(format!("Error setting tags on VPC {}", name), e))
                    .with_state(state),
            );
        }

        let result = Self::read_state(client, state.clone()).await;
        read_back("VPC", state, result)
    }

    async fn update_vpc(
        &self,
        ctx: &Context,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let summary = format!("Error updating VPC {}", get_string(&prior, "name"));

        let mut request = UpdateVpcRequest {
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
        // An emptied list is sent as an empty value so the control plane clears it
        if has_change(&prior, &planned, "source_nat_list") {
            request.sourcenatlist = Some(get_string(&planned, "source_nat_list"));
            changed = true;
        }
        if has_change(&prior, &planned, "syslog_server_list") {
            request.syslogserverlist = Some(get_string(&planned, "syslog_server_list"));
            changed = true;
        }

        if changed {
            client
                .vpcs()
                .update(ctx, &request)
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        if has_change(&prior, &planned, "tags") {
            reconcile_tags(ctx, client, &id, RESOURCE_TYPE, &get_tags(&prior), &get_tags(&planned))
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("VPC", planned, result)
    }

    async fn delete_vpc(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.vpcs().delete(ctx, &id).await, &id)
            .map_err(|e| api_error(format!("Error deleting VPC {}", get_string(&prior, "name")), e))
    }
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &str {
        "cosmic_vpc"
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
            .description("Manages a VPC")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the VPC")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_text", AttributeType::String)
                    .description("The display text of the VPC, defaults to the name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(force_new("cidr", "The CIDR block of the VPC", true))
            .attribute(force_new("vpc_offering", "The name or ID of the VPC offering", true))
            .attribute(force_new("network_domain", "The DNS domain of the VPC", false))
            .attribute(project_attribute())
            .attribute(
                AttributeBuilder::new("source_nat_ip", AttributeType::String)
                    .description("The source NAT address of the VPC")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_nat_list", AttributeType::String)
                    .description("Comma separated CIDRs allowed to use source NAT")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("syslog_server_list", AttributeType::String)
                    .description("Comma separated syslog servers of the VPC router")
                    .optional()
                    .build(),
            )
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
        create_response(self.create_vpc(&ctx, request.planned_state).await)
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
            .update_vpc(&ctx, request.prior_state.clone(), request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_vpc(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for VpcResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for VpcResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
#[path = "./vpc_test.rs"]
mod vpc_test;
