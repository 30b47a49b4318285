//! VPC static route resource implementation

use async_trait::async_trait;
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
use tfplug::schema::SchemaBuilder;
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::Client;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, force_new,
    get_string, gone, id_attribute, import_by_id, read_back, read_response, set_string,
    OperationResult,
};
use crate::retry::ignore_gone;
use crate::rules::parse_cidr;

#[derive(Default)]
pub struct StaticRouteResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl StaticRouteResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = get_string(&state, "id");

        let Some(route) = client
            .vpcs()
            .get_static_route(&id)
            .await
            .map_err(|e| api_error(format!("Error reading static route {}", id), e))?
        else {
            return Ok(gone("Static route", &get_string(&state, "cidr")));
        };

        set_string(&mut state, "cidr", &route.cidr);
        set_string(&mut state, "nexthop", &route.nexthop);
        set_string(&mut state, "vpc_id", &route.vpcid);

        Ok(Some(state))
    }

    async fn create_route(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let cidr = get_string(&planned, "cidr");

        let route = client
            .vpcs()
            .create_static_route(
                ctx,
                &cidr,
                &get_string(&planned, "nexthop"),
                &get_string(&planned, "vpc_id"),
            )
            .await
            .map_err(|e| api_error(format!("Error creating static route for {}", cidr), e))?;

        let mut state = planned;
        set_string(&mut state, "id", &route.id);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Static route", state, result)
    }

    async fn delete_route(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.vpcs().delete_static_route(ctx, &id).await, &id).map_err(|e| {
            api_error(format!("Error deleting static route for {}", get_string(&prior, "cidr")), e)
        })
    }
}

#[async_trait]
impl Resource for StaticRouteResource {
    fn type_name(&self) -> &str {
        "cosmic_static_route"
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
            .description("Manages a static route of a VPC")
            .attribute(id_attribute())
            .attribute(force_new("cidr", "The destination CIDR", true))
            .attribute(force_new("nexthop", "The next hop for the destination", true))
            .attribute(force_new("vpc_id", "The VPC the route belongs to", true))
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
        create_response(self.create_route(&ctx, request.planned_state).await)
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
        delete_response(self.delete_route(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for StaticRouteResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for StaticRouteResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
