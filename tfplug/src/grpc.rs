//! gRPC service implementation
//!
//! Translates tfplugin6 RPCs into calls on the Provider and Resource traits.
//! Resources are created per request from the provider's factories and
//! configured with the data returned by ConfigureProvider. Every state sent
//! back to Terraform is conformed to the resource schema first.

use crate::context::Context;
use crate::planning;
use crate::proto;
use crate::proto::provider_server::Provider as ProtoProvider;
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderSchemaRequest, ResourceFactory,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ModifyPlanRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{Block, NestingMode, Schema, StringKind};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tonic::{Request, Response, Status};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

/// The tonic service wrapping a Provider
pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    provider_data: Arc<RwLock<ProviderData>>,
    factories: Arc<HashMap<String, ResourceFactory>>,
    provider_schema: OnceCell<Schema>,
    resource_schemas: OnceCell<HashMap<String, Schema>>,
    root: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let factories = provider.resources();

        Self {
            provider: Arc::new(RwLock::new(provider)),
            provider_data: Arc::new(RwLock::new(None)),
            factories: Arc::new(factories),
            provider_schema: OnceCell::new(),
            resource_schemas: OnceCell::new(),
            root: Context::new(),
        }
    }

    /// The context cancelled by StopProvider
    pub fn root_context(&self) -> Context {
        self.root.clone()
    }

    fn request_context(&self) -> Context {
        self.root.child_context()
    }

    async fn provider_schema(&self) -> &Schema {
        self.provider_schema
            .get_or_init(|| async {
                let provider = self.provider.read().await;
                provider
                    .schema(self.request_context(), ProviderSchemaRequest)
                    .await
                    .schema
            })
            .await
    }

    async fn resource_schemas(&self) -> &HashMap<String, Schema> {
        self.resource_schemas
            .get_or_init(|| async {
                let mut schemas = HashMap::new();
                for (name, factory) in self.factories.iter() {
                    let resource = factory();
                    let response = resource
                        .schema(self.request_context(), ResourceSchemaRequest)
                        .await;
                    schemas.insert(name.clone(), response.schema);
                }
                schemas
            })
            .await
    }

    async fn resource_block(&self, type_name: &str) -> Option<&Block> {
        self.resource_schemas()
            .await
            .get(type_name)
            .map(|schema| &schema.block)
    }

    /// Instantiates a resource and hands it the provider data
    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| vec![unknown_resource(type_name)])?;

        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;

        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }
}

fn unknown_resource(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        "Unknown resource type",
        format!("The provider does not support resource type \"{}\"", type_name),
    )
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: vec![],
            resources: names
                .into_iter()
                .map(|name| proto::get_metadata::ResourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let provider_schema = schema_to_proto(self.provider_schema().await);
        let resource_schemas = self
            .resource_schemas()
            .await
            .iter()
            .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
            .collect();

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(provider_schema),
            resource_schemas,
            data_source_schemas: HashMap::new(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let mut diagnostics =
            planning::validate_block(&self.provider_schema().await.block, &config.value, &AttributePath::root());

        if !has_errors(&diagnostics) {
            let provider = self.provider.read().await;
            let response = provider
                .validate(self.request_context(), ValidateProviderConfigRequest { config })
                .await;
            diagnostics.extend(response.diagnostics);
        }

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: convert_diagnostics(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();

        let Some(block) = self.resource_block(&req.type_name).await else {
            return Ok(Response::new(proto::validate_resource_config::Response {
                diagnostics: convert_diagnostics(vec![unknown_resource(&req.type_name)]),
            }));
        };

        let config = decode_dynamic_value(&req.config)?;
        let mut diagnostics = planning::validate_block(block, &config.value, &AttributePath::root());

        if !has_errors(&diagnostics) {
            if let Some(factory) = self.factories.get(&req.type_name) {
                let resource = factory();
                let response = resource
                    .validate(
                        self.request_context(),
                        ValidateResourceConfigRequest {
                            type_name: req.type_name.clone(),
                            config,
                            client_capabilities: client_capabilities(&req.client_capabilities),
                        },
                    )
                    .await;
                diagnostics.extend(response.diagnostics);
            }
        }

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: convert_diagnostics(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: convert_diagnostics(vec![unknown_data_source(&req.type_name)]),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();

        let Some(block) = self.resource_block(&req.type_name).await else {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: convert_diagnostics(vec![unknown_resource(&req.type_name)]),
            }));
        };

        let raw_state = req.raw_state.unwrap_or_default();
        if raw_state.json.is_empty() && !raw_state.flatmap.is_empty() {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: convert_diagnostics(vec![Diagnostic::error(
                    "Unsupported state format",
                    "Flatmap state from Terraform 0.11 and earlier cannot be upgraded",
                )]),
            }));
        }

        let state = DynamicValue::decode_json(&raw_state.json)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let upgraded = DynamicValue::new(block.conform(state.value));

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        tracing::debug!(terraform_version = %req.terraform_version, "configuring provider");

        let response = {
            let mut provider = self.provider.write().await;
            provider
                .configure(
                    self.request_context(),
                    ConfigureProviderRequest {
                        terraform_version: req.terraform_version,
                        config,
                        client_capabilities: client_capabilities(&req.client_capabilities),
                    },
                )
                .await
        };

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let ctx = self.request_context();

        let current_state = decode_dynamic_value(&req.current_state)?;
        if current_state.is_null() {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_dynamic_value(&current_state)?),
                diagnostics: vec![],
                private: req.private,
            }));
        }

        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: req.current_state,
                    diagnostics: convert_diagnostics(diagnostics),
                    private: req.private,
                }))
            }
        };

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                    private: req.private,
                    provider_meta: decode_optional(&req.provider_meta)?,
                    client_capabilities: client_capabilities(&req.client_capabilities),
                },
            )
            .await;

        let new_state = match response.new_state {
            Some(state) => self.conform_state(&req.type_name, state).await,
            None => {
                tracing::debug!(type_name = %req.type_name, "resource no longer exists");
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: convert_diagnostics(response.diagnostics),
            private: response.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = self.request_context();

        let Some(block) = self.resource_block(&req.type_name).await else {
            return Err(Status::not_found(format!(
                "Unknown resource type: {}",
                req.type_name
            )));
        };

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let proposed_new_state = decode_dynamic_value(&req.proposed_new_state)?;
        let config = decode_dynamic_value(&req.config)?;

        let mut change = planning::plan_change(
            block,
            &prior_state.value,
            proposed_new_state.value,
            &config.value,
        );
        let mut planned_private = req.prior_private.clone();

        if !change.planned_state.is_null() && !has_errors(&change.diagnostics) {
            match self.configured_resource(&ctx, &req.type_name).await {
                Ok(resource) => {
                    if let Some(modifier) = resource.as_modify_plan() {
                        let response = modifier
                            .modify_plan(
                                ctx.clone(),
                                ModifyPlanRequest {
                                    type_name: req.type_name.clone(),
                                    config: config.clone(),
                                    prior_state: prior_state.clone(),
                                    proposed_new_state: DynamicValue::new(change.planned_state),
                                    prior_private: req.prior_private.clone(),
                                    provider_meta: decode_optional(&req.provider_meta)?,
                                },
                            )
                            .await;

                        change.planned_state = response.planned_state.value;
                        planned_private = response.planned_private;
                        change.diagnostics.extend(response.diagnostics);
                        if !prior_state.is_null() {
                            for path in response.requires_replace {
                                if !change.requires_replace.contains(&path) {
                                    change.requires_replace.push(path);
                                }
                            }
                        }
                    }
                }
                Err(diagnostics) => change.diagnostics.extend(diagnostics),
            }
        }

        let planned_state = DynamicValue::new(block.conform(change.planned_state));

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&planned_state)?),
            requires_replace: change.requires_replace.iter().map(path_to_proto).collect(),
            planned_private,
            diagnostics: convert_diagnostics(change.diagnostics),
            legacy_type_system: true,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = self.request_context();

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let planned_state = decode_dynamic_value(&req.planned_state)?;
        let config = decode_dynamic_value(&req.config)?;
        let provider_meta = decode_optional(&req.provider_meta)?;

        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::apply_resource_change::Response {
                    new_state: req.prior_state,
                    private: req.planned_private,
                    diagnostics: convert_diagnostics(diagnostics),
                    legacy_type_system: true,
                }))
            }
        };

        let (new_state, private, diagnostics) = if planned_state.is_null() {
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private.clone(),
                        provider_meta,
                    },
                )
                .await;

            // A failed delete leaves the resource in state
            let state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            (state, req.planned_private, response.diagnostics)
        } else if prior_state.is_null() {
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            (response.new_state, response.private, response.diagnostics)
        } else {
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;

            let state = if response.new_state.is_null() {
                prior_state
            } else {
                response.new_state
            };
            (state, response.private, response.diagnostics)
        };

        let new_state = if new_state.is_null() {
            new_state
        } else {
            let known = DynamicValue::new(new_state.value.strip_unknown());
            self.conform_state(&req.type_name, known).await
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: convert_diagnostics(diagnostics),
            legacy_type_system: true,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = self.request_context();

        let resource = match self.configured_resource(&ctx, &req.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: convert_diagnostics(diagnostics),
                }))
            }
        };

        let Some(importer) = resource.as_import_state() else {
            return Ok(Response::new(proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: convert_diagnostics(vec![Diagnostic::error(
                    "Resource Import Not Implemented",
                    format!("Resource type \"{}\" does not support import", req.type_name),
                )]),
            }));
        };

        let response = importer
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: req.type_name.clone(),
                    id: req.id,
                    client_capabilities: client_capabilities(&req.client_capabilities),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let state = self.conform_state(&imported.type_name, imported.state).await;
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&state)?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();

        Ok(Response::new(proto::read_data_source::Response {
            state: None,
            diagnostics: convert_diagnostics(vec![unknown_data_source(&req.type_name)]),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("stop requested, cancelling in-flight operations");
        self.root.cancel();

        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    async fn conform_state(&self, type_name: &str, state: DynamicValue) -> DynamicValue {
        match self.resource_block(type_name).await {
            Some(block) => DynamicValue::new(block.conform(state.value)),
            None => state,
        }
    }
}

fn unknown_data_source(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        "Unknown data source type",
        format!("The provider does not support data source \"{}\"", type_name),
    )
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn client_capabilities(caps: &Option<proto::ClientCapabilities>) -> ClientCapabilities {
    caps.as_ref()
        .map(|c| ClientCapabilities {
            deferral_allowed: c.deferral_allowed,
            write_only_attributes_allowed: c.write_only_attributes_allowed,
        })
        .unwrap_or_default()
}

// Helper functions

#[allow(clippy::result_large_err)]
fn decode_dynamic_value(
    value: &Option<proto::DynamicValue>,
) -> std::result::Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else if !value.json.is_empty() {
        DynamicValue::decode_json(&value.json)
    } else {
        Ok(DynamicValue::null())
    };

    decoded.map_err(|e| Status::invalid_argument(e.to_string()))
}

#[allow(clippy::result_large_err)]
fn decode_optional(
    value: &Option<proto::DynamicValue>,
) -> std::result::Result<Option<DynamicValue>, Status> {
    let decoded = decode_dynamic_value(value)?;
    Ok((!decoded.is_null()).then_some(decoded))
}

#[allow(clippy::result_large_err)]
fn encode_dynamic_value(value: &DynamicValue) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = value
        .encode_msgpack()
        .map_err(|e| Status::internal(e.to_string()))?;

    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn convert_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|diag| proto::Diagnostic {
            severity: match diag.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid as i32,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: diag.summary,
            detail: diag.detail,
            attribute: diag.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}

fn string_kind(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => proto::StringKind::Plain as i32,
        StringKind::Markdown => proto::StringKind::Markdown as i32,
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    use proto::schema::nested_block::NestingMode as ProtoNesting;

    proto::schema::Block {
        version: block.version,
        attributes: block
            .attributes
            .iter()
            .map(|attr| proto::schema::Attribute {
                name: attr.name.clone(),
                r#type: attr.r#type.to_json_bytes(),
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: proto::StringKind::Plain as i32,
                deprecated: attr.deprecated,
            })
            .collect(),
        block_types: block
            .block_types
            .iter()
            .map(|nested| proto::schema::NestedBlock {
                type_name: nested.type_name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting: match nested.nesting {
                    NestingMode::Invalid => ProtoNesting::Invalid as i32,
                    NestingMode::Single => ProtoNesting::Single as i32,
                    NestingMode::List => ProtoNesting::List as i32,
                    NestingMode::Set => ProtoNesting::Set as i32,
                    NestingMode::Map => ProtoNesting::Map as i32,
                    NestingMode::Group => ProtoNesting::Group as i32,
                },
                min_items: nested.min_items,
                max_items: nested.max_items,
            })
            .collect(),
        description: block.description.clone(),
        description_kind: string_kind(block.description_kind),
        deprecated: block.deprecated,
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}
