//! Template resource implementation
//!
//! Registration is asynchronous on the control plane side: the template
//! exists right away but only becomes usable once the image has been
//! downloaded. Create waits for `is_ready` up to `is_ready_timeout` seconds.

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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

use crate::api::templates::{RegisterTemplateRequest, UpdateTemplateRequest};
use crate::api::Client;
use crate::resolve::{project_id, retrieve_id, set_value_or_id};
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_bool, get_i64,
    get_optional_bool, get_optional_string, get_string, gone, has_change, id_attribute,
    project_attribute, read_back, read_response, set_bool, set_project, set_string,
    update_response, zone_attribute, OperationError, OperationResult,
};
use crate::retry::ignore_gone;

const DEFAULT_READY_TIMEOUT: i64 = 300;

pub struct TemplateResource {
    provider_data: Option<crate::CosmicProviderData>,
    poll_interval: Duration,
}

impl Default for TemplateResource {
    fn default() -> Self {
        Self {
            provider_data: None,
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl TemplateResource {
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
            .map_err(|e| api_error("Error reading template", e))?;

        let Some(template) = client
            .templates()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading template {}", id), e))?
        else {
            return Ok(gone("Template", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &template.name);
        set_string(&mut state, "display_text", &template.displaytext);
        set_string(&mut state, "format", &template.format);
        set_string(&mut state, "hypervisor", &template.hypervisor);
        set_value_or_id(&mut state, "os_type", &template.ostypename, &template.ostypeid);
        set_value_or_id(&mut state, "zone", &template.zonename, &template.zoneid);
        set_project(&mut state, &template.project, &template.projectid);
        set_bool(&mut state, "is_dynamically_scalable", template.isdynamicallyscalable);
        set_bool(&mut state, "is_extractable", template.isextractable);
        set_bool(&mut state, "is_featured", template.isfeatured);
        set_bool(&mut state, "is_public", template.ispublic);
        set_bool(&mut state, "password_enabled", template.passwordenabled);
        set_bool(&mut state, "is_ready", template.isready);

        Ok(Some(state))
    }

    async fn create_template(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating template {}", name);

        let ostypeid = retrieve_id(client, "os_type", &get_string(&planned, "os_type"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let zoneid = retrieve_id(client, "zone", &get_string(&planned, "zone"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let projectid = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let request = RegisterTemplateRequest {
            displaytext: get_optional_string(&planned, "display_text").unwrap_or_else(|| name.clone()),
            name: name.clone(),
            format: get_string(&planned, "format"),
            hypervisor: get_string(&planned, "hypervisor"),
            ostypeid,
            url: get_string(&planned, "url"),
            zoneid,
            isdynamicallyscalable: get_optional_bool(&planned, "is_dynamically_scalable"),
            isextractable: get_optional_bool(&planned, "is_extractable"),
            isfeatured: get_optional_bool(&planned, "is_featured"),
            ispublic: get_optional_bool(&planned, "is_public"),
            passwordenabled: get_optional_bool(&planned, "password_enabled"),
            projectid,
        };

        let template = client
            .templates()
            .register(&request)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &template.id);

        let timeout = Duration::from_secs(
            get_i64(&state, "is_ready_timeout")
                .unwrap_or(DEFAULT_READY_TIMEOUT)
                .max(0) as u64,
        );
        let started = tokio::time::Instant::now();

        loop {
            // The first read happens after one interval; an image is never ready right away
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = ctx.cancelled() => {
                    return Err(OperationError::from(Diagnostic::error(
                        summary,
                        "Cancelled while waiting for template to become ready",
                    ))
                    .with_state(state));
                }
            }

            let result = Self::read_state(client, state.clone()).await;
            let current = read_back("Template", state.clone(), result)?;

            if get_bool(&current, "is_ready") {
                return Ok(current);
            }

            if started.elapsed() > timeout {
                return Err(OperationError::from(Diagnostic::error(
                    summary,
                    "Timeout while waiting for template to become ready",
                ))
                .with_state(current));
            }

            tracing::debug!("Template {} is not ready yet", template.id);
            state = current;
        }
    }

    async fn update_template(&self, prior: DynamicValue, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let summary = format!("Error updating template {}", id);

        let mut request = UpdateTemplateRequest {
            id: id.clone(),
            ..Default::default()
        };
        let mut changed = false;

        if has_change(&prior, &planned, "name") {
            request.name = Some(get_string(&planned, "name"));
            changed = true;
        }
        if has_change(&prior, &planned, "display_text") {
            request.displaytext = get_optional_string(&planned, "display_text");
            changed = request.displaytext.is_some() || changed;
        }
        if has_change(&prior, &planned, "os_type") {
            let ostypeid = retrieve_id(client, "os_type", &get_string(&planned, "os_type"))
                .await
                .map_err(|e| api_error(&summary, e))?;
            request.ostypeid = Some(ostypeid);
            changed = true;
        }
        if has_change(&prior, &planned, "is_dynamically_scalable") {
            request.isdynamicallyscalable = get_optional_bool(&planned, "is_dynamically_scalable");
            changed = request.isdynamicallyscalable.is_some() || changed;
        }
        if has_change(&prior, &planned, "password_enabled") {
            request.passwordenabled = get_optional_bool(&planned, "password_enabled");
            changed = request.passwordenabled.is_some() || changed;
        }

        if changed {
            client
                .templates()
                .update(&request)
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        if has_change(&prior, &planned, "is_public") {
            if let Some(is_public) = get_optional_bool(&planned, "is_public") {
                client
                    .templates()
                    .update_permissions(&id, is_public)
                    .await
                    .map_err(|e| api_error(&summary, e))?;
            }
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("Template", planned, result)
    }

    async fn delete_template(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        ignore_gone(client.templates().delete(ctx, &id, None).await, &id)
            .map_err(|e| api_error(format!("Error deleting template {}", id), e))
    }
}

fn flag(name: &str, description: &str, force_new: bool) -> tfplug::schema::Attribute {
    let builder = AttributeBuilder::new(name, AttributeType::Bool)
        .description(description)
        .optional()
        .computed();
    if force_new {
        builder.plan_modifier(RequiresReplace::create()).build()
    } else {
        builder.build()
    }
}

fn required_force_new(name: &str, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .plan_modifier(RequiresReplace::create())
        .build()
}

#[async_trait]
impl Resource for TemplateResource {
    fn type_name(&self) -> &str {
        "cosmic_template"
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
            .description("Registers a template from an image URL")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the template")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_text", AttributeType::String)
                    .description("The display text of the template, defaults to the name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(required_force_new("format", "The image format, e.g. QCOW2"))
            .attribute(required_force_new("hypervisor", "The target hypervisor, e.g. KVM"))
            .attribute(
                AttributeBuilder::new("os_type", AttributeType::String)
                    .description("The name or ID of the OS type")
                    .required()
                    .build(),
            )
            .attribute(required_force_new("url", "The URL the image is downloaded from"))
            .attribute(project_attribute())
            .attribute(zone_attribute())
            .attribute(flag(
                "is_dynamically_scalable",
                "Whether the template supports dynamic scaling",
                false,
            ))
            .attribute(flag("is_extractable", "Whether the template can be extracted", true))
            .attribute(flag("is_featured", "Whether the template is featured", true))
            .attribute(flag("is_public", "Whether the template is public", false))
            .attribute(flag("password_enabled", "Whether the template supports password reset", false))
            .attribute(
                AttributeBuilder::new("is_ready", AttributeType::Bool)
                    .description("Whether the template is ready for use")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_ready_timeout", AttributeType::Number)
                    .description("Seconds to wait for the template to become ready")
                    .optional()
                    .default(StaticDefault::number(DEFAULT_READY_TIMEOUT as f64))
                    .build(),
            )
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
        create_response(self.create_template(&ctx, request.planned_state).await)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = match client(&self.provider_data) {
            Ok(client) => Self::read_state(client, request.current_state.clone()).await,
            Err(diagnostic) => Err(diagnostic),
        };
        read_response(request.current_state, request.private, result)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let result = self
            .update_template(request.prior_state.clone(), request.planned_state)
            .await;
        update_response(request.prior_state, result)
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_template(&ctx, request.prior_state).await)
    }
}

#[async_trait]
impl ResourceWithConfigure for TemplateResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{list_body, mock_command_with, response_body};
    use crate::resources::test_support::*;
    use serde_json::json;
    use tfplug::types::Dynamic;

    const OS_TYPE_ID: &str = "0b4c9e6a-3f2d-4e1a-9c8b-7a6f5e4d3c2b";
    const ZONE_ID: &str = "8a8d8a5e-0a0b-4c4d-9e9f-1a2b3c4d5e6f";

    fn resource(server: &mockito::ServerGuard) -> TemplateResource {
        TemplateResource {
            provider_data: Some(provider_data(&server.url())),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn planned(timeout: f64) -> DynamicValue {
        state(&[
            ("id", Dynamic::Unknown),
            ("name", s("debian-12")),
            ("display_text", Dynamic::Unknown),
            ("format", s("QCOW2")),
            ("hypervisor", s("KVM")),
            ("os_type", s(OS_TYPE_ID)),
            ("url", s("http://images.example.com/debian-12.qcow2")),
            ("project", Dynamic::Unknown),
            ("zone", s(ZONE_ID)),
            ("is_dynamically_scalable", Dynamic::Unknown),
            ("is_extractable", Dynamic::Unknown),
            ("is_featured", Dynamic::Unknown),
            ("is_public", Dynamic::Bool(true)),
            ("password_enabled", Dynamic::Unknown),
            ("is_ready", Dynamic::Unknown),
            ("is_ready_timeout", n(timeout)),
        ])
    }

    fn template(is_ready: bool) -> serde_json::Value {
        json!([{
            "id": "tpl-1",
            "name": "debian-12",
            "displaytext": "debian-12",
            "format": "QCOW2",
            "hypervisor": "KVM",
            "ostypeid": OS_TYPE_ID,
            "ostypename": "Debian GNU/Linux 12 (64-bit)",
            "zoneid": ZONE_ID,
            "zonename": "ams1",
            "ispublic": true,
            "isready": is_ready
        }])
    }

    async fn mock_register(server: &mut mockito::ServerGuard) -> mockito::Mock {
        mock_command_with(
            server,
            "registerTemplate",
            &[("name", "debian-12"), ("displaytext", "debian-12"), ("ispublic", "true")],
        )
        .with_body(response_body(
            "registerTemplate",
            json!({"count": 1, "template": [{"id": "tpl-1", "name": "debian-12", "isready": false}]}),
        ))
        .create_async()
        .await
    }

    #[tokio::test]
    async fn create_waits_until_ready() {
        let mut server = mockito::Server::new_async().await;
        let register = mock_register(&mut server).await;
        let _list = mock_command_with(&mut server, "listTemplates", &[("id", "tpl-1")])
            .with_body(list_body("listTemplates", "template", template(true)))
            .create_async()
            .await;

        let response = resource(&server)
            .create(Context::new(), create_request("cosmic_template", planned(300.0)))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        register.assert_async().await;
        assert_eq!(get_string(&response.new_state, "id"), "tpl-1");
        assert!(get_bool(&response.new_state, "is_ready"));
        assert_eq!(get_string(&response.new_state, "os_type"), OS_TYPE_ID);
        assert_eq!(get_string(&response.new_state, "display_text"), "debian-12");
    }

    #[tokio::test]
    async fn create_times_out_but_keeps_state() {
        let mut server = mockito::Server::new_async().await;
        let _register = mock_register(&mut server).await;
        let _list = mock_command_with(&mut server, "listTemplates", &[("id", "tpl-1")])
            .with_body(list_body("listTemplates", "template", template(false)))
            .create_async()
            .await;

        let response = resource(&server)
            .create(Context::new(), create_request("cosmic_template", planned(0.0)))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].detail,
            "Timeout while waiting for template to become ready"
        );
        assert_eq!(get_string(&response.new_state, "id"), "tpl-1");
    }

    #[tokio::test]
    async fn update_changes_name_and_permissions() {
        let mut server = mockito::Server::new_async().await;
        let update = mock_command_with(
            &mut server,
            "updateTemplate",
            &[("id", "tpl-1"), ("name", "debian-12-new")],
        )
        .with_body(r#"{"updatetemplateresponse":{"template":{"id":"tpl-1"}}}"#)
        .create_async()
        .await;
        let permissions = mock_command_with(
            &mut server,
            "updateTemplatePermissions",
            &[("id", "tpl-1"), ("ispublic", "false")],
        )
        .with_body(r#"{"updatetemplatepermissionsresponse":{"success":true}}"#)
        .create_async()
        .await;
        let _list = mock_command_with(&mut server, "listTemplates", &[("id", "tpl-1")])
            .with_body(list_body(
                "listTemplates",
                "template",
                json!([{"id": "tpl-1", "name": "debian-12-new", "isready": true, "ispublic": false}]),
            ))
            .create_async()
            .await;

        let prior = state(&[
            ("id", s("tpl-1")),
            ("name", s("debian-12")),
            ("is_public", Dynamic::Bool(true)),
        ]);
        let planned = state(&[
            ("id", s("tpl-1")),
            ("name", s("debian-12-new")),
            ("is_public", Dynamic::Bool(false)),
        ]);

        let response = resource(&server)
            .update(Context::new(), update_request("cosmic_template", prior, planned))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
        permissions.assert_async().await;
        assert_eq!(get_string(&response.new_state, "name"), "debian-12-new");
    }

    #[tokio::test]
    async fn read_drops_deleted_template() {
        let mut server = mockito::Server::new_async().await;
        let _list = mock_command_with(&mut server, "listTemplates", &[("id", "tpl-1")])
            .with_body(r#"{"listtemplatesresponse":{}}"#)
            .create_async()
            .await;

        let current = state(&[("id", s("tpl-1")), ("name", s("debian-12"))]);
        let response = resource(&server)
            .read(Context::new(), read_request("cosmic_template", current))
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }
}
