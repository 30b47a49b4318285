//! Disk (data volume) resource implementation

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::RequiresReplace;
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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::volumes::{CreateVolumeRequest, ResizeVolumeRequest};
use crate::api::Client;
use crate::resolve::{project_id, retrieve_id, set_value_or_id};
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_bool, get_i64,
    get_string, get_tags, gone, has_change, id_attribute, import_by_id, project_attribute,
    read_back, read_response, set_bool, set_i64, set_project, set_string, set_tags,
    tags_attribute, update_response, zone_attribute, OperationError, OperationResult,
};
use crate::retry::ignore_gone;
use crate::tags::reconcile_tags;

const RESOURCE_TYPE: &str = "Volume";
const GIB: i64 = 1 << 30;

#[derive(Default)]
pub struct DiskResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl DiskResource {
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
            .map_err(|e| api_error("Error reading disk", e))?;

        let Some(volume) = client
            .volumes()
            .get(&id, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading disk {}", id), e))?
        else {
            return Ok(gone("Disk", &get_string(&state, "name")));
        };

        set_string(&mut state, "name", &volume.name);
        set_bool(&mut state, "attach", volume.is_attached());
        set_i64(&mut state, "size", volume.size.map(|bytes| bytes / GIB));
        set_value_or_id(
            &mut state,
            "disk_offering",
            &volume.diskofferingname,
            &volume.diskofferingid,
        );
        set_value_or_id(&mut state, "zone", &volume.zonename, &volume.zoneid);
        set_project(&mut state, &volume.project, &volume.projectid);
        set_tags(&mut state, &volume.tags);

        if volume.is_attached() {
            set_i64(&mut state, "device_id", volume.deviceid);
            set_string(&mut state, "virtual_machine_id", &volume.virtualmachineid);
        } else {
            set_i64(&mut state, "device_id", None);
        }

        Ok(Some(state))
    }

    async fn attach(
        ctx: &Context,
        client: &Client,
        state: &DynamicValue,
    ) -> Result<(), Diagnostic> {
        let id = get_string(state, "id");
        let virtual_machine_id = get_string(state, "virtual_machine_id");

        client
            .volumes()
            .attach(ctx, &id, &virtual_machine_id, get_i64(state, "device_id"))
            .await
            .map(|_| ())
            .map_err(|e| {
                api_error(
                    format!("Error attaching disk {} to virtual machine {}", id, virtual_machine_id),
                    e,
                )
            })
    }

    async fn detach(ctx: &Context, client: &Client, id: &str) -> Result<(), Diagnostic> {
        ignore_gone(client.volumes().detach(ctx, id).await, id)
            .map_err(|e| api_error(format!("Error detaching disk {}", id), e))
    }

    async fn create_disk(&self, ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating disk {}", name);

        let diskofferingid = retrieve_id(client, "disk_offering", &get_string(&planned, "disk_offering"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let zoneid = retrieve_id(client, "zone", &get_string(&planned, "zone"))
            .await
            .map_err(|e| api_error(&summary, e))?;
        let projectid = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let request = CreateVolumeRequest {
            name: name.clone(),
            diskofferingid,
            zoneid,
            size: get_i64(&planned, "size"),
            projectid,
        };

        let volume = client
            .volumes()
            .create(ctx, &request)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        set_string(&mut state, "id", &volume.id);

        let tags = get_tags(&state);
        if let Err(e) = reconcile_tags(ctx, client, &volume.id, RESOURCE_TYPE, &HashMap::new(), &tags).await {
            return Err(OperationError::from(api_error(format!("Error setting tags on disk {}", name), e))
                .with_state(state));
        }

        if get_bool(&state, "attach") {
            if let Err(diagnostic) = Self::attach(ctx, client, &state).await {
                return Err(OperationError::from(diagnostic).with_state(state));
            }
        }

        let result = Self::read_state(client, state.clone()).await;
        read_back("Disk", state, result)
    }

    async fn update_disk(
        &self,
        ctx: &Context,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> OperationResult {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");
        let summary = format!("Error updating disk {}", get_string(&planned, "name"));

        if has_change(&prior, &planned, "disk_offering") || has_change(&prior, &planned, "size") {
            let diskofferingid = retrieve_id(client, "disk_offering", &get_string(&planned, "disk_offering"))
                .await
                .map_err(|e| api_error(&summary, e))?;

            let request = ResizeVolumeRequest {
                id: id.clone(),
                diskofferingid: Some(diskofferingid),
                size: get_i64(&planned, "size"),
                shrinkok: get_bool(&planned, "shrink_ok"),
            };
            client
                .volumes()
                .resize(ctx, &request)
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        let attachment_changed = has_change(&prior, &planned, "attach")
            || has_change(&prior, &planned, "virtual_machine_id")
            || has_change(&prior, &planned, "device_id");

        if attachment_changed {
            if get_bool(&prior, "attach") {
                Self::detach(ctx, client, &id).await?;
            }
            if get_bool(&planned, "attach") {
                Self::attach(ctx, client, &planned).await?;
            }
        }

        if has_change(&prior, &planned, "tags") {
            reconcile_tags(ctx, client, &id, RESOURCE_TYPE, &get_tags(&prior), &get_tags(&planned))
                .await
                .map_err(|e| api_error(&summary, e))?;
        }

        let result = Self::read_state(client, planned.clone()).await;
        read_back("Disk", planned, result)
    }

    async fn delete_disk(&self, ctx: &Context, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let id = get_string(&prior, "id");

        if get_bool(&prior, "attach") {
            Self::detach(ctx, client, &id).await?;
        }

        ignore_gone(client.volumes().delete(&id).await, &id).map_err(|e| {
            api_error(format!("Error deleting disk {}", get_string(&prior, "name")), e)
        })
    }
}

#[async_trait]
impl Resource for DiskResource {
    fn type_name(&self) -> &str {
        "cosmic_disk"
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
            .description("Manages a data disk, optionally attached to an instance")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the disk")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("attach", AttributeType::Bool)
                    .description("Whether the disk is attached to virtual_machine_id")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("device_id", AttributeType::Number)
                    .description("The device ID the disk is attached as")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("disk_offering", AttributeType::String)
                    .description("The name or ID of the disk offering")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .description("The size of the disk in GiB, for custom disk offerings")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("shrink_ok", AttributeType::Bool)
                    .description("Whether resizing may shrink the disk")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_machine_id", AttributeType::String)
                    .description("The ID of the virtual machine to attach the disk to")
                    .optional()
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

        let attach = request.config.get_bool(&AttributePath::new("attach")).unwrap_or(false);
        let path = AttributePath::new("virtual_machine_id");
        if attach && matches!(request.config.get(&path), None | Some(Dynamic::Null)) {
            diagnostics.push(
                Diagnostic::error(
                    "Missing virtual machine",
                    "'virtual_machine_id' is required when 'attach' is true",
                )
                .with_attribute(path),
            );
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        create_response(self.create_disk(&ctx, request.planned_state).await)
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
            self.update_disk(&ctx, prior, request.planned_state).await,
        )
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_disk(&ctx, request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for DiskResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for DiskResource {
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
    use crate::api::test_helpers::{list_body, mock_async_job_with, mock_command_with};
    use crate::resources::test_support::*;
    use serde_json::json;

    const VOLUME_ID: &str = "5c8d0a2e-8f6e-4c1b-9a55-3d2f1e0b7c11";
    const VM_ID: &str = "9b1e7d3c-2a4f-4e6b-8c0d-1f2e3a4b5c6d";
    const OFFERING_ID: &str = "1d2c3b4a-5e6f-4a7b-8c9d-0e1f2a3b4c5d";
    const ZONE_ID: &str = "7a6b5c4d-3e2f-4a1b-9c8d-7e6f5a4b3c2d";

    fn volume_json(attached: bool, size_gib: i64) -> serde_json::Value {
        let mut volume = json!({
            "id": VOLUME_ID,
            "name": "data",
            "size": size_gib * GIB,
            "diskofferingid": OFFERING_ID,
            "diskofferingname": "small",
            "zoneid": ZONE_ID,
            "zonename": "ams1",
            "tags": [{"key": "env", "value": "prod"}]
        });
        if attached {
            volume["virtualmachineid"] = json!(VM_ID);
            volume["deviceid"] = json!(4);
        }
        volume
    }

    fn planned(attach: bool) -> DynamicValue {
        state(&[
            ("id", Dynamic::Unknown),
            ("name", s("data")),
            ("attach", Dynamic::Bool(attach)),
            ("device_id", n(4.0)),
            ("disk_offering", s(OFFERING_ID)),
            ("size", Dynamic::Unknown),
            ("shrink_ok", Dynamic::Bool(false)),
            ("virtual_machine_id", s(VM_ID)),
            ("project", Dynamic::Null),
            ("zone", s("ams1")),
            (
                "tags",
                Dynamic::Map([("env".to_string(), s("prod"))].into_iter().collect()),
            ),
        ])
    }

    #[tokio::test]
    async fn create_tags_and_attaches() {
        let mut server = mockito::Server::new_async().await;
        let _zone = mock_command_with(&mut server, "listZones", &[("name", "ams1")])
            .with_body(list_body("listZones", "zone", json!([{"id": ZONE_ID, "name": "ams1"}])))
            .create_async()
            .await;
        let _create = mock_async_job_with(
            &mut server,
            "createVolume",
            &[("name", "data"), ("zoneid", ZONE_ID)],
            "job-1",
            json!({"volume": volume_json(false, 10)}),
        )
        .await;
        let _tags = mock_async_job_with(
            &mut server,
            "createTags",
            &[("resourceids", VOLUME_ID), ("tags[0].key", "env")],
            "job-2",
            json!({"success": true}),
        )
        .await;
        let attach = mock_async_job_with(
            &mut server,
            "attachVolume",
            &[("id", VOLUME_ID), ("virtualmachineid", VM_ID), ("deviceid", "4")],
            "job-3",
            json!({"volume": volume_json(true, 10)}),
        )
        .await;
        let _list = mock_command_with(&mut server, "listVolumes", &[("id", VOLUME_ID)])
            .with_body(list_body("listVolumes", "volume", json!([volume_json(true, 10)])))
            .create_async()
            .await;

        let mut resource = DiskResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .create(Context::new(), create_request("cosmic_disk", planned(true)))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        attach.0.assert_async().await;
        assert_eq!(get_string(&response.new_state, "id"), VOLUME_ID);
        assert_eq!(get_string(&response.new_state, "zone"), "ams1");
        assert_eq!(get_string(&response.new_state, "disk_offering"), OFFERING_ID);
        assert_eq!(get_i64(&response.new_state, "size"), Some(10));
        assert_eq!(get_i64(&response.new_state, "device_id"), Some(4));
        assert!(get_bool(&response.new_state, "attach"));
    }

    #[tokio::test]
    async fn failed_attach_keeps_created_disk_in_state() {
        let mut server = mockito::Server::new_async().await;
        let _zone = mock_command_with(&mut server, "listZones", &[("name", "ams1")])
            .with_body(list_body("listZones", "zone", json!([{"id": ZONE_ID, "name": "ams1"}])))
            .create_async()
            .await;
        let _create = mock_async_job_with(
            &mut server,
            "createVolume",
            &[("name", "data")],
            "job-1",
            json!({"volume": volume_json(false, 10)}),
        )
        .await;
        let _tags = mock_async_job_with(
            &mut server,
            "createTags",
            &[("resourceids", VOLUME_ID)],
            "job-2",
            json!({"success": true}),
        )
        .await;
        let _attach = mock_command_with(&mut server, "attachVolume", &[("id", VOLUME_ID)])
            .with_status(431)
            .with_body(r#"{"attachvolumeresponse":{"errorcode":431,"cserrorcode":4350,"errortext":"Virtual machine is not running"}}"#)
            .create_async()
            .await;

        let mut resource = DiskResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let response = resource
            .create(Context::new(), create_request("cosmic_disk", planned(true)))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("Virtual machine is not running"));
        assert_eq!(get_string(&response.new_state, "id"), VOLUME_ID);
    }

    #[tokio::test]
    async fn update_resizes_disk() {
        let mut server = mockito::Server::new_async().await;
        let resize = mock_async_job_with(
            &mut server,
            "resizeVolume",
            &[("id", VOLUME_ID), ("size", "20"), ("shrinkok", "false")],
            "job-1",
            json!({"volume": volume_json(true, 20)}),
        )
        .await;
        let _list = mock_command_with(&mut server, "listVolumes", &[("id", VOLUME_ID)])
            .with_body(list_body("listVolumes", "volume", json!([volume_json(true, 20)])))
            .create_async()
            .await;

        let mut resource = DiskResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let mut prior = planned(true);
        set_string(&mut prior, "id", VOLUME_ID);
        set_i64(&mut prior, "size", Some(10));
        let mut next = prior.clone();
        set_i64(&mut next, "size", Some(20));

        let response = resource
            .update(Context::new(), update_request("cosmic_disk", prior, next))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        resize.0.assert_async().await;
        assert_eq!(get_i64(&response.new_state, "size"), Some(20));
    }

    #[tokio::test]
    async fn delete_detaches_first() {
        let mut server = mockito::Server::new_async().await;
        let detach = mock_async_job_with(
            &mut server,
            "detachVolume",
            &[("id", VOLUME_ID)],
            "job-1",
            json!({"volume": volume_json(false, 10)}),
        )
        .await;
        let delete = mock_command_with(&mut server, "deleteVolume", &[("id", VOLUME_ID)])
            .with_body(r#"{"deletevolumeresponse":{"success":"true"}}"#)
            .create_async()
            .await;

        let mut resource = DiskResource::new();
        resource.provider_data = Some(provider_data(&server.url()));

        let mut prior = planned(true);
        set_string(&mut prior, "id", VOLUME_ID);

        let response = resource
            .delete(Context::new(), delete_request("cosmic_disk", prior))
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        detach.0.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn attach_requires_virtual_machine() {
        let resource = DiskResource::new();
        let config = state(&[("attach", Dynamic::Bool(true)), ("virtual_machine_id", Dynamic::Null)]);

        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "cosmic_disk".to_string(),
                    config,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
    }
}
