//! SSH key pair resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
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
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::Client;
use crate::resolve::project_id;
use crate::resources::{
    api_error, client, configure_resource, create_response, delete_response, get_optional_string,
    get_string, gone, id_attribute, import_by_id, null_if_unknown, project_attribute, read_back,
    read_response, set_optional_string, set_string, OperationResult,
};

#[derive(Default)]
pub struct SshKeyPairResource {
    provider_data: Option<crate::CosmicProviderData>,
}

impl SshKeyPairResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key pairs are identified by name, so the ID is the name
    async fn read_state(
        client: &Client,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let name = get_string(&state, "id");
        tracing::debug!("Looking for key pair with name {}", name);

        let project = project_id(client, &state)
            .await
            .map_err(|e| api_error("Error reading key pair", e))?;

        let Some(pair) = client
            .ssh_keypairs()
            .get(&name, project.as_deref())
            .await
            .map_err(|e| api_error(format!("Error reading key pair {}", name), e))?
        else {
            return Ok(gone("Key pair", &name));
        };

        set_string(&mut state, "name", &pair.name);
        set_string(&mut state, "fingerprint", &pair.fingerprint);
        null_if_unknown(&mut state, "private_key");
        null_if_unknown(&mut state, "project");

        Ok(Some(state))
    }

    async fn create_pair(&self, _ctx: &Context, planned: DynamicValue) -> OperationResult {
        let client = client(&self.provider_data)?;
        let name = get_string(&planned, "name");
        let summary = format!("Error creating key pair {}", name);

        let project = project_id(client, &planned)
            .await
            .map_err(|e| api_error(&summary, e))?;

        let mut state = planned;
        match get_optional_string(&state, "public_key") {
            Some(public_key) => {
                client
                    .ssh_keypairs()
                    .register(&name, &public_key, project.as_deref())
                    .await
                    .map_err(|e| api_error(&summary, e))?;
                null_if_unknown(&mut state, "private_key");
            }
            None => {
                let pair = client
                    .ssh_keypairs()
                    .create(&name, project.as_deref())
                    .await
                    .map_err(|e| api_error(&summary, e))?;
                set_optional_string(&mut state, "private_key", &pair.privatekey);
            }
        }

        tracing::debug!("Key pair {} successfully generated", name);
        set_string(&mut state, "id", &name);

        let result = Self::read_state(client, state.clone()).await;
        read_back("Key pair", state, result)
    }

    async fn delete_pair(&self, prior: DynamicValue) -> Result<(), Diagnostic> {
        let client = client(&self.provider_data)?;
        let name = get_string(&prior, "id");

        let project = project_id(client, &prior)
            .await
            .map_err(|e| api_error("Error deleting key pair", e))?;

        match client.ssh_keypairs().delete(&name, project.as_deref()).await {
            Ok(()) => Ok(()),
            Err(e)
                if e.to_string().contains(&format!(
                    "A key pair with name '{}' does not exist for account",
                    name
                )) =>
            {
                Ok(())
            }
            Err(e) => Err(api_error("Error deleting key pair", e)),
        }
    }
}

#[async_trait]
impl Resource for SshKeyPairResource {
    fn type_name(&self) -> &str {
        "cosmic_ssh_keypair"
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
            .description("Registers or generates an SSH key pair")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the key pair")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_key", AttributeType::String)
                    .description("The public key to register; a key pair is generated when unset")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(project_attribute())
            .attribute(
                AttributeBuilder::new("private_key", AttributeType::String)
                    .description("The private key of a generated key pair")
                    .computed()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("fingerprint", AttributeType::String)
                    .description("The fingerprint of the public key")
                    .computed()
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
        create_response(self.create_pair(&ctx, request.planned_state).await)
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

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        delete_response(self.delete_pair(request.prior_state).await)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for SshKeyPairResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for SshKeyPairResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}
