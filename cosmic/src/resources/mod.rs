//! Resource implementations
//!
//! Every resource keeps the shape Terraform expects: create and update end
//! by reading the entity back, read drops entities the control plane no
//! longer knows, and delete treats an already missing entity as deleted.

pub mod compute;
pub mod network;
pub mod rules;
pub mod vpn;

use std::collections::HashMap;
use tfplug::plan_modifier::{values_equal, RequiresReplace};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceResponse,
    DeleteResourceResponse, ImportResourceStateRequest, ImportResourceStateResponse,
    ReadResourceResponse, UpdateResourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::Context;

use crate::api::{Client, Tag};
use crate::CosmicProviderData;

/// Stores the provider data handed to a resource. Terraform validates
/// configurations before the provider is configured, so missing data is fine.
pub(crate) fn configure_resource(
    slot: &mut Option<CosmicProviderData>,
    request: ConfigureResourceRequest,
) -> ConfigureResourceResponse {
    let mut diagnostics = vec![];

    if let Some(data) = request.provider_data {
        if let Some(provider_data) = data.downcast_ref::<CosmicProviderData>() {
            *slot = Some(provider_data.clone());
        } else {
            diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Failed to extract CosmicProviderData from provider data",
            ));
        }
    }

    ConfigureResourceResponse { diagnostics }
}

pub(crate) fn client(data: &Option<CosmicProviderData>) -> Result<&Client, Diagnostic> {
    data.as_ref()
        .map(|d| d.client.as_ref())
        .ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "Provider data was not properly configured",
            )
        })
}

/// A failed create or update. `state` is recorded when the remote entity
/// exists despite the failure.
#[derive(Debug)]
pub struct OperationError {
    pub diagnostic: Diagnostic,
    pub state: Option<DynamicValue>,
}

impl OperationError {
    pub fn with_state(mut self, state: DynamicValue) -> Self {
        self.state = Some(state);
        self
    }
}

impl From<Diagnostic> for OperationError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostic,
            state: None,
        }
    }
}

pub(crate) type OperationResult = Result<DynamicValue, OperationError>;

pub(crate) fn create_response(result: OperationResult) -> CreateResourceResponse {
    match result {
        Ok(new_state) => CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics: vec![],
        },
        Err(e) => CreateResourceResponse {
            new_state: e.state.unwrap_or_else(DynamicValue::null),
            private: vec![],
            diagnostics: vec![e.diagnostic],
        },
    }
}

pub(crate) fn update_response(prior_state: DynamicValue, result: OperationResult) -> UpdateResourceResponse {
    match result {
        Ok(new_state) => UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics: vec![],
        },
        Err(e) => UpdateResourceResponse {
            new_state: e.state.unwrap_or(prior_state),
            private: vec![],
            diagnostics: vec![e.diagnostic],
        },
    }
}

pub(crate) fn read_response(
    current_state: DynamicValue,
    private: Vec<u8>,
    result: Result<Option<DynamicValue>, Diagnostic>,
) -> ReadResourceResponse {
    match result {
        Ok(new_state) => ReadResourceResponse {
            new_state,
            diagnostics: vec![],
            private,
        },
        Err(diagnostic) => ReadResourceResponse {
            new_state: Some(current_state),
            diagnostics: vec![diagnostic],
            private,
        },
    }
}

pub(crate) fn delete_response(result: Result<(), Diagnostic>) -> DeleteResourceResponse {
    DeleteResourceResponse {
        diagnostics: result.err().into_iter().collect(),
    }
}

/// Imports by ID; the following read fills in the rest
pub(crate) fn import_by_id(ctx: &Context, request: &ImportResourceStateRequest) -> ImportResourceStateResponse {
    let mut response = ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![],
    };
    tfplug::import_state_passthrough_id(ctx, AttributePath::new("id"), request, &mut response);
    response
}

/// Turns the read that follows a create or update into the final state
pub(crate) fn read_back(
    label: &str,
    state: DynamicValue,
    result: Result<Option<DynamicValue>, Diagnostic>,
) -> OperationResult {
    match result {
        Ok(Some(new_state)) => Ok(new_state),
        Ok(None) => Err(Diagnostic::error(
            format!("{} not found", label),
            format!("{} {} disappeared right after it was applied", label, get_string(&state, "id")),
        )
        .into()),
        Err(diagnostic) => Err(OperationError {
            diagnostic,
            state: Some(state),
        }),
    }
}

pub(crate) fn gone(label: &str, name: &str) -> Option<DynamicValue> {
    tracing::debug!("{} {} does no longer exist", label, name);
    None
}

// Schema building blocks

pub(crate) fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("The ID of the resource")
        .computed()
        .build()
}

pub(crate) fn project_attribute() -> Attribute {
    AttributeBuilder::new("project", AttributeType::String)
        .description("The name or ID of the project")
        .optional()
        .computed()
        .plan_modifier(RequiresReplace::create())
        .build()
}

pub(crate) fn zone_attribute() -> Attribute {
    AttributeBuilder::new("zone", AttributeType::String)
        .description("The name or ID of the zone")
        .required()
        .plan_modifier(RequiresReplace::create())
        .build()
}

pub(crate) fn tags_attribute() -> Attribute {
    AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
        .description("Key/value tags")
        .optional()
        .computed()
        .build()
}

/// A string attribute that forces a new resource when changed; optional ones
/// are also computed so the control plane can fill them in
pub(crate) fn force_new(name: &str, description: &str, required: bool) -> Attribute {
    let builder = AttributeBuilder::new(name, AttributeType::String).description(description);
    let builder = if required {
        builder.required()
    } else {
        builder.optional().computed()
    };
    builder.plan_modifier(RequiresReplace::create()).build()
}

// State accessors. Null and unknown values read as empty.

pub(crate) fn get_string(value: &DynamicValue, name: &str) -> String {
    value
        .get_string(&AttributePath::new(name))
        .unwrap_or_default()
}

pub(crate) fn get_optional_string(value: &DynamicValue, name: &str) -> Option<String> {
    value
        .get_string(&AttributePath::new(name))
        .ok()
        .filter(|s| !s.is_empty())
}

pub(crate) fn get_i64(value: &DynamicValue, name: &str) -> Option<i64> {
    value
        .get_number(&AttributePath::new(name))
        .ok()
        .map(|n| n as i64)
}

pub(crate) fn get_optional_bool(value: &DynamicValue, name: &str) -> Option<bool> {
    value.get_bool(&AttributePath::new(name)).ok()
}

pub(crate) fn get_bool(value: &DynamicValue, name: &str) -> bool {
    get_optional_bool(value, name).unwrap_or(false)
}

pub(crate) fn get_strings(value: &DynamicValue, name: &str) -> Vec<String> {
    value
        .get_list(&AttributePath::new(name))
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect()
}

pub(crate) fn get_tags(value: &DynamicValue) -> HashMap<String, String> {
    value
        .get_map(&AttributePath::new("tags"))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect()
}

pub(crate) fn set_string(state: &mut DynamicValue, name: &str, value: impl Into<String>) {
    state.set_attribute(name, Dynamic::String(value.into()));
}

/// Empty strings are stored as null
pub(crate) fn set_optional_string(state: &mut DynamicValue, name: &str, value: &str) {
    let value = if value.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::String(value.to_string())
    };
    state.set_attribute(name, value);
}

pub(crate) fn set_i64(state: &mut DynamicValue, name: &str, value: Option<i64>) {
    let value = match value {
        Some(n) => Dynamic::Number(n as f64),
        None => Dynamic::Null,
    };
    state.set_attribute(name, value);
}

pub(crate) fn set_bool(state: &mut DynamicValue, name: &str, value: bool) {
    state.set_attribute(name, Dynamic::Bool(value));
}

pub(crate) fn set_strings(state: &mut DynamicValue, name: &str, values: Vec<String>) {
    state.set_attribute(
        name,
        Dynamic::List(values.into_iter().map(Dynamic::String).collect()),
    );
}

pub(crate) fn set_tags(state: &mut DynamicValue, tags: &[Tag]) {
    let map = tags
        .iter()
        .map(|t| (t.key.clone(), Dynamic::String(t.value.clone())))
        .collect();
    state.set_attribute("tags", Dynamic::Map(map));
}

/// Values the control plane does not report must still be known after apply
pub(crate) fn null_if_unknown(state: &mut DynamicValue, name: &str) {
    if state
        .get(&AttributePath::new(name))
        .is_some_and(Dynamic::is_unknown)
    {
        state.set_attribute(name, Dynamic::Null);
    }
}

/// Stores the project in the form the user wrote; no project stays null
pub(crate) fn set_project(state: &mut DynamicValue, name: &str, id: &str) {
    if name.is_empty() && id.is_empty() {
        state.set_attribute("project", Dynamic::Null);
    } else {
        crate::resolve::set_value_or_id(state, "project", name, id);
    }
}

/// Whether `name` differs between two states
pub(crate) fn has_change(prior: &DynamicValue, planned: &DynamicValue, name: &str) -> bool {
    let path = AttributePath::new(name);
    let null = Dynamic::Null;
    !values_equal(
        prior.get(&path).unwrap_or(&null),
        planned.get(&path).unwrap_or(&null),
    )
}

/// Diagnostic for a failed control-plane call
pub(crate) fn api_error(summary: impl Into<String>, detail: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::error(summary, detail.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use tfplug::resource::{
        CreateResourceRequest, DeleteResourceRequest, ImportResourceStateRequest,
        ReadResourceRequest, UpdateResourceRequest,
    };
    use tfplug::types::{ClientCapabilities, Dynamic, DynamicValue};

    use crate::api::test_helpers::create_test_client;
    use crate::CosmicProviderData;

    pub fn provider_data(server_url: &str) -> CosmicProviderData {
        CosmicProviderData {
            client: Arc::new(create_test_client(server_url)),
        }
    }

    pub fn state(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        DynamicValue::new(Dynamic::Map(map))
    }

    pub fn s(value: &str) -> Dynamic {
        Dynamic::String(value.to_string())
    }

    pub fn n(value: f64) -> Dynamic {
        Dynamic::Number(value)
    }

    pub fn list(values: &[&str]) -> Dynamic {
        Dynamic::List(values.iter().map(|v| s(v)).collect())
    }

    pub fn create_request(type_name: &str, planned: DynamicValue) -> CreateResourceRequest {
        CreateResourceRequest {
            type_name: type_name.to_string(),
            config: planned.clone(),
            planned_state: planned,
            planned_private: vec![],
            provider_meta: None,
        }
    }

    pub fn read_request(type_name: &str, current: DynamicValue) -> ReadResourceRequest {
        ReadResourceRequest {
            type_name: type_name.to_string(),
            current_state: current,
            private: vec![],
            provider_meta: None,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    pub fn update_request(
        type_name: &str,
        prior: DynamicValue,
        planned: DynamicValue,
    ) -> UpdateResourceRequest {
        UpdateResourceRequest {
            type_name: type_name.to_string(),
            config: planned.clone(),
            prior_state: prior,
            planned_state: planned,
            planned_private: vec![],
            provider_meta: None,
        }
    }

    pub fn import_request(type_name: &str, id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: type_name.to_string(),
            id: id.to_string(),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    pub fn delete_request(type_name: &str, prior: DynamicValue) -> DeleteResourceRequest {
        DeleteResourceRequest {
            type_name: type_name.to_string(),
            prior_state: prior,
            planned_private: vec![],
            provider_meta: None,
        }
    }
}
