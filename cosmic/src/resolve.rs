//! Name-or-ID resolution
//!
//! Attributes such as `zone` or `service_offering` accept either a UUID or a
//! name. Names are looked up through the matching list command; state keeps
//! whichever form the user wrote.

use regex::Regex;
use std::sync::OnceLock;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use thiserror::Error;

use crate::api::{ApiError, ApiParams, Client, NamedEntity};

/// Marker the control plane uses for "no limit"
pub const UNLIMITED_RESOURCE_ID: &str = "-1";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No match found for {0}")]
    NoMatch(String),

    #[error("Could not find an exact match for {0}")]
    NoExactMatch(String),

    #[error("Unknown request: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
#[error("Error retrieving ID of {kind} {value}: {source}")]
pub struct ResolveError {
    pub kind: String,
    pub value: String,
    #[source]
    pub source: LookupError,
}

/// List command, result key and filter parameter for each lookup kind
fn lookup_for(kind: &str) -> Option<(&'static str, &'static str, &'static str)> {
    Some(match kind {
        "disk_offering" => ("listDiskOfferings", "diskoffering", "name"),
        "service_offering" => ("listServiceOfferings", "serviceoffering", "name"),
        "network_offering" => ("listNetworkOfferings", "networkoffering", "name"),
        "vpc_offering" => ("listVPCOfferings", "vpcoffering", "name"),
        "zone" => ("listZones", "zone", "name"),
        "project" => ("listProjects", "project", "name"),
        "os_type" => ("listOsTypes", "ostype", "description"),
        _ => return None,
    })
}

pub fn is_id(value: &str) -> bool {
    static UUID: OnceLock<Option<Regex>> = OnceLock::new();

    UUID.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .ok()
    })
    .as_ref()
    .is_some_and(|re| re.is_match(value))
}

/// Returns `value` when it already is an ID, otherwise the ID of the entity
/// of `kind` named `value`
pub async fn retrieve_id(client: &Client, kind: &str, value: &str) -> Result<String, ResolveError> {
    if is_id(value) {
        return Ok(value.to_string());
    }

    let wrap = |source: LookupError| ResolveError {
        kind: kind.to_string(),
        value: value.to_string(),
        source,
    };

    let (command, key, filter) =
        lookup_for(kind).ok_or_else(|| wrap(LookupError::UnknownKind(kind.to_string())))?;

    tracing::debug!("Retrieving ID of {} {}", kind, value);

    let mut params = ApiParams::new().add(filter, value);
    if kind == "project" {
        params = params.add("listall", true);
    }

    let entities: Vec<NamedEntity> = client
        .list(command, key, params)
        .await
        .map_err(|e| wrap(LookupError::Api(e)))?;

    pick_match(&entities, value, filter == "description").map_err(wrap)
}

/// Resolves a template name among the executable templates of a zone
pub async fn retrieve_template_id(
    client: &Client,
    zone_id: &str,
    value: &str,
) -> Result<String, ResolveError> {
    if is_id(value) {
        return Ok(value.to_string());
    }

    let wrap = |source: LookupError| ResolveError {
        kind: "template".to_string(),
        value: value.to_string(),
        source,
    };

    let params = ApiParams::new()
        .add("templatefilter", "executable")
        .add("name", value)
        .add("zoneid", zone_id);

    let templates: Vec<NamedEntity> = client
        .list("listTemplates", "template", params)
        .await
        .map_err(|e| wrap(LookupError::Api(e)))?;

    pick_match(&templates, value, false).map_err(wrap)
}

/// Single result wins; among several only an exact, case-sensitive match does
fn pick_match(
    entities: &[NamedEntity],
    value: &str,
    by_description: bool,
) -> Result<String, LookupError> {
    let label = |e: &NamedEntity| {
        if by_description {
            e.description.clone()
        } else {
            e.name.clone()
        }
    };

    match entities {
        [] => Err(LookupError::NoMatch(value.to_string())),
        [only] => Ok(only.id.clone()),
        many => many
            .iter()
            .find(|e| label(e) == value)
            .map(|e| e.id.clone())
            .ok_or_else(|| LookupError::NoExactMatch(value.to_string())),
    }
}

/// Stores `id` when the configured value of `key` is an ID and `name` otherwise
pub fn set_value_or_id(
    state: &mut DynamicValue,
    key: &str,
    name: &str,
    id: &str,
) {
    let current = state
        .get_string(&AttributePath::new(key))
        .unwrap_or_default();

    let value = if current == UNLIMITED_RESOURCE_ID && id.is_empty() {
        UNLIMITED_RESOURCE_ID
    } else if is_id(&current) {
        id
    } else {
        name
    };

    state.set_attribute(key, Dynamic::String(value.to_string()));
}

/// Resolves the optional `project` attribute to a project ID
pub async fn project_id(
    client: &Client,
    state: &DynamicValue,
) -> Result<Option<String>, ResolveError> {
    match state.get_string(&AttributePath::new("project")) {
        Ok(project) if !project.is_empty() => {
            retrieve_id(client, "project", &project).await.map(Some)
        }
        _ => Ok(None),
    }
}
