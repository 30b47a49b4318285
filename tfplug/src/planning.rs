//! Schema-driven planning and validation
//!
//! These functions hold the framework's automatic behaviour for
//! PlanResourceChange and ValidateResourceConfig. They operate on decoded
//! values only, so the gRPC layer stays a thin translation shell.

use crate::schema::{
    Attribute, Block, DefaultRequest, NestedBlock, NestingMode, PlanModifierRequest,
    ValidatorRequest,
};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;

/// Result of the framework's part of planning
#[derive(Debug)]
pub struct PlannedChange {
    pub planned_state: Dynamic,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the planned state from Terraform's proposed new state.
///
/// - destroy (proposed null) plans null
/// - defaults fill attributes the config leaves null
/// - on create, computed attributes the config leaves null become unknown
/// - computed attributes of nested block elements that are null become unknown
/// - plan modifiers run per attribute; replacement only applies to updates
pub fn plan_change(
    block: &Block,
    prior_state: &Dynamic,
    proposed_new_state: Dynamic,
    config: &Dynamic,
) -> PlannedChange {
    let mut change = PlannedChange {
        planned_state: Dynamic::Null,
        requires_replace: Vec::new(),
        diagnostics: Vec::new(),
    };

    let mut planned = match proposed_new_state {
        Dynamic::Map(map) => map,
        Dynamic::Null => return change,
        other => {
            change.planned_state = other;
            return change;
        }
    };

    let creating = prior_state.is_null();
    let empty = HashMap::new();
    let config_map = config.as_map().unwrap_or(&empty);
    let prior_map = prior_state.as_map().unwrap_or(&empty);

    for attr in &block.attributes {
        let config_value = config_map.get(&attr.name).unwrap_or(&Dynamic::Null);
        let path = AttributePath::new(&attr.name);

        if config_value.is_null() {
            if let Some(default) = &attr.default {
                let response = default.default_value(DefaultRequest { path: path.clone() });
                planned.insert(attr.name.clone(), response.value.value);
            } else if attr.computed {
                let current = planned.get(&attr.name).unwrap_or(&Dynamic::Null);
                if creating || (current.is_null() && !prior_map.contains_key(&attr.name)) {
                    planned.insert(attr.name.clone(), Dynamic::Unknown);
                }
            }
        }

        if attr.plan_modifiers.is_empty() {
            continue;
        }

        let state_value = prior_map.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
        let mut plan_value = planned.get(&attr.name).cloned().unwrap_or(Dynamic::Null);

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value.clone()),
                state_value: DynamicValue::new(state_value.clone()),
                plan_value: DynamicValue::new(plan_value),
                path: path.clone(),
            });

            plan_value = response.plan_value.value;
            change.diagnostics.extend(response.diagnostics);

            if response.requires_replace && !creating && !change.requires_replace.contains(&path)
            {
                change.requires_replace.push(path.clone());
            }
        }

        planned.insert(attr.name.clone(), plan_value);
    }

    for nested in &block.block_types {
        if let Some(value) = planned.remove(&nested.type_name) {
            planned.insert(nested.type_name.clone(), plan_nested(nested, value));
        }
    }

    change.planned_state = Dynamic::Map(planned);
    change
}

fn plan_nested(nested: &NestedBlock, value: Dynamic) -> Dynamic {
    match (nested.nesting, value) {
        (NestingMode::List | NestingMode::Set, Dynamic::List(items)) => Dynamic::List(
            items
                .into_iter()
                .map(|item| plan_nested_element(&nested.block, item))
                .collect(),
        ),
        (NestingMode::Single | NestingMode::Group, item @ Dynamic::Map(_)) => {
            plan_nested_element(&nested.block, item)
        }
        (_, other) => other,
    }
}

fn plan_nested_element(block: &Block, value: Dynamic) -> Dynamic {
    let mut element = match value {
        Dynamic::Map(map) => map,
        other => return other,
    };

    for attr in &block.attributes {
        let current = element.get(&attr.name).unwrap_or(&Dynamic::Null);
        if !current.is_null() {
            continue;
        }

        if let Some(default) = &attr.default {
            let response = default.default_value(DefaultRequest {
                path: AttributePath::new(&attr.name),
            });
            element.insert(attr.name.clone(), response.value.value);
        } else if attr.computed {
            element.insert(attr.name.clone(), Dynamic::Unknown);
        }
    }

    for nested in &block.block_types {
        if let Some(value) = element.remove(&nested.type_name) {
            element.insert(nested.type_name.clone(), plan_nested(nested, value));
        }
    }

    Dynamic::Map(element)
}

/// Validates a configuration object against a block: unknown keys, missing
/// required attributes, type shape, attribute validators, and nested block
/// item counts. Unknown values are never validated.
pub fn validate_block(block: &Block, config: &Dynamic, base: &AttributePath) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Dynamic::Map(values) = config else {
        return diagnostics;
    };

    for key in values.keys() {
        if block.attribute(key).is_none() && block.nested_block(key).is_none() {
            let path = base.clone().attribute(key);
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here.", path),
                )
                .with_attribute(path),
            );
        }
    }

    for attr in &block.attributes {
        let value = values.get(&attr.name).unwrap_or(&Dynamic::Null);
        let path = base.clone().attribute(&attr.name);
        diagnostics.extend(validate_attribute(attr, value, path));
    }

    for nested in &block.block_types {
        let value = values.get(&nested.type_name).unwrap_or(&Dynamic::Null);
        let path = base.clone().attribute(&nested.type_name);

        let Dynamic::List(items) = value else {
            if let Dynamic::Map(_) = value {
                diagnostics.extend(validate_block(&nested.block, value, &path));
            }
            continue;
        };

        let count = items.len() as i64;
        if nested.min_items > 0 && count < nested.min_items {
            diagnostics.push(
                Diagnostic::error(
                    format!("Insufficient {} blocks", nested.type_name),
                    format!(
                        "At least {} \"{}\" blocks are required.",
                        nested.min_items, nested.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            diagnostics.push(
                Diagnostic::error(
                    format!("Too many {} blocks", nested.type_name),
                    format!(
                        "No more than {} \"{}\" blocks are allowed.",
                        nested.max_items, nested.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }

        for (idx, item) in items.iter().enumerate() {
            let item_path = path.clone().index(idx as i64);
            diagnostics.extend(validate_block(&nested.block, item, &item_path));
        }
    }

    diagnostics
}

fn validate_attribute(attr: &Attribute, value: &Dynamic, path: AttributePath) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if value.is_null() {
        if attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Missing required argument",
                    format!("The argument \"{}\" is required, but no definition was found.", path),
                )
                .with_attribute(path),
            );
        }
        return diagnostics;
    }

    if !attr.optional && !attr.required && !value.is_unknown() {
        diagnostics.push(
            Diagnostic::error(
                "Value for unconfigurable attribute",
                format!("Can't configure a value for \"{}\": its value will be decided automatically.", path),
            )
            .with_attribute(path),
        );
        return diagnostics;
    }

    if !attr.r#type.accepts(value) {
        diagnostics.push(
            Diagnostic::error(
                "Incorrect attribute value type",
                format!(
                    "Inappropriate value for attribute \"{}\": got {}.",
                    path,
                    value.type_name()
                ),
            )
            .with_attribute(path),
        );
        return diagnostics;
    }

    if !value.is_fully_known() {
        return diagnostics;
    }

    for validator in &attr.validators {
        let response = validator.validate(ValidatorRequest {
            config_value: DynamicValue::new(value.clone()),
            path: path.clone(),
        });
        diagnostics.extend(response.diagnostics);
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::plan_modifier::RequiresReplace;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
    use crate::validator::StringOneOf;

    fn block() -> Block {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("acl_id", AttributeType::String)
                    .optional()
                    .default(StaticDefault::string("none"))
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("rule", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("protocol", AttributeType::String)
                            .required()
                            .validator(StringOneOf::create(&["tcp", "udp", "icmp", "all"]))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("action", AttributeType::String)
                            .optional()
                            .default(StaticDefault::string("allow"))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new(
                            "uuids",
                            AttributeType::Map(Box::new(AttributeType::String)),
                        )
                        .computed()
                        .build(),
                    )
                    .build(),
            )
            .build()
            .block
    }

    fn obj(pairs: Vec<(&str, Dynamic)>) -> Dynamic {
        Dynamic::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn destroy_plans_null() {
        let prior = obj(vec![("id", "1".into())]);
        let change = plan_change(&block(), &prior, Dynamic::Null, &Dynamic::Null);
        assert!(change.planned_state.is_null());
        assert!(change.requires_replace.is_empty());
    }

    #[test]
    fn create_marks_computed_unknown_and_applies_defaults() {
        let config = obj(vec![
            ("id", Dynamic::Null),
            ("name", "web".into()),
            ("zone", "z1".into()),
            ("acl_id", Dynamic::Null),
            (
                "rule",
                Dynamic::List(vec![obj(vec![
                    ("protocol", "tcp".into()),
                    ("action", Dynamic::Null),
                    ("uuids", Dynamic::Null),
                ])]),
            ),
        ]);

        let change = plan_change(&block(), &Dynamic::Null, config.clone(), &config);
        let planned = DynamicValue::new(change.planned_state);

        assert_eq!(planned.get(&AttributePath::new("id")), Some(&Dynamic::Unknown));
        assert_eq!(
            planned.get_string(&AttributePath::new("acl_id")).unwrap(),
            "none"
        );
        let rule = AttributePath::new("rule").index(0);
        assert_eq!(
            planned.get_string(&rule.clone().attribute("action")).unwrap(),
            "allow"
        );
        assert_eq!(
            planned.get(&rule.attribute("uuids")),
            Some(&Dynamic::Unknown)
        );
        assert!(change.requires_replace.is_empty());
    }

    #[test]
    fn update_keeps_prior_computed_values_and_flags_replacement() {
        let prior = obj(vec![
            ("id", "vpc-1".into()),
            ("name", "web".into()),
            ("zone", "z1".into()),
            ("acl_id", "none".into()),
            ("rule", Dynamic::List(vec![])),
        ]);
        let config = obj(vec![
            ("id", Dynamic::Null),
            ("name", "web".into()),
            ("zone", "z2".into()),
            ("acl_id", Dynamic::Null),
            ("rule", Dynamic::List(vec![])),
        ]);
        let proposed = obj(vec![
            ("id", "vpc-1".into()),
            ("name", "web".into()),
            ("zone", "z2".into()),
            ("acl_id", "none".into()),
            ("rule", Dynamic::List(vec![])),
        ]);

        let change = plan_change(&block(), &prior, proposed, &config);
        let planned = DynamicValue::new(change.planned_state);

        assert_eq!(planned.get_string(&AttributePath::new("id")).unwrap(), "vpc-1");
        assert_eq!(change.requires_replace, vec![AttributePath::new("zone")]);
    }

    #[test]
    fn validation_reports_nested_validator_errors_with_path() {
        let config = obj(vec![
            ("name", "web".into()),
            ("zone", "z1".into()),
            (
                "rule",
                Dynamic::List(vec![obj(vec![("protocol", "gre".into())])]),
            ),
        ]);

        let diagnostics = validate_block(&block(), &config, &AttributePath::root());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some(AttributePath::new("rule").index(0).attribute("protocol"))
        );
    }

    #[test]
    fn validation_skips_unknown_values_and_flags_missing_required() {
        let config = obj(vec![("name", Dynamic::Unknown), ("zone", Dynamic::Null)]);

        let diagnostics = validate_block(&block(), &config, &AttributePath::root());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing required argument");
    }

    #[test]
    fn validation_rejects_computed_only_values() {
        let config = obj(vec![
            ("id", "x".into()),
            ("name", "web".into()),
            ("zone", "z1".into()),
        ]);

        let diagnostics = validate_block(&block(), &config, &AttributePath::root());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("id")));
    }
}
