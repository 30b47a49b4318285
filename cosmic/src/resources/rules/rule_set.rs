//! Machinery shared by resources that manage a set of remote rules
//!
//! Every configured rule fans out into one remote rule per port (or a single
//! one for icmp and all). The remote IDs are tracked in the rule's `uuids`
//! map, keyed by port or protocol, which is how a read finds them again.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRange, StringOneOf};

use crate::api::{ApiError, Client};
use crate::resources::{
    api_error, get_bool, get_string, gone, set_string, OperationError, OperationResult,
};
use crate::retry::ignore_gone;
use crate::rules::{diff_rules, PortRange, Rule, PROTOCOLS};

pub const ACTIONS: &[&str] = &["allow", "deny"];
pub const TRAFFIC_TYPES: &[&str] = &["ingress", "egress"];

/// Concurrent remote calls when none is configured
pub const DEFAULT_PARALLELISM: i64 = 2;

/// A rule as the control plane lists it, one per port range
#[derive(Debug, Clone, Default)]
pub struct RemoteRule {
    pub id: String,
    pub protocol: String,
    pub cidr_list: Vec<String>,
    pub icmp_type: Option<i64>,
    pub icmp_code: Option<i64>,
    pub ports: Option<PortRange>,
    pub action: Option<String>,
    pub traffic_type: Option<String>,
}

/// The entity a rule set is attached to
#[async_trait]
pub trait RuleTarget: Send + Sync {
    async fn list(&self, client: &Client) -> Result<Vec<RemoteRule>, ApiError>;

    /// Creates the remote rule for `ports` and returns its ID
    async fn create(
        &self,
        ctx: &Context,
        client: &Client,
        rule: &Rule,
        ports: Option<PortRange>,
    ) -> Result<String, ApiError>;

    async fn delete(&self, ctx: &Context, client: &Client, id: &str) -> Result<(), ApiError>;
}

/// The `rule` block; ACL rules also carry an action and a traffic type
pub fn rule_block(with_acl_fields: bool) -> NestedBlock {
    let mut builder = NestedBlockBuilder::new("rule", NestingMode::Set)
        .description("A rule of the set")
        .attribute(
            AttributeBuilder::new("cidr_list", AttributeType::Set(Box::new(AttributeType::String)))
                .description("The CIDRs the rule applies to")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("protocol", AttributeType::String)
                .description("One of tcp, udp, icmp or all")
                .required()
                .validator(StringOneOf::create(PROTOCOLS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("icmp_type", AttributeType::Number)
                .description("The ICMP type, required for icmp rules")
                .optional()
                .validator(NumberRange::create(Some(-1.0), Some(255.0)))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("icmp_code", AttributeType::Number)
                .description("The ICMP code, required for icmp rules")
                .optional()
                .validator(NumberRange::create(Some(-1.0), Some(255.0)))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("ports", AttributeType::Set(Box::new(AttributeType::String)))
                .description("Ports and port ranges, required for tcp and udp rules")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("uuids", AttributeType::Map(Box::new(AttributeType::String)))
                .description("The IDs of the remote rules by port")
                .computed()
                .build(),
        );

    if with_acl_fields {
        builder = builder
            .attribute(
                AttributeBuilder::new("action", AttributeType::String)
                    .description("Either allow or deny")
                    .optional()
                    .default(StaticDefault::string("allow"))
                    .validator(StringOneOf::create(ACTIONS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("traffic_type", AttributeType::String)
                    .description("Either ingress or egress")
                    .optional()
                    .default(StaticDefault::string("ingress"))
                    .validator(StringOneOf::create(TRAFFIC_TYPES))
                    .build(),
            );
    }

    builder.build()
}

pub fn managed_attribute() -> Attribute {
    AttributeBuilder::new("managed", AttributeType::Bool)
        .description("Delete remote rules that are not in the configuration")
        .optional()
        .default(StaticDefault::bool(false))
        .build()
}

pub fn parallelism_attribute() -> Attribute {
    AttributeBuilder::new("parallelism", AttributeType::Number)
        .description("Number of rules created or deleted concurrently")
        .optional()
        .default(StaticDefault::number(DEFAULT_PARALLELISM as f64))
        .validator(NumberRange::create(Some(1.0), None))
        .build()
}

fn strings(value: Option<&Dynamic>) -> Vec<String> {
    value
        .and_then(Dynamic::as_list)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn number(value: Option<&Dynamic>) -> Option<i64> {
    value.and_then(Dynamic::as_number).map(|n| n as i64)
}

fn text(value: Option<&Dynamic>) -> Option<String> {
    value.and_then(Dynamic::as_str).map(String::from)
}

/// Reads one element of the `rule` block
pub fn rule_from_dynamic(value: &Dynamic) -> Option<Rule> {
    let fields = value.as_map()?;

    let uuids = fields
        .get("uuids")
        .and_then(Dynamic::as_map)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|id| (k.clone(), id.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some(Rule {
        protocol: text(fields.get("protocol")).unwrap_or_default(),
        cidr_list: strings(fields.get("cidr_list")),
        icmp_type: number(fields.get("icmp_type")),
        icmp_code: number(fields.get("icmp_code")),
        ports: strings(fields.get("ports")),
        action: text(fields.get("action")),
        traffic_type: text(fields.get("traffic_type")),
        uuids,
    })
}

pub fn rule_to_dynamic(rule: &Rule) -> Dynamic {
    let list = |values: &[String]| {
        if values.is_empty() {
            Dynamic::Null
        } else {
            Dynamic::List(values.iter().cloned().map(Dynamic::String).collect())
        }
    };
    let number = |n: Option<i64>| n.map(|n| Dynamic::Number(n as f64)).unwrap_or(Dynamic::Null);

    let mut fields = HashMap::new();
    fields.insert("protocol".to_string(), Dynamic::String(rule.protocol.clone()));
    fields.insert("cidr_list".to_string(), list(&rule.cidr_list));
    fields.insert("icmp_type".to_string(), number(rule.icmp_type));
    fields.insert("icmp_code".to_string(), number(rule.icmp_code));
    fields.insert("ports".to_string(), list(&rule.ports));
    fields.insert(
        "uuids".to_string(),
        Dynamic::Map(
            rule.uuids
                .iter()
                .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
                .collect(),
        ),
    );
    if let Some(action) = &rule.action {
        fields.insert("action".to_string(), Dynamic::String(action.clone()));
    }
    if let Some(traffic_type) = &rule.traffic_type {
        fields.insert("traffic_type".to_string(), Dynamic::String(traffic_type.clone()));
    }

    Dynamic::Map(fields)
}

pub fn get_rules(state: &DynamicValue) -> Vec<Rule> {
    state
        .get_list(&AttributePath::new("rule"))
        .unwrap_or_default()
        .iter()
        .filter_map(rule_from_dynamic)
        .collect()
}

pub fn set_rules(state: &mut DynamicValue, rules: &[Rule]) {
    state.set_attribute(
        "rule",
        Dynamic::List(rules.iter().map(rule_to_dynamic).collect()),
    );
}

/// Configured parallelism, never below one
pub fn parallelism(state: &DynamicValue) -> usize {
    let configured = state
        .get_number(&AttributePath::new("parallelism"))
        .map(|n| n as i64)
        .unwrap_or(DEFAULT_PARALLELISM);
    usize::try_from(configured).unwrap_or(1).max(1)
}

/// Checks the cross-field constraints of every fully known rule
pub fn validate_rules(config: &DynamicValue) -> Vec<Diagnostic> {
    let path = AttributePath::new("rule");
    let Ok(items) = config.get_list(&path) else {
        return vec![];
    };

    items
        .iter()
        .filter(|item| item.is_fully_known())
        .filter_map(rule_from_dynamic)
        .filter_map(|rule| rule.validate().err())
        .map(|e| Diagnostic::error("Invalid rule", e.to_string()).with_attribute(path.clone()))
        .collect()
}

/// Remote rules that make up one configured rule
fn fan_out(rule: &Rule) -> Vec<(String, Option<PortRange>)> {
    if rule.is_portless() {
        return vec![(rule.protocol.clone(), None)];
    }
    rule.ports
        .iter()
        .filter_map(|port| PortRange::parse(port).ok().map(|range| (port.clone(), Some(range))))
        .collect()
}

/// Creates the remote rules of `rules`, at most `parallelism` rules at a time.
/// Rules with at least one created remote rule are returned so a partial
/// failure is still tracked in state.
pub async fn create_rules(
    ctx: &Context,
    client: &Client,
    target: &dyn RuleTarget,
    rules: Vec<Rule>,
    parallelism: usize,
) -> (Vec<Rule>, Vec<String>) {
    let results: Vec<(Rule, Vec<String>)> = stream::iter(rules.into_iter().map(|mut rule| async move {
        let mut errors = vec![];
        for (key, ports) in fan_out(&rule) {
            if rule.uuids.contains_key(&key) {
                continue;
            }
            match target.create(ctx, client, &rule, ports).await {
                Ok(id) => {
                    rule.uuids.insert(key, id);
                }
                Err(e) => errors.push(format!("Error creating {} rule for {}: {}", rule.protocol, key, e)),
            }
        }
        (rule, errors)
    }))
    .buffer_unordered(parallelism.max(1))
    .collect()
    .await;

    let mut created = vec![];
    let mut errors = vec![];
    for (rule, rule_errors) in results {
        if !rule.uuids.is_empty() {
            created.push(rule);
        }
        errors.extend(rule_errors);
    }
    (created, errors)
}

/// Deletes the remote rules of `rules`. Whatever could not be deleted is
/// returned so it stays in state.
pub async fn delete_rules(
    ctx: &Context,
    client: &Client,
    target: &dyn RuleTarget,
    rules: Vec<Rule>,
    parallelism: usize,
) -> (Vec<Rule>, Vec<String>) {
    let results: Vec<(Rule, Vec<String>)> = stream::iter(rules.into_iter().map(|mut rule| async move {
        let mut errors = vec![];
        let mut remaining = BTreeMap::new();
        for (key, id) in std::mem::take(&mut rule.uuids) {
            if let Err(e) = ignore_gone(target.delete(ctx, client, &id).await, &id) {
                errors.push(format!("Error deleting {} rule {}: {}", rule.protocol, id, e));
                remaining.insert(key, id);
            }
        }
        rule.uuids = remaining;
        (rule, errors)
    }))
    .buffer_unordered(parallelism.max(1))
    .collect()
    .await;

    let mut left = vec![];
    let mut errors = vec![];
    for (rule, rule_errors) in results {
        if !rule.uuids.is_empty() {
            left.push(rule);
        }
        errors.extend(rule_errors);
    }
    (left, errors)
}

/// Applies the difference between two rule sets; the result is what ends up
/// in state, including rules whose deletion failed
pub async fn update_rules(
    ctx: &Context,
    client: &Client,
    target: &dyn RuleTarget,
    old: &[Rule],
    new: &[Rule],
    parallelism: usize,
) -> (Vec<Rule>, Vec<String>) {
    let diff = diff_rules(old, new);
    tracing::debug!(
        "Rule set: keeping {}, deleting {}, creating {}",
        diff.keep.len(),
        diff.delete.len(),
        diff.create.len()
    );

    let (mut rules, mut errors) = delete_rules(ctx, client, target, diff.delete, parallelism).await;
    let (created, create_errors) = create_rules(ctx, client, target, diff.create, parallelism).await;

    rules.extend(diff.keep);
    rules.extend(created);
    errors.extend(create_errors);
    (rules, errors)
}

fn lowercase(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.to_lowercase())
}

/// Maps the remote rules back onto `rules`. Remote rules that vanished drop
/// out of their rule, and a rule without any remote rule left is dropped.
/// With `managed`, remote rules nobody tracks are adopted as new rules.
pub async fn read_rules(
    client: &Client,
    target: &dyn RuleTarget,
    rules: Vec<Rule>,
    managed: bool,
) -> Result<Vec<Rule>, ApiError> {
    let mut remote: HashMap<String, RemoteRule> = target
        .list(client)
        .await?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    let mut result = vec![];
    for mut rule in rules {
        let mut uuids = BTreeMap::new();
        let mut ports = vec![];

        for (key, id) in &rule.uuids {
            let Some(found) = remote.remove(id) else {
                continue;
            };

            rule.protocol = found.protocol.clone();
            rule.cidr_list = found.cidr_list.clone();
            if rule.is_portless() {
                rule.icmp_type = found.icmp_type;
                rule.icmp_code = found.icmp_code;
            } else {
                ports.push(key.clone());
            }
            if found.action.is_some() {
                rule.action = lowercase(&found.action);
                rule.traffic_type = lowercase(&found.traffic_type);
            }
            uuids.insert(key.clone(), id.clone());
        }

        if uuids.is_empty() {
            continue;
        }
        if !rule.is_portless() {
            rule.ports = ports;
        }
        rule.uuids = uuids;
        result.push(rule);
    }

    if managed {
        let mut adopted: Vec<RemoteRule> = remote.into_values().collect();
        adopted.sort_by(|a, b| a.id.cmp(&b.id));

        for found in adopted {
            let key = match found.ports {
                Some(range) => range.to_string(),
                None => found.protocol.clone(),
            };
            let portless = found.ports.is_none();

            result.push(Rule {
                protocol: found.protocol,
                cidr_list: found.cidr_list,
                icmp_type: found.icmp_type,
                icmp_code: found.icmp_code,
                ports: if portless { vec![] } else { vec![key.clone()] },
                action: lowercase(&found.action),
                traffic_type: lowercase(&found.traffic_type),
                uuids: [(key, found.id)].into_iter().collect(),
            });
        }
    }

    Ok(result)
}

/// Carries the remote IDs of unchanged rules into the plan so only rules
/// that really change show up as unknown
pub fn plan_uuids(prior: &DynamicValue, planned: &mut DynamicValue) {
    let prior_rules = get_rules(prior);
    if prior_rules.is_empty() {
        return;
    }

    let path = AttributePath::new("rule");
    let Ok(items) = planned.get_list(&path) else {
        return;
    };

    let items = items
        .into_iter()
        .map(|item| {
            if !known_except_uuids(&item) {
                return item;
            }
            let Some(rule) = rule_from_dynamic(&item) else {
                return item;
            };
            let identity = rule.identity();
            match prior_rules.iter().find(|p| p.identity() == identity) {
                Some(prior) => rule_to_dynamic(&Rule {
                    uuids: prior.uuids.clone(),
                    ..rule
                }),
                None => item,
            }
        })
        .collect();

    planned.set_attribute("rule", Dynamic::List(items));
}

fn known_except_uuids(item: &Dynamic) -> bool {
    item.as_map().is_some_and(|fields| {
        fields
            .iter()
            .filter(|(k, _)| k.as_str() != "uuids")
            .all(|(_, v)| v.is_fully_known())
    })
}

/// One diagnostic for everything that went wrong applying a rule set
pub fn rule_errors(summary: &str, errors: &[String]) -> Option<Diagnostic> {
    if errors.is_empty() {
        None
    } else {
        Some(Diagnostic::error(summary, errors.join("\n")))
    }
}

/// Creates every configured rule; the resource ID is the ID of the target
pub async fn create_rule_set(
    ctx: &Context,
    client: &Client,
    target: &dyn RuleTarget,
    target_id: &str,
    planned: DynamicValue,
) -> OperationResult {
    let rules = get_rules(&planned);
    let (created, errors) =
        create_rules(ctx, client, target, rules, parallelism(&planned)).await;

    let mut state = planned;
    set_string(&mut state, "id", target_id);
    set_rules(&mut state, &created);

    match rule_errors("Error creating rules", &errors) {
        Some(diagnostic) if created.is_empty() => Err(diagnostic.into()),
        Some(diagnostic) => Err(OperationError::from(diagnostic).with_state(state)),
        None => Ok(state),
    }
}

/// Refreshes the rules in `state`; `None` when an unmanaged set has no rules left
pub async fn read_rule_set(
    client: &Client,
    target: &dyn RuleTarget,
    label: &str,
    mut state: DynamicValue,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let managed = get_bool(&state, "managed");
    let rules = read_rules(client, target, get_rules(&state), managed)
        .await
        .map_err(|e| api_error(format!("Error reading {}", label), e))?;

    if rules.is_empty() && !managed {
        return Ok(gone(label, &get_string(&state, "id")));
    }

    set_rules(&mut state, &rules);
    Ok(Some(state))
}

pub async fn update_rule_set(
    ctx: &Context,
    client: &Client,
    target: &dyn RuleTarget,
    prior: &DynamicValue,
    planned: DynamicValue,
) -> OperationResult {
    let (rules, errors) = update_rules(
        ctx,
        client,
        target,
        &get_rules(prior),
        &get_rules(&planned),
        parallelism(&planned),
    )
    .await;

    let mut state = planned;
    set_rules(&mut state, &rules);

    match rule_errors("Error updating rules", &errors) {
        Some(diagnostic) => Err(OperationError::from(diagnostic).with_state(state)),
        None => Ok(state),
    }
}

pub async fn delete_rule_set(
    ctx: &Context,
    client: &Client,
    target: &dyn RuleTarget,
    prior: DynamicValue,
) -> Result<(), Diagnostic> {
    let (_, errors) =
        delete_rules(ctx, client, target, get_rules(&prior), parallelism(&prior)).await;

    match rule_errors("Error deleting rules", &errors) {
        Some(diagnostic) => Err(diagnostic),
        None => Ok(()),
    }
}
