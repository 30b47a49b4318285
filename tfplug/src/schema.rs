//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider and resource
//! schemas, including attribute types, nested blocks, and the behaviour hooks
//! (validators, plan modifiers, defaults) attached to attributes.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// JSON type constraint as Terraform expects it in schema responses,
    /// e.g. `"string"` or `["set","string"]`
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};

        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(elem) => json!(["list", elem.to_json()]),
            AttributeType::Set(elem) => json!(["set", elem.to_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_json()]),
            AttributeType::Object(attrs) => {
                let fields: serde_json::Map<String, Value> = attrs
                    .iter()
                    .collect::<BTreeMap<_, _>>()
                    .into_iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    pub fn to_json_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Checks a known value against this type. Null and unknown always match.
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(elem), Dynamic::List(items))
            | (AttributeType::Set(elem), Dynamic::List(items)) => {
                items.iter().all(|item| elem.accepts(item))
            }
            (AttributeType::Map(elem), Dynamic::Map(map)) => map.values().all(|v| elem.accepts(v)),
            (AttributeType::Object(fields), Dynamic::Map(map)) => fields
                .iter()
                .all(|(name, ty)| map.get(name).map_or(true, |v| ty.accepts(v))),
            _ => false,
        }
    }
}

/// Schema is returned by providers and resources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64, // Increment when schema changes require migration
    pub block: Block, // Root block containing all attributes
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }

    /// Reshapes an object so it carries exactly this block's attributes and
    /// nested blocks. Missing attributes become null, missing list/set blocks
    /// become empty, and keys outside the schema are dropped.
    pub fn conform(&self, value: Dynamic) -> Dynamic {
        let mut source = match value {
            Dynamic::Map(map) => map,
            other => return other,
        };

        let mut out = HashMap::with_capacity(self.attributes.len() + self.block_types.len());
        for attr in &self.attributes {
            let v = source.remove(&attr.name).unwrap_or(Dynamic::Null);
            out.insert(attr.name.clone(), v);
        }

        for nested in &self.block_types {
            let v = source.remove(&nested.type_name).unwrap_or(Dynamic::Null);
            out.insert(nested.type_name.clone(), nested.conform(v));
        }

        Dynamic::Map(out)
    }
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
    pub deprecated: bool,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

impl NestedBlock {
    /// Conforms a nested block value; list and set blocks are never null
    pub fn conform(&self, value: Dynamic) -> Dynamic {
        match (self.nesting, value) {
            (_, Dynamic::Unknown) => Dynamic::Unknown,
            (NestingMode::List | NestingMode::Set, Dynamic::Null) => Dynamic::List(Vec::new()),
            (NestingMode::List | NestingMode::Set, Dynamic::List(items)) => Dynamic::List(
                items
                    .into_iter()
                    .map(|item| self.block.conform(item))
                    .collect(),
            ),
            (_, other) => self.block.conform(other),
        }
    }
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Invalid,
    Single,
    List,
    Set,
    Map,
    Group,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// Validator performs validation on attribute values
/// Implement this for custom validation logic
pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Perform validation. Never called with null or unknown values.
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

/// Request for validators
pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

/// Response from validators
#[derive(Default)]
pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier modifies planned values during planning
/// Common uses: RequiresReplace, RequiresReplaceIf
pub trait PlanModifier: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Modify the planned value
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

/// Request for plan modifiers
pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
}

/// Response from plan modifiers
pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides default values for optional attributes
/// Called when attribute is not set in configuration
pub trait Default: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Provide default value
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// Request for default values
pub struct DefaultRequest {
    pub path: AttributePath,
}

/// Response with default value
pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    /// Create a new attribute builder
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                deprecated: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(Arc::from(modifier));
        self
    }

    /// Set default. Attributes with a default are also computed so Terraform
    /// accepts the planned value when the config leaves it null.
    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(Arc::from(default));
        self.attribute.computed = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

fn empty_block() -> Block {
    Block {
        version: 0,
        attributes: Vec::new(),
        block_types: Vec::new(),
        description: String::new(),
        description_kind: StringKind::Plain,
        deprecated: false,
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: empty_block(),
            },
        }
    }

    /// Set schema version
    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    /// Add nested block
    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// NestedBlockBuilder builds repeated blocks such as `rule { ... }`
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: empty_block(),
                nesting,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_schema() -> Schema {
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
            .block(
                NestedBlockBuilder::new("rule", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("protocol", AttributeType::String)
                            .required()
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
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn type_json_encoding() {
        assert_eq!(AttributeType::String.to_json_bytes(), br#""string""#.to_vec());
        assert_eq!(
            AttributeType::Set(Box::new(AttributeType::String)).to_json_bytes(),
            br#"["set","string"]"#.to_vec()
        );

        let object = AttributeType::Object(HashMap::from([
            ("port".to_string(), AttributeType::Number),
            ("host".to_string(), AttributeType::String),
        ]));
        assert_eq!(
            object.to_json_bytes(),
            br#"["object",{"host":"string","port":"number"}]"#.to_vec()
        );
    }

    #[test]
    fn accepts_checks_nested_types() {
        let set = AttributeType::Set(Box::new(AttributeType::String));
        assert!(set.accepts(&Dynamic::List(vec!["a".into(), Dynamic::Unknown])));
        assert!(!set.accepts(&Dynamic::List(vec![Dynamic::Number(1.0)])));
        assert!(set.accepts(&Dynamic::Null));
    }

    #[test]
    fn conform_fills_missing_and_drops_extra() {
        let schema = rule_schema();
        let value = Dynamic::Map(HashMap::from([
            ("name".to_string(), "web".into()),
            ("legacy".to_string(), "x".into()),
        ]));

        let conformed = DynamicValue::new(schema.block.conform(value));
        assert_eq!(conformed.get(&AttributePath::new("id")), Some(&Dynamic::Null));
        assert_eq!(
            conformed.get(&AttributePath::new("rule")),
            Some(&Dynamic::List(vec![]))
        );
        assert!(conformed.get(&AttributePath::new("legacy")).is_none());
    }

    #[test]
    fn conform_reaches_into_nested_elements() {
        let schema = rule_schema();
        let value = Dynamic::Map(HashMap::from([(
            "rule".to_string(),
            Dynamic::List(vec![Dynamic::Map(HashMap::from([(
                "protocol".to_string(),
                "tcp".into(),
            )]))]),
        )]));

        let conformed = DynamicValue::new(schema.block.conform(value));
        let uuids = AttributePath::new("rule").index(0).attribute("uuids");
        assert_eq!(conformed.get(&uuids), Some(&Dynamic::Null));
    }

    #[test]
    fn clone_keeps_behaviour_hooks() {
        struct Noop;
        impl Validator for Noop {
            fn description(&self) -> String {
                "noop".to_string()
            }
            fn validate(&self, _request: ValidatorRequest) -> ValidatorResponse {
                ValidatorResponse::default()
            }
        }

        let attr = AttributeBuilder::new("name", AttributeType::String)
            .validator(Box::new(Noop))
            .build();
        assert_eq!(attr.clone().validators.len(), 1);
    }
}
