//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining resource and data source
//! schemas: attribute types, nested attributes, plan modifiers and defaults.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::fmt;

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
    /// Check that a value conforms to this type. Null and unknown conform to
    /// every type; object values must carry exactly the declared attributes
    pub fn conforms(&self, value: &Dynamic) -> std::result::Result<(), String> {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => Ok(()),
            (AttributeType::String, Dynamic::String(_))
            | (AttributeType::Number, Dynamic::Number(_))
            | (AttributeType::Bool, Dynamic::Bool(_)) => Ok(()),
            (AttributeType::List(elem), Dynamic::List(items))
            | (AttributeType::Set(elem), Dynamic::List(items)) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| {
                    elem.conforms(item).map_err(|e| format!("[{}]: {}", i, e))
                }),
            (AttributeType::Map(elem), Dynamic::Map(entries)) => {
                entries.iter().try_for_each(|(k, item)| {
                    elem.conforms(item).map_err(|e| format!("[{:?}]: {}", k, e))
                })
            }
            (AttributeType::Object(fields), Dynamic::Map(entries)) => {
                if let Some(extra) = entries.keys().find(|k| !fields.contains_key(*k)) {
                    return Err(format!("unexpected attribute {:?}", extra));
                }
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                for name in names {
                    let Some(item) = entries.get(name) else {
                        return Err(format!("missing attribute {:?}", name));
                    };
                    fields[name]
                        .conforms(item)
                        .map_err(|e| format!(".{}: {}", name, e))?;
                }
                Ok(())
            }
            (expected, actual) => Err(format!(
                "expected {}, got {}",
                expected,
                actual.type_name()
            )),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => f.write_str("string"),
            AttributeType::Number => f.write_str("number"),
            AttributeType::Bool => f.write_str("bool"),
            AttributeType::List(elem) => write!(f, "list({})", elem),
            AttributeType::Set(elem) => write!(f, "set({})", elem),
            AttributeType::Map(elem) => write!(f, "map({})", elem),
            AttributeType::Object(fields) => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                f.write_str("object({")?;
                for (i, name) in names.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", name, fields[name])?;
                }
                f.write_str("})")
            }
        }
    }
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug)]
pub struct Schema {
    pub version: i64, // Increment when schema changes require migration
    pub block: Block, // Root block containing all attributes
}

impl Schema {
    /// Object type of the whole root block
    pub fn value_type(&self) -> AttributeType {
        self.block.value_type()
    }

    /// Same shape, ignoring descriptions and modifiers. Used to compare
    /// provider schemas served by different servers
    pub fn same_shape(&self, other: &Schema) -> bool {
        self.version == other.version && self.value_type() == other.value_type()
    }
}

/// Block represents a configuration block
#[derive(Debug)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn value_type(&self) -> AttributeType {
        attributes_type(&self.attributes)
    }
}

fn attributes_type(attributes: &[Attribute]) -> AttributeType {
    AttributeType::Object(
        attributes
            .iter()
            .map(|a| (a.name.clone(), a.value_type()))
            .collect(),
    )
}

/// Attribute represents a single configuration attribute
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub plan_modifiers: Vec<Box<dyn PlanModifier>>,
    pub default: Option<Box<dyn Default>>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

impl Attribute {
    /// The type values of this attribute carry. Nested attributes derive it
    /// from their nested attribute list
    pub fn value_type(&self) -> AttributeType {
        match &self.nested_type {
            None => self.r#type.clone(),
            Some(nested) => {
                let object = attributes_type(&nested.attributes);
                match nested.nesting {
                    ObjectNestingMode::Single => object,
                    ObjectNestingMode::List => AttributeType::List(Box::new(object)),
                    ObjectNestingMode::Set => AttributeType::Set(Box::new(object)),
                    ObjectNestingMode::Map => AttributeType::Map(Box::new(object)),
                }
            }
        }
    }
}

// Manual Debug implementation since modifiers and defaults don't implement Debug
impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "plan_modifiers",
                &self
                    .plan_modifiers
                    .iter()
                    .map(|m| m.description())
                    .collect::<Vec<_>>(),
            )
            .field("default", &self.default.as_ref().map(|d| d.description()))
            .field("nested_type", &self.nested_type)
            .field("deprecated", &self.deprecated)
            .finish()
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

impl NestedType {
    pub fn single(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Single,
        }
    }
}

/// ObjectNestingMode for nested attribute objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Single,
    List,
    Set,
    Map,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// PlanModifier modifies planned values during planning
/// Common uses: RequiresReplace, UseStateForUnknown, static defaults
pub trait PlanModifier: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Markdown flavored description, plain description unless overridden
    fn markdown_description(&self) -> String {
        self.description()
    }
    /// Modify the planned value
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

/// Request for plan modifiers. Values are those of the single attribute
/// being modified, not the whole object
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

impl PlanModifierResponse {
    /// Response that leaves the plan untouched
    pub fn unchanged(request: PlanModifierRequest) -> Self {
        Self {
            plan_value: request.plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
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
                plan_modifiers: Vec::new(),
                default: None,
                nested_type: None,
                deprecated: false,
            },
        }
    }

    /// Create a nested attribute; its type follows the nested attributes
    pub fn nested(name: &str, nested: NestedType) -> Self {
        let mut builder = Self::new(name, AttributeType::Object(HashMap::new()));
        builder.attribute.nested_type = Some(nested);
        builder.attribute.r#type = builder.attribute.value_type();
        builder
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    /// Mark as computed
    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    /// Add plan modifier
    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    /// Set default
    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(default);
        self
    }

    /// Finalize the attribute
    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    description_kind: StringKind::Plain,
                    deprecated: false,
                },
            },
        }
    }

    /// Set schema version
    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    /// Add attribute
    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    /// Set description kind
    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    /// Finalize the schema
    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("email", AttributeType::String)
            .description("Login address of the user")
            .required()
            .build();

        assert_eq!(attr.name, "email");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "Login address of the user");
    }

    #[test]
    fn schema_builder_creates_schema_with_attributes() {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Test resource schema")
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
            .build();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 2);
        assert!(schema.block.attribute("name").is_some());
        assert!(schema.block.attribute("age").is_none());
    }

    #[test]
    fn nested_single_attribute_has_object_type() {
        let attr = AttributeBuilder::nested(
            "policy",
            NestedType::single(vec![
                AttributeBuilder::new("group", AttributeType::String)
                    .optional()
                    .build(),
                AttributeBuilder::new(
                    "uris",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .optional()
                .build(),
            ]),
        )
        .optional()
        .build();

        let expected = AttributeType::Object(HashMap::from([
            ("group".to_string(), AttributeType::String),
            (
                "uris".to_string(),
                AttributeType::List(Box::new(AttributeType::String)),
            ),
        ]));
        assert_eq!(attr.value_type(), expected);
        assert_eq!(attr.r#type, expected);
    }

    #[test]
    fn object_conformance() {
        let ty = AttributeType::Object(HashMap::from([
            ("enabled".to_string(), AttributeType::Bool),
            (
                "uris".to_string(),
                AttributeType::List(Box::new(AttributeType::String)),
            ),
        ]));

        let good = Dynamic::object([("enabled", Dynamic::Bool(false)), ("uris", Dynamic::Null)]);
        assert!(ty.conforms(&good).is_ok());

        let missing = Dynamic::object([("enabled", false)]);
        assert!(ty.conforms(&missing).unwrap_err().contains("missing attribute"));

        let wrong = Dynamic::object([
            ("enabled", Dynamic::from("yes")),
            ("uris", Dynamic::from(vec![1])),
        ]);
        assert!(ty.conforms(&wrong).is_err());

        assert!(ty.conforms(&Dynamic::Unknown).is_ok());
        assert_eq!(
            AttributeType::List(Box::new(AttributeType::String)).to_string(),
            "list(string)"
        );
    }
}
