//! Schema-map attribute declarations

use crate::defaults::StaticDefault;
use crate::plan_modifier::RequiresReplace;
use crate::schema::{Attribute, AttributeBuilder, AttributeType};
use crate::types::Dynamic;

/// Value types available to schema-map attributes
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    TypeString,
    TypeInt,
    TypeFloat,
    TypeBool,
    TypeList(Box<ValueType>),
}

impl ValueType {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            ValueType::TypeString => AttributeType::String,
            ValueType::TypeInt | ValueType::TypeFloat => AttributeType::Number,
            ValueType::TypeBool => AttributeType::Bool,
            ValueType::TypeList(elem) => AttributeType::List(Box::new(elem.attribute_type())),
        }
    }

    /// What ResourceData reads for an attribute that is null or unknown
    pub fn zero_value(&self) -> Dynamic {
        match self {
            ValueType::TypeString => Dynamic::String(String::new()),
            ValueType::TypeInt | ValueType::TypeFloat => Dynamic::Number(0.0),
            ValueType::TypeBool => Dynamic::Bool(false),
            ValueType::TypeList(_) => Dynamic::List(Vec::new()),
        }
    }

    /// Whether a known value fits this type. Integers must be integral
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) => true,
            (ValueType::TypeInt, Dynamic::Number(n)) => n.fract() == 0.0,
            (ValueType::TypeList(elem), Dynamic::List(items)) => {
                items.iter().all(|item| elem.accepts(item))
            }
            (ty, value) => ty.attribute_type().conforms(value).is_ok() && !value.is_unknown(),
        }
    }
}

/// Schema describes one attribute of a schema-map resource
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub default: Option<Dynamic>,
    pub description: String,
    pub sensitive: bool,
}

impl Schema {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            default: None,
            description: String::new(),
            sensitive: false,
        }
    }

    pub fn string() -> Self {
        Self::new(ValueType::TypeString)
    }

    pub fn int() -> Self {
        Self::new(ValueType::TypeInt)
    }

    pub fn bool() -> Self {
        Self::new(ValueType::TypeBool)
    }

    pub fn list_of(elem: ValueType) -> Self {
        Self::new(ValueType::TypeList(Box::new(elem)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Changing the value destroys and recreates the resource
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default(mut self, value: impl Into<Dynamic>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Framework attribute equivalent. A default makes the attribute
    /// optional+computed so the defaulted value can live in the plan
    pub(crate) fn to_attribute(&self, name: &str) -> Attribute {
        let mut builder = AttributeBuilder::new(name, self.value_type.attribute_type())
            .description(&self.description);

        if self.required {
            builder = builder.required();
        }
        if self.optional {
            builder = builder.optional();
        }
        if self.computed {
            builder = builder.computed();
        }
        if let Some(default) = &self.default {
            builder = builder
                .optional()
                .computed()
                .default(StaticDefault::create(default.clone()));
        }
        if self.force_new {
            builder = builder.plan_modifier(RequiresReplace::create());
        }
        if self.sensitive {
            builder = builder.sensitive();
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_becomes_optional_computed() {
        let attr = Schema::string().optional().default("example").to_attribute("with_default");

        assert!(attr.optional);
        assert!(attr.computed);
        assert!(attr.default.is_some());
        assert!(attr.plan_modifiers.is_empty());
    }

    #[test]
    fn force_new_becomes_requires_replace() {
        let attr = Schema::string().required().force_new().to_attribute("email");

        assert!(attr.required);
        assert_eq!(attr.plan_modifiers.len(), 1);
    }

    #[test]
    fn int_accepts_only_integral_numbers() {
        assert!(ValueType::TypeInt.accepts(&Dynamic::Number(200.0)));
        assert!(!ValueType::TypeInt.accepts(&Dynamic::Number(2.5)));
        assert!(!ValueType::TypeInt.accepts(&Dynamic::from("200")));
        assert!(ValueType::TypeList(Box::new(ValueType::TypeString))
            .accepts(&Dynamic::from(vec!["us-east-1"])));
    }
}
