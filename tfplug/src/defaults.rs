//! Default value providers for attributes
//!
//! Defaults are evaluated during planning when an attribute is null in the
//! configuration. They run before plan modifiers, so a modifier sees the
//! defaulted value as the planned value.

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    /// Create a new static default provider with the given value
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    /// Create a static string default
    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    /// Create a static number default
    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    /// Create a static boolean default
    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    #[test]
    fn static_defaults_return_their_value() {
        let request = || DefaultRequest {
            path: AttributePath::new("with_default"),
        };

        assert_eq!(
            StaticDefault::string("example").default_value(request()).value.value,
            Dynamic::from("example")
        );
        assert_eq!(
            StaticDefault::bool(false).default_value(request()).value.value,
            Dynamic::Bool(false)
        );
        assert_eq!(
            StaticDefault::number(30.0).default_value(request()).value.value,
            Dynamic::Number(30.0)
        );
    }

    #[test]
    fn description_names_the_value() {
        let default = StaticDefault::string("example");
        assert!(default.description().contains("example"));
    }
}
