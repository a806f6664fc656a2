//! Default-value plan modifiers
//!
//! Each modifier fills in a value only when the attribute is not configured
//! and no earlier modifier has already planned a known value.

use std::collections::HashMap;
use tfplug::schema::{AttributeType, PlanModifier, PlanModifierRequest, PlanModifierResponse};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

fn needs_default(request: &PlanModifierRequest) -> bool {
    request.config_value.is_null() && !request.plan_value.value.is_known()
}

fn render(value: &Dynamic) -> String {
    match value {
        Dynamic::Null => "null".to_string(),
        Dynamic::Unknown => "(known after apply)".to_string(),
        Dynamic::Bool(b) => b.to_string(),
        Dynamic::Number(n) => n.to_string(),
        Dynamic::String(s) => format!("{:?}", s),
        Dynamic::List(items) => format!(
            "[{}]",
            items.iter().map(render).collect::<Vec<_>>().join(", ")
        ),
        Dynamic::Map(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{} = {}", k, render(&entries[k])))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}

/// Plans a whole object when the attribute is left out of configuration.
/// The object must conform to `element_types`
pub struct DefaultObject {
    element_types: HashMap<String, AttributeType>,
    elements: HashMap<String, Dynamic>,
}

impl DefaultObject {
    pub fn new(
        element_types: HashMap<String, AttributeType>,
        elements: HashMap<String, Dynamic>,
    ) -> Self {
        Self {
            element_types,
            elements,
        }
    }

    pub fn create(
        element_types: HashMap<String, AttributeType>,
        elements: HashMap<String, Dynamic>,
    ) -> Box<dyn PlanModifier> {
        Box::new(Self::new(element_types, elements))
    }

    fn rendered(&self) -> String {
        render(&Dynamic::Map(self.elements.clone()))
    }
}

impl PlanModifier for DefaultObject {
    fn description(&self) -> String {
        format!("If value is not configured, defaults to {}", self.rendered())
    }

    fn markdown_description(&self) -> String {
        format!("If value is not configured, defaults to `{}`", self.rendered())
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        if !needs_default(&request) {
            return PlanModifierResponse::unchanged(request);
        }

        let value = Dynamic::Map(self.elements.clone());
        if let Err(reason) = AttributeType::Object(self.element_types.clone()).conforms(&value) {
            tracing::error!(attribute = %request.path, "Default object does not match its type: {}", reason);
            let diagnostic = Diagnostic::error(
                "Invalid Default Object",
                format!("The default value does not match the object type: {}", reason),
            )
            .with_attribute(request.path.clone());
            let mut response = PlanModifierResponse::unchanged(request);
            response.diagnostics.push(diagnostic);
            return response;
        }

        PlanModifierResponse {
            plan_value: DynamicValue::new(value),
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

pub struct DefaultBool(pub bool);

impl DefaultBool {
    pub fn create(value: bool) -> Box<dyn PlanModifier> {
        Box::new(Self(value))
    }
}

impl PlanModifier for DefaultBool {
    fn description(&self) -> String {
        format!("If value is not configured, defaults to {}", self.0)
    }

    fn markdown_description(&self) -> String {
        format!("If value is not configured, defaults to `{}`", self.0)
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        if !needs_default(&request) {
            return PlanModifierResponse::unchanged(request);
        }

        PlanModifierResponse {
            plan_value: DynamicValue::new(Dynamic::Bool(self.0)),
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

pub struct DefaultString(pub String);

impl DefaultString {
    pub fn create(value: &str) -> Box<dyn PlanModifier> {
        Box::new(Self(value.to_string()))
    }
}

impl PlanModifier for DefaultString {
    fn description(&self) -> String {
        format!("If value is not configured, defaults to {}", self.0)
    }

    fn markdown_description(&self) -> String {
        format!("If value is not configured, defaults to `{}`", self.0)
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        if !needs_default(&request) {
            return PlanModifierResponse::unchanged(request);
        }

        PlanModifierResponse {
            plan_value: DynamicValue::new(Dynamic::String(self.0.clone())),
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::types::AttributePath;

    fn request(config: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(config),
            state_value: DynamicValue::null(),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("oidc_policy"),
        }
    }

    fn policy_default() -> DefaultObject {
        DefaultObject::new(
            HashMap::from([
                ("ping_access_logout_capable".to_string(), AttributeType::Bool),
                ("policy_group".to_string(), AttributeType::String),
                (
                    "logout_uris".to_string(),
                    AttributeType::List(Box::new(AttributeType::String)),
                ),
            ]),
            HashMap::from([
                ("ping_access_logout_capable".to_string(), Dynamic::Bool(false)),
                ("policy_group".to_string(), Dynamic::Null),
                ("logout_uris".to_string(), Dynamic::Null),
            ]),
        )
    }

    #[test]
    fn object_default_fills_unknown_plan() {
        let response = policy_default().modify(request(Dynamic::Null, Dynamic::Unknown));

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.plan_value.value.attr("ping_access_logout_capable"),
            Some(&Dynamic::Bool(false))
        );
        assert_eq!(
            response.plan_value.value.attr("policy_group"),
            Some(&Dynamic::Null)
        );
    }

    #[test]
    fn object_default_fills_null_plan() {
        let response = policy_default().modify(request(Dynamic::Null, Dynamic::Null));
        assert!(response.plan_value.value.as_map().is_some());
    }

    #[test]
    fn object_default_leaves_configured_value() {
        let configured = Dynamic::object([("policy_group", "admins")]);
        let response = policy_default().modify(request(configured, Dynamic::Unknown));

        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn object_default_leaves_known_plan() {
        let planned = Dynamic::object([("policy_group", "admins")]);
        let response = policy_default().modify(request(Dynamic::Null, planned.clone()));

        assert_eq!(response.plan_value.value, planned);
    }

    #[test]
    fn object_default_reports_type_mismatch() {
        let modifier = DefaultObject::new(
            HashMap::from([("policy_group".to_string(), AttributeType::String)]),
            HashMap::from([("policy_group".to_string(), Dynamic::Bool(true))]),
        );
        let response = modifier.modify(request(Dynamic::Null, Dynamic::Unknown));

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].is_error());
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn object_descriptions_render_elements() {
        let modifier = policy_default();

        assert_eq!(
            modifier.description(),
            "If value is not configured, defaults to {logout_uris = null, ping_access_logout_capable = false, policy_group = null}"
        );
        assert_eq!(
            modifier.markdown_description(),
            "If value is not configured, defaults to `{logout_uris = null, ping_access_logout_capable = false, policy_group = null}`"
        );
    }

    #[test]
    fn bool_default_rule() {
        let modifier = DefaultBool(false);

        let filled = modifier.modify(request(Dynamic::Null, Dynamic::Null));
        assert_eq!(filled.plan_value.value, Dynamic::Bool(false));

        let configured = modifier.modify(request(Dynamic::Bool(true), Dynamic::Bool(true)));
        assert_eq!(configured.plan_value.value, Dynamic::Bool(true));

        let planned = modifier.modify(request(Dynamic::Null, Dynamic::Bool(true)));
        assert_eq!(planned.plan_value.value, Dynamic::Bool(true));
    }

    #[test]
    fn string_default_rule() {
        let modifier = DefaultString("RS256".to_string());

        let filled = modifier.modify(request(Dynamic::Null, Dynamic::Unknown));
        assert_eq!(filled.plan_value.value, Dynamic::from("RS256"));

        let configured = modifier.modify(request(Dynamic::from("HS256"), Dynamic::from("HS256")));
        assert_eq!(configured.plan_value.value, Dynamic::from("HS256"));

        assert_eq!(
            modifier.markdown_description(),
            "If value is not configured, defaults to `RS256`"
        );
    }
}
