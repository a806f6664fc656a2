//! Built-in plan modifiers
//!
//! Plan modifiers run while the server computes a planned state and can:
//! - Modify the planned value
//! - Mark an attribute as requiring replacement
//! - Add warnings or errors to the plan

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};

/// Marks an attribute as requiring replacement when the value of an existing
/// resource changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "If the value of this attribute changes, Terraform will destroy and recreate the resource."
            .to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        // Nothing to replace on create, and nothing known to compare against
        // while the planned value is unknown or the resource is being destroyed
        let requires_replace = !request.state_value.is_null()
            && !request.plan_value.is_null()
            && !request.plan_value.is_unknown()
            && request.state_value != request.plan_value;

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// A plan modifier that uses the prior state value when the planned value is unknown
///
/// Useful for computed attributes that never change after creation, so the
/// plan shows the existing value instead of "known after apply".
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change.".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        if request.plan_value.is_unknown() && !request.state_value.is_null() {
            return PlanModifierResponse {
                plan_value: request.state_value,
                requires_replace: false,
                diagnostics: vec![],
            };
        }

        PlanModifierResponse::unchanged(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, Dynamic, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic, config: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(config),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("email"),
        }
    }

    #[test]
    fn requires_replace_does_not_trigger_on_same_value() {
        let response = RequiresReplace.modify(request(
            Dynamic::from("a@example.com"),
            Dynamic::from("a@example.com"),
            Dynamic::from("a@example.com"),
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_triggers_on_different_value() {
        let response = RequiresReplace.modify(request(
            Dynamic::from("a@example.com"),
            Dynamic::from("b@example.com"),
            Dynamic::from("b@example.com"),
        ));

        assert!(response.requires_replace);
        assert_eq!(response.plan_value.value, Dynamic::from("b@example.com"));
    }

    #[test]
    fn requires_replace_ignores_create_destroy_and_unknown() {
        let create = RequiresReplace.modify(request(
            Dynamic::Null,
            Dynamic::from("a@example.com"),
            Dynamic::from("a@example.com"),
        ));
        assert!(!create.requires_replace);

        let destroy = RequiresReplace.modify(request(
            Dynamic::from("a@example.com"),
            Dynamic::Null,
            Dynamic::Null,
        ));
        assert!(!destroy.requires_replace);

        let unknown = RequiresReplace.modify(request(
            Dynamic::from("a@example.com"),
            Dynamic::Unknown,
            Dynamic::Unknown,
        ));
        assert!(!unknown.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_copies_prior_state() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::from("2026-01-01T00:00:00Z"),
            Dynamic::Unknown,
            Dynamic::Null,
        ));

        assert_eq!(
            response.plan_value.value,
            Dynamic::from("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_on_create() {
        let response =
            UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown, Dynamic::Null));
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn use_state_for_unknown_keeps_known_plan() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::from("en"),
            Dynamic::from("de"),
            Dynamic::from("de"),
        ));
        assert_eq!(response.plan_value.value, Dynamic::from("de"));
    }
}
