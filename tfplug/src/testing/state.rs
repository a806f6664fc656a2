//! State tracked between test steps

use crate::error::{Result, TfplugError};
use crate::types::{Dynamic, DynamicValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resource or data source instance in state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub type_name: String,
    pub provider: String,
    pub value: Dynamic,
}

impl ResourceState {
    pub fn dynamic_value(&self) -> DynamicValue {
        DynamicValue::new(self.value.clone())
    }

    /// Flatmap rendering of the attributes
    pub fn attributes(&self) -> BTreeMap<String, String> {
        flatmap(&self.value)
    }
}

/// Resources keyed by address. Data sources use `data.type.name`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub resources: BTreeMap<String, ResourceState>,
}

impl State {
    pub fn resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Managed resources only, data sources excluded
    pub fn managed(&self) -> impl Iterator<Item = (&String, &ResourceState)> {
        self.resources
            .iter()
            .filter(|(address, _)| !address.starts_with("data."))
    }

    pub(crate) fn set(&mut self, address: &str, resource: ResourceState) {
        self.resources.insert(address.to_string(), resource);
    }

    pub(crate) fn remove(&mut self, address: &str) -> Option<ResourceState> {
        self.resources.remove(address)
    }

    /// Errors when the state holds an unknown value; `Dynamic`'s `Serialize`
    /// impl refuses to write one
    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TfplugError::EncodingError(format!("state encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("state decoding failed: {}", e)))
    }
}

/// Dotted `key -> string` rendering of a value. Lists add a `.#` count;
/// nulls are left out
pub fn flatmap(value: &Dynamic) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Dynamic::Map(entries) = value {
        for (key, value) in entries {
            flatten(key, value, &mut out);
        }
    }
    out
}

fn flatten(prefix: &str, value: &Dynamic, out: &mut BTreeMap<String, String>) {
    match value {
        Dynamic::Null | Dynamic::Unknown => {}
        Dynamic::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Dynamic::Number(n) => {
            out.insert(prefix.to_string(), format_number(*n));
        }
        Dynamic::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Dynamic::List(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten(&format!("{}.{}", prefix, i), item, out);
            }
        }
        Dynamic::Map(entries) => {
            for (key, value) in entries {
                flatten(&format!("{}.{}", prefix, key), value, out);
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn user() -> Dynamic {
        Dynamic::object([
            ("email", Dynamic::from("ford@prefect.co")),
            ("age", Dynamic::Number(200.0)),
            ("language", Dynamic::Null),
            ("names", Dynamic::from(vec!["us-east-1", "eu-west-1"])),
            (
                "oidc_policy",
                Dynamic::object([
                    ("id_token_signing_algorithm", Dynamic::from("RS256")),
                    ("ping_access_logout_capable", Dynamic::Bool(false)),
                ]),
            ),
        ])
    }

    #[test]
    fn flatmap_renders_dotted_keys() {
        let attrs = flatmap(&user());

        assert_eq!(attrs["email"], "ford@prefect.co");
        assert_eq!(attrs["age"], "200");
        assert_eq!(attrs["names.#"], "2");
        assert_eq!(attrs["names.1"], "eu-west-1");
        assert_eq!(attrs["oidc_policy.id_token_signing_algorithm"], "RS256");
        assert_eq!(attrs["oidc_policy.ping_access_logout_capable"], "false");
        assert!(!attrs.contains_key("language"));
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn state_survives_json() {
        let mut state = State::default();
        state.set(
            "corner_user.foo",
            ResourceState {
                type_name: "corner_user".to_string(),
                provider: "corner".to_string(),
                value: user(),
            },
        );

        let decoded = State::decode_json(&state.encode_json().unwrap()).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.managed().count(), 1);
    }

    #[test]
    fn unknown_values_cannot_be_persisted() {
        let mut state = State::default();
        state.set(
            "corner_user.foo",
            ResourceState {
                type_name: "corner_user".to_string(),
                provider: "corner".to_string(),
                value: Dynamic::object([("id", Dynamic::Unknown)]),
            },
        );

        let err = state.encode_json().unwrap_err();
        assert!(matches!(err, TfplugError::EncodingError(_)));
        assert!(err.to_string().contains("unknown values cannot be serialized"));
    }
}
