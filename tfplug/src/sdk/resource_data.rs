//! ResourceData: the get/set view schema-map CRUD functions work against

use super::schema::Schema;
use crate::error::{Result, TfplugError};
use crate::types::{Dynamic, DynamicValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Attribute values of one resource instance during a single operation.
/// Reads see the planned (or current) values; null and unknown values read
/// as the zero value of their type
pub struct ResourceData {
    schema: Arc<HashMap<String, Schema>>,
    prior: HashMap<String, Dynamic>,
    values: HashMap<String, Dynamic>,
    id: String,
    new_resource: bool,
}

fn entries(value: &DynamicValue) -> HashMap<String, Dynamic> {
    value.value.as_map().cloned().unwrap_or_default()
}

impl ResourceData {
    pub(crate) fn new(
        schema: Arc<HashMap<String, Schema>>,
        prior: &DynamicValue,
        current: &DynamicValue,
    ) -> Self {
        let prior = entries(prior);
        let values = entries(current);
        let id = values
            .get("id")
            .or_else(|| prior.get("id"))
            .and_then(Dynamic::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            new_resource: prior.is_empty(),
            schema,
            prior,
            values,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty id marks the resource as gone
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    /// Value of an attribute, the zero value when it is null or unknown.
    /// Keys outside the schema read as null
    pub fn get(&self, key: &str) -> Dynamic {
        let Some(schema) = self.schema.get(key) else {
            tracing::warn!(key, "Read of attribute not in schema");
            return Dynamic::Null;
        };

        match self.values.get(key) {
            Some(value) if value.is_known() => value.clone(),
            _ => schema.value_type.zero_value(),
        }
    }

    /// Value of an attribute only when it is set to something other than the
    /// zero value
    pub fn get_ok(&self, key: &str) -> Option<Dynamic> {
        let schema = self.schema.get(key)?;
        let value = self.values.get(key).filter(|v| v.is_known())?;
        if *value == schema.value_type.zero_value() {
            return None;
        }
        Some(value.clone())
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key).as_str().unwrap_or_default().to_string()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).as_number().unwrap_or_default() as i64
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or_default()
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .as_list()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set an attribute. Fails for keys outside the schema and for values of
    /// the wrong type
    pub fn set(&mut self, key: &str, value: impl Into<Dynamic>) -> Result<()> {
        let value = value.into();
        let schema = self
            .schema
            .get(key)
            .ok_or_else(|| TfplugError::InvalidState(format!("Invalid address to set: {:?}", key)))?;

        if !schema.value_type.accepts(&value) {
            return Err(TfplugError::TypeMismatch {
                expected: format!("{:?} for {}", schema.value_type, key),
                actual: value.type_name().to_string(),
            });
        }

        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Whether the value differs from the prior state
    pub fn has_change(&self, key: &str) -> bool {
        let prior = self.prior.get(key).unwrap_or(&Dynamic::Null);
        let current = self.values.get(key).unwrap_or(&Dynamic::Null);
        prior != current
    }

    /// Object holding every schema attribute plus the id. Unknown values left
    /// over from the plan become null
    pub(crate) fn to_object(&self) -> DynamicValue {
        let mut object: HashMap<String, Dynamic> = self
            .schema
            .keys()
            .map(|key| {
                let value = match self.values.get(key) {
                    Some(Dynamic::Unknown) | None => Dynamic::Null,
                    Some(value) => value.clone(),
                };
                (key.clone(), value)
            })
            .collect();

        let id = if self.id.is_empty() {
            Dynamic::Null
        } else {
            Dynamic::String(self.id.clone())
        };
        object.insert("id".to_string(), id);

        DynamicValue::new(Dynamic::Map(object))
    }

    /// Resource state: null once the id has been cleared
    pub(crate) fn to_state(&self) -> DynamicValue {
        if self.id.is_empty() {
            DynamicValue::null()
        } else {
            self.to_object()
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::sdk::schema::ValueType;

    fn schema() -> Arc<HashMap<String, Schema>> {
        Arc::new(HashMap::from([
            ("email".to_string(), Schema::string().required()),
            ("age".to_string(), Schema::int().required()),
            ("language".to_string(), Schema::string().optional().computed()),
            (
                "names".to_string(),
                Schema::list_of(ValueType::TypeString).computed(),
            ),
        ]))
    }

    fn object(entries: Vec<(&str, Dynamic)>) -> DynamicValue {
        DynamicValue::new(Dynamic::object(entries))
    }

    #[test]
    fn unknown_and_null_read_as_zero_values() {
        let d = ResourceData::new(
            schema(),
            &DynamicValue::null(),
            &object(vec![
                ("email", Dynamic::from("ford@prefect.co")),
                ("language", Dynamic::Unknown),
                ("id", Dynamic::Unknown),
            ]),
        );

        assert!(d.is_new_resource());
        assert_eq!(d.id(), "");
        assert_eq!(d.get_string("email"), "ford@prefect.co");
        assert_eq!(d.get_string("language"), "");
        assert_eq!(d.get_int("age"), 0);
        assert!(d.get_string_list("names").is_empty());
        assert_eq!(d.get_ok("language"), None);
        assert_eq!(d.get("missing"), Dynamic::Null);
    }

    #[test]
    fn set_checks_schema_and_types() {
        let mut d = ResourceData::new(schema(), &DynamicValue::null(), &DynamicValue::null());

        d.set("age", 200).unwrap();
        d.set("names", vec!["us-east-1", "eu-west-1"]).unwrap();
        assert_eq!(d.get_int("age"), 200);
        assert_eq!(d.get_string_list("names"), vec!["us-east-1", "eu-west-1"]);

        assert!(matches!(d.set("nope", "x"), Err(TfplugError::InvalidState(_))));
        assert!(matches!(d.set("age", "old"), Err(TfplugError::TypeMismatch { .. })));
        assert!(d.set("age", 2.5).is_err());
    }

    #[test]
    fn id_drives_state() {
        let prior = object(vec![
            ("id", Dynamic::from("ford@prefect.co")),
            ("email", Dynamic::from("ford@prefect.co")),
            ("age", Dynamic::Number(200.0)),
        ]);
        let mut d = ResourceData::new(schema(), &prior, &prior);

        assert!(!d.is_new_resource());
        assert_eq!(d.id(), "ford@prefect.co");
        let state = d.to_state();
        assert_eq!(
            state.get_string(&crate::types::AttributePath::new("id")).unwrap(),
            "ford@prefect.co"
        );
        assert!(state
            .lookup(&crate::types::AttributePath::new("language"))
            .unwrap()
            .is_null());

        d.set_id("");
        assert!(d.to_state().is_null());
    }

    #[test]
    fn has_change_compares_with_prior() {
        let prior = object(vec![
            ("email", Dynamic::from("ford@prefect.co")),
            ("age", Dynamic::Number(200.0)),
        ]);
        let planned = object(vec![
            ("email", Dynamic::from("ford@prefect.co")),
            ("age", Dynamic::Number(201.0)),
        ]);
        let d = ResourceData::new(schema(), &prior, &planned);

        assert!(d.has_change("age"));
        assert!(!d.has_change("email"));
    }
}
