//! State checks run after a test step

use super::state::State;
use crate::error::{Result, TfplugError};
use regex::Regex;

pub type CheckFunc = Box<dyn Fn(&State) -> Result<()> + Send + Sync>;

fn attributes(
    state: &State,
    name: &str,
) -> Result<std::collections::BTreeMap<String, String>> {
    state
        .resource(name)
        .map(|r| r.attributes())
        .ok_or_else(|| TfplugError::CheckFailed(format!("Not found: {} in state", name)))
}

/// Keys whose absence counts as the empty value
fn empty_when_absent(key: &str, value: &str) -> bool {
    value.is_empty() || (value == "0" && (key.ends_with(".#") || key.ends_with(".%")))
}

/// The attribute equals `value`
pub fn check_resource_attr(name: &str, key: &str, value: &str) -> CheckFunc {
    let (name, key, value) = (name.to_string(), key.to_string(), value.to_string());
    Box::new(move |state| {
        let attrs = attributes(state, &name)?;
        match attrs.get(&key) {
            Some(actual) if *actual == value => Ok(()),
            None if empty_when_absent(&key, &value) => Ok(()),
            Some(actual) => Err(TfplugError::CheckFailed(format!(
                "{}: Attribute '{}' expected {:?}, got {:?}",
                name, key, value, actual
            ))),
            None => Err(TfplugError::CheckFailed(format!(
                "{}: Attribute '{}' not found",
                name, key
            ))),
        }
    })
}

/// The attribute matches `pattern`
pub fn check_match_resource_attr(name: &str, key: &str, pattern: Regex) -> CheckFunc {
    let (name, key) = (name.to_string(), key.to_string());
    Box::new(move |state| {
        let attrs = attributes(state, &name)?;
        let actual = attrs.get(&key).ok_or_else(|| {
            TfplugError::CheckFailed(format!("{}: Attribute '{}' not found", name, key))
        })?;
        if pattern.is_match(actual) {
            Ok(())
        } else {
            Err(TfplugError::CheckFailed(format!(
                "{}: Attribute '{}' didn't match {:?}, got {:?}",
                name,
                key,
                pattern.as_str(),
                actual
            )))
        }
    })
}

/// The attribute is absent (an empty list counts as absent)
pub fn check_no_resource_attr(name: &str, key: &str) -> CheckFunc {
    let (name, key) = (name.to_string(), key.to_string());
    Box::new(move |state| {
        let attrs = attributes(state, &name)?;
        match attrs.get(&key) {
            None => Ok(()),
            Some(count) if key.ends_with(".#") && count == "0" => Ok(()),
            Some(actual) => Err(TfplugError::CheckFailed(format!(
                "{}: Attribute '{}' found when not expected, value {:?}",
                name, key, actual
            ))),
        }
    })
}

/// The attribute is present and non-empty
pub fn check_resource_attr_set(name: &str, key: &str) -> CheckFunc {
    let (name, key) = (name.to_string(), key.to_string());
    Box::new(move |state| {
        let attrs = attributes(state, &name)?;
        match attrs.get(&key) {
            Some(value) if !value.is_empty() => Ok(()),
            _ => Err(TfplugError::CheckFailed(format!(
                "{}: Attribute '{}' expected to be set",
                name, key
            ))),
        }
    })
}

/// Hands the attribute's value to `check`; a missing attribute fails
pub fn check_resource_attr_with<F>(name: &str, key: &str, check: F) -> CheckFunc
where
    F: Fn(&str) -> Result<()> + Send + Sync + 'static,
{
    let (name, key) = (name.to_string(), key.to_string());
    Box::new(move |state| {
        let attrs = attributes(state, &name)?;
        let value = attrs.get(&key).ok_or_else(|| {
            TfplugError::CheckFailed(format!("{}: Attribute '{}' not found", name, key))
        })?;
        check(value)
            .map_err(|e| TfplugError::CheckFailed(format!("{}: Attribute '{}': {}", name, key, e)))
    })
}

/// Run checks in order, stopping at the first failure
pub fn compose_check(checks: Vec<CheckFunc>) -> CheckFunc {
    Box::new(move |state| {
        let total = checks.len();
        for (i, check) in checks.iter().enumerate() {
            check(state).map_err(|e| {
                TfplugError::CheckFailed(format!("Check {}/{} error: {}", i + 1, total, e))
            })?;
        }
        Ok(())
    })
}
