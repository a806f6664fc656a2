//! Step runner: the host side of every RPC a test case makes

use super::config::{provider_name, Config};
use super::state::{flatmap, ResourceState, State};
use super::{CheckFunc, ProviderFactory, TestCase, TestStep};
use crate::context::Context;
use crate::error::{Result, TfplugError};
use crate::logging;
use crate::protocol::{self, ProviderService};
use crate::schema::{Attribute, ObjectNestingMode, Schema};
use crate::types::{has_errors, Diagnostic, Dynamic, DynamicValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const TERRAFORM_VERSION: &str = "1.9.0";

pub(super) async fn run(case: TestCase) -> Result<()> {
    logging::init();
    let ctx = Context::new();
    let mut runner = Runner::new(ctx, &case.provider_factories).await?;

    let mut result = Ok(());
    let mut last_config: Option<Config> = None;

    for (i, step) in case.steps.iter().enumerate() {
        let number = i + 1;
        tracing::debug!(step = number, import = step.import_state, "Running test step");

        let outcome = runner.step(step, last_config.as_ref()).await;
        if let Some(config) = &step.config {
            last_config = Some(config.clone());
        }

        if let Err(message) = expect(step, outcome) {
            tracing::warn!(step = number, %message, "Test step failed");
            result = Err(TfplugError::TestStepFailed {
                step: number,
                message,
            });
            break;
        }
    }

    // Resources are destroyed even when a step failed
    let pre_destroy = runner.load_state()?;
    let destroyed = runner.destroy_all().await;

    result?;
    destroyed.map_err(|e| TfplugError::Custom(format!("Error running post-test destroy: {}", e)))?;

    if let Some(check) = &case.check_destroy {
        check(&pre_destroy)
            .map_err(|e| TfplugError::Custom(format!("Check destroy failed: {}", e)))?;
    }

    Ok(())
}

/// Match a step outcome against the step's `expect_error`
fn expect(step: &TestStep, outcome: Result<()>) -> std::result::Result<(), String> {
    match (outcome, &step.expect_error) {
        (Ok(()), None) => Ok(()),
        (Ok(()), Some(pattern)) => Err(format!(
            "Expected an error with pattern {:?}, no error received",
            pattern.as_str()
        )),
        (Err(e), Some(pattern)) => {
            let message = e.to_string();
            if pattern.is_match(&message) {
                tracing::debug!(%message, "Step failed as expected");
                Ok(())
            } else {
                Err(format!(
                    "Expected an error with pattern {:?}, got: {}",
                    pattern.as_str(),
                    message
                ))
            }
        }
        (Err(e), None) => Err(e.to_string()),
    }
}

/// Error for any error diagnostic; warnings are only logged
fn check_diagnostics(diagnostics: &[Diagnostic]) -> Result<()> {
    for warning in diagnostics.iter().filter(|d| !d.is_error()) {
        tracing::warn!(summary = %warning.summary, detail = %warning.detail, "Provider warning");
    }
    if !has_errors(diagnostics) {
        return Ok(());
    }

    let message = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n");
    Err(TfplugError::Custom(message))
}

fn single_nested(attr: &Attribute) -> Option<&[Attribute]> {
    attr.nested_type
        .as_ref()
        .filter(|nested| nested.nesting == ObjectNestingMode::Single)
        .map(|nested| nested.attributes.as_slice())
}

/// Config object holding every schema attribute, absent ones as null.
/// Attributes outside the schema are kept so validation can report them
fn normalize(attributes: &[Attribute], config: &Dynamic) -> Dynamic {
    let Dynamic::Map(entries) = config else {
        return config.clone();
    };

    let mut out = entries.clone();
    for attr in attributes {
        let value = entries.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
        let value = match single_nested(attr) {
            Some(nested) => normalize(nested, &value),
            None => value,
        };
        out.insert(attr.name.clone(), value);
    }
    Dynamic::Map(out)
}

/// Proposed new state: the configuration, with computed attributes the
/// configuration leaves null taken from the prior state
fn proposed_new_state(attributes: &[Attribute], prior: &Dynamic, config: &Dynamic) -> Dynamic {
    let Dynamic::Map(_) = config else {
        return config.clone();
    };

    Dynamic::Map(
        attributes
            .iter()
            .map(|attr| {
                let config_value = config.attr(&attr.name).unwrap_or(&Dynamic::Null);
                let prior_value = prior.attr(&attr.name).unwrap_or(&Dynamic::Null);

                let value = if attr.computed && config_value.is_null() {
                    prior_value.clone()
                } else if let (Some(nested), Dynamic::Map(_)) = (single_nested(attr), config_value) {
                    proposed_new_state(nested, prior_value, config_value)
                } else {
                    config_value.clone()
                };
                (attr.name.clone(), value)
            })
            .collect(),
    )
}

/// Flatmap without the ignored prefixes
fn verify_attributes(value: &Dynamic, ignore: &[String]) -> BTreeMap<String, String> {
    flatmap(value)
        .into_iter()
        .filter(|(key, _)| !ignore.iter().any(|prefix| key.starts_with(prefix.as_str())))
        .collect()
}

/// A failed apply. `new_state` is what the resource's state becomes, `None`
/// leaving it untouched
struct ApplyFailure {
    new_state: Option<DynamicValue>,
    error: TfplugError,
}

impl ApplyFailure {
    fn or_state(mut self, state: DynamicValue) -> Self {
        self.new_state.get_or_insert(state);
        self
    }
}

impl From<TfplugError> for ApplyFailure {
    fn from(error: TfplugError) -> Self {
        Self {
            new_state: None,
            error,
        }
    }
}

struct Runner {
    ctx: Context,
    providers: HashMap<String, Box<dyn ProviderService>>,
    schemas: HashMap<String, protocol::get_provider_schema::Response>,
    /// State persisted between operations, as JSON
    state: Vec<u8>,
}

impl Runner {
    async fn new(ctx: Context, factories: &HashMap<String, ProviderFactory>) -> Result<Self> {
        let mut providers = HashMap::new();
        let mut schemas = HashMap::new();

        for (name, factory) in factories {
            let server = factory().await?;
            let schema = server
                .get_provider_schema(ctx.clone(), protocol::get_provider_schema::Request)
                .await;
            check_diagnostics(&schema.diagnostics)?;
            schemas.insert(name.clone(), schema);
            providers.insert(name.clone(), server);
        }

        Ok(Self {
            ctx,
            providers,
            schemas,
            state: State::default().encode_json()?,
        })
    }

    fn load_state(&self) -> Result<State> {
        State::decode_json(&self.state)
    }

    fn save_state(&mut self, state: &State) -> Result<()> {
        self.state = state.encode_json()?;
        Ok(())
    }

    fn server(&self, provider: &str) -> Result<&dyn ProviderService> {
        self.providers
            .get(provider)
            .map(|server| server.as_ref())
            .ok_or_else(|| TfplugError::ProviderNotFound(provider.to_string()))
    }

    fn provider_schema(&self, provider: &str) -> Result<&protocol::get_provider_schema::Response> {
        self.schemas
            .get(provider)
            .ok_or_else(|| TfplugError::ProviderNotFound(provider.to_string()))
    }

    fn resource_schema(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.provider_schema(provider_name(type_name))?
            .resource_schemas
            .get(type_name)
            .cloned()
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()))
    }

    fn data_source_schema(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.provider_schema(provider_name(type_name))?
            .data_source_schemas
            .get(type_name)
            .cloned()
            .ok_or_else(|| TfplugError::DataSourceNotFound(type_name.to_string()))
    }

    async fn step(&mut self, step: &TestStep, last_config: Option<&Config>) -> Result<()> {
        if step.import_state {
            let config = step.config.as_ref().or(last_config).ok_or_else(|| {
                TfplugError::InvalidConfiguration(
                    "import step needs a configuration from this or an earlier step".to_string(),
                )
            })?;
            return self.import_step(step, config).await;
        }

        match &step.config {
            Some(config) => self.config_step(config, step.check.as_ref()).await,
            None => Err(TfplugError::InvalidConfiguration(
                "step has neither a configuration nor an import".to_string(),
            )),
        }
    }

    async fn configure(&self, config: &Config) -> Result<()> {
        for name in config.provider_names() {
            let server = self.server(&name)?;
            let schema = &self.provider_schema(&name)?.provider;
            let provider_config = DynamicValue::new(normalize(
                &schema.block.attributes,
                &config.provider_config(&name),
            ));

            let validated = server
                .validate_provider_config(
                    self.ctx.clone(),
                    protocol::validate_provider_config::Request {
                        config: provider_config.clone(),
                    },
                )
                .await;
            check_diagnostics(&validated.diagnostics)?;

            let configured = server
                .configure_provider(
                    self.ctx.clone(),
                    protocol::configure_provider::Request {
                        terraform_version: TERRAFORM_VERSION.to_string(),
                        config: provider_config,
                    },
                )
                .await;
            check_diagnostics(&configured.diagnostics)?;
        }
        Ok(())
    }

    async fn config_step(&mut self, config: &Config, check: Option<&CheckFunc>) -> Result<()> {
        self.configure(config).await?;
        let mut state = self.load_state()?;

        let stale_data: Vec<String> = state
            .resources
            .keys()
            .filter(|address| address.starts_with("data."))
            .cloned()
            .collect();
        for address in stale_data {
            state.remove(&address);
        }

        for block in &config.data_sources {
            let value = self.read_data_source(&block.type_name, &block.attributes).await?;
            state.set(
                &format!("data.{}", block.address()),
                ResourceState {
                    type_name: block.type_name.clone(),
                    provider: block.provider().to_string(),
                    value: value.value,
                },
            );
        }

        for block in &config.resources {
            let address = block.address();
            let schema = self.resource_schema(&block.type_name)?;
            let resource_config =
                DynamicValue::new(normalize(&schema.block.attributes, &block.attributes));
            self.validate_resource(&block.type_name, &resource_config).await?;

            let prior = state
                .resource(&address)
                .map(ResourceState::dynamic_value)
                .unwrap_or_else(DynamicValue::null);
            let new_state = self
                .plan_and_apply(&block.type_name, prior, resource_config)
                .await;

            // Whatever was applied before a failure stays in state
            let (new_state, failure) = match new_state {
                Ok(new_state) => (Some(new_state), None),
                Err(ApplyFailure { new_state, error }) => (new_state, Some(error)),
            };
            match new_state {
                Some(new_state) if new_state.is_null() => {
                    state.remove(&address);
                }
                Some(new_state) => state.set(
                    &address,
                    ResourceState {
                        type_name: block.type_name.clone(),
                        provider: block.provider().to_string(),
                        value: new_state.value,
                    },
                ),
                None => {}
            }
            if let Some(error) = failure {
                self.save_state(&state)?;
                return Err(error);
            }
        }

        let orphans: Vec<String> = state
            .managed()
            .filter(|(address, _)| !config.resources.iter().any(|b| b.address() == **address))
            .map(|(address, _)| address.clone())
            .collect();
        for address in orphans {
            if let Some(resource) = state.resource(&address) {
                self.destroy(resource).await?;
            }
            state.remove(&address);
        }

        self.save_state(&state)?;
        self.refresh().await?;

        if let Some(check) = check {
            check(&self.load_state()?)?;
        }

        self.ensure_empty_plan(config).await
    }

    async fn read_data_source(&self, type_name: &str, attributes: &Dynamic) -> Result<DynamicValue> {
        let server = self.server(provider_name(type_name))?;
        let schema = self.data_source_schema(type_name)?;
        let config = DynamicValue::new(normalize(&schema.block.attributes, attributes));

        let validated = server
            .validate_data_resource_config(
                self.ctx.clone(),
                protocol::validate_data_resource_config::Request {
                    type_name: type_name.to_string(),
                    config: config.clone(),
                },
            )
            .await;
        check_diagnostics(&validated.diagnostics)?;

        let response = server
            .read_data_source(
                self.ctx.clone(),
                protocol::read_data_source::Request {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await;
        check_diagnostics(&response.diagnostics)?;

        if response.state.contains_unknown() {
            return Err(TfplugError::InvalidState(format!(
                "data source {} returned unknown values",
                type_name
            )));
        }
        Ok(response.state)
    }

    async fn validate_resource(&self, type_name: &str, config: &DynamicValue) -> Result<()> {
        let server = self.server(provider_name(type_name))?;
        let response = server
            .validate_resource_config(
                self.ctx.clone(),
                protocol::validate_resource_config::Request {
                    type_name: type_name.to_string(),
                    config: config.clone(),
                },
            )
            .await;
        check_diagnostics(&response.diagnostics)
    }

    async fn plan(
        &self,
        type_name: &str,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<protocol::plan_resource_change::Response> {
        let server = self.server(provider_name(type_name))?;
        let schema = self.resource_schema(type_name)?;
        let proposed = if config.is_null() {
            DynamicValue::null()
        } else {
            DynamicValue::new(proposed_new_state(
                &schema.block.attributes,
                &prior.value,
                &config.value,
            ))
        };

        let response = server
            .plan_resource_change(
                self.ctx.clone(),
                protocol::plan_resource_change::Request {
                    type_name: type_name.to_string(),
                    prior_state: prior.clone(),
                    proposed_new_state: proposed,
                    config: config.clone(),
                },
            )
            .await;
        check_diagnostics(&response.diagnostics)?;
        Ok(response)
    }

    async fn apply(
        &self,
        type_name: &str,
        prior: DynamicValue,
        planned: DynamicValue,
        config: DynamicValue,
    ) -> std::result::Result<DynamicValue, ApplyFailure> {
        let server = self.server(provider_name(type_name))?;
        let destroying = planned.is_null();

        let response = server
            .apply_resource_change(
                self.ctx.clone(),
                protocol::apply_resource_change::Request {
                    type_name: type_name.to_string(),
                    prior_state: prior,
                    planned_state: planned,
                    config,
                },
            )
            .await;
        if let Err(error) = check_diagnostics(&response.diagnostics) {
            let new_state = (!response.new_state.is_null()
                && !response.new_state.contains_unknown())
            .then_some(response.new_state);
            return Err(ApplyFailure { new_state, error });
        }

        if !destroying {
            if response.new_state.is_null() {
                return Err(TfplugError::InvalidState(format!(
                    "Provider produced null object for {}",
                    type_name
                ))
                .into());
            }
            if response.new_state.contains_unknown() {
                return Err(TfplugError::InvalidState(format!(
                    "Provider returned invalid result object after apply for {}: unknown values remain",
                    type_name
                ))
                .into());
            }
        }
        Ok(response.new_state)
    }

    async fn plan_and_apply(
        &self,
        type_name: &str,
        prior: DynamicValue,
        config: DynamicValue,
    ) -> std::result::Result<DynamicValue, ApplyFailure> {
        let plan = self.plan(type_name, &prior, &config).await?;

        if !prior.is_null() && !plan.requires_replace.is_empty() {
            tracing::debug!(
                resource_type = type_name,
                requires_replace = ?plan.requires_replace.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Replacing resource"
            );
            self.apply(type_name, prior, DynamicValue::null(), DynamicValue::null())
                .await?;
            // The old object is gone even when its replacement fails
            return self
                .create(type_name, config)
                .await
                .map_err(|failure| failure.or_state(DynamicValue::null()));
        }

        if !prior.is_null() && plan.planned_state == prior {
            return Ok(prior);
        }

        self.apply(type_name, prior, plan.planned_state, config).await
    }

    async fn create(
        &self,
        type_name: &str,
        config: DynamicValue,
    ) -> std::result::Result<DynamicValue, ApplyFailure> {
        let prior = DynamicValue::null();
        let plan = self.plan(type_name, &prior, &config).await?;
        self.apply(type_name, prior, plan.planned_state, config).await
    }

    async fn destroy(&self, resource: &ResourceState) -> Result<()> {
        let prior = resource.dynamic_value();
        let plan = self
            .plan(&resource.type_name, &prior, &DynamicValue::null())
            .await?;
        self.apply(
            &resource.type_name,
            prior,
            plan.planned_state,
            DynamicValue::null(),
        )
        .await
        .map_err(|failure| failure.error)?;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let mut state = self.load_state()?;
        let managed: Vec<(String, ResourceState)> = state
            .managed()
            .map(|(address, resource)| (address.clone(), resource.clone()))
            .collect();

        for (address, resource) in managed {
            let server = self.server(&resource.provider)?;
            let response = server
                .read_resource(
                    self.ctx.clone(),
                    protocol::read_resource::Request {
                        type_name: resource.type_name.clone(),
                        current_state: resource.dynamic_value(),
                    },
                )
                .await;
            check_diagnostics(&response.diagnostics)?;

            if response.new_state.is_null() {
                tracing::debug!(%address, "Resource gone after refresh");
                state.remove(&address);
            } else {
                state.set(
                    &address,
                    ResourceState {
                        value: response.new_state.value,
                        ..resource
                    },
                );
            }
        }

        self.save_state(&state)
    }

    async fn ensure_empty_plan(&self, config: &Config) -> Result<()> {
        let state = self.load_state()?;
        let mut changes = Vec::new();

        for block in &config.resources {
            let address = block.address();
            let schema = self.resource_schema(&block.type_name)?;
            let resource_config =
                DynamicValue::new(normalize(&schema.block.attributes, &block.attributes));
            let prior = state
                .resource(&address)
                .map(ResourceState::dynamic_value)
                .unwrap_or_else(DynamicValue::null);

            let plan = self.plan(&block.type_name, &prior, &resource_config).await?;
            if prior.is_null() {
                changes.push(format!("{} will be created", address));
            } else if !plan.requires_replace.is_empty() {
                changes.push(format!("{} must be replaced", address));
            } else if plan.planned_state != prior {
                changes.push(format!("{} will be updated in-place", address));
            }
        }

        if changes.is_empty() {
            Ok(())
        } else {
            Err(TfplugError::InvalidState(format!(
                "After applying this test step, the plan was not empty.\n{}",
                changes.join("\n")
            )))
        }
    }

    async fn import_step(&mut self, step: &TestStep, config: &Config) -> Result<()> {
        self.configure(config).await?;
        let state = self.load_state()?;
        let existing = state.resource(&step.resource_name);

        let (type_name, _) = step.resource_name.split_once('.').ok_or_else(|| {
            TfplugError::InvalidConfiguration(format!(
                "resource name {:?} is not of the form type.name",
                step.resource_name
            ))
        })?;

        let id = match &step.import_state_id {
            Some(id) => id.clone(),
            None => existing
                .and_then(|resource| resource.value.attr("id"))
                .and_then(Dynamic::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    TfplugError::InvalidState(format!(
                        "Cannot import {}: no id in state",
                        step.resource_name
                    ))
                })?,
        };

        let server = self.server(provider_name(type_name))?;
        let response = server
            .import_resource_state(
                self.ctx.clone(),
                protocol::import_resource_state::Request {
                    type_name: type_name.to_string(),
                    id: id.clone(),
                },
            )
            .await;
        check_diagnostics(&response.diagnostics)?;
        if response.imported_resources.is_empty() {
            return Err(TfplugError::InvalidState(format!(
                "Import of {} with id {:?} returned no resources",
                type_name, id
            )));
        }

        let mut imported = Vec::new();
        for resource in response.imported_resources {
            let read = server
                .read_resource(
                    self.ctx.clone(),
                    protocol::read_resource::Request {
                        type_name: resource.type_name.clone(),
                        current_state: resource.state,
                    },
                )
                .await;
            check_diagnostics(&read.diagnostics)?;
            if read.new_state.is_null() {
                return Err(TfplugError::InvalidState(format!(
                    "Cannot import non-existent remote object: {} {:?}",
                    resource.type_name, id
                )));
            }
            imported.push((resource.type_name, read.new_state));
        }

        if !step.import_state_verify {
            return Ok(());
        }

        let existing = existing.ok_or_else(|| {
            TfplugError::InvalidState(format!(
                "Cannot verify import of {}: not in state",
                step.resource_name
            ))
        })?;
        let (_, new_state) = imported
            .iter()
            .find(|(imported_type, _)| imported_type == type_name)
            .ok_or_else(|| {
                TfplugError::InvalidState(format!("No imported resource of type {}", type_name))
            })?;

        let ignore = &step.import_state_verify_ignore;
        let expected = verify_attributes(&existing.value, ignore);
        let actual = verify_attributes(&new_state.value, ignore);
        if expected == actual {
            return Ok(());
        }

        let mut keys: Vec<&String> = expected.keys().chain(actual.keys()).collect();
        keys.sort();
        keys.dedup();
        let differences = keys
            .into_iter()
            .filter(|key| expected.get(*key) != actual.get(*key))
            .map(|key| {
                format!(
                    "  {}: state {:?}, imported {:?}",
                    key,
                    expected.get(key),
                    actual.get(key)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Err(TfplugError::InvalidState(format!(
            "ImportStateVerify attributes not equivalent. Difference is shown below.\n{}",
            differences
        )))
    }

    async fn destroy_all(&mut self) -> Result<()> {
        let mut state = self.load_state()?;
        let addresses: Vec<String> = state.managed().map(|(address, _)| address.clone()).collect();

        for address in addresses.iter().rev() {
            if let Some(resource) = state.resource(address) {
                self.destroy(resource).await?;
            }
            state.remove(address);
            self.save_state(&state)?;
        }

        state.resources.clear();
        self.save_state(&state)
    }
}
