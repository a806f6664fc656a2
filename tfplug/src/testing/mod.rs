//! Acceptance test driver
//!
//! Plays the part of Terraform core against one or more `ProviderService`s:
//! each step validates, plans and applies a [`Config`], refreshes state, runs
//! the step's checks and verifies the follow-up plan is empty. After the last
//! step every resource is destroyed and `check_destroy` runs.
//!
//! ```rust,ignore
//! testing::unit_test(TestCase {
//!     provider_factories: factories,
//!     steps: vec![TestStep::config(config).check(check_resource_attr(
//!         "corner_user.foo",
//!         "with_default",
//!         "example",
//!     ))],
//!     ..TestCase::default()
//! })
//! .await?;
//! ```

mod check;
mod config;
mod driver;
mod state;

pub use check::{
    check_match_resource_attr, check_no_resource_attr, check_resource_attr,
    check_resource_attr_set, check_resource_attr_with, compose_check, CheckFunc,
};
pub use config::{provider_name, Config, ConfigBlock};
pub use state::{flatmap, ResourceState, State};

use crate::error::Result;
use crate::protocol::ProviderService;
use futures::future::BoxFuture;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;

/// Produces a fresh provider server for a test case
pub type ProviderFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Box<dyn ProviderService>>> + Send + Sync>;

/// Factory from an async constructor, for servers such as the mux server
pub fn provider_factory<F, Fut>(f: F) -> ProviderFactory
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn ProviderService>>> + Send + 'static,
{
    Box::new(move || -> BoxFuture<'static, Result<Box<dyn ProviderService>>> { Box::pin(f()) })
}

/// Factory from a plain constructor
pub fn server_factory<F, S>(f: F) -> ProviderFactory
where
    F: Fn() -> S + Send + Sync + 'static,
    S: ProviderService + 'static,
{
    Box::new(move || -> BoxFuture<'static, Result<Box<dyn ProviderService>>> {
        let server: Box<dyn ProviderService> = Box::new(f());
        Box::pin(async move { Ok(server) })
    })
}

#[derive(Default)]
pub struct TestCase {
    /// Provider servers keyed by provider name
    pub provider_factories: HashMap<String, ProviderFactory>,
    pub steps: Vec<TestStep>,
    /// Runs against the state as it was just before the final destroy
    pub check_destroy: Option<CheckFunc>,
    /// Unit tests run without `TF_ACC`
    pub is_unit_test: bool,
}

#[derive(Default)]
pub struct TestStep {
    pub config: Option<Config>,
    pub check: Option<CheckFunc>,
    /// The step must fail with an error matching this pattern
    pub expect_error: Option<Regex>,

    pub import_state: bool,
    /// Address of the resource to import, `type.name`
    pub resource_name: String,
    /// Defaults to the `id` of the resource already in state
    pub import_state_id: Option<String>,
    pub import_state_verify: bool,
    /// Attribute prefixes left out of the verify comparison
    pub import_state_verify_ignore: Vec<String>,
}

impl TestStep {
    pub fn config(config: Config) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    pub fn import(resource_name: &str) -> Self {
        Self {
            import_state: true,
            resource_name: resource_name.to_string(),
            ..Self::default()
        }
    }

    pub fn check(mut self, check: CheckFunc) -> Self {
        self.check = Some(check);
        self
    }

    pub fn expect_error(mut self, pattern: Regex) -> Self {
        self.expect_error = Some(pattern);
        self
    }

    pub fn import_state_id(mut self, id: &str) -> Self {
        self.import_state_id = Some(id.to_string());
        self
    }

    pub fn verify(mut self) -> Self {
        self.import_state_verify = true;
        self
    }

    pub fn verify_ignore(mut self, prefixes: &[&str]) -> Self {
        self.import_state_verify_ignore = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// Run a test case regardless of `TF_ACC`
pub async fn unit_test(mut case: TestCase) -> Result<()> {
    case.is_unit_test = true;
    driver::run(case).await
}

/// Run an acceptance test case. Skipped unless `TF_ACC` is set or the case
/// is a unit test
pub async fn test(case: TestCase) -> Result<()> {
    if !case.is_unit_test && std::env::var_os("TF_ACC").is_none() {
        tracing::info!("Acceptance tests skipped unless env 'TF_ACC' set");
        return Ok(());
    }
    driver::run(case).await
}
