//! Typed framework provider `framework`
//!
//! Serves `framework_user`, whose nested `oidc_policy` object is planned
//! through the default-value modifiers in [`defaults`].

pub mod defaults;
pub mod resource_user;

pub use defaults::{DefaultBool, DefaultObject, DefaultString};
pub use resource_user::{OidcPolicyModel, UserModel, UserResource};

use crate::backend::Client;
use crate::CornerProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::SchemaBuilder;

pub struct FrameworkProvider {
    type_name: String,
    version: String,
    client: Client,
}

impl Default for FrameworkProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameworkProvider {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Provider whose resources share `client`, so tests can inspect it
    pub fn with_client(client: Client) -> Self {
        Self {
            type_name: "framework".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            client,
        }
    }
}

#[async_trait]
impl Provider for FrameworkProvider {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name.clone(),
            version: self.version.clone(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new().version(0).build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        tracing::debug!(
            terraform_version = %request.terraform_version,
            "Configuring framework provider"
        );

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(CornerProviderData::new(self.client.clone()))),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "framework_user".to_string(),
            Box::new(|| -> Box<dyn ResourceWithConfigure> { Box::new(UserResource::new()) }),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        HashMap::new()
    }
}
