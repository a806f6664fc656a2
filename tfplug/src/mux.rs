//! Mux server
//!
//! Serves several provider servers behind one ProviderService. Every
//! resource and data source type must belong to exactly one server; per-type
//! RPCs are routed to the owner and provider-wide RPCs fan out to all.

use crate::context::Context;
use crate::error::{Result, TfplugError};
use crate::protocol::{self, ProviderService};
use crate::schema::{Schema, SchemaBuilder};
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MuxServer {
    servers: Vec<Box<dyn ProviderService>>,
    resources: HashMap<String, usize>,
    data_sources: HashMap<String, usize>,
    schema: protocol::get_provider_schema::Response,
}

impl MuxServer {
    /// Fetch every server's schema and build the routing tables
    pub async fn new(ctx: Context, servers: Vec<Box<dyn ProviderService>>) -> Result<Self> {
        let ctx = ctx.for_rpc("GetProviderSchema");
        let responses = join_all(
            servers
                .iter()
                .map(|server| server.get_provider_schema(ctx.clone(), protocol::get_provider_schema::Request)),
        )
        .await;

        let mut resources = HashMap::new();
        let mut data_sources = HashMap::new();
        let mut resource_schemas = HashMap::new();
        let mut data_source_schemas = HashMap::new();
        let mut provider: Option<Arc<Schema>> = None;
        let mut server_capabilities = Default::default();
        let mut diagnostics = Vec::new();

        for (idx, response) in responses.into_iter().enumerate() {
            for (type_name, schema) in response.resource_schemas {
                if resources.insert(type_name.clone(), idx).is_some() {
                    return Err(TfplugError::DuplicateResourceType { type_name });
                }
                resource_schemas.insert(type_name, schema);
            }

            for (type_name, schema) in response.data_source_schemas {
                if data_sources.insert(type_name.clone(), idx).is_some() {
                    return Err(TfplugError::DuplicateDataSourceType { type_name });
                }
                data_source_schemas.insert(type_name, schema);
            }

            // Servers without provider level attributes do not take part in
            // the provider schema comparison
            if !response.provider.block.attributes.is_empty() {
                match &provider {
                    Some(existing) if !existing.same_shape(&response.provider) => {
                        return Err(TfplugError::ProviderSchemaMismatch);
                    }
                    Some(_) => {}
                    None => provider = Some(response.provider),
                }
            }

            server_capabilities = response.server_capabilities.merge(server_capabilities);
            diagnostics.extend(response.diagnostics);
        }

        tracing::debug!(
            servers = servers.len(),
            resources = resources.len(),
            data_sources = data_sources.len(),
            "Built mux routing tables"
        );

        Ok(Self {
            servers,
            resources,
            data_sources,
            schema: protocol::get_provider_schema::Response {
                provider: provider.unwrap_or_else(|| Arc::new(SchemaBuilder::new().build())),
                resource_schemas,
                data_source_schemas,
                server_capabilities,
                diagnostics,
            },
        })
    }

    fn resource_server(
        &self,
        type_name: &str,
    ) -> std::result::Result<&dyn ProviderService, Vec<Diagnostic>> {
        self.resources
            .get(type_name)
            .map(|idx| self.servers[*idx].as_ref())
            .ok_or_else(|| {
                vec![Diagnostic::error(
                    "Resource Type Not Found",
                    format!("No provider server serves a resource type named {}", type_name),
                )]
            })
    }

    fn data_source_server(
        &self,
        type_name: &str,
    ) -> std::result::Result<&dyn ProviderService, Vec<Diagnostic>> {
        self.data_sources
            .get(type_name)
            .map(|idx| self.servers[*idx].as_ref())
            .ok_or_else(|| {
                vec![Diagnostic::error(
                    "Data Source Type Not Found",
                    format!(
                        "No provider server serves a data source type named {}",
                        type_name
                    ),
                )]
            })
    }
}

#[async_trait]
impl ProviderService for MuxServer {
    async fn get_provider_schema(
        &self,
        _ctx: Context,
        _request: protocol::get_provider_schema::Request,
    ) -> protocol::get_provider_schema::Response {
        self.schema.clone()
    }

    async fn validate_provider_config(
        &self,
        ctx: Context,
        request: protocol::validate_provider_config::Request,
    ) -> protocol::validate_provider_config::Response {
        let responses = join_all(self.servers.iter().map(|server| {
            server.validate_provider_config(
                ctx.clone(),
                protocol::validate_provider_config::Request {
                    config: request.config.clone(),
                },
            )
        }))
        .await;

        protocol::validate_provider_config::Response {
            diagnostics: responses.into_iter().flat_map(|r| r.diagnostics).collect(),
        }
    }

    async fn configure_provider(
        &self,
        ctx: Context,
        request: protocol::configure_provider::Request,
    ) -> protocol::configure_provider::Response {
        let responses = join_all(self.servers.iter().map(|server| {
            server.configure_provider(
                ctx.clone(),
                protocol::configure_provider::Request {
                    terraform_version: request.terraform_version.clone(),
                    config: request.config.clone(),
                },
            )
        }))
        .await;

        protocol::configure_provider::Response {
            diagnostics: responses.into_iter().flat_map(|r| r.diagnostics).collect(),
        }
    }

    async fn validate_resource_config(
        &self,
        ctx: Context,
        request: protocol::validate_resource_config::Request,
    ) -> protocol::validate_resource_config::Response {
        match self.resource_server(&request.type_name) {
            Ok(server) => server.validate_resource_config(ctx, request).await,
            Err(diagnostics) => protocol::validate_resource_config::Response { diagnostics },
        }
    }

    async fn validate_data_resource_config(
        &self,
        ctx: Context,
        request: protocol::validate_data_resource_config::Request,
    ) -> protocol::validate_data_resource_config::Response {
        match self.data_source_server(&request.type_name) {
            Ok(server) => server.validate_data_resource_config(ctx, request).await,
            Err(diagnostics) => protocol::validate_data_resource_config::Response { diagnostics },
        }
    }

    async fn plan_resource_change(
        &self,
        ctx: Context,
        request: protocol::plan_resource_change::Request,
    ) -> protocol::plan_resource_change::Response {
        match self.resource_server(&request.type_name) {
            Ok(server) => server.plan_resource_change(ctx, request).await,
            Err(diagnostics) => protocol::plan_resource_change::Response {
                planned_state: request.proposed_new_state,
                requires_replace: vec![],
                diagnostics,
            },
        }
    }

    async fn apply_resource_change(
        &self,
        ctx: Context,
        request: protocol::apply_resource_change::Request,
    ) -> protocol::apply_resource_change::Response {
        match self.resource_server(&request.type_name) {
            Ok(server) => server.apply_resource_change(ctx, request).await,
            Err(diagnostics) => protocol::apply_resource_change::Response {
                new_state: request.prior_state,
                diagnostics,
            },
        }
    }

    async fn read_resource(
        &self,
        ctx: Context,
        request: protocol::read_resource::Request,
    ) -> protocol::read_resource::Response {
        match self.resource_server(&request.type_name) {
            Ok(server) => server.read_resource(ctx, request).await,
            Err(diagnostics) => protocol::read_resource::Response {
                new_state: request.current_state,
                diagnostics,
            },
        }
    }

    async fn import_resource_state(
        &self,
        ctx: Context,
        request: protocol::import_resource_state::Request,
    ) -> protocol::import_resource_state::Response {
        match self.resource_server(&request.type_name) {
            Ok(server) => server.import_resource_state(ctx, request).await,
            Err(diagnostics) => protocol::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics,
            },
        }
    }

    async fn read_data_source(
        &self,
        ctx: Context,
        request: protocol::read_data_source::Request,
    ) -> protocol::read_data_source::Response {
        match self.data_source_server(&request.type_name) {
            Ok(server) => server.read_data_source(ctx, request).await,
            Err(diagnostics) => protocol::read_data_source::Response {
                state: DynamicValue::null(),
                diagnostics,
            },
        }
    }

    async fn stop_provider(
        &self,
        ctx: Context,
        _request: protocol::stop_provider::Request,
    ) -> protocol::stop_provider::Response {
        let responses = join_all(
            self.servers
                .iter()
                .map(|server| server.stop_provider(ctx.clone(), protocol::stop_provider::Request)),
        )
        .await;

        let errors: Vec<String> = responses
            .into_iter()
            .map(|r| r.error)
            .filter(|e| !e.is_empty())
            .collect();

        protocol::stop_provider::Response {
            error: errors.join("\n"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType};
    use crate::types::{Dynamic, ServerCapabilities};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal service that owns a fixed set of types and counts calls
    struct StubServer {
        resources: Vec<&'static str>,
        data_sources: Vec<&'static str>,
        provider_attribute: Option<AttributeType>,
        capabilities: ServerCapabilities,
        configured: Arc<AtomicUsize>,
    }

    impl StubServer {
        fn new(resources: Vec<&'static str>, data_sources: Vec<&'static str>) -> Self {
            Self {
                resources,
                data_sources,
                provider_attribute: None,
                capabilities: ServerCapabilities::default(),
                configured: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn schema() -> Arc<Schema> {
            Arc::new(SchemaBuilder::new().build())
        }
    }

    #[async_trait]
    impl ProviderService for StubServer {
        async fn get_provider_schema(
            &self,
            _ctx: Context,
            _request: protocol::get_provider_schema::Request,
        ) -> protocol::get_provider_schema::Response {
            let provider = match &self.provider_attribute {
                Some(ty) => Arc::new(
                    SchemaBuilder::new()
                        .attribute(AttributeBuilder::new("endpoint", ty.clone()).optional().build())
                        .build(),
                ),
                None => Self::schema(),
            };
            protocol::get_provider_schema::Response {
                provider,
                resource_schemas: self
                    .resources
                    .iter()
                    .map(|t| (t.to_string(), Self::schema()))
                    .collect(),
                data_source_schemas: self
                    .data_sources
                    .iter()
                    .map(|t| (t.to_string(), Self::schema()))
                    .collect(),
                server_capabilities: self.capabilities,
                diagnostics: vec![],
            }
        }

        async fn validate_provider_config(
            &self,
            _ctx: Context,
            _request: protocol::validate_provider_config::Request,
        ) -> protocol::validate_provider_config::Response {
            protocol::validate_provider_config::Response {
                diagnostics: vec![],
            }
        }

        async fn configure_provider(
            &self,
            _ctx: Context,
            _request: protocol::configure_provider::Request,
        ) -> protocol::configure_provider::Response {
            self.configured.fetch_add(1, Ordering::SeqCst);
            protocol::configure_provider::Response {
                diagnostics: vec![Diagnostic::warning("configured", self.resources.join(","))],
            }
        }

        async fn validate_resource_config(
            &self,
            _ctx: Context,
            _request: protocol::validate_resource_config::Request,
        ) -> protocol::validate_resource_config::Response {
            protocol::validate_resource_config::Response {
                diagnostics: vec![],
            }
        }

        async fn validate_data_resource_config(
            &self,
            _ctx: Context,
            _request: protocol::validate_data_resource_config::Request,
        ) -> protocol::validate_data_resource_config::Response {
            protocol::validate_data_resource_config::Response {
                diagnostics: vec![],
            }
        }

        async fn plan_resource_change(
            &self,
            _ctx: Context,
            request: protocol::plan_resource_change::Request,
        ) -> protocol::plan_resource_change::Response {
            protocol::plan_resource_change::Response {
                planned_state: request.proposed_new_state,
                requires_replace: vec![],
                diagnostics: vec![],
            }
        }

        async fn apply_resource_change(
            &self,
            _ctx: Context,
            request: protocol::apply_resource_change::Request,
        ) -> protocol::apply_resource_change::Response {
            protocol::apply_resource_change::Response {
                new_state: request.planned_state,
                diagnostics: vec![],
            }
        }

        async fn read_resource(
            &self,
            _ctx: Context,
            _request: protocol::read_resource::Request,
        ) -> protocol::read_resource::Response {
            // Answer with the owning server's first type so routing is observable
            protocol::read_resource::Response {
                new_state: DynamicValue::new(self.resources[0].into()),
                diagnostics: vec![],
            }
        }

        async fn import_resource_state(
            &self,
            _ctx: Context,
            _request: protocol::import_resource_state::Request,
        ) -> protocol::import_resource_state::Response {
            protocol::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: vec![],
            }
        }

        async fn read_data_source(
            &self,
            _ctx: Context,
            _request: protocol::read_data_source::Request,
        ) -> protocol::read_data_source::Response {
            protocol::read_data_source::Response {
                state: DynamicValue::null(),
                diagnostics: vec![],
            }
        }

        async fn stop_provider(
            &self,
            _ctx: Context,
            _request: protocol::stop_provider::Request,
        ) -> protocol::stop_provider::Response {
            protocol::stop_provider::Response {
                error: String::new(),
            }
        }
    }

    #[tokio::test]
    async fn routes_by_type_name() {
        let mux = MuxServer::new(
            Context::new(),
            vec![
                Box::new(StubServer::new(vec!["mux_user1"], vec![])),
                Box::new(StubServer::new(vec!["mux_user2"], vec!["mux_regions"])),
            ],
        )
        .await
        .unwrap();

        for type_name in ["mux_user1", "mux_user2"] {
            let response = mux
                .read_resource(
                    Context::new(),
                    protocol::read_resource::Request {
                        type_name: type_name.to_string(),
                        current_state: DynamicValue::empty_object(),
                    },
                )
                .await;
            assert_eq!(response.new_state.value, Dynamic::from(type_name));
        }

        let schema = mux
            .get_provider_schema(Context::new(), protocol::get_provider_schema::Request)
            .await;
        assert_eq!(schema.resource_schemas.len(), 2);
        assert!(schema.data_source_schemas.contains_key("mux_regions"));
    }

    #[tokio::test]
    async fn unknown_type_is_an_error_diagnostic() {
        let mux = MuxServer::new(
            Context::new(),
            vec![Box::new(StubServer::new(vec!["mux_user1"], vec![]))],
        )
        .await
        .unwrap();

        let response = mux
            .read_resource(
                Context::new(),
                protocol::read_resource::Request {
                    type_name: "mux_user3".to_string(),
                    current_state: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("mux_user3"));
    }

    #[tokio::test]
    async fn duplicate_resource_types_are_rejected() {
        let result = MuxServer::new(
            Context::new(),
            vec![
                Box::new(StubServer::new(vec!["mux_user1"], vec![])),
                Box::new(StubServer::new(vec!["mux_user1"], vec![])),
            ],
        )
        .await;

        assert!(matches!(
            result,
            Err(TfplugError::DuplicateResourceType { type_name }) if type_name == "mux_user1"
        ));
    }

    #[tokio::test]
    async fn duplicate_data_source_types_are_rejected() {
        let result = MuxServer::new(
            Context::new(),
            vec![
                Box::new(StubServer::new(vec!["mux_user1"], vec!["mux_regions"])),
                Box::new(StubServer::new(vec!["mux_user2"], vec!["mux_regions"])),
            ],
        )
        .await;

        assert!(matches!(
            result,
            Err(TfplugError::DuplicateDataSourceType { .. })
        ));
    }

    #[tokio::test]
    async fn differing_provider_schemas_are_rejected() {
        let mut first = StubServer::new(vec!["mux_user1"], vec![]);
        first.provider_attribute = Some(AttributeType::String);
        let mut second = StubServer::new(vec!["mux_user2"], vec![]);
        second.provider_attribute = Some(AttributeType::Bool);

        let result = MuxServer::new(Context::new(), vec![Box::new(first), Box::new(second)]).await;
        assert!(matches!(result, Err(TfplugError::ProviderSchemaMismatch)));

        let mut first = StubServer::new(vec!["mux_user1"], vec![]);
        first.provider_attribute = Some(AttributeType::String);
        let second = StubServer::new(vec!["mux_user2"], vec![]);
        assert!(MuxServer::new(Context::new(), vec![Box::new(first), Box::new(second)])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn configure_fans_out_and_capabilities_merge() {
        let first = StubServer::new(vec!["mux_user1"], vec![]);
        let mut second = StubServer::new(vec!["mux_user2"], vec![]);
        second.capabilities.plan_destroy = true;
        let first_count = Arc::clone(&first.configured);
        let second_count = Arc::clone(&second.configured);

        let mux = MuxServer::new(Context::new(), vec![Box::new(first), Box::new(second)])
            .await
            .unwrap();
        let response = mux
            .configure_provider(
                Context::new(),
                protocol::configure_provider::Request {
                    terraform_version: "1.9.0".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
        assert_eq!(response.diagnostics.len(), 2);

        let schema = mux
            .get_provider_schema(Context::new(), protocol::get_provider_schema::Request)
            .await;
        assert!(schema.server_capabilities.plan_destroy);
    }
}
