//! Adapter serving schema-map resources through the typed Provider trait

use super::{ConfigureFunc, DataSource, Importer, Meta, Resource, ResourceData, Schema};
use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource as TypedDataSource,
    DataSourceMetadataRequest, DataSourceMetadataResponse, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use crate::import::import_state_passthrough_id;
use crate::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory,
    Provider as TypedProvider, ProviderMetadataRequest, ProviderMetadataResponse,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use crate::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource as TypedResource, ResourceMetadataRequest,
    ResourceMetadataResponse, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use crate::schema::{self, SchemaBuilder};
use crate::types::{has_errors, AttributePath, Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

type SchemaMap = Arc<HashMap<String, Schema>>;

/// Schema-map provider: a provider schema, resources and data sources keyed
/// by full type name, and a configure function producing the meta
pub struct Provider {
    type_name: String,
    version: String,
    schema: SchemaMap,
    resources: HashMap<String, (Arc<dyn Resource>, SchemaMap)>,
    data_sources: HashMap<String, (Arc<dyn DataSource>, SchemaMap)>,
    configure_func: Option<ConfigureFunc>,
}

impl Provider {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            version: "0.0.0".to_string(),
            schema: Arc::new(HashMap::new()),
            resources: HashMap::new(),
            data_sources: HashMap::new(),
            configure_func: None,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Provider block schema
    pub fn schema(mut self, schema: HashMap<String, Schema>) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn resource(mut self, type_name: &str, resource: impl Resource + 'static) -> Self {
        let schema = with_id(resource.schema());
        self.resources
            .insert(type_name.to_string(), (Arc::new(resource), schema));
        self
    }

    pub fn data_source(mut self, type_name: &str, data_source: impl DataSource + 'static) -> Self {
        let schema = with_id(data_source.schema());
        self.data_sources
            .insert(type_name.to_string(), (Arc::new(data_source), schema));
        self
    }

    pub fn configure_func(mut self, configure: ConfigureFunc) -> Self {
        self.configure_func = Some(configure);
        self
    }
}

/// Every schema-map resource carries an optional+computed `id`
fn with_id(mut schema: HashMap<String, Schema>) -> SchemaMap {
    schema
        .entry("id".to_string())
        .or_insert_with(|| Schema::string().optional().computed());
    Arc::new(schema)
}

/// Typed schema with attributes in name order
fn typed_schema(schema: &HashMap<String, Schema>, description: &str) -> schema::Schema {
    let mut entries: Vec<(&String, &Schema)> = schema.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .into_iter()
        .fold(
            SchemaBuilder::new().description(description),
            |builder, (name, attr)| builder.attribute(attr.to_attribute(name)),
        )
        .build()
}

/// Checks configured values against their value types. The typed schema only
/// knows `Number`, so integrality is enforced here
fn validate_values(schema: &HashMap<String, Schema>, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut entries: Vec<(&String, &Schema)> = schema.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .into_iter()
        .filter_map(|(name, attr)| {
            let value = config.value.attr(name)?;
            if value.contains_unknown() || attr.value_type.accepts(value) {
                return None;
            }
            Some(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!(
                        "Inappropriate value for attribute {:?}: expected {:?}, got {}",
                        name,
                        attr.value_type,
                        value.type_name()
                    ),
                )
                .with_attribute(AttributePath::new(name)),
            )
        })
        .collect()
}

#[async_trait]
impl TypedProvider for Provider {
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

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: typed_schema(&self.schema, ""),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let Some(configure) = &self.configure_func else {
            return ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: None,
            };
        };

        let d = ResourceData::new(Arc::clone(&self.schema), &DynamicValue::null(), &request.config);
        match configure(&d) {
            Ok(meta) => {
                tracing::debug!(tf_provider = %self.type_name, "Configured provider meta");
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(meta),
                }
            }
            Err(diagnostics) => ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            },
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        self.resources
            .iter()
            .map(|(type_name, (resource, schema))| {
                let key = type_name.clone();
                let type_name = type_name.clone();
                let resource = Arc::clone(resource);
                let schema = Arc::clone(schema);
                let factory: ResourceFactory =
                    Box::new(move || -> Box<dyn ResourceWithConfigure> {
                        Box::new(SdkResource {
                            type_name: type_name.clone(),
                            resource: Arc::clone(&resource),
                            schema: Arc::clone(&schema),
                            meta: Meta::default(),
                        })
                    });
                (key, factory)
            })
            .collect()
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        self.data_sources
            .iter()
            .map(|(type_name, (data_source, schema))| {
                let key = type_name.clone();
                let type_name = type_name.clone();
                let data_source = Arc::clone(data_source);
                let schema = Arc::clone(schema);
                let factory: DataSourceFactory =
                    Box::new(move || -> Box<dyn DataSourceWithConfigure> {
                        Box::new(SdkDataSource {
                            type_name: type_name.clone(),
                            data_source: Arc::clone(&data_source),
                            schema: Arc::clone(&schema),
                            meta: Meta::default(),
                        })
                    });
                (key, factory)
            })
            .collect()
    }
}

struct SdkResource {
    type_name: String,
    resource: Arc<dyn Resource>,
    schema: SchemaMap,
    meta: Meta,
}

#[async_trait]
impl TypedResource for SdkResource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name.clone(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: typed_schema(&self.schema, self.resource.description()),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: validate_values(&self.schema, &request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut d = ResourceData::new(
            Arc::clone(&self.schema),
            &DynamicValue::null(),
            &request.planned_state,
        );
        let diagnostics = self.resource.create(ctx, &mut d, &self.meta).await;

        // A create that failed before setting the id leaves nothing behind
        CreateResourceResponse {
            new_state: d.to_state(),
            diagnostics,
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut d = ResourceData::new(
            Arc::clone(&self.schema),
            &request.current_state,
            &request.current_state,
        );
        let diagnostics = self.resource.read(ctx, &mut d, &self.meta).await;

        let new_state = if has_errors(&diagnostics) {
            Some(request.current_state)
        } else if d.id().is_empty() {
            None
        } else {
            Some(d.to_object())
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut d = ResourceData::new(
            Arc::clone(&self.schema),
            &request.prior_state,
            &request.planned_state,
        );
        let diagnostics = self.resource.update(ctx, &mut d, &self.meta).await;

        let new_state = if has_errors(&diagnostics) {
            request.prior_state
        } else {
            d.to_state()
        };

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut d = ResourceData::new(
            Arc::clone(&self.schema),
            &request.prior_state,
            &request.prior_state,
        );
        let diagnostics = self.resource.delete(ctx, &mut d, &self.meta).await;

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        match self.resource.importer() {
            Some(Importer::Passthrough) => {
                import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
            }
            None => response.diagnostics.push(Diagnostic::error(
                "Resource Import Not Implemented",
                format!(
                    "This resource does not support import. Resource type: {}",
                    request.type_name
                ),
            )),
        }

        response
    }
}

#[async_trait]
impl ResourceWithConfigure for SdkResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        self.meta = Meta::new(request.provider_data);
        ConfigureResourceResponse {
            diagnostics: vec![],
        }
    }
}

struct SdkDataSource {
    type_name: String,
    data_source: Arc<dyn DataSource>,
    schema: SchemaMap,
    meta: Meta,
}

#[async_trait]
impl TypedDataSource for SdkDataSource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name.clone(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: typed_schema(&self.schema, self.data_source.description()),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: validate_values(&self.schema, &request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut d = ResourceData::new(Arc::clone(&self.schema), &DynamicValue::null(), &request.config);
        let diagnostics = self.data_source.read(ctx, &mut d, &self.meta).await;

        let state = if has_errors(&diagnostics) {
            DynamicValue::null()
        } else {
            d.to_object()
        };

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for SdkDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.meta = Meta::new(request.provider_data);
        ConfigureDataSourceResponse {
            diagnostics: vec![],
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::protocol::{self, ProviderService};
    use crate::server::ProviderServer;
    use crate::sdk::{ConfigureResult, ValueType};
    use crate::types::Dynamic;
    use tokio::sync::Mutex;

    type Store = Arc<Mutex<HashMap<String, i64>>>;

    struct Widget;

    #[async_trait]
    impl Resource for Widget {
        fn schema(&self) -> HashMap<String, Schema> {
            HashMap::from([
                ("name".to_string(), Schema::string().required().force_new()),
                ("size".to_string(), Schema::int().computed()),
                ("colour".to_string(), Schema::string().optional().default("blue")),
            ])
        }

        fn importer(&self) -> Option<Importer> {
            Some(Importer::Passthrough)
        }

        async fn create(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
            let Some(store) = meta.downcast_ref::<Store>() else {
                return vec![Diagnostic::error("Unconfigured client", "")];
            };
            let name = d.get_string("name");
            store.lock().await.insert(name.clone(), 7);
            d.set_id(name);
            self.read(ctx, d, meta).await
        }

        async fn read(&self, _ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
            let Some(store) = meta.downcast_ref::<Store>() else {
                return vec![Diagnostic::error("Unconfigured client", "")];
            };
            match store.lock().await.get(d.id()) {
                Some(size) => {
                    let name = d.id().to_string();
                    d.set("name", name).unwrap();
                    d.set("size", *size).unwrap();
                }
                None => d.set_id(""),
            }
            vec![]
        }

        async fn update(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
            self.read(ctx, d, meta).await
        }

        async fn delete(&self, _ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
            if let Some(store) = meta.downcast_ref::<Store>() {
                store.lock().await.remove(d.id());
            }
            vec![]
        }
    }

    struct Sizes;

    #[async_trait]
    impl DataSource for Sizes {
        fn schema(&self) -> HashMap<String, Schema> {
            HashMap::from([
                ("sizes".to_string(), Schema::list_of(ValueType::TypeInt).computed()),
                ("limit".to_string(), Schema::int().optional()),
            ])
        }

        async fn read(&self, _ctx: Context, d: &mut ResourceData, _meta: &Meta) -> Vec<Diagnostic> {
            d.set_id("sizes");
            d.set("sizes", vec![1, 2, 3]).unwrap();
            vec![]
        }
    }

    fn provider(store: Store) -> Provider {
        Provider::new("shop")
            .resource("shop_widget", Widget)
            .data_source("shop_sizes", Sizes)
            .configure_func(Box::new(
                move |_d: &ResourceData| -> ConfigureResult { Ok(Arc::new(Arc::clone(&store))) },
            ))
    }

    async fn configured_server(store: Store) -> ProviderServer<Provider> {
        let server = ProviderServer::new(provider(store));
        let response = server
            .configure_provider(
                Context::new(),
                protocol::configure_provider::Request {
                    terraform_version: "1.9.0".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        server
    }

    fn object(entries: Vec<(&str, Dynamic)>) -> DynamicValue {
        DynamicValue::new(Dynamic::object(entries))
    }

    #[tokio::test]
    async fn schema_gains_id_and_sorted_attributes() {
        let server = ProviderServer::new(provider(Store::default()));
        let response = server
            .get_provider_schema(Context::new(), protocol::get_provider_schema::Request)
            .await;

        let schema = &response.resource_schemas["shop_widget"];
        let names: Vec<&str> = schema
            .block
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["colour", "id", "name", "size"]);

        let id = schema.block.attribute("id").unwrap();
        assert!(id.optional && id.computed);
        let colour = schema.block.attribute("colour").unwrap();
        assert!(colour.optional && colour.computed && colour.default.is_some());
        assert!(response.data_source_schemas.contains_key("shop_sizes"));
    }

    #[tokio::test]
    async fn plan_and_create_round_trip() {
        let store = Store::default();
        let server = configured_server(Arc::clone(&store)).await;
        let config = object(vec![
            ("name", Dynamic::from("gear")),
            ("size", Dynamic::Null),
            ("colour", Dynamic::Null),
            ("id", Dynamic::Null),
        ]);

        let plan = server
            .plan_resource_change(
                Context::new(),
                protocol::plan_resource_change::Request {
                    type_name: "shop_widget".to_string(),
                    prior_state: DynamicValue::null(),
                    proposed_new_state: config.clone(),
                    config: config.clone(),
                },
            )
            .await;
        assert!(plan.diagnostics.is_empty());
        assert_eq!(
            plan.planned_state.get_string(&AttributePath::new("colour")).unwrap(),
            "blue"
        );
        assert!(plan
            .planned_state
            .lookup(&AttributePath::new("size"))
            .unwrap()
            .is_unknown());

        let applied = server
            .apply_resource_change(
                Context::new(),
                protocol::apply_resource_change::Request {
                    type_name: "shop_widget".to_string(),
                    prior_state: DynamicValue::null(),
                    planned_state: plan.planned_state,
                    config,
                },
            )
            .await;
        assert!(applied.diagnostics.is_empty());
        let state = applied.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "gear");
        assert_eq!(state.get_number(&AttributePath::new("size")).unwrap(), 7.0);
        assert_eq!(state.get_string(&AttributePath::new("colour")).unwrap(), "blue");
        assert!(!state.contains_unknown());
        assert_eq!(store.lock().await.get("gear"), Some(&7));
    }

    #[tokio::test]
    async fn read_of_missing_resource_removes_it() {
        let server = configured_server(Store::default()).await;
        let response = server
            .read_resource(
                Context::new(),
                protocol::read_resource::Request {
                    type_name: "shop_widget".to_string(),
                    current_state: object(vec![
                        ("id", Dynamic::from("gone")),
                        ("name", Dynamic::from("gone")),
                    ]),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_null());
    }

    #[tokio::test]
    async fn passthrough_import_sets_id() {
        let server = configured_server(Store::default()).await;
        let response = server
            .import_resource_state(
                Context::new(),
                protocol::import_resource_state::Request {
                    type_name: "shop_widget".to_string(),
                    id: "gear".to_string(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.imported_resources[0]
                .state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "gear"
        );
    }

    #[tokio::test]
    async fn unconfigured_meta_surfaces_as_diagnostic() {
        let server = ProviderServer::new(provider(Store::default()));
        let response = server
            .read_resource(
                Context::new(),
                protocol::read_resource::Request {
                    type_name: "shop_widget".to_string(),
                    current_state: object(vec![("id", Dynamic::from("gear"))]),
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Unconfigured client");
        assert_eq!(
            response.new_state.get_string(&AttributePath::new("id")).unwrap(),
            "gear"
        );
    }

    #[tokio::test]
    async fn data_source_read_fills_object() {
        let server = configured_server(Store::default()).await;
        let response = server
            .read_data_source(
                Context::new(),
                protocol::read_data_source::Request {
                    type_name: "shop_sizes".to_string(),
                    config: object(vec![("sizes", Dynamic::Null), ("id", Dynamic::Null)]),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.state.get_string(&AttributePath::new("id")).unwrap(),
            "sizes"
        );
        assert_eq!(response.state.get_list(&AttributePath::new("sizes")).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn configure_func_errors_are_returned() {
        let provider = Provider::new("shop").configure_func(Box::new(
            |_d: &ResourceData| -> ConfigureResult {
                Err(vec![Diagnostic::error("Bad credentials", "token rejected")])
            },
        ));
        let server = ProviderServer::new(provider);
        let response = server
            .configure_provider(
                Context::new(),
                protocol::configure_provider::Request {
                    terraform_version: "1.9.0".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Bad credentials");
    }

    #[test]
    fn fractional_int_is_rejected_with_its_attribute() {
        let schema = HashMap::from([
            ("count".to_string(), Schema::int().optional()),
            ("ratio".to_string(), Schema::new(ValueType::TypeFloat).optional()),
            ("ids".to_string(), Schema::list_of(ValueType::TypeInt).optional()),
            ("spare".to_string(), Schema::int().optional()),
        ]);
        let config = object(vec![
            ("count", Dynamic::Number(2.5)),
            ("ratio", Dynamic::Number(2.5)),
            ("ids", Dynamic::List(vec![Dynamic::from(1), Dynamic::Unknown])),
            ("spare", Dynamic::Null),
        ]);

        let diagnostics = validate_values(&schema, &config);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Incorrect attribute value type");
        assert!(diagnostics[0].detail.contains("\"count\""));
        assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("count")));

        let whole = object(vec![("count", Dynamic::from(3)), ("ids", Dynamic::List(vec![]))]);
        assert!(validate_values(&schema, &whole).is_empty());
    }

    #[tokio::test]
    async fn data_source_validation_checks_value_types() {
        let server = configured_server(Store::default()).await;
        let response = server
            .validate_data_resource_config(
                Context::new(),
                protocol::validate_data_resource_config::Request {
                    type_name: "shop_sizes".to_string(),
                    config: object(vec![
                        ("id", Dynamic::Null),
                        ("sizes", Dynamic::Null),
                        ("limit", Dynamic::Number(1.5)),
                    ]),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].attribute, Some(AttributePath::new("limit")));
    }
}
