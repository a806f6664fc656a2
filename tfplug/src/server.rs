//! Provider server
//!
//! ProviderServer wraps a Provider and implements ProviderService: it caches
//! schemas, instantiates and configures resources per call, validates
//! configuration against schemas and computes planned states.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceMetadataRequest, DataSourceSchemaRequest,
    DataSourceWithConfigure, ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::logging;
use crate::protocol::{self, ProviderService};
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderSchemaRequest,
    ResourceFactory, StopProviderRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceMetadataRequest,
    ResourceSchemaRequest, ResourceWithConfigure, UpdateResourceRequest,
    ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, DefaultRequest, NestedType, ObjectNestingMode, PlanModifierRequest, Schema,
};
use crate::types::{
    has_errors, AttributePath, Diagnostic, Dynamic, DynamicValue, ServerCapabilities,
};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Schemas are collected once, on first use
struct SchemaCache {
    provider: Arc<Schema>,
    resources: HashMap<String, Arc<Schema>>,
    data_sources: HashMap<String, Arc<Schema>>,
    diagnostics: Vec<Diagnostic>,
}

pub struct ProviderServer<P: Provider> {
    provider: RwLock<P>,
    provider_type_name: String,
    provider_data: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    schemas: OnceCell<SchemaCache>,
    capabilities: ServerCapabilities,
}

impl<P: Provider> ProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let provider_type_name = provider.type_name().to_string();
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        Self {
            provider: RwLock::new(provider),
            provider_type_name,
            provider_data: RwLock::new(None),
            resources,
            data_sources,
            schemas: OnceCell::new(),
            capabilities: ServerCapabilities::default(),
        }
    }

    pub fn provider_type_name(&self) -> &str {
        &self.provider_type_name
    }

    async fn schemas(&self, ctx: &Context) -> &SchemaCache {
        self.schemas
            .get_or_init(|| self.load_schemas(ctx.clone()))
            .await
    }

    async fn load_schemas(&self, ctx: Context) -> SchemaCache {
        let mut diagnostics = Vec::new();

        let provider_schema = {
            let provider = self.provider.read().await;
            let response = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            Arc::new(response.schema)
        };

        let mut resources = HashMap::new();
        for (type_name, factory) in &self.resources {
            let resource = factory();
            let metadata = resource
                .metadata(
                    ctx.clone(),
                    ResourceMetadataRequest {
                        provider_type_name: self.provider_type_name.clone(),
                    },
                )
                .await;
            if &metadata.type_name != type_name {
                diagnostics.push(type_name_mismatch(type_name, &metadata.type_name));
            }
            let response = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resources.insert(type_name.clone(), Arc::new(response.schema));
        }

        let mut data_sources = HashMap::new();
        for (type_name, factory) in &self.data_sources {
            let data_source = factory();
            let metadata = data_source
                .metadata(
                    ctx.clone(),
                    DataSourceMetadataRequest {
                        provider_type_name: self.provider_type_name.clone(),
                    },
                )
                .await;
            if &metadata.type_name != type_name {
                diagnostics.push(type_name_mismatch(type_name, &metadata.type_name));
            }
            let response = data_source.schema(ctx.clone(), DataSourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            data_sources.insert(type_name.clone(), Arc::new(response.schema));
        }

        tracing::debug!(
            tf_provider = %self.provider_type_name,
            resources = resources.len(),
            data_sources = data_sources.len(),
            "Collected schemas"
        );

        SchemaCache {
            provider: provider_schema,
            resources,
            data_sources,
            diagnostics,
        }
    }

    async fn resource_schema(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Arc<Schema>, Vec<Diagnostic>> {
        self.schemas(ctx)
            .await
            .resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| vec![self.resource_not_found(type_name)])
    }

    async fn data_source_schema(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Arc<Schema>, Vec<Diagnostic>> {
        self.schemas(ctx)
            .await
            .data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| vec![self.data_source_not_found(type_name)])
    }

    /// Fresh resource instance configured with the current provider data
    async fn resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| vec![self.resource_not_found(type_name)])?;

        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }

        Ok(resource)
    }

    async fn data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| vec![self.data_source_not_found(type_name)])?;

        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }

        Ok(data_source)
    }

    fn resource_not_found(&self, type_name: &str) -> Diagnostic {
        Diagnostic::error(
            "Resource Type Not Found",
            format!(
                "The provider {} does not serve a resource type named {}",
                self.provider_type_name, type_name
            ),
        )
    }

    fn data_source_not_found(&self, type_name: &str) -> Diagnostic {
        Diagnostic::error(
            "Data Source Type Not Found",
            format!(
                "The provider {} does not serve a data source type named {}",
                self.provider_type_name, type_name
            ),
        )
    }
}

fn type_name_mismatch(key: &str, reported: &str) -> Diagnostic {
    Diagnostic::error(
        "Type Name Mismatch",
        format!(
            "Registered under {} but its metadata reports {}",
            key, reported
        ),
    )
}

#[async_trait]
impl<P: Provider> ProviderService for ProviderServer<P> {
    async fn get_provider_schema(
        &self,
        ctx: Context,
        _request: protocol::get_provider_schema::Request,
    ) -> protocol::get_provider_schema::Response {
        let ctx = ctx.for_rpc("GetProviderSchema");
        logging::rpc_request(&ctx);

        let schemas = self.schemas(&ctx).await;
        let response = protocol::get_provider_schema::Response {
            provider: Arc::clone(&schemas.provider),
            resource_schemas: schemas.resources.clone(),
            data_source_schemas: schemas.data_sources.clone(),
            server_capabilities: self.capabilities,
            diagnostics: schemas.diagnostics.clone(),
        };

        logging::rpc_response(&ctx, &response.diagnostics);
        response
    }

    async fn validate_provider_config(
        &self,
        ctx: Context,
        request: protocol::validate_provider_config::Request,
    ) -> protocol::validate_provider_config::Response {
        let ctx = ctx.for_rpc("ValidateProviderConfig");
        logging::rpc_request(&ctx);

        let schema = Arc::clone(&self.schemas(&ctx).await.provider);
        let mut diagnostics = validate_config(&schema, &request.config);
        if !has_errors(&diagnostics) {
            let provider = self.provider.read().await;
            let response = provider
                .validate(
                    ctx.clone(),
                    ValidateProviderConfigRequest {
                        config: request.config,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
        }

        logging::rpc_response(&ctx, &diagnostics);
        protocol::validate_provider_config::Response { diagnostics }
    }

    async fn configure_provider(
        &self,
        ctx: Context,
        request: protocol::configure_provider::Request,
    ) -> protocol::configure_provider::Response {
        let ctx = ctx.for_rpc("ConfigureProvider");
        logging::rpc_request(&ctx);

        let response = {
            let mut provider = self.provider.write().await;
            provider
                .configure(
                    ctx.clone(),
                    ConfigureProviderRequest {
                        terraform_version: request.terraform_version,
                        config: request.config,
                    },
                )
                .await
        };

        if let Some(data) = response.provider_data {
            *self.provider_data.write().await = Some(data);
        }

        logging::rpc_response(&ctx, &response.diagnostics);
        protocol::configure_provider::Response {
            diagnostics: response.diagnostics,
        }
    }

    async fn validate_resource_config(
        &self,
        ctx: Context,
        request: protocol::validate_resource_config::Request,
    ) -> protocol::validate_resource_config::Response {
        let ctx = ctx
            .for_rpc("ValidateResourceConfig")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        let diagnostics = match self.resource_schema(&ctx, &request.type_name).await {
            Err(diagnostics) => diagnostics,
            Ok(schema) => {
                let mut diagnostics = validate_config(&schema, &request.config);
                if !has_errors(&diagnostics) {
                    match self.resource(&ctx, &request.type_name).await {
                        Ok(resource) => {
                            let response = resource
                                .validate(
                                    ctx.clone(),
                                    ValidateResourceConfigRequest {
                                        type_name: request.type_name,
                                        config: request.config,
                                    },
                                )
                                .await;
                            diagnostics.extend(response.diagnostics);
                        }
                        Err(errors) => diagnostics.extend(errors),
                    }
                }
                diagnostics
            }
        };

        logging::rpc_response(&ctx, &diagnostics);
        protocol::validate_resource_config::Response { diagnostics }
    }

    async fn validate_data_resource_config(
        &self,
        ctx: Context,
        request: protocol::validate_data_resource_config::Request,
    ) -> protocol::validate_data_resource_config::Response {
        let ctx = ctx
            .for_rpc("ValidateDataResourceConfig")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        let diagnostics = match self.data_source_schema(&ctx, &request.type_name).await {
            Err(diagnostics) => diagnostics,
            Ok(schema) => {
                let mut diagnostics = validate_config(&schema, &request.config);
                if !has_errors(&diagnostics) {
                    match self.data_source(&ctx, &request.type_name).await {
                        Ok(data_source) => {
                            let response = data_source
                                .validate(
                                    ctx.clone(),
                                    ValidateDataSourceConfigRequest {
                                        type_name: request.type_name,
                                        config: request.config,
                                    },
                                )
                                .await;
                            diagnostics.extend(response.diagnostics);
                        }
                        Err(errors) => diagnostics.extend(errors),
                    }
                }
                diagnostics
            }
        };

        logging::rpc_response(&ctx, &diagnostics);
        protocol::validate_data_resource_config::Response { diagnostics }
    }

    async fn plan_resource_change(
        &self,
        ctx: Context,
        request: protocol::plan_resource_change::Request,
    ) -> protocol::plan_resource_change::Response {
        let ctx = ctx
            .for_rpc("PlanResourceChange")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        let schema = match self.resource_schema(&ctx, &request.type_name).await {
            Ok(schema) => schema,
            Err(diagnostics) => {
                logging::rpc_response(&ctx, &diagnostics);
                return protocol::plan_resource_change::Response {
                    planned_state: request.proposed_new_state,
                    requires_replace: vec![],
                    diagnostics,
                };
            }
        };

        // Destroy
        if request.proposed_new_state.is_null() {
            logging::rpc_response(&ctx, &[]);
            return protocol::plan_resource_change::Response {
                planned_state: DynamicValue::null(),
                requires_replace: vec![],
                diagnostics: vec![],
            };
        }

        let config = &request.config.value;
        let prior = &request.prior_state.value;
        let mut planned = request.proposed_new_state.value.clone();
        let mut diagnostics = Vec::new();
        let mut requires_replace = Vec::new();

        apply_defaults(&schema.block.attributes, config, &mut planned, &AttributePath::root());

        if prior.is_null() || &planned != prior {
            mark_computed_nils_as_unknown(&schema.block.attributes, config, &mut planned);
        }

        run_plan_modifiers(
            &schema.block.attributes,
            config,
            prior,
            &mut planned,
            &AttributePath::root(),
            &mut requires_replace,
            &mut diagnostics,
        );

        // Replacement only means something for an existing resource
        if prior.is_null() {
            requires_replace.clear();
        }

        tracing::debug!(
            tf_rpc = ctx.rpc(),
            tf_resource_type = ctx.resource_type(),
            tf_req_id = ctx.req_id(),
            requires_replace = requires_replace.len(),
            "Computed planned state"
        );
        logging::rpc_response(&ctx, &diagnostics);

        protocol::plan_resource_change::Response {
            planned_state: DynamicValue::new(planned),
            requires_replace,
            diagnostics,
        }
    }

    async fn apply_resource_change(
        &self,
        ctx: Context,
        request: protocol::apply_resource_change::Request,
    ) -> protocol::apply_resource_change::Response {
        let ctx = ctx
            .for_rpc("ApplyResourceChange")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                logging::rpc_response(&ctx, &diagnostics);
                return protocol::apply_resource_change::Response {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let type_name = request.type_name.clone();
        let (new_state, diagnostics) = match (
            request.prior_state.is_null(),
            request.planned_state.is_null(),
        ) {
            (true, true) => (DynamicValue::null(), vec![]),
            (true, false) => {
                let response = resource
                    .create(
                        ctx.clone(),
                        CreateResourceRequest {
                            type_name: type_name.clone(),
                            planned_state: request.planned_state,
                            config: request.config,
                        },
                    )
                    .await;
                let mut diagnostics = response.diagnostics;
                if !has_errors(&diagnostics) && response.new_state.is_null() {
                    diagnostics.push(Diagnostic::error(
                        "Missing Resource State After Create",
                        format!(
                            "The {} resource returned no state after creation without an error",
                            type_name
                        ),
                    ));
                }
                (response.new_state, diagnostics)
            }
            (false, true) => {
                let response = resource
                    .delete(
                        ctx.clone(),
                        DeleteResourceRequest {
                            type_name: type_name.clone(),
                            prior_state: request.prior_state.clone(),
                        },
                    )
                    .await;
                if has_errors(&response.diagnostics) {
                    (request.prior_state, response.diagnostics)
                } else {
                    (DynamicValue::null(), response.diagnostics)
                }
            }
            (false, false) => {
                let response = resource
                    .update(
                        ctx.clone(),
                        UpdateResourceRequest {
                            type_name: type_name.clone(),
                            prior_state: request.prior_state.clone(),
                            planned_state: request.planned_state,
                            config: request.config,
                        },
                    )
                    .await;
                let mut diagnostics = response.diagnostics;
                if has_errors(&diagnostics) {
                    (request.prior_state, diagnostics)
                } else {
                    if response.new_state.is_null() {
                        diagnostics.push(Diagnostic::error(
                            "Missing Resource State After Update",
                            format!(
                                "The {} resource returned no state after update without an error",
                                type_name
                            ),
                        ));
                    }
                    (response.new_state, diagnostics)
                }
            }
        };

        logging::rpc_response(&ctx, &diagnostics);
        protocol::apply_resource_change::Response {
            new_state,
            diagnostics,
        }
    }

    async fn read_resource(
        &self,
        ctx: Context,
        request: protocol::read_resource::Request,
    ) -> protocol::read_resource::Response {
        let ctx = ctx
            .for_rpc("ReadResource")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        if request.current_state.is_null() {
            return protocol::read_resource::Response {
                new_state: DynamicValue::null(),
                diagnostics: vec![],
            };
        }

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                logging::rpc_response(&ctx, &diagnostics);
                return protocol::read_resource::Response {
                    new_state: request.current_state,
                    diagnostics,
                };
            }
        };

        let response = resource
            .read(
                ctx.clone(),
                ReadResourceRequest {
                    type_name: request.type_name,
                    current_state: request.current_state,
                },
            )
            .await;

        if response.new_state.is_none() {
            tracing::debug!(
                tf_rpc = ctx.rpc(),
                tf_resource_type = ctx.resource_type(),
                tf_req_id = ctx.req_id(),
                "Resource no longer exists, removing from state"
            );
        }

        logging::rpc_response(&ctx, &response.diagnostics);
        protocol::read_resource::Response {
            new_state: response.new_state.unwrap_or_else(DynamicValue::null),
            diagnostics: response.diagnostics,
        }
    }

    async fn import_resource_state(
        &self,
        ctx: Context,
        request: protocol::import_resource_state::Request,
    ) -> protocol::import_resource_state::Response {
        let ctx = ctx
            .for_rpc("ImportResourceState")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                logging::rpc_response(&ctx, &diagnostics);
                return protocol::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics,
                };
            }
        };

        let response = resource
            .import_state(
                ctx.clone(),
                ImportResourceStateRequest {
                    type_name: request.type_name,
                    id: request.id,
                },
            )
            .await;

        logging::rpc_response(&ctx, &response.diagnostics);
        protocol::import_resource_state::Response {
            imported_resources: response
                .imported_resources
                .into_iter()
                .map(|r| protocol::import_resource_state::ImportedResource {
                    type_name: r.type_name,
                    state: r.state,
                })
                .collect(),
            diagnostics: response.diagnostics,
        }
    }

    async fn read_data_source(
        &self,
        ctx: Context,
        request: protocol::read_data_source::Request,
    ) -> protocol::read_data_source::Response {
        let ctx = ctx
            .for_rpc("ReadDataSource")
            .with_resource_type(&request.type_name);
        logging::rpc_request(&ctx);

        let data_source = match self.data_source(&ctx, &request.type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                logging::rpc_response(&ctx, &diagnostics);
                return protocol::read_data_source::Response {
                    state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };

        let response = data_source
            .read(
                ctx.clone(),
                ReadDataSourceRequest {
                    type_name: request.type_name,
                    config: request.config,
                },
            )
            .await;

        logging::rpc_response(&ctx, &response.diagnostics);
        protocol::read_data_source::Response {
            state: response.state,
            diagnostics: response.diagnostics,
        }
    }

    async fn stop_provider(
        &self,
        ctx: Context,
        _request: protocol::stop_provider::Request,
    ) -> protocol::stop_provider::Response {
        let ctx = ctx.for_rpc("StopProvider");
        logging::rpc_request(&ctx);

        let response = {
            let provider = self.provider.read().await;
            provider.stop(ctx.clone(), StopProviderRequest).await
        };
        ctx.cancel();

        protocol::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }
    }
}

fn single_nested(attr: &Attribute) -> Option<&NestedType> {
    attr.nested_type
        .as_ref()
        .filter(|nested| nested.nesting == ObjectNestingMode::Single)
}

/// Schema conformance of a configuration object: unsupported arguments,
/// missing required arguments, values for read-only attributes and type
/// mismatches, recursing into single nested attributes
pub fn validate_config(schema: &Schema, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_object(
        &schema.block.attributes,
        &config.value,
        &AttributePath::root(),
        &mut diagnostics,
    );
    diagnostics
}

fn validate_object(
    attributes: &[Attribute],
    value: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let empty = HashMap::new();
    let entries = match value {
        Dynamic::Map(entries) => entries,
        Dynamic::Null => &empty,
        Dynamic::Unknown => return,
        other => {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!("An object is required, got {}", other.type_name()),
                )
                .with_attribute(path.clone()),
            );
            return;
        }
    };

    let mut unsupported: Vec<&String> = entries
        .keys()
        .filter(|key| !attributes.iter().any(|a| &a.name == *key))
        .collect();
    unsupported.sort();
    for key in unsupported {
        diagnostics.push(
            Diagnostic::error(
                "Unsupported argument",
                format!("An argument named {:?} is not expected here.", key),
            )
            .with_attribute(path.clone().attribute(key)),
        );
    }

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let value = entries.get(&attr.name).unwrap_or(&Dynamic::Null);

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!(
                            "The argument {:?} is required, but no definition was found.",
                            attr_path.to_string()
                        ),
                    )
                    .with_attribute(attr_path),
                );
            }
            continue;
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid Configuration for Read-Only Attribute",
                    format!(
                        "Cannot set value for this attribute as the provider has marked it as read-only: {}",
                        attr_path
                    ),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        if let Some(nested) = single_nested(attr) {
            validate_object(&nested.attributes, value, &attr_path, diagnostics);
        } else if let Err(reason) = attr.value_type().conforms(value) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!("Inappropriate value for attribute {:?}: {}", attr_path.to_string(), reason),
                )
                .with_attribute(attr_path),
            );
        }
    }
}

/// Fill null-configured attributes that declare a default
fn apply_defaults(
    attributes: &[Attribute],
    config: &Dynamic,
    plan: &mut Dynamic,
    path: &AttributePath,
) {
    let Dynamic::Map(plan_map) = plan else {
        return;
    };

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = config.attr(&attr.name).unwrap_or(&Dynamic::Null);

        if let Some(default) = &attr.default {
            if config_value.is_null() {
                let response = default.default_value(DefaultRequest {
                    path: attr_path.clone(),
                });
                plan_map.insert(attr.name.clone(), response.value.value);
            }
        }

        if let Some(nested) = single_nested(attr) {
            if let Some(child) = plan_map.get_mut(&attr.name) {
                apply_defaults(&nested.attributes, config_value, child, &attr_path);
            }
        }
    }
}

/// Computed attributes left null by configuration become "known after apply"
fn mark_computed_nils_as_unknown(attributes: &[Attribute], config: &Dynamic, plan: &mut Dynamic) {
    let Dynamic::Map(plan_map) = plan else {
        return;
    };

    for attr in attributes {
        let config_value = config.attr(&attr.name).unwrap_or(&Dynamic::Null);
        let slot = plan_map
            .entry(attr.name.clone())
            .or_insert(Dynamic::Null);

        if attr.computed && config_value.is_null() && slot.is_null() {
            *slot = Dynamic::Unknown;
            continue;
        }

        if let Some(nested) = single_nested(attr) {
            mark_computed_nils_as_unknown(&nested.attributes, config_value, slot);
        }
    }
}

/// Run attribute plan modifiers in schema order. A parent runs before its
/// nested attributes, which only run when the parent plan is a known object
fn run_plan_modifiers(
    attributes: &[Attribute],
    config: &Dynamic,
    prior: &Dynamic,
    plan: &mut Dynamic,
    path: &AttributePath,
    requires_replace: &mut Vec<AttributePath>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Dynamic::Map(plan_map) = plan else {
        return;
    };

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = config.attr(&attr.name).cloned().unwrap_or(Dynamic::Null);
        let state_value = prior.attr(&attr.name).cloned().unwrap_or(Dynamic::Null);
        let slot = plan_map
            .entry(attr.name.clone())
            .or_insert(Dynamic::Null);

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value.clone()),
                state_value: DynamicValue::new(state_value.clone()),
                plan_value: DynamicValue::new(std::mem::replace(slot, Dynamic::Null)),
                path: attr_path.clone(),
            });

            *slot = response.plan_value.value;
            if response.requires_replace && !requires_replace.contains(&attr_path) {
                requires_replace.push(attr_path.clone());
            }

            let failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            if failed {
                tracing::warn!(
                    attribute = %attr_path,
                    modifier = %modifier.description(),
                    "Plan modifier failed"
                );
                break;
            }
        }

        if let Some(nested) = single_nested(attr) {
            if matches!(slot, Dynamic::Map(_)) {
                run_plan_modifiers(
                    &nested.attributes,
                    &config_value,
                    &state_value,
                    slot,
                    &attr_path,
                    requires_replace,
                    diagnostics,
                );
            }
        }
    }
}
