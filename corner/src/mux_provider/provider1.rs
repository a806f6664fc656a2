//! Typed framework half of the muxed provider

use crate::backend::{Client, User};
use crate::CornerProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, Value};

pub struct Provider1 {
    client: Client,
}

impl Provider1 {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Provider for Provider1 {
    fn type_name(&self) -> &str {
        "tf6muxprovider"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
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
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(CornerProviderData::new(self.client.clone()))),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "tf6muxprovider_user1".to_string(),
            Box::new(|| -> Box<dyn ResourceWithConfigure> { Box::new(User1Resource::default()) }),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        HashMap::new()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct User1Model {
    email: String,
    name: String,
    age: i64,
    id: Value<String>,
    date_joined: Value<String>,
    language: Value<String>,
}

impl User1Model {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let decode = |e: tfplug::TfplugError| {
            Diagnostic::error("Invalid user data", format!("Unable to decode user: {}", e))
        };

        Ok(Self {
            email: value.get_string(&AttributePath::new("email")).map_err(decode)?,
            name: value.get_string(&AttributePath::new("name")).map_err(decode)?,
            age: value.get(&AttributePath::new("age")).map_err(decode)?,
            id: value.get(&AttributePath::new("id")).map_err(decode)?,
            date_joined: value
                .get(&AttributePath::new("date_joined"))
                .map_err(decode)?,
            language: value.get(&AttributePath::new("language")).map_err(decode)?,
        })
    }

    fn to_value(&self) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("email", Dynamic::from(self.email.clone())),
            ("name", Dynamic::from(self.name.clone())),
            ("age", Dynamic::from(self.age)),
            ("id", Dynamic::from(self.id.clone())),
            ("date_joined", Dynamic::from(self.date_joined.clone())),
            ("language", Dynamic::from(self.language.clone())),
        ]))
    }

    fn to_backend(&self) -> User {
        User {
            email: self.email.clone(),
            name: self.name.clone(),
            age: self.age,
            date_joined: String::new(),
            language: self.language.value_or_default(),
        }
    }
}

#[derive(Default)]
pub struct User1Resource {
    provider_data: Option<CornerProviderData>,
}

impl User1Resource {
    fn client(&self) -> Result<&Client, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| &data.client)
            .ok_or_else(|| {
                Diagnostic::error(
                    "Unconfigured client",
                    "The provider has not been configured, so no backend client is available",
                )
            })
    }
}

#[async_trait]
impl Resource for User1Resource {
    fn type_name(&self) -> &str {
        "tf6muxprovider_user1"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: format!("{}_user1", request.provider_type_name),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(
                AttributeBuilder::new("email", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("age", AttributeType::Number)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("date_joined", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("language", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(
        &self,
        _ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let result = async {
            let client = self.client()?;
            let mut plan = User1Model::from_value(&request.planned_state)?;

            client
                .create_user(&plan.to_backend())
                .await
                .map_err(|e| Diagnostic::error("Error creating user", e.to_string()))?;
            let created = client
                .read_user(&plan.email)
                .await
                .map_err(|e| Diagnostic::error("Error reading user", e.to_string()))?
                .ok_or_else(|| {
                    Diagnostic::error("Error reading user", "could not find user after it was created")
                })?;

            plan.date_joined = Value::Known(created.date_joined);
            plan.language = Value::Known(created.language);
            Ok::<_, Diagnostic>(plan.to_value())
        }
        .await;

        match result {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = async {
            let client = self.client()?;
            let mut state = User1Model::from_value(&request.current_state)?;

            let user = client
                .read_user(&state.email)
                .await
                .map_err(|e| Diagnostic::error("Error reading user", e.to_string()))?;
            Ok::<_, Diagnostic>(user.map(|user| {
                state.name = user.name;
                state.age = user.age;
                state.date_joined = Value::Known(user.date_joined);
                state.language = Value::Known(user.language);
                state.to_value()
            }))
        }
        .await;

        match result {
            Ok(Some(new_state)) => ReadResourceResponse {
                new_state: Some(new_state),
                diagnostics: vec![],
            },
            Ok(None) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![],
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
            },
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        let result = async {
            let client = self.client()?;
            let plan = User1Model::from_value(&request.planned_state)?;
            client
                .update_user(&plan.to_backend())
                .await
                .map_err(|e| Diagnostic::error("Error updating user", e.to_string()))
        }
        .await;

        match result {
            Ok(()) => UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let result = async {
            let client = self.client()?;
            let state = User1Model::from_value(&request.prior_state)?;
            client
                .delete_user(&state.email)
                .await
                .map_err(|e| Diagnostic::error("Error deleting user", e.to_string()))
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for User1Resource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            match data.downcast_ref::<CornerProviderData>() {
                Some(provider_data) => self.provider_data = Some(provider_data.clone()),
                None => diagnostics.push(Diagnostic::error(
                    "Unexpected Resource Configure Type",
                    "Expected CornerProviderData from the provider",
                )),
            }
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn model_reads_known_and_unknown_values() {
        let plan = DynamicValue::new(Dynamic::object([
            ("email", Dynamic::from("example@example.com")),
            ("name", Dynamic::from("Example Name")),
            ("age", Dynamic::Number(123.0)),
            ("id", Dynamic::from("h")),
            ("date_joined", Dynamic::Unknown),
            ("language", Dynamic::Null),
        ]));

        let model = User1Model::from_value(&plan).unwrap();
        assert_eq!(model.age, 123);
        assert_eq!(model.id, Value::Known("h".to_string()));
        assert!(model.date_joined.is_unknown());
        assert!(model.language.is_null());
        assert_eq!(model.to_backend().language, "");
    }

    #[test]
    fn fractional_age_is_rejected() {
        let plan = DynamicValue::new(Dynamic::object([
            ("email", Dynamic::from("example@example.com")),
            ("name", Dynamic::from("Example Name")),
            ("age", Dynamic::Number(12.5)),
        ]));

        let diag = User1Model::from_value(&plan).unwrap_err();
        assert_eq!(diag.summary, "Invalid user data");
    }
}
