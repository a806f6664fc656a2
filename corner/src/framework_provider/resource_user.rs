//! User resource with a defaulted OIDC policy object

use super::defaults::{DefaultBool, DefaultObject, DefaultString};
use crate::backend::User;
use crate::CornerProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, FromDynamic, Value};

#[derive(Default)]
pub struct UserResource {
    provider_data: Option<CornerProviderData>,
}

impl UserResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Typed view of the `oidc_policy` object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OidcPolicyModel {
    pub grant_access_session_revocation_api: Value<bool>,
    pub grant_access_session_session_management_api: Value<bool>,
    pub id_token_content_encryption_algorithm: Value<String>,
    pub id_token_encryption_algorithm: Value<String>,
    pub id_token_signing_algorithm: Value<String>,
    pub logout_uris: Value<Vec<String>>,
    pub pairwise_identifier_user_type: Value<bool>,
    pub ping_access_logout_capable: Value<bool>,
    pub policy_group: Value<String>,
    pub sector_identifier_uri: Value<String>,
}

fn field<T: FromDynamic>(object: &Dynamic, name: &str) -> tfplug::Result<T> {
    T::from_dynamic(object.attr(name).unwrap_or(&Dynamic::Null))
}

impl FromDynamic for OidcPolicyModel {
    fn from_dynamic(value: &Dynamic) -> tfplug::Result<Self> {
        if value.as_map().is_none() {
            return Err(tfplug::TfplugError::TypeMismatch {
                expected: "object".to_string(),
                actual: value.type_name().to_string(),
            });
        }

        Ok(Self {
            grant_access_session_revocation_api: field(
                value,
                "grant_access_session_revocation_api",
            )?,
            grant_access_session_session_management_api: field(
                value,
                "grant_access_session_session_management_api",
            )?,
            id_token_content_encryption_algorithm: field(
                value,
                "id_token_content_encryption_algorithm",
            )?,
            id_token_encryption_algorithm: field(value, "id_token_encryption_algorithm")?,
            id_token_signing_algorithm: field(value, "id_token_signing_algorithm")?,
            logout_uris: field(value, "logout_uris")?,
            pairwise_identifier_user_type: field(value, "pairwise_identifier_user_type")?,
            ping_access_logout_capable: field(value, "ping_access_logout_capable")?,
            policy_group: field(value, "policy_group")?,
            sector_identifier_uri: field(value, "sector_identifier_uri")?,
        })
    }
}

impl From<OidcPolicyModel> for Dynamic {
    fn from(policy: OidcPolicyModel) -> Self {
        Dynamic::object([
            (
                "grant_access_session_revocation_api",
                Dynamic::from(policy.grant_access_session_revocation_api),
            ),
            (
                "grant_access_session_session_management_api",
                Dynamic::from(policy.grant_access_session_session_management_api),
            ),
            (
                "id_token_content_encryption_algorithm",
                Dynamic::from(policy.id_token_content_encryption_algorithm),
            ),
            (
                "id_token_encryption_algorithm",
                Dynamic::from(policy.id_token_encryption_algorithm),
            ),
            (
                "id_token_signing_algorithm",
                Dynamic::from(policy.id_token_signing_algorithm),
            ),
            ("logout_uris", Dynamic::from(policy.logout_uris)),
            (
                "pairwise_identifier_user_type",
                Dynamic::from(policy.pairwise_identifier_user_type),
            ),
            (
                "ping_access_logout_capable",
                Dynamic::from(policy.ping_access_logout_capable),
            ),
            ("policy_group", Dynamic::from(policy.policy_group)),
            ("sector_identifier_uri", Dynamic::from(policy.sector_identifier_uri)),
        ])
    }
}

/// Typed view of a `framework_user` plan or state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserModel {
    pub email: String,
    pub name: String,
    pub age: i64,
    /// Only carried for older test harnesses that expect an `id`
    pub id: Value<String>,
    pub date_joined: Value<String>,
    pub language: Value<String>,
    pub oidc_policy: Value<OidcPolicyModel>,
}

impl UserModel {
    /// Missing identity attributes read as empty, so a freshly imported
    /// state holding only `name` still decodes
    pub fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let decode = |e: tfplug::TfplugError| {
            Diagnostic::error("Invalid user data", format!("Unable to decode user: {}", e))
        };

        Ok(Self {
            email: value
                .get::<Option<String>>(&AttributePath::new("email"))
                .map_err(decode)?
                .unwrap_or_default(),
            name: value
                .get::<Option<String>>(&AttributePath::new("name"))
                .map_err(decode)?
                .unwrap_or_default(),
            age: value
                .get::<Option<i64>>(&AttributePath::new("age"))
                .map_err(decode)?
                .unwrap_or_default(),
            id: value.get(&AttributePath::new("id")).map_err(decode)?,
            date_joined: value
                .get(&AttributePath::new("date_joined"))
                .map_err(decode)?,
            language: value.get(&AttributePath::new("language")).map_err(decode)?,
            oidc_policy: value
                .get(&AttributePath::new("oidc_policy"))
                .map_err(decode)?,
        })
    }

    pub fn to_value(&self) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("email", Dynamic::from(self.email.clone())),
            ("name", Dynamic::from(self.name.clone())),
            ("age", Dynamic::from(self.age)),
            ("id", Dynamic::from(self.id.clone())),
            ("date_joined", Dynamic::from(self.date_joined.clone())),
            ("language", Dynamic::from(self.language.clone())),
            ("oidc_policy", Dynamic::from(self.oidc_policy.clone())),
        ]))
    }

    /// Backend record; an unknown language is left for the backend to pick
    pub fn to_backend(&self) -> User {
        User {
            email: self.email.clone(),
            name: self.name.clone(),
            age: self.age,
            date_joined: String::new(),
            language: self.language.value_or_default(),
        }
    }
}

fn oidc_policy_types() -> HashMap<String, AttributeType> {
    HashMap::from([
        ("grant_access_session_revocation_api".to_string(), AttributeType::Bool),
        (
            "grant_access_session_session_management_api".to_string(),
            AttributeType::Bool,
        ),
        ("pairwise_identifier_user_type".to_string(), AttributeType::Bool),
        ("ping_access_logout_capable".to_string(), AttributeType::Bool),
        ("id_token_content_encryption_algorithm".to_string(), AttributeType::String),
        ("id_token_encryption_algorithm".to_string(), AttributeType::String),
        ("id_token_signing_algorithm".to_string(), AttributeType::String),
        ("policy_group".to_string(), AttributeType::String),
        ("sector_identifier_uri".to_string(), AttributeType::String),
        (
            "logout_uris".to_string(),
            AttributeType::List(Box::new(AttributeType::String)),
        ),
    ])
}

fn oidc_policy_defaults() -> HashMap<String, Dynamic> {
    HashMap::from([
        ("grant_access_session_revocation_api".to_string(), Dynamic::Bool(false)),
        (
            "grant_access_session_session_management_api".to_string(),
            Dynamic::Bool(false),
        ),
        ("pairwise_identifier_user_type".to_string(), Dynamic::Bool(false)),
        ("ping_access_logout_capable".to_string(), Dynamic::Bool(false)),
        ("id_token_content_encryption_algorithm".to_string(), Dynamic::Null),
        ("id_token_encryption_algorithm".to_string(), Dynamic::Null),
        ("id_token_signing_algorithm".to_string(), Dynamic::Null),
        ("policy_group".to_string(), Dynamic::Null),
        ("sector_identifier_uri".to_string(), Dynamic::Null),
        ("logout_uris".to_string(), Dynamic::Null),
    ])
}

fn oidc_policy_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("grant_access_session_revocation_api", AttributeType::Bool)
            .optional()
            .plan_modifier(DefaultBool::create(false))
            .build(),
        AttributeBuilder::new(
            "grant_access_session_session_management_api",
            AttributeType::Bool,
        )
        .optional()
        .computed()
        .plan_modifier(DefaultBool::create(false))
        .build(),
        AttributeBuilder::new("id_token_content_encryption_algorithm", AttributeType::String)
            .optional()
            .build(),
        AttributeBuilder::new("id_token_encryption_algorithm", AttributeType::String)
            .optional()
            .build(),
        AttributeBuilder::new("id_token_signing_algorithm", AttributeType::String)
            .optional()
            .computed()
            .plan_modifier(DefaultString::create("RS256"))
            .build(),
        AttributeBuilder::new(
            "logout_uris",
            AttributeType::List(Box::new(AttributeType::String)),
        )
        .optional()
        .build(),
        AttributeBuilder::new("pairwise_identifier_user_type", AttributeType::Bool)
            .optional()
            .computed()
            .plan_modifier(DefaultBool::create(false))
            .build(),
        AttributeBuilder::new("ping_access_logout_capable", AttributeType::Bool)
            .optional()
            .build(),
        AttributeBuilder::new("policy_group", AttributeType::String)
            .optional()
            .build(),
        AttributeBuilder::new("sector_identifier_uri", AttributeType::String)
            .optional()
            .build(),
    ]
}

fn unconfigured() -> Diagnostic {
    Diagnostic::error(
        "Unconfigured client",
        "The provider has not been configured, so no backend client is available",
    )
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &str {
        "framework_user"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: format!("{}_user", request.provider_type_name),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("A user of the fake backend, with OIDC policy defaults")
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
            .attribute(
                AttributeBuilder::nested("oidc_policy", NestedType::single(oidc_policy_attributes()))
                    .description(
                        "Open ID Connect Policy settings.  This is included in the message only when OIDC is enabled.",
                    )
                    .optional()
                    .computed()
                    .plan_modifier(DefaultObject::create(
                        oidc_policy_types(),
                        oidc_policy_defaults(),
                    ))
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
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![unconfigured()],
            };
        };

        let mut plan = match UserModel::from_value(&request.planned_state) {
            Ok(plan) => plan,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics: vec![diag],
                }
            }
        };

        let new_user = plan.to_backend();
        if let Err(e) = provider_data.client.create_user(&new_user).await {
            return CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error("Error creating user", e.to_string())],
            };
        }

        let created = match provider_data.client.read_user(&new_user.email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error(
                        "Error reading user",
                        "could not find user after it was created",
                    )],
                }
            }
            Err(e) => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error("Error reading user", e.to_string())],
                }
            }
        };

        plan.date_joined = Value::Known(created.date_joined);
        plan.language = Value::Known(created.language);

        CreateResourceResponse {
            new_state: plan.to_value(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![unconfigured()],
            };
        };

        let mut state = match UserModel::from_value(&request.current_state) {
            Ok(state) => state,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                }
            }
        };

        match provider_data.client.read_user(&state.email).await {
            Ok(Some(user)) => {
                state.name = user.name;
                state.age = user.age;
                state.date_joined = Value::Known(user.date_joined);
                state.language = Value::Known(user.language);

                ReadResourceResponse {
                    new_state: Some(state.to_value()),
                    diagnostics: vec![],
                }
            }
            // Left as is; the backend has nothing to refresh it from
            Ok(None) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error("Error reading user", e.to_string())],
            },
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![unconfigured()],
            };
        };

        let plan = match UserModel::from_value(&request.planned_state) {
            Ok(plan) => plan,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };

        match provider_data.client.update_user(&plan.to_backend()).await {
            Ok(()) => UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error("Error updating user", e.to_string())],
            },
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![unconfigured()],
            };
        };

        let state = match UserModel::from_value(&request.prior_state) {
            Ok(state) => state,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        match provider_data.client.delete_user(&state.email).await {
            Ok(()) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![Diagnostic::error("Error deleting user", e.to_string())],
            },
        }
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
        import_state_passthrough_id(&ctx, AttributePath::new("name"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for UserResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        // Before the provider is configured there is nothing to hold on to
        let Some(data) = request.provider_data else {
            return ConfigureResourceResponse { diagnostics };
        };

        if let Some(provider_data) = data.downcast_ref::<CornerProviderData>() {
            self.provider_data = Some(provider_data.clone());
        } else {
            tracing::error!("Failed to downcast provider data to CornerProviderData");
            diagnostics.push(Diagnostic::error(
                "Unexpected Resource Configure Type",
                "Expected CornerProviderData from the provider",
            ));
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::backend::Client;
    use std::sync::Arc;

    fn plan() -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("email", Dynamic::from("ford@prefect.co")),
            ("name", Dynamic::from("Ford Prefect")),
            ("age", Dynamic::Number(200.0)),
            ("id", Dynamic::Null),
            ("date_joined", Dynamic::Unknown),
            ("language", Dynamic::Unknown),
            (
                "oidc_policy",
                Dynamic::from(OidcPolicyModel {
                    id_token_signing_algorithm: Value::Known("RS256".to_string()),
                    ping_access_logout_capable: Value::Known(false),
                    ..OidcPolicyModel::default()
                }),
            ),
        ]))
    }

    async fn configured(client: &Client) -> UserResource {
        let mut resource = UserResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(CornerProviderData::new(client.clone()))),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    #[test]
    fn model_round_trips_through_state() {
        let model = UserModel::from_value(&plan()).unwrap();

        assert_eq!(model.email, "ford@prefect.co");
        assert_eq!(model.age, 200);
        assert!(model.date_joined.is_unknown());
        let policy = model.oidc_policy.known().unwrap();
        assert_eq!(policy.id_token_signing_algorithm, Value::Known("RS256".to_string()));
        assert!(policy.logout_uris.is_null());

        assert_eq!(UserModel::from_value(&model.to_value()).unwrap(), model);
    }

    #[test]
    fn partial_import_state_decodes() {
        let imported = DynamicValue::new(Dynamic::object([("name", "Example Name")]));
        let model = UserModel::from_value(&imported).unwrap();

        assert_eq!(model.name, "Example Name");
        assert_eq!(model.email, "");
        assert!(model.oidc_policy.is_null());
    }

    #[test]
    fn unknown_language_is_left_to_the_backend() {
        let model = UserModel::from_value(&plan()).unwrap();
        assert_eq!(model.to_backend().language, "");
    }

    #[tokio::test]
    async fn create_copies_backend_fields() {
        let client = Client::new();
        let resource = configured(&client).await;

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "framework_user".to_string(),
                    planned_state: plan(),
                    config: DynamicValue::null(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = UserModel::from_value(&response.new_state).unwrap();
        assert_eq!(state.language, Value::Known("en".to_string()));
        assert!(state.date_joined.known().is_some());
        assert!(client.read_user("ford@prefect.co").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_reports_duplicate_user() {
        let client = Client::new();
        client
            .create_user(&User::new("ford@prefect.co", "Ford", 1))
            .await
            .unwrap();
        let resource = configured(&client).await;

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "framework_user".to_string(),
                    planned_state: plan(),
                    config: DynamicValue::null(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Error creating user");
    }

    #[tokio::test]
    async fn read_of_missing_user_keeps_state() {
        let resource = configured(&Client::new()).await;
        let state = DynamicValue::new(Dynamic::object([("name", "Example Name")]));

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "framework_user".to_string(),
                    current_state: state.clone(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, Some(state));
    }

    #[tokio::test]
    async fn update_of_missing_user_fails() {
        let resource = configured(&Client::new()).await;

        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "framework_user".to_string(),
                    prior_state: plan(),
                    planned_state: plan(),
                    config: DynamicValue::null(),
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Error updating user");
        assert_eq!(response.new_state, plan());
    }

    #[tokio::test]
    async fn operations_need_a_configured_client() {
        let resource = UserResource::new();

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "framework_user".to_string(),
                    prior_state: plan(),
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Unconfigured client");
    }

    #[tokio::test]
    async fn configure_rejects_foreign_provider_data() {
        let mut resource = UserResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new("not a client".to_string())),
                },
            )
            .await;

        assert_eq!(
            response.diagnostics[0].summary,
            "Unexpected Resource Configure Type"
        );
    }
}
