//! In-process protocol messages
//!
//! One module per RPC, each with a `Request` and a `Response`, following the
//! layout of the Terraform plugin protocol:
//!
//! ```rust,ignore
//! use tfplug::protocol;
//!
//! let request = protocol::read_resource::Request {
//!     type_name: "corner_user".to_string(),
//!     current_state: state,
//! };
//! let response = server.read_resource(ctx, request).await;
//! ```
//!
//! Values travel as framework `DynamicValue`s; there is no wire encoding.
//! `ProviderService` is the server side of the protocol, implemented by
//! `ProviderServer` and `MuxServer` and driven by the test harness.

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{AttributePath, Diagnostic, DynamicValue, ServerCapabilities};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ProviderService: Send + Sync {
    async fn get_provider_schema(
        &self,
        ctx: Context,
        request: get_provider_schema::Request,
    ) -> get_provider_schema::Response;

    async fn validate_provider_config(
        &self,
        ctx: Context,
        request: validate_provider_config::Request,
    ) -> validate_provider_config::Response;

    async fn configure_provider(
        &self,
        ctx: Context,
        request: configure_provider::Request,
    ) -> configure_provider::Response;

    async fn validate_resource_config(
        &self,
        ctx: Context,
        request: validate_resource_config::Request,
    ) -> validate_resource_config::Response;

    async fn validate_data_resource_config(
        &self,
        ctx: Context,
        request: validate_data_resource_config::Request,
    ) -> validate_data_resource_config::Response;

    async fn plan_resource_change(
        &self,
        ctx: Context,
        request: plan_resource_change::Request,
    ) -> plan_resource_change::Response;

    async fn apply_resource_change(
        &self,
        ctx: Context,
        request: apply_resource_change::Request,
    ) -> apply_resource_change::Response;

    async fn read_resource(
        &self,
        ctx: Context,
        request: read_resource::Request,
    ) -> read_resource::Response;

    async fn import_resource_state(
        &self,
        ctx: Context,
        request: import_resource_state::Request,
    ) -> import_resource_state::Response;

    async fn read_data_source(
        &self,
        ctx: Context,
        request: read_data_source::Request,
    ) -> read_data_source::Response;

    async fn stop_provider(
        &self,
        ctx: Context,
        request: stop_provider::Request,
    ) -> stop_provider::Response;
}

pub mod get_provider_schema {
    use super::*;

    pub struct Request;

    #[derive(Clone)]
    pub struct Response {
        pub provider: Arc<Schema>,
        pub resource_schemas: HashMap<String, Arc<Schema>>,
        pub data_source_schemas: HashMap<String, Arc<Schema>>,
        pub server_capabilities: ServerCapabilities,
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod validate_provider_config {
    use super::*;

    pub struct Request {
        pub config: DynamicValue,
    }

    pub struct Response {
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod configure_provider {
    use super::*;

    pub struct Request {
        pub terraform_version: String,
        pub config: DynamicValue,
    }

    pub struct Response {
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod validate_resource_config {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub config: DynamicValue,
    }

    pub struct Response {
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod validate_data_resource_config {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub config: DynamicValue,
    }

    pub struct Response {
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod plan_resource_change {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub prior_state: DynamicValue,
        pub proposed_new_state: DynamicValue,
        pub config: DynamicValue,
    }

    pub struct Response {
        pub planned_state: DynamicValue,
        pub requires_replace: Vec<AttributePath>,
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod apply_resource_change {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub prior_state: DynamicValue,
        pub planned_state: DynamicValue,
        pub config: DynamicValue,
    }

    pub struct Response {
        pub new_state: DynamicValue,
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod read_resource {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub current_state: DynamicValue,
    }

    pub struct Response {
        /// Null when the resource no longer exists
        pub new_state: DynamicValue,
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod import_resource_state {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub id: String,
    }

    pub struct ImportedResource {
        pub type_name: String,
        pub state: DynamicValue,
    }

    pub struct Response {
        pub imported_resources: Vec<ImportedResource>,
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod read_data_source {
    use super::*;

    pub struct Request {
        pub type_name: String,
        pub config: DynamicValue,
    }

    pub struct Response {
        pub state: DynamicValue,
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod stop_provider {
    pub struct Request;

    pub struct Response {
        /// Empty on success
        pub error: String,
    }
}
