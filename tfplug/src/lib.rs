//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust: a typed provider
//! API, a schema-map SDK layer, an in-process protocol server with muxing,
//! and an acceptance test driver that plays the part of Terraform core.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;
pub mod sdk;

// Helper modules
pub mod defaults;
pub mod import;
pub mod logging;
pub mod plan_modifier;

// Framework implementation modules
pub mod mux;
pub mod protocol;
pub mod server;
pub mod testing;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use logging::LogLevel;
pub use mux::MuxServer;
pub use protocol::ProviderService;
pub use provider::{Provider, ProviderMetadataRequest, ProviderMetadataResponse};
pub use resource::{Resource, ResourceWithConfigure};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use server::ProviderServer;
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue, Value};
