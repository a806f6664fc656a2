//! Corner-case Terraform providers
//!
//! Small providers that exercise edge behaviors of tfplug against an
//! in-memory backend:
//!
//! - [`sdk_provider`]: `corner`, built with the schema-map SDK layer
//! - [`framework_provider`]: `framework`, built on the typed provider traits
//! - [`mux_provider`]: `tf6muxprovider`, one of each behind a mux server

pub mod backend;
pub mod framework_provider;
pub mod mux_provider;
pub mod provider_data;
pub mod sdk_provider;

pub use framework_provider::FrameworkProvider;
pub use provider_data::CornerProviderData;
