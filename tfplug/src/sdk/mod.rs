//! Schema-map SDK layer
//!
//! Resources declare a map of attribute name to [`Schema`] and implement CRUD
//! functions against a [`ResourceData`]. [`Provider`] adapts such resources to
//! the typed [`crate::provider::Provider`] trait, so both styles are served
//! by the same [`crate::server::ProviderServer`].

pub mod provider;
pub mod resource_data;
pub mod schema;

pub use provider::Provider;
pub use resource_data::ResourceData;
pub use schema::{Schema, ValueType};

use crate::context::Context;
use crate::types::Diagnostic;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque value produced by the provider's configure function and handed to
/// every CRUD call
#[derive(Clone, Default)]
pub struct Meta(Option<Arc<dyn Any + Send + Sync>>);

impl Meta {
    pub fn new(data: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        Self(data)
    }

    /// None before configuration or when the meta holds another type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref::<T>()
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

impl std::fmt::Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Meta")
            .field(&self.0.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Meta produced by a configure function, or why it could not be built
pub type ConfigureResult = std::result::Result<Arc<dyn Any + Send + Sync>, Vec<Diagnostic>>;

/// Builds the meta from the provider block's configuration
pub type ConfigureFunc = Box<dyn Fn(&ResourceData) -> ConfigureResult + Send + Sync>;

/// How `terraform import` turns an ID into state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importer {
    /// The ID becomes the resource id; read fills in the rest
    Passthrough,
}

#[async_trait]
pub trait Resource: Send + Sync {
    fn schema(&self) -> HashMap<String, Schema>;

    fn description(&self) -> &str {
        ""
    }

    fn importer(&self) -> Option<Importer> {
        None
    }

    async fn create(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic>;

    /// Clearing the id removes the resource from state
    async fn read(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic>;

    async fn update(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic>;

    async fn delete(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic>;
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn schema(&self) -> HashMap<String, Schema>;

    fn description(&self) -> &str {
        ""
    }

    async fn read(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_downcasts_to_stored_type() {
        let meta = Meta::new(Some(Arc::new("client".to_string())));

        assert!(meta.is_configured());
        assert_eq!(meta.downcast_ref::<String>().map(String::as_str), Some("client"));
        assert!(meta.downcast_ref::<u32>().is_none());
        assert!(Meta::default().downcast_ref::<String>().is_none());
    }
}
