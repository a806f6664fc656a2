use crate::CornerProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::sdk::{DataSource, Meta, ResourceData, Schema, ValueType};
use tfplug::types::Diagnostic;

/// Names of every region the backend knows about
pub struct RegionsDataSource;

#[async_trait]
impl DataSource for RegionsDataSource {
    fn schema(&self) -> HashMap<String, Schema> {
        HashMap::from([(
            "names".to_string(),
            Schema::list_of(ValueType::TypeString).computed(),
        )])
    }

    async fn read(&self, _ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
        let Some(provider_data) = meta.downcast_ref::<CornerProviderData>() else {
            return vec![Diagnostic::error(
                "Unconfigured client",
                "The provider has not been configured, so no backend client is available",
            )];
        };

        let regions = match provider_data.client.read_regions().await {
            Ok(regions) => regions,
            Err(e) => return vec![Diagnostic::error("Error reading regions", e.to_string())],
        };
        let names: Vec<String> = regions.into_iter().map(|r| r.name).collect();

        d.set_id("regions");
        match d.set("names", names) {
            Ok(()) => vec![],
            Err(e) => vec![Diagnostic::error("Error setting region names", e.to_string())],
        }
    }
}
