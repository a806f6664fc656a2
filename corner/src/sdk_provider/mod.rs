//! Schema-map provider `corner`

mod data_source_regions;
mod resource_user;

pub use data_source_regions::RegionsDataSource;
pub use resource_user::UserResource;

use crate::backend::Client;
use crate::CornerProviderData;
use std::sync::Arc;
use tfplug::sdk::{self, ConfigureResult, ResourceData};

/// The `corner` provider backed by `client`
pub fn new(client: Client) -> sdk::Provider {
    sdk::Provider::new("corner")
        .version(env!("CARGO_PKG_VERSION"))
        .resource("corner_user", UserResource)
        .data_source("corner_regions", RegionsDataSource)
        .configure_func(Box::new(move |_d: &ResourceData| -> ConfigureResult {
            Ok(Arc::new(CornerProviderData::new(client.clone())))
        }))
}
