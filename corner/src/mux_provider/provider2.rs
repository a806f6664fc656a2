//! Schema-map half of the muxed provider

use crate::backend::Client;
use crate::sdk_provider::UserResource;
use crate::CornerProviderData;
use std::sync::Arc;
use tfplug::sdk::{self, ConfigureResult, ResourceData};

pub fn new(client: Client) -> sdk::Provider {
    sdk::Provider::new("tf6muxprovider")
        .version(env!("CARGO_PKG_VERSION"))
        .resource("tf6muxprovider_user2", UserResource)
        .configure_func(Box::new(move |_d: &ResourceData| -> ConfigureResult {
            Ok(Arc::new(CornerProviderData::new(client.clone())))
        }))
}
