//! Muxed provider `tf6muxprovider`
//!
//! Two independently built servers behind one endpoint: `provider1` is a
//! typed framework provider serving `tf6muxprovider_user1`, `provider2` a
//! schema-map provider serving `tf6muxprovider_user2`.

pub mod provider1;
pub mod provider2;

use crate::backend::Client;
use tfplug::context::Context;
use tfplug::{MuxServer, ProviderServer, ProviderService};

/// Both providers over the same backend, muxed
pub async fn server(client: Client) -> tfplug::Result<MuxServer> {
    let servers: Vec<Box<dyn ProviderService>> = vec![
        Box::new(ProviderServer::new(provider1::Provider1::new(client.clone()))),
        Box::new(ProviderServer::new(provider2::new(client))),
    ];

    MuxServer::new(Context::new(), servers).await
}
