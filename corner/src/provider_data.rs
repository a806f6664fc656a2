//! Provider data handed to resources and data sources at configure time

use crate::backend::Client;

#[derive(Clone)]
pub struct CornerProviderData {
    pub client: Client,
}

impl CornerProviderData {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}
