//! Provider data shared with every resource

use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct CosmicProviderData {
    pub client: Arc<Client>,
}

impl CosmicProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}
