pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use hub::{EventHub, HubHandle};
use store::kv::KeyValueStore;
use store::Store;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub kv: Arc<dyn KeyValueStore>,
    pub config: Arc<Config>,
    pub hub: HubHandle,
}

impl AppState {
    /// State with an empty hub handle. Emits are dropped until
    /// [`AppState::install_hub`] runs.
    pub fn new(store: Arc<dyn Store>, kv: Arc<dyn KeyValueStore>, config: Config) -> Self {
        Self {
            store,
            kv,
            config: Arc::new(config),
            hub: HubHandle::new(),
        }
    }

    /// Build the process hub over this state's store and install it.
    pub fn install_hub(&self) -> Arc<EventHub> {
        let hub = Arc::new(EventHub::new(self.store.clone(), self.config.outbound_queue));
        if !self.hub.install(hub.clone()) {
            tracing::warn!("event hub already installed, keeping the existing one");
            if let Some(existing) = self.hub.get() {
                return existing;
            }
        }
        hub
    }
}
