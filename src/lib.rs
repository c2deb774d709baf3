pub mod client;
pub mod config;
pub mod feed;
pub mod registry;
pub mod rest;

use std::sync::Arc;

use config::HubConfig;
use feed::event::EventBroadcaster;
use registry::TaskRegistry;

/// Shared application state passed to every request handler and server loop.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<HubConfig>,
    pub registry: Arc<TaskRegistry>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub started_at: std::time::Instant,
}
