//! Store configuration and the context every store in a graph shares.

use crate::client::HttpRestClient;
use std::fmt;
use std::sync::Arc;

/// Default name of the identifier field in resource bodies.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Default name of the reserved field carrying link descriptors.
pub const DEFAULT_LINKS_FIELD: &str = "__links";

/// Knobs that shape how resource bodies are read and written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Field holding the entity identifier. Required by `patch` and `delete`, stripped by `post`.
    pub id_field: String,
    /// Reserved field holding `[{ rel, href }]` link descriptors.
    pub links_field: String,
    /// Capacity of each store's request channel.
    pub buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            links_field: DEFAULT_LINKS_FIELD.to_string(),
            buffer_size: 32,
        }
    }
}

impl StoreConfig {
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_links_field(mut self, field: impl Into<String>) -> Self {
        self.links_field = field.into();
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }
}

/// The dependencies injected into a store.
///
/// Child stores created by the resolver receive a clone of their parent's context, so one
/// client and one configuration serve the whole relation graph.
#[derive(Clone)]
pub struct StoreContext {
    pub client: Arc<dyn HttpRestClient>,
    pub config: Arc<StoreConfig>,
}

impl StoreContext {
    pub fn new(client: Arc<dyn HttpRestClient>) -> Self {
        Self::with_config(client, StoreConfig::default())
    }

    pub fn with_config(client: Arc<dyn HttpRestClient>, config: StoreConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = StoreConfig::default()
            .with_id_field("uuid")
            .with_links_field("_links")
            .with_buffer_size(0);
        assert_eq!(config.id_field, "uuid");
        assert_eq!(config.links_field, "_links");
        assert_eq!(config.buffer_size, 1);
    }
}
