//! Server configuration.

/// Default cap on top-level payload fields.
pub const DEFAULT_MAX_PAYLOAD_FIELDS: usize = 256;

/// Configuration for the quotation server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of top-level fields in a pushed payload.
    pub max_payload_fields: usize,
}

impl ServerConfig {
    /// Creates a configuration with the default limits.
    pub fn new() -> Self {
        Self {
            max_payload_fields: DEFAULT_MAX_PAYLOAD_FIELDS,
        }
    }

    /// Sets the maximum number of payload fields.
    pub fn with_max_payload_fields(mut self, max: usize) -> Self {
        self.max_payload_fields = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
