//! Link configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::constants::DEFAULT_READ_BUFFER_SIZE;
use crate::core::{LinkError, LinkResult, ServiceRecord};

/// Link configuration.
///
/// Loadable from TOML; every field is optional:
///
/// ```toml
/// read_buffer_size = 1024
/// auto_relisten = true
///
/// [service]
/// name = "BluetoothSecure"
/// uuid = "df6b743c-1959-4442-9c8a-3b9204dc164b"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Rendezvous point advertised by the host and dialed by the client.
    pub service: ServiceRecord,

    /// Size of the buffer handed to each transport read.
    pub read_buffer_size: usize,

    /// Listen again after a hosted connection is lost.
    pub auto_relisten: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service: ServiceRecord::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            auto_relisten: true,
        }
    }
}

impl LinkConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> LinkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| LinkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> LinkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges.
    pub fn validate(&self) -> LinkResult<()> {
        if self.read_buffer_size == 0 {
            return Err(LinkError::Config("read_buffer_size must be positive".into()));
        }
        if self.service.name.is_empty() {
            return Err(LinkError::Config("service name must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`LinkConfig`].
#[derive(Debug)]
pub struct LinkConfigBuilder {
    config: LinkConfig,
}

impl LinkConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self {
            config: LinkConfig::default(),
        }
    }

    /// Set the service name.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service.name = name.into();
        self
    }

    /// Set the service identifier.
    pub fn service_uuid(mut self, uuid: Uuid) -> Self {
        self.config.service.uuid = uuid;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Enable or disable listening again after a hosted connection is lost.
    pub fn auto_relisten(mut self, enabled: bool) -> Self {
        self.config.auto_relisten = enabled;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LinkResult<LinkConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for LinkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_UUID};

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.service.name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.service.uuid, DEFAULT_SERVICE_UUID);
        assert_eq!(config.read_buffer_size, 1024);
        assert!(config.auto_relisten);
    }

    #[test]
    fn test_builder() {
        let uuid = Uuid::from_u128(42);
        let config = LinkConfigBuilder::new()
            .service_name("chat")
            .service_uuid(uuid)
            .read_buffer_size(4096)
            .auto_relisten(false)
            .build()
            .unwrap();

        assert_eq!(config.service, ServiceRecord::new("chat", uuid));
        assert_eq!(config.read_buffer_size, 4096);
        assert!(!config.auto_relisten);
    }

    #[test]
    fn test_builder_rejects_zero_buffer() {
        let err = LinkConfigBuilder::new().read_buffer_size(0).build().unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn test_from_toml() {
        let config = LinkConfig::from_toml_str(
            r#"
            auto_relisten = false

            [service]
            name = "chat"
            uuid = "00000000-0000-0000-0000-00000000002a"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "chat");
        assert_eq!(config.service.uuid, Uuid::from_u128(42));
        assert_eq!(config.read_buffer_size, 1024);
        assert!(!config.auto_relisten);
    }

    #[test]
    fn test_partial_service_section() {
        let config = LinkConfig::from_toml_str("[service]\nname = \"chat\"\n").unwrap();
        assert_eq!(config.service.uuid, DEFAULT_SERVICE_UUID);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = LinkConfig::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LinkConfig::load("/nonexistent/rfcomm-link.toml").unwrap_err();
        assert!(matches!(err, LinkError::Io(_)));
    }
}
