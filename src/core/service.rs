//! Service record shared by host and client.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constants::{DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_UUID};

/// The rendezvous point both roles agree on: the host advertises it, the
/// client dials it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceRecord {
    /// Human readable service name.
    pub name: String,
    /// Service identifier.
    pub uuid: Uuid,
}

impl ServiceRecord {
    /// Create a service record.
    pub fn new(name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            uuid,
        }
    }
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_UUID)
    }
}
