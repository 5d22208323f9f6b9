use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaypostError};

/// Registry engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Seconds an entry stays live without a heartbeat.
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_secs: u64,
}

impl RegistryConfig {
    /// Lease timeout as a duration.
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    /// Reject settings that would expire every entry immediately.
    pub fn validate(&self) -> Result<()> {
        if self.lease_timeout_secs == 0 {
            return Err(WaypostError::Config(
                "registry.lease_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Heartbeat interval a well-behaved client should use for this lease:
    /// two-thirds of the timeout.
    pub fn suggested_heartbeat_interval(&self) -> Duration {
        self.lease_timeout() * 2 / 3
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lease_timeout_secs: default_lease_timeout(),
        }
    }
}

fn default_lease_timeout() -> u64 {
    30
}
