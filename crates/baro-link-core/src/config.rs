//! Node configuration

use alloc::vec::Vec;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::frame::DeviceId;

/// Longest advertised name that still fits the scan response
pub const MAX_DEVICE_NAME_LEN: usize = 16;

/// Rejected by [`NodeConfig::validate`] or the postcard codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("device name longer than 16 bytes")]
    NameTooLong,
    #[error("{0} period must be non-zero")]
    ZeroPeriod(&'static str),
    #[error("time sync needs at least one attempt")]
    ZeroRetries,
    #[error("config encoding failed")]
    Encoding,
}

/// Sample and reference clock rates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Time between sample work items
    pub period_ms: u32,
    /// Reference clock resolution; one tick advances it by 1 ms
    pub tick_period_ms: u32,
}

impl SamplingConfig {
    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms as u64)
    }

    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms as u64)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            tick_period_ms: 1,
        }
    }
}

/// Current Time client limits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Failed discovery/read attempts before giving up on a connection
    pub max_retries: u8,
    /// Upper bound on a single discovery or read request
    pub request_timeout_ms: u32,
}

impl SyncConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms as u64)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            request_timeout_ms: 2000,
        }
    }
}

/// Everything a node needs at boot. Stored postcard-encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub device_id: DeviceId,
    pub device_name: heapless::String<MAX_DEVICE_NAME_LEN>,
    pub sampling: SamplingConfig,
    pub sync: SyncConfig,
}

impl NodeConfig {
    /// Config for `device_id` with the advertised name `DEV00<id>`.
    pub fn for_device(device_id: DeviceId) -> Self {
        let mut device_name = heapless::String::new();
        for c in ['D', 'E', 'V', '0', '0', char::from(b'0' + device_id.get())] {
            // Six characters always fit
            let _ = device_name.push(c);
        }

        Self {
            device_id,
            device_name,
            sampling: SamplingConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    /// Replace the advertised name.
    pub fn with_device_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.device_name.clear();
        self.device_name
            .push_str(name)
            .map_err(|_| ConfigError::NameTooLong)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("sample"));
        }
        if self.sampling.tick_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("tick"));
        }
        if self.sync.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Encoding)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Encoding)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::for_device(DeviceId::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = NodeConfig::default();
        assert_eq!(config.device_id.get(), 3);
        assert_eq!(config.device_name.as_str(), "DEV003");
        assert_eq!(config.sampling.period_ms, 20);
        assert_eq!(config.sampling.tick_period_ms, 1);
        assert_eq!(config.sync.max_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = NodeConfig::default();
        config.sampling.period_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod("sample")));

        let mut config = NodeConfig::default();
        config.sync.max_retries = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroRetries));
    }

    #[test]
    fn test_postcard_blob_restores_config() {
        let config = NodeConfig::for_device(DeviceId::new(1).unwrap())
            .with_device_name("BARO-ROOF")
            .unwrap();
        let bytes = config.to_bytes().unwrap();

        assert_eq!(NodeConfig::from_bytes(&bytes), Ok(config));
    }

    #[test]
    fn test_blob_with_bad_device_id_is_rejected() {
        let mut bytes = NodeConfig::default().to_bytes().unwrap();
        // device_id is the first field, encoded as one byte
        bytes[0] = 12;
        assert_eq!(NodeConfig::from_bytes(&bytes), Err(ConfigError::Encoding));
    }

    #[test]
    fn test_long_name_is_rejected() {
        assert_eq!(
            NodeConfig::default().with_device_name("a-very-long-device-name"),
            Err(ConfigError::NameTooLong)
        );
    }
}
