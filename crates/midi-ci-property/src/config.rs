//! Property exchange configuration.

use midi_ci_core::Encoding;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Limits and defaults for property exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyExchangeConfig {
    /// Largest SysEx message, in bytes, the receiving device accepts.
    pub max_sysex_size: usize,
    /// Number of property exchange transactions allowed in flight at once.
    pub max_simultaneous_requests: u8,
    pub default_encoding: Encoding,
}

impl Default for PropertyExchangeConfig {
    fn default() -> Self {
        Self {
            max_sysex_size: Self::DEFAULT_MAX_SYSEX_SIZE,
            max_simultaneous_requests: 1,
            default_encoding: Encoding::Ascii,
        }
    }
}

impl PropertyExchangeConfig {
    pub const DEFAULT_MAX_SYSEX_SIZE: usize = 512;
    pub const MIN_SYSEX_SIZE: usize = 128;
    pub const MAX_SIMULTANEOUS_REQUESTS: u8 = 127;

    pub fn with_max_sysex_size(mut self, size: usize) -> Self {
        self.max_sysex_size = size;
        self
    }

    pub fn with_max_simultaneous_requests(mut self, count: u8) -> Self {
        self.max_simultaneous_requests = count;
        self
    }

    pub fn with_default_encoding(mut self, encoding: Encoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sysex_size < Self::MIN_SYSEX_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max_sysex_size {} below minimum of {} bytes",
                self.max_sysex_size,
                Self::MIN_SYSEX_SIZE
            )));
        }
        if !(1..=Self::MAX_SIMULTANEOUS_REQUESTS).contains(&self.max_simultaneous_requests) {
            return Err(Error::InvalidConfig(format!(
                "max_simultaneous_requests {} out of range (1-{})",
                self.max_simultaneous_requests,
                Self::MAX_SIMULTANEOUS_REQUESTS
            )));
        }
        Ok(())
    }
}
