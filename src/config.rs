//! Validated configuration builders for channels and clock domains.
//!
//! Grounded in the teacher's `RingBufferConfig` builder (fallible setters that
//! return `Result`, validated all at once by a final `build()`) rather than a
//! serde-driven config file — this crate's config surface is small and
//! entirely in-process, so a typed builder is the idiomatic fit.

use crate::config_error;
use crate::constants::{MAX_CHANNEL_NAME_LEN, MAX_CLOCK_NAME_LEN};
use crate::error::Result;

/// Validated parameters for constructing a [`Channel`](crate::channel::Channel).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub(crate) message_size: usize,
    pub(crate) minimal_latency: u64,
    pub(crate) debug_name: String,
}

impl ChannelConfig {
    /// Start building a config for a channel carrying `message_size`-byte payloads.
    pub fn builder(message_size: usize, debug_name: impl Into<String>) -> ChannelConfigBuilder {
        ChannelConfigBuilder { message_size, minimal_latency: 1, debug_name: debug_name.into() }
    }
}

/// Builder for [`ChannelConfig`].
pub struct ChannelConfigBuilder {
    message_size: usize,
    minimal_latency: u64,
    debug_name: String,
}

impl ChannelConfigBuilder {
    /// Override the default minimal latency of 1 tick.
    pub fn with_minimal_latency(mut self, latency: u64) -> Self {
        self.minimal_latency = latency;
        self
    }

    /// Validate and produce the final [`ChannelConfig`].
    pub fn build(self) -> Result<ChannelConfig> {
        if self.minimal_latency == 0 {
            return Err(config_error!("minimal_latency must be > 0"));
        }
        if self.debug_name.len() > MAX_CHANNEL_NAME_LEN {
            return Err(config_error!(
                "channel debug name {:?} exceeds {} bytes",
                self.debug_name, MAX_CHANNEL_NAME_LEN
            ));
        }
        if self.message_size == 0 {
            return Err(config_error!("message_size must be > 0"));
        }
        Ok(ChannelConfig {
            message_size: self.message_size,
            minimal_latency: self.minimal_latency,
            debug_name: self.debug_name,
        })
    }
}

/// Validated parameters for constructing a [`ClockDomain`](crate::clock::ClockDomain).
#[derive(Debug, Clone)]
pub struct ClockConfig {
    pub(crate) initial_global_time: u64,
    pub(crate) multiplier_to_local: u64,
    pub(crate) multiplier_to_us: u64,
    pub(crate) multiplier_us_to_ticks: u64,
    pub(crate) add_global_to_local_ticks: i64,
    pub(crate) debug_name: String,
}

impl ClockConfig {
    /// Start building a config with the identity rate (`2^32`, i.e. 1:1) for
    /// every multiplier and no offset.
    pub fn builder(debug_name: impl Into<String>) -> ClockConfigBuilder {
        const IDENTITY: u64 = 1u64 << crate::constants::FIXED_POINT_DENOMINATOR_SHIFT;
        ClockConfigBuilder {
            initial_global_time: 0,
            multiplier_to_local: IDENTITY,
            multiplier_to_us: IDENTITY,
            multiplier_us_to_ticks: IDENTITY,
            add_global_to_local_ticks: 0,
            debug_name: debug_name.into(),
        }
    }
}

/// Builder for [`ClockConfig`].
pub struct ClockConfigBuilder {
    initial_global_time: u64,
    multiplier_to_local: u64,
    multiplier_to_us: u64,
    multiplier_us_to_ticks: u64,
    add_global_to_local_ticks: i64,
    debug_name: String,
}

impl ClockConfigBuilder {
    pub fn with_initial_global_time(mut self, t: u64) -> Self {
        self.initial_global_time = t;
        self
    }

    pub fn with_multiplier_to_local(mut self, m: u64) -> Self {
        self.multiplier_to_local = m;
        self
    }

    pub fn with_multiplier_to_us(mut self, m: u64) -> Self {
        self.multiplier_to_us = m;
        self
    }

    pub fn with_multiplier_us_to_ticks(mut self, m: u64) -> Self {
        self.multiplier_us_to_ticks = m;
        self
    }

    pub fn with_add_global_to_local_ticks(mut self, offset: i64) -> Self {
        self.add_global_to_local_ticks = offset;
        self
    }

    /// Validate and produce the final [`ClockConfig`].
    pub fn build(self) -> Result<ClockConfig> {
        if self.debug_name.len() > MAX_CLOCK_NAME_LEN {
            return Err(config_error!(
                "clock debug name {:?} exceeds {} bytes",
                self.debug_name, MAX_CLOCK_NAME_LEN
            ));
        }
        if self.multiplier_to_local == 0 || self.multiplier_to_us == 0 || self.multiplier_us_to_ticks == 0 {
            return Err(config_error!("rate multipliers must be non-zero"));
        }
        Ok(ClockConfig {
            initial_global_time: self.initial_global_time,
            multiplier_to_local: self.multiplier_to_local,
            multiplier_to_us: self.multiplier_to_us,
            multiplier_us_to_ticks: self.multiplier_us_to_ticks,
            add_global_to_local_ticks: self.add_global_to_local_ticks,
            debug_name: self.debug_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn channel_config_rejects_zero_latency() {
        let err = ChannelConfig::builder(8, "ch").with_minimal_latency(0).build().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { .. }));
    }

    #[test]
    fn channel_config_accepts_defaults() {
        let cfg = ChannelConfig::builder(8, "ch").build().unwrap();
        assert_eq!(cfg.minimal_latency, 1);
        assert_eq!(cfg.message_size, 8);
    }

    #[test]
    fn clock_config_rejects_long_name() {
        let name = "x".repeat(MAX_CLOCK_NAME_LEN + 1);
        let err = ClockConfig::builder(name).build().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { .. }));
    }

    #[test]
    fn clock_config_rejects_zero_multiplier() {
        let err = ClockConfig::builder("c").with_multiplier_to_local(0).build().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { .. }));
    }

    #[test]
    fn clock_config_accepts_identity_defaults() {
        let cfg = ClockConfig::builder("c").build().unwrap();
        assert_eq!(cfg.initial_global_time, 0);
        assert_eq!(cfg.add_global_to_local_ticks, 0);
    }
}
