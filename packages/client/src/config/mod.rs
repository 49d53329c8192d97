//! Pool configuration
//!
//! Sizing and behavior knobs for the request pool, validated up front.

use std::time::Duration;

/// Runtime configuration for a request pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum simultaneous in-flight requests. The pool never grows past
    /// this.
    pub capacity: usize,
    /// Initial size of a request's response buffer when the submission does
    /// not pick one.
    pub read_buffer_size: usize,
    /// Recompute per-transfer throughput/ETA metrics on every tick.
    pub metrics: bool,
    /// Optional delay appended to every tick, for callers that poll in a
    /// tight loop and want to be polite.
    pub tick_delay: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 128,              // simultaneous requests
            read_buffer_size: 16_384,   // 16KB
            metrics: false,
            tick_delay: None,
        }
    }
}

impl PoolConfig {
    /// Configuration for hosts juggling many concurrent transfers.
    #[must_use]
    pub fn high_throughput() -> Self {
        Self {
            capacity: 512,
            read_buffer_size: 65_536,   // 64KB
            metrics: true,
            tick_delay: None,
        }
    }

    /// Configuration for memory-constrained embeddings.
    #[must_use]
    pub fn low_memory() -> Self {
        Self {
            capacity: 32,
            read_buffer_size: 4096,     // 4KB
            metrics: false,
            tick_delay: None,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `capacity` is 0 or exceeds 65536
    /// - `read_buffer_size` is 0
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".to_string());
        }

        if self.capacity > 65_536 {
            return Err("capacity must not exceed 65536".to_string());
        }

        if self.read_buffer_size == 0 {
            return Err("read_buffer_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, 128);
        assert_eq!(config.read_buffer_size, 16_384);
        assert!(!config.metrics);
    }

    #[test]
    fn presets_are_valid() {
        assert!(PoolConfig::high_throughput().validate().is_ok());
        assert!(PoolConfig::low_memory().validate().is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = PoolConfig {
            capacity: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_buffer_size_rejected() {
        let config = PoolConfig {
            read_buffer_size: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
