//! Server configuration.
//!
//! All knobs deserialize with per-field defaults, so a partial config file
//! (or none at all) yields a working server. `validate()` catches values
//! that would deadlock or starve a loop before anything is bound.

use serde::{Deserialize, Serialize};

use spool_codec::pool::{
    init_default_pools, PoolsAlreadyInitialized, DEFAULT_POOL_RETAINED, DEFAULT_SCRATCH_CAPACITY,
};
use spool_codec::ring::DEFAULT_RING_CAPACITY;

/// Buffer and pool sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Capacity of a freshly acquired per-read scratch buffer.
    ///
    /// Reads larger than this still work; the scratch grows and oversize
    /// buffers are dropped instead of pooled on release.
    #[serde(default = "default_scratch_capacity")]
    pub scratch_capacity: usize,

    /// Capacity of a connection's inbound ring buffer.
    ///
    /// Sized for the largest partial frame expected to survive a decode
    /// drain; the ring grows on demand past this.
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    /// Maximum buffers each pool keeps parked for reuse.
    #[serde(default = "default_pool_retained")]
    pub pool_retained: usize,
}

fn default_scratch_capacity() -> usize {
    DEFAULT_SCRATCH_CAPACITY
}

fn default_ring_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}

fn default_pool_retained() -> usize {
    DEFAULT_POOL_RETAINED
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            scratch_capacity: default_scratch_capacity(),
            ring_capacity: default_ring_capacity(),
            pool_retained: default_pool_retained(),
        }
    }
}

impl BufferConfig {
    /// Size the process-wide buffer pools from this config.
    ///
    /// Must run before the first connection is attached; once any buffer
    /// has been acquired the defaults are locked in.
    pub fn apply(&self) -> Result<(), PoolsAlreadyInitialized> {
        init_default_pools(self.scratch_capacity, self.ring_capacity, self.pool_retained)
    }
}

/// Event-loop tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoopConfig {
    /// Number of event loops the server runs. Defaults to the CPU count.
    #[serde(default = "default_loops")]
    pub loops: usize,

    /// Commands drained from a loop's in-queue per iteration.
    ///
    /// Bounds how long posted writes can delay reads; larger batches favor
    /// write throughput, smaller ones favor read latency.
    #[serde(default = "default_command_batch")]
    pub command_batch: usize,
}

fn default_loops() -> usize {
    num_cpus::get().max(1)
}

fn default_command_batch() -> usize {
    128
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            loops: default_loops(),
            command_batch: default_command_batch(),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpoolConfig {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub event_loop: LoopConfig,
}

impl SpoolConfig {
    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_loop.loops == 0 {
            return Err("event_loop.loops must be at least 1".to_string());
        }
        if self.event_loop.command_batch == 0 {
            return Err("event_loop.command_batch must be at least 1".to_string());
        }
        if self.buffer.scratch_capacity < 64 {
            return Err("buffer.scratch_capacity must be at least 64".to_string());
        }
        if self.buffer.ring_capacity < 64 {
            return Err("buffer.ring_capacity must be at least 64".to_string());
        }

        if self.buffer.pool_retained > 100_000 {
            tracing::warn!(
                retained = self.buffer.pool_retained,
                "buffer.pool_retained is very large, may pin excessive memory"
            );
        }
        if self.event_loop.command_batch > 100_000 {
            tracing::warn!(
                batch = self.event_loop.command_batch,
                "event_loop.command_batch is very large, reads may starve"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SpoolConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.event_loop.loops >= 1);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = SpoolConfig {
            event_loop: LoopConfig {
                command_batch: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_tiny_buffers() {
        let config = SpoolConfig {
            buffer: BufferConfig {
                scratch_capacity: 16,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: SpoolConfig =
            serde_json::from_str(r#"{"buffer": {"ring_capacity": 2048}}"#).unwrap();
        assert_eq!(config.buffer.ring_capacity, 2048);
        assert_eq!(config.buffer.scratch_capacity, DEFAULT_SCRATCH_CAPACITY);
        assert_eq!(config.event_loop.command_batch, 128);
    }
}
