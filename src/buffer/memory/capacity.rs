//! Adaptive buffer sizing and object size expansion policy
//!
//! Small hosts give the buffer a smaller share of the old generation, large
//! hosts a larger one, interpolating linearly in between. Estimated object
//! sizes are inflated by an expansion rate that shrinks as the buffer grows.

use log::info;

use super::heap_introspection::{HeapIntrospection, detect_old_gen_max};
use crate::buffer::chain::ChainLimits;
use crate::buffer::config::BufferConfig;
use crate::buffer::traits::BufferOperationError;

/// Linear interpolation of `value` between (`from`, `low`) and (`till`, `high`)
#[inline]
fn interpolate(value: f64, from: f64, till: f64, low: f64, high: f64) -> f64 {
    if till <= from {
        return low;
    }
    low + (high - low) * ((value - from) / (till - from))
}

#[derive(Debug, Clone)]
pub struct CapacityCalculator {
    config: BufferConfig,
    old_gen_max: u64,
}

impl CapacityCalculator {
    /// Detect the old generation through `introspection`
    ///
    /// Fails when no ceiling can be determined; the buffer cannot be sized.
    pub fn detect(
        config: &BufferConfig,
        introspection: &dyn HeapIntrospection,
    ) -> Result<Self, BufferOperationError> {
        let old_gen_max = detect_old_gen_max(introspection, config);
        if old_gen_max == 0 {
            return Err(BufferOperationError::HeapIntrospection(
                "Could not calculate the old generation heap space from memory pools or startup flags"
                    .to_string(),
            ));
        }
        Ok(Self::with_old_gen_max(config, old_gen_max))
    }

    /// Use a known old generation ceiling
    pub fn with_old_gen_max(config: &BufferConfig, old_gen_max: u64) -> Self {
        Self {
            config: config.clone(),
            old_gen_max,
        }
    }

    #[inline]
    pub fn old_gen_max(&self) -> u64 {
        self.old_gen_max
    }

    /// Buffer capacity in bytes for the detected old generation
    pub fn initial_buffer_size(&self) -> u64 {
        let config = &self.config;
        let h = self.old_gen_max;
        let floor = config.min_old_space_occupancy_active_till_old_gen_size;
        let ceiling = config.max_old_space_occupancy_active_from_old_gen_size;

        let occupancy = if h <= floor {
            config.min_old_space_occupancy
        } else if h >= ceiling {
            config.max_old_space_occupancy
        } else {
            interpolate(
                h as f64,
                floor as f64,
                ceiling as f64,
                config.min_old_space_occupancy,
                config.max_old_space_occupancy,
            )
        };
        (h as f64 * occupancy) as u64
    }

    /// Expansion rate keyed on absolute buffer size, decreasing with size
    pub fn expansion_rate_by_buffer_size(&self, buffer_size: u64) -> f64 {
        let config = &self.config;
        let till = config.max_object_expansion_rate_active_till_buffer_size;
        let from = config.min_object_expansion_rate_active_from_buffer_size;

        if buffer_size >= from {
            config.min_object_expansion_rate
        } else if buffer_size <= till {
            config.max_object_expansion_rate
        } else {
            interpolate(
                buffer_size as f64,
                till as f64,
                from as f64,
                config.max_object_expansion_rate,
                config.min_object_expansion_rate,
            )
        }
    }

    /// Expansion rate keyed on buffer size relative to the old generation,
    /// increasing with occupancy
    pub fn expansion_rate_by_occupancy(&self, buffer_size: u64) -> f64 {
        let config = &self.config;
        if self.old_gen_max == 0 {
            return config.max_object_expansion_rate;
        }
        let occupancy = buffer_size as f64 / self.old_gen_max as f64;
        let till = config.min_object_expansion_rate_active_till_occupancy;
        let from = config.max_object_expansion_rate_active_from_occupancy;

        if occupancy <= till {
            config.min_object_expansion_rate
        } else if occupancy >= from {
            config.max_object_expansion_rate
        } else {
            interpolate(
                occupancy,
                till,
                from,
                config.min_object_expansion_rate,
                config.max_object_expansion_rate,
            )
        }
    }

    /// Average of the size and occupancy keyed rates
    pub fn object_security_expansion_rate(&self, buffer_size: u64) -> f64 {
        (self.expansion_rate_by_buffer_size(buffer_size)
            + self.expansion_rate_by_occupancy(buffer_size))
            / 2.0
    }

    /// Bytes added or removed between two indexing tree maintenance passes
    pub fn maintenance_threshold_bytes(&self, capacity: u64) -> u64 {
        (capacity as f64 * self.config.bytes_maintenance_percentage) as u64
    }

    /// Occupancy above which eviction is due
    pub fn eviction_threshold_bytes(&self, capacity: u64) -> u64 {
        self.chain_limits(capacity).eviction_threshold_bytes
    }

    /// Bytes removed by one eviction pass
    pub fn eviction_fragment_bytes(&self, capacity: u64) -> u64 {
        self.chain_limits(capacity).fragment_size_bytes
    }

    pub fn chain_limits(&self, capacity: u64) -> ChainLimits {
        ChainLimits::from_fractions(
            capacity,
            self.config.eviction_occupancy_percentage,
            self.config.eviction_fragment_size_percentage,
        )
    }

    /// Log the derived sizing once at startup
    pub fn log_sizing(&self, capacity: u64) {
        info!("|-Buffer sizing:");
        info!("||-Old generation max: {} bytes", self.old_gen_max);
        info!("||-Buffer capacity: {} bytes", capacity);
        info!(
            "||-Eviction threshold: {} bytes",
            self.eviction_threshold_bytes(capacity)
        );
        info!(
            "||-Eviction fragment: {} bytes",
            self.eviction_fragment_bytes(capacity)
        );
        info!(
            "||-Indexing tree maintenance every {} bytes",
            self.maintenance_threshold_bytes(capacity)
        );
        info!(
            "||-Object security expansion rate: {:.2}%",
            self.object_security_expansion_rate(capacity) * 100.0
        );
    }
}
