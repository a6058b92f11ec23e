//! Eager range and ordering checks for buffer properties
//!
//! Every violation is an operator misconfiguration and aborts startup.

use log::info;

use super::types::BufferConfig;
use crate::buffer::traits::BufferOperationError;

#[inline]
fn within(value: f64, low: f64, high: f64) -> bool {
    (low..=high).contains(&value)
}

#[inline]
fn positive_fraction(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

impl BufferConfig {
    /// Validate all properties, returning the first violation found
    pub fn validate(&self) -> Result<(), BufferOperationError> {
        // eviction
        if !within(self.eviction_occupancy_percentage, 0.0, 1.0) {
            return Err(BufferOperationError::invalid_configuration(format!(
                "Eviction occupancy must be a percentage value between 0 and 1. Initialization value is: {}",
                self.eviction_occupancy_percentage
            )));
        }
        if !within(self.eviction_fragment_size_percentage, 0.01, 0.5) {
            return Err(BufferOperationError::invalid_configuration(format!(
                "Eviction fragment size must be a percentage value between 0.01 and 0.5. Initialization value is: {}",
                self.eviction_fragment_size_percentage
            )));
        }

        // expansion rate
        if !within(self.min_object_expansion_rate, 0.0, f64::MAX)
            || !within(self.max_object_expansion_rate, 0.0, f64::MAX)
        {
            return Err(BufferOperationError::invalid_configuration(format!(
                "Object expansion rates can not be negative. Initialization values are: {} (min) and {} (max)",
                self.min_object_expansion_rate, self.max_object_expansion_rate
            )));
        }
        if self.min_object_expansion_rate > self.max_object_expansion_rate {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The min object expansion rate can not be higher than the max object expansion rate. Initialization values are: {} (min) and {} (max)",
                self.min_object_expansion_rate, self.max_object_expansion_rate
            )));
        }
        if self.min_object_expansion_rate_active_from_buffer_size
            < self.max_object_expansion_rate_active_till_buffer_size
        {
            return Err(BufferOperationError::invalid_configuration(format!(
                "Buffer size from which minimum object expansion rate is active can not be lower than buffer size till which maximum object expansion rate is active. Initialization values are: {} (buffer size for min object expansion rate) and {} (buffer size for max object expansion rate)",
                self.min_object_expansion_rate_active_from_buffer_size,
                self.max_object_expansion_rate_active_till_buffer_size
            )));
        }
        if self.min_object_expansion_rate_active_till_occupancy
            > self.max_object_expansion_rate_active_from_occupancy
        {
            return Err(BufferOperationError::invalid_configuration(format!(
                "Buffer occupancy till which minimum object expansion rate is active can not be higher than buffer occupancy from which maximum object expansion rate is active. Initialization values are: {} (buffer occupancy for min object expansion rate) and {} (buffer occupancy for max object expansion rate)",
                self.min_object_expansion_rate_active_till_occupancy,
                self.max_object_expansion_rate_active_from_occupancy
            )));
        }
        if !positive_fraction(self.min_object_expansion_rate_active_till_occupancy) {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The min object expansion rate till buffer old space gen occupancy can not be less or equal than zero, nor greater than one. Initialization value is: {}",
                self.min_object_expansion_rate_active_till_occupancy
            )));
        }
        if !positive_fraction(self.max_object_expansion_rate_active_from_occupancy) {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The max object expansion rate from buffer old space gen occupancy can not be less or equal than zero, nor greater than one. Initialization value is: {}",
                self.max_object_expansion_rate_active_from_occupancy
            )));
        }

        // indexing tree
        if self.bytes_maintenance_percentage <= 0.0
            || self.bytes_maintenance_percentage > self.eviction_occupancy_percentage
            || self.bytes_maintenance_percentage.is_nan()
        {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The buffer bytes maintenance percentage that activates the clean and update of the indexing tree can not be less or equal than zero nor bigger than eviction occupancy percentage. Initialization value is: {}",
                self.bytes_maintenance_percentage
            )));
        }
        if self.indexing_tree_cleaning_threads == 0 {
            return Err(BufferOperationError::invalid_configuration(
                "The number of indexing tree cleaning threads can not be less or equal than zero. Initialization value is: 0",
            ));
        }
        if self.indexing_wait_time == 0 {
            return Err(BufferOperationError::invalid_configuration(
                "The indexing wait time can not be less or equal than zero. Initialization value is: 0",
            ));
        }

        // old space settings
        if self.min_old_space_occupancy_active_till_old_gen_size == 0 {
            return Err(BufferOperationError::invalid_configuration(
                "The old generation size till which the min buffer occupancy percentage is active can not be zero",
            ));
        }
        if self.max_old_space_occupancy_active_from_old_gen_size == 0 {
            return Err(BufferOperationError::invalid_configuration(
                "The old generation size from which the max buffer occupancy percentage is active can not be zero",
            ));
        }
        if self.min_old_space_occupancy_active_till_old_gen_size
            > self.max_old_space_occupancy_active_from_old_gen_size
        {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The old generation size till which the min occupancy is active can not be higher than the size from which the max occupancy is active. Initialization values are: {} (min) and {} (max)",
                self.min_old_space_occupancy_active_till_old_gen_size,
                self.max_old_space_occupancy_active_from_old_gen_size
            )));
        }
        if self.min_old_space_occupancy > self.max_old_space_occupancy {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The min buffer occupancy percentage of the old generation heap space can not be higher than max buffer occupancy percentage of the old generation. Initialization values are: {} (min), {} (max)",
                self.min_old_space_occupancy, self.max_old_space_occupancy
            )));
        }
        if !positive_fraction(self.min_old_space_occupancy) {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The min buffer occupancy percentage of the old generation heap space can not be less or equal than zero, nor greater than one. Initialization value is: {}",
                self.min_old_space_occupancy
            )));
        }
        if !positive_fraction(self.max_old_space_occupancy) {
            return Err(BufferOperationError::invalid_configuration(format!(
                "The max buffer occupancy percentage of the old generation heap space can not be less or equal than zero, nor greater than one. Initialization value is: {}",
                self.max_old_space_occupancy
            )));
        }

        // heap detection
        if self.max_heap_flag_prefix.is_empty() || self.young_gen_flag_prefix.is_empty() {
            return Err(BufferOperationError::invalid_configuration(
                "Heap and young generation flag prefixes can not be empty",
            ));
        }

        Ok(())
    }

    /// Log the effective properties at startup
    pub fn log_properties(&self) {
        info!("|-Buffer properties initialized with following values:");
        info!(
            "||-Eviction occupancy percentage: {:.1}%",
            self.eviction_occupancy_percentage * 100.0
        );
        info!(
            "||-Eviction fragment size percentage: {:.1}%",
            self.eviction_fragment_size_percentage * 100.0
        );
        info!(
            "||-Indexing tree cleaning threads: {}",
            self.indexing_tree_cleaning_threads
        );
        info!("||-Indexing waiting time: {} ms", self.indexing_wait_time);
        info!(
            "||-Min old generation occupancy percentage active till: {} bytes",
            self.min_old_space_occupancy_active_till_old_gen_size
        );
        info!(
            "||-Max old generation occupancy percentage active from: {} bytes",
            self.max_old_space_occupancy_active_from_old_gen_size
        );
        info!(
            "||-Min old generation occupancy percentage: {:.1}%",
            self.min_old_space_occupancy * 100.0
        );
        info!(
            "||-Max old generation occupancy percentage: {:.1}%",
            self.max_old_space_occupancy * 100.0
        );
        info!(
            "||-Max object size expansion: {:.1}%",
            self.max_object_expansion_rate * 100.0
        );
        info!(
            "||-Min object size expansion: {:.1}%",
            self.min_object_expansion_rate * 100.0
        );
        info!(
            "||-Max object size expansion active from buffer occupancy: {:.1}%",
            self.max_object_expansion_rate_active_from_occupancy * 100.0
        );
        info!(
            "||-Min object size expansion active till buffer occupancy: {:.1}%",
            self.min_object_expansion_rate_active_till_occupancy * 100.0
        );
        info!(
            "||-Max object size expansion active till buffer size: {} bytes",
            self.max_object_expansion_rate_active_till_buffer_size
        );
        info!(
            "||-Min object size expansion active from buffer size: {} bytes",
            self.min_object_expansion_rate_active_from_buffer_size
        );
    }
}
