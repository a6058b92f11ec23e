//! Buffer configuration types
//!
//! Field names serialize in camelCase so configuration files use the same
//! option names operators already know (`evictionOccupancyPercentage`, ...).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffer::traits::BufferOperationError;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Buffer sizing, eviction and maintenance properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferConfig {
    /// Occupancy fraction above which eviction runs (0.0-1.0)
    pub eviction_occupancy_percentage: f64,
    /// Size of one eviction fragment as a fraction of capacity (0.01-0.5)
    pub eviction_fragment_size_percentage: f64,
    /// Bytes added or removed, as a fraction of capacity, between indexing tree maintenance passes
    pub bytes_maintenance_percentage: f64,
    /// Threads cleaning the indexing tree
    pub indexing_tree_cleaning_threads: usize,
    /// Milliseconds the indexer waits for an element to be analyzed before retrying
    pub indexing_wait_time: u64,
    /// Expansion rate applied to small buffers
    pub max_object_expansion_rate: f64,
    /// Expansion rate applied to large buffers
    pub min_object_expansion_rate: f64,
    /// Buffer size in bytes up to which the max expansion rate applies
    pub max_object_expansion_rate_active_till_buffer_size: u64,
    /// Buffer size in bytes from which the min expansion rate applies
    pub min_object_expansion_rate_active_from_buffer_size: u64,
    /// Buffer/old-gen fraction up to which the min expansion rate applies
    pub min_object_expansion_rate_active_till_occupancy: f64,
    /// Buffer/old-gen fraction from which the max expansion rate applies
    pub max_object_expansion_rate_active_from_occupancy: f64,
    /// Old generation size in bytes up to which the min occupancy applies
    pub min_old_space_occupancy_active_till_old_gen_size: u64,
    /// Old generation size in bytes from which the max occupancy applies
    pub max_old_space_occupancy_active_from_old_gen_size: u64,
    /// Fraction of a small old generation the buffer may take
    pub min_old_space_occupancy: f64,
    /// Fraction of a large old generation the buffer may take
    pub max_old_space_occupancy: f64,
    /// Memory pool name fragments identifying the old generation
    pub old_gen_pool_names: Vec<String>,
    /// Startup flag prefix carrying the maximum heap size
    pub max_heap_flag_prefix: String,
    /// Startup flag prefix carrying the young generation size
    pub young_gen_flag_prefix: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            eviction_occupancy_percentage: 0.8,
            eviction_fragment_size_percentage: 0.1,
            bytes_maintenance_percentage: 0.05,
            indexing_tree_cleaning_threads: 1,
            indexing_wait_time: 50,
            max_object_expansion_rate: 0.35,
            min_object_expansion_rate: 0.1,
            max_object_expansion_rate_active_till_buffer_size: 50 * MIB,
            min_object_expansion_rate_active_from_buffer_size: GIB,
            min_object_expansion_rate_active_till_occupancy: 0.3,
            max_object_expansion_rate_active_from_occupancy: 0.75,
            min_old_space_occupancy_active_till_old_gen_size: 200 * MIB,
            max_old_space_occupancy_active_from_old_gen_size: 2 * GIB,
            min_old_space_occupancy: 0.25,
            max_old_space_occupancy: 0.45,
            old_gen_pool_names: vec!["Old Gen".to_string(), "Tenured".to_string()],
            max_heap_flag_prefix: "-Xmx".to_string(),
            young_gen_flag_prefix: "-Xmn".to_string(),
        }
    }
}

impl BufferConfig {
    /// Parse configuration from a JSON document, missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self, BufferOperationError> {
        serde_json::from_str(json).map_err(|e| BufferOperationError::ConfigParse(e.to_string()))
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BufferOperationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BufferOperationError::ConfigIo(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json_string(&self) -> Result<String, BufferOperationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BufferOperationError::ConfigParse(e.to_string()))
    }
}
