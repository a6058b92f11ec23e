//! Old generation ceiling detection
//!
//! The buffer is sized against the host's long-lived memory region. Memory
//! pools are consulted first; when none matches the configured names, the
//! maximum heap and young generation startup flags are parsed and the old
//! generation is their difference.

use std::fs;

use log::{debug, info, warn};

use crate::buffer::config::BufferConfig;

const PROC_MEMINFO: &str = "/proc/meminfo";
const CGROUP_V2_MEMORY_MAX: &str = "/sys/fs/cgroup/memory.max";
const CGROUP_V1_MEMORY_LIMIT: &str = "/sys/fs/cgroup/memory/memory.limit_in_bytes";

/// cgroup v1 reports "unlimited" as a page-aligned value close to i64::MAX
const CGROUP_UNLIMITED_FLOOR: u64 = 1 << 62;

/// One named memory region reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPool {
    pub name: String,
    /// Maximum size in bytes, 0 when undefined
    pub max_bytes: u64,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, max_bytes: u64) -> Self {
        Self {
            name: name.into(),
            max_bytes,
        }
    }
}

/// Read-only view of host memory telemetry
pub trait HeapIntrospection: Send + Sync {
    /// Memory pools with their maximum sizes
    fn memory_pools(&self) -> Vec<MemoryPool>;

    /// Startup arguments of the host process
    fn startup_arguments(&self) -> Vec<String>;
}

/// Host telemetry of the running process
///
/// Reports a single "Old Gen" pool capped at the smaller of physical memory
/// and the cgroup memory limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessHeapIntrospection;

impl ProcessHeapIntrospection {
    fn physical_memory() -> Option<u64> {
        fs::read_to_string(PROC_MEMINFO)
            .ok()
            .and_then(|contents| parse_meminfo_total(&contents))
    }

    fn container_limit() -> Option<u64> {
        [CGROUP_V2_MEMORY_MAX, CGROUP_V1_MEMORY_LIMIT]
            .iter()
            .find_map(|path| fs::read_to_string(path).ok())
            .and_then(|contents| parse_cgroup_limit(&contents))
    }
}

impl HeapIntrospection for ProcessHeapIntrospection {
    fn memory_pools(&self) -> Vec<MemoryPool> {
        let ceiling = match (Self::physical_memory(), Self::container_limit()) {
            (Some(physical), Some(limit)) => Some(physical.min(limit)),
            (physical, limit) => physical.or(limit),
        };
        ceiling
            .map(|bytes| vec![MemoryPool::new("Old Gen", bytes)])
            .unwrap_or_default()
    }

    fn startup_arguments(&self) -> Vec<String> {
        std::env::args().skip(1).collect()
    }
}

/// Fixed telemetry, for tests and for embedders that size the buffer themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticHeapIntrospection {
    pools: Vec<MemoryPool>,
    arguments: Vec<String>,
}

impl StaticHeapIntrospection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, name: impl Into<String>, max_bytes: u64) -> Self {
        self.pools.push(MemoryPool::new(name, max_bytes));
        self
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Shorthand for a single old generation pool of `bytes`
    pub fn old_gen(bytes: u64) -> Self {
        Self::new().with_pool("Old Gen", bytes)
    }
}

impl HeapIntrospection for StaticHeapIntrospection {
    fn memory_pools(&self) -> Vec<MemoryPool> {
        self.pools.clone()
    }

    fn startup_arguments(&self) -> Vec<String> {
        self.arguments.clone()
    }
}

/// Detect the old generation ceiling in bytes, 0 when undeterminable
pub fn detect_old_gen_max(introspection: &dyn HeapIntrospection, config: &BufferConfig) -> u64 {
    let pools = introspection.memory_pools();
    if let Some(pool) = pools.iter().find(|pool| {
        config
            .old_gen_pool_names
            .iter()
            .any(|name| pool.name.contains(name.as_str()))
    }) {
        if pool.max_bytes > 0 {
            info!("|-Old generation detected from pool '{}': {} bytes", pool.name, pool.max_bytes);
            return pool.max_bytes;
        }
        debug!("Pool '{}' reports no maximum", pool.name);
    }

    let mut max_heap = 0;
    let mut young_gen = 0;
    for argument in introspection.startup_arguments() {
        if let Some(bytes) = parse_memory_flag(&argument, &config.max_heap_flag_prefix) {
            max_heap = bytes;
        }
        if let Some(bytes) = parse_memory_flag(&argument, &config.young_gen_flag_prefix) {
            young_gen = bytes;
        }
    }

    if max_heap != 0 && young_gen != 0 && max_heap > young_gen {
        let old_gen = max_heap - young_gen;
        info!(
            "|-Old generation derived from startup flags: {} - {} = {} bytes",
            max_heap, young_gen, old_gen
        );
        return old_gen;
    }

    warn!("Could not determine the old generation size from memory pools or startup flags");
    0
}

/// Parse `<prefix><number>[k|m|g]`, prefix and unit matched case-insensitively
pub fn parse_memory_flag(argument: &str, prefix: &str) -> Option<u64> {
    if argument.len() <= prefix.len() || !argument.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, value) = argument.split_at(prefix.len());
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }

    let (number, multiplier) = match value.as_bytes().last().map(u8::to_ascii_lowercase) {
        Some(b'k') => (&value[..value.len() - 1], 1024.0),
        Some(b'm') => (&value[..value.len() - 1], 1024.0 * 1024.0),
        Some(b'g') => (&value[..value.len() - 1], 1024.0 * 1024.0 * 1024.0),
        _ => (value, 1.0),
    };

    let parsed: f64 = number.parse().ok()?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return None;
    }
    Some((parsed * multiplier) as u64)
}

/// `MemTotal` from `/proc/meminfo` contents, in bytes
pub fn parse_meminfo_total(contents: &str) -> Option<u64> {
    contents.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        let kib: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
        Some(kib * 1024)
    })
}

/// cgroup memory limit in bytes, `None` when unlimited
pub fn parse_cgroup_limit(contents: &str) -> Option<u64> {
    let trimmed = contents.trim();
    if trimmed == "max" {
        return None;
    }
    let bytes: u64 = trimmed.parse().ok()?;
    (bytes > 0 && bytes < CGROUP_UNLIMITED_FLOOR).then_some(bytes)
}
