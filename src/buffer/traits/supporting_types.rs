//! Size estimation traits
//!
//! Buffered telemetry records are accounted by their estimated retained
//! footprint, not by `size_of`. Payload types either implement [`Sizeable`]
//! themselves or the buffer is given a dedicated [`SizeEstimator`].

use std::fmt::Debug;
use std::marker::PhantomData;

/// Estimates the retained footprint of one payload in bytes
pub trait SizeEstimator<T>: Send + Sync + Debug {
    /// Raw estimate before the expansion rate is applied
    fn estimate_size(&self, payload: &T) -> u64;
}

/// Payloads that know their own retained footprint
pub trait Sizeable {
    /// Estimated size in bytes including owned heap data
    fn object_size(&self) -> u64;
}

/// Estimator delegating to [`Sizeable::object_size`]
pub struct SizeableEstimator<T> {
    _phantom: PhantomData<fn(&T)>,
}

impl<T> Clone for SizeableEstimator<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SizeableEstimator<T> {}

impl<T> Debug for SizeableEstimator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SizeableEstimator")
    }
}

impl<T> SizeableEstimator<T> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for SizeableEstimator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sizeable> SizeEstimator<T> for SizeableEstimator<T> {
    #[inline(always)]
    fn estimate_size(&self, payload: &T) -> u64 {
        payload.object_size()
    }
}

/// Estimator that reports the same size for every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeEstimator {
    bytes: u64,
}

impl FixedSizeEstimator {
    pub const fn new(bytes: u64) -> Self {
        Self { bytes }
    }
}

impl<T> SizeEstimator<T> for FixedSizeEstimator {
    #[inline(always)]
    fn estimate_size(&self, _payload: &T) -> u64 {
        self.bytes
    }
}

/// Round a size up to the next 8-byte boundary
#[inline(always)]
pub const fn align_to_8_bytes(size: u64) -> u64 {
    (size + 7) & !7
}

impl Sizeable for String {
    fn object_size(&self) -> u64 {
        // header + pointer/len/cap, then the heap bytes
        align_to_8_bytes(std::mem::size_of::<String>() as u64)
            + align_to_8_bytes(self.capacity() as u64)
    }
}

impl<T: Sizeable> Sizeable for Vec<T> {
    fn object_size(&self) -> u64 {
        let spine = align_to_8_bytes(
            std::mem::size_of::<Vec<T>>() as u64
                + (self.capacity() * std::mem::size_of::<T>()) as u64,
        );
        spine
            + self
                .iter()
                .map(|item| {
                    item.object_size()
                        .saturating_sub(std::mem::size_of::<T>() as u64)
                })
                .sum::<u64>()
    }
}
