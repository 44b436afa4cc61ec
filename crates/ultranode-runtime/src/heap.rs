//! [`HeapSource`] implementations the runtime hands to
//! [`ultranode_health::HealthMonitor`]. §1 puts allocator particulars out of
//! scope for the rest of the tree; this is the one place that narrow
//! interface gets a concrete body.

use ultranode_health::{HeapSource, HeapStats};

/// No real heap-pressure signal exists for a hosted `std` build. Reports a
/// stable high-water value so the health monitor's low-heap ladder never
/// fires outside `espidf`.
pub struct HostedHeap;

impl HeapSource for HostedHeap {
    fn snapshot(&self) -> HeapStats { HeapStats { free_bytes: u64::MAX, min_ever_free_bytes: u64::MAX } }
}

#[cfg(target_os = "espidf")]
pub struct EspidfHeap;

#[cfg(target_os = "espidf")]
impl HeapSource for EspidfHeap {
    fn snapshot(&self) -> HeapStats {
        // SAFETY: both calls are bare FFI reads of a heap-tracking counter,
        // no pointers cross the boundary.
        let free_bytes = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() } as u64;
        let min_ever_free_bytes = unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() } as u64;
        HeapStats { free_bytes, min_ever_free_bytes }
    }
}
