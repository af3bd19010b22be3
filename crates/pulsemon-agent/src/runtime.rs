//! Runtime self-metrics for the agent process.
//!
//! Heap activity is tracked by a counting wrapper around the system
//! allocator; address-space figures come from the OS view of our own PID.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::ProcessesToUpdate;

static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);
static FREED_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOC_CALLS: AtomicU64 = AtomicU64::new(0);
static FREE_CALLS: AtomicU64 = AtomicU64::new(0);

/// Allocator wrapper that keeps running totals of heap activity. Installed
/// as the `#[global_allocator]` in the agent binary.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            ALLOCATED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
            ALLOC_CALLS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        FREED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
        FREE_CALLS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the process's memory statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeStats {
    pub alloc: u64,
    pub total_alloc: u64,
    pub mallocs: u64,
    pub frees: u64,
    pub heap_objects: u64,
    /// Resident set size reported by the OS.
    pub heap_sys: u64,
    /// Virtual address space reported by the OS.
    pub sys: u64,
}

/// Samples the allocator counters and refreshes the OS view of this process.
pub fn sample(system: &mut sysinfo::System) -> RuntimeStats {
    let total_alloc = ALLOCATED_BYTES.load(Ordering::Relaxed);
    let freed = FREED_BYTES.load(Ordering::Relaxed);
    let mallocs = ALLOC_CALLS.load(Ordering::Relaxed);
    let frees = FREE_CALLS.load(Ordering::Relaxed);

    let mut stats = RuntimeStats {
        alloc: total_alloc.saturating_sub(freed),
        total_alloc,
        mallocs,
        frees,
        heap_objects: mallocs.saturating_sub(frees),
        ..RuntimeStats::default()
    };

    if let Ok(pid) = sysinfo::get_current_pid() {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        if let Some(process) = system.process(pid) {
            stats.heap_sys = process.memory();
            stats.sys = process.virtual_memory();
        }
    }

    stats
}

/// The full gauge set published by the runtime poller. Gauges with no
/// equivalent in a collector-less runtime report zero so consumers keyed on
/// the complete set keep working.
pub fn gauges(stats: &RuntimeStats) -> Vec<(&'static str, f64)> {
    let heap_idle = stats.heap_sys.saturating_sub(stats.alloc);
    vec![
        ("Alloc", stats.alloc as f64),
        ("BuckHashSys", 0.0),
        ("Frees", stats.frees as f64),
        ("GCCPUFraction", 0.0),
        ("GCSys", 0.0),
        ("HeapAlloc", stats.alloc as f64),
        ("HeapIdle", heap_idle as f64),
        ("HeapInuse", stats.alloc as f64),
        ("HeapObjects", stats.heap_objects as f64),
        ("HeapReleased", 0.0),
        ("HeapSys", stats.heap_sys as f64),
        ("LastGC", 0.0),
        ("Lookups", 0.0),
        ("MCacheInuse", 0.0),
        ("MCacheSys", 0.0),
        ("MSpanInuse", 0.0),
        ("MSpanSys", 0.0),
        ("Mallocs", stats.mallocs as f64),
        ("NextGC", 0.0),
        ("NumForcedGC", 0.0),
        ("NumGC", 0.0),
        ("OtherSys", 0.0),
        ("PauseTotalNs", 0.0),
        ("StackInuse", 0.0),
        ("StackSys", 0.0),
        ("Sys", stats.sys as f64),
        ("TotalAlloc", stats.total_alloc as f64),
    ]
}
