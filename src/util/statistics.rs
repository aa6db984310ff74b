//! Heap accounting: belt occupancy and per-collector counters.

use crate::plan::beltway::CollectorKind;
use crate::policy::BeltId;
use crate::util::Address;
use enum_map::EnumMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// A snapshot of one belt's occupancy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BeltStats {
    pub belt: BeltId,
    pub start: Address,
    pub end: Address,
    pub allocation_mark: Address,
    pub used: usize,
    pub remaining: usize,
}

/// Counters updated by each collector's prologue and epilogue.
#[derive(Default)]
pub struct CollectionStats {
    collections: EnumMap<CollectorKind, AtomicUsize>,
    bytes_copied: EnumMap<CollectorKind, AtomicUsize>,
    pause_nanos: AtomicU64,
    /// Calls to `collect_garbage`.
    cycles: AtomicUsize,
}

impl CollectionStats {
    pub fn start_collection(&self, kind: CollectorKind) -> usize {
        self.collections[kind].fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn end_collection(&self, kind: CollectorKind, bytes_copied: usize) {
        self.bytes_copied[kind].fetch_add(bytes_copied, Ordering::Relaxed);
    }

    pub fn start_cycle(&self) -> usize {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn end_cycle(&self, pause: Duration) {
        self.pause_nanos
            .fetch_add(pause.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn collections(&self, kind: CollectorKind) -> usize {
        self.collections[kind].load(Ordering::Relaxed)
    }

    pub fn bytes_copied(&self, kind: CollectorKind) -> usize {
        self.bytes_copied[kind].load(Ordering::Relaxed)
    }

    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn total_pause(&self) -> Duration {
        Duration::from_nanos(self.pause_nanos.load(Ordering::Relaxed))
    }
}
