//! The heap instance and its builder.

use crate::plan::beltway::{self, Collector, CollectorKind, GcCycle};
use crate::plan::scavenger::Scavenger;
use crate::policy::BeltManager;
use crate::util::conversions;
use crate::util::error::AllocationError;
use crate::util::memory;
use crate::util::options::Options;
use crate::util::statistics::CollectionStats;
use crate::vm::VMBinding;
use enum_map::EnumMap;
use std::sync::{Mutex, MutexGuard};

/// Collects options before a [`Heap`] is built. Options are frozen once the heap exists.
pub struct HeapBuilder {
    pub options: Options,
}

impl Default for HeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapBuilder {
    /// Default options, overridden by `BELTWAY_*` environment variables.
    pub fn new() -> Self {
        let mut builder = Self::new_no_env_vars();
        builder.options.read_env_var_settings();
        builder
    }

    /// Default options only.
    pub fn new_no_env_vars() -> Self {
        HeapBuilder {
            options: Options::default(),
        }
    }

    /// Set an option by name. Returns false if the name is unknown or the value is invalid.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_str(name, val)
    }

    pub fn build<VM: VMBinding>(&self) -> Result<Heap<VM>, AllocationError> {
        Heap::new(self.options.clone())
    }
}

/// A Beltway heap: the belts, the collectors working on them, and their accounting.
pub struct Heap<VM: VMBinding> {
    options: Options,
    belts: BeltManager,
    scavenger: Scavenger,
    collectors: EnumMap<CollectorKind, Collector<VM>>,
    stats: CollectionStats,
    gc_lock: Mutex<()>,
}

impl<VM: VMBinding> Heap<VM> {
    fn new(options: Options) -> Result<Self, AllocationError> {
        let extents = BeltManager::compute_extents(
            options.heap_size,
            &options.belt_percentages,
            options.log_card_bytes,
        )
        .map_err(|e| {
            error!("Cannot split a heap of {} bytes: {}", options.heap_size, e);
            e
        })?;
        let size = conversions::raw_align_up(options.heap_size, 1 << options.log_card_bytes);
        let size = conversions::pages_to_bytes(conversions::bytes_to_pages_up(size));
        let start = memory::dzmmap_anywhere(size).map_err(|e| {
            error!("Failed to map {} bytes for the heap: {}", size, e);
            AllocationError::MmapOutOfMemory
        })?;
        let belts = BeltManager::new(start, size, &extents, options.log_card_bytes);
        let scavenger = Scavenger::from_options(&options);
        info!(
            "Heap of {} bytes at {}, belts {}%, {} byte cards, {:?} scavenging",
            options.heap_size,
            start,
            options.belt_percentages,
            1usize << options.log_card_bytes,
            scavenger
        );
        Ok(Heap {
            options,
            belts,
            scavenger,
            collectors: beltway::collector_table(),
            stats: CollectionStats::default(),
            gc_lock: Mutex::new(()),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn belts(&self) -> &BeltManager {
        &self.belts
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    pub fn scavenger(&self) -> &Scavenger {
        &self.scavenger
    }

    /// Run one collector. Mutators must be stopped.
    pub(crate) fn collect(
        &self,
        kind: CollectorKind,
        cycle: &mut GcCycle<VM::VMSlot>,
    ) -> Result<(), AllocationError> {
        (self.collectors[kind])(self, cycle)
    }

    /// Serializes collections requested by different threads.
    pub(crate) fn lock_for_gc(&self) -> MutexGuard<'_, ()> {
        self.gc_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
