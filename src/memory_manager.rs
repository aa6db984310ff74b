//! Runtime-to-heap interface: safe Rust APIs.
//!
//! A runtime builds a heap once with [`heap_init`], allocates through [`alloc`] (or
//! [`alloc_in_belt`] to place an object in a specific belt), and routes every reference store
//! into a heap object through [`object_reference_write`] so the card table stays complete.

use crate::heap::{Heap, HeapBuilder};
use crate::plan::barriers::CardMarkingBarrier;
use crate::plan::beltway::{self, CollectorKind};
use crate::policy::BeltId;
use crate::util::conversions;
use crate::util::error::{AllocationError, HeapCorruption};
use crate::util::sanity::{self, VerifyReport};
use crate::util::statistics::BeltStats;
use crate::util::{Address, ObjectReference};
use crate::vm::{Collection, VMBinding};

/// Build a heap from `builder`.
///
/// This also tries to install the built-in logger. If the runtime has already installed a
/// logger, that one is kept.
///
/// Arguments:
/// * `builder`: The options for the heap.
pub fn heap_init<VM: VMBinding>(builder: &HeapBuilder) -> Result<Box<Heap<VM>>, AllocationError> {
    match crate::util::logger::try_init() {
        Ok(_) => debug!("Beltway initialized the logger."),
        Err(_) => debug!(
            "Beltway failed to initialize the logger. Possibly a logger has been initialized by user."
        ),
    }
    builder.build().map(Box::new)
}

/// Allocate `size` bytes in eden, collecting if eden is full. The size is rounded up to whole
/// words. If the heap is exhausted the runtime is told through
/// [`Collection::out_of_memory`] and a zero address is returned.
///
/// The returned memory is zeroed.
pub fn alloc<VM: VMBinding>(heap: &Heap<VM>, size: usize) -> Address {
    let size = conversions::object_size_align_up(size);
    if let Some(result) = heap.belts().allocate(BeltId::Eden, size) {
        return result;
    }
    let guard = heap.lock_for_gc();
    // Another thread may have collected while we waited for the lock.
    if let Some(result) = heap.belts().allocate(BeltId::Eden, size) {
        return result;
    }
    if beltway::collect_garbage_locked(heap, size) {
        if let Some(result) = heap.belts().allocate(BeltId::Eden, size) {
            return result;
        }
    }
    drop(guard);
    VM::VMCollection::out_of_memory(AllocationError::HeapOutOfMemory);
    Address::ZERO
}

/// Allocate `size` bytes directly in `belt`, without ever collecting. Returns `None` if the
/// belt is full.
pub fn alloc_in_belt<VM: VMBinding>(heap: &Heap<VM>, belt: BeltId, size: usize) -> Option<Address> {
    heap.belts()
        .allocate(belt, conversions::object_size_align_up(size))
}

/// Run the collection chain until eden can hold `requested` bytes. Returns false if the heap is
/// exhausted, which the caller must treat as fatal.
pub fn collect_garbage<VM: VMBinding>(heap: &Heap<VM>, requested: usize) -> bool {
    beltway::collect_garbage(heap, requested)
}

/// The write barrier. Store `target` into `slot`, a reference field of `src`.
///
/// Arguments:
/// * `src`: The object being modified.
/// * `slot`: The field of `src` that receives the reference.
/// * `target`: The new value of the field. May be null.
pub fn object_reference_write<VM: VMBinding>(
    heap: &Heap<VM>,
    src: ObjectReference,
    slot: VM::VMSlot,
    target: ObjectReference,
) {
    CardMarkingBarrier::<VM>::new(heap.belts()).object_reference_write(src, slot, target)
}

/// Check the invariants of one belt and its objects.
pub fn verify_belt<VM: VMBinding>(
    heap: &Heap<VM>,
    belt: BeltId,
) -> Result<VerifyReport, HeapCorruption> {
    sanity::verify_belt::<VM>(heap.belts(), belt)
}

/// Is `addr` inside one of the belts?
pub fn is_in_heap<VM: VMBinding>(heap: &Heap<VM>, addr: Address) -> bool {
    heap.belts().is_in_heap(addr)
}

/// Which belt holds `object`, if any.
pub fn belt_of<VM: VMBinding>(heap: &Heap<VM>, object: ObjectReference) -> Option<BeltId> {
    heap.belts().belt_of(object.to_raw_address())
}

/// Bytes left in all belts.
pub fn free_bytes<VM: VMBinding>(heap: &Heap<VM>) -> usize {
    heap.belts().free_bytes()
}

/// Bytes allocated in all belts.
pub fn used_bytes<VM: VMBinding>(heap: &Heap<VM>) -> usize {
    heap.belts().used_bytes()
}

pub fn belt_stats<VM: VMBinding>(heap: &Heap<VM>, belt: BeltId) -> BeltStats {
    heap.belts().stats(belt)
}

/// How many times collector `kind` has run.
pub fn gc_count<VM: VMBinding>(heap: &Heap<VM>, kind: CollectorKind) -> usize {
    heap.stats().collections(kind)
}
