//! The Beltway generational plan: three collectors of increasing scope, chained by
//! [`collect_garbage`].
//!
//! | collector | donors              | destination                            | extra roots                    |
//! |-----------|---------------------|----------------------------------------|--------------------------------|
//! | Eden      | eden                | to-space                               | cards over to-space and mature |
//! | ToSpace   | to-space            | mature                                 | cards over mature              |
//! | Major     | mature              | eden (expandable), then back to mature | none                           |
//! | Major     | mature and to-space | eden, then back to mature              | none                           |
//!
//! A major collection takes to-space along with mature when to-space could not be promoted.

mod eden;
mod major;
mod to_space;

use crate::heap::Heap;
use crate::plan::barriers::is_old_to_young;
use crate::plan::scavenger::{Evacuation, ScavengeResult};
use crate::plan::tracing;
use crate::policy::BeltId;
use crate::util::error::AllocationError;
use crate::util::sanity;
use crate::vm::slot::Slot;
use crate::vm::{Collection, VMBinding};
use enum_map::{enum_map, Enum, EnumMap};
use std::time::Instant;
use strum::IntoEnumIterator;
use strum_macros::IntoStaticStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum, IntoStaticStr)]
pub enum CollectorKind {
    Eden,
    ToSpace,
    Major,
}

/// A collector runs one collection level against the heap.
pub type Collector<VM> = fn(&Heap<VM>, &mut GcCycle<<VM as VMBinding>::VMSlot>) -> Result<(), AllocationError>;

/// The collector for each level. Which scavenger they use is fixed by the heap's options.
pub fn collector_table<VM: VMBinding>() -> EnumMap<CollectorKind, Collector<VM>> {
    enum_map! {
        CollectorKind::Eden => eden::collect::<VM> as Collector<VM>,
        CollectorKind::ToSpace => to_space::collect::<VM> as Collector<VM>,
        CollectorKind::Major => major::collect::<VM> as Collector<VM>,
    }
}

/// State carried across the collectors of one `collect_garbage` call.
pub struct GcCycle<SL: Slot> {
    carried_slots: Vec<SL>,
    major_ran: bool,
}

impl<SL: Slot> Default for GcCycle<SL> {
    fn default() -> Self {
        GcCycle {
            carried_slots: vec![],
            major_ran: false,
        }
    }
}

impl<SL: Slot> GcCycle<SL> {
    fn absorb(&mut self, result: ScavengeResult<SL>) {
        self.carried_slots.extend(result.carried_slots);
    }

    /// A major collection leaves every object in mature, so no older-to-younger reference
    /// survives it.
    fn major_ran(&mut self) {
        self.major_ran = true;
        self.carried_slots.clear();
    }
}

/// Fail with out-of-memory, before anything is modified, if the destination of `evacuation`
/// cannot hold what the donors would copy into it. Returns the evacuation with its survivor
/// bound set.
fn check_capacity<VM: VMBinding>(
    heap: &Heap<VM>,
    evacuation: Evacuation,
) -> Result<Evacuation, AllocationError> {
    let available = heap.belts().belt(evacuation.destination).available();
    check_fits(heap, evacuation, available)
}

/// As [`check_capacity`], with at most `available` bytes for the survivors.
fn check_fits<VM: VMBinding>(
    heap: &Heap<VM>,
    evacuation: Evacuation,
    available: usize,
) -> Result<Evacuation, AllocationError> {
    let used = evacuation.donor_bytes(heap.belts());
    if used <= available {
        return Ok(evacuation.with_survivor_bound(used));
    }
    let live = tracing::reachable_donor_bytes(heap, &evacuation);
    if live > available {
        info!(
            "{} survivors ({} bytes) do not fit in {} ({} bytes available)",
            evacuation.donor_names(),
            live,
            evacuation.destination.name(),
            available
        );
        return Err(AllocationError::HeapOutOfMemory);
    }
    Ok(evacuation.with_survivor_bound(live))
}

fn verify_or_die<VM: VMBinding>(heap: &Heap<VM>, belt: BeltId, when: &str) {
    match sanity::verify_belt::<VM>(heap.belts(), belt) {
        Ok(report) => trace!("{} {}: {:?}", when, belt.name(), report),
        Err(corruption) => panic!("Heap corruption {} collection: {}", when, corruption),
    }
}

/// Verify the belts an evacuation touches, or every belt with `extreme_assertions`.
fn verify_evacuation<VM: VMBinding>(heap: &Heap<VM>, evacuation: &Evacuation, when: &str) {
    if !heap.options().verify_heap {
        return;
    }
    if cfg!(feature = "extreme_assertions") {
        BeltId::iter().for_each(|belt| verify_or_die(heap, belt, when));
    } else {
        for belt in evacuation.donors.iter() {
            verify_or_die(heap, *belt, when);
        }
        verify_or_die(heap, evacuation.destination, when);
    }
}

fn prologue<VM: VMBinding>(heap: &Heap<VM>, kind: CollectorKind, evacuation: &Evacuation) {
    let count = heap.stats().start_collection(kind);
    let name: &'static str = kind.into();
    debug!("{} collection #{} start", name, count);
    VM::VMCollection::before_garbage_collection();
    verify_evacuation(heap, evacuation, "before");
}

fn epilogue<VM: VMBinding>(
    heap: &Heap<VM>,
    kind: CollectorKind,
    evacuation: &Evacuation,
    result: &ScavengeResult<VM::VMSlot>,
) {
    heap.belts().side_table().restore_all_chunk_slots();
    verify_evacuation(heap, evacuation, "after");
    heap.stats().end_collection(kind, result.bytes_copied);
    VM::VMCollection::after_garbage_collection();
    let name: &'static str = kind.into();
    debug!(
        "{} collection done: {} objects, {} bytes copied",
        name, result.objects_copied, result.bytes_copied
    );
}

/// Make room for `requested` bytes in eden. Runs the eden collector, and escalates to the
/// to-space and major collectors when their source belts are running out of room. Returns
/// false if the heap is exhausted; the caller must treat that as fatal.
pub fn collect_garbage<VM: VMBinding>(heap: &Heap<VM>, requested: usize) -> bool {
    let _guard = heap.lock_for_gc();
    collect_garbage_locked(heap, requested)
}

/// As [`collect_garbage`], for a caller that already holds the heap's GC lock.
pub(crate) fn collect_garbage_locked<VM: VMBinding>(heap: &Heap<VM>, requested: usize) -> bool {
    let belts = heap.belts();
    let start = Instant::now();
    VM::VMCollection::stop_all_mutators();
    let cycle_number = heap.stats().start_cycle();
    let mut cycle = GcCycle::default();
    let result = run_collectors(heap, requested, &mut cycle);
    finish_cycle(heap, &cycle);
    VM::VMCollection::resume_mutators();
    let pause = start.elapsed();
    heap.stats().end_cycle(pause);

    match result {
        Ok(()) => {
            info!(
                "GC #{} done in {:?}: {} bytes used, {} bytes free",
                cycle_number,
                pause,
                belts.used_bytes(),
                belts.free_bytes()
            );
            true
        }
        Err(err) => {
            error!(
                "GC #{} cannot make room for {} bytes: {}",
                cycle_number, requested, err
            );
            false
        }
    }
}

fn run_collectors<VM: VMBinding>(
    heap: &Heap<VM>,
    requested: usize,
    cycle: &mut GcCycle<VM::VMSlot>,
) -> Result<(), AllocationError> {
    let belts = heap.belts();
    let eden = belts.belt(BeltId::Eden);
    let to_space = belts.belt(BeltId::ToSpace);
    let mature = belts.belt(BeltId::Mature);

    heap.collect(CollectorKind::Eden, cycle)?;
    // A to-space that cannot be promoted is taken by a major collection instead.
    let promotion_failed = to_space.remaining() <= eden.extent() && promote_to_space(heap, cycle);
    if promotion_failed || mature.remaining() <= to_space.extent() / 2 {
        if !promotion_failed && !to_space.is_empty() {
            // If this fails too, the major collection takes to-space.
            promote_to_space(heap, cycle);
        }
        heap.collect(CollectorKind::Major, cycle)?;
        if mature.remaining() <= to_space.extent() / 2 {
            error!("{:?} is still full after a major collection", mature);
            return Err(AllocationError::HeapOutOfMemory);
        }
    }
    if requested > eden.remaining() {
        error!("{:?} cannot hold a request of {} bytes", eden, requested);
        return Err(AllocationError::HeapOutOfMemory);
    }
    Ok(())
}

/// Run the to-space collector. Returns true if mature cannot hold the survivors, in which case
/// nothing was moved.
fn promote_to_space<VM: VMBinding>(heap: &Heap<VM>, cycle: &mut GcCycle<VM::VMSlot>) -> bool {
    match heap.collect(CollectorKind::ToSpace, cycle) {
        Ok(()) => false,
        Err(err) => {
            info!("Cannot promote to-space ({}), collecting it with mature", err);
            true
        }
    }
}

/// Clear every card, then mark again the cards of slots that still hold an older-to-younger
/// reference, so that the next minor collection still finds them.
fn finish_cycle<VM: VMBinding>(heap: &Heap<VM>, cycle: &GcCycle<VM::VMSlot>) {
    let belts = heap.belts();
    belts.card_region().clear_all();
    if !cycle.major_ran {
        for slot in cycle.carried_slots.iter() {
            let slot_addr = slot.to_address();
            match slot.load() {
                Some(target) if is_old_to_young(belts, slot_addr, target) => {
                    belts.card_region().mark_card(slot_addr)
                }
                _ => {}
            }
        }
    }
    if heap.options().verify_heap {
        if let Err(corruption) = sanity::verify_cards(belts) {
            panic!("Heap corruption after collection: {}", corruption);
        }
    }
}
