//! The evacuation engine shared by all collectors.
//!
//! An [`Evacuation`] names one or more donor belts, a destination belt, and the older regions
//! whose dirty cards act as extra roots. Every donor object reachable from the roots or from a
//! dirty card is copied exactly once into the destination, and every slot that referred to it
//! is rewritten.

use crate::heap::Heap;
use crate::plan::barriers::is_old_to_young;
use crate::policy::{Belt, BeltId, BeltManager};
use crate::scheduler::WorkerGroup;
use crate::util::alloc::{BufferSizing, GcBuffer};
use crate::util::object_forwarding;
use crate::util::options::{Options, ScavengeMode};
use crate::util::{Address, ObjectReference};
use crate::vm::slot::Slot;
use crate::vm::{ObjectModel, RootsWorkFactory, Scanning, VMBinding};
use std::ops::Range;

/// One copy from the donor belts into a destination belt.
#[derive(Debug, Clone)]
pub struct Evacuation {
    /// The belts being emptied. The first one names the evacuation in logs.
    pub donors: Vec<BeltId>,
    pub destination: BeltId,
    /// Regions of older belts whose dirty cards are scanned for references into the donors.
    pub cards: Vec<(BeltId, Range<Address>)>,
    /// Upper bound on the bytes this evacuation copies, set by the capacity check.
    pub survivor_bound: usize,
}

impl Evacuation {
    pub fn new(donor: BeltId, destination: BeltId) -> Self {
        debug_assert_ne!(donor, destination);
        Evacuation {
            donors: vec![donor],
            destination,
            cards: vec![],
            survivor_bound: usize::MAX,
        }
    }

    pub fn with_donor(mut self, donor: BeltId) -> Self {
        debug_assert!(donor != self.destination && !self.donors.contains(&donor));
        self.donors.push(donor);
        self
    }

    pub fn with_cards(mut self, belt: BeltId, range: Range<Address>) -> Self {
        self.cards.push((belt, range));
        self
    }

    pub fn with_survivor_bound(mut self, bytes: usize) -> Self {
        self.survivor_bound = bytes;
        self
    }

    /// Is `addr` in the allocated part of a donor?
    pub fn is_donor_address(&self, belts: &BeltManager, addr: Address) -> bool {
        self.donors
            .iter()
            .any(|donor| belts.belt(*donor).is_allocated(addr))
    }

    /// Bytes allocated in the donors.
    pub fn donor_bytes(&self, belts: &BeltManager) -> usize {
        self.donors.iter().map(|donor| belts.belt(*donor).used()).sum()
    }

    /// The donors' names, joined for logging.
    pub fn donor_names(&self) -> String {
        let names: Vec<&str> = self.donors.iter().map(|donor| donor.name()).collect();
        names.join("+")
    }
}

/// What one evacuation did.
#[derive(Debug)]
pub struct ScavengeResult<SL: Slot> {
    pub objects_copied: usize,
    pub bytes_copied: usize,
    /// Card-scanned slots that still hold a reference from an older belt into a younger one.
    /// Their cards must be marked again after the cards are cleared.
    pub carried_slots: Vec<SL>,
}

impl<SL: Slot> Default for ScavengeResult<SL> {
    fn default() -> Self {
        ScavengeResult {
            objects_copied: 0,
            bytes_copied: 0,
            carried_slots: vec![],
        }
    }
}

impl<SL: Slot> ScavengeResult<SL> {
    pub fn merge(&mut self, other: ScavengeResult<SL>) {
        self.objects_copied += other.objects_copied;
        self.bytes_copied += other.bytes_copied;
        self.carried_slots.extend(other.carried_slots);
    }
}

/// Collects root slots reported by the runtime.
pub struct RootSlots<SL: Slot>(Vec<Vec<SL>>);

impl<SL: Slot> Default for RootSlots<SL> {
    fn default() -> Self {
        RootSlots(vec![])
    }
}

impl<SL: Slot> RootSlots<SL> {
    pub fn into_slots(self) -> impl Iterator<Item = SL> {
        self.0.into_iter().flatten()
    }
}

impl<SL: Slot> RootsWorkFactory<SL> for RootSlots<SL> {
    fn create_process_roots_work(&mut self, slots: Vec<SL>) {
        self.0.push(slots);
    }
}

/// How evacuation work is executed. Chosen once when the heap is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scavenger {
    Sequential,
    Parallel { threads: usize },
}

impl Scavenger {
    pub fn from_options(options: &Options) -> Self {
        match options.scavenge_mode {
            ScavengeMode::Sequential => Scavenger::Sequential,
            ScavengeMode::Parallel => Scavenger::Parallel {
                threads: options.threads,
            },
        }
    }

    /// Evacuate the donors of `evacuation`. The destination's allocation mark snapshot must have
    /// been taken, and the destination must be able to hold every reachable donor object.
    pub fn scavenge<VM: VMBinding>(
        &self,
        heap: &Heap<VM>,
        evacuation: &Evacuation,
    ) -> ScavengeResult<VM::VMSlot> {
        let evacuators = match *self {
            Scavenger::Sequential => 1,
            Scavenger::Parallel { threads } => threads,
        };
        let sizing = BufferSizing::new(
            heap.belts().belt(evacuation.destination).available(),
            evacuation.survivor_bound,
            heap.options().gc_lab_bytes,
            evacuators,
        );
        trace!(
            "GC buffers of {} bytes, {} bytes may be filled",
            sizing.buffer_bytes(),
            sizing.waste_left()
        );
        let result = match *self {
            Scavenger::Sequential => scavenge_sequential(heap, evacuation, &sizing),
            Scavenger::Parallel { threads } => {
                WorkerGroup::new(heap, evacuation, &sizing).run(threads)
            }
        };
        debug!(
            "Scavenged {} objects ({} bytes) from {} to {}",
            result.objects_copied,
            result.bytes_copied,
            evacuation.donor_names(),
            evacuation.destination.name()
        );
        result
    }
}

/// Roots first, then dirty cards, then a Cheney scan of the destination from its snapshot up to
/// the copy frontier.
fn scavenge_sequential<VM: VMBinding>(
    heap: &Heap<VM>,
    evacuation: &Evacuation,
    sizing: &BufferSizing,
) -> ScavengeResult<VM::VMSlot> {
    let belts = heap.belts();
    let mut evacuator = Evacuator::new(heap, evacuation, sizing);

    let mut roots = RootSlots::default();
    VM::VMScanning::scan_roots(&mut roots);
    for slot in roots.into_slots() {
        evacuator.process_slot(slot);
    }

    for (belt, range) in evacuation.cards.iter() {
        belts
            .card_region()
            .for_each_dirty_card(range.clone(), |index, card| {
                if belts.side_table().try_claim(index) {
                    evacuator.scan_card(*belt, card, |_| {});
                }
            });
    }

    // With a single evacuator the buffer always ends at the allocation mark, so the copies
    // are contiguous up to the frontier.
    let destination = belts.belt(evacuation.destination);
    let mut scan = destination.allocation_mark_snapshot();
    while scan < evacuator.copy_frontier() {
        let object = VM::VMObjectModel::address_to_ref(scan);
        scan += VM::VMObjectModel::get_current_size(object);
        evacuator.scan_object(object, |_| {});
    }

    let result = evacuator.into_result();
    debug_assert_eq!(scan, destination.allocation_mark());
    result
}

/// Forwards donor objects found through slots. One per thread, each copying into its own
/// [`GcBuffer`].
pub struct Evacuator<'a, VM: VMBinding> {
    heap: &'a Heap<VM>,
    evacuation: &'a Evacuation,
    destination: &'a Belt,
    sizing: &'a BufferSizing,
    buffer: GcBuffer,
    result: ScavengeResult<VM::VMSlot>,
}

impl<'a, VM: VMBinding> Evacuator<'a, VM> {
    pub fn new(heap: &'a Heap<VM>, evacuation: &'a Evacuation, sizing: &'a BufferSizing) -> Self {
        Evacuator {
            heap,
            evacuation,
            destination: heap.belts().belt(evacuation.destination),
            sizing,
            buffer: GcBuffer::default(),
            result: ScavengeResult::default(),
        }
    }

    /// Release the buffer and return what this evacuator did. Copying must be over.
    pub fn into_result(mut self) -> ScavengeResult<VM::VMSlot> {
        let side_table = self.heap.belts().side_table();
        let released = self
            .buffer
            .retire::<VM>(self.destination, side_table, None);
        debug_assert!(released);
        self.result
    }

    /// The end of this evacuator's copies: the buffer cursor while a buffer is held, else the
    /// destination's allocation mark.
    pub fn copy_frontier(&self) -> Address {
        if self.buffer.is_active() {
            self.buffer.cursor()
        } else {
            self.destination.allocation_mark()
        }
    }

    /// Forward the referent of `slot` if it lives in a donor and rewrite the slot.
    /// Returns the new copy if this call made it; the copy still has to be scanned.
    pub fn process_slot(&mut self, slot: VM::VMSlot) -> Option<ObjectReference> {
        let object = slot.load()?;
        if !self
            .evacuation
            .is_donor_address(self.heap.belts(), object.to_raw_address())
        {
            return None;
        }
        let (new_object, copied) = self.trace_object(object);
        slot.store(new_object);
        copied.then_some(new_object)
    }

    /// Scan every slot of `object`, reporting each copy made through `on_copy`.
    pub fn scan_object<F>(&mut self, object: ObjectReference, mut on_copy: F)
    where
        F: FnMut(ObjectReference),
    {
        VM::VMScanning::scan_object(object, &mut |slot: VM::VMSlot| {
            if let Some(new_object) = self.process_slot(slot) {
                on_copy(new_object);
            }
        });
    }

    /// Scan the slots in `card`, a dirty card of `belt`. Slots that still refer to a younger belt
    /// afterwards are remembered so the card can be marked again.
    pub fn scan_card<F>(&mut self, belt: BeltId, card: Range<Address>, mut on_copy: F)
    where
        F: FnMut(ObjectReference),
    {
        let heap = self.heap;
        let belts = heap.belts();
        for_each_slot_in_card::<VM, _>(belts, belt, card, |slot| {
            if let Some(new_object) = self.process_slot(slot) {
                on_copy(new_object);
            }
            if let Some(target) = slot.load() {
                if is_old_to_young(belts, slot.to_address(), target) {
                    self.result.carried_slots.push(slot);
                }
            }
        });
    }

    /// Forward `object`, copying it unless another thread already has.
    fn trace_object(&mut self, object: ObjectReference) -> (ObjectReference, bool) {
        let forwarding_status = object_forwarding::attempt_to_forward::<VM>(object);
        if object_forwarding::state_is_forwarded_or_being_forwarded(forwarding_status) {
            let new_object =
                object_forwarding::spin_and_get_forwarded_object::<VM>(object, forwarding_status);
            return (new_object, false);
        }
        let size = VM::VMObjectModel::get_current_size(object);
        let to = match self.allocate(size) {
            Some(to) => to,
            None => {
                VM::VMObjectModel::dump_object(object);
                panic!(
                    "{:?} cannot hold {} ({} bytes) evacuated from {}",
                    self.destination,
                    object,
                    size,
                    self.evacuation.donor_names()
                );
            }
        };
        let new_object = object_forwarding::forward_object::<VM>(object, size, to);
        self.result.objects_copied += 1;
        self.result.bytes_copied += size;
        (new_object, true)
    }

    /// Room for a copy of `size` bytes: from the buffer, else from a fresh buffer, else straight
    /// from the destination belt.
    fn allocate(&mut self, size: usize) -> Option<Address> {
        let belts = self.heap.belts();
        let side_table = belts.side_table();
        if let Some(to) = self.buffer.alloc(size, side_table) {
            return Some(to);
        }
        let buffer_bytes = self.sizing.buffer_bytes();
        if self
            .buffer
            .retire::<VM>(self.destination, side_table, Some(self.sizing))
            && size < buffer_bytes
            && self.buffer.refill(self.destination, buffer_bytes)
        {
            return self.buffer.alloc(size, side_table);
        }
        belts.allocate(self.evacuation.destination, size)
    }
}

/// Call `f` for every slot located in `card`, which must lie inside the allocated part of
/// `belt`. Objects overlapping the card are found through the side table.
pub fn for_each_slot_in_card<VM: VMBinding, F>(
    belts: &BeltManager,
    belt: BeltId,
    card: Range<Address>,
    mut f: F,
) where
    F: FnMut(VM::VMSlot),
{
    let lower_bound = belts.belt(belt).start();
    let Some(mut cursor) = belts.side_table().find_object_start(card.start, lower_bound) else {
        return;
    };
    while cursor < card.end {
        let object = VM::VMObjectModel::address_to_ref(cursor);
        let size = VM::VMObjectModel::get_current_size(object);
        if cursor + size > card.start {
            VM::VMScanning::scan_object(object, &mut |slot: VM::VMSlot| {
                if card.contains(&slot.to_address()) {
                    f(slot);
                }
            });
        }
        cursor += size;
    }
}
