//! A non-moving trace over the same edges an evacuation follows. Used to measure how many
//! donor bytes would survive before anything is copied.

use crate::heap::Heap;
use crate::plan::scavenger::{for_each_slot_in_card, Evacuation, RootSlots};
use crate::util::ObjectReference;
use crate::vm::slot::Slot;
use crate::vm::{ObjectModel, Scanning, VMBinding};
use std::collections::HashSet;

/// Visited set plus a work list, like a sanity trace, restricted to the donor belts.
struct DonorTrace<'a, VM: VMBinding> {
    heap: &'a Heap<VM>,
    evacuation: &'a Evacuation,
    visited: HashSet<ObjectReference>,
    queue: Vec<ObjectReference>,
    live_bytes: usize,
}

impl<'a, VM: VMBinding> DonorTrace<'a, VM> {
    fn visit_slot(&mut self, slot: VM::VMSlot) {
        let Some(object) = slot.load() else {
            return;
        };
        let belts = self.heap.belts();
        if self.evacuation.is_donor_address(belts, object.to_raw_address())
            && self.visited.insert(object)
        {
            self.live_bytes += VM::VMObjectModel::get_current_size(object);
            self.queue.push(object);
        }
    }
}

/// Bytes of donor objects reachable from the roots and from the dirty cards of `evacuation`,
/// following references through donor objects only. This is exactly what the evacuation
/// would copy. Nothing is modified.
pub fn reachable_donor_bytes<VM: VMBinding>(heap: &Heap<VM>, evacuation: &Evacuation) -> usize {
    let mut trace = DonorTrace {
        heap,
        evacuation,
        visited: HashSet::new(),
        queue: vec![],
        live_bytes: 0,
    };

    let mut roots = RootSlots::default();
    VM::VMScanning::scan_roots(&mut roots);
    for slot in roots.into_slots() {
        trace.visit_slot(slot);
    }

    let belts = heap.belts();
    for (belt, range) in evacuation.cards.iter() {
        belts
            .card_region()
            .for_each_dirty_card(range.clone(), |_, card| {
                for_each_slot_in_card::<VM, _>(belts, *belt, card, |slot| trace.visit_slot(slot));
            });
    }

    while let Some(object) = trace.queue.pop() {
        VM::VMScanning::scan_object(object, &mut |slot: VM::VMSlot| trace.visit_slot(slot));
    }

    trace!(
        "{} reachable objects ({} bytes) in {}",
        trace.visited.len(),
        trace.live_bytes,
        evacuation.donor_names()
    );
    trace.live_bytes
}
