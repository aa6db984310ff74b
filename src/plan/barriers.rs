//! The card-marking write barrier.
//!
//! The card is marked before the reference is stored. A collection can only start at a
//! safepoint, so a mutator parked between the two steps leaves a dirty card over a slot that
//! still holds its old value, which costs a rescan and is never unsafe.

use crate::policy::BeltManager;
use crate::util::{Address, ObjectReference};
use crate::vm::slot::Slot;
use crate::vm::VMBinding;
use std::marker::PhantomData;

/// Whether storing `target` into the slot at `slot` creates a reference from an older belt into
/// a younger one. Such stores must be recorded in the card table.
pub fn is_old_to_young(belts: &BeltManager, slot: Address, target: ObjectReference) -> bool {
    if target.is_null() {
        return false;
    }
    match (
        belts.belt_of(slot),
        belts.belt_of(target.to_raw_address()),
    ) {
        (Some(holder), Some(referent)) => holder.is_older_than(referent),
        _ => false,
    }
}

pub struct CardMarkingBarrier<'a, VM: VMBinding> {
    belts: &'a BeltManager,
    phantom: PhantomData<VM>,
}

impl<'a, VM: VMBinding> CardMarkingBarrier<'a, VM> {
    pub fn new(belts: &'a BeltManager) -> Self {
        CardMarkingBarrier {
            belts,
            phantom: PhantomData,
        }
    }

    /// Store `target` into `slot`, a field of `src`, marking the slot's card first when the
    /// store crosses from an older belt into a younger one.
    pub fn object_reference_write(
        &self,
        src: ObjectReference,
        slot: VM::VMSlot,
        target: ObjectReference,
    ) {
        self.object_reference_write_pre(src, slot, target);
        slot.store(target);
    }

    fn object_reference_write_pre(
        &self,
        src: ObjectReference,
        slot: VM::VMSlot,
        target: ObjectReference,
    ) {
        let slot_addr = slot.to_address();
        if is_old_to_young(self.belts, slot_addr, target) {
            trace!("mark card for {}.{} -> {}", src, slot_addr, target);
            self.belts.card_region().mark_card(slot_addr);
        }
    }
}
