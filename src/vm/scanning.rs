use crate::util::ObjectReference;
use crate::vm::slot::Slot;
use crate::vm::VMBinding;

/// Callback trait of scanning functions that report slots.
pub trait SlotVisitor<SL: Slot> {
    /// Call this function for each slot.
    fn visit_slot(&mut self, slot: SL);
}

/// This lets us use closures as SlotVisitor.
impl<SL: Slot, F: FnMut(SL)> SlotVisitor<SL> for F {
    fn visit_slot(&mut self, slot: SL) {
        self(slot)
    }
}

/// Root-scanning methods use this trait to hand root slots to the collector. The runtime may
/// report its roots in as many batches as it likes; each batch becomes one unit of work.
pub trait RootsWorkFactory<SL: Slot> {
    /// Report a batch of root slots. The collector may update the slots.
    fn create_process_roots_work(&mut self, slots: Vec<SL>);
}

/// VM-specific methods for scanning roots and objects.
pub trait Scanning<VM: VMBinding> {
    /// Report every reference-holding slot of `object`, null slots included.
    ///
    /// Arguments:
    /// * `object`: The object to scan.
    /// * `slot_visitor`: Called back for each slot.
    fn scan_object<SV: SlotVisitor<VM::VMSlot>>(object: ObjectReference, slot_visitor: &mut SV);

    /// Report all roots (thread stacks, globals). Called on the thread that requested the
    /// collection, after every mutator has been stopped.
    ///
    /// Arguments:
    /// * `factory`: Receives the root slots.
    fn scan_roots(factory: &mut impl RootsWorkFactory<VM::VMSlot>);
}
