use super::{check_capacity, epilogue, prologue, CollectorKind, GcCycle};
use crate::heap::Heap;
use crate::plan::scavenger::Evacuation;
use crate::policy::BeltId;
use crate::util::error::AllocationError;
use crate::vm::VMBinding;

/// Minor collection: evacuate eden into to-space. Dirty cards over the pre-existing part of
/// to-space and over mature are extra roots.
pub(super) fn collect<VM: VMBinding>(
    heap: &Heap<VM>,
    cycle: &mut GcCycle<VM::VMSlot>,
) -> Result<(), AllocationError> {
    let belts = heap.belts();
    let to_space = belts.belt(BeltId::ToSpace);
    let mature = belts.belt(BeltId::Mature);

    to_space.set_allocation_mark_snapshot();
    let evacuation = Evacuation::new(BeltId::Eden, BeltId::ToSpace)
        .with_cards(
            BeltId::ToSpace,
            to_space.start()..to_space.allocation_mark_snapshot(),
        )
        .with_cards(BeltId::Mature, mature.start()..mature.allocation_mark());
    let evacuation = check_capacity(heap, evacuation)?;

    prologue(heap, CollectorKind::Eden, &evacuation);
    let result = heap.scavenger().scavenge(heap, &evacuation);
    belts.reset_belt(BeltId::Eden);
    epilogue(heap, CollectorKind::Eden, &evacuation, &result);
    cycle.absorb(result);
    Ok(())
}
