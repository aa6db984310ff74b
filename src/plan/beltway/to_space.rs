use super::{check_capacity, epilogue, prologue, CollectorKind, GcCycle};
use crate::heap::Heap;
use crate::plan::scavenger::Evacuation;
use crate::policy::BeltId;
use crate::util::error::AllocationError;
use crate::vm::VMBinding;

/// Promote to-space into mature. Mature's mark is snapshotted first, so only objects already
/// in mature are scanned through their cards; promoted objects are scanned by the scavenger.
pub(super) fn collect<VM: VMBinding>(
    heap: &Heap<VM>,
    cycle: &mut GcCycle<VM::VMSlot>,
) -> Result<(), AllocationError> {
    let belts = heap.belts();
    let mature = belts.belt(BeltId::Mature);

    mature.set_allocation_mark_snapshot();
    let evacuation = Evacuation::new(BeltId::ToSpace, BeltId::Mature)
        .with_cards(BeltId::Mature, mature.start()..mature.allocation_mark_snapshot());
    let evacuation = check_capacity(heap, evacuation)?;

    prologue(heap, CollectorKind::ToSpace, &evacuation);
    let result = heap.scavenger().scavenge(heap, &evacuation);
    belts.reset_belt(BeltId::ToSpace);
    epilogue(heap, CollectorKind::ToSpace, &evacuation, &result);
    cycle.absorb(result);
    Ok(())
}
