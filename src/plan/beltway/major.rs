use super::{check_fits, epilogue, prologue, CollectorKind, GcCycle};
use crate::heap::Heap;
use crate::plan::scavenger::Evacuation;
use crate::policy::BeltId;
use crate::util::error::AllocationError;
use crate::vm::VMBinding;

/// Full collection in two legs. Mature is evacuated into eden, which may grow over the empty
/// to-space up to the start of mature. Mature is then reset, and eden is evacuated back into
/// it. Finally eden is reset to its steady-state extent.
///
/// Eden must be empty: a major collection always follows an eden collection. If to-space still
/// holds objects because mature could not take them, to-space is a donor too and eden cannot
/// grow over it.
pub(super) fn collect<VM: VMBinding>(
    heap: &Heap<VM>,
    cycle: &mut GcCycle<VM::VMSlot>,
) -> Result<(), AllocationError> {
    let belts = heap.belts();
    let eden = belts.belt(BeltId::Eden);
    let to_space = belts.belt(BeltId::ToSpace);
    let mature = belts.belt(BeltId::Mature);
    assert!(
        eden.is_empty(),
        "Major collection with a live eden: {:?}",
        eden
    );

    // Everything reachable moves twice, so it has to fit in the eden reserve and back in mature.
    let mut to_eden = Evacuation::new(BeltId::Mature, BeltId::Eden);
    if to_space.is_empty() {
        eden.set_expandable(true);
    } else {
        to_eden = to_eden.with_donor(BeltId::ToSpace);
    }
    eden.set_allocation_mark_snapshot();
    let available = eden.available().min(mature.extent());
    let to_eden = match check_fits(heap, to_eden, available) {
        Ok(to_eden) => to_eden,
        Err(e) => {
            eden.set_expandable(false);
            return Err(e);
        }
    };

    prologue(heap, CollectorKind::Major, &to_eden);
    let mut result = heap.scavenger().scavenge(heap, &to_eden);
    for donor in to_eden.donors.iter() {
        belts.reset_belt(*donor);
    }
    if heap.options().verify_heap {
        super::verify_or_die(heap, BeltId::Eden, "between major");
    }

    mature.set_allocation_mark_snapshot();
    let to_mature =
        Evacuation::new(BeltId::Eden, BeltId::Mature).with_survivor_bound(result.bytes_copied);
    let second_leg = heap.scavenger().scavenge(heap, &to_mature);
    belts.reset_belt(BeltId::Eden);
    eden.set_expandable(false);
    eden.set_end(to_space.start());
    result.merge(second_leg);

    epilogue(heap, CollectorKind::Major, &to_mature, &result);
    cycle.major_ran();
    Ok(())
}
