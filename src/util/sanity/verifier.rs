use crate::policy::{BeltId, BeltManager};
use crate::util::constants::BYTES_IN_WORD;
use crate::util::error::HeapCorruption;
use crate::util::object_forwarding;
use crate::util::ObjectReference;
use crate::vm::slot::Slot;
use crate::vm::{ObjectModel, Scanning, VMBinding};

/// What a successful walk of a belt found.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub objects: usize,
    pub bytes: usize,
    pub references: usize,
}

/// Walk every object in `[start, allocation_mark)` of belt `id` and check that
///
/// * the belt bounds hold: `start <= allocation_mark <= end`,
/// * objects tile the allocated range: each is word-aligned, has a non-zero size and ends at or
///   before the allocation mark,
/// * no header holds a forwarding record,
/// * every reference is null or points at an unforwarded object in the allocated part of some
///   belt,
/// * the side table records the first object start of every chunk an object starts in.
///
/// The walk reads the heap only, so verifying an unchanged belt twice gives the same result.
pub fn verify_belt<VM: VMBinding>(
    belts: &BeltManager,
    id: BeltId,
) -> Result<VerifyReport, HeapCorruption> {
    let belt = belts.belt(id);
    let name = belt.name();
    let (start, mark, end) = (belt.start(), belt.allocation_mark(), belt.end());
    if !(start <= mark && mark <= end) {
        return Err(HeapCorruption::BeltBounds {
            belt: name,
            start,
            mark,
            end,
        });
    }

    let side_table = belts.side_table();
    let mut report = VerifyReport::default();
    let mut last_chunk = None;
    let mut cursor = start;
    while cursor < mark {
        let object = VM::VMObjectModel::address_to_ref(cursor);
        if object_forwarding::is_forwarded_or_being_forwarded::<VM>(object) {
            return Err(HeapCorruption::UnresolvedForwarding { belt: name, object });
        }
        let size = VM::VMObjectModel::get_current_size(object);
        if size == 0
            || size % BYTES_IN_WORD != 0
            || !cursor.is_word_aligned()
            || cursor + size > mark
        {
            return Err(HeapCorruption::ObjectLayout {
                belt: name,
                object,
                size,
            });
        }

        let chunk = side_table.chunk_index(cursor);
        if last_chunk != Some(chunk) {
            if side_table.first_object_in_chunk(chunk) != Some(cursor) {
                return Err(HeapCorruption::SideTable { belt: name, object });
            }
            last_chunk = Some(chunk);
        }

        let mut dangling = None;
        VM::VMScanning::scan_object(object, &mut |slot: VM::VMSlot| {
            let Some(target) = slot.load() else {
                return;
            };
            report.references += 1;
            if dangling.is_none() && !is_live_reference::<VM>(belts, target) {
                dangling = Some((slot.to_address(), target));
            }
        });
        if let Some((slot, target)) = dangling {
            VM::VMObjectModel::dump_object(object);
            return Err(HeapCorruption::DanglingReference {
                belt: name,
                holder: object,
                slot,
                target,
            });
        }

        report.objects += 1;
        report.bytes += size;
        cursor += size;
    }
    Ok(report)
}

fn is_live_reference<VM: VMBinding>(belts: &BeltManager, target: ObjectReference) -> bool {
    let addr = target.to_raw_address();
    match belts.belt_of(addr) {
        Some(id) => {
            belts.belt(id).is_allocated(addr)
                && !object_forwarding::is_forwarded_or_being_forwarded::<VM>(target)
        }
        None => false,
    }
}

/// Marked cards must all lie over belts.
pub fn verify_cards(belts: &BeltManager) -> Result<(), HeapCorruption> {
    let cards = belts.card_region();
    match cards
        .dirty_cards()
        .find(|index| belts.belt_of(cards.card_start(*index)).is_none())
    {
        Some(card) => Err(HeapCorruption::CardTable { card }),
        None => Ok(()),
    }
}
