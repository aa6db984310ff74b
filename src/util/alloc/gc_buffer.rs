use crate::policy::Belt;
use crate::util::constants::BYTES_IN_WORD;
use crate::util::conversions::raw_align_down;
use crate::util::metadata::SideTable;
use crate::util::Address;
use crate::vm::{ObjectModel, VMBinding};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Buffer sizing for one evacuation, shared by all of its evacuators.
///
/// The slack of an evacuation is what its destination can hold beyond the bound on the bytes it
/// copies. Each evacuator holds at most one buffer of `buffer_bytes` at a time, and a tail filled
/// while copying is still going on is charged to the waste budget, so the buffers together never
/// take more than the slack:
///
/// ```text
/// copied + filled tails + unused buffer space <= bound + waste + evacuators * buffer_bytes
///                                             == available
/// ```
#[derive(Debug)]
pub struct BufferSizing {
    buffer_bytes: usize,
    waste: AtomicUsize,
}

impl BufferSizing {
    /// `available` is the room in the destination before copying starts, and `survivor_bound`
    /// bounds the bytes the evacuation copies.
    pub fn new(
        available: usize,
        survivor_bound: usize,
        max_buffer_bytes: usize,
        evacuators: usize,
    ) -> Self {
        debug_assert!(evacuators > 0);
        let slack = available.saturating_sub(survivor_bound);
        let buffer_bytes = raw_align_down(max_buffer_bytes.min(slack / evacuators), BYTES_IN_WORD);
        BufferSizing {
            buffer_bytes,
            waste: AtomicUsize::new(slack - buffer_bytes * evacuators),
        }
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    pub fn waste_left(&self) -> usize {
        self.waste.load(Ordering::Relaxed)
    }

    fn charge_waste(&self, bytes: usize) -> bool {
        self.waste
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| left.checked_sub(bytes))
            .is_ok()
    }
}

/// A bump-pointer buffer reserved in a destination belt by one evacuator. Copies go to
/// `[cursor, limit)`. The buffer is inactive when `limit` is zero.
#[derive(Debug)]
pub struct GcBuffer {
    cursor: Address,
    limit: Address,
    /// Side-table chunk of the last object start placed in this buffer.
    last_chunk: Option<usize>,
}

impl Default for GcBuffer {
    fn default() -> Self {
        GcBuffer {
            cursor: Address::ZERO,
            limit: Address::ZERO,
            last_chunk: None,
        }
    }
}

impl GcBuffer {
    pub fn is_active(&self) -> bool {
        !self.limit.is_zero()
    }

    pub fn cursor(&self) -> Address {
        self.cursor
    }

    pub fn limit(&self) -> Address {
        self.limit
    }

    fn set_limit(&mut self, cursor: Address, limit: Address) {
        self.cursor = cursor;
        self.limit = limit;
        self.last_chunk = None;
    }

    fn reset(&mut self) {
        self.set_limit(Address::ZERO, Address::ZERO);
    }

    /// Bump-allocate `size` bytes, or `None` if the buffer cannot hold them.
    ///
    /// Only the first object start of each chunk is written to the side table. Buffers of
    /// different evacuators may share a chunk; the side table keeps the lowest start.
    pub fn alloc(&mut self, size: usize, side_table: &SideTable) -> Option<Address> {
        let result = self.cursor;
        if !self.is_active() || result + size > self.limit {
            return None;
        }
        self.cursor = result + size;
        self.note_object_start(result, side_table);
        Some(result)
    }

    fn note_object_start(&mut self, start: Address, side_table: &SideTable) {
        let chunk = side_table.chunk_index(start);
        if self.last_chunk != Some(chunk) {
            side_table.record_object_start(start);
            self.last_chunk = Some(chunk);
        }
    }

    /// Reserve a fresh buffer of `bytes` at the allocation mark of `belt`.
    pub fn refill(&mut self, belt: &Belt, bytes: usize) -> bool {
        debug_assert!(!self.is_active());
        match belt.allocate(bytes) {
            Some(start) => {
                trace!("New GC buffer [{}, {}) in {}", start, start + bytes, belt.name());
                self.set_limit(start, start + bytes);
                true
            }
            None => false,
        }
    }

    /// Let go of the buffer. A tail that still ends at the belt's allocation mark is handed back
    /// to the belt. Any other tail is overwritten with a dead object so the belt stays walkable.
    ///
    /// While copying is in progress `sizing` is given, and a filled tail is charged to its waste
    /// budget. If the budget cannot pay for the tail the buffer is kept and this returns false.
    pub fn retire<VM: VMBinding>(
        &mut self,
        belt: &Belt,
        side_table: &SideTable,
        sizing: Option<&BufferSizing>,
    ) -> bool {
        if !self.is_active() {
            return true;
        }
        let tail = self.limit - self.cursor;
        if tail > 0 && !belt.retract(self.limit, self.cursor) {
            if let Some(sizing) = sizing {
                if !sizing.charge_waste(tail) {
                    return false;
                }
            }
            trace!("Fill {} bytes at {} in {}", tail, self.cursor, belt.name());
            VM::VMObjectModel::fill_gap(self.cursor, tail);
            self.note_object_start(self.cursor, side_table);
        }
        self.reset();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BeltId, BeltManager};
    use crate::util::constants::BYTES_IN_PAGE;
    use crate::util::memory;
    use crate::util::options::BeltPercentages;
    use crate::util::test_util::mock_vm::{is_filler, object_size, MockVM};
    use crate::util::ObjectReference;

    fn manager() -> BeltManager {
        let size = 4 * BYTES_IN_PAGE;
        let start = memory::dzmmap_anywhere(size).unwrap();
        let extents =
            BeltManager::compute_extents(size, &BeltPercentages::new(10, 20, 50), 9).unwrap();
        BeltManager::new(start, size, &extents, 9)
    }

    #[test]
    fn sizing_leaves_room_for_survivors() {
        let sizing = BufferSizing::new(1000, 400, 4096, 4);
        assert_eq!(sizing.buffer_bytes(), 144);
        assert_eq!(sizing.waste_left(), 600 - 4 * 144);

        let capped = BufferSizing::new(1 << 20, 0, 4096, 2);
        assert_eq!(capped.buffer_bytes(), 4096);

        // No bound known: no buffers.
        let unbounded = BufferSizing::new(1000, usize::MAX, 4096, 1);
        assert_eq!(unbounded.buffer_bytes(), 0);
        assert_eq!(unbounded.waste_left(), 0);
    }

    #[test]
    fn tail_at_mark_is_returned() {
        let manager = manager();
        let belt = manager.belt(BeltId::Mature);
        let mut buffer = GcBuffer::default();
        assert!(buffer.alloc(8, manager.side_table()).is_none());

        assert!(buffer.refill(belt, 256));
        assert_eq!(buffer.alloc(64, manager.side_table()), Some(belt.start()));
        assert_eq!(belt.allocation_mark(), belt.start() + 256usize);
        assert!(buffer.retire::<MockVM>(belt, manager.side_table(), None));
        assert!(!buffer.is_active());
        assert_eq!(belt.allocation_mark(), belt.start() + 64usize);
    }

    #[test]
    fn tail_below_mark_is_filled() {
        let manager = manager();
        let belt = manager.belt(BeltId::Mature);
        let sizing = BufferSizing::new(belt.available(), 0, 256, 2);
        let mut buffer = GcBuffer::default();
        assert!(buffer.refill(belt, 256));
        buffer.alloc(40, manager.side_table()).unwrap();
        // Another evacuator allocates past the buffer.
        manager.allocate(BeltId::Mature, 64).unwrap();

        let waste = sizing.waste_left();
        assert!(buffer.retire::<MockVM>(belt, manager.side_table(), Some(&sizing)));
        assert_eq!(sizing.waste_left(), waste - 216);
        let filler = ObjectReference::from_raw_address(belt.start() + 40usize);
        assert!(is_filler(filler));
        assert_eq!(object_size(filler), 216);
        assert_eq!(belt.allocation_mark(), belt.start() + 320usize);
    }

    #[test]
    fn buffer_kept_when_waste_is_spent() {
        let manager = manager();
        let belt = manager.belt(BeltId::Mature);
        // Slack of exactly one buffer: nothing left to waste.
        let sizing = BufferSizing::new(256, 0, 256, 1);
        assert_eq!(sizing.waste_left(), 0);
        let mut buffer = GcBuffer::default();
        assert!(buffer.refill(belt, 256));
        buffer.alloc(64, manager.side_table()).unwrap();
        manager.allocate(BeltId::Mature, 64).unwrap();

        assert!(!buffer.retire::<MockVM>(belt, manager.side_table(), Some(&sizing)));
        assert!(buffer.is_active());
        assert_eq!(buffer.cursor(), belt.start() + 64usize);
        // At the end of copying the tail is filled regardless.
        assert!(buffer.retire::<MockVM>(belt, manager.side_table(), None));
        assert!(is_filler(ObjectReference::from_raw_address(belt.start() + 64usize)));
    }

    #[test]
    fn first_start_in_each_chunk_is_recorded() {
        let manager = manager();
        let belt = manager.belt(BeltId::Mature);
        let side_table = manager.side_table();
        let mut buffer = GcBuffer::default();
        assert!(buffer.refill(belt, 1024));
        for _ in 0..5 {
            buffer.alloc(200, side_table).unwrap();
        }
        let first_chunk = side_table.chunk_index(belt.start());
        assert_eq!(side_table.first_object_in_chunk(first_chunk), Some(belt.start()));
        assert_eq!(
            side_table.first_object_in_chunk(first_chunk + 1),
            Some(belt.start() + 600usize)
        );
        assert!(side_table.first_object_in_chunk(first_chunk + 2).is_none());
    }
}
