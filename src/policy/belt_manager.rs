use crate::policy::belt::{Belt, BeltId};
use crate::util::conversions::raw_align_down;
use crate::util::error::AllocationError;
use crate::util::memory;
use crate::util::metadata::{CardRegion, SideTable};
use crate::util::options::BeltPercentages;
use crate::util::statistics::BeltStats;
use crate::util::Address;
use enum_map::{enum_map, EnumMap};
use std::ops::Range;

/// Owns the belts, laid out youngest first in one contiguous region, together with the card
/// region and the side table covering that region.
///
/// ```text
/// | eden | to-space | mature | unused |
/// ^ start                             ^ start + size
/// ```
///
/// Eden may grow over to-space up to the start of mature while a major collection evacuates
/// into it.
pub struct BeltManager {
    belts: EnumMap<BeltId, Belt>,
    start: Address,
    size: usize,
    card_region: CardRegion,
    side_table: SideTable,
}

impl BeltManager {
    /// Split `heap_size` bytes by `percentages`, each belt rounded down to the card size. Fails if
    /// a belt would not get a single card.
    pub fn compute_extents(
        heap_size: usize,
        percentages: &BeltPercentages,
        log_bytes_in_card: u8,
    ) -> Result<EnumMap<BeltId, usize>, AllocationError> {
        // heap_size * pct / 100, without overflowing for large heaps.
        let share = |pct: usize| heap_size / 100 * pct + heap_size % 100 * pct / 100;
        let extent = |pct: usize| raw_align_down(share(pct), 1 << log_bytes_in_card);
        let extents = enum_map! {
            BeltId::Eden => extent(percentages.eden),
            BeltId::ToSpace => extent(percentages.to_space),
            BeltId::Mature => extent(percentages.mature),
        };
        match extents.iter().find(|(_, extent)| **extent == 0) {
            Some((belt, _)) => Err(AllocationError::HeapTooSmall { belt }),
            None => Ok(extents),
        }
    }

    /// Create the belts in `[start, start + size)` with the given extents. The region must be
    /// mapped and aligned to the card size, and large enough for the belts.
    pub fn new(
        start: Address,
        size: usize,
        extents: &EnumMap<BeltId, usize>,
        log_bytes_in_card: u8,
    ) -> Self {
        let to_start = start + extents[BeltId::Eden];
        let mature_start = to_start + extents[BeltId::ToSpace];
        let mature_end = mature_start + extents[BeltId::Mature];
        debug_assert!(mature_end <= start + size);

        let belts = enum_map! {
            BeltId::Eden => Belt::new(BeltId::Eden, start, extents[BeltId::Eden], mature_start),
            BeltId::ToSpace => Belt::new(BeltId::ToSpace, to_start, extents[BeltId::ToSpace], mature_start),
            BeltId::Mature => Belt::new(BeltId::Mature, mature_start, extents[BeltId::Mature], mature_end),
        };
        for (_, belt) in belts.iter() {
            debug!("Created belt {:?}", belt);
        }

        BeltManager {
            belts,
            start,
            size,
            card_region: CardRegion::new(start, size, log_bytes_in_card),
            side_table: SideTable::new(start, size, log_bytes_in_card),
        }
    }

    pub fn belt(&self, id: BeltId) -> &Belt {
        &self.belts[id]
    }

    pub fn belts(&self) -> impl Iterator<Item = &Belt> {
        self.belts.values()
    }

    pub fn card_region(&self) -> &CardRegion {
        &self.card_region
    }

    pub fn side_table(&self) -> &SideTable {
        &self.side_table
    }

    /// The mapped region backing the belts.
    pub fn mapped_range(&self) -> Range<Address> {
        self.start..self.start + self.size
    }

    /// The managed heap: the union of all belts.
    pub fn heap_range(&self) -> Range<Address> {
        self.belts[BeltId::Eden].start()..self.belts[BeltId::Mature].end()
    }

    pub fn is_in_heap(&self, addr: Address) -> bool {
        self.heap_range().contains(&addr)
    }

    /// The belt whose `[start, end)` contains `addr`.
    pub fn belt_of(&self, addr: Address) -> Option<BeltId> {
        self.belts().find(|belt| belt.contains(addr)).map(Belt::id)
    }

    /// Allocate `size` bytes in belt `id` and record the object start.
    pub fn allocate(&self, id: BeltId, size: usize) -> Option<Address> {
        let result = self.belts[id].allocate(size)?;
        self.side_table.record_object_start(result);
        Some(result)
    }

    /// Empty belt `id`: forget its object starts and cards, zero its storage and reset its mark.
    pub fn reset_belt(&self, id: BeltId) {
        let belt = &self.belts[id];
        let used = belt.start()..belt.allocation_mark();
        debug!("Reset {:?}", belt);
        self.side_table.clear_range(used.clone());
        self.card_region.clear_range(used.clone());
        memory::zero(used.start, used.end - used.start);
        belt.reset_allocation_mark();
    }

    pub fn stats(&self, id: BeltId) -> BeltStats {
        let belt = &self.belts[id];
        BeltStats {
            belt: id,
            start: belt.start(),
            end: belt.end(),
            allocation_mark: belt.allocation_mark(),
            used: belt.used(),
            remaining: belt.remaining(),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.belts().map(Belt::used).sum()
    }

    pub fn free_bytes(&self) -> usize {
        self.belts().map(Belt::remaining).sum()
    }
}

impl Drop for BeltManager {
    fn drop(&mut self) {
        if let Err(e) = memory::munmap(self.start, self.size) {
            warn!("Failed to unmap heap at {}: {}", self.start, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::*;

    #[test]
    fn extents_rounded_to_cards() {
        let extents =
            BeltManager::compute_extents(10 * BYTES_IN_KBYTE, &BeltPercentages::new(10, 20, 40), 9)
                .unwrap();
        assert_eq!(extents[BeltId::Eden], 1024);
        assert_eq!(extents[BeltId::ToSpace], 2048);
        assert_eq!(extents[BeltId::Mature], 4096);

        let extents = BeltManager::compute_extents(
            64 * BYTES_IN_MBYTE,
            &BeltPercentages::default(),
            DEFAULT_LOG_BYTES_IN_CARD,
        )
        .unwrap();
        assert_eq!(extents[BeltId::Eden] % 512, 0);
        assert_eq!(extents[BeltId::Mature], 32 * BYTES_IN_MBYTE);
    }

    #[test]
    fn extents_of_huge_heap_do_not_overflow() {
        let heap_size = usize::MAX >> 1;
        let extents =
            BeltManager::compute_extents(heap_size, &BeltPercentages::new(10, 40, 50), 9).unwrap();
        assert!(extents[BeltId::Eden] <= heap_size / 10 + 1);
        assert!(extents[BeltId::Mature] > heap_size / 2 - 512);
        let total = extents
            .values()
            .try_fold(0usize, |sum, extent| sum.checked_add(*extent))
            .unwrap();
        assert!(total <= heap_size);
    }

    #[test]
    fn empty_belt_is_an_error() {
        // 10% of one page is less than a 512-byte card.
        assert_eq!(
            BeltManager::compute_extents(BYTES_IN_PAGE, &BeltPercentages::default(), 9),
            Err(AllocationError::HeapTooSmall { belt: BeltId::Eden })
        );
        assert!(BeltManager::compute_extents(BYTES_IN_PAGE, &BeltPercentages::default(), 6).is_ok());
    }

    fn manager() -> BeltManager {
        let size = 3 * BYTES_IN_PAGE;
        let start = memory::dzmmap_anywhere(size).unwrap();
        let extents =
            BeltManager::compute_extents(10 * BYTES_IN_KBYTE, &BeltPercentages::new(10, 20, 40), 9)
                .unwrap();
        BeltManager::new(start, size, &extents, 9)
    }

    #[test]
    fn layout_is_contiguous() {
        let manager = manager();
        let eden = manager.belt(BeltId::Eden);
        let to = manager.belt(BeltId::ToSpace);
        let mature = manager.belt(BeltId::Mature);
        assert_eq!(eden.end(), to.start());
        assert_eq!(to.end(), mature.start());
        assert_eq!(eden.limit(), mature.start());
        assert_eq!(manager.heap_range(), eden.start()..mature.end());
        assert_eq!(manager.belt_of(to.start() + 8usize), Some(BeltId::ToSpace));
        assert_eq!(manager.belt_of(mature.end()), None);
        assert!(!manager.is_in_heap(mature.end()));
        assert_eq!(manager.free_bytes(), 7 * BYTES_IN_KBYTE);
    }

    #[test]
    fn allocate_records_start_and_reset_clears() {
        let manager = manager();
        let a = manager.allocate(BeltId::ToSpace, 64).unwrap();
        unsafe { a.store::<usize>(0xdead) };
        let index = manager.side_table().chunk_index(a);
        assert_eq!(manager.side_table().first_object_in_chunk(index), Some(a));
        manager.card_region().mark_card(a);
        assert_eq!(manager.used_bytes(), 64);

        manager.reset_belt(BeltId::ToSpace);
        assert!(manager.belt(BeltId::ToSpace).is_empty());
        assert_eq!(manager.side_table().first_object_in_chunk(index), None);
        assert!(!manager.card_region().is_card_marked(a));
        assert_eq!(unsafe { a.load::<usize>() }, 0);
    }
}
