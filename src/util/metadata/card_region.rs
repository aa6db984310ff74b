use super::StrideMap;
use crate::util::Address;
use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};

const CLEAN: u8 = 0;
const DIRTY: u8 = 1;

/// One byte per card over the whole heap. A dirty card may hold a reference from an older belt
/// into a younger one, stored since the last [`CardRegion::clear_all`].
///
/// Cards are written by mutators through the write barrier and read by the collector while the
/// world is stopped. The safepoint orders the two, so relaxed accesses are enough.
pub struct CardRegion {
    map: StrideMap,
    cards: Box<[AtomicU8]>,
}

impl CardRegion {
    pub fn new(base: Address, size: usize, log_bytes_in_card: u8) -> Self {
        let map = StrideMap::new(base, size, log_bytes_in_card);
        let cards = (0..map.count()).map(|_| AtomicU8::new(CLEAN)).collect();
        CardRegion { map, cards }
    }

    pub fn bytes_in_card(&self) -> usize {
        self.map.bytes_in_stride()
    }

    pub fn card_index(&self, addr: Address) -> usize {
        self.map.index_of(addr)
    }

    pub fn card_start(&self, index: usize) -> Address {
        self.map.start_of(index)
    }

    /// Mark the card covering `addr`. Marking outside the heap means the barrier was handed a
    /// slot the heap does not own, which is fatal.
    pub fn mark_card(&self, addr: Address) {
        if !self.map.covers(addr) {
            panic!("Attempt to mark card for {} outside of the card region", addr);
        }
        self.cards[self.map.index_of(addr)].store(DIRTY, Ordering::Relaxed);
    }

    pub fn is_card_marked(&self, addr: Address) -> bool {
        self.map.covers(addr) && self.cards[self.map.index_of(addr)].load(Ordering::Relaxed) == DIRTY
    }

    /// Call `visitor` with the index and the byte range of every dirty card overlapping `range`.
    /// The byte range is clipped to `range`.
    pub fn for_each_dirty_card<F>(&self, range: Range<Address>, mut visitor: F)
    where
        F: FnMut(usize, Range<Address>),
    {
        for index in self.map.indices(&range) {
            if self.cards[index].load(Ordering::Relaxed) == DIRTY {
                let card = self.map.stride_range(index);
                visitor(index, Address::range_intersection(&card, &range));
            }
        }
    }

    /// Indices of all dirty cards.
    pub fn dirty_cards(&self) -> impl Iterator<Item = usize> + '_ {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, card)| card.load(Ordering::Relaxed) == DIRTY)
            .map(|(index, _)| index)
    }

    pub fn clear_range(&self, range: Range<Address>) {
        for index in self.map.indices(&range) {
            self.cards[index].store(CLEAN, Ordering::Relaxed);
        }
    }

    pub fn clear_all(&self) {
        for card in self.cards.iter() {
            card.store(CLEAN, Ordering::Relaxed);
        }
    }
}
