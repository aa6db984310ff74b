use super::StrideMap;
use crate::util::constants::LOG_BYTES_IN_WORD;
use crate::util::Address;
use std::ops::Range;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};

/// No object starts in the chunk.
const NO_OBJECT: u16 = u16::MAX;

/// An object starts in the chunk.
const CHUNK_START: u8 = 0b01;
/// The chunk's card has been scanned in the current collection.
const CHUNK_SCAVENGED: u8 = 0b10;

/// Per-chunk record of the first object that starts in each chunk, plus a claim state used to
/// scan each dirty card once.
///
/// Allocation in a belt is contiguous, so knowing the first object start of a chunk is enough
/// to recover every object boundary: walk back to the nearest chunk with a recorded start, then
/// walk forward by object size. Chunks have the card stride.
pub struct SideTable {
    map: StrideMap,
    first_object: Box<[AtomicU16]>,
    state: Box<[AtomicU8]>,
}

impl SideTable {
    pub fn new(base: Address, size: usize, log_bytes_in_chunk: u8) -> Self {
        let map = StrideMap::new(base, size, log_bytes_in_chunk);
        SideTable {
            map,
            first_object: (0..map.count()).map(|_| AtomicU16::new(NO_OBJECT)).collect(),
            state: (0..map.count()).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    pub fn chunk_index(&self, addr: Address) -> usize {
        self.map.index_of(addr)
    }

    /// Record that an object starts at `start`. Safe to call from several workers at once.
    pub fn record_object_start(&self, start: Address) {
        debug_assert!(start.is_word_aligned());
        let index = self.map.index_of(start);
        let offset = ((start - self.map.start_of(index)) >> LOG_BYTES_IN_WORD) as u16;
        self.first_object[index].fetch_min(offset, Ordering::Relaxed);
        self.state[index].fetch_or(CHUNK_START, Ordering::Relaxed);
    }

    /// The first object start recorded in chunk `index`.
    pub fn first_object_in_chunk(&self, index: usize) -> Option<Address> {
        match self.first_object[index].load(Ordering::Relaxed) {
            NO_OBJECT => None,
            offset => Some(self.map.start_of(index) + ((offset as usize) << LOG_BYTES_IN_WORD)),
        }
    }

    /// The closest recorded object start at or below `addr`, searching no lower than
    /// `lower_bound`. The object found may end before `addr`; the caller walks forward from it.
    pub fn find_object_start(&self, addr: Address, lower_bound: Address) -> Option<Address> {
        let low = self.map.index_of(lower_bound);
        for index in (low..=self.map.index_of(addr)).rev() {
            match self.first_object_in_chunk(index) {
                Some(start) if start <= addr && start >= lower_bound => return Some(start),
                _ => {}
            }
        }
        None
    }

    /// Claim chunk `index` for scanning. Returns true for exactly one caller until
    /// [`SideTable::restore_all_chunk_slots`] runs.
    pub fn try_claim(&self, index: usize) -> bool {
        self.state[index].fetch_or(CHUNK_SCAVENGED, Ordering::AcqRel) & CHUNK_SCAVENGED == 0
    }

    pub fn is_scavenged(&self, index: usize) -> bool {
        self.state[index].load(Ordering::Relaxed) & CHUNK_SCAVENGED != 0
    }

    pub fn has_object_start(&self, index: usize) -> bool {
        self.state[index].load(Ordering::Relaxed) & CHUNK_START != 0
    }

    /// Return every claimed chunk to its unclaimed state.
    pub fn restore_all_chunk_slots(&self) {
        for state in self.state.iter() {
            state.fetch_and(!CHUNK_SCAVENGED, Ordering::Relaxed);
        }
    }

    /// Forget every object start in the chunks overlapping `range`.
    pub fn clear_range(&self, range: Range<Address>) {
        for index in self.map.indices(&range) {
            self.first_object[index].store(NO_OBJECT, Ordering::Relaxed);
            self.state[index].store(0, Ordering::Relaxed);
        }
    }
}
