//! Side metadata kept per fixed-size stride of the heap: the card table written by the write
//! barrier, and the side table that records object starts for each chunk.
//!
//! Cards and side-table chunks have the same stride, so card `i` and chunk `i` cover the same
//! bytes.

pub mod card_region;
pub mod side_table;

pub use card_region::CardRegion;
pub use side_table::SideTable;

use crate::util::Address;
use std::ops::Range;

/// Maps addresses of a contiguous region onto fixed-size, power-of-two strides.
#[derive(Copy, Clone, Debug)]
pub struct StrideMap {
    base: Address,
    limit: Address,
    log_bytes_in_stride: u8,
}

impl StrideMap {
    pub fn new(base: Address, size: usize, log_bytes_in_stride: u8) -> Self {
        debug_assert!(base.is_aligned_to(1 << log_bytes_in_stride));
        StrideMap {
            base,
            limit: base + size,
            log_bytes_in_stride,
        }
    }

    pub const fn bytes_in_stride(&self) -> usize {
        1 << self.log_bytes_in_stride
    }

    pub fn log_bytes_in_stride(&self) -> u8 {
        self.log_bytes_in_stride
    }

    /// Number of strides needed to cover the region.
    pub fn count(&self) -> usize {
        (self.limit - self.base).div_ceil(self.bytes_in_stride())
    }

    pub fn covers(&self, addr: Address) -> bool {
        self.base <= addr && addr < self.limit
    }

    pub fn index_of(&self, addr: Address) -> usize {
        debug_assert!(self.covers(addr), "{} is outside {}..{}", addr, self.base, self.limit);
        (addr - self.base) >> self.log_bytes_in_stride
    }

    pub fn start_of(&self, index: usize) -> Address {
        self.base + (index << self.log_bytes_in_stride)
    }

    /// The byte range of stride `index`.
    pub fn stride_range(&self, index: usize) -> Range<Address> {
        let start = self.start_of(index);
        start..start + self.bytes_in_stride()
    }

    /// Indices of every stride that overlaps `range`.
    pub fn indices(&self, range: &Range<Address>) -> Range<usize> {
        if range.start >= range.end {
            return 0..0;
        }
        self.index_of(range.start)..self.index_of(range.end - 1usize) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_indices() {
        let base = unsafe { Address::from_usize(0x10000) };
        let map = StrideMap::new(base, 0x1000 + 10, 9);
        assert_eq!(map.count(), 9);
        assert_eq!(map.index_of(base), 0);
        assert_eq!(map.index_of(base + 511usize), 0);
        assert_eq!(map.index_of(base + 512usize), 1);
        assert_eq!(map.start_of(3), base + 1536usize);
        assert_eq!(map.indices(&(base + 100usize..base + 1025usize)), 0..3);
        assert_eq!(map.indices(&(base..base)), 0..0);
        assert!(!map.covers(base + 0x2000usize));
    }
}
