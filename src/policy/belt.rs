use crate::util::constants::BYTES_IN_WORD;
use crate::util::Address;
use atomic::Atomic;
use enum_map::Enum;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use strum_macros::{EnumIter, IntoStaticStr};

/// The belts of the heap, youngest first. Declaration order is age order.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Enum, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum BeltId {
    Eden,
    ToSpace,
    Mature,
}

impl BeltId {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// A store of a reference from a belt into a younger belt must be recorded in the card table.
    pub fn is_older_than(self, other: BeltId) -> bool {
        self > other
    }
}

/// A contiguous region with a bump-pointer allocator.
///
/// `start <= allocation_mark <= end` always holds. Only a collection moves `end` or toggles
/// `expandable`. Allocation is a CAS on the mark, so collector workers may allocate into the
/// same destination belt concurrently.
pub struct Belt {
    id: BeltId,
    start: Address,
    end: Atomic<Address>,
    allocation_mark: Atomic<Address>,
    /// Allocation mark recorded before a collection starts copying into this belt.
    snapshot: Atomic<Address>,
    expandable: AtomicBool,
    /// Highest `end` an expandable belt may grow to.
    limit: Address,
}

impl Belt {
    pub fn new(id: BeltId, start: Address, extent: usize, limit: Address) -> Self {
        let end = start + extent;
        debug_assert!(end <= limit);
        Belt {
            id,
            start,
            end: Atomic::new(end),
            allocation_mark: Atomic::new(start),
            snapshot: Atomic::new(start),
            expandable: AtomicBool::new(false),
            limit,
        }
    }

    pub fn id(&self) -> BeltId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Address {
        self.limit
    }

    pub fn allocation_mark(&self) -> Address {
        self.allocation_mark.load(Ordering::Acquire)
    }

    pub fn is_expandable(&self) -> bool {
        self.expandable.load(Ordering::Relaxed)
    }

    /// Bump-allocate `size` bytes and return the old allocation mark, or `None` if the belt
    /// (grown up to its limit if expandable) cannot hold them.
    pub fn allocate(&self, size: usize) -> Option<Address> {
        debug_assert!(size > 0 && size % BYTES_IN_WORD == 0);
        let mut mark = self.allocation_mark.load(Ordering::Relaxed);
        loop {
            let new_mark = mark + size;
            if new_mark > self.end() && !self.try_expand(new_mark) {
                return None;
            }
            match self.allocation_mark.compare_exchange_weak(
                mark,
                new_mark,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(mark),
                Err(current) => mark = current,
            }
        }
    }

    /// Move the allocation mark back from `mark` to `new_mark`, handing the bytes in between back
    /// to the belt. Fails if anything was allocated after `mark`.
    pub fn retract(&self, mark: Address, new_mark: Address) -> bool {
        debug_assert!(self.start <= new_mark && new_mark <= mark);
        self.allocation_mark
            .compare_exchange(mark, new_mark, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    fn try_expand(&self, new_end: Address) -> bool {
        if !self.is_expandable() || new_end > self.limit {
            return false;
        }
        let mut end = self.end.load(Ordering::Relaxed);
        while end < new_end {
            match self
                .end
                .compare_exchange_weak(end, new_end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => end = current,
            }
        }
        true
    }

    /// Discard the belt's contents. Everything below the old mark has been evacuated.
    pub fn reset_allocation_mark(&self) {
        self.allocation_mark.store(self.start, Ordering::Release);
        self.snapshot.store(self.start, Ordering::Relaxed);
    }

    pub fn set_end(&self, end: Address) {
        debug_assert!(
            self.allocation_mark() <= end && end <= self.limit,
            "{:?}: end {} out of bounds",
            self,
            end
        );
        self.end.store(end, Ordering::Release);
    }

    pub fn set_expandable(&self, expandable: bool) {
        self.expandable.store(expandable, Ordering::Relaxed);
    }

    /// Remember the current allocation mark. Objects below the snapshot existed before the
    /// collection started copying into this belt.
    pub fn set_allocation_mark_snapshot(&self) {
        self.snapshot.store(self.allocation_mark(), Ordering::Relaxed);
    }

    pub fn allocation_mark_snapshot(&self) -> Address {
        self.snapshot.load(Ordering::Relaxed)
    }

    /// Capacity in bytes, `end - start`.
    pub fn extent(&self) -> usize {
        self.end() - self.start
    }

    pub fn used(&self) -> usize {
        self.allocation_mark() - self.start
    }

    /// Bytes left before `end`. An expandable belt may still grow past this.
    pub fn remaining(&self) -> usize {
        self.end() - self.allocation_mark()
    }

    /// Bytes an evacuation into this belt may use, counting growth up to the limit.
    pub fn available(&self) -> usize {
        if self.is_expandable() {
            self.limit - self.allocation_mark()
        } else {
            self.remaining()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allocation_mark() == self.start
    }

    /// Whether `addr` lies in `[start, end)`.
    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.end()
    }

    /// Whether `addr` lies in the allocated part `[start, allocation_mark)`.
    pub fn is_allocated(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.allocation_mark()
    }
}

impl fmt::Debug for Belt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}[{}, mark {}, end {}{}]",
            self.name(),
            self.start,
            self.allocation_mark(),
            self.end(),
            if self.is_expandable() {
                ", expandable"
            } else {
                ""
            }
        )
    }
}
