use crate::policy::BeltId;
use crate::util::{Address, ObjectReference};
use std::fmt;

/// Allocation errors that a runtime is informed of through [`crate::vm::Collection::out_of_memory`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The heap cannot absorb the survivors of a collection, or a request does not fit even
    /// after the whole collection chain has run. This is not recoverable.
    HeapOutOfMemory,
    /// The operating system refused to map the heap.
    MmapOutOfMemory,
    /// The heap size leaves a belt without a single card.
    HeapTooSmall { belt: BeltId },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocationError::HeapOutOfMemory => write!(f, "heap out of memory"),
            AllocationError::MmapOutOfMemory => write!(f, "failed to map heap memory"),
            AllocationError::HeapTooSmall { belt } => {
                write!(f, "heap too small for a {} belt", belt.name())
            }
        }
    }
}

impl std::error::Error for AllocationError {}

/// A heap invariant found broken by the verifier. Every variant indicates a collector defect:
/// a phase boundary that observes one of these halts the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapCorruption {
    /// `start <= allocation_mark <= end` does not hold for a belt.
    BeltBounds {
        belt: &'static str,
        start: Address,
        mark: Address,
        end: Address,
    },
    /// An object is misaligned, has a zero size, or runs past the belt's allocation mark.
    ObjectLayout {
        belt: &'static str,
        object: ObjectReference,
        size: usize,
    },
    /// An object's header still holds a forwarding record outside of a collection.
    UnresolvedForwarding {
        belt: &'static str,
        object: ObjectReference,
    },
    /// A reference slot points outside the allocated part of the managed heap.
    DanglingReference {
        belt: &'static str,
        holder: ObjectReference,
        slot: Address,
        target: ObjectReference,
    },
    /// The side table does not record an object start that a linear walk found.
    SideTable { belt: &'static str, object: ObjectReference },
    /// A card is marked for a stride that lies outside every belt.
    CardTable { card: usize },
}

impl fmt::Display for HeapCorruption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeapCorruption::BeltBounds {
                belt,
                start,
                mark,
                end,
            } => write!(
                f,
                "{}: allocation mark {} outside of [{}, {}]",
                belt, mark, start, end
            ),
            HeapCorruption::ObjectLayout { belt, object, size } => {
                write!(f, "{}: bad object layout at {} (size {})", belt, object, size)
            }
            HeapCorruption::UnresolvedForwarding { belt, object } => {
                write!(f, "{}: object {} is still forwarded", belt, object)
            }
            HeapCorruption::DanglingReference {
                belt,
                holder,
                slot,
                target,
            } => write!(
                f,
                "{}: slot {} of {} holds dangling reference {}",
                belt, slot, holder, target
            ),
            HeapCorruption::SideTable { belt, object } => {
                write!(f, "{}: side table misses object start {}", belt, object)
            }
            HeapCorruption::CardTable { card } => {
                write!(f, "card {} is marked but covers no belt", card)
            }
        }
    }
}

impl std::error::Error for HeapCorruption {}
