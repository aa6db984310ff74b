//! Beltway is a generational copying garbage collector for managed runtimes.
//!
//! The heap is split into three belts, youngest first: eden, to-space and mature. Objects are
//! allocated in eden with a bump pointer. When eden fills up, its survivors are copied into
//! to-space; when to-space runs short, survivors are promoted into mature; when mature runs
//! short, mature is compacted by copying it through eden and back. A card-marking write barrier
//! records references from older belts into younger ones, so minor collections only need the
//! roots and the dirty cards.
//!
//! A runtime plugs in by implementing [`vm::VMBinding`], then uses the functions in
//! [`memory_manager`]:
//!
//! ```ignore
//! let builder = HeapBuilder::new();
//! let heap = memory_manager::heap_init::<MyVM>(&builder)?;
//! let object = memory_manager::alloc(&heap, 64);
//! ```

#[macro_use]
extern crate log;

pub mod heap;
pub mod memory_manager;
pub mod plan;
pub mod policy;
pub mod scheduler;
pub mod util;
pub mod vm;

pub use crate::heap::{Heap, HeapBuilder};
pub use crate::plan::beltway::CollectorKind;
pub use crate::policy::BeltId;
