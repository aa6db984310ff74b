//! The Beltway plan: the collectors, their shared evacuation engine, and the write barrier.

pub mod barriers;
pub mod beltway;
pub mod scavenger;
pub mod tracing;

pub use beltway::{collect_garbage, CollectorKind};
pub use scavenger::{Evacuation, Scavenger};
