//! Belts and the manager that lays them out over the heap.

pub mod belt;
pub mod belt_manager;

pub use belt::{Belt, BeltId};
pub use belt_manager::BeltManager;
