//! Allocation buffers used by the collectors while they copy.

pub mod gc_buffer;

pub use gc_buffer::{BufferSizing, GcBuffer};
