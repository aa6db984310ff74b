//! Utilities: addresses, allocation buffers, constants, options, logging, memory mapping,
//! forwarding, side metadata, verification and statistics.

pub mod address;
pub mod alloc;
pub mod constants;
pub mod conversions;
pub mod error;
pub mod logger;
pub mod memory;
pub mod metadata;
pub mod object_forwarding;
pub mod options;
pub mod sanity;
pub mod statistics;
#[cfg(any(test, feature = "mock_test"))]
pub mod test_util;

pub use self::address::Address;
pub use self::address::ObjectReference;
