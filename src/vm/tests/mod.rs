// Every test builds its own heap, and roots and hook counters belong to the test thread, so these
// tests can run in parallel.
//
// Tests with the prefix 'mock_test_' drive a heap through `MockVM`.

// Common includes for mock tests.
pub(crate) mod mock_test_prelude {
    pub use crate::memory_manager;
    pub use crate::plan::beltway::CollectorKind;
    pub use crate::policy::BeltId;
    pub use crate::util::test_util::mock_vm::*;
    pub use crate::util::ObjectReference;
    pub use crate::vm::*;
}

mod mock_test_alloc_triggers_gc;
mod mock_test_heap_exhaustion;
mod mock_test_reachability;
