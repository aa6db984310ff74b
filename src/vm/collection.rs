use crate::util::error::AllocationError;
use crate::vm::VMBinding;

/// Thread and notification hooks the collector calls around a collection.
pub trait Collection<VM: VMBinding> {
    /// Stop all mutator threads at a safepoint. When this returns, no mutator may touch belts,
    /// cards or objects until [`Collection::resume_mutators`] is called.
    fn stop_all_mutators();

    /// Resume all mutators stopped by [`Collection::stop_all_mutators`].
    fn resume_mutators();

    /// Notification that a collector is about to start. A collection that escalates calls this
    /// once for each collector it runs. Inspection tooling may look at the heap here.
    fn before_garbage_collection() {}

    /// Notification that a collector has finished and the heap is consistent again.
    fn after_garbage_collection() {}

    /// Inform the runtime that the heap is exhausted. The default implementation panics.
    ///
    /// Arguments:
    /// * `err`: What kind of memory ran out.
    fn out_of_memory(err: AllocationError) {
        panic!("Out of memory with {:?}!", err);
    }
}
