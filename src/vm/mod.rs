//! The interface a runtime implements to plug into the heap.
//!
//! A binding implements [`VMBinding`] on a (usually zero-sized) type, and provides an
//! object model, root and object scanning, and the thread hooks used to stop the world.

mod collection;
mod object_model;
mod scanning;
pub mod slot;
#[cfg(test)]
mod tests;

pub use self::collection::Collection;
pub use self::object_model::ObjectModel;
pub use self::scanning::RootsWorkFactory;
pub use self::scanning::Scanning;
pub use self::scanning::SlotVisitor;

/// The `VMBinding` trait associates the binding's implementation of each VM trait.
pub trait VMBinding
where
    Self: Sized + 'static + Send + Sync + Default,
{
    type VMObjectModel: ObjectModel<Self>;
    type VMScanning: Scanning<Self>;
    type VMCollection: Collection<Self>;

    /// The type of slots in this VM.
    type VMSlot: slot::Slot;
}
