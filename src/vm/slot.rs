//! Slots are the locations that hold object references: fields of heap objects, and roots held
//! by the runtime outside the heap.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::Ordering;

use atomic::Atomic;

use crate::util::{Address, ObjectReference};

/// A `Slot` points to one location holding an object reference. Copying a `Slot` does not copy
/// the location; the copy points to the same place.
///
/// The collector loads a slot to find the referent, and stores the new address back after the
/// referent has been evacuated.
pub trait Slot: Copy + Send + Debug + PartialEq + Eq + Hash {
    /// Load the object reference from the slot, or `None` if the slot holds null.
    fn load(&self) -> Option<ObjectReference>;

    /// Store `object` into the slot.
    fn store(&self, object: ObjectReference);

    /// The address of the slot itself. Card marking is keyed by this address.
    fn to_address(&self) -> Address;
}

/// A word-sized slot which holds the raw address of an `ObjectReference`, or 0 for null.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SimpleSlot {
    slot_addr: *mut Atomic<Address>,
}

impl SimpleSlot {
    /// Create a simple slot from an address.
    ///
    /// Arguments:
    /// *   `address`: The address in memory where an `ObjectReference` is stored.
    pub fn from_address(address: Address) -> Self {
        Self {
            slot_addr: address.to_mut_ptr(),
        }
    }
}

// A slot is only dereferenced while the world is stopped, and every slot is visited by one worker.
unsafe impl Send for SimpleSlot {}

impl Debug for SimpleSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl Slot for SimpleSlot {
    fn load(&self) -> Option<ObjectReference> {
        let addr = unsafe { (*self.slot_addr).load(Ordering::Relaxed) };
        let object = ObjectReference::from_raw_address(addr);
        if object.is_null() {
            None
        } else {
            Some(object)
        }
    }

    fn store(&self, object: ObjectReference) {
        unsafe { (*self.slot_addr).store(object.to_raw_address(), Ordering::Relaxed) }
    }

    fn to_address(&self) -> Address {
        Address::from_mut_ptr(self.slot_addr)
    }
}
