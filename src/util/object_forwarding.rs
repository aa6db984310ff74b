//! Forwarding state kept in the two lowest bits of an object's header word.
//!
//! A live object has both bits clear. The worker that evacuates an object first CASes the bits to
//! `BEING_FORWARDED`, copies the object, and then publishes the new address and `FORWARDED` in
//! one release store of the whole header word. Any other worker that reaches the object spins
//! until it sees `FORWARDED`, so it observes either "not yet forwarded" or the complete
//! forwarding pointer, never a torn one.

use crate::util::memory;
use crate::util::{Address, ObjectReference};
use crate::vm::ObjectModel;
use crate::vm::VMBinding;
use std::sync::atomic::{AtomicUsize, Ordering};

const FORWARDING_NOT_TRIGGERED_YET: usize = 0b00;
const BEING_FORWARDED: usize = 0b10;
const FORWARDED: usize = 0b11;
const FORWARDING_MASK: usize = 0b11;

fn header_word<VM: VMBinding>(object: ObjectReference) -> Address {
    VM::VMObjectModel::ref_to_header(object)
}

fn load_header<VM: VMBinding>(object: ObjectReference, order: Ordering) -> usize {
    unsafe { header_word::<VM>(object).atomic_load::<AtomicUsize>(order) }
}

/// Attempt to become the worker who will forward the object.
/// The successful worker sets the forwarding bits to BEING_FORWARDED and gets
/// FORWARDING_NOT_TRIGGERED_YET back. Everyone else gets the state they observed.
pub fn attempt_to_forward<VM: VMBinding>(object: ObjectReference) -> usize {
    let header = header_word::<VM>(object);
    loop {
        let old_value = load_header::<VM>(object, Ordering::Acquire);
        let old_bits = old_value & FORWARDING_MASK;
        if old_bits != FORWARDING_NOT_TRIGGERED_YET {
            return old_bits;
        }
        let result = unsafe {
            header.compare_exchange::<AtomicUsize>(
                old_value,
                old_value | BEING_FORWARDED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
        };
        if result.is_ok() {
            return FORWARDING_NOT_TRIGGERED_YET;
        }
    }
}

/// Spin-wait for the object's forwarding to become complete and then read the forwarding pointer
/// to the new object.
///
/// # Arguments:
///
/// * `object`: the forwarded/being_forwarded object.
/// * `forwarding_bits`: the last state of the forwarding bits before calling this function.
pub fn spin_and_get_forwarded_object<VM: VMBinding>(
    object: ObjectReference,
    forwarding_bits: usize,
) -> ObjectReference {
    let mut forwarding_bits = forwarding_bits;
    while forwarding_bits == BEING_FORWARDED {
        std::hint::spin_loop();
        forwarding_bits = get_forwarding_status::<VM>(object);
    }
    debug_assert_eq!(
        forwarding_bits, FORWARDED,
        "Corrupted forwarding state for object {}",
        object
    );
    read_forwarding_pointer::<VM>(object)
}

/// Copy `object` to `to`, which must hold `size` bytes owned by the caller, and publish the
/// forwarding pointer. The caller must have won [`attempt_to_forward`] for `object`.
pub fn forward_object<VM: VMBinding>(
    object: ObjectReference,
    size: usize,
    to: Address,
) -> ObjectReference {
    debug_assert!(is_being_forwarded::<VM>(object));
    let from = VM::VMObjectModel::ref_to_object_start(object);
    let offset = object.to_raw_address() - from;
    let new_object = ObjectReference::from_raw_address(to + offset);
    unsafe { memory::copy_nonoverlapping(from, to, size) };

    // The copy carries the BEING_FORWARDED bits of the old header.
    let new_header = header_word::<VM>(new_object);
    unsafe {
        let value = new_header.load::<usize>();
        new_header.store::<usize>(value & !FORWARDING_MASK);
    }

    write_forwarding_pointer::<VM>(object, new_object);
    trace!("forward_object({}, {}) {} bytes", object, new_object, size);
    new_object
}

/// Return the forwarding bits for a given `ObjectReference`.
pub fn get_forwarding_status<VM: VMBinding>(object: ObjectReference) -> usize {
    load_header::<VM>(object, Ordering::Acquire) & FORWARDING_MASK
}

pub fn is_forwarded<VM: VMBinding>(object: ObjectReference) -> bool {
    get_forwarding_status::<VM>(object) == FORWARDED
}

fn is_being_forwarded<VM: VMBinding>(object: ObjectReference) -> bool {
    get_forwarding_status::<VM>(object) == BEING_FORWARDED
}

pub fn is_forwarded_or_being_forwarded<VM: VMBinding>(object: ObjectReference) -> bool {
    get_forwarding_status::<VM>(object) != FORWARDING_NOT_TRIGGERED_YET
}

pub fn state_is_forwarded_or_being_forwarded(forwarding_bits: usize) -> bool {
    forwarding_bits != FORWARDING_NOT_TRIGGERED_YET
}

/// Read the forwarding pointer of a forwarded object.
pub fn read_forwarding_pointer<VM: VMBinding>(object: ObjectReference) -> ObjectReference {
    debug_assert!(
        is_forwarded::<VM>(object),
        "read_forwarding_pointer called for object {:?} that has not been forwarded!",
        object,
    );
    let value = load_header::<VM>(object, Ordering::Acquire) & !FORWARDING_MASK;
    ObjectReference::from_raw_address(unsafe { Address::from_usize(value) })
}

/// Overwrite the header of a being-forwarded object with the forwarding pointer. All bytes of
/// the new copy are visible to any thread that acquires the header afterwards.
fn write_forwarding_pointer<VM: VMBinding>(object: ObjectReference, new_object: ObjectReference) {
    let value = new_object.to_raw_address().as_usize();
    debug_assert_eq!(value & FORWARDING_MASK, 0);
    unsafe {
        header_word::<VM>(object).atomic_store::<AtomicUsize>(value | FORWARDED, Ordering::Release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::mock_vm::{self, MockVM};

    #[test]
    fn forward_once() {
        mock_vm::with_mock_heap(|heap| {
            let object = mock_vm::new_object(heap, 0, 2);
            mock_vm::set_payload(object, 0, 0xabcd);
            let size = mock_vm::object_size(object);
            let to = mock_vm::new_object(heap, 0, 2).to_raw_address();

            assert!(!is_forwarded_or_being_forwarded::<MockVM>(object));
            assert_eq!(
                attempt_to_forward::<MockVM>(object),
                FORWARDING_NOT_TRIGGERED_YET
            );
            // A second attempt sees the object as claimed.
            assert_eq!(attempt_to_forward::<MockVM>(object), BEING_FORWARDED);

            let new_object = forward_object::<MockVM>(object, size, to);
            assert!(is_forwarded::<MockVM>(object));
            assert!(!is_forwarded_or_being_forwarded::<MockVM>(new_object));
            assert_eq!(read_forwarding_pointer::<MockVM>(object), new_object);
            assert_eq!(
                spin_and_get_forwarded_object::<MockVM>(object, FORWARDED),
                new_object
            );
            assert_eq!(mock_vm::get_payload(new_object, 0), 0xabcd);
            assert_eq!(mock_vm::object_size(new_object), size);
        })
    }
}
