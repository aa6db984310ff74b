use crate::util::{Address, ObjectReference};
use crate::vm::VMBinding;

/// VM-specific methods for the object layout the collector needs to know about.
///
/// The collector copies objects as raw bytes and overwrites the header word of the old copy with
/// a forwarding pointer. It only ever touches the two lowest bits of the header word while an
/// object is live, so the runtime must keep those bits free (the runtime's own header content
/// must be word-aligned in those two bits). See [`crate::util::object_forwarding`].
pub trait ObjectModel<VM: VMBinding> {
    /// Return the address of the header word of `object`.
    fn ref_to_header(object: ObjectReference) -> Address;

    /// Return the lowest address of the storage of `object`. Copying starts here.
    fn ref_to_object_start(object: ObjectReference) -> Address;

    /// Return the object reference for an object whose storage starts at `start`.
    /// This is used to walk the objects of a belt linearly.
    fn address_to_ref(start: Address) -> ObjectReference;

    /// Return the size of `object` in bytes, including its header. The size is a multiple of the
    /// word size. It must remain readable while the forwarding bits of the header are set to
    /// "being forwarded".
    fn get_current_size(object: ObjectReference) -> usize;

    /// Write a dead object with no reference slots over `[start, start + size)`, so that a linear
    /// walk of the belt steps over the gap. `size` is a multiple of the word size and may be a
    /// single word. The collector calls this for the unused end of an allocation buffer.
    fn fill_gap(start: Address, size: usize);

    /// Dump debugging information for an object.
    fn dump_object(object: ObjectReference);
}
