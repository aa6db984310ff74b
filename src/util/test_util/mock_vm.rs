//! A minimal runtime for tests.
//!
//! A mock object is a run of words: a header, then `refs` reference slots, then `payload` plain
//! words. The object reference is the address of the header. The header holds the total number
//! of words above bit 16, a filler flag in bit 15 and the number of reference slots in bits
//! 2..15, which leaves the two forwarding bits free.
//!
//! Roots live in boxes owned by the test thread. Collections run on the thread that requests
//! them, so each test sees only its own roots and hook counters.

use crate::heap::{Heap, HeapBuilder};
use crate::memory_manager;
use crate::policy::BeltId;
use crate::util::constants::{BYTES_IN_WORD, LOG_BYTES_IN_WORD};
use crate::util::error::AllocationError;
use crate::util::{Address, ObjectReference};
use crate::vm::slot::{SimpleSlot, Slot};
use crate::vm::{
    Collection, ObjectModel, RootsWorkFactory, Scanning, SlotVisitor, VMBinding,
};
use atomic::Atomic;
use std::cell::{Cell, RefCell};
use std::sync::atomic::Ordering;

const REFS_SHIFT: usize = 2;
const REFS_MASK: usize = (1 << 13) - 1;
const FILLER: usize = 1 << 15;
const WORDS_SHIFT: usize = 16;

/// Heap size used by [`with_mock_heap`].
pub const MOCK_HEAP_SIZE: usize = 1 << 20;

#[derive(Default)]
pub struct MockVM;

impl VMBinding for MockVM {
    type VMObjectModel = MockObjectModel;
    type VMScanning = MockScanning;
    type VMCollection = MockCollection;
    type VMSlot = SimpleSlot;
}

fn header(object: ObjectReference) -> usize {
    unsafe { object.to_raw_address().load::<usize>() }
}

pub fn num_refs(object: ObjectReference) -> usize {
    (header(object) >> REFS_SHIFT) & REFS_MASK
}

pub fn object_size(object: ObjectReference) -> usize {
    (header(object) >> WORDS_SHIFT) << LOG_BYTES_IN_WORD
}

/// Is `object` a dead filler written by the collector?
pub fn is_filler(object: ObjectReference) -> bool {
    header(object) & FILLER != 0
}

/// Objects in the allocated part of `belt`, not counting fillers.
pub fn count_objects(heap: &Heap<MockVM>, belt: BeltId) -> usize {
    let belt = heap.belts().belt(belt);
    let mut cursor = belt.start();
    let mut count = 0;
    while cursor < belt.allocation_mark() {
        let object = ObjectReference::from_raw_address(cursor);
        if !is_filler(object) {
            count += 1;
        }
        cursor += object_size(object);
    }
    count
}

/// Size in bytes of an object with `refs` slots and `payload` plain words.
pub fn size_of(refs: usize, payload: usize) -> usize {
    (1 + refs + payload) << LOG_BYTES_IN_WORD
}

pub struct MockObjectModel;

impl ObjectModel<MockVM> for MockObjectModel {
    fn ref_to_header(object: ObjectReference) -> Address {
        object.to_raw_address()
    }

    fn ref_to_object_start(object: ObjectReference) -> Address {
        object.to_raw_address()
    }

    fn address_to_ref(start: Address) -> ObjectReference {
        ObjectReference::from_raw_address(start)
    }

    fn get_current_size(object: ObjectReference) -> usize {
        object_size(object)
    }

    fn fill_gap(start: Address, size: usize) {
        let words = size >> LOG_BYTES_IN_WORD;
        unsafe { start.store::<usize>((words << WORDS_SHIFT) | FILLER) };
    }

    fn dump_object(object: ObjectReference) {
        info!(
            "{}: header {:#x}, {} refs, {} bytes",
            object,
            header(object),
            num_refs(object),
            object_size(object)
        );
    }
}

pub struct MockScanning;

impl Scanning<MockVM> for MockScanning {
    fn scan_object<SV: SlotVisitor<SimpleSlot>>(object: ObjectReference, slot_visitor: &mut SV) {
        for i in 0..num_refs(object) {
            slot_visitor.visit_slot(ref_slot(object, i));
        }
    }

    fn scan_roots(factory: &mut impl RootsWorkFactory<SimpleSlot>) {
        let slots: Vec<SimpleSlot> = ROOTS.with(|roots| {
            roots
                .borrow()
                .iter()
                .map(|root| SimpleSlot::from_address(Address::from_ref::<Atomic<Address>>(&**root)))
                .collect()
        });
        factory.create_process_roots_work(slots);
    }
}

/// How many times each runtime hook has been called on this thread.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HookCounts {
    pub stops: usize,
    pub resumes: usize,
    pub before_gc: usize,
    pub after_gc: usize,
    pub out_of_memory: usize,
}

thread_local! {
    static ROOTS: RefCell<Vec<Box<Atomic<Address>>>> = const { RefCell::new(Vec::new()) };
    static HOOKS: Cell<HookCounts> = Cell::new(HookCounts::default());
}

fn count_hook(f: impl FnOnce(&mut HookCounts)) {
    HOOKS.with(|hooks| {
        let mut counts = hooks.get();
        f(&mut counts);
        hooks.set(counts);
    })
}

pub fn hook_counts() -> HookCounts {
    HOOKS.with(Cell::get)
}

pub struct MockCollection;

impl Collection<MockVM> for MockCollection {
    fn stop_all_mutators() {
        count_hook(|c| c.stops += 1);
    }

    fn resume_mutators() {
        count_hook(|c| c.resumes += 1);
    }

    fn before_garbage_collection() {
        count_hook(|c| c.before_gc += 1);
    }

    fn after_garbage_collection() {
        count_hook(|c| c.after_gc += 1);
    }

    // Recorded instead of panicking so tests can check the allocation path.
    fn out_of_memory(err: AllocationError) {
        warn!("Mock runtime out of memory: {}", err);
        count_hook(|c| c.out_of_memory += 1);
    }
}

/// Register `object` as a root. Returns the root's index.
pub fn add_root(object: ObjectReference) -> usize {
    ROOTS.with(|roots| {
        let mut roots = roots.borrow_mut();
        roots.push(Box::new(Atomic::new(object.to_raw_address())));
        roots.len() - 1
    })
}

/// The current value of root `index`. Collections update roots in place.
pub fn get_root(index: usize) -> ObjectReference {
    ROOTS.with(|roots| ObjectReference::from_raw_address(roots.borrow()[index].load(Ordering::Relaxed)))
}

pub fn set_root(index: usize, object: ObjectReference) {
    ROOTS.with(|roots| roots.borrow()[index].store(object.to_raw_address(), Ordering::Relaxed))
}

pub fn clear_root(index: usize) {
    set_root(index, ObjectReference::NULL)
}

pub fn reset_roots() {
    ROOTS.with(|roots| roots.borrow_mut().clear())
}

pub fn ref_slot(object: ObjectReference, index: usize) -> SimpleSlot {
    debug_assert!(index < num_refs(object));
    SimpleSlot::from_address(object.to_raw_address() + (1 + index) * BYTES_IN_WORD)
}

fn payload_address(object: ObjectReference, index: usize) -> Address {
    object.to_raw_address() + (1 + num_refs(object) + index) * BYTES_IN_WORD
}

pub fn set_payload(object: ObjectReference, index: usize, value: usize) {
    unsafe { payload_address(object, index).store(value) }
}

pub fn get_payload(object: ObjectReference, index: usize) -> usize {
    unsafe { payload_address(object, index).load::<usize>() }
}

/// Store `target` into reference slot `index` of `object` through the write barrier.
pub fn set_field(
    heap: &Heap<MockVM>,
    object: ObjectReference,
    index: usize,
    target: ObjectReference,
) {
    memory_manager::object_reference_write(heap, object, ref_slot(object, index), target)
}

/// Reference slot `index` of `object`, or null.
pub fn get_field(object: ObjectReference, index: usize) -> ObjectReference {
    ref_slot(object, index)
        .load()
        .unwrap_or(ObjectReference::NULL)
}

fn init_object(start: Address, refs: usize, payload: usize) -> ObjectReference {
    assert!(refs <= REFS_MASK);
    let words = 1 + refs + payload;
    unsafe { start.store::<usize>((words << WORDS_SHIFT) | (refs << REFS_SHIFT)) };
    ObjectReference::from_raw_address(start)
}

/// Allocate an object in eden, collecting if needed. Panics if the heap is exhausted.
pub fn new_object(heap: &Heap<MockVM>, refs: usize, payload: usize) -> ObjectReference {
    let start = memory_manager::alloc(heap, size_of(refs, payload));
    assert!(!start.is_zero(), "Mock heap exhausted");
    init_object(start, refs, payload)
}

/// Allocate an object directly in `belt`. Returns `None` if the belt is full.
pub fn new_object_in(
    heap: &Heap<MockVM>,
    belt: BeltId,
    refs: usize,
    payload: usize,
) -> Option<ObjectReference> {
    memory_manager::alloc_in_belt(heap, belt, size_of(refs, payload))
        .map(|start| init_object(start, refs, payload))
}

/// Build a heap without reading the environment. `options` override the defaults, and the heap
/// is always verified around collections.
pub fn mock_heap(options: &[(&str, &str)]) -> Box<Heap<MockVM>> {
    let mut builder = HeapBuilder::new_no_env_vars();
    assert!(builder.set_option("heap_size", &MOCK_HEAP_SIZE.to_string()));
    assert!(builder.set_option("verify_heap", "true"));
    for (name, value) in options {
        assert!(
            builder.set_option(name, value),
            "Bad mock option {}={}",
            name,
            value
        );
    }
    match memory_manager::heap_init::<MockVM>(&builder) {
        Ok(heap) => heap,
        Err(e) => panic!("Cannot create mock heap: {}", e),
    }
}

/// Run `test` against a fresh heap built from `options`, with no roots registered.
pub fn with_mock_heap_options<F>(options: &[(&str, &str)], test: F)
where
    F: FnOnce(&Heap<MockVM>),
{
    reset_roots();
    HOOKS.with(|hooks| hooks.set(HookCounts::default()));
    let heap = mock_heap(options);
    test(&heap);
    reset_roots();
}

pub fn with_mock_heap<F>(test: F)
where
    F: FnOnce(&Heap<MockVM>),
{
    with_mock_heap_options(&[], test)
}
