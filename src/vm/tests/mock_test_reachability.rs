use super::mock_test_prelude::*;
use crate::heap::Heap;
use crate::vm::slot::Slot;

const SEQUENTIAL: &[(&str, &str)] = &[("scavenge_mode", "Sequential")];
const PARALLEL: &[(&str, &str)] = &[("scavenge_mode", "Parallel"), ("threads", "4")];

/// Build a linked list of `len` objects, each with a `next` slot and one payload word holding
/// its position. Returns the head.
fn build_list(heap: &Heap<MockVM>, len: usize) -> usize {
    let head = add_root(new_object(heap, 1, 1));
    set_payload(get_root(head), 0, 0);
    let tail = add_root(get_root(head));
    for i in 1..len {
        let node = new_object(heap, 1, 1);
        set_payload(node, 0, i);
        set_field(heap, get_root(tail), 0, node);
        set_root(tail, node);
    }
    clear_root(tail);
    head
}

fn check_list(heap: &Heap<MockVM>, head: usize, len: usize, belt: BeltId) {
    let mut node = get_root(head);
    for i in 0..len {
        assert!(!node.is_null(), "list cut at {}", i);
        assert_eq!(memory_manager::belt_of(heap, node), Some(belt));
        assert_eq!(get_payload(node, 0), i);
        node = get_field(node, 0);
    }
    assert!(node.is_null());
}

fn list_survives_eden(options: &[(&str, &str)]) {
    with_mock_heap_options(options, |heap| {
        let head = build_list(heap, 100);
        // Unreachable objects after the list.
        for _ in 0..100 {
            new_object(heap, 2, 3);
        }
        let eden = heap.belts().belt(BeltId::Eden);
        assert!(memory_manager::collect_garbage(heap, eden.extent()));
        check_list(heap, head, 100, BeltId::ToSpace);
        // Only the list was copied.
        assert_eq!(
            heap.stats().bytes_copied(CollectorKind::Eden),
            100 * size_of(1, 1)
        );
        // Parallel copying may leave fillers between the copies.
        assert_eq!(count_objects(heap, BeltId::ToSpace), 100);
        let report = memory_manager::verify_belt(heap, BeltId::ToSpace).unwrap();
        assert_eq!(report.references, 99);
    })
}

#[test]
pub fn list_survives_eden_sequential() {
    list_survives_eden(SEQUENTIAL)
}

#[test]
pub fn list_survives_eden_parallel() {
    list_survives_eden(PARALLEL)
}

fn shared_object_copied_once(options: &[(&str, &str)]) {
    with_mock_heap_options(options, |heap| {
        let shared = new_object(heap, 0, 1);
        set_payload(shared, 0, 99);
        let a = add_root(new_object(heap, 1, 0));
        let b = add_root(new_object(heap, 2, 0));
        set_field(heap, get_root(a), 0, shared);
        set_field(heap, get_root(b), 0, shared);
        set_field(heap, get_root(b), 1, shared);
        // The shared object is also a root.
        add_root(shared);

        assert!(memory_manager::collect_garbage(heap, heap.belts().belt(BeltId::Eden).extent()));
        let shared = get_field(get_root(a), 0);
        assert_eq!(memory_manager::belt_of(heap, shared), Some(BeltId::ToSpace));
        assert_eq!(get_field(get_root(b), 0), shared);
        assert_eq!(get_field(get_root(b), 1), shared);
        assert_eq!(get_payload(shared, 0), 99);
        assert_eq!(
            heap.stats().bytes_copied(CollectorKind::Eden),
            size_of(0, 1) + size_of(1, 0) + size_of(2, 0)
        );
        assert_eq!(count_objects(heap, BeltId::ToSpace), 3);
        assert!(memory_manager::verify_belt(heap, BeltId::ToSpace).is_ok());
    })
}

#[test]
pub fn shared_object_copied_once_sequential() {
    shared_object_copied_once(SEQUENTIAL)
}

#[test]
pub fn shared_object_copied_once_parallel() {
    shared_object_copied_once(PARALLEL)
}

#[test]
pub fn parallel_buffers_keep_belts_walkable() {
    const CHILDREN: usize = 200;
    let options = [
        ("scavenge_mode", "Parallel"),
        ("threads", "4"),
        ("gc_lab_bytes", "128"),
    ];
    with_mock_heap_options(&options, |heap| {
        // A wide tree, so that every worker copies into buffers of its own.
        let root = add_root(new_object(heap, CHILDREN, 0));
        for i in 0..CHILDREN {
            let child = new_object(heap, 1, 1);
            let grandchild = new_object(heap, 1, 1);
            set_payload(child, 0, i);
            set_payload(grandchild, 0, 1000 + i);
            set_field(heap, child, 0, grandchild);
            set_field(heap, get_root(root), i, child);
        }
        assert_eq!(memory_manager::gc_count(heap, CollectorKind::Eden), 0);

        assert!(memory_manager::collect_garbage(heap, 0));
        let copied = size_of(CHILDREN, 0) + 2 * CHILDREN * size_of(1, 1);
        assert_eq!(heap.stats().bytes_copied(CollectorKind::Eden), copied);
        assert_eq!(count_objects(heap, BeltId::ToSpace), 1 + 2 * CHILDREN);
        // Fillers make up whatever the copies do not.
        let report = memory_manager::verify_belt(heap, BeltId::ToSpace).unwrap();
        assert_eq!(report.bytes, heap.belts().belt(BeltId::ToSpace).used());
        assert!(report.bytes >= copied);

        let parent = get_root(root);
        assert_eq!(memory_manager::belt_of(heap, parent), Some(BeltId::ToSpace));
        for i in 0..CHILDREN {
            let child = get_field(parent, i);
            let grandchild = get_field(child, 0);
            assert_eq!(get_payload(child, 0), i);
            assert_eq!(get_payload(grandchild, 0), 1000 + i);
            assert_eq!(memory_manager::belt_of(heap, grandchild), Some(BeltId::ToSpace));
        }

        // The card of an older-to-younger store is scanned across the fillers.
        let holder = get_field(get_field(parent, CHILDREN / 2), 0);
        let young = new_object(heap, 0, 1);
        set_payload(young, 0, 77);
        set_field(heap, holder, 0, young);
        assert!(memory_manager::collect_garbage(heap, 0));
        let young = get_field(holder, 0);
        assert_eq!(memory_manager::belt_of(heap, young), Some(BeltId::ToSpace));
        assert_eq!(get_payload(young, 0), 77);
        assert_eq!(count_objects(heap, BeltId::ToSpace), 2 + 2 * CHILDREN);
        assert!(memory_manager::verify_belt(heap, BeltId::ToSpace).is_ok());
    })
}

#[test]
pub fn cycles_are_copied() {
    with_mock_heap(|heap| {
        let a = new_object(heap, 1, 1);
        let b = new_object(heap, 1, 1);
        set_payload(a, 0, 1);
        set_payload(b, 0, 2);
        set_field(heap, a, 0, b);
        set_field(heap, b, 0, a);
        let root = add_root(a);
        assert!(memory_manager::collect_garbage(heap, heap.belts().belt(BeltId::Eden).extent()));
        let a = get_root(root);
        let b = get_field(a, 0);
        assert_eq!(get_payload(a, 0), 1);
        assert_eq!(get_payload(b, 0), 2);
        assert_eq!(get_field(b, 0), a);
        assert_eq!(memory_manager::belt_of(heap, b), Some(BeltId::ToSpace));
    })
}

#[test]
pub fn verification_is_idempotent() {
    with_mock_heap(|heap| {
        let head = build_list(heap, 10);
        for belt in [BeltId::Eden, BeltId::ToSpace, BeltId::Mature] {
            let first = memory_manager::verify_belt(heap, belt).unwrap();
            let second = memory_manager::verify_belt(heap, belt).unwrap();
            assert_eq!(first, second);
        }
        let eden = memory_manager::verify_belt(heap, BeltId::Eden).unwrap();
        assert_eq!(eden.objects, 10);
        assert_eq!(eden.bytes, 10 * size_of(1, 1));
        check_list(heap, head, 10, BeltId::Eden);
    })
}

#[test]
pub fn verification_finds_dangling_reference() {
    with_mock_heap(|heap| {
        let holder = new_object(heap, 1, 0);
        // Points into to-space above its allocation mark.
        let stale = ObjectReference::from_raw_address(heap.belts().belt(BeltId::ToSpace).start());
        ref_slot(holder, 0).store(stale);
        let error = memory_manager::verify_belt(heap, BeltId::Eden).unwrap_err();
        assert!(matches!(
            error,
            crate::util::error::HeapCorruption::DanglingReference { .. }
        ));
    })
}
