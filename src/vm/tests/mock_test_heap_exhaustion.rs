use super::mock_test_prelude::*;

const OPTIONS: &[(&str, &str)] = &[("heap_size", "10240"), ("belt_percentages", "10,20,40")];

#[test]
pub fn full_mature_fails_before_copying() {
    with_mock_heap_options(OPTIONS, |heap| {
        // Mature is full of live objects: more than eden and to-space can hold together.
        let mut roots = vec![];
        while let Some(object) = new_object_in(heap, BeltId::Mature, 0, 7) {
            set_payload(object, 0, roots.len());
            roots.push(add_root(object));
        }
        assert_eq!(roots.len(), 64);
        assert_eq!(heap.belts().belt(BeltId::Mature).remaining(), 0);
        // Eden is all garbage.
        while heap.belts().belt(BeltId::Eden).remaining() > 0 {
            new_object(heap, 0, 7);
        }

        assert!(!memory_manager::collect_garbage(heap, 64));
        assert_eq!(memory_manager::gc_count(heap, CollectorKind::Eden), 1);
        assert_eq!(memory_manager::gc_count(heap, CollectorKind::ToSpace), 0);
        assert_eq!(memory_manager::gc_count(heap, CollectorKind::Major), 0);

        // Nothing in mature moved.
        for (i, root) in roots.iter().enumerate() {
            let object = get_root(*root);
            assert_eq!(memory_manager::belt_of(heap, object), Some(BeltId::Mature));
            assert_eq!(get_payload(object, 0), i);
        }
        let eden = heap.belts().belt(BeltId::Eden);
        assert!(!eden.is_expandable());
        assert_eq!(eden.end(), heap.belts().belt(BeltId::ToSpace).start());
        for belt in [BeltId::Eden, BeltId::ToSpace, BeltId::Mature] {
            assert!(memory_manager::verify_belt(heap, belt).is_ok());
        }
        let hooks = hook_counts();
        assert_eq!(hooks.stops, 1);
        assert_eq!(hooks.resumes, 1);
    })
}

#[test]
pub fn oversized_request_reports_out_of_memory() {
    with_mock_heap_options(OPTIONS, |heap| {
        let root = add_root(new_object(heap, 0, 1));
        set_payload(get_root(root), 0, 5);

        // Larger than eden: no collection can make room for it.
        let result = memory_manager::alloc(heap, 2048);
        assert!(result.is_zero());
        assert_eq!(hook_counts().out_of_memory, 1);

        // The heap is still usable afterwards.
        assert_eq!(get_payload(get_root(root), 0), 5);
        let object = new_object(heap, 0, 1);
        assert_eq!(memory_manager::belt_of(heap, object), Some(BeltId::Eden));
    })
}

#[test]
pub fn alloc_in_belt_never_collects() {
    with_mock_heap_options(OPTIONS, |heap| {
        let mut count = 0;
        while memory_manager::alloc_in_belt(heap, BeltId::ToSpace, 64).is_some() {
            count += 1;
        }
        assert_eq!(count, 2048 / 64);
        assert_eq!(hook_counts().stops, 0);
        assert_eq!(memory_manager::free_bytes(heap), 1024 + 4096);
    })
}
