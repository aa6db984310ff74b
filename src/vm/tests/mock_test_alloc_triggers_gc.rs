use super::mock_test_prelude::*;

#[test]
pub fn alloc_collects_full_eden() {
    with_mock_heap_options(
        &[("heap_size", "10240"), ("belt_percentages", "10,20,40")],
        |heap| {
            // Every other object survives.
            let roots: Vec<usize> = (0..16)
                .filter_map(|i| {
                    let object = new_object(heap, 0, 7);
                    set_payload(object, 0, i);
                    (i % 2 == 0).then(|| add_root(object))
                })
                .collect();
            assert_eq!(memory_manager::gc_count(heap, CollectorKind::Eden), 0);
            assert_eq!(heap.belts().belt(BeltId::Eden).remaining(), 0);

            // Eden is full, so this allocation collects first.
            let object = new_object(heap, 0, 7);
            assert_eq!(memory_manager::gc_count(heap, CollectorKind::Eden), 1);
            assert_eq!(memory_manager::belt_of(heap, object), Some(BeltId::Eden));
            assert_eq!(heap.belts().belt(BeltId::Eden).used(), 64);
            for (i, root) in roots.iter().enumerate() {
                let survivor = get_root(*root);
                assert_eq!(memory_manager::belt_of(heap, survivor), Some(BeltId::ToSpace));
                assert_eq!(get_payload(survivor, 0), 2 * i);
            }
            assert_eq!(heap.belts().belt(BeltId::ToSpace).used(), 512);
            assert_eq!(memory_manager::gc_count(heap, CollectorKind::ToSpace), 0);
            assert_eq!(hook_counts().out_of_memory, 0);
        },
    )
}

#[test]
pub fn allocation_is_zeroed_and_word_aligned() {
    with_mock_heap(|heap| {
        let a = memory_manager::alloc(heap, 1);
        let b = memory_manager::alloc(heap, 9);
        assert!(a.is_word_aligned());
        assert_eq!(b - a, crate::util::constants::BYTES_IN_WORD);
        assert!(memory_manager::is_in_heap(heap, a));
        assert_eq!(unsafe { b.load::<usize>() }, 0);
        assert_eq!(
            memory_manager::used_bytes(heap),
            3 * crate::util::constants::BYTES_IN_WORD
        );
        let stats = memory_manager::belt_stats(heap, BeltId::Eden);
        assert_eq!(stats.allocation_mark, b + 2 * crate::util::constants::BYTES_IN_WORD);
        assert_eq!(stats.used + stats.remaining, stats.end - stats.start);
    })
}

#[test]
pub fn threads_waiting_for_a_collection_do_not_repeat_it() {
    const THREADS: usize = 4;
    const ALLOCATIONS: usize = 4096;
    const SIZE: usize = 64;
    // Mutators are not stopped by the mock runtime, so they never write to what they allocate
    // and the belts are not walked.
    with_mock_heap_options(&[("verify_heap", "false")], |heap| {
        crossbeam::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|_| {
                    for _ in 0..ALLOCATIONS {
                        assert!(!memory_manager::alloc(heap, SIZE).is_zero());
                    }
                });
            }
        })
        .unwrap();

        // A collection only runs when eden is full, even for a thread that queued for the lock
        // while another one was collecting.
        let eden = heap.belts().belt(BeltId::Eden).extent();
        let collections = memory_manager::gc_count(heap, CollectorKind::Eden);
        assert!(collections >= 1);
        assert!(
            collections <= THREADS * ALLOCATIONS * SIZE / (eden - SIZE),
            "{} collections",
            collections
        );
        assert_eq!(memory_manager::gc_count(heap, CollectorKind::ToSpace), 0);
    })
}
