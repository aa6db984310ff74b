use criterion::{BatchSize, Criterion};

use beltway::memory_manager;
use beltway::util::test_util::mock_vm::*;
use beltway::BeltId;

const LIST_LENGTH: usize = 1000;

fn collect_list(c: &mut Criterion, name: &str, mode: &str) {
    let heap = mock_heap(&[
        ("heap_size", "16777216"),
        ("verify_heap", "false"),
        ("scavenge_mode", mode),
    ]);
    let eden_bytes = heap.belts().belt(BeltId::Eden).extent();

    c.bench_function(name, |b| {
        b.iter_batched(
            || {
                reset_roots();
                let head = add_root(new_object(&heap, 1, 1));
                let mut tail = get_root(head);
                for i in 0..LIST_LENGTH {
                    let node = new_object(&heap, 1, 1);
                    set_payload(node, 0, i);
                    set_field(&heap, tail, 0, node);
                    tail = node;
                }
            },
            |_| memory_manager::collect_garbage(&heap, eden_bytes),
            BatchSize::PerIteration,
        )
    });
    reset_roots();
}

pub fn bench(c: &mut Criterion) {
    collect_list(c, "collect_sequential", "Sequential");
    collect_list(c, "collect_parallel", "Parallel");
}
