use criterion::Criterion;

use beltway::memory_manager;
use beltway::util::test_util::mock_vm::*;

pub fn bench(c: &mut Criterion) {
    // Everything allocated here is garbage, so only eden collections run.
    let heap = mock_heap(&[("heap_size", "67108864"), ("verify_heap", "false")]);

    c.bench_function("alloc", |b| {
        b.iter(|| {
            let _addr = memory_manager::alloc(&heap, 32);
        })
    });
}
