//! Heap/collector benchmarks.
//!
//! Run with: `cargo bench --package shi-gc`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shi_gc::{GcConfig, Heap, Value};

fn bench_allocation_cells(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_cells");

    group.throughput(Throughput::Elements(1));
    group.bench_function("cons", |b| {
        let mut heap = Heap::new(GcConfig::default());
        b.iter(|| black_box(heap.cons(Value::Integer(1), Value::Nil).unwrap()));
    });

    group.finish();
}

fn bench_allocation_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_strings");

    group.bench_function("short", |b| {
        let mut heap = Heap::new(GcConfig::default());
        b.iter(|| black_box(heap.alloc_string(b"hello".to_vec()).unwrap()));
    });

    group.bench_function("long", |b| {
        let mut heap = Heap::new(GcConfig::default());
        let payload = vec![b'x'; 512];
        b.iter(|| black_box(heap.alloc_string(payload.clone()).unwrap()));
    });

    group.finish();
}

fn bench_symbol_interning(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_interning");

    group.bench_function("repeated_name", |b| {
        let mut heap = Heap::new(GcConfig::default());
        b.iter(|| black_box(heap.intern(b"fibonacci").unwrap()));
    });

    group.bench_function("growing_table", |b| {
        let mut heap = Heap::new(GcConfig::default());
        let mut i = 0u32;
        b.iter(|| {
            let name = format!("sym-{i}");
            i += 1;
            black_box(heap.intern(name.as_bytes()).unwrap())
        });
    });

    group.finish();
}

fn bench_object_properties(c: &mut Criterion) {
    let mut group = c.benchmark_group("object_properties");

    group.bench_function("set_then_get", |b| {
        let mut heap = Heap::new(GcConfig::default());
        let obj = heap.alloc_object(Value::Nil).unwrap();
        let key = heap.intern(b"x").unwrap();
        b.iter(|| {
            heap.obj_set(obj, key, Value::Integer(1)).unwrap();
            black_box(heap.obj_get(obj, key))
        });
    });

    group.bench_function("prototype_chain_find", |b| {
        let mut heap = Heap::new(GcConfig::default());
        let mut proto = Value::Nil;
        for depth in 0..8 {
            let key = heap.intern(format!("k{depth}").as_bytes()).unwrap();
            let obj = heap.alloc_object(proto).unwrap();
            heap.obj_set(obj, key, Value::Integer(depth)).unwrap();
            proto = obj;
        }
        let bottom_key = heap.intern(b"k0").unwrap();
        b.iter(|| black_box(heap.obj_find(proto, bottom_key)));
    });

    group.finish();
}

fn bench_gc_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_cycle");

    group.bench_function("collect_mostly_garbage", |b| {
        b.iter(|| {
            let mut heap = Heap::new(GcConfig::default().with_capacity(4096));
            for _ in 0..1000 {
                let _ = heap.cons(Value::Integer(1), Value::Nil);
            }
            heap.collect();
            black_box(heap.used())
        });
    });

    group.bench_function("collect_mostly_rooted", |b| {
        b.iter(|| {
            let mut heap = Heap::new(GcConfig::default().with_capacity(4096));
            heap.with_frame(|h| {
                let handle = h.root(Value::Nil);
                let mut list = h.get_root(handle);
                for i in 0..500 {
                    list = h.cons(Value::Integer(i), list).unwrap();
                    h.set_root(handle, list);
                }
                h.collect();
                black_box(h.list_length(h.get_root(handle)))
            });
        });
    });

    group.finish();
}

fn bench_allocation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_throughput");

    for &n in &[100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("cons_chain_{n}"), |b| {
            b.iter(|| {
                let mut heap = Heap::new(GcConfig::default().with_capacity(n * 4 + 16));
                let mut list = Value::Nil;
                for i in 0..n {
                    list = heap.cons(Value::Integer(i as i64), list).unwrap();
                }
                black_box(list)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_allocation_cells,
    bench_allocation_strings,
    bench_symbol_interning,
    bench_object_properties,
    bench_gc_cycle,
    bench_allocation_throughput
);
criterion_main!(benches);
