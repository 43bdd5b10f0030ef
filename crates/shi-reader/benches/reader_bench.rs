//! Reader benchmarks.
//!
//! Run with: `cargo bench --package shi-reader`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shi_gc::{GcConfig, Heap};
use shi_reader::Reader;

fn read_all(source: &[u8]) -> usize {
    let mut heap = Heap::new(GcConfig::default());
    let mut reader = Reader::new(&mut heap, source);
    let mut count = 0;
    while reader.next_expr().unwrap().is_some() {
        count += 1;
    }
    count
}

fn bench_reader_atoms(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_atoms");

    group.bench_function("integer", |b| b.iter(|| read_all(black_box(b"123456"))));
    group.bench_function("symbol", |b| b.iter(|| read_all(black_box(b"fibonacci"))));
    group.bench_function("string", |b| {
        b.iter(|| read_all(black_box(b"\"hello, world\"")))
    });

    group.finish();
}

fn bench_reader_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_lists");

    let source = b"(define (fib n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))";
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("nested_list", |b| b.iter(|| read_all(black_box(source))));

    group.bench_function("dotted_pair", |b| {
        b.iter(|| read_all(black_box(b"(a . b)")))
    });

    group.finish();
}

fn bench_reader_sugar(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_sugar");

    group.bench_function("quote_family", |b| {
        b.iter(|| read_all(black_box(b"'(a `(b ,c ,@d))")))
    });

    group.bench_function("alist_literal", |b| {
        b.iter(|| read_all(black_box(b"{a 1 b 2 c 3}")))
    });

    group.bench_function("property_access", |b| {
        b.iter(|| read_all(black_box(b"point:x")))
    });

    group.finish();
}

fn bench_reader_toplevel(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_toplevel");

    let source = br#"
        (define (make-point x y) (obj x: x y: y))
        (define p (make-point 1 2))
        (print (: p x))
    "#;
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("small_program", |b| b.iter(|| read_all(black_box(source))));

    group.finish();
}

criterion_group!(
    benches,
    bench_reader_atoms,
    bench_reader_lists,
    bench_reader_sugar,
    bench_reader_toplevel
);
criterion_main!(benches);
