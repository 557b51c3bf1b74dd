use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use warden_proxy::backend;
use warden_proxy::{CheckerRef, Grants, List, Operation, PolicyChecker, Record, Value};

fn checker() -> CheckerRef {
    PolicyChecker::new(Arc::new(Grants::with(["zope.View"])))
        .public_all(["len", "iter", "next", "str"])
        .protect("item-get", "zope.View")
        .protect("name", "zope.View")
        .into_ref()
}

fn bench_item_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("item_get");
    let items = List::of(0..64i64).into_value();

    for backend in backend::available() {
        let proxy = backend.wrap(items.clone(), checker());
        group.bench_with_input(
            BenchmarkId::new(backend.kind().name(), "allowed"),
            &proxy,
            |b, proxy| {
                b.iter(|| proxy.get_item(black_box(7)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_denied(c: &mut Criterion) {
    let mut group = c.benchmark_group("denied");
    let items = List::of(0..8i64).into_value();

    for backend in backend::available() {
        let proxy = backend.wrap(items.clone(), checker());
        group.bench_with_input(
            BenchmarkId::new(backend.kind().name(), "call"),
            &proxy,
            |b, proxy| {
                b.iter(|| black_box(proxy).call(&[]).unwrap_err());
            },
        );
    }

    group.finish();
}

fn bench_unchecked(c: &mut Criterion) {
    let mut group = c.benchmark_group("unchecked");

    for backend in backend::available() {
        let proxy = backend.wrap(Value::Int(42), checker());
        group.bench_with_input(
            BenchmarkId::new(backend.kind().name(), "hash"),
            &proxy,
            |b, proxy| {
                b.iter(|| proxy.dispatch(black_box(Operation::Hash), &[]).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_mediated_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("mediated_get");
    let child = Record::new("pkg.Child").into_value();
    let parent = Record::new("pkg.Parent").with("name", child).into_value();

    for backend in backend::available() {
        let proxy = backend.wrap(parent.clone(), checker());
        group.bench_with_input(
            BenchmarkId::new(backend.kind().name(), "attribute"),
            &proxy,
            |b, proxy| {
                b.iter(|| proxy.get(black_box("name")).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration");
    let items = List::of(0..256i64).into_value();

    for backend in backend::available() {
        let proxy = backend.wrap(items.clone(), checker());
        group.bench_with_input(
            BenchmarkId::new(backend.kind().name(), "256 items"),
            &proxy,
            |b, proxy| {
                b.iter(|| proxy.iter().unwrap().count());
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_item_get,
    bench_denied,
    bench_unchecked,
    bench_mediated_get,
    bench_iteration
);
criterion_main!(benches);
