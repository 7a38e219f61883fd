//! Dispatch benchmarks using criterion.
//!
//! Measures the cache hit path at each tier, the full bind path, and
//! overload resolution over growing candidate sets.
//!
//! Run with: cargo bench --bench dispatch_bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ember_bind::candidate::{Candidate, MethodId};
use ember_bind::host::Instance;
use ember_bind::resolve::OverloadResolver;
use ember_bind::{BinderConfig, CallSiteId, ClassTable, HostObjectModel, OperationDescriptor, ParamType, Runtime, Value};

fn setup(classes: usize) -> (Arc<ClassTable>, Vec<Value>) {
    let table = Arc::new(ClassTable::new());
    let object = table.builtins().object;
    let integer = table.builtins().integer;
    let receivers = (0..classes)
        .map(|i| {
            let class = table.define_class(&format!("C{}", i), object);
            table.define_method(
                class,
                "add",
                |c| c.param(ParamType::Type(integer)),
                |_, args| Ok(args[0].clone()),
            );
            Instance::new(class).into_value()
        })
        .collect();
    (table, receivers)
}

/// Benchmark the cache hit path
fn bench_cache_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_hit");

    for shapes in [1usize, 2, 4] {
        let (table, receivers) = setup(shapes);
        let runtime = Runtime::new(table, BinderConfig::default());
        let site = runtime
            .site(CallSiteId::new(1), &OperationDescriptor::call("add", 1))
            .expect("fresh site");
        for receiver in &receivers {
            runtime.dispatch_at(&site, receiver, vec![Value::Int(1)]).expect("warm-up");
        }

        group.bench_with_input(BenchmarkId::new("shapes", shapes), &receivers, |b, receivers| {
            let mut n = 0;
            b.iter(|| {
                n = (n + 1) % receivers.len();
                black_box(runtime.dispatch_at(&site, &receivers[n], vec![Value::Int(1)]))
            });
        });
    }

    group.finish();
}

/// Benchmark the megamorphic path, where every call binds afresh
fn bench_megamorphic(c: &mut Criterion) {
    let (table, receivers) = setup(8);
    let runtime = Runtime::new(table, BinderConfig::default());
    let site = runtime
        .site(CallSiteId::new(1), &OperationDescriptor::call("add", 1))
        .expect("fresh site");
    for _ in 0..3 {
        for receiver in &receivers {
            runtime.dispatch_at(&site, receiver, vec![Value::Int(1)]).expect("warm-up");
        }
    }

    c.bench_function("megamorphic_dispatch", |b| {
        let mut n = 0;
        b.iter(|| {
            n = (n + 1) % receivers.len();
            black_box(runtime.dispatch_at(&site, &receivers[n], vec![Value::Int(1)]))
        });
    });
}

/// Benchmark resolution over overload sets of increasing size
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    let table = ClassTable::new();
    let b = *table.builtins();
    let param_types = [b.object, b.numeric, b.integer, b.float, b.string, b.comparable];

    for count in [2usize, 4, 6] {
        let candidates: Vec<Candidate> = param_types[..count]
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                Candidate::method(MethodId::new(i as u32), "f", b.object)
                    .params([ParamType::Type(*ty), ParamType::Any])
            })
            .collect();
        let args = vec![table.shape_of(&Value::Int(1)), table.shape_of(&Value::str("s"))];

        group.bench_with_input(BenchmarkId::new("candidates", count), &candidates, |bench, candidates| {
            let resolver = OverloadResolver::new(&table);
            bench.iter(|| black_box(resolver.resolve("f", candidates, &args, &[])));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_hit, bench_megamorphic, bench_resolution);
criterion_main!(benches);
