use criterion::{criterion_group, criterion_main, Criterion};
use dagc_core::config::CompilerConfig;
use dagc_core::dag::{Operator, OperatorKind, UserKind};
use dagc_core::logic::MethodRef;
use dagc_exec::{Binding, Collector, Runtime, UnitInput};

#[path = "../tests/fixtures/mod.rs"]
mod fixtures;

fn grade() -> Operator {
    Operator::builder(OperatorKind::User(UserKind::Branch))
        .method(MethodRef::new("Ops", "grade"))
        .input("in", "Item")
        .output("a", "Item")
        .output("b", "Item")
        .output("c", "Item")
        .build()
}

fn bench_compile(c: &mut Criterion) {
    let op = grade();
    let cached = fixtures::session(CompilerConfig::default());
    cached.compile_operator(&op).unwrap();
    c.bench_function("compile_branch_cached", |b| {
        b.iter(|| {
            let _ = cached.compile_operator(&op).unwrap();
        })
    });

    let uncached = fixtures::session(CompilerConfig::default().with_cache(false));
    c.bench_function("compile_branch_uncached", |b| {
        b.iter(|| {
            let _ = uncached.compile_operator(&op).unwrap();
        })
    });
}

fn bench_route(c: &mut Criterion) {
    let session = fixtures::session(CompilerConfig::default());
    let node = session.compile_operator(&grade()).unwrap();
    let runtime = Runtime::new(fixtures::logic());
    let sink = Collector::new();
    let bindings = (0..3).map(|_| Binding::Sink(sink.clone())).collect();
    let unit = runtime.instantiate_unit(&node.unit, bindings).unwrap();
    let records: Vec<_> = (0..1024).map(|i| fixtures::item(i, (i % 200) as i32)).collect();
    c.bench_function("route_1024_records", |b| {
        b.iter(|| {
            for r in &records {
                unit.run(UnitInput::Record(r.clone())).unwrap();
            }
            sink.take();
        })
    });
}

criterion_group!(benches, bench_compile, bench_route);
criterion_main!(benches);
