use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use conceptlogic::construct::Context;
use conceptlogic::serialize::{read_triples_str, write_triples};

fn interning(c: &mut Criterion) {
    c.bench_function("intern 1000 literals", |b| {
        b.iter(|| {
            let context = Context::new().unwrap();
            for i in 0..1000u32 {
                // 100 distinct values, so most constructions hit the keeper
                context.string(format!("literal {}", i % 100)).unwrap();
            }
            black_box(context.len().unwrap())
        })
    });
}

fn claim_graph(context: &Context, claims: usize) {
    let authority = context.authority(b"bench.authority".as_slice()).unwrap();
    let predicate = context
        .referenced(b"bench.hasValue".as_slice(), vec![])
        .unwrap();
    for i in 0..claims {
        let subject = context
            .referenced(format!("bench.subject.{}", i).into_bytes(), vec![])
            .unwrap();
        let assertion = context
            .assertion(
                subject,
                predicate.clone(),
                context.number(i as i64).unwrap(),
            )
            .unwrap();
        let source = context
            .referenced(format!("bench.source.{}", i).into_bytes(), vec![])
            .unwrap();
        let claim = context
            .source_based_claim(assertion, authority.clone(), source)
            .unwrap();
        context.register(&claim).unwrap();
    }
}

fn round_trip(c: &mut Criterion) {
    let context = Context::new().unwrap();
    claim_graph(&context, 100);
    let loaded = context.loaded_concepts().unwrap();
    c.bench_function("write 100 claims", |b| {
        b.iter(|| {
            let mut sink = Vec::new();
            write_triples(&loaded, &mut sink, &context).unwrap();
            black_box(sink.len())
        })
    });
    let mut sink = Vec::new();
    write_triples(&loaded, &mut sink, &context).unwrap();
    let text = String::from_utf8(sink).unwrap();
    c.bench_function("read 100 claims", |b| {
        b.iter(|| {
            let fresh = Context::new().unwrap();
            black_box(read_triples_str(&text, &fresh).unwrap().len())
        })
    });
}

criterion_group!(benches, interning, round_trip);
criterion_main!(benches);
