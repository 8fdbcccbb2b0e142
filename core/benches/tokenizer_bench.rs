use criterion::{criterion_group, criterion_main, Criterion};
use pubsearch_core::tokenizer::tokenize;

const ABSTRACT: &str = "Computational models of fluid flow are increasingly combined with \
machine learning surrogates. We present a mathematical modelling framework in which \
physics-informed neural networks approximate the Navier-Stokes equations, and we \
evaluate accuracy, stability and cost on benchmark problems from aerodynamics.";

fn bench_tokenize(c: &mut Criterion) {
    let text = ABSTRACT.repeat(50);
    c.bench_function("tokenize_abstracts", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
