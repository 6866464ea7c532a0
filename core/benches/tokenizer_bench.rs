use criterion::{criterion_group, criterion_main, Criterion};
use linkdex_core::tokenizer::tokenize;

fn bench_tokenize(c: &mut Criterion) {
    let text = "The Honda Civic is a line of cars manufactured by Honda. ".repeat(200);
    c.bench_function("tokenize_page", |b| b.iter(|| tokenize(&text).count()));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
