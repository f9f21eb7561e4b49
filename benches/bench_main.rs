#![allow(clippy::unwrap_used)]

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use gisp::{Gisp, Value, parser};

const SIMPLE: &str = "(+ 1 2)";
const NESTED: &str = "(= (* (+ 1 2) (- 10 4)) (len (list 1 2 3)))";
const BRACKETS: &str = "xs[1] xs[0:8:2] xs[-1] m[\"k\"]";
const PROGRAM: &str = r#"
    ; build, mutate and read back a small table
    (var row (list 1 2 3 4))
    (var table (dict "a" row "b" (list 5 6)))
    (set row[0] 10)
    (set table["c"] (+ row[0] row[-1]))
    table["c"]
"#;

fn fixture() -> Gisp {
    let mut gisp = Gisp::with_core();
    gisp.def_as("xs", Value::list((0..16).map(Value::Int).collect()))
        .unwrap();
    gisp.parse("(var m (dict \"k\" 1))").unwrap();
    gisp
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Parsing");

    group.bench_function("Simple", |b| b.iter(|| parser::parse(black_box(SIMPLE))));

    group.bench_function("Nested", |b| b.iter(|| parser::parse(black_box(NESTED))));

    group.bench_function("Brackets", |b| {
        b.iter(|| parser::parse_program(black_box(BRACKETS)))
    });

    group.bench_function("Program", |b| {
        b.iter(|| parser::parse_program(black_box(PROGRAM)))
    });

    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Evaluation");

    let simple = parser::parse_program(SIMPLE).unwrap();
    let nested = parser::parse_program(NESTED).unwrap();
    let brackets = parser::parse_program(BRACKETS).unwrap();
    let program = parser::parse_program(PROGRAM).unwrap();

    let mut gisp = fixture();
    group.bench_function("Eval Simple", |b| {
        b.iter(|| gisp.eval(black_box(&simple)))
    });

    group.bench_function("Eval Nested", |b| {
        b.iter(|| gisp.eval(black_box(&nested)))
    });

    group.bench_function("Eval Brackets", |b| {
        b.iter(|| gisp.eval(black_box(&brackets)))
    });

    // Defines bindings, so every iteration needs a fresh interpreter
    group.bench_function("Eval Program", |b| {
        b.iter_batched(
            Gisp::with_core,
            |mut fresh| fresh.eval(black_box(&program)),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("Parse and Eval Program", |b| {
        b.iter_batched(
            Gisp::with_core,
            |mut fresh| fresh.parse(black_box(PROGRAM)),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_evaluation);
criterion_main!(benches);
