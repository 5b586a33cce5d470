use criterion::{black_box, criterion_group, criterion_main, Criterion};

use blockquiz_core::parser::{parse_attempt_str, parse_quiz_str};
use blockquiz_core::tree::QuizTree;

fn bench_quiz_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("quiz_parsing");

    // Generate quiz TOML strings of various sizes
    let small_toml = generate_quiz_toml(5);
    let medium_toml = generate_quiz_toml(50);
    let large_toml = generate_quiz_toml(200);

    group.bench_function("5_sections", |b| {
        b.iter(|| parse_quiz_str(black_box(&small_toml), black_box("bench.toml".as_ref())))
    });

    group.bench_function("50_sections", |b| {
        b.iter(|| parse_quiz_str(black_box(&medium_toml), black_box("bench.toml".as_ref())))
    });

    group.bench_function("200_sections", |b| {
        b.iter(|| parse_quiz_str(black_box(&large_toml), black_box("bench.toml".as_ref())))
    });

    group.finish();
}

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");

    for sections in [5usize, 50, 200] {
        let rows = parse_quiz_str(&generate_quiz_toml(sections), "bench.toml".as_ref()).unwrap();
        group.bench_function(format!("{sections}_sections"), |b| {
            b.iter(|| QuizTree::build_from(black_box(&rows)))
        });
    }

    group.finish();
}

fn bench_attempt_parsing(c: &mut Criterion) {
    let mut attempt = String::from("attempt = 1\ndisplayed = [1, 2, 3]\n");
    for element in 1..=200 {
        attempt.push_str(&format!("\n[[grades]]\nelement = {element}\ngrade = 1.5\n"));
    }

    c.bench_function("attempt_parsing", |b| {
        b.iter(|| parse_attempt_str(black_box(&attempt), black_box("attempt.toml".as_ref())))
    });
}

/// A main block with one question, then `n` gated sections of three
/// questions each.
fn generate_quiz_toml(n: usize) -> String {
    let mut s = String::new();
    s.push_str(
        r#"[quiz]
id = 1
name = "Benchmark"

[[blocks]]
id = 1
name = "Main"

[[elements]]
id = 1
block = 1
max_grade = 10.0
target = { question = 1 }
"#,
    );
    let mut element = 1;
    for i in 0..n {
        let block = i + 2;
        let condition = i + 1;
        let threshold = i % 10;
        element += 1;
        s.push_str(&format!(
            r#"
[[blocks]]
id = {block}
name = "Section {i}"
condition = {condition}

[[conditions]]
id = {condition}

[[parts]]
id = {condition}
condition = {condition}
operator = ">="
grade = {threshold}.0
targets = [1]

[[elements]]
id = {element}
block = 1
target = {{ block = {block} }}
"#
        ));
        for q in 0..3 {
            element += 1;
            s.push_str(&format!(
                r#"
[[elements]]
id = {element}
block = {block}
max_grade = 2.0
target = {{ question = {question} }}
"#,
                question = block * 10 + q
            ));
        }
    }
    s
}

criterion_group!(
    benches,
    bench_quiz_parsing,
    bench_tree_build,
    bench_attempt_parsing
);
criterion_main!(benches);
