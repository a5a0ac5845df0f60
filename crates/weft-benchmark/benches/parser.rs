use std::hint::black_box;

use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use weft_engine::ParseOptions;
use weft_langs::registry;

fn sum(terms: usize) -> String {
    (1..=terms).map(|n| format!("{n} * ({n} - 1)")).collect::<Vec<_>>().join(" + ")
}

fn nested_list(items: usize) -> String {
    let items: String =
        (0..items).map(|n| format!("  <li class=\"item\">item {n}<br/></li>\n")).collect();
    format!("<div>\n<ul>\n{items}</ul>\n</div>\n")
}

fn benchmark_parser(c: &mut Criterion) {
    let registry = registry().unwrap();
    let inputs = [
        ("calc", "Small", "1 + 2 * 3".to_string()),
        ("calc", "Long", sum(200)),
        ("tags", "Small", "<p>hello <b>world</b></p>".to_string()),
        ("tags", "Long", nested_list(200)),
        ("template", "Long", format!("<p>{{ {} }}</p>", sum(50))),
    ];
    let options = ParseOptions::default();

    let mut group = c.benchmark_group("Parser Benchmark");

    for (name, size, text) in &inputs {
        let language = registry.get(name).unwrap();
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new(*name, size), text, |b, text| {
            b.iter(|| {
                let session = language.parse(text, &options).unwrap();
                black_box(session);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_parser);
criterion_main!(benches);
