use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn module_source(classes: usize) -> String {
    let mut source = String::from("\"\"\"Generated module.\"\"\"\nimport os\nfrom typing import Optional\n\n");
    for i in 0..classes {
        source.push_str(&format!(
            "@dataclass\nclass Model{i}(Base):\n    \"\"\"Model {i}.\"\"\"\n\n    def load(self, key: str, default: Optional[int] = None) -> int:\n        return default or {i}\n\n    async def refresh(self, *args, **kwargs):\n        pass\n\n\ndef build_{i}(value):\n    return Model{i}()\n\n"
        ));
    }
    source
}

fn parse_benchmark(c: &mut Criterion) {
    let small = module_source(1);
    let medium = module_source(20);
    let large = module_source(200);

    let mut group = c.benchmark_group("parse");

    group.throughput(Throughput::Bytes(small.len() as u64));
    group.bench_function("small", |b| {
        b.iter(|| tidemark::parse_source(black_box(&small), "small.py"))
    });

    group.throughput(Throughput::Bytes(medium.len() as u64));
    group.bench_function("medium", |b| {
        b.iter(|| tidemark::parse_source(black_box(&medium), "medium.py"))
    });

    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("large", |b| {
        b.iter(|| tidemark::parse_source(black_box(&large), "large.py"))
    });

    group.finish();
}

fn parallel_parse_benchmark(c: &mut Criterion) {
    use rayon::prelude::*;

    let sources: Vec<String> = (0..64).map(|_| module_source(10)).collect();

    c.bench_function("parse_64_modules_parallel", |b| {
        b.iter(|| {
            sources
                .par_iter()
                .enumerate()
                .map(|(i, s)| tidemark::parse_source(s, &format!("m{}.py", i)).is_ok())
                .filter(|ok| *ok)
                .count()
        })
    });
}

criterion_group!(benches, parse_benchmark, parallel_parse_benchmark);
criterion_main!(benches);
