use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kgidx::graph::GraphStore;
use kgidx::indexer::python::PythonAnalyzer;
use kgidx::indexer::scan::ScanOptions;
use kgidx::indexer::{IndexOptions, Indexer};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

fn module_source(index: usize, classes: usize) -> String {
    let mut source = format!("import os\nfrom .shared import Base\n\n\ndef helper_{index}(value):\n    return os.path.join(value)\n");
    for class in 0..classes {
        let _ = write!(
            source,
            "\n\nclass Model{class}(Base):\n    \"\"\"Model {class}.\"\"\"\n\n    def load(self):\n        return helper_{index}(self.save())\n\n    def save(self):\n        return {class}\n"
        );
    }
    source
}

fn write_repo(root: &Path, files: usize) {
    for index in 0..files {
        let dir = root.join(format!("pkg{}", index % 8));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("mod_{index}.py")), module_source(index, 6)).unwrap();
    }
}

fn indexer(options: IndexOptions) -> Indexer {
    let analyzer = PythonAnalyzer::new().unwrap();
    Indexer::with_options(GraphStore::new().into_shared(), Box::new(analyzer), options)
}

fn bench_reindex(c: &mut Criterion) {
    let repo = TempDir::new().unwrap();
    write_repo(repo.path(), 200);

    let mut group = c.benchmark_group("reindex");
    group.sample_size(10);
    for (name, options) in [
        ("containment", IndexOptions::default()),
        ("linked", IndexOptions::all()),
    ] {
        let indexer = indexer(options);
        group.bench_with_input(BenchmarkId::from_parameter(name), &indexer, |b, indexer| {
            b.iter(|| {
                let stats = indexer
                    .reindex(black_box(repo.path()), ScanOptions::default())
                    .unwrap();
                black_box(stats)
            })
        });
    }
    group.finish();
}

fn bench_update_file(c: &mut Criterion) {
    let indexer = indexer(IndexOptions::all());
    for index in 0..100 {
        indexer
            .index_file(&format!("pkg/mod_{index}.py"), &module_source(index, 6), None)
            .unwrap();
    }

    let mut group = c.benchmark_group("update_file");
    for classes in [1, 10, 50] {
        let source = module_source(7, classes);
        group.bench_with_input(BenchmarkId::from_parameter(classes), &source, |b, source| {
            b.iter(|| {
                let outcome = indexer
                    .index_file(black_box("pkg/mod_7.py"), black_box(source), None)
                    .unwrap();
                black_box(outcome)
            })
        });
    }
    group.finish();
}

fn bench_remove_file(c: &mut Criterion) {
    let indexer = indexer(IndexOptions::all());
    let source = module_source(0, 10);
    c.bench_function("update_then_remove", |b| {
        b.iter(|| {
            indexer.index_file("pkg/mod_0.py", &source, None).unwrap();
            black_box(indexer.remove_file(black_box("pkg/mod_0.py")).unwrap())
        })
    });
}

criterion_group!(benches, bench_reindex, bench_update_file, bench_remove_file);
criterion_main!(benches);
