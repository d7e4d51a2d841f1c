//! Benchmark for image resolution against the in-memory store

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use vm_image_policy::crd::VirtualMachineImageStatus;
use vm_image_policy::{ImageRecord, ImageResolver, ImageScope, MemoryImageStore};

const NAMESPACE: &str = "bench-namespace";

fn populated_resolver(images_per_scope: usize) -> ImageResolver {
    let mut records = Vec::with_capacity(images_per_scope * 2);
    for i in 0..images_per_scope {
        records.push(ImageRecord::new(
            ImageScope::namespace(NAMESPACE),
            format!("vmi-ns-{:05}", i),
            VirtualMachineImageStatus::named(format!("ns-image-{:05}", i)),
        ));
        records.push(ImageRecord::new(
            ImageScope::Cluster,
            format!("vmi-cl-{:05}", i),
            VirtualMachineImageStatus::named(format!("cl-image-{:05}", i)),
        ));
    }
    ImageResolver::new(Arc::new(MemoryImageStore::from_records(records)))
}

fn bench_resolve(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let resolver = populated_resolver(5_000);

    let mut group = c.benchmark_group("image_resolver");
    group.throughput(Throughput::Elements(1));

    group.bench_function("unique_name", |b| {
        b.to_async(&runtime)
            .iter(|| resolver.resolve(black_box(NAMESPACE), black_box("vmi-cl-02500")));
    });

    group.bench_function("display_name", |b| {
        b.to_async(&runtime)
            .iter(|| resolver.resolve(black_box(NAMESPACE), black_box("cl-image-02500")));
    });

    group.bench_function("not_found", |b| {
        b.to_async(&runtime)
            .iter(|| resolver.resolve(black_box(NAMESPACE), black_box("missing")));
    });

    group.finish();
}

fn bench_store_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_image_store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert", |b| {
        let store = MemoryImageStore::new();
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            store.insert(ImageRecord::new(
                ImageScope::Cluster,
                format!("vmi-{}", counter),
                VirtualMachineImageStatus::named(format!("image-{}", counter % 100)),
            ));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_store_insert);
criterion_main!(benches);
