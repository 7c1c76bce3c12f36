//! Identity resolution benchmarks
//!
//! Resolution runs on every authentication request, so it should stay flat
//! as the number of mappings grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use iamk_core::{BackendKind, MappingSet, RoleMapping};
use iamk_resolver::{
    resolve_with_index, CoordinatorConfig, IndexBuilder, InMemoryMappingSource, MappingCoordinator,
    MappingIndex, MappingSource,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

const ACCOUNT: &str = "123456789012";

fn create_test_mappings(count: usize) -> MappingSet {
    (0..count).fold(MappingSet::new(), |set, i| {
        set.with_role(RoleMapping::new(
            format!("arn:aws:iam::{}:role/team-{}/Role{}", ACCOUNT, i % 10, i),
            format!("role-{}:{{{{SessionName}}}}", i),
            vec![format!("group-{}", i % 5), "tenant:{{AccountID}}".to_string()],
        ))
    })
}

fn build_index(count: usize) -> MappingIndex {
    let mut builder = IndexBuilder::new("aws");
    for mapping in create_test_mappings(count).identity_mappings() {
        builder.insert(mapping, BackendKind::MountedFile).unwrap();
    }
    builder.build(1)
}

/// Resolution against indexes of increasing size
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for count in [10, 100, 1000, 10000] {
        let index = build_index(count);
        let target = count / 2;
        let arn = format!(
            "arn:aws:sts::{}:assumed-role/Role{}/session-abc",
            ACCOUNT, target
        );

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("mappings", count), &arn, |b, arn| {
            b.iter(|| black_box(resolve_with_index(&index, arn, ACCOUNT, "session-abc")))
        });
    }

    group.finish();
}

/// Denied lookups and malformed input
fn bench_resolve_miss(c: &mut Criterion) {
    let index = build_index(1000);
    let mut group = c.benchmark_group("resolve_miss");

    group.bench_function("unknown_role", |b| {
        b.iter(|| {
            black_box(resolve_with_index(
                &index,
                "arn:aws:iam::123456789012:role/DoesNotExist",
                ACCOUNT,
                "",
            ))
        })
    });

    group.bench_function("malformed_arn", |b| {
        b.iter(|| black_box(resolve_with_index(&index, "not-an-arn", ACCOUNT, "")))
    });

    group.finish();
}

/// Full rebuild through the coordinator
fn bench_reload(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("reload");

    for count in [100, 1000] {
        let source: Arc<dyn MappingSource> = Arc::new(InMemoryMappingSource::new(
            BackendKind::MountedFile,
            create_test_mappings(count),
        ));
        let coordinator = MappingCoordinator::new(CoordinatorConfig::default(), vec![source]).unwrap();

        group.bench_with_input(BenchmarkId::new("mappings", count), &count, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(coordinator.reload().await.unwrap()) })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_resolve_miss, bench_reload);
criterion_main!(benches);
