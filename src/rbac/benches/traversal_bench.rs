//! Traversal benchmarks
//!
//! Query cost over role chains of increasing depth, with and without a
//! cycle closing the chain.

use cretoai_rbac::{Rbac, RbacConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

/// `role-0 -> role-1 -> ... -> role-{depth-1}`, each role holding one permission
async fn build_chain(depth: usize, cyclic: bool) -> Rbac {
    let rbac = Rbac::with_config(RbacConfig::default()).unwrap();

    let names: Vec<String> = (0..depth).map(|i| format!("role-{i}")).collect();
    rbac.create_roles(&names, true).await.unwrap();

    for (i, role) in names.iter().enumerate() {
        let resource = format!("res-{i}");
        rbac.create_permission("read", &resource, true).await.unwrap();
        rbac.grant_by_name(role, &format!("read_{resource}"))
            .await
            .unwrap();
    }

    for pair in names.windows(2) {
        rbac.grant_by_name(&pair[0], &pair[1]).await.unwrap();
    }

    if cyclic && depth > 1 {
        rbac.grant_by_name(&names[depth - 1], &names[0])
            .await
            .unwrap();
    }

    rbac
}

fn bench_can_deepest(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("can_deepest_permission");

    for depth in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, &depth| {
            let rbac = rt.block_on(build_chain(depth, false));
            let resource = format!("res-{}", depth - 1);

            b.to_async(&rt).iter(|| async {
                let allowed = rbac
                    .can(black_box("role-0"), "read", black_box(&resource))
                    .await
                    .unwrap();
                black_box(allowed);
            });
        });
    }

    group.finish();
}

fn bench_scope(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("get_scope");

    for depth in [10, 100, 1000].iter() {
        for cyclic in [false, true] {
            let label = if cyclic { "cyclic" } else { "chain" };
            group.bench_with_input(BenchmarkId::new(label, depth), depth, |b, &depth| {
                let rbac = rt.block_on(build_chain(depth, cyclic));

                b.to_async(&rt).iter(|| async {
                    let scope = rbac.get_scope(black_box("role-0")).await.unwrap();
                    black_box(scope);
                });
            });
        }
    }

    group.finish();
}

fn bench_can_all(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let rbac = rt.block_on(build_chain(100, true));

    let resources: Vec<String> = (0..100).step_by(10).map(|i| format!("res-{i}")).collect();
    let pairs: Vec<(&str, &str)> = resources.iter().map(|r| ("read", r.as_str())).collect();

    c.bench_function("can_all_ten_permissions", |b| {
        b.to_async(&rt).iter(|| async {
            let allowed = rbac.can_all("role-0", black_box(&pairs)).await.unwrap();
            black_box(allowed);
        });
    });
}

criterion_group!(benches, bench_can_deepest, bench_scope, bench_can_all);
criterion_main!(benches);
