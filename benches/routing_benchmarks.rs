//! # 路由决策基准测试

use criterion::{Criterion, criterion_group, criterion_main};
use repo_proxy::config::builtin_mirrors;
use repo_proxy::proxy::{HeuristicClassifier, RequestRouter};
use repo_proxy::registry::Registry;
use std::hint::black_box;
use std::sync::Arc;

const PATHS: &[&str] = &[
    "/maven/central/org/apache/commons/commons-lang3/3.14.0/commons-lang3-3.14.0.jar",
    "/com/google/guava/guava/32.1.2-jre/guava-32.1.2-jre.pom",
    "/simple/requests/",
    "/@babel/core",
    "/golang.org/x/text/@v/v0.14.0.info",
    "/dists/jammy/InRelease",
    "/favicon.ico",
];

/// 完整路由决策：前缀匹配 + 启发式分类
pub fn routing_benchmark(c: &mut Criterion) {
    let registry = Arc::new(Registry::from_mirrors(&builtin_mirrors()).unwrap());
    let router = RequestRouter::new(registry, true).unwrap();

    c.bench_function("route_decide_mixed", |b| {
        b.iter(|| {
            for path in PATHS {
                let _ = black_box(router.decide(black_box(path)));
            }
        });
    });

    c.bench_function("route_decide_explicit", |b| {
        b.iter(|| router.decide(black_box(PATHS[0])));
    });
}

/// 单独的分类器开销
pub fn classifier_benchmark(c: &mut Criterion) {
    let classifier = HeuristicClassifier::new().unwrap();

    c.bench_function("classify_maven_artifact", |b| {
        b.iter(|| classifier.classify(black_box(PATHS[1])));
    });

    c.bench_function("classify_unmatched", |b| {
        b.iter(|| classifier.classify(black_box(PATHS[6])));
    });
}

criterion_group!(benches, routing_benchmark, classifier_benchmark);
criterion_main!(benches);
