//! Performance benchmarks for extmanifest.
//!
//! Run with: cargo bench
//!
//! Target performance:
//! - Pattern match: < 1µs
//! - Full manifest load: < 100µs

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use extmanifest::extensions::{ExtensionId, SchemeMask};
use extmanifest::{CreationFlags, ExtensionLoader, Location, UrlPattern, UrlPatternSet};
use serde_json::json;
use url::Url;

/// Benchmark pattern parsing.
fn bench_pattern_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_parse");

    let patterns = [
        ("all_urls", "<all_urls>"),
        ("subdomain", "https://*.example.com/*"),
        ("port", "http://localhost:8080/app/*"),
        ("file", "file:///home/*"),
    ];

    for (name, pattern) in patterns {
        group.bench_with_input(BenchmarkId::from_parameter(name), &pattern, |b, pattern| {
            b.iter(|| black_box(UrlPattern::parse(SchemeMask::ALL, black_box(pattern))))
        });
    }

    group.finish();
}

/// Benchmark URL matching against a single pattern and a pattern set.
fn bench_pattern_match(c: &mut Criterion) {
    let pattern = UrlPattern::parse(SchemeMask::ALL, "https://*.example.com/app/*").unwrap();
    let hit = Url::parse("https://www.example.com/app/page?q=1").unwrap();
    let miss = Url::parse("https://www.example.org/app/page").unwrap();

    let mut group = c.benchmark_group("pattern_match");

    group.bench_function("single_hit", |b| b.iter(|| black_box(pattern.matches_url(&hit))));
    group.bench_function("single_miss", |b| b.iter(|| black_box(pattern.matches_url(&miss))));

    // A set the size of a large host permission list
    let hosts: Vec<String> = (0..200)
        .map(|i| format!("https://*.site{}.com/*", i))
        .collect();
    let set = UrlPatternSet::parse(SchemeMask::ALL, &hosts).unwrap();
    let last = Url::parse("https://www.site199.com/").unwrap();
    group.bench_function("set_200", |b| b.iter(|| black_box(set.matches_url(&last))));

    group.finish();
}

/// Benchmark id derivation from paths and keys.
fn bench_id_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("id_derivation");

    group.bench_function("for_path", |b| {
        b.iter(|| black_box(ExtensionId::for_path(black_box(Path::new("/opt/extensions/reader")))))
    });

    group.bench_function("generate", |b| {
        b.iter(|| black_box(ExtensionId::generate(black_box(&[7u8; 162]))))
    });

    group.finish();
}

/// Benchmark the full load pipeline.
fn bench_manifest_load(c: &mut Criterion) {
    let loader = ExtensionLoader::default();

    let manifests = [
        ("minimal", json!({"name": "Bench", "version": "1.0"})),
        (
            "typical",
            json!({
                "name": "Bench",
                "version": "1.2.3",
                "manifest_version": 2,
                "description": "A typical extension",
                "icons": {"16": "icon16.png", "48": "icon48.png", "128": "icon128.png"},
                "permissions": ["tabs", "storage", "https://*.example.com/", "contextMenus"],
                "optional_permissions": ["history"],
                "background": {"scripts": ["bg.js"], "persistent": false},
                "browser_action": {"default_title": "Bench", "default_popup": "popup.html"},
                "content_scripts": [
                    {"matches": ["https://*.example.com/*"], "js": ["cs.js"], "css": ["cs.css"]},
                    {"matches": ["http://*/*", "https://*/*"], "js": ["all.js"], "run_at": "document_start"}
                ]
            }),
        ),
        (
            "hosted_app",
            json!({
                "name": "Bench App",
                "version": "1",
                "app": {
                    "urls": ["https://app.example.com/", "https://cdn.example.com/app/"],
                    "launch": {"web_url": "https://app.example.com/start", "container": "panel"}
                }
            }),
        ),
    ];

    let mut group = c.benchmark_group("manifest_load");

    for (name, manifest) in &manifests {
        group.bench_with_input(BenchmarkId::from_parameter(name), manifest, |b, manifest| {
            b.iter(|| {
                black_box(loader.load(
                    Path::new("/opt/extensions/bench"),
                    Location::Internal,
                    manifest.clone(),
                    CreationFlags::empty(),
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pattern_parse,
    bench_pattern_match,
    bench_id_derivation,
    bench_manifest_load,
);

criterion_main!(benches);
