use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use wikilink::link::Link;
use wikilink::site::{InterwikiEntry, Site, SiteInfo, SiteRegistry, Sites};
use wikilink::utils;
use wikilink::wikibase::LanguageDict;

fn sites() -> Site {
    let mut registry = SiteRegistry::new();
    registry
        .register_family("wikipedia", ["en", "de"])
        .register_family("wiktionary", ["en"])
        .register(
            SiteInfo::new("wikipedia", "en")
                .with_interwiki(InterwikiEntry::to_site("wikt", "wiktionary", "en")),
        )
        .register(SiteInfo::new("wikipedia", "de"))
        .register(
            SiteInfo::new("wiktionary", "en")
                .with_interwiki(InterwikiEntry::to_site("w", "wikipedia", "en")),
        );
    let sites: Arc<dyn Sites> = Arc::new(registry);
    Site::load(&sites, "wikipedia", "en").unwrap()
}

fn random_title(rng: &mut impl Rng, words: usize) -> String {
    const WORDS: &[&str] = &[
        "main", "page", "Haus", "café", "über", "Straße", "2001", "A_Space", "odyssey", "Ж",
        "&amp;", "%C3%A9", "  ", "foo_bar", "Zürich",
    ];
    let mut title = String::new();
    for i in 0..words {
        if i > 0 {
            title.push(' ');
        }
        title.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
    }
    title
}

fn generate_links(kind: &str, count: u64) -> Vec<String> {
    // generate inputs from fixed seeds
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(count); /* define specific algorithm to ensure reproducibility */
    const PREFIXES: &[&str] = &["", "User:", "Talk:", "Category:", "user_talk:", "File:"];
    const CHAINS: &[&str] = &["de:", "wikt:", "wikt:w:", "wikt:w:de:", ":wikipedia:en:"];

    (0..count)
        .map(|_| {
            let words = rng.gen_range(1..6);
            let title = random_title(&mut rng, words);
            let section = if rng.gen_bool(0.2) { "#Section" } else { "" };
            match kind {
                "Plain" => format!("{title}{section}"),
                "Namespaced" => {
                    let prefix = PREFIXES[rng.gen_range(0..PREFIXES.len())];
                    format!("{prefix}{title}{section}")
                }
                _ => {
                    let chain = CHAINS[rng.gen_range(0..CHAINS.len())];
                    let prefix = PREFIXES[rng.gen_range(0..PREFIXES.len())];
                    format!("{chain}{prefix}{title}{section}|label")
                }
            }
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let source = sites();
    let mut group = c.benchmark_group("parse");
    for kind in ["Plain", "Namespaced", "Interwiki"] {
        for count in [100u64, 1000u64].into_iter() {
            let input = generate_links(kind, count);
            group.bench_with_input(BenchmarkId::new(kind, count), &input, |b, i| {
                b.iter(|| {
                    i.iter()
                        .filter(|text| Link::new(text, &source).parsed().is_ok())
                        .count()
                });
            });
        }
    }
}

fn bench_normalize_title_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_title_text");
    for words in [5usize, 50usize, 500usize].into_iter() {
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(words as u64);
        let input = random_title(&mut rng, words);
        group.bench_with_input(BenchmarkId::new("Decoded", words), &input, |b, i| {
            b.iter(|| {
                utils::normalize_title_text(&utils::decode_percent(&utils::decode_entities(i)))
            });
        });
    }
}

fn bench_labels_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels_diff");
    for languages in [10usize, 100usize, 300usize].into_iter() {
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(languages as u64);
        let baseline: Map<String, Value> = (0..languages)
            .map(|i| {
                let language = format!("l{i}");
                let value = random_title(&mut rng, 3);
                (language.clone(), json!({"language": language, "value": value}))
            })
            .collect();
        let baseline = Value::Object(baseline);
        let mut labels = LanguageDict::from_json(&baseline).unwrap();
        for i in (0..languages).step_by(7) {
            labels.insert(&format!("l{i}"), "changed");
        }

        group.bench_with_input(BenchmarkId::new("Changed", languages), &baseline, |b, i| {
            b.iter(|| labels.to_json(Some(i)).unwrap());
        });
    }
}

criterion_group!(benches, bench_parse, bench_normalize_title_text, bench_labels_diff);
criterion_main!(benches);
