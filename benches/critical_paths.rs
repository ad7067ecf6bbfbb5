//! Criterion benchmarks for Beluga critical paths
//!
//! - Tokenizer: markup matching inside one message
//! - Parser: whole-script parsing
//! - Pipeline: parse, validate and timeline compilation
//! - Renderer: drawing one chat card

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgb, Rgba, RgbaImage};
use std::path::PathBuf;

use beluga::models::{Character, SoundEffect};
use beluga::parser::parse_script;
use beluga::pipeline::compile_script;
use beluga::registry::{CharacterRegistry, Registries, SoundRegistry};
use beluga::renderer::{CardRenderer, Renderer};
use beluga::tokenizer::tokenize;
use beluga::validate::ValidationRules;

const CAST: [&str; 4] = ["Alex", "Bob", "Carol", "Dana"];

// =============================================================================
// Test Data Generators
// =============================================================================

/// Message text with `n` formatted words and a mention
fn make_message(n: usize) -> String {
    let words: Vec<String> = (0..n)
        .map(|i| match i % 4 {
            0 => format!("**bold{}**", i),
            1 => format!("__it{}__", i),
            2 => format!("__**both{}**__", i),
            _ => format!("plain{}", i),
        })
        .collect();
    format!("@Bob {}", words.join(" "))
}

/// A script of `events` events spread over the cast
fn make_script(events: usize) -> String {
    let mut out = String::new();
    for i in 0..events {
        if i % 10 == 0 {
            out.push_str(&format!("WELCOME {}$^1.5#!pop\n", CAST[i % CAST.len()]));
            continue;
        }
        if i % 5 == 1 {
            out.push_str(&format!("\n{}:\n", CAST[(i / 5) % CAST.len()]));
        }
        out.push_str(&format!("{}$^2.25\n", make_message(6)));
    }
    out
}

fn make_registries() -> Registries {
    let mut characters = CharacterRegistry::new();
    for (i, name) in CAST.iter().enumerate() {
        characters.register(Character {
            name: name.to_string(),
            color: Rgb([40 * i as u8, 120, 200]),
            avatar: PathBuf::from(format!("{}.png", name)),
        });
    }
    let mut sounds = SoundRegistry::new();
    sounds.register(SoundEffect { name: "pop".to_string(), asset: PathBuf::from("pop.mp3") });
    Registries::new(characters, sounds)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");
    for words in [4, 32, 256] {
        let text = make_message(words);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &text, |b, text| {
            b.iter(|| tokenize(black_box(text)))
        });
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_script");
    for events in [10, 100, 1000] {
        let source = make_script(events);
        group.throughput(Throughput::Elements(events as u64));
        group.bench_with_input(BenchmarkId::from_parameter(events), &source, |b, source| {
            b.iter(|| parse_script(black_box(source)))
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let registries = make_registries();
    let rules = ValidationRules::default();
    let mut group = c.benchmark_group("compile_script");
    for events in [10, 100, 1000] {
        let source = make_script(events);
        group.throughput(Throughput::Elements(events as u64));
        group.bench_with_input(BenchmarkId::from_parameter(events), &source, |b, source| {
            b.iter(|| compile_script(black_box(source), &registries, &rules))
        });
    }
    group.finish();
}

fn bench_renderer(c: &mut Criterion) {
    let temp = tempfile::TempDir::new().expect("should create temp dir");
    let avatar = temp.path().join("bob.png");
    RgbaImage::from_pixel(128, 128, Rgba([90, 140, 200, 255]))
        .save(&avatar)
        .expect("should write avatar");
    let character = Character { name: "Bob".to_string(), color: Rgb([237, 66, 69]), avatar };

    let source = format!("Bob:\n{}$^2\n", make_message(12));
    let script = parse_script(&source).expect("bench script should parse");
    let event = script.iter().next().expect("one event").clone();

    let mut group = c.benchmark_group("render_card");
    for (width, height) in [(640, 360), (1280, 720)] {
        let renderer = CardRenderer::new(width, height);
        group.bench_function(BenchmarkId::from_parameter(format!("{}x{}", width, height)), |b| {
            b.iter(|| renderer.render(black_box(&event), &character))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_parser, bench_compile, bench_renderer);
criterion_main!(benches);
