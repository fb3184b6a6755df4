//! Encoding throughput, and the cost of building the trie in the first place.
//!
//! Encoding is reported in bytes per second, since that's the number that matters when the input
//! is gigabytes of text.  The inputs are synthetic; see the crate docs for why.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flatok::{Trie, TrieConfig};
use flatok_bench::{rng, SyntheticVocab};

const VOCAB_SEED: u64 = 42;

pub fn encode_benchmark(c: &mut Criterion) {
    let vocab = SyntheticVocab::generate(VOCAB_SEED, 50_000);
    let tokenizer = vocab.tokenizer().unwrap();

    let mut group = c.benchmark_group("encode");

    for len in [64usize, 4 * 1024, 1024 * 1024] {
        let text = vocab.random_text(&mut rng(len as u64), len);
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::new("encode", len), &text, |b, text| {
            b.iter(|| tokenizer.encode(text).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("count_tokens", len), &text, |b, text| {
            b.iter(|| tokenizer.count_tokens(text).unwrap())
        });

        // Reusing one output buffer avoids an allocation per call
        let mut out = Vec::new();
        group.bench_with_input(BenchmarkId::new("encode_into", len), &text, |b, text| {
            b.iter(|| {
                out.clear();
                tokenizer.encode_into(text, &mut out).unwrap();
            })
        });
    }

    // Many short lines, the way the command line tool sees its input
    let mut line_rng = rng(7);
    let lines = (0..10_000)
        .map(|_| vocab.random_text(&mut line_rng, 120))
        .collect::<Vec<_>>();
    let total_bytes = lines.iter().map(Vec::len).sum::<usize>() as u64;
    group.throughput(Throughput::Bytes(total_bytes));

    for threads in [1usize, 4, 0] {
        group.bench_with_input(
            BenchmarkId::new("encode_batch", threads),
            &threads,
            |b, threads| b.iter(|| tokenizer.encode_batch(&lines, *threads)),
        );
    }

    group.finish();
}

pub fn build_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for words in [1_000usize, 50_000] {
        let vocab = SyntheticVocab::generate(VOCAB_SEED, words);
        let tiktoken = vocab.to_tiktoken();

        group.bench_with_input(
            BenchmarkId::new("from_tiktoken_bytes", words),
            &tiktoken,
            |b, tiktoken| {
                b.iter(|| Trie::from_tiktoken_bytes(tiktoken.as_bytes(), TrieConfig::default()))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, encode_benchmark, build_benchmark);
criterion_main!(benches);
