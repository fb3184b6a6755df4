//! Encoding many inputs at once on multiple threads.
//!
//! The trie is never modified after it's built, so every worker thread reads the same one without
//! any locking.  Inputs are split into one contiguous chunk per thread, which keeps results in
//! input order without any reassembly.
use crate::encoder;
use crate::trie::Trie;
use crate::{Result, TokenInt};
use std::num::NonZeroUsize;
use tracing::*;

/// Resolve the requested thread count, where 0 means one per available CPU
pub fn worker_count(threads: usize) -> usize {
    match threads {
        0 => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
        n => n,
    }
}

/// Encode every input, using up to `threads` threads (0 means one per CPU).
///
/// The result has one entry per input, in the same order.  A failure to encode one input doesn't
/// affect any other.
pub fn encode_batch<T>(trie: &Trie, inputs: &[T], threads: usize) -> Vec<Result<Vec<TokenInt>>>
where
    T: AsRef<[u8]> + Sync,
{
    let threads = worker_count(threads).min(inputs.len());

    if threads <= 1 {
        return inputs
            .iter()
            .map(|input| encoder::encode(trie, input.as_ref()))
            .collect();
    }

    let chunk_size = (inputs.len() + threads - 1) / threads;
    trace!(
        inputs = inputs.len(),
        threads,
        chunk_size,
        "Encoding batch in parallel"
    );

    let mut results = Vec::with_capacity(inputs.len());

    crossbeam::scope(|scope| {
        let workers = inputs
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move |_| {
                    chunk
                        .iter()
                        .map(|input| encoder::encode(trie, input.as_ref()))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        for worker in workers {
            match worker.join() {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    })
    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlatokError;
    use crate::trie::TrieConfig;
    use assert_matches::assert_matches;

    fn trie() -> Trie {
        let singles = (b'a'..=b'z').map(|b| (vec![b], b as TokenInt));
        let pairs = [(b"th".to_vec(), 1000), (b"the".to_vec(), 1001)];

        Trie::from_entries(singles.chain(pairs), TrieConfig::default()).unwrap()
    }

    #[test]
    fn matches_sequential_encoding() {
        let trie = trie();
        let inputs = (0..100)
            .map(|i| "thethe".repeat(i % 7) + &"xyz"[..i % 4])
            .collect::<Vec<_>>();

        for threads in [0, 1, 3, 8, 200] {
            let results = encode_batch(&trie, &inputs, threads);
            assert_eq!(results.len(), inputs.len());

            for (input, result) in inputs.iter().zip(results) {
                assert_eq!(
                    result.unwrap(),
                    encoder::encode(&trie, input.as_bytes()).unwrap()
                );
            }
        }
    }

    #[test]
    fn failures_stay_with_their_input() {
        let trie = trie();
        let inputs: &[&[u8]] = &[b"the", b"THE", b"", b"th"];

        let results = encode_batch(&trie, inputs, 2);

        assert_eq!(results[0].as_ref().unwrap(), &vec![1001]);
        assert_matches!(
            &results[1],
            Err(FlatokError::OutOfVocabulary { position: 0, .. })
        );
        assert!(results[2].as_ref().unwrap().is_empty());
        assert_eq!(results[3].as_ref().unwrap(), &vec![1000]);
    }

    #[test]
    fn empty_batch() {
        let inputs: Vec<String> = Vec::new();
        assert!(encode_batch(&trie(), &inputs, 4).is_empty());
    }

    #[test]
    fn zero_threads_means_all_cpus() {
        assert!(worker_count(0) >= 1);
        assert_eq!(worker_count(5), 5);
    }
}
