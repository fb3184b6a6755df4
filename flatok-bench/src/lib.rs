//! A test rig for flatok.
//!
//! Real vocabularies like `cl100k_base` are megabytes of data that we don't want to vendor into
//! the repo, so the benchmarks and the large-scale tests run against synthetic vocabularies
//! shaped like the real ones instead: every single byte, then tens of thousands of words built
//! from common English syllables, most with a leading space, plus some multi-byte UTF-8 tokens.
//! Generation is seeded, so a given seed always produces the same vocabulary.
use base64::{engine::general_purpose, Engine as _};
use flatok::{TokenInt, Tokenizer, TrieConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

const SYLLABLES: &[&str] = &[
    "th", "e", "in", "er", "an", "re", "on", "at", "en", "nd", "ti", "es", "or", "te", "of", "ed",
    "is", "it", "al", "ar", "st", "to", "nt", "ng", "se", "ha", "as", "ou", "io", "le", "ve", "co",
    "me", "de", "hi", "ri", "ro", "ic", "ne", "ea", "ra", "ce", "ly", "tion", "ment", "ing", "s",
];

/// Tokens that aren't ASCII, to make sure multi-byte UTF-8 sequences are in the mix
const NON_ASCII: &[&str] = &[
    "\u{e9}", "\u{f1}", "\u{fc}", "\u{2014}", "\u{2019}", "\u{201c}", "\u{201d}", "\u{65e5}\u{672c}",
    " \u{65e5}", "\u{444}\u{43e}", "\u{1f600}", "caf\u{e9}", " na\u{ef}ve",
];

const PUNCTUATION: &[u8] = b" .,;:!?'\"()-\n\t";

/// A generated vocabulary.  The index of each token is its id.
#[derive(Clone, Debug)]
pub struct SyntheticVocab {
    pub tokens: Vec<Vec<u8>>,
}

impl SyntheticVocab {
    /// Generate a vocabulary with up to `words` multi-byte tokens in addition to the 256 single
    /// bytes.  Generated duplicates are dropped, so there may be slightly fewer.
    pub fn generate(seed: u64, words: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut tokens = (0..=u8::MAX).map(|b| vec![b]).collect::<Vec<_>>();
        let mut seen = tokens.iter().cloned().collect::<FxHashSet<_>>();

        let mut push = |token: Vec<u8>, tokens: &mut Vec<Vec<u8>>| {
            if token.len() > 1 && seen.insert(token.clone()) {
                tokens.push(token);
            }
        };

        for token in NON_ASCII {
            push(token.as_bytes().to_vec(), &mut tokens);
        }

        for _ in 0..words {
            let mut word = String::new();
            if rng.gen_bool(0.7) {
                word.push(' ');
            }
            for i in 0..rng.gen_range(1..=4) {
                let syllable = SYLLABLES.choose(&mut rng).copied().unwrap_or("e");
                if i == 0 && rng.gen_bool(0.1) {
                    word.push_str(&syllable.to_uppercase());
                } else {
                    word.push_str(syllable);
                }
            }
            push(word.into_bytes(), &mut tokens);
        }

        Self { tokens }
    }

    /// Render the vocabulary in the tiktoken file format
    pub fn to_tiktoken(&self) -> String {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, bytes)| format!("{} {id}\n", general_purpose::STANDARD.encode(bytes)))
            .collect()
    }

    /// Build a tokenizer for this vocabulary, going through the tiktoken format like a real
    /// vocabulary would
    pub fn tokenizer(&self) -> flatok::Result<Tokenizer> {
        let config = TrieConfig {
            require_byte_coverage: true,
            ..Default::default()
        };
        Tokenizer::from_tiktoken_bytes(self.to_tiktoken().as_bytes(), config)
    }

    /// The bytes of the token with the given id
    pub fn token_bytes(&self, token: TokenInt) -> Option<&[u8]> {
        self.tokens.get(token as usize).map(Vec::as_slice)
    }

    /// Produce `len` bytes of text made mostly of this vocabulary's words, with punctuation and
    /// the occasional arbitrary byte mixed in.
    pub fn random_text(&self, rng: &mut impl Rng, len: usize) -> Vec<u8> {
        let words = &self.tokens[256..];
        let mut text = Vec::with_capacity(len + 16);

        while text.len() < len {
            match rng.gen_range(0..100) {
                0..=84 if !words.is_empty() => {
                    if let Some(word) = words.choose(rng) {
                        text.extend_from_slice(word);
                    }
                }
                0..=94 => {
                    if let Some(p) = PUNCTUATION.choose(rng) {
                        text.push(*p);
                    }
                }
                _ => text.push(rng.gen()),
            }
        }

        text.truncate(len);
        text
    }
}

/// A seeded random number generator, for reproducible test inputs
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
