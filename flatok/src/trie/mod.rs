//! The vocabulary automaton: a trie over byte strings, stored as two flat arrays.
//!
//! The trie is an arena of blocks, each 256 slots wide, one slot per possible next byte.  The
//! root's block occupies slots `[0, 256)`.  The node reached from the block based at `p` by the
//! byte `b` lives in slot `p + b`.  Each slot carries two values, stored in two parallel vectors:
//!
//! - `children[slot]`: the base of the block holding that node's own children, or [`NONE`] if the
//!   node has no children.
//! - `token_ids[slot]`: the id of the token whose bytes are exactly the path from the root to that
//!   node, or [`NONE`] if no token ends there.
//!
//! A full block is reserved for every node that has at least one child, including for bytes that
//! never occur at that position.  That wastes memory, but it makes every step through the trie a
//! single add and a single array load, which is what makes encoding fast.
use crate::vocab;
use crate::{Result, TokenInt};
use std::path::Path;

mod builder;

pub use builder::{DuplicatePolicy, TrieBuilder, TrieConfig};

/// Width of a block; one slot for each possible byte value
pub(crate) const BLOCK: usize = 256;

/// Sentinel for "no child block" and "no token" in the backing arrays
pub(crate) const NONE: u32 = u32::MAX;

/// An immutable vocabulary trie.
///
/// Once built, a `Trie` is never modified, so it can be shared freely between threads.  See
/// [`crate::Tokenizer`] for a cheaply clonable handle around a shared `Trie`.
#[derive(Clone, Debug)]
pub struct Trie {
    pub(crate) children: Vec<u32>,
    pub(crate) token_ids: Vec<u32>,

    /// Number of slots which carry a token id
    tokens: usize,

    /// Total length in bytes of all tokens
    token_bytes: usize,
}

/// Size information about a built trie
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrieStats {
    /// Number of tokens in the trie
    pub tokens: usize,

    /// Number of 256-slot blocks allocated, including the root block
    pub blocks: usize,

    /// Total number of slots, which is `blocks * 256`
    pub slots: usize,

    /// Heap memory used by the two backing arrays
    pub memory_bytes: usize,
}

impl Trie {
    /// Build a trie from an in-memory list of `(bytes, id)` pairs.
    ///
    /// Errors are reported with the 1-based position of the offending pair.
    pub fn from_entries<I, B>(entries: I, config: TrieConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (B, TokenInt)>,
        B: AsRef<[u8]>,
    {
        let entries = entries.into_iter().collect::<Vec<_>>();

        let total_bytes = entries.iter().map(|(bytes, _)| bytes.as_ref().len()).sum();
        let mut builder = TrieBuilder::with_capacity(total_bytes, config);

        for (bytes, token) in &entries {
            builder.insert(bytes.as_ref(), *token)?;
        }

        builder.finish()
    }

    /// Build a trie from the contents of a tiktoken vocabulary file.
    ///
    /// The data is parsed twice: once to add up the decoded length of every token so the backing
    /// arrays can be reserved up front, and again to insert each token.  A malformed line fails the
    /// first pass, so nothing is inserted from a vocabulary that isn't entirely valid.
    pub fn from_tiktoken_bytes(data: &[u8], config: TrieConfig) -> Result<Self> {
        let mut total_bytes = 0;
        for entry in vocab::entries(data) {
            total_bytes += entry?.bytes.len();
        }

        let mut builder = TrieBuilder::with_capacity(total_bytes, config);
        for entry in vocab::entries(data) {
            let entry = entry?;
            builder.insert_at(&entry.bytes, entry.token, entry.location)?;
        }

        builder.finish()
    }

    /// Read a tiktoken vocabulary file and build a trie from it.
    pub fn from_tiktoken_file(path: impl AsRef<Path>, config: TrieConfig) -> Result<Self> {
        let data = vocab::read_file(path.as_ref())?;

        Self::from_tiktoken_bytes(&data, config)
    }

    pub(crate) fn from_parts(
        children: Vec<u32>,
        token_ids: Vec<u32>,
        tokens: usize,
        token_bytes: usize,
    ) -> Self {
        debug_assert_eq!(children.len(), token_ids.len());
        debug_assert_eq!(children.len() % BLOCK, 0);

        Self {
            children,
            token_ids,
            tokens,
            token_bytes,
        }
    }

    /// Number of tokens in the vocabulary this trie was built from
    pub fn len(&self) -> usize {
        self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens == 0
    }

    /// The mean length of a token in bytes, rounded down but never less than 1.
    ///
    /// This is used when we need to estimate how many tokens are likely to be in some input.
    pub fn mean_token_len(&self) -> usize {
        if self.tokens == 0 {
            1
        } else {
            (self.token_bytes / self.tokens).max(1)
        }
    }

    /// Look up the id of the token whose bytes are exactly `bytes`, if there is one.
    pub fn exact_match(&self, bytes: impl AsRef<[u8]>) -> Option<TokenInt> {
        let (last, path) = bytes.as_ref().split_last()?;

        let mut block = 0usize;
        for &b in path {
            match self.children[block + b as usize] {
                NONE => return None,
                child => block = child as usize,
            }
        }

        match self.token_ids[block + *last as usize] {
            NONE => None,
            token => Some(token),
        }
    }

    /// Byte values which don't have a single-byte token.
    ///
    /// Any input containing one of these bytes will fail to encode.  For a well-formed byte-level
    /// vocabulary this is empty.
    pub fn missing_single_bytes(&self) -> Vec<u8> {
        missing_single_bytes(&self.token_ids)
    }

    pub fn stats(&self) -> TrieStats {
        let slots = self.children.len();

        TrieStats {
            tokens: self.tokens,
            blocks: slots / BLOCK,
            slots,
            memory_bytes: (self.children.capacity() + self.token_ids.capacity())
                * std::mem::size_of::<u32>(),
        }
    }
}

/// The root block is the first block, so the single-byte tokens are in the first 256 slots
fn missing_single_bytes(token_ids: &[u32]) -> Vec<u8> {
    (0..=u8::MAX)
        .filter(|&b| token_ids[b as usize] == NONE)
        .collect()
}
