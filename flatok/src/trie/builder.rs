use super::{missing_single_bytes, Trie, BLOCK, NONE};
use crate::error::*;
use crate::{Result, TokenInt};
use rustc_hash::FxHashSet;
use snafu::ensure;
use strum::{EnumString, EnumVariantNames};
use tracing::*;

/// What to do when a vocabulary contains the same byte string more than once.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, EnumString, EnumVariantNames, strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail construction if a byte string or a token id appears more than once.
    #[default]
    Reject,

    /// Silently keep the id from the last occurrence of a byte string.  Repeated ids are not
    /// checked at all.
    LastWins,
}

/// Options that control how a [`Trie`] is built from a vocabulary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrieConfig {
    pub duplicates: DuplicatePolicy,

    /// Fail construction unless every byte value has a single-byte token.
    ///
    /// Without this, a vocabulary with gaps still builds (with a warning logged), but inputs
    /// containing the missing bytes will fail to encode.
    pub require_byte_coverage: bool,
}

/// Incrementally builds a [`Trie`].
///
/// Insert every token, then call [`TrieBuilder::finish`] to trim the backing arrays and freeze
/// the result.  Nothing can read from the trie until it's finished.
pub struct TrieBuilder {
    children: Vec<u32>,
    token_ids: Vec<u32>,
    config: TrieConfig,

    /// Number of slots carrying a token id
    tokens: usize,

    /// Sum of the lengths of those tokens
    token_bytes: usize,

    /// Number of calls to `insert`, for locating errors in entries that didn't come from a file
    inserted: usize,

    /// Ids seen so far; only maintained when duplicates are rejected
    seen_ids: FxHashSet<TokenInt>,
}

impl TrieBuilder {
    pub fn new(config: TrieConfig) -> Self {
        Self::with_capacity(0, config)
    }

    /// Start a builder with room reserved for a vocabulary whose tokens add up to `total_bytes`
    /// bytes.
    ///
    /// Every byte of every token could in the worst case open a new block, so reserving one block
    /// per byte (plus the root) guarantees the arrays never reallocate during insertion.  In
    /// practice most of that is never used, and [`TrieBuilder::finish`] gives it back.
    pub fn with_capacity(total_bytes: usize, config: TrieConfig) -> Self {
        let reserved = total_bytes
            .saturating_add(1)
            .saturating_mul(BLOCK)
            .min(NONE as usize);

        let mut children = Vec::with_capacity(reserved);
        let mut token_ids = Vec::with_capacity(reserved);

        // The root block
        children.resize(BLOCK, NONE);
        token_ids.resize(BLOCK, NONE);

        Self {
            children,
            token_ids,
            config,
            tokens: 0,
            token_bytes: 0,
            inserted: 0,
            seen_ids: FxHashSet::default(),
        }
    }

    /// Insert a token.  Errors are located by the 1-based count of calls to `insert`.
    pub fn insert(&mut self, bytes: &[u8], token: TokenInt) -> Result<()> {
        self.inserted += 1;
        self.insert_at(bytes, token, EntryLocation::Entry(self.inserted))
    }

    pub(crate) fn insert_at(
        &mut self,
        bytes: &[u8],
        token: TokenInt,
        location: EntryLocation,
    ) -> Result<()> {
        ensure!(token != NONE, TokenIdOutOfRangeSnafu { at: location, token });
        let Some((last, path)) = bytes.split_last() else {
            return EmptyTokenSnafu { at: location }.fail();
        };

        // Duplicates are rejected before any block is opened, leaving the builder unchanged
        let reject = self.config.duplicates == DuplicatePolicy::Reject;
        if reject {
            if let Some(existing) = self.existing_token(path, *last) {
                return DuplicateTokenSnafu {
                    at: location,
                    existing,
                    token,
                }
                .fail();
            }
            ensure!(
                !self.seen_ids.contains(&token),
                DuplicateTokenIdSnafu { at: location, token }
            );
        }

        // Walk down to the block that holds the final byte, opening blocks along the way
        let mut block = 0usize;
        for &b in path {
            let slot = block + b as usize;
            block = match self.children[slot] {
                NONE => {
                    let child = self.allocate_block()?;
                    self.children[slot] = child;
                    child as usize
                }
                child => child as usize,
            };
        }

        let slot = block + *last as usize;
        match self.token_ids[slot] {
            NONE => {
                self.tokens += 1;
                self.token_bytes += bytes.len();
            }
            existing => {
                debug!(%location, existing, token, "Duplicate token bytes; keeping the later id");
            }
        }
        if reject {
            self.seen_ids.insert(token);
        }
        self.token_ids[slot] = token;

        Ok(())
    }

    /// The id already stored for the token `path` + `last`, found without opening any blocks
    fn existing_token(&self, path: &[u8], last: u8) -> Option<TokenInt> {
        let mut block = 0usize;
        for &b in path {
            match self.children[block + b as usize] {
                NONE => return None,
                child => block = child as usize,
            }
        }

        match self.token_ids[block + last as usize] {
            NONE => None,
            token => Some(token),
        }
    }

    /// Open a new block at the end of the arrays and return its base
    fn allocate_block(&mut self) -> Result<u32> {
        let base = self.children.len();
        let slots = base + BLOCK;
        ensure!(slots <= NONE as usize, TrieTooLargeSnafu { slots });

        self.children.resize(slots, NONE);
        self.token_ids.resize(slots, NONE);

        Ok(base as u32)
    }

    /// Finish building, releasing whatever reserved capacity wasn't needed.
    pub fn finish(mut self) -> Result<Trie> {
        let missing = missing_single_bytes(&self.token_ids);
        if !missing.is_empty() {
            ensure!(
                !self.config.require_byte_coverage,
                MissingByteCoverageSnafu { missing }
            );
            warn!(
                missing = missing.len(),
                "Vocabulary lacks single-byte tokens for some byte values; \
                inputs containing those bytes can't be encoded"
            );
        }

        let reserved = self.children.capacity();
        self.children.shrink_to_fit();
        self.token_ids.shrink_to_fit();

        debug!(
            tokens = self.tokens,
            blocks = self.children.len() / BLOCK,
            reserved_slots = reserved,
            "Vocabulary trie built"
        );

        Ok(Trie::from_parts(
            self.children,
            self.token_ids,
            self.tokens,
            self.token_bytes,
        ))
    }
}
