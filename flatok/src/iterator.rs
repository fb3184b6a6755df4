//! Encoding as a Rust [`Iterator`], for callers that want to know where in the input each token
//! came from, or that want to stop early.

use crate::encoder::longest_match;
use crate::error::*;
use crate::trie::Trie;
use crate::{Result, TokenMatch};
use std::iter::FusedIterator;

/// Yields the tokens of an input one at a time, along with the input range each one covers.
///
/// If the input can't be encoded, the iterator yields one error for the offending position and
/// then stops.
///
/// See [`crate::Tokenizer::encode_iter`]
#[derive(Clone, Debug)]
pub struct EncodeIterator<'a> {
    trie: &'a Trie,

    /// The input being tokenized
    text: &'a [u8],

    /// Where the next attempt starts
    pos: usize,

    /// Set once an error has been yielded
    failed: bool,
}

impl<'a> EncodeIterator<'a> {
    pub(crate) fn new(trie: &'a Trie, text: &'a [u8]) -> Self {
        Self {
            trie,
            text,
            pos: 0,
            failed: false,
        }
    }

    /// The part of the input that hasn't been tokenized yet
    pub fn remainder(&self) -> &'a [u8] {
        &self.text[self.pos..]
    }
}

impl<'a> Iterator for EncodeIterator<'a> {
    type Item = Result<TokenMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.text.len() {
            return None;
        }

        let start = self.pos;
        match longest_match(self.trie, self.text, start) {
            Some((end, token)) => {
                self.pos = end;
                Some(Ok(TokenMatch {
                    token,
                    range: start..end,
                }))
            }
            None => {
                self.failed = true;
                Some(
                    OutOfVocabularySnafu {
                        position: start,
                        byte: self.text[start],
                    }
                    .fail(),
                )
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Every token is at least one byte long
        let remaining = if self.failed {
            0
        } else {
            self.text.len() - self.pos
        };

        (remaining.min(1), Some(remaining))
    }
}

impl FusedIterator for EncodeIterator<'_> {}
