//! Greedy longest-match encoding of bytes into tokens.
//!
//! Encoding proceeds in attempts.  Each attempt starts at the trie root at some position in the
//! input and walks down the trie one input byte at a time, remembering the longest token it has
//! passed through.  The attempt ends when the walk hits a dead end or the end of the input.  The
//! longest token found is emitted, and the next attempt starts right after it, no matter how much
//! further the walk went.  If the attempt found no token at all, not even for its first byte, the
//! input can't be encoded with this vocabulary.
//!
//! There is no lookahead and no backtracking over alternative segmentations: once a token is
//! emitted it is never reconsidered.  Since no state carries over from one attempt to the next,
//! encoding the input up to any token boundary yields exactly the tokens before that boundary.
use crate::error::*;
use crate::trie::{Trie, NONE};
use crate::{Result, TokenInt};

/// Find the longest token that is a prefix of `text[start..]`.
///
/// Returns the end position of that token in `text` and its id, or `None` if not even the byte at
/// `start` is a token.
#[inline]
pub(crate) fn longest_match(trie: &Trie, text: &[u8], start: usize) -> Option<(usize, TokenInt)> {
    let children = trie.children.as_slice();
    let token_ids = trie.token_ids.as_slice();

    let mut found = None;
    let mut block = 0usize;

    for (offset, &b) in text[start..].iter().enumerate() {
        let slot = block + b as usize;

        let token = token_ids[slot];
        if token != NONE {
            found = Some((start + offset + 1, token));
        }

        match children[slot] {
            NONE => break,
            child => block = child as usize,
        }
    }

    found
}

fn out_of_vocabulary<T>(text: &[u8], position: usize) -> Result<T> {
    OutOfVocabularySnafu {
        position,
        byte: text[position],
    }
    .fail()
}

/// Encode `text`, appending the tokens to `out`.
///
/// If the text can't be encoded, `out` is left as it was before the call.
pub fn encode_into(trie: &Trie, text: &[u8], out: &mut Vec<TokenInt>) -> Result<()> {
    let original_len = out.len();

    let mut pos = 0;
    while pos < text.len() {
        match longest_match(trie, text, pos) {
            Some((end, token)) => {
                out.push(token);
                pos = end;
            }
            None => {
                out.truncate(original_len);
                return out_of_vocabulary(text, pos);
            }
        }
    }

    Ok(())
}

/// Encode `text` into a sequence of token ids.
///
/// The empty input encodes to no tokens.
pub fn encode(trie: &Trie, text: &[u8]) -> Result<Vec<TokenInt>> {
    let mut tokens = Vec::with_capacity(estimate_num_tokens(trie, text.len()));
    encode_into(trie, text, &mut tokens)?;

    Ok(tokens)
}

/// Count the tokens `text` encodes to, without keeping them
pub fn count_tokens(trie: &Trie, text: &[u8]) -> Result<usize> {
    let mut count = 0;
    let mut pos = 0;

    while pos < text.len() {
        match longest_match(trie, text, pos) {
            Some((end, _)) => {
                count += 1;
                pos = end;
            }
            None => return out_of_vocabulary(text, pos),
        }
    }

    Ok(count)
}

/// Make an educated guess as to the number of tokens in `len` bytes of input.
///
/// We know the mean length of a token in the vocabulary, and assume the input is full of mean
/// tokens.  It's not precise but it's much better than no pre-allocation at all.
pub(crate) fn estimate_num_tokens(trie: &Trie, len: usize) -> usize {
    let mean = trie.mean_token_len();
    (len + mean - 1) / mean
}
