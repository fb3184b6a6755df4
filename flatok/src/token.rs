use std::ops::Range;

/// A token output by the tokenizer, represented in its integer form as assigned by the
/// vocabulary.
///
/// tiktoken vocabularies assign each token an integer which is also its rank.  This crate doesn't
/// use ranks for anything; the integer is just the identifier of the byte string.  `u32` is wide
/// enough for every published vocabulary, and keeps the trie's backing arrays half the size they
/// would be with `usize`.
pub type TokenInt = u32;

/// A token in its byte string form.
///
/// Token byte strings are arbitrary bytes, and are not guaranteed to be valid UTF-8 on their own.
pub type TokenString = Vec<u8>;

/// A single token found in the input, together with the range of input bytes it covers.
///
/// The ranges of consecutive matches produced for one input are contiguous, and together cover the
/// whole input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenMatch {
    pub token: TokenInt,
    pub range: Range<usize>,
}

impl TokenMatch {
    /// Length of the matched token in bytes
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Always false for matches produced by the encoder
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_length_is_the_range_length() {
        let m = TokenMatch {
            token: 7,
            range: 3..6,
        };

        assert_eq!(m.len(), 3);
        assert!(!m.is_empty());
    }
}
