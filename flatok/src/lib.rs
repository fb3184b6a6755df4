use std::path::Path;
use std::sync::Arc;

pub mod batch;
pub mod encoder;
mod error;
mod iterator;
mod token;
pub mod trie;
pub mod vocab;

pub use error::*;
pub use iterator::*;
pub use token::*;
pub use trie::{DuplicatePolicy, Trie, TrieBuilder, TrieConfig, TrieStats};
pub use vocab::VocabEntry;

pub type Result<T> = std::result::Result<T, FlatokError>;

/// A tokenizer for one vocabulary.
///
/// With this it's possible to encode arbitrary bytes into a sequence of token ids, using the
/// greedy longest-match policy: at every position, the longest token that matches the input there
/// is taken, and matching continues right after it.
///
/// Instances of `Tokenizer` are light weight and can be very cheaply cloned.  They are also thread
/// safe; the vocabulary trie is built once and never modified after that, so any number of threads
/// can encode with the same instance (or clones of it) at the same time without any locking.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    trie: Arc<Trie>,
}

impl Tokenizer {
    /// Create a tokenizer which encodes with an already built trie
    pub fn new(trie: Trie) -> Self {
        Self {
            trie: Arc::new(trie),
        }
    }

    /// Load a tiktoken vocabulary file and build a tokenizer for it.
    ///
    /// This is expensive for large vocabularies; build the tokenizer once and clone it.
    pub fn from_tiktoken_file(path: impl AsRef<Path>, config: TrieConfig) -> Result<Self> {
        Trie::from_tiktoken_file(path, config).map(Self::new)
    }

    /// Build a tokenizer from the contents of a tiktoken vocabulary file.
    pub fn from_tiktoken_bytes(data: &[u8], config: TrieConfig) -> Result<Self> {
        Trie::from_tiktoken_bytes(data, config).map(Self::new)
    }

    /// The vocabulary trie this tokenizer encodes with
    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    /// Make an educated guess as to the number of likely tokens in some input.
    ///
    /// This is not a precise calculation, but it's a good enough estimate for most purposes.  For
    /// example if you want to pre-allocate a Vec to hold the tokens for some text, this is a good
    /// choice for the target capacity.
    pub fn estimate_num_tokens(&self, text: impl AsRef<[u8]>) -> usize {
        encoder::estimate_num_tokens(&self.trie, text.as_ref().len())
    }

    /// Encode the input into a sequence of token ids.
    ///
    /// The input doesn't need to be valid UTF-8; any bytes can be encoded, as long as the
    /// vocabulary has a single-byte token for every byte value that occurs.  If it doesn't, this
    /// fails with [`FlatokError::OutOfVocabulary`] naming the first position that couldn't be
    /// encoded.
    pub fn encode(&self, text: impl AsRef<[u8]>) -> Result<Vec<TokenInt>> {
        encoder::encode(&self.trie, text.as_ref())
    }

    /// Like [`Self::encode`] but appends to an existing vector, so a buffer can be reused across
    /// many inputs.  On failure `out` is left as it was.
    pub fn encode_into(&self, text: impl AsRef<[u8]>, out: &mut Vec<TokenInt>) -> Result<()> {
        encoder::encode_into(&self.trie, text.as_ref(), out)
    }

    /// Encode lazily, yielding each token along with the range of input bytes it covers.
    pub fn encode_iter<'a>(&'a self, text: &'a [u8]) -> EncodeIterator<'a> {
        EncodeIterator::new(&self.trie, text)
    }

    /// Count the tokens in the input, without allocating memory to hold them.
    pub fn count_tokens(&self, text: impl AsRef<[u8]>) -> Result<usize> {
        encoder::count_tokens(&self.trie, text.as_ref())
    }

    /// Split the input bytes into two parts: the bytes of the first `max_tokens` tokens, and all
    /// of the rest, if there is any rest.
    ///
    /// Use this when you don't actually care about the tokens, but you need to keep the input
    /// under some token limit.  Encoding the first part on its own produces exactly its share of
    /// the tokens of the whole input, because no encoding decision depends on anything after the
    /// token being decided.
    ///
    /// Note that this is only available for byte slices and not strings, because the tokens don't
    /// necessarily fall on UTF-8 character boundaries.
    pub fn first_n_tokens<'text>(
        &self,
        text: &'text [u8],
        max_tokens: usize,
    ) -> Result<(&'text [u8], Option<&'text [u8]>)> {
        let mut end = 0;
        for token in EncodeIterator::new(&self.trie, text).take(max_tokens) {
            end = token?.range.end;
        }

        if end == text.len() {
            Ok((text, None))
        } else {
            let (head, tail) = text.split_at(end);
            Ok((head, Some(tail)))
        }
    }

    /// Encode many inputs on multiple threads.  See [`batch::encode_batch`].
    pub fn encode_batch<T>(&self, inputs: &[T], threads: usize) -> Vec<Result<Vec<TokenInt>>>
    where
        T: AsRef<[u8]> + Sync,
    {
        batch::encode_batch(&self.trie, inputs, threads)
    }
}

impl From<Trie> for Tokenizer {
    fn from(trie: Trie) -> Self {
        Self::new(trie)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// The vocabulary from the scenario every greedy tokenizer should get right: "a", "b", "ab",
    /// and every other byte value
    fn tokenizer() -> Tokenizer {
        let mut builder = TrieBuilder::new(TrieConfig::default());
        builder.insert(b"a", 0).unwrap();
        builder.insert(b"b", 1).unwrap();
        builder.insert(b"ab", 2).unwrap();

        let mut next_id = 3;
        for b in (0..=u8::MAX).filter(|b| *b != b'a' && *b != b'b') {
            builder.insert(&[b], next_id).unwrap();
            next_id += 1;
        }

        builder.finish().unwrap().into()
    }

    #[test]
    fn scenario() {
        let tokenizer = tokenizer();
        let c = tokenizer.trie().exact_match("c").unwrap();

        assert_eq!(tokenizer.encode("ab").unwrap(), vec![2]);
        assert_eq!(tokenizer.encode("ac").unwrap(), vec![0, c]);
        assert_eq!(tokenizer.encode("").unwrap(), Vec::<TokenInt>::new());
    }

    #[test]
    fn clones_share_the_trie() {
        let tokenizer = tokenizer();
        let clone = tokenizer.clone();

        assert!(std::ptr::eq(tokenizer.trie(), clone.trie()));

        let handle = std::thread::spawn(move || clone.encode("abab").unwrap());
        assert_eq!(handle.join().unwrap(), tokenizer.encode("abab").unwrap());
    }

    #[test]
    fn first_n_tokens() {
        let tokenizer = tokenizer();
        let text = b"abcab";

        assert_eq!(
            tokenizer.first_n_tokens(text, 0).unwrap(),
            (&b""[..], Some(&text[..]))
        );
        assert_eq!(
            tokenizer.first_n_tokens(text, 2).unwrap(),
            (&b"abc"[..], Some(&b"ab"[..]))
        );
        assert_eq!(tokenizer.first_n_tokens(text, 3).unwrap(), (&text[..], None));
        assert_eq!(
            tokenizer.first_n_tokens(text, 100).unwrap(),
            (&text[..], None)
        );
        assert_eq!(tokenizer.first_n_tokens(b"", 1).unwrap(), (&b""[..], None));
    }

    #[test]
    fn first_n_tokens_only_fails_inside_the_limit() {
        let tokenizer: Tokenizer = Trie::from_entries([("a", 0)], TrieConfig::default())
            .unwrap()
            .into();

        assert_eq!(
            tokenizer.first_n_tokens(b"aaz", 2).unwrap(),
            (&b"aa"[..], Some(&b"z"[..]))
        );
        assert_matches!(
            tokenizer.first_n_tokens(b"aaz", 3),
            Err(FlatokError::OutOfVocabulary { position: 2, .. })
        );
    }

    #[test]
    fn iterator_and_count_agree_with_encode() {
        let tokenizer = tokenizer();
        let text = b"abba cabbage";

        let tokens = tokenizer.encode(text).unwrap();
        let from_iter = tokenizer
            .encode_iter(text)
            .map(|m| m.map(|m| m.token))
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(tokens, from_iter);
        assert_eq!(tokenizer.count_tokens(text).unwrap(), tokens.len());
        assert!(tokenizer.estimate_num_tokens(text) >= 1);
    }
}
