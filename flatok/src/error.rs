use crate::TokenInt;
use snafu::Snafu;
use std::fmt;
use std::path::PathBuf;

/// Where in the vocabulary a problematic entry came from.
///
/// Entries read from a tiktoken file are located by their line number, entries passed in
/// programmatically by their position in the input sequence.  Both are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryLocation {
    Line(usize),
    Entry(usize),
}

impl fmt::Display for EntryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryLocation::Line(line) => write!(f, "line {line}"),
            EntryLocation::Entry(index) => write!(f, "entry {index}"),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FlatokError {
    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "Malformed vocabulary {at}: expected a base64 token and an integer id, found {fields} field(s)"
    ))]
    MalformedLine {
        at: EntryLocation,
        fields: usize,
    },

    #[snafu(display("Invalid base64 token on vocabulary {at}"))]
    InvalidBase64 {
        at: EntryLocation,
        source: base64::DecodeError,
    },

    #[snafu(display("Invalid token id '{value}' on vocabulary {at}"))]
    InvalidTokenId {
        at: EntryLocation,
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Vocabulary {at} has an empty token; the empty string can't be a token"))]
    EmptyToken { at: EntryLocation },

    #[snafu(display(
        "Token id {token} on vocabulary {at} is out of range; ids must be less than {}",
        TokenInt::MAX
    ))]
    TokenIdOutOfRange {
        at: EntryLocation,
        token: TokenInt,
    },

    #[snafu(display(
        "Vocabulary {at} repeats a token already assigned id {existing} (new id {token})"
    ))]
    DuplicateToken {
        at: EntryLocation,
        existing: TokenInt,
        token: TokenInt,
    },

    #[snafu(display("Vocabulary {at} reuses token id {token} for a different byte string"))]
    DuplicateTokenId {
        at: EntryLocation,
        token: TokenInt,
    },

    #[snafu(display(
        "Vocabulary has no single-byte token for {} byte value(s): {missing:02x?}",
        missing.len()
    ))]
    MissingByteCoverage { missing: Vec<u8> },

    #[snafu(display("Vocabulary trie needs {slots} slots, which exceeds the 32-bit address space"))]
    TrieTooLarge { slots: usize },

    #[snafu(display("No token matches byte 0x{byte:02x} at input position {position}"))]
    OutOfVocabulary { position: usize, byte: u8 },
}
