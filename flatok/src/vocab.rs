//! Reading vocabularies in the "tiktoken" file format.
//!
//! Each line of a tiktoken file is of the form `<base64 token> <id>`, for example `SGVsbG8= 0`
//! where `SGVsbG8=` decodes to `Hello`.  There is no header and no entry count.  The byte strings
//! are arbitrary bytes, which is why they're base64 encoded in the first place.
//!
//! Parsing is lazy: [`entries`] yields one entry per non-blank line, so the trie construction can
//! make its sizing pass and its insertion pass over the same data without ever holding all of the
//! decoded tokens in memory at once.
use crate::error::*;
use crate::{Result, TokenInt, TokenString};
use base64::{engine::general_purpose, Engine as _};
use snafu::ResultExt;
use std::path::Path;

/// A single vocabulary entry: a token's bytes and the integer id assigned to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabEntry {
    pub bytes: TokenString,
    pub token: TokenInt,

    /// Where this entry came from, for error reporting
    pub location: EntryLocation,
}

/// Parse every entry in the contents of a tiktoken file.
///
/// Blank lines are skipped.  Any other line which isn't exactly two whitespace-separated fields,
/// a valid base64 string followed by a decimal integer, yields an error for that line.
pub fn entries(data: &[u8]) -> impl Iterator<Item = Result<VocabEntry>> + '_ {
    data.split(|&b| b == b'\n')
        .enumerate()
        .filter_map(|(index, line)| parse_line(line, index + 1).transpose())
}

/// Parse one line of a tiktoken file.  `line_number` is 1-based and is only used to report
/// errors.
///
/// Returns `Ok(None)` for lines that are blank.
pub fn parse_line(line: &[u8], line_number: usize) -> Result<Option<VocabEntry>> {
    let location = EntryLocation::Line(line_number);

    let mut fields = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|field| !field.is_empty());

    let (token, id) = match (fields.next(), fields.next()) {
        (None, _) => return Ok(None),
        (Some(token), Some(id)) => (token, id),
        (Some(_), None) => return MalformedLineSnafu { at: location, fields: 1usize }.fail(),
    };

    let extra = fields.count();
    snafu::ensure!(
        extra == 0,
        MalformedLineSnafu {
            at: location,
            fields: 2 + extra
        }
    );

    let bytes = general_purpose::STANDARD
        .decode(token)
        .context(InvalidBase64Snafu { at: location })?;

    let id = String::from_utf8_lossy(id);
    let token = id.parse::<TokenInt>().with_context(|_| InvalidTokenIdSnafu {
        at: location,
        value: id.to_string(),
    })?;

    Ok(Some(VocabEntry {
        bytes,
        token,
        location,
    }))
}

/// Read the raw contents of a vocabulary file
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|_| FileIoSnafu {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_simple_lines() {
        let data = b"SGVsbG8= 0\nV29ybGQ= 1\n";
        let parsed = entries(data).collect::<Result<Vec<_>>>().unwrap();

        assert_eq!(
            parsed,
            vec![
                VocabEntry {
                    bytes: b"Hello".to_vec(),
                    token: 0,
                    location: EntryLocation::Line(1)
                },
                VocabEntry {
                    bytes: b"World".to_vec(),
                    token: 1,
                    location: EntryLocation::Line(2)
                },
            ]
        );
    }

    #[test]
    fn tolerates_crlf_tabs_and_blank_lines() {
        let data = b"IQ==\t7\r\n\n   \nIg== 8";
        let parsed = entries(data).collect::<Result<Vec<_>>>().unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].bytes, b"!");
        assert_eq!(parsed[0].token, 7);
        assert_eq!(parsed[1].bytes, b"\"");
        assert_eq!(parsed[1].location, EntryLocation::Line(4));
    }

    #[test]
    fn non_utf8_token_bytes_survive() {
        // 0xff 0xfe is not valid UTF-8
        let entry = parse_line(b"//4= 42", 1).unwrap().unwrap();
        assert_eq!(entry.bytes, vec![0xff, 0xfe]);
        assert_eq!(entry.token, 42);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_matches!(
            parse_line(b"SGVsbG8=", 3),
            Err(FlatokError::MalformedLine {
                at: EntryLocation::Line(3),
                fields: 1
            })
        );
        assert_matches!(
            parse_line(b"SGVsbG8= 1 2", 4),
            Err(FlatokError::MalformedLine { fields: 3, .. })
        );
    }

    #[test]
    fn rejects_bad_base64() {
        assert_matches!(
            parse_line(b"not*base64 1", 9),
            Err(FlatokError::InvalidBase64 {
                at: EntryLocation::Line(9),
                ..
            })
        );
    }

    #[test]
    fn rejects_bad_ids() {
        assert_matches!(
            parse_line(b"SGVsbG8= twelve", 2),
            Err(FlatokError::InvalidTokenId { value, .. }) if value == "twelve"
        );
        assert_matches!(
            parse_line(b"SGVsbG8= -1", 2),
            Err(FlatokError::InvalidTokenId { .. })
        );
    }

    #[test]
    fn errors_stop_at_the_bad_line() {
        let data = b"SGVsbG8= 0\nbroken\nV29ybGQ= 1\n";
        let err = entries(data).collect::<Result<Vec<_>>>().unwrap_err();

        assert_eq!(
            err.to_string(),
            "Malformed vocabulary line 2: expected a base64 token and an integer id, found 1 field(s)"
        );
    }
}
