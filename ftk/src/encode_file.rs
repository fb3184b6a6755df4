//! Tokenizing a file line by line and writing out the token listing.
//!
//! The listing has, for every input line: the line itself, the number of tokens on that line, then
//! each token id, each on a line of its own.  Lines are split on `\n` only, and are written back
//! exactly as they were read, so a `\r` before the `\n` is part of the line and gets tokenized.
//! The input doesn't need to be valid UTF-8.
//!
//! Inputs can be many gigabytes, so they're streamed: lines are read in batches of roughly
//! [`BATCH_BYTES`], each batch is encoded on the blocking thread pool, and its listing is written
//! out before the next batch is read.
use anyhow::Context;
use flatok::{TokenInt, Tokenizer};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::*;

/// How many bytes of input lines to read before encoding them
pub const BATCH_BYTES: usize = 16 * 1024 * 1024;

/// What happened while encoding a file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodeReport {
    pub lines: usize,
    pub tokens: usize,

    /// Bytes of input, not counting the line separators
    pub bytes: usize,

    /// Time spent encoding, not counting reading the input or writing the output
    pub encode_time: Duration,
}

impl EncodeReport {
    /// Encoding throughput in gigabytes per second
    pub fn gb_per_sec(&self) -> f64 {
        let nanos = self.encode_time.as_nanos();
        if nanos == 0 {
            0.0
        } else {
            // bytes per nanosecond is the same as gigabytes per second
            self.bytes as f64 / nanos as f64
        }
    }
}

impl fmt::Display for EncodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines, {} tokens, {} bytes encoded in {:.6}s ({:.3} GB/s)",
            self.lines,
            self.tokens,
            self.bytes,
            self.encode_time.as_secs_f64(),
            self.gb_per_sec()
        )
    }
}

/// Read lines until at least `batch_bytes` bytes have been read, or the input ends.
///
/// Lines are split the way `getline` does: a final `\n` ends the last line rather than starting
/// an empty one, and empty input has no lines at all.  The `\n` is not part of the line.
pub async fn read_batch<R>(reader: &mut R, batch_bytes: usize) -> std::io::Result<Vec<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut bytes = 0;

    while bytes < batch_bytes {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }

        bytes += line.len() + 1;
        lines.push(line);
    }

    Ok(lines)
}

/// Write the token listing for `lines`, whose tokens are in `tokens`
pub fn write_listing<L: AsRef<[u8]>>(
    out: &mut impl Write,
    lines: &[L],
    tokens: &[Vec<TokenInt>],
) -> std::io::Result<()> {
    for (line, tokens) in lines.iter().zip(tokens) {
        out.write_all(line.as_ref())?;
        writeln!(out)?;
        writeln!(out, "{}", tokens.len())?;
        for token in tokens {
            writeln!(out, "{token}")?;
        }
    }

    Ok(())
}

/// The result of encoding one batch of lines
struct EncodedBatch {
    listing: Vec<u8>,
    tokens: usize,
    encode_time: Duration,
}

/// Encode one batch of lines, the first of which is line `first_line` (1-based) of the input.
/// Fails on the first line that can't be encoded.
fn encode_batch(
    tokenizer: &Tokenizer,
    lines: &[Vec<u8>],
    first_line: usize,
    threads: usize,
) -> anyhow::Result<EncodedBatch> {
    let started = Instant::now();
    let results = tokenizer.encode_batch(lines, threads);
    let encode_time = started.elapsed();

    let mut tokens = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        tokens.push(result.with_context(|| format!("Failed to encode line {}", first_line + index))?);
    }

    let mut listing = Vec::new();
    write_listing(&mut listing, lines, &tokens)?;

    Ok(EncodedBatch {
        listing,
        tokens: tokens.iter().map(Vec::len).sum(),
        encode_time,
    })
}

/// Encode every line read from `reader`, writing the listing to `writer` one batch at a time.
///
/// If a line can't be encoded, the listings of the batches before it have already been written.
pub async fn encode_stream<R, W>(
    tokenizer: &Tokenizer,
    mut reader: R,
    mut writer: W,
    threads: usize,
    batch_bytes: usize,
) -> anyhow::Result<EncodeReport>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut report = EncodeReport::default();

    loop {
        let lines = read_batch(&mut reader, batch_bytes)
            .await
            .context("Failed to read input")?;
        if lines.is_empty() {
            break;
        }

        let first_line = report.lines + 1;
        report.lines += lines.len();
        report.bytes += lines.iter().map(Vec::len).sum::<usize>();

        let batch = tokio::task::spawn_blocking({
            let tokenizer = tokenizer.clone();
            move || encode_batch(&tokenizer, &lines, first_line, threads)
        })
        .await??;
        trace!(
            first_line,
            lines = report.lines + 1 - first_line,
            tokens = batch.tokens,
            "Encoded batch"
        );

        report.tokens += batch.tokens;
        report.encode_time += batch.encode_time;

        writer
            .write_all(&batch.listing)
            .await
            .context("Failed to write output")?;
    }

    writer.flush().await.context("Failed to write output")?;

    Ok(report)
}

/// Encode every line of the file at `input`, writing the listing to `output`
pub async fn encode_file(
    tokenizer: Tokenizer,
    input: &Path,
    output: &Path,
    threads: usize,
) -> anyhow::Result<EncodeReport> {
    let reader = File::open(input)
        .await
        .with_context(|| format!("Failed to read input file '{}'", input.display()))?;
    let writer = File::create(output)
        .await
        .with_context(|| format!("Failed to write output file '{}'", output.display()))?;
    debug!(input = %input.display(), output = %output.display(), "Encoding file");

    encode_stream(
        &tokenizer,
        BufReader::new(reader),
        BufWriter::new(writer),
        threads,
        BATCH_BYTES,
    )
    .await
    .with_context(|| format!("Failed to tokenize '{}'", input.display()))
}
