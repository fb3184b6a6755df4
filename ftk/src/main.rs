use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use flatok::{DuplicatePolicy, Tokenizer, TrieConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Instant;
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

mod encode_file;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Globals {
    /// Turn debugging information on.  Repeat for more detail: `-d` logs progress and timings,
    /// `-dd` construction details, `-ddd` everything.  `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

/// Where to find the vocabulary, and how strictly to check it
#[derive(Args)]
struct VocabArgs {
    /// Vocabulary file in the tiktoken format (one `<base64 token> <id>` per line)
    #[arg(long, value_name = "FILE", env = "FTK_VOCAB")]
    vocab: PathBuf,

    /// What to do when the vocabulary has the same token more than once: `reject` or `last-wins`
    #[arg(long, default_value_t = DuplicatePolicy::Reject)]
    duplicates: DuplicatePolicy,

    /// Refuse vocabularies that don't have a single-byte token for every byte value
    #[arg(long)]
    strict_coverage: bool,
}

impl VocabArgs {
    fn config(&self) -> TrieConfig {
        TrieConfig {
            duplicates: self.duplicates,
            require_byte_coverage: self.strict_coverage,
        }
    }

    /// Build the tokenizer.  This is blocking and for big vocabularies takes a while, so it's done
    /// on the blocking thread pool.
    async fn load(&self) -> anyhow::Result<Tokenizer> {
        let path = self.vocab.clone();
        let config = self.config();

        let started = Instant::now();
        let tokenizer = tokio::task::spawn_blocking({
            let path = path.clone();
            move || Tokenizer::from_tiktoken_file(path, config)
        })
        .await?
        .with_context(|| format!("Failed to load vocabulary '{}'", path.display()))?;

        let stats = tokenizer.trie().stats();
        info!(
            vocab = %path.display(),
            tokens = stats.tokens,
            blocks = stats.blocks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded vocabulary"
        );

        Ok(tokenizer)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize every line of a file.
    ///
    /// For each input line, the output has the line itself, then the number of tokens, then each
    /// token id, each on its own line.  A summary with the encoding throughput is printed when
    /// done.
    Encode {
        #[command(flatten)]
        vocab: VocabArgs,

        /// File to tokenize, one input per line
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Where to write the tokens
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Number of threads to encode with; 0 means one per CPU
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },

    /// Print the size of a vocabulary's trie, and any byte values it can't encode
    Inspect {
        #[command(flatten)]
        vocab: VocabArgs,
    },

    /// Tokenize the text given on the command line and print the token ids
    Tokens {
        #[command(flatten)]
        vocab: VocabArgs,

        text: String,
    },
}

impl Commands {
    async fn execute(self, _globals: &Globals) -> anyhow::Result<()> {
        use Commands::*;
        match self {
            Encode {
                vocab,
                input,
                output,
                threads,
            } => {
                let tokenizer = vocab.load().await?;
                let report = encode_file::encode_file(tokenizer, &input, &output, threads).await?;

                info!(
                    input = %input.display(),
                    output = %output.display(),
                    lines = report.lines,
                    tokens = report.tokens,
                    bytes = report.bytes,
                    encode_ns = report.encode_time.as_nanos() as u64,
                    gb_per_sec = report.gb_per_sec(),
                    "Encoded file"
                );
                println!("{report}");
            }
            Inspect { vocab } => {
                let tokenizer = vocab.load().await?;
                write_inspection(&mut std::io::stdout().lock(), &vocab.vocab, &tokenizer)?;
            }
            Tokens { vocab, text } => {
                let tokenizer = vocab.load().await?;
                println!("{}", token_line(&tokenizer, &text)?);
            }
        }

        Ok(())
    }
}

/// Describe the trie built from the vocabulary at `path`
fn write_inspection(
    out: &mut impl Write,
    path: &Path,
    tokenizer: &Tokenizer,
) -> std::io::Result<()> {
    let trie = tokenizer.trie();
    let stats = trie.stats();

    writeln!(out, "Vocabulary: {}", path.display())?;
    writeln!(out, "  tokens:          {}", stats.tokens)?;
    writeln!(out, "  mean token len:  {}", trie.mean_token_len())?;
    writeln!(out, "  blocks:          {}", stats.blocks)?;
    writeln!(out, "  slots:           {}", stats.slots)?;
    writeln!(out, "  memory:          {} bytes", stats.memory_bytes)?;

    let missing = trie.missing_single_bytes();
    if missing.is_empty() {
        writeln!(out, "  byte coverage:   complete")
    } else {
        writeln!(
            out,
            "  byte coverage:   {} byte value(s) have no token: {missing:02x?}",
            missing.len()
        )
    }
}

/// Encode `text` and render the token ids separated by spaces
fn token_line(tokenizer: &Tokenizer, text: &str) -> anyhow::Result<String> {
    let tokens = tokenizer
        .encode(text)
        .context("Failed to tokenize text")?;

    Ok(tokens
        .iter()
        .map(|token| token.to_string())
        .collect::<Vec<_>>()
        .join(" "))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Log events are JSON on stderr, so they never mix with output on stdout
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Err(e) = cli.command.execute(&cli.globals).await {
        error!("{:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}
