//! # Translit CLI - Unicode to ASCII transliteration
//!
//! Command-line front end for transliterating text, looking up single
//! characters and inspecting how input bytes decode.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use translit::tables::parse_codepoint;
use translit::{Options, Transliterator};

/// Translit: convert Unicode text to plain ASCII
#[derive(Parser)]
#[command(name = "translit")]
#[command(version, about, long_about = None)]
#[command(author = "Translit Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Transliterate text, a file or stdin
    Run(RunArgs),

    /// Show the replacement for a single character
    Char(CharArgs),

    /// Show how input bytes decode into characters
    Decode(DecodeArgs),
}

#[derive(Args)]
struct TableArgs {
    /// Options file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding table data (bundled tables if not specified)
    #[arg(long, env = "TRANSLIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Language code selecting overrides
    #[arg(short, long)]
    lang: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Text to transliterate (reads input file or stdin if not specified)
    text: Option<String>,

    /// Input file, transliterated line by line
    #[arg(short, long, conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Substitute for characters without a replacement (default: ?)
    #[arg(short, long)]
    unknown: Option<String>,

    /// Maximum output length per line, in characters
    #[arg(short, long)]
    max_length: Option<usize>,

    #[command(flatten)]
    tables: TableArgs,
}

#[derive(Args)]
struct CharArgs {
    /// The character itself, or its codepoint (C4, 0xC4, U+00C4)
    character: String,

    /// Substitute for characters without a replacement (default: ?)
    #[arg(short, long)]
    unknown: Option<String>,

    #[command(flatten)]
    tables: TableArgs,
}

#[derive(Args)]
struct DecodeArgs {
    /// Text to decode (reads input file or stdin if not specified)
    text: Option<String>,

    /// Input file
    #[arg(short, long, conflicts_with = "text")]
    input: Option<PathBuf>,
}

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct RunResult<'a> {
    langcode: &'a str,
    lines: Vec<String>,
}

#[derive(Serialize)]
struct CharResult<'a> {
    codepoint: String,
    langcode: &'a str,
    replacement: String,
}

#[derive(Serialize)]
struct UnitInfo {
    offset: usize,
    bytes: String,
    codepoint: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Run(ref args) => run_command(args, &cli)?,
        Commands::Char(ref args) => char_command(args, &cli)?,
        Commands::Decode(ref args) => decode_command(args, &cli)?,
    }

    Ok(())
}

/// Merge the options file with command-line flags, flags winning
fn resolve_options(tables: &TableArgs) -> Result<Options> {
    let mut options = match tables.config {
        Some(ref path) => Options::from_json_file(path)
            .with_context(|| format!("Failed to load options: {}", path.display()))?,
        None => Options::default(),
    };

    if let Some(ref dir) = tables.data_dir {
        options.data_dir = Some(dir.clone());
    }
    if let Some(ref lang) = tables.lang {
        options.langcode = lang.clone();
    }

    Ok(options)
}

fn build_transliterator(options: &Options) -> Result<Transliterator> {
    let store = options.build_store().with_context(|| match options.data_dir {
        Some(ref dir) => format!("Failed to open table data: {}", dir.display()),
        None => "Failed to open bundled tables".to_string(),
    })?;
    log::debug!("using tables from {}", store.source_name());
    Ok(Transliterator::new(Arc::new(store)))
}

fn read_input(input: Option<&PathBuf>) -> Result<Vec<u8>> {
    match input {
        Some(path) => {
            log::debug!("reading from {}", path.display());
            fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn run_command(args: &RunArgs, cli: &Cli) -> Result<()> {
    let mut options = resolve_options(&args.tables)?;
    if let Some(ref unknown) = args.unknown {
        options.unknown = unknown.clone();
    }
    if args.max_length.is_some() {
        options.max_length = args.max_length;
    }

    let translit = build_transliterator(&options)?;

    let lines: Vec<Vec<u8>> = match args.text {
        Some(ref text) => vec![text.clone().into_bytes()],
        None => {
            let reader: Box<dyn BufRead> = match args.input {
                Some(ref path) => Box::new(BufReader::new(fs::File::open(path).with_context(
                    || format!("Failed to open input file: {}", path.display()),
                )?)),
                None => Box::new(io::stdin().lock()),
            };
            reader
                .split(b'\n')
                .collect::<io::Result<_>>()
                .context("Failed to read input")?
        }
    };

    let mut results = Vec::with_capacity(lines.len());
    for line in &lines {
        let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
        let output = translit
            .run(&options.request(line))
            .context("Transliteration failed")?;
        results.push(output);
    }

    match cli.format {
        OutputFormat::Json => {
            let result = RunResult {
                langcode: &options.langcode,
                lines: results,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            let mut stdout = io::stdout().lock();
            for line in results {
                writeln!(stdout, "{}", line).context("Failed to write to stdout")?;
            }
        }
    }

    Ok(())
}

fn char_command(args: &CharArgs, cli: &Cli) -> Result<()> {
    let options = resolve_options(&args.tables)?;
    let translit = build_transliterator(&options)?;

    let codepoint = parse_character(&args.character)
        .with_context(|| format!("Not a codepoint or single character: {}", args.character))?;
    let unknown = args.unknown.as_deref().unwrap_or(&options.unknown);

    let replacement = translit
        .replace(codepoint, &options.langcode, unknown)
        .context("Lookup failed")?;

    match cli.format {
        OutputFormat::Json => {
            let result = CharResult {
                codepoint: format!("U+{:04X}", codepoint),
                langcode: &options.langcode,
                replacement,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            println!("U+{:04X} [{}] -> {:?}", codepoint, options.langcode, replacement);
        }
    }

    Ok(())
}

/// A lone character stands for itself; anything longer is read as a codepoint
fn parse_character(s: &str) -> Option<u32> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(u32::from(ch)),
        _ => parse_codepoint(s),
    }
}

fn decode_command(args: &DecodeArgs, cli: &Cli) -> Result<()> {
    let data = match args.text {
        Some(ref text) => text.clone().into_bytes(),
        None => read_input(args.input.as_ref())?,
    };

    let mut units = Vec::new();
    let mut offset = 0;
    for unit in translit::decode(&data) {
        let bytes = &data[offset..offset + unit.byte_len];
        units.push(UnitInfo {
            offset,
            bytes: format!("{:02X?}", bytes),
            codepoint: unit.codepoint.map(|ch| format!("U+{:04X}", u32::from(ch))),
        });
        offset += unit.byte_len;
    }

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&units)?);
        }
        OutputFormat::Text => {
            for unit in &units {
                println!(
                    "{:6}  {:24} {}",
                    unit.offset,
                    unit.bytes,
                    unit.codepoint.as_deref().unwrap_or("invalid")
                );
            }
            println!("{} units from {} bytes", units.len(), data.len());
        }
    }

    Ok(())
}
