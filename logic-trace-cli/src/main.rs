//! Logic Trace CLI Application
//!
//! This is the command-line interface for the logic trace decoder. It uses the
//! logic-trace-decoder library and adds:
//! - Argument parsing and an optional TOML configuration file
//! - Text reports (listing, column projection, CAN and I2C reports, S-records)
//! - JSON dumps of any reconstruction
//! - Writing the SPI binary artifacts to disk

use anyhow::{Context, Result};
use clap::Parser;
use logic_trace_decoder::{
    encode_binary, Decoded, Decoder, DecoderConfig, Protocol, Reconstruction, SpiOutput,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

mod artifacts;
mod config;
mod report;

use config::AppConfig;

/// Logic Trace - Decode logic analyzer table exports
#[derive(Parser, Debug)]
#[command(name = "logic-trace")]
#[command(about = "Reconstruct SPI, CAN and I2C traffic from logic analyzer exports", long_about = None)]
#[command(version)]
struct Args {
    /// Exported analyzer table (CSV)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Analyzer that produced the export: plain, async-serial, spi, i2c or can
    #[arg(short = 'z', long, value_name = "ANALYZER")]
    analyzer: Option<Protocol>,

    /// Extra column names expected in the export (comma separated)
    #[arg(short = 'c', long, value_name = "NAMES", value_delimiter = ',')]
    columns: Vec<String>,

    /// Only list rows matching this pattern (case-insensitive)
    #[arg(short = 'd', long, value_name = "PATTERN")]
    data_filter: Option<String>,

    /// Rows of context to print before each match
    #[arg(short, long, value_name = "COUNT")]
    before: Option<usize>,

    /// Rows of context to print after each match
    #[arg(short, long, value_name = "COUNT")]
    after: Option<usize>,

    /// Only print the non-empty values of this column
    #[arg(short = 'f', long, value_name = "COLUMN")]
    column: Option<String>,

    /// Print SPI reads as S-records
    #[arg(short, long, conflicts_with = "binary")]
    srecord: bool,

    /// Write SPI reads to seq_read.bin and mem_map.bin
    #[arg(long)]
    binary: bool,

    /// Flash device profile for SPI reads
    #[arg(long, value_name = "NAME")]
    device: Option<String>,

    /// I2C address to scan for
    #[arg(long, value_name = "ADDRESS")]
    address: Option<String>,

    /// Group CAN rows into frames and tally identifiers
    #[arg(long)]
    can: bool,

    /// Output file for text reports (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory for binary SPI artifacts (default: current directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dump the reconstruction as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Logic Trace CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", logic_trace_decoder::VERSION);

    let app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let decoder = Decoder::with_devices(decoder_config(&args, &app), app.device_registry())
        .context("Invalid combination of options")?;
    let decoded = decoder
        .decode_file(&args.file)
        .with_context(|| format!("Failed to decode {:?}", args.file))?;

    if let Reconstruction::SpiReads {
        output: SpiOutput::Binary,
        device,
        transactions,
    } = &decoded.reconstruction
    {
        let artifacts = encode_binary(transactions, device.size)
            .with_context(|| format!("Failed to build memory image for {}", device.name))?;
        let dir = args
            .output_dir
            .as_deref()
            .or(app.defaults.output_dir.as_deref())
            .unwrap_or_else(|| Path::new("."));
        artifacts::write_binary_artifacts(dir, &artifacts)?;
    }

    let mut out = open_output(args.output.as_deref())?;
    write_output(&mut out, &decoded, &args, decoder.config().has_context())?;
    out.flush().context("Failed to flush output")?;

    if !decoded.diagnostics.is_empty() {
        log::info!("Finished with {} diagnostics", decoded.diagnostics.len());
    }

    Ok(())
}

/// Merge command-line flags over the configuration file defaults
fn decoder_config(args: &Args, app: &AppConfig) -> DecoderConfig {
    let protocol = args
        .analyzer
        .or(app.defaults.protocol)
        .unwrap_or_default();

    let mut config = DecoderConfig::new()
        .with_protocol(protocol)
        .with_can_special(args.can);

    for column in &args.columns {
        config = config.add_custom_column(column.trim());
    }
    if let Some(pattern) = &args.data_filter {
        config = config.with_filter(pattern);
    }
    config.before = args.before;
    config.after = args.after;
    if let Some(column) = &args.column {
        config = config.with_column(column);
    }
    if let Some(device) = args.device.as_ref().or(app.defaults.device.as_ref()) {
        config = config.with_device(device);
    }
    if let Some(address) = &args.address {
        config = config.with_address(address);
    }
    if args.srecord {
        config = config.with_spi_output(SpiOutput::SRecord);
    } else if args.binary {
        config = config.with_spi_output(SpiOutput::Binary);
    }

    log::debug!("Decoder configuration: {:?}", config);
    config
}

/// Text destination: the `--output` file or stdout
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn write_output<W: Write>(
    out: &mut W,
    decoded: &Decoded,
    args: &Args,
    separated: bool,
) -> Result<()> {
    if args.json {
        serde_json::to_writer_pretty(&mut *out, decoded).context("Failed to serialize results")?;
        writeln!(out)?;
        return Ok(());
    }
    report::write_report(out, decoded, args.column.as_deref(), separated)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
