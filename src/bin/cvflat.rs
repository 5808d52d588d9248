//! cvflat: Flatten connected-vehicle telemetry into tabular records
//!
//! Usage:
//!   # Flatten an NDJSON file of raw WYDOT BSMs, flat NDJSON to stdout
//!   cvflat flatten --pilot wydot --message-type bsm bsm.jsonl
//!
//!   # Read from stdin
//!   cat tim.jsonl | cvflat flatten --pilot thea --message-type tim
//!
//!   # Export one day of a partitioned lake to CSV batches
//!   cvflat export --pilot wydot --message-type tim --input-root ./lake \
//!       --sdate 2020-03-01 --output-dir ./out

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cvflat::export::DEFAULT_OUTPUT_CONVENTION;
use cvflat::flatten::DEFAULT_SEPARATOR;
use cvflat::layout::parse_date_hour;
use cvflat::{
    flatten_stream, CvFlattener, ExportConfig, Exporter, MessageType, NdjsonSink, OutputFormat,
    Provider, RuleSet,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cvflat")]
#[command(about = "Flatten connected-vehicle telemetry into tabular records", long_about = None)]
struct Args {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten newline-delimited raw records to flat NDJSON on stdout
    Flatten {
        #[arg(long, value_enum)]
        pilot: Provider,

        #[arg(long, value_enum)]
        message_type: MessageType,

        /// Separator joining nested key names
        #[arg(long, default_value = DEFAULT_SEPARATOR)]
        separator: String,

        /// Input file (use stdin if omitted)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Export an hourly-partitioned record lake to batched output files
    Export {
        #[arg(long, value_enum)]
        pilot: Provider,

        #[arg(long, value_enum)]
        message_type: MessageType,

        /// Root of the {pilot}/{TYPE}/YYYY/MM/DD/HH layout
        #[arg(long, value_name = "DIR")]
        input_root: PathBuf,

        /// First hour, e.g. 2020-03-01 or 2020-03-01T05
        #[arg(long)]
        sdate: String,

        /// Exclusive end hour (default: sdate + 24 hours)
        #[arg(long)]
        edate: Option<String>,

        #[arg(long, short = 'o', value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Output file name template
        #[arg(long, default_value = DEFAULT_OUTPUT_CONVENTION)]
        output_convention: String,

        /// Write raw records as NDJSON instead of flattened CSV
        #[arg(long)]
        json: bool,

        /// Flush an output file once more than this many records are pending
        #[arg(long, default_value_t = cvflat::export::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    match args.command {
        Command::Flatten {
            pilot,
            message_type,
            separator,
            input,
        } => {
            let flattener =
                CvFlattener::new(RuleSet::for_stream(pilot, message_type).with_separator(separator));
            let mut sink = NdjsonSink::new(BufWriter::new(io::stdout().lock()));

            let summary = match input {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    flatten_stream(BufReader::new(file), &flattener, &mut sink)?
                }
                None => flatten_stream(io::stdin().lock(), &flattener, &mut sink)?,
            };
            info!(
                records = summary.records_written,
                skipped = summary.skipped,
                "flatten finished"
            );
        }
        Command::Export {
            pilot,
            message_type,
            input_root,
            sdate,
            edate,
            output_dir,
            output_convention,
            json,
            batch_size,
        } => {
            let config = ExportConfig {
                provider: pilot,
                message_type,
                input_root,
                output_dir,
                start: parse_date_hour(&sdate)?,
                end: edate.as_deref().map(parse_date_hour).transpose()?,
                output_convention,
                format: if json { OutputFormat::Json } else { OutputFormat::Csv },
                batch_size,
            };

            let summary = Exporter::new(config).run()?;
            for path in &summary.outputs {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}
