//! walstore CLI
//!
//! Drives a WAL directory from the command line: append, dump, verify.

use std::fs;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use walstore::{Config, Engine, ScanEnd};

/// walstore CLI
#[derive(Parser, Debug)]
#[command(name = "walctl")]
#[command(about = "Inspect and drive a walstore write-ahead log")]
#[command(version)]
struct Args {
    /// WAL directory
    #[arg(short, long, default_value = "./wal_data")]
    dir: String,

    /// Segment rotation threshold in bytes
    #[arg(short = 's', long, default_value = "16777216")]
    segment_size: u64,

    /// Maximum number of live segment files
    #[arg(short = 'm', long, default_value = "100")]
    max_segments: usize,

    /// Flush to the OS only, without fsync
    #[arg(long)]
    no_force_sync: bool,

    /// Background sync interval in milliseconds
    #[arg(long, default_value = "200")]
    sync_interval_ms: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append one record per payload
    Write {
        /// Payloads to append
        #[arg(required = true)]
        payloads: Vec<String>,
    },

    /// Print every record of every live segment
    Dump,

    /// Scan all segments and report their integrity
    Verify,

    /// Write generated key/value records and report segment sizes
    Demo {
        /// Number of records to write
        #[arg(short, long, default_value = "200")]
        count: usize,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,walstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("walctl v{}", walstore::VERSION);
    tracing::info!("WAL directory: {}", args.dir);

    let config = Config::builder()
        .directory(&args.dir)
        .max_segment_size_bytes(args.segment_size)
        .max_segments(args.max_segments)
        .force_sync(!args.no_force_sync)
        .sync_interval_ms(args.sync_interval_ms)
        .build();

    let engine = match Engine::start(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to start WAL: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&engine, args.command) {
        tracing::error!("Command failed: {}", e);
        let _ = engine.close();
        process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close WAL: {}", e);
        process::exit(1);
    }
}

fn run(engine: &Engine, command: Commands) -> walstore::Result<()> {
    match command {
        Commands::Write { payloads } => {
            for payload in payloads {
                let seq = engine.write(payload.as_bytes())?;
                println!("{}", seq);
            }
            engine.sync()?;
        }
        Commands::Dump => {
            for record in engine.read_all_records()? {
                println!(
                    "#{} @{} crc={:08x} {}",
                    record.sequence_number,
                    record.timestamp,
                    record.checksum,
                    String::from_utf8_lossy(&record.payload)
                );
            }
        }
        Commands::Verify => {
            let (_, result) = engine.recover()?;
            println!("segments scanned:  {}", result.segments_scanned);
            println!("records recovered: {}", result.records_recovered);
            println!("last sequence:     {}", result.last_sequence);
            match result.end {
                ScanEnd::Clean => println!("status:            clean"),
                ScanEnd::TornTail { segment, offset } => {
                    println!("status:            torn tail (segment {}, offset {})", segment, offset)
                }
                ScanEnd::Corrupt { error, .. } => println!("status:            corrupt ({})", error),
            }
        }
        Commands::Demo { count } => {
            let first = engine.last_sequence() + 1;
            for i in first..first + count as u64 {
                let payload = format!(r#"{{"op":{},"key":"key{}","value":"value{}"}}"#, i, i, i);
                engine.write(payload.as_bytes())?;
            }
            engine.sync()?;

            for number in engine.live_segments() {
                let path = engine
                    .directory()
                    .join(walstore::wal::segment_file_name(&engine.config().segment_prefix, number));
                let size = fs::metadata(&path)?.len();
                println!("{}\t{} bytes", path.display(), size);
            }
            println!("last sequence: {}", engine.last_sequence());
        }
    }
    Ok(())
}
