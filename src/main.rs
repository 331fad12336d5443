mod config;
mod cursor;
mod error;
mod merge;
mod rolling_checksum;
mod search;
mod util;
mod validate;

use anyhow::{bail, Context};
use clap::Parser;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::config::{SearchConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_WINDOW};
use crate::cursor::WindowedCursor;
use crate::error::OverjoinError;
use crate::search::{OverlapSearch, SearchOutcome};
use crate::validate::MatchInfo;

#[derive(Parser)]
#[command(
    name = "overjoin",
    about = "Find where the end of FILE1 reappears in FILE2 and join them without repeating the overlap"
)]
struct Cli {
    /// File whose trailing bytes are searched for
    file1: PathBuf,
    /// File expected to repeat the end of FILE1 somewhere inside it
    file2: PathBuf,
    /// Where to write FILE1 followed by the rest of FILE2 past the overlap
    merged: Option<PathBuf>,
    /// Rolling checksum window in bytes
    #[arg(long, short, default_value_t = DEFAULT_WINDOW)]
    window: usize,
    /// Shortest overlap to accept, in bytes (defaults to the window)
    #[arg(long, short)]
    min_overlap: Option<u64>,
    /// Read buffer size per input, in bytes
    #[arg(long, short, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_size: usize,
    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            if let Some(err) = e.downcast_ref::<OverjoinError>() {
                tracing::debug!(
                    code = ?err.code(),
                    kind = %err.code(),
                    config = err.is_config(),
                    os_error = ?err.os_error(),
                    "run failed"
                );
            }
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = SearchConfig::new(cli.window).with_buffer_capacity(cli.buffer_size);
    if let Some(bytes) = cli.min_overlap {
        config = config.with_min_overlap(bytes);
    }
    config.validate().context("Invalid configuration")?;

    if let Some(merged) = &cli.merged {
        for input in [&cli.file1, &cli.file2] {
            if util::same_file(input, merged)? {
                bail!(
                    "Output file cannot also be one of the input files: {}",
                    merged.display()
                );
            }
        }
    }

    println!("Searching for overlap...");
    println!("  File1: {}", cli.file1.display());
    println!("  File2: {}", cli.file2.display());
    println!("  Window: {} bytes", config.window);

    let start = Instant::now();

    let (window, capacity) = (config.window, config.buffer_capacity);
    let path1 = cli.file1.clone();
    let path2 = cli.file2.clone();
    let (file1, file2) = tokio::try_join!(
        tokio::task::spawn_blocking(move || WindowedCursor::open(&path1, window, capacity)),
        tokio::task::spawn_blocking(move || WindowedCursor::open(&path2, window, capacity)),
    )?;
    let file1 = file1?;
    let file2 = file2?;
    let file1_length = file1.total_length();

    let mut search = OverlapSearch::new(file1, file2, config.min_overlap());
    let (outcome, overlap, rejected) = tokio::task::spawn_blocking(
        move || -> anyhow::Result<(SearchOutcome, Option<MatchInfo>, u64)> {
            let outcome = search.run_with_progress(|position| {
                tracing::debug!(position, "scanning file2");
                ControlFlow::Continue(())
            })?;
            let overlap = match &outcome {
                SearchOutcome::Found(join) => Some(search.measure_overlap(join)?),
                _ => None,
            };
            Ok((outcome, overlap, search.rejected_candidates()))
        },
    )
    .await??;

    let join = match (outcome, overlap) {
        (SearchOutcome::Found(join), Some(overlap)) => {
            let run = overlap.matching_bytes;
            println!(
                "\nFound overlap of {} bytes at offset {} of {}.",
                run,
                file1_length - run.min(file1_length),
                cli.file1.display()
            );
            println!("  Join offset in file2: {}", join.offset);
            println!(
                "  Footer verified: {} of {} bytes",
                join.footer.matching_bytes, join.footer.total_bytes
            );
            println!("  Rejected checksum collisions: {}", rejected);
            println!("  Overlap starts in file2 at: {}", join.offset - run);
            println!(
                "  Confidence: {:.2}% ({} of {} bytes matched)",
                overlap.confidence(),
                overlap.matching_bytes,
                overlap.total_bytes
            );
            join
        }
        (SearchOutcome::Interrupted { position }, _) => {
            bail!("Search interrupted at offset {position}")
        }
        _ => {
            println!("\nFailed to find overlap.");
            println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
            return Ok(ExitCode::from(1));
        }
    };

    match cli.merged {
        Some(merged) => {
            let (path1, path2, out) = (cli.file1.clone(), cli.file2.clone(), merged.clone());
            let summary = tokio::task::spawn_blocking(move || {
                merge::merge_files(&path1, &path2, join.offset, &out)
            })
            .await?
            .with_context(|| format!("Failed to write merged file: {}", merged.display()))?;

            println!("\nWrote merged file {}.", merged.display());
            println!("  Bytes from file1: {}", summary.file1_bytes);
            println!("  Bytes from file2: {}", summary.file2_bytes);
            println!("  Total bytes: {}", summary.bytes_written());
            println!("  BLAKE3: {}", summary.blake3.to_hex());
        }
        None => println!("\nNot writing output file since none supplied."),
    }
    println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());

    Ok(ExitCode::SUCCESS)
}
