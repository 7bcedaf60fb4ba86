//! Convert command - transcode legacy images and synchronize the store.
//!
//! One item at a time: check the file on disk, ask the sync worker for
//! its registered variants, run cwebp, delete the originals, repoint
//! the database row. URL replacements accumulate in the worker and are
//! applied in one batched pass at the end of the run, interrupted or
//! not.

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use webpsync_db::Credentials;
use webpsync_protocol::defaults::{
    DEFAULT_BATCH_SIZE, DEFAULT_MIN_SIZE_BYTES, DEFAULT_QUALITY, LEGACY_MIME_TYPES,
};
use webpsync_protocol::{paths, Reply, Request};
use webpsync_worker::{Worker, WorkerConfig, WorkerHandle};

use crate::cli::{format_size, parse_size, HelpfulError};
use crate::transcode::{fit_within, Transcoder};

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// WordPress installation root (the directory holding wp-config.php)
    #[arg(long, value_name = "DIR")]
    pub wp_root: PathBuf,

    /// Uploads directory (default: <wp-root>/wp-content/uploads)
    #[arg(long, value_name = "DIR")]
    pub uploads_dir: Option<PathBuf>,

    /// cwebp quality factor
    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Cap the main image width, shrinking proportionally
    #[arg(long, value_name = "PIXELS")]
    pub max_width: Option<u32>,

    /// Cap the main image height, shrinking proportionally
    #[arg(long, value_name = "PIXELS")]
    pub max_height: Option<u32>,

    /// Skip originals smaller than this (bytes, or a suffix like 10KB)
    #[arg(long, value_name = "SIZE")]
    pub min_size: Option<String>,

    /// Replacement pairs folded into one UPDATE statement
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "N")]
    pub batch_size: usize,

    /// Report what would be converted without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Leave the page builder cache in place
    #[arg(long)]
    pub skip_cache_flush: bool,
}

/// Counters printed (and logged) at the end of a run.
#[derive(Debug, Default)]
struct RunStats {
    scanned: usize,
    converted: usize,
    skipped_missing: usize,
    skipped_unreconciled: usize,
    skipped_small: usize,
    skipped_larger: usize,
    transcode_errors: usize,
    sync_errors: usize,
    stat_errors: usize,
    bytes_before: u64,
    bytes_after: u64,
    content_rows: u64,
    document_rows: u64,
    cache_cleared: u64,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let config_path = args.wp_root.join("wp-config.php");
    if !config_path.is_file() {
        return Err(HelpfulError::wp_config_not_found(&config_path).into());
    }
    let credentials = Credentials::from_wp_config(&config_path)?;

    let uploads = super::uploads_dir(&args.wp_root, args.uploads_dir.clone());
    if !uploads.is_dir() {
        return Err(HelpfulError::uploads_dir_not_found(&uploads).into());
    }

    let min_size = match args.min_size.as_deref() {
        Some(raw) => parse_size(raw).map_err(|e| HelpfulError::invalid_size_format(&e))?,
        None => DEFAULT_MIN_SIZE_BYTES,
    };

    // Resolve the encoder before touching anything; a missing cwebp
    // must abort the run up front.
    let transcoder = Transcoder::locate(args.quality)?;
    if (args.max_width.is_some() || args.max_height.is_some()) && !transcoder.can_probe() {
        warn!("identify not found on PATH; --max-width/--max-height are ignored");
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_convert(&args, min_size, credentials, uploads, transcoder))
}

async fn run_convert(
    args: &ConvertArgs,
    min_size: u64,
    credentials: Credentials,
    uploads: PathBuf,
    transcoder: Transcoder,
) -> Result<()> {
    let url = credentials.mysql_url()?;
    let mut conn = webpsync_db::connect(&url)
        .await
        .context("Could not connect to the database")?;
    let tables = credentials.tables();

    let files = webpsync_db::list_legacy_attachments(&mut conn, &tables, LEGACY_MIME_TYPES).await?;
    info!(count = files.len(), "legacy attachments tracked");

    if files.is_empty() {
        println!("Nothing to convert.");
        return Ok(());
    }

    if args.dry_run {
        return dry_run(&uploads, &files, min_size);
    }

    let handle = Worker::spawn(
        conn,
        WorkerConfig {
            tables,
            batch_size: args.batch_size,
        },
    );

    // First Ctrl-C finishes the current item and flushes; a second one
    // exits immediately.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
                warn!("interrupt received; finishing the current item");
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        });
    }

    let mut stats = RunStats::default();
    let started = Instant::now();

    let bar = item_bar(files.len() as u64);
    for file in &files {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        stats.scanned += 1;
        bar.set_message(file.clone());
        process_item(&handle, &transcoder, &uploads, args, min_size, file, &mut stats).await?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    let was_interrupted = interrupted.load(Ordering::SeqCst);
    if was_interrupted {
        warn!("run interrupted; applying what was accumulated");
    }

    flush_phase(&handle, args.skip_cache_flush, &mut stats).await?;
    handle.shutdown().await;

    print_summary(&stats, started.elapsed(), args.skip_cache_flush, was_interrupted);
    Ok(())
}

// ============================================================================
// Per-item pipeline
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    MissingSource,
    Unreconciled,
    TooSmall,
    Convert { size: u64 },
}

/// Steps 1 and 2 of the pipeline: is the source there, and is it big
/// enough to bother with.
fn classify(uploads: &Path, file: &str, min_size: u64) -> io::Result<Disposition> {
    let source = uploads.join(file);
    if !source.exists() {
        if uploads.join(paths::with_webp_extension(file)).exists() {
            return Ok(Disposition::Unreconciled);
        }
        return Ok(Disposition::MissingSource);
    }
    let size = fs::metadata(&source)?.len();
    if size < min_size {
        return Ok(Disposition::TooSmall);
    }
    Ok(Disposition::Convert { size })
}

/// Record a pre-transcode disposition in the counters. The returned
/// size means the item goes on to be converted.
fn record_disposition(
    outcome: io::Result<Disposition>,
    file: &str,
    stats: &mut RunStats,
) -> Option<u64> {
    match outcome {
        Ok(Disposition::Convert { size }) => Some(size),
        Ok(Disposition::MissingSource) => {
            stats.skipped_missing += 1;
            warn!(file, "source file missing; skipped");
            None
        }
        Ok(Disposition::Unreconciled) => {
            stats.skipped_unreconciled += 1;
            warn!(
                file,
                "already converted but the database was never updated; skipped"
            );
            None
        }
        Ok(Disposition::TooSmall) => {
            stats.skipped_small += 1;
            debug!(file, "below the size floor; skipped");
            None
        }
        Err(error) => {
            stats.stat_errors += 1;
            warn!(file, %error, "could not stat the source; skipped");
            None
        }
    }
}

async fn process_item(
    handle: &WorkerHandle,
    transcoder: &Transcoder,
    uploads: &Path,
    args: &ConvertArgs,
    min_size: u64,
    file: &str,
    stats: &mut RunStats,
) -> Result<()> {
    let Some(source_size) = record_disposition(classify(uploads, file, min_size), file, stats)
    else {
        return Ok(());
    };

    // Registered thumbnail files, from the attachment metadata.
    let variants = match handle
        .request(Request::Info {
            file: file.to_string(),
        })
        .await?
    {
        Reply::Thumbs { files } => files,
        Reply::Error { message } => {
            stats.sync_errors += 1;
            warn!(file, %message, "variant lookup failed; skipped");
            return Ok(());
        }
        other => bail!("Unexpected reply to INFO: {:?}", other),
    };

    let source = uploads.join(file);

    // Probe for dimensions only when a bound is set; without identify
    // the image is converted at its original size.
    let mut dimensions = (0, 0);
    let mut resize = None;
    if args.max_width.is_some() || args.max_height.is_some() {
        match transcoder.probe(&source).await {
            Some(probed) => {
                dimensions = probed;
                resize = fit_within(probed, args.max_width, args.max_height);
            }
            None => warn!(file, "dimension probe failed; converting at original size"),
        }
    }
    if let Some(target) = resize {
        dimensions = target;
    }

    let main_webp = match transcoder.convert(&source, resize).await {
        Ok(path) => path,
        Err(error) => {
            stats.transcode_errors += 1;
            warn!(file, %error, "transcode failed");
            return Ok(());
        }
    };

    let webp_size = match fs::metadata(&main_webp) {
        Ok(meta) => meta.len(),
        Err(error) => {
            let _ = fs::remove_file(&main_webp);
            stats.transcode_errors += 1;
            warn!(file, %error, "could not stat the converted file");
            return Ok(());
        }
    };

    // The switch only pays off when the result is strictly smaller.
    if webp_size >= source_size {
        let _ = fs::remove_file(&main_webp);
        stats.skipped_larger += 1;
        info!(file, source_size, webp_size, "webp not smaller; original kept");
        return Ok(());
    }

    let mut produced = vec![main_webp];
    let mut produced_bytes = webp_size;
    let mut originals = vec![source];
    let mut original_bytes = source_size;

    // Variants keep their exact pixel sizes; only the quality applies.
    for variant in &variants {
        let relative = paths::sibling(file, variant);
        let variant_source = uploads.join(&relative);

        if !variant_source.exists() {
            if uploads.join(paths::with_webp_extension(&relative)).exists() {
                debug!(file = %relative, "variant already converted");
                continue;
            }
            warn!(file = %relative, "variant source missing; item rolled back");
            discard(&produced);
            stats.transcode_errors += 1;
            return Ok(());
        }

        let variant_size = fs::metadata(&variant_source).map(|m| m.len()).unwrap_or(0);
        match transcoder.convert(&variant_source, None).await {
            Ok(path) => {
                produced_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                produced.push(path);
                original_bytes += variant_size;
                originals.push(variant_source);
            }
            Err(error) => {
                warn!(file = %relative, %error, "variant transcode failed; item rolled back");
                discard(&produced);
                stats.transcode_errors += 1;
                return Ok(());
            }
        }
    }

    // Point of no return: the originals go away, then the database row
    // is repointed. A crash between the two leaves the pair the next
    // run reports as unreconciled.
    for path in &originals {
        if let Err(error) = fs::remove_file(path) {
            warn!(path = %path.display(), %error, "could not delete the original");
        }
    }

    let new_file = paths::with_webp_extension(file);
    let reply = handle
        .request(Request::Update {
            old_file: file.to_string(),
            new_file: new_file.clone(),
            width: dimensions.0,
            height: dimensions.1,
        })
        .await?;
    match reply {
        Reply::Updated { post_id } => {
            stats.converted += 1;
            stats.bytes_before += original_bytes;
            stats.bytes_after += produced_bytes;
            info!(file, post_id, new_file = %new_file, "converted and synchronized");
        }
        Reply::Error { message } => {
            stats.sync_errors += 1;
            warn!(file, %message, "database update failed");
        }
        other => bail!("Unexpected reply to UPDATE: {:?}", other),
    }

    Ok(())
}

/// Best-effort cleanup of .webp files produced for a rolled-back item.
fn discard(produced: &[PathBuf]) {
    for path in produced {
        let _ = fs::remove_file(path);
    }
}

// ============================================================================
// End-of-run flush
// ============================================================================

async fn flush_phase(handle: &WorkerHandle, skip_cache: bool, stats: &mut RunStats) -> Result<()> {
    let spinner = flush_spinner("Rewriting stored URLs...");
    let reply = handle.request(Request::FlushReplace).await?;
    spinner.finish_and_clear();
    match reply {
        Reply::Replaced {
            content_rows,
            document_rows,
        } => {
            stats.content_rows = content_rows;
            stats.document_rows = document_rows;
            info!(content_rows, document_rows, "replacements applied");
        }
        Reply::Error { message } => {
            stats.sync_errors += 1;
            warn!(%message, "replacement flush failed");
        }
        other => bail!("Unexpected reply to FLUSH-REPLACE: {:?}", other),
    }

    if skip_cache {
        return Ok(());
    }

    let spinner = flush_spinner("Flushing the page builder cache...");
    let reply = handle.request(Request::FlushCache).await?;
    spinner.finish_and_clear();
    match reply {
        Reply::Flushed { cleared } => {
            stats.cache_cleared = cleared;
            info!(cleared, "cache entries dropped");
        }
        Reply::Error { message } => {
            stats.sync_errors += 1;
            warn!(%message, "cache flush failed");
        }
        other => bail!("Unexpected reply to FLUSH-CACHE: {:?}", other),
    }
    Ok(())
}

// ============================================================================
// Dry run and reporting
// ============================================================================

fn dry_run(uploads: &Path, files: &[String], min_size: u64) -> Result<()> {
    let mut convertible = 0usize;
    let mut bytes = 0u64;
    let mut skipped_missing = 0usize;
    let mut skipped_unreconciled = 0usize;
    let mut skipped_small = 0usize;

    for file in files {
        match classify(uploads, file, min_size) {
            Ok(Disposition::Convert { size }) => {
                convertible += 1;
                bytes += size;
                println!("would convert: {} ({})", file, format_size(size));
            }
            Ok(Disposition::MissingSource) => skipped_missing += 1,
            Ok(Disposition::Unreconciled) => {
                skipped_unreconciled += 1;
                println!("unreconciled:  {}", file);
            }
            Ok(Disposition::TooSmall) => skipped_small += 1,
            Err(error) => warn!(file = %file, %error, "could not stat the source"),
        }
    }

    println!();
    println!(
        "Would convert {} file(s), {} on disk.",
        convertible,
        format_size(bytes)
    );
    println!(
        "Skipped: {} missing, {} unreconciled, {} below the size floor.",
        skipped_missing, skipped_unreconciled, skipped_small
    );
    Ok(())
}

fn print_summary(stats: &RunStats, elapsed: Duration, skip_cache: bool, interrupted: bool) {
    let saved = stats.bytes_before.saturating_sub(stats.bytes_after);

    println!();
    println!(
        "Converted {} of {} scanned file(s) in {:.1}s",
        stats.converted,
        stats.scanned,
        elapsed.as_secs_f64()
    );
    println!();
    println!("  skipped (missing):    {}", stats.skipped_missing);
    println!("  skipped (unsynced):   {}", stats.skipped_unreconciled);
    println!("  skipped (too small):  {}", stats.skipped_small);
    println!("  skipped (larger):     {}", stats.skipped_larger);
    println!("  transcode errors:     {}", stats.transcode_errors);
    println!("  sync errors:          {}", stats.sync_errors);
    println!("  stat errors:          {}", stats.stat_errors);
    println!();
    println!("  bytes before:         {}", format_size(stats.bytes_before));
    println!("  bytes after:          {}", format_size(stats.bytes_after));
    println!("  saved:                {}", format_size(saved));
    println!();
    println!("  content rows:         {}", stats.content_rows);
    println!("  document rows:        {}", stats.document_rows);
    if !skip_cache {
        println!("  cache entries:        {}", stats.cache_cleared);
    }

    if stats.skipped_unreconciled > 0 {
        println!();
        println!(
            "{} file(s) were converted earlier but never synchronized; see the log for paths.",
            stats.skipped_unreconciled
        );
    }
    if interrupted {
        println!();
        println!("Run was interrupted. Completed work is synchronized; rerun to continue.");
    }

    info!(
        scanned = stats.scanned,
        converted = stats.converted,
        transcode_errors = stats.transcode_errors,
        sync_errors = stats.sync_errors,
        stat_errors = stats.stat_errors,
        bytes_saved = saved,
        content_rows = stats.content_rows,
        document_rows = stats.document_rows,
        cache_cleared = stats.cache_cleared,
        elapsed_secs = elapsed.as_secs(),
        "run finished"
    );
}

// ============================================================================
// Progress output
// ============================================================================

fn item_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {pos}/{len} files ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    bar
}

fn flush_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(message);
    spinner
}
