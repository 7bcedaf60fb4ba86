//! Status command - catalog counts and on-disk conversion state.
//!
//! Read-only: one short-lived connection, no worker, no writes.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use webpsync_db::{Credentials, MimeCount};
use webpsync_protocol::defaults::LEGACY_MIME_TYPES;
use webpsync_protocol::paths;

use crate::cli::{print_table, HelpfulError};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// WordPress installation root (the directory holding wp-config.php)
    #[arg(long, value_name = "DIR")]
    pub wp_root: PathBuf,

    /// Uploads directory (default: <wp-root>/wp-content/uploads)
    #[arg(long, value_name = "DIR")]
    pub uploads_dir: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    mime_counts: Vec<MimeCount>,
    legacy_tracked: usize,
    convertible: usize,
    unreconciled: usize,
    missing: usize,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let config_path = args.wp_root.join("wp-config.php");
    if !config_path.is_file() {
        return Err(HelpfulError::wp_config_not_found(&config_path).into());
    }
    let credentials = Credentials::from_wp_config(&config_path)?;
    let uploads = super::uploads_dir(&args.wp_root, args.uploads_dir);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = rt.block_on(async {
        let url = credentials.mysql_url()?;
        let mut conn = webpsync_db::connect(&url)
            .await
            .context("Could not connect to the database")?;
        let tables = credentials.tables();

        let counts = webpsync_db::mime_counts(&mut conn, &tables).await?;
        let legacy =
            webpsync_db::list_legacy_attachments(&mut conn, &tables, LEGACY_MIME_TYPES).await?;

        anyhow::Ok(build_report(&uploads, counts, &legacy))
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Attachments by mime type:");
    let rows = report
        .mime_counts
        .iter()
        .map(|entry| vec![entry.mime_type.clone(), entry.attachments.to_string()])
        .collect();
    print_table(&["MIME TYPE", "COUNT"], rows);

    println!();
    println!("Legacy attachments tracked: {}", report.legacy_tracked);
    println!("  convertible on disk:      {}", report.convertible);
    println!("  converted, not synced:    {}", report.unreconciled);
    println!("  source file missing:      {}", report.missing);

    if let Some(hint) = unreconciled_hint(report.unreconciled) {
        println!();
        println!("{hint}");
    }
    Ok(())
}

/// Follow-up hint shown when stale rows were detected. Points at the
/// read-only preview, which lists the affected paths without writing.
fn unreconciled_hint(count: usize) -> Option<String> {
    (count > 0).then(|| {
        format!(
            "{count} attachment(s) have a .webp file but a stale database row; \
             run 'webpsync convert --dry-run' to list the affected paths."
        )
    })
}

/// Classify each tracked legacy attachment by what is actually on disk.
fn build_report(uploads: &Path, counts: Vec<MimeCount>, legacy: &[String]) -> StatusReport {
    let mut convertible = 0;
    let mut unreconciled = 0;
    let mut missing = 0;
    for file in legacy {
        if uploads.join(file).exists() {
            convertible += 1;
        } else if uploads.join(paths::with_webp_extension(file)).exists() {
            unreconciled += 1;
        } else {
            missing += 1;
        }
    }

    StatusReport {
        mime_counts: counts,
        legacy_tracked: legacy.len(),
        convertible,
        unreconciled,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_build_report_classifies_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path();
        fs::create_dir_all(uploads.join("2024/07")).unwrap();
        fs::write(uploads.join("2024/07/present.jpg"), b"jpeg").unwrap();
        fs::write(uploads.join("2024/07/done.webp"), b"webp").unwrap();

        let legacy = vec![
            "2024/07/present.jpg".to_string(),
            "2024/07/done.jpg".to_string(),
            "2024/07/gone.jpg".to_string(),
        ];
        let report = build_report(uploads, Vec::new(), &legacy);

        assert_eq!(report.legacy_tracked, 3);
        assert_eq!(report.convertible, 1);
        assert_eq!(report.unreconciled, 1);
        assert_eq!(report.missing, 1);
    }

    #[test]
    fn test_unreconciled_hint_points_at_the_preview() {
        assert_eq!(unreconciled_hint(0), None);

        let hint = unreconciled_hint(2).unwrap();
        assert!(hint.contains("2 attachment(s)"));
        assert!(hint.contains("webpsync convert --dry-run"));
    }

    #[test]
    fn test_build_report_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let report = build_report(dir.path(), Vec::new(), &[]);

        assert_eq!(report.legacy_tracked, 0);
        assert_eq!(report.convertible, 0);
        assert_eq!(report.unreconciled, 0);
        assert_eq!(report.missing, 0);
    }
}
