//! Command-line interface for webpsync.
//!
//! Each submodule implements one subcommand. Commands own their
//! argument structs and a synchronous `run` entry point; async work
//! happens on a current-thread runtime built inside the command.

pub mod config;
pub mod convert;
mod error;
mod output;
pub mod status;

use std::path::{Path, PathBuf};

pub(crate) use error::HelpfulError;
pub(crate) use output::{format_size, parse_size, print_table};

/// Uploads directory for a site, honoring the override flag.
pub(crate) fn uploads_dir(wp_root: &Path, override_dir: Option<PathBuf>) -> PathBuf {
    override_dir.unwrap_or_else(|| wp_root.join("wp-content").join("uploads"))
}
