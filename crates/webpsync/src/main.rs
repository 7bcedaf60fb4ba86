//! webpsync - WordPress media library WebP migration tool
//!
//! Converts legacy JPEG/PNG attachments with cwebp, then brings the
//! database along: attachment rows, serialized size metadata, URLs in
//! post content and in page builder documents, and the builder's CSS
//! cache.

mod cli;
mod transcode;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "webpsync")]
#[command(about = "Convert a WordPress media library to WebP", version)]
struct Cli {
    /// Verbose console output (the full log always goes to ~/.webpsync/logs)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert legacy images and synchronize the database
    Convert(cli::convert::ConvertArgs),
    /// Show catalog counts and the on-disk conversion state
    Status(cli::status::StatusArgs),
    /// Show database settings resolved from wp-config.php
    Config(cli::config::ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = webpsync_logging::init_logging(webpsync_logging::LogConfig {
        app_name: "webpsync",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:?}", err);
    }

    let result = match cli.command {
        Commands::Convert(args) => cli::convert::run(args),
        Commands::Status(args) => cli::status::run(args),
        Commands::Config(args) => cli::config::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
