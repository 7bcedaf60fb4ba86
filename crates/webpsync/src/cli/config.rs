//! Config command - show settings resolved from wp-config.php.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use webpsync_db::Credentials;

use crate::cli::HelpfulError;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// WordPress installation root (the directory holding wp-config.php)
    #[arg(long, value_name = "DIR")]
    pub wp_root: PathBuf,

    /// Print as JSON (the password is masked)
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let config_path = args.wp_root.join("wp-config.php");
    if !config_path.is_file() {
        return Err(HelpfulError::wp_config_not_found(&config_path).into());
    }
    let credentials = Credentials::from_wp_config(&config_path)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&credentials)?);
        return Ok(());
    }

    println!("Database:     {}", credentials.name);
    println!("User:         {}", credentials.user);
    println!("Password:     ********");
    println!("Host:         {}", credentials.host);
    println!("Table prefix: {}", credentials.table_prefix);
    Ok(())
}
