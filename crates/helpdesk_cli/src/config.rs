//! Command-line and environment configuration.

use crate::commands::Command;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_DB_FILE: &str = "helpdesk.sqlite3";

#[derive(Debug, Parser)]
#[command(name = "helpdesk")]
#[command(about = "Help-article knowledge base administration", long_about = None)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "HELPDESK_DB", default_value = DEFAULT_DB_FILE)]
    pub db: PathBuf,

    /// trace|debug|info|warn|error. Defaults by build mode.
    #[arg(long, global = true, env = "HELPDESK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true, env = "HELPDESK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            db_path: self.db.clone(),
            log_level: self
                .log_level
                .clone()
                .unwrap_or_else(|| helpdesk_core::default_log_level().to_string()),
            log_dir: self.log_dir.clone(),
        }
    }
}
