//! Subcommand handlers.
//!
//! Handlers return their stdout text so they can be exercised without a
//! process boundary.

use crate::config::AppConfig;
use clap::Subcommand;
use helpdesk_core::db::{open_db, DbError};
use helpdesk_core::{
    read_snapshot, BackupError, BackupService, ErrorCategory, GroupRepository, RepoError,
    RestoreError, RestoreMode, RestoreService, SnapshotError, SqliteRepository,
};
use log::info;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write all groups, or the named ones, with their articles to a file.
    Backup {
        file: PathBuf,
        /// Group to include; repeat to select several. Omit for all groups.
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// Replay a backup file into the store.
    Restore {
        file: PathBuf,
        /// Delete existing groups and articles before restoring.
        #[arg(long)]
        replace: bool,
    },
    /// Show the groups stored in a backup file without restoring it.
    Inspect { file: PathBuf },
    /// List the groups in the store.
    Groups,
    /// Print the core version.
    Version,
}

/// Failure reported to the operator as `<category>: <message>`.
#[derive(Debug)]
pub struct CliError {
    pub category: ErrorCategory,
    pub message: String,
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self {
            category: ErrorCategory::Database,
            message: value.to_string(),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self {
            category: ErrorCategory::Database,
            message: value.to_string(),
        }
    }
}

impl From<BackupError> for CliError {
    fn from(value: BackupError) -> Self {
        Self {
            category: value.category(),
            message: value.to_string(),
        }
    }
}

impl From<RestoreError> for CliError {
    fn from(value: RestoreError) -> Self {
        Self {
            category: value.category(),
            message: value.to_string(),
        }
    }
}

impl From<SnapshotError> for CliError {
    fn from(value: SnapshotError) -> Self {
        Self {
            category: ErrorCategory::Backup,
            message: value.to_string(),
        }
    }
}

pub fn execute(config: &AppConfig, command: Command) -> Result<String, CliError> {
    match command {
        Command::Backup { file, groups } => backup(config, file, &groups),
        Command::Restore { file, replace } => restore(config, file, replace),
        Command::Inspect { file } => inspect(file),
        Command::Groups => list_groups(config),
        Command::Version => Ok(format!(
            "helpdesk_core version={}\n",
            helpdesk_core::core_version()
        )),
    }
}

fn backup(config: &AppConfig, file: PathBuf, groups: &[String]) -> Result<String, CliError> {
    let conn = open_db(&config.db_path)?;
    let service = BackupService::new(SqliteRepository::try_new(&conn)?);
    let report = if groups.is_empty() {
        service.backup_all(&file)?
    } else {
        service.backup_selected(groups, &file)?
    };
    Ok(format!(
        "backup ok snapshot_id={} groups={} articles={} bytes={} path={}\n",
        report.snapshot_id,
        report.groups,
        report.articles,
        report.bytes_written,
        report.path.display()
    ))
}

fn restore(config: &AppConfig, file: PathBuf, replace: bool) -> Result<String, CliError> {
    let conn = open_db(&config.db_path)?;
    let mode = RestoreMode::from_remove_existing(replace);
    info!("event=cli_restore module=cli status=start replace={replace}");
    let report = RestoreService::new(SqliteRepository::try_new(&conn)?).restore(&file, mode)?;
    Ok(format!(
        "restore ok snapshot_id={} groups_created={} groups_reused={} articles_created={} articles_reused={} associations={}\n",
        report.snapshot_id,
        report.groups_created,
        report.groups_reused,
        report.articles_created,
        report.articles_reused,
        report.associations
    ))
}

fn inspect(file: PathBuf) -> Result<String, CliError> {
    let snapshot = read_snapshot(&file)?;
    let mut out = format!(
        "snapshot_id={} created_at_ms={} groups={}\n",
        snapshot.snapshot_id,
        snapshot.created_at_ms,
        snapshot.entries.len()
    );
    for entry in &snapshot.entries {
        out.push_str(&format!(
            "{}\tarticles={}\n",
            entry.group.name,
            entry.articles.len()
        ));
    }
    Ok(out)
}

fn list_groups(config: &AppConfig) -> Result<String, CliError> {
    let conn = open_db(&config.db_path)?;
    let repo = SqliteRepository::try_new(&conn)?;
    let mut out = String::new();
    for group in repo.list_groups()? {
        out.push_str(&format!("{}\t{}\n", group.id, group.name));
    }
    Ok(out)
}
