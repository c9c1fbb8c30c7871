//! Backup use-case service.
//!
//! # Responsibility
//! - Build snapshots of all groups or a named subset.
//! - Write the encoded snapshot to a caller-supplied path.
//!
//! # Invariants
//! - Backup never mutates the repository.
//! - Unknown group names in a selection are skipped, not reported.
//! - Selected entries follow the caller's name order.

use super::ErrorCategory;
use crate::codec::{write_snapshot, SnapshotError};
use crate::model::snapshot::{Snapshot, SnapshotEntry};
use crate::repo::{RepoError, RepoResult, Repository};
use log::{error, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Service error for backup use-cases.
#[derive(Debug)]
pub enum BackupError {
    /// Reading the store failed; propagated unchanged.
    Repo(RepoError),
    /// Encoding or writing the snapshot file failed. The store is unaffected.
    Failed { path: PathBuf, source: SnapshotError },
}

impl BackupError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Repo(_) => ErrorCategory::Database,
            Self::Failed { .. } => ErrorCategory::Backup,
        }
    }
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Failed { path, source } => {
                write!(f, "backup to `{}` failed: {source}", path.display())
            }
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Failed { source, .. } => Some(source),
        }
    }
}

impl From<RepoError> for BackupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Summary of one written backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub snapshot_id: Uuid,
    pub path: PathBuf,
    /// Number of snapshot entries (groups).
    pub groups: usize,
    /// Article occurrences across all entries.
    pub articles: usize,
    pub bytes_written: u64,
}

/// Backup service facade over repository implementations.
pub struct BackupService<R: Repository> {
    repo: R,
}

impl<R: Repository> BackupService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Builds a snapshot of every group in store order.
    pub fn snapshot_all(&self) -> RepoResult<Snapshot> {
        let mut entries = Vec::new();
        for group in self.repo.list_groups()? {
            let articles = self.repo.articles_for_group(group.id)?;
            entries.push(SnapshotEntry { group, articles });
        }
        Ok(Snapshot::new(entries))
    }

    /// Builds a snapshot of the named groups in the given order.
    ///
    /// Names that do not resolve are skipped. A name repeated in `names` is
    /// captured once, at its first position.
    pub fn snapshot_selected<S: AsRef<str>>(&self, names: &[S]) -> RepoResult<Snapshot> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            let Some(group) = self.repo.get_group_by_name(name)? else {
                info!("event=backup_select module=backup status=skipped reason=unknown_group");
                continue;
            };
            let articles = self.repo.articles_for_group(group.id)?;
            entries.push(SnapshotEntry { group, articles });
        }
        Ok(Snapshot::new(entries))
    }

    /// Backs up every group with its articles to `path`.
    pub fn backup_all(&self, path: impl AsRef<Path>) -> Result<BackupReport, BackupError> {
        self.run("all", path.as_ref(), || self.snapshot_all())
    }

    /// Backs up the named groups with their articles to `path`.
    pub fn backup_selected<S: AsRef<str>>(
        &self,
        names: &[S],
        path: impl AsRef<Path>,
    ) -> Result<BackupReport, BackupError> {
        self.run("selected", path.as_ref(), || self.snapshot_selected(names))
    }

    fn run(
        &self,
        scope: &'static str,
        path: &Path,
        build: impl FnOnce() -> RepoResult<Snapshot>,
    ) -> Result<BackupReport, BackupError> {
        let started_at = Instant::now();
        info!("event=backup module=backup status=start scope={scope}");

        let snapshot = build().map_err(|err| {
            error!(
                "event=backup module=backup status=error scope={} duration_ms={} error_code=store_read_failed error={}",
                scope,
                started_at.elapsed().as_millis(),
                err
            );
            BackupError::Repo(err)
        })?;

        let bytes_written = write_snapshot(path, &snapshot).map_err(|err| {
            error!(
                "event=backup module=backup status=error scope={} snapshot_id={} duration_ms={} error_code=write_failed error={}",
                scope,
                snapshot.snapshot_id,
                started_at.elapsed().as_millis(),
                err
            );
            BackupError::Failed {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        let report = BackupReport {
            snapshot_id: snapshot.snapshot_id,
            path: path.to_path_buf(),
            groups: snapshot.entries.len(),
            articles: snapshot.article_count(),
            bytes_written,
        };
        info!(
            "event=backup module=backup status=ok scope={} snapshot_id={} groups={} articles={} bytes={} duration_ms={}",
            scope,
            report.snapshot_id,
            report.groups,
            report.articles,
            report.bytes_written,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}
