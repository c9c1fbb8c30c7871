//! Restore use-case service.
//!
//! # Responsibility
//! - Replay a decoded snapshot into a repository under merge or replace
//!   policy.
//! - Re-link articles to groups using live identifiers of the target store.
//!
//! # Invariants
//! - The snapshot is fully decoded before the first repository call.
//! - Groups are resolved by exact name, never by the snapshot's embedded id.
//! - An article whose snapshot id already exists in the store is reused and
//!   never overwritten.
//! - Every step except the replace-mode clear is idempotent, so a failed
//!   restore can be retried with the same snapshot.
//! - Replay is sequential and not rolled back: entries applied before a
//!   failure stay committed.

use super::ErrorCategory;
use crate::codec::{read_snapshot, SnapshotError};
use crate::model::article::ArticleId;
use crate::model::group::GroupId;
use crate::model::snapshot::{Snapshot, SnapshotEntry};
use crate::repo::{RepoError, RepoResult, Repository};
use log::{error, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// Conflict policy for a restore run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Keep existing entities and add only what is missing.
    Merge,
    /// Clear associations, groups and articles before replay.
    Replace,
}

impl RestoreMode {
    /// Maps the `removeExisting` flag used by administrative callers.
    pub fn from_remove_existing(remove_existing: bool) -> Self {
        if remove_existing {
            Self::Replace
        } else {
            Self::Merge
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

/// Service error for restore use-cases.
#[derive(Debug)]
pub enum RestoreError {
    /// Snapshot could not be read or decoded. The store was not touched.
    Snapshot(SnapshotError),
    /// Storage failed mid-replay.
    ///
    /// `applied_entries` snapshot entries were fully committed before the
    /// failure. Retrying with the same snapshot is safe.
    Failed {
        applied_entries: usize,
        total_entries: usize,
        source: RepoError,
    },
}

impl RestoreError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Restore
    }

    /// Returns whether the store may hold a partially applied snapshot.
    pub fn may_be_partial(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(err) => write!(f, "{err}"),
            Self::Failed {
                applied_entries,
                total_entries,
                source,
            } => write!(
                f,
                "restore stopped after {applied_entries} of {total_entries} groups: {source}; \
                 the store may be partially restored and retrying is safe"
            ),
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Snapshot(err) => Some(err),
            Self::Failed { source, .. } => Some(source),
        }
    }
}

impl From<SnapshotError> for RestoreError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

/// Summary of one completed restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub snapshot_id: Uuid,
    pub entries_applied: usize,
    pub groups_created: usize,
    /// Groups matched by name in the target store.
    pub groups_reused: usize,
    pub articles_created: usize,
    /// Articles whose snapshot id already existed in the target store.
    pub articles_reused: usize,
    /// Association writes issued, including ones that already existed.
    pub associations: usize,
}

/// Restore service facade over repository implementations.
pub struct RestoreService<R: Repository> {
    repo: R,
}

impl<R: Repository> RestoreService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Reads the snapshot at `path` and replays it.
    ///
    /// A file that cannot be decoded fails with `RestoreError::Snapshot`
    /// before the repository is touched.
    pub fn restore(
        &self,
        path: impl AsRef<Path>,
        mode: RestoreMode,
    ) -> Result<RestoreReport, RestoreError> {
        let snapshot = read_snapshot(path.as_ref()).map_err(|err| {
            error!(
                "event=restore module=restore status=error mode={} error_code=snapshot_unreadable error={}",
                mode.as_str(),
                err
            );
            RestoreError::Snapshot(err)
        })?;
        self.restore_snapshot(&snapshot, mode)
    }

    /// Replays an in-memory snapshot.
    pub fn restore_snapshot(
        &self,
        snapshot: &Snapshot,
        mode: RestoreMode,
    ) -> Result<RestoreReport, RestoreError> {
        let started_at = Instant::now();
        let total_entries = snapshot.entries.len();
        info!(
            "event=restore module=restore status=start mode={} snapshot_id={} entries={}",
            mode.as_str(),
            snapshot.snapshot_id,
            total_entries
        );

        let mut report = RestoreReport {
            snapshot_id: snapshot.snapshot_id,
            ..RestoreReport::default()
        };
        let fail = |applied_entries: usize, source: RepoError| {
            error!(
                "event=restore module=restore status=error mode={} snapshot_id={} applied_entries={} total_entries={} duration_ms={} error={}",
                mode.as_str(),
                snapshot.snapshot_id,
                applied_entries,
                total_entries,
                started_at.elapsed().as_millis(),
                source
            );
            RestoreError::Failed {
                applied_entries,
                total_entries,
                source,
            }
        };

        if mode == RestoreMode::Replace {
            self.clear_store().map_err(|err| fail(0, err))?;
        }

        let mut resolved_articles = HashMap::new();
        for (index, entry) in snapshot.entries.iter().enumerate() {
            self.apply_entry(entry, &mut resolved_articles, &mut report)
                .map_err(|err| fail(index, err))?;
            report.entries_applied += 1;
        }

        info!(
            "event=restore module=restore status=ok mode={} snapshot_id={} entries={} groups_created={} groups_reused={} articles_created={} articles_reused={} associations={} duration_ms={}",
            mode.as_str(),
            report.snapshot_id,
            report.entries_applied,
            report.groups_created,
            report.groups_reused,
            report.articles_created,
            report.articles_reused,
            report.associations,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    // Order matters when the store does not cascade deletes itself.
    fn clear_store(&self) -> RepoResult<()> {
        let associations = self.repo.clear_all_associations()?;
        let groups = self.repo.delete_all_groups()?;
        let articles = self.repo.delete_all_articles()?;
        warn!(
            "event=restore_clear module=restore status=ok associations={associations} groups={groups} articles={articles}"
        );
        Ok(())
    }

    fn apply_entry(
        &self,
        entry: &SnapshotEntry,
        resolved_articles: &mut HashMap<ArticleId, ArticleId>,
        report: &mut RestoreReport,
    ) -> RepoResult<()> {
        let group_id = self.resolve_group(&entry.group.name, report)?;

        for article in &entry.articles {
            let live_id = match resolved_articles.get(&article.id) {
                Some(live_id) => *live_id,
                None => {
                    let live_id = match self.repo.get_article(article.id)? {
                        Some(existing) => {
                            report.articles_reused += 1;
                            existing.id
                        }
                        None => {
                            let live_id = self.repo.add_article_with_id(article)?;
                            report.articles_created += 1;
                            live_id
                        }
                    };
                    resolved_articles.insert(article.id, live_id);
                    live_id
                }
            };

            self.repo.associate(live_id, group_id)?;
            report.associations += 1;
        }

        Ok(())
    }

    fn resolve_group(&self, name: &str, report: &mut RestoreReport) -> RepoResult<GroupId> {
        if let Some(existing) = self.repo.get_group_by_name(name)? {
            report.groups_reused += 1;
            return Ok(existing.id);
        }
        let id = self.repo.add_group(name)?;
        report.groups_created += 1;
        Ok(id)
    }
}
