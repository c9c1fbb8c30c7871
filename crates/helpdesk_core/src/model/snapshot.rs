//! Snapshot domain model.
//!
//! # Responsibility
//! - Represent a self-contained, ordered export of groups and their articles.
//!
//! # Invariants
//! - Entry order is the order the snapshot was built in; nothing sorts it.
//! - Embedded group/article ids are origin ids, never live identifiers of the
//!   store a snapshot is restored into.

use super::article::Article;
use super::group::Group;
use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One group together with the articles associated to it at backup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub group: Group,
    pub articles: Vec<Article>,
}

/// Ordered export of the article/group relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Provenance id generated when the snapshot is built.
    pub snapshot_id: Uuid,
    /// Unix epoch milliseconds.
    pub created_at_ms: i64,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Creates a snapshot with a fresh provenance id and current timestamp.
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            created_at_ms: now_epoch_ms(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of article occurrences across all entries.
    ///
    /// An article linked to two groups is counted twice.
    pub fn article_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.articles.len()).sum()
    }

    /// Validates every embedded group and article.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for entry in &self.entries {
            entry.group.validate()?;
            for article in &entry.articles {
                article.validate()?;
            }
        }
        Ok(())
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
