//! Core of the help-article knowledge base.
//!
//! Owns the article/group store contract and the grouped backup/restore
//! engine that snapshots the corpus to a portable file and replays it.

pub mod codec;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::{
    decode_snapshot, encode_snapshot, read_snapshot, write_snapshot, SnapshotError,
    SNAPSHOT_EXTENSION,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::article::{Article, ArticleDraft, ArticleId, Association};
pub use model::group::{Group, GroupId};
pub use model::snapshot::{Snapshot, SnapshotEntry};
pub use model::ValidationError;
pub use repo::{
    ArticleRepository, GroupRepository, RepoError, RepoResult, Repository, SqliteRepository,
    MAX_PRESERVED_ARTICLE_ID,
};
pub use service::backup_service::{BackupError, BackupReport, BackupService};
pub use service::restore_service::{RestoreError, RestoreMode, RestoreReport, RestoreService};
pub use service::ErrorCategory;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
