//! Repository layer contracts and SQLite persistence.
//!
//! # Responsibility
//! - Define the storage contract the backup and restore engines depend on.
//! - Isolate SQLite query details from engine orchestration.
//!
//! # Invariants
//! - Write paths validate model input before SQL mutations.
//! - Reads report absence as `Ok(None)`; storage failures are `RepoError::Db`,
//!   so not-found is always distinguishable from a failed query.
//! - Identifiers are assigned by the store; callers never choose them except
//!   through `ArticleRepository::add_article_with_id`.

use crate::db::DbError;
use crate::model::article::ArticleId;
use crate::model::group::GroupId;
use crate::model::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod article_repo;
pub mod group_repo;

pub use article_repo::{ArticleRepository, MAX_PRESERVED_ARTICLE_ID};
pub use group_repo::GroupRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for knowledge-base persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before reaching storage.
    Validation(ValidationError),
    /// Underlying SQLite failure.
    Db(DbError),
    GroupNotFound(GroupId),
    ArticleNotFound(ArticleId),
    /// Another group already uses this exact name.
    DuplicateGroupName(String),
    /// Persisted row cannot be converted into a model record.
    InvalidData(String),
    /// Connection schema is missing a required table.
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GroupNotFound(_) | Self::ArticleNotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::DuplicateGroupName(name) => write!(f, "group name already exists: `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Full storage contract consumed by backup and restore.
pub trait Repository: GroupRepository + ArticleRepository {}

impl<T: GroupRepository + ArticleRepository + ?Sized> Repository for T {}

/// SQLite-backed repository over a migrated connection.
///
/// Borrowing the connection keeps ownership with the caller; there is no
/// process-wide store handle.
#[derive(Clone, Copy)]
pub struct SqliteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepository<'conn> {
    /// Creates a repository after checking the required tables exist.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in ["groups", "articles", "article_groups"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
