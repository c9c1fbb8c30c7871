//! Group repository contract and SQLite implementation.
//!
//! # Invariants
//! - Group names are unique under exact (binary) comparison.
//! - Deleting a group removes its associations through `ON DELETE CASCADE`.
//! - Listing order is `id ASC`.

use super::{RepoError, RepoResult, SqliteRepository};
use crate::db::DbError;
use crate::model::group::{Group, GroupId};
use crate::model::validate_group_name;
use rusqlite::{params, OptionalExtension, Row};

/// Repository interface for group CRUD operations.
pub trait GroupRepository {
    /// Inserts a group and returns its store-assigned id.
    fn add_group(&self, name: &str) -> RepoResult<GroupId>;
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>>;
    /// Exact-match lookup; no case folding or trimming.
    fn get_group_by_name(&self, name: &str) -> RepoResult<Option<Group>>;
    fn list_groups(&self) -> RepoResult<Vec<Group>>;
    fn rename_group(&self, id: GroupId, name: &str) -> RepoResult<()>;
    /// Deletes one group and, by cascade, its associations.
    fn delete_group(&self, id: GroupId) -> RepoResult<()>;
    /// Deletes every group. Returns the number of removed rows.
    fn delete_all_groups(&self) -> RepoResult<usize>;
}

impl GroupRepository for SqliteRepository<'_> {
    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        validate_group_name(name)?;

        self.conn()
            .execute("INSERT INTO groups (name) VALUES (?1);", [name])
            .map_err(|err| map_name_conflict(err, name))?;

        Ok(self.conn().last_insert_rowid())
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let group = self
            .conn()
            .query_row(
                "SELECT id, name FROM groups WHERE id = ?1;",
                [id],
                parse_group_row,
            )
            .optional()?;
        Ok(group)
    }

    fn get_group_by_name(&self, name: &str) -> RepoResult<Option<Group>> {
        let group = self
            .conn()
            .query_row(
                "SELECT id, name FROM groups WHERE name = ?1;",
                [name],
                parse_group_row,
            )
            .optional()?;
        Ok(group)
    }

    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name FROM groups ORDER BY id ASC;")?;
        let groups = stmt
            .query_map([], parse_group_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn rename_group(&self, id: GroupId, name: &str) -> RepoResult<()> {
        validate_group_name(name)?;

        let changed = self
            .conn()
            .execute(
                "UPDATE groups SET name = ?1 WHERE id = ?2;",
                params![name, id],
            )
            .map_err(|err| map_name_conflict(err, name))?;

        if changed == 0 {
            return Err(RepoError::GroupNotFound(id));
        }
        Ok(())
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM groups WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::GroupNotFound(id));
        }
        Ok(())
    }

    fn delete_all_groups(&self) -> RepoResult<usize> {
        let removed = self.conn().execute("DELETE FROM groups;", [])?;
        Ok(removed)
    }
}

fn parse_group_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

fn map_name_conflict(err: rusqlite::Error, name: &str) -> RepoError {
    let err = DbError::Sqlite(err);
    if err.is_constraint_violation() {
        RepoError::DuplicateGroupName(name.to_string())
    } else {
        RepoError::Db(err)
    }
}
