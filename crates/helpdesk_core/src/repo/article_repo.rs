//! Article and association repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `articles` and the `article_groups` join table.
//! - Keep list-valued article fields (keywords, reference links) lossless by
//!   storing them as JSON arrays.
//!
//! # Invariants
//! - `associate` is idempotent: re-linking an existing pair is a no-op.
//! - Associations always reference an existing article and group; a link to
//!   a missing side is rejected with a not-found error.
//! - Deleting an article removes its associations through `ON DELETE CASCADE`.

use super::{RepoError, RepoResult, SqliteRepository};
use crate::db::DbError;
use crate::model::article::{Article, ArticleDraft, ArticleId, Association};
use crate::model::group::{Group, GroupId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ARTICLE_SELECT_SQL: &str = "SELECT
    a.id,
    a.header,
    a.title,
    a.short_description,
    a.keywords,
    a.body,
    a.reference_links
FROM articles a";

/// Largest snapshot id `add_article_with_id` keeps verbatim.
pub const MAX_PRESERVED_ARTICLE_ID: ArticleId = i64::MAX / 2;

/// Repository interface for article and association operations.
pub trait ArticleRepository {
    /// Inserts an article and returns its store-assigned id.
    fn add_article(&self, draft: &ArticleDraft) -> RepoResult<ArticleId>;

    /// Inserts an article keeping `article.id` when the store supports it.
    ///
    /// Returns the live id the article was stored under. The default
    /// implementation does not preserve identifiers and delegates to
    /// `add_article`, so callers must always use the returned id.
    ///
    /// A kept id may be one previously freed by `delete_article`; this is
    /// the one write path exempt from the no-reuse rule.
    fn add_article_with_id(&self, article: &Article) -> RepoResult<ArticleId> {
        self.add_article(&article.to_draft())
    }

    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>>;
    /// Lists all articles ordered by `id ASC`.
    fn list_articles(&self) -> RepoResult<Vec<Article>>;
    /// Replaces every content field of an existing article.
    fn update_article(&self, article: &Article) -> RepoResult<()>;
    /// Deletes one article and, by cascade, its associations.
    fn delete_article(&self, id: ArticleId) -> RepoResult<()>;
    /// Deletes every article. Returns the number of removed rows.
    fn delete_all_articles(&self) -> RepoResult<usize>;

    /// Lists articles linked to `group_id`, ordered by article id.
    fn articles_for_group(&self, group_id: GroupId) -> RepoResult<Vec<Article>>;
    /// Lists groups linked to `article_id`, ordered by group id.
    fn groups_for_article(&self, article_id: ArticleId) -> RepoResult<Vec<Group>>;
    fn associate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()>;
    /// Removes one link. Missing links are a no-op.
    fn dissociate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()>;
    fn clear_associations_for_group(&self, group_id: GroupId) -> RepoResult<usize>;
    fn clear_associations_for_article(&self, article_id: ArticleId) -> RepoResult<usize>;
    fn clear_all_associations(&self) -> RepoResult<usize>;
    /// Lists every link ordered by `(group_id, article_id)`.
    fn list_associations(&self) -> RepoResult<Vec<Association>>;
}

impl ArticleRepository for SqliteRepository<'_> {
    fn add_article(&self, draft: &ArticleDraft) -> RepoResult<ArticleId> {
        draft.validate()?;

        self.conn().execute(
            "INSERT INTO articles (
                header,
                title,
                short_description,
                keywords,
                body,
                reference_links
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.header.as_str(),
                draft.title.as_str(),
                draft.short_description.as_str(),
                encode_list(&draft.keywords)?,
                draft.body.as_str(),
                encode_list(&draft.reference_links)?,
            ],
        )?;

        Ok(self.conn().last_insert_rowid())
    }

    fn add_article_with_id(&self, article: &Article) -> RepoResult<ArticleId> {
        article.validate()?;
        // Keeping an id near the top of the range would exhaust AUTOINCREMENT.
        if !(1..=MAX_PRESERVED_ARTICLE_ID).contains(&article.id) {
            return self.add_article(&article.to_draft());
        }

        self.conn().execute(
            "INSERT INTO articles (
                id,
                header,
                title,
                short_description,
                keywords,
                body,
                reference_links
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                article.id,
                article.header.as_str(),
                article.title.as_str(),
                article.short_description.as_str(),
                encode_list(&article.keywords)?,
                article.body.as_str(),
                encode_list(&article.reference_links)?,
            ],
        )?;

        Ok(article.id)
    }

    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{ARTICLE_SELECT_SQL} WHERE a.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_article_row(row)?));
        }
        Ok(None)
    }

    fn list_articles(&self) -> RepoResult<Vec<Article>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{ARTICLE_SELECT_SQL} ORDER BY a.id ASC;"))?;
        let articles = collect_articles(stmt.query([])?)?;
        Ok(articles)
    }

    fn update_article(&self, article: &Article) -> RepoResult<()> {
        article.validate()?;

        let changed = self.conn().execute(
            "UPDATE articles
             SET
                header = ?1,
                title = ?2,
                short_description = ?3,
                keywords = ?4,
                body = ?5,
                reference_links = ?6
             WHERE id = ?7;",
            params![
                article.header.as_str(),
                article.title.as_str(),
                article.short_description.as_str(),
                encode_list(&article.keywords)?,
                article.body.as_str(),
                encode_list(&article.reference_links)?,
                article.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::ArticleNotFound(article.id));
        }
        Ok(())
    }

    fn delete_article(&self, id: ArticleId) -> RepoResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM articles WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::ArticleNotFound(id));
        }
        Ok(())
    }

    fn delete_all_articles(&self) -> RepoResult<usize> {
        let removed = self.conn().execute("DELETE FROM articles;", [])?;
        Ok(removed)
    }

    fn articles_for_group(&self, group_id: GroupId) -> RepoResult<Vec<Article>> {
        let mut stmt = self.conn().prepare(&format!(
            "{ARTICLE_SELECT_SQL}
             INNER JOIN article_groups ag ON ag.article_id = a.id
             WHERE ag.group_id = ?1
             ORDER BY a.id ASC;"
        ))?;
        let articles = collect_articles(stmt.query([group_id])?)?;
        Ok(articles)
    }

    fn groups_for_article(&self, article_id: ArticleId) -> RepoResult<Vec<Group>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name
             FROM groups g
             INNER JOIN article_groups ag ON ag.group_id = g.id
             WHERE ag.article_id = ?1
             ORDER BY g.id ASC;",
        )?;
        let groups = stmt
            .query_map([article_id], |row| {
                Ok(Group {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn associate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()> {
        // `OR IGNORE` covers the duplicate pair only; foreign keys still fail.
        let result = self.conn().execute(
            "INSERT OR IGNORE INTO article_groups (article_id, group_id) VALUES (?1, ?2);",
            params![article_id, group_id],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = DbError::Sqlite(err);
                if !err.is_constraint_violation() {
                    return Err(RepoError::Db(err));
                }
                if !row_exists(self.conn(), "articles", article_id)? {
                    return Err(RepoError::ArticleNotFound(article_id));
                }
                if !row_exists(self.conn(), "groups", group_id)? {
                    return Err(RepoError::GroupNotFound(group_id));
                }
                Err(RepoError::Db(err))
            }
        }
    }

    fn dissociate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()> {
        self.conn().execute(
            "DELETE FROM article_groups WHERE article_id = ?1 AND group_id = ?2;",
            params![article_id, group_id],
        )?;
        Ok(())
    }

    fn clear_associations_for_group(&self, group_id: GroupId) -> RepoResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM article_groups WHERE group_id = ?1;",
            [group_id],
        )?;
        Ok(removed)
    }

    fn clear_associations_for_article(&self, article_id: ArticleId) -> RepoResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM article_groups WHERE article_id = ?1;",
            [article_id],
        )?;
        Ok(removed)
    }

    fn clear_all_associations(&self) -> RepoResult<usize> {
        let removed = self.conn().execute("DELETE FROM article_groups;", [])?;
        Ok(removed)
    }

    fn list_associations(&self) -> RepoResult<Vec<Association>> {
        let mut stmt = self.conn().prepare(
            "SELECT article_id, group_id
             FROM article_groups
             ORDER BY group_id ASC, article_id ASC;",
        )?;
        let links = stmt
            .query_map([], |row| {
                Ok(Association {
                    article_id: row.get("article_id")?,
                    group_id: row.get("group_id")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }
}

fn collect_articles(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Article>> {
    let mut articles = Vec::new();
    while let Some(row) = rows.next()? {
        articles.push(parse_article_row(row)?);
    }
    Ok(articles)
}

fn parse_article_row(row: &Row<'_>) -> RepoResult<Article> {
    let id: ArticleId = row.get("id")?;
    let keywords_text: String = row.get("keywords")?;
    let links_text: String = row.get("reference_links")?;

    let article = Article {
        id,
        header: row.get("header")?,
        title: row.get("title")?,
        short_description: row.get("short_description")?,
        keywords: decode_list(&keywords_text, id, "keywords")?,
        body: row.get("body")?,
        reference_links: decode_list(&links_text, id, "reference_links")?,
    };
    article.validate().map_err(|err| {
        RepoError::InvalidData(format!("article {id} failed validation: {err}"))
    })?;
    Ok(article)
}

fn encode_list(values: &[String]) -> RepoResult<String> {
    serde_json::to_string(values)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode list column: {err}")))
}

fn decode_list(text: &str, id: ArticleId, column: &str) -> RepoResult<Vec<String>> {
    serde_json::from_str(text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid list value `{text}` in articles.{column} for article {id}"
        ))
    })
}

fn row_exists(conn: &Connection, table: &'static str, id: i64) -> RepoResult<bool> {
    let found = conn
        .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?1;"), [id], |_| {
            Ok(())
        })
        .optional()?;
    Ok(found.is_some())
}
