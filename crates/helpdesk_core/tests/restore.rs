use helpdesk_core::db::open_db_in_memory;
use helpdesk_core::{
    encode_snapshot, write_snapshot, Article, ArticleDraft, ArticleId, ArticleRepository,
    Association, BackupService, ErrorCategory, Group, GroupId, GroupRepository, RepoError,
    RepoResult, RestoreError, RestoreMode, RestoreService, Snapshot, SnapshotEntry,
    SnapshotError, SqliteRepository,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::collections::BTreeSet;

/// Group/article/association contents keyed by portable values.
type StoreContents = (
    BTreeSet<String>,
    BTreeSet<String>,
    BTreeSet<(String, String)>,
);

fn contents(conn: &Connection) -> StoreContents {
    let repo = SqliteRepository::try_new(conn).unwrap();
    let groups = repo.list_groups().unwrap();
    let articles = repo.list_articles().unwrap();
    let mut links = BTreeSet::new();
    for group in &groups {
        for article in repo.articles_for_group(group.id).unwrap() {
            links.insert((group.name.clone(), article.title));
        }
    }
    (
        groups.into_iter().map(|group| group.name).collect(),
        articles.into_iter().map(|article| article.title).collect(),
        links,
    )
}

fn counts(conn: &Connection) -> (usize, usize, usize) {
    let repo = SqliteRepository::try_new(conn).unwrap();
    (
        repo.list_groups().unwrap().len(),
        repo.list_articles().unwrap().len(),
        repo.list_associations().unwrap().len(),
    )
}

fn assert_no_orphans(conn: &Connection) {
    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM article_groups ag
             LEFT JOIN articles a ON a.id = ag.article_id
             LEFT JOIN groups g ON g.id = ag.group_id
             WHERE a.id IS NULL OR g.id IS NULL;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}

fn article(id: ArticleId, title: &str) -> Article {
    let mut draft = ArticleDraft::new(title);
    draft.keywords = vec!["kw".to_string()];
    draft.into_article(id)
}

fn entry(group_id: GroupId, name: &str, articles: Vec<Article>) -> SnapshotEntry {
    SnapshotEntry {
        group: Group::new(group_id, name),
        articles,
    }
}

fn seed_java_in_cs(conn: &Connection) -> (GroupId, ArticleId) {
    let repo = SqliteRepository::try_new(conn).unwrap();
    let cs = repo.add_group("cs").unwrap();
    let java = repo.add_article(&ArticleDraft::new("Java Basics")).unwrap();
    repo.associate(java, cs).unwrap();
    (cs, java)
}

#[test]
fn backup_wipe_restore_rebuilds_group_article_and_link() {
    let conn = open_db_in_memory().unwrap();
    seed_java_in_cs(&conn);
    let repo = SqliteRepository::try_new(&conn).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("all.bak");
    BackupService::new(repo).backup_all(&path).unwrap();

    repo.clear_all_associations().unwrap();
    repo.delete_all_groups().unwrap();
    repo.delete_all_articles().unwrap();
    assert_eq!(counts(&conn), (0, 0, 0));

    let report = RestoreService::new(repo)
        .restore(&path, RestoreMode::from_remove_existing(false))
        .unwrap();
    assert_eq!(report.entries_applied, 1);
    assert_eq!(report.groups_created, 1);
    assert_eq!(report.articles_created, 1);

    assert_eq!(counts(&conn), (1, 1, 1));
    let cs = repo.get_group_by_name("cs").unwrap().unwrap();
    let articles = repo.articles_for_group(cs.id).unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Java Basics");
    assert_no_orphans(&conn);
}

#[test]
fn merge_restore_twice_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let snapshot = Snapshot::new(vec![
        entry(1, "cs", vec![article(10, "Java"), article(11, "Rust")]),
        entry(2, "math", vec![article(10, "Java"), article(12, "Algebra")]),
    ]);
    let service = RestoreService::new(SqliteRepository::try_new(&conn).unwrap());

    service
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    let once = contents(&conn);
    let once_counts = counts(&conn);

    let second = service
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    assert_eq!(second.groups_created, 0);
    assert_eq!(second.groups_reused, 2);
    assert_eq!(second.articles_created, 0);
    assert_eq!(contents(&conn), once);
    assert_eq!(counts(&conn), once_counts);
    assert_eq!(once_counts, (2, 3, 4));
}

#[test]
fn shared_article_is_inserted_once_per_run() {
    let conn = open_db_in_memory().unwrap();
    let snapshot = Snapshot::new(vec![
        entry(1, "cs", vec![article(10, "Shared")]),
        entry(2, "math", vec![article(10, "Shared")]),
    ]);
    let service = RestoreService::new(SqliteRepository::try_new(&conn).unwrap());

    let report = service
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    assert_eq!(report.articles_created, 1);
    assert_eq!(report.associations, 2);
    assert_eq!(counts(&conn), (2, 1, 2));
}

#[test]
fn merge_reuses_existing_group_with_same_name() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();
    repo.add_group("other").unwrap();
    let existing_cs = repo.add_group("cs").unwrap();

    let snapshot = Snapshot::new(vec![entry(1, "cs", vec![article(10, "Java")])]);
    let report = RestoreService::new(repo)
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    assert_eq!(report.groups_reused, 1);
    assert_eq!(report.groups_created, 0);

    let groups = repo.list_groups().unwrap();
    assert_eq!(groups.iter().filter(|group| group.name == "cs").count(), 1);
    assert_eq!(repo.articles_for_group(existing_cs).unwrap().len(), 1);
    assert!(repo.articles_for_group(1).unwrap().is_empty());
}

#[test]
fn group_names_are_matched_exactly() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();
    repo.add_group("CS").unwrap();

    let snapshot = Snapshot::new(vec![entry(1, "cs", Vec::new())]);
    let report = RestoreService::new(repo)
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    assert_eq!(report.groups_created, 1);
    assert_eq!(repo.list_groups().unwrap().len(), 2);
}

#[test]
fn merge_never_overwrites_article_with_same_id() {
    let conn = open_db_in_memory().unwrap();
    let (_, java) = seed_java_in_cs(&conn);
    let repo = SqliteRepository::try_new(&conn).unwrap();
    let mut edited = repo.get_article(java).unwrap().unwrap();
    edited.body = "edited after backup".to_string();
    repo.update_article(&edited).unwrap();

    let mut stale = edited.clone();
    stale.body = "stale body".to_string();
    let snapshot = Snapshot::new(vec![entry(99, "guides", vec![stale])]);
    let report = RestoreService::new(repo)
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    assert_eq!(report.articles_reused, 1);
    assert_eq!(report.articles_created, 0);

    assert_eq!(repo.get_article(java).unwrap().unwrap(), edited);
    let guides = repo.get_group_by_name("guides").unwrap().unwrap();
    assert_eq!(repo.groups_for_article(java).unwrap().len(), 2);
    assert_eq!(repo.articles_for_group(guides.id).unwrap()[0].id, java);
}

#[test]
fn replace_restore_matches_snapshot_exactly() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&conn).unwrap();
    let old_group = repo.add_group("legacy").unwrap();
    let old_article = repo.add_article(&ArticleDraft::new("Old")).unwrap();
    repo.associate(old_article, old_group).unwrap();
    repo.add_article(&ArticleDraft::new("Unlinked")).unwrap();

    let snapshot = Snapshot::new(vec![
        entry(5, "cs", vec![article(10, "Java"), article(11, "Rust")]),
        entry(6, "empty", Vec::new()),
    ]);
    RestoreService::new(repo)
        .restore_snapshot(&snapshot, RestoreMode::Replace)
        .unwrap();

    let expected: StoreContents = (
        ["cs", "empty"].iter().map(|s| s.to_string()).collect(),
        ["Java", "Rust"].iter().map(|s| s.to_string()).collect(),
        [("cs", "Java"), ("cs", "Rust")]
            .iter()
            .map(|(g, a)| (g.to_string(), a.to_string()))
            .collect(),
    );
    assert_eq!(contents(&conn), expected);
    assert_no_orphans(&conn);
}

#[test]
fn empty_snapshot_only_applies_optional_clear() {
    let conn = open_db_in_memory().unwrap();
    seed_java_in_cs(&conn);
    let service = RestoreService::new(SqliteRepository::try_new(&conn).unwrap());
    let empty = Snapshot::new(Vec::new());

    let report = service.restore_snapshot(&empty, RestoreMode::Merge).unwrap();
    assert_eq!(report.entries_applied, 0);
    assert_eq!(counts(&conn), (1, 1, 1));

    service
        .restore_snapshot(&empty, RestoreMode::Replace)
        .unwrap();
    assert_eq!(counts(&conn), (0, 0, 0));

    service
        .restore_snapshot(&empty, RestoreMode::Replace)
        .unwrap();
    assert_eq!(counts(&conn), (0, 0, 0));
}

#[test]
fn corrupt_file_fails_before_touching_store() {
    let conn = open_db_in_memory().unwrap();
    seed_java_in_cs(&conn);
    let before = contents(&conn);
    let service = RestoreService::new(SqliteRepository::try_new(&conn).unwrap());
    let dir = tempfile::tempdir().unwrap();

    let garbage = dir.path().join("garbage.bak");
    std::fs::write(&garbage, b"definitely not a snapshot file at all, just text").unwrap();
    let err = service.restore(&garbage, RestoreMode::Replace).unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Snapshot(SnapshotError::Corrupt(_))
    ));
    assert!(!err.may_be_partial());

    let truncated = dir.path().join("truncated.bak");
    let snapshot = Snapshot::new(vec![entry(1, "math", vec![article(3, "Algebra")])]);
    let bytes = encode_snapshot(&snapshot).unwrap();
    std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
    let err = service
        .restore(&truncated, RestoreMode::Replace)
        .unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Snapshot(SnapshotError::Corrupt(_))
    ));

    assert_eq!(contents(&conn), before);
}

#[test]
fn unsupported_version_fails_fast() {
    let conn = open_db_in_memory().unwrap();
    seed_java_in_cs(&conn);
    let before = contents(&conn);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.bak");

    let mut bytes = encode_snapshot(&Snapshot::new(Vec::new())).unwrap();
    bytes[4..6].copy_from_slice(&7u16.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let err = RestoreService::new(SqliteRepository::try_new(&conn).unwrap())
        .restore(&path, RestoreMode::Replace)
        .unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Snapshot(SnapshotError::UnsupportedVersion { found: 7, .. })
    ));
    assert_eq!(err.category(), ErrorCategory::Restore);
    assert_eq!(contents(&conn), before);
}

#[test]
fn restore_from_written_file_roundtrips_selected_groups() {
    let source = open_db_in_memory().unwrap();
    let repo = SqliteRepository::try_new(&source).unwrap();
    let cs = repo.add_group("cs").unwrap();
    let math = repo.add_group("math").unwrap();
    let java = repo.add_article(&ArticleDraft::new("Java")).unwrap();
    let algebra = repo.add_article(&ArticleDraft::new("Algebra")).unwrap();
    repo.associate(java, cs).unwrap();
    repo.associate(algebra, math).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("math.bak");
    BackupService::new(repo)
        .backup_selected(&["math"], &path)
        .unwrap();

    let target = open_db_in_memory().unwrap();
    RestoreService::new(SqliteRepository::try_new(&target).unwrap())
        .restore(&path, RestoreMode::Merge)
        .unwrap();

    let (groups, articles, links) = contents(&target);
    assert_eq!(groups.into_iter().collect::<Vec<_>>(), vec!["math"]);
    assert_eq!(articles.into_iter().collect::<Vec<_>>(), vec!["Algebra"]);
    assert_eq!(links.len(), 1);
}

/// Delegating repository that fails the Nth article insert.
struct FlakyRepository<'conn> {
    inner: SqliteRepository<'conn>,
    fail_on_insert: Cell<Option<usize>>,
    inserts: Cell<usize>,
}

impl<'conn> FlakyRepository<'conn> {
    fn new(conn: &'conn Connection, fail_on_insert: usize) -> Self {
        Self {
            inner: SqliteRepository::try_new(conn).unwrap(),
            fail_on_insert: Cell::new(Some(fail_on_insert)),
            inserts: Cell::new(0),
        }
    }

    fn heal(&self) {
        self.fail_on_insert.set(None);
    }
}

impl GroupRepository for FlakyRepository<'_> {
    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        self.inner.add_group(name)
    }
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        self.inner.get_group(id)
    }
    fn get_group_by_name(&self, name: &str) -> RepoResult<Option<Group>> {
        self.inner.get_group_by_name(name)
    }
    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        self.inner.list_groups()
    }
    fn rename_group(&self, id: GroupId, name: &str) -> RepoResult<()> {
        self.inner.rename_group(id, name)
    }
    fn delete_group(&self, id: GroupId) -> RepoResult<()> {
        self.inner.delete_group(id)
    }
    fn delete_all_groups(&self) -> RepoResult<usize> {
        self.inner.delete_all_groups()
    }
}

impl ArticleRepository for FlakyRepository<'_> {
    fn add_article(&self, draft: &ArticleDraft) -> RepoResult<ArticleId> {
        self.inner.add_article(draft)
    }
    fn add_article_with_id(&self, article: &Article) -> RepoResult<ArticleId> {
        let count = self.inserts.get() + 1;
        self.inserts.set(count);
        if self.fail_on_insert.get() == Some(count) {
            return Err(RepoError::InvalidData("injected storage failure".to_string()));
        }
        self.inner.add_article_with_id(article)
    }
    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>> {
        self.inner.get_article(id)
    }
    fn list_articles(&self) -> RepoResult<Vec<Article>> {
        self.inner.list_articles()
    }
    fn update_article(&self, article: &Article) -> RepoResult<()> {
        self.inner.update_article(article)
    }
    fn delete_article(&self, id: ArticleId) -> RepoResult<()> {
        self.inner.delete_article(id)
    }
    fn delete_all_articles(&self) -> RepoResult<usize> {
        self.inner.delete_all_articles()
    }
    fn articles_for_group(&self, group_id: GroupId) -> RepoResult<Vec<Article>> {
        self.inner.articles_for_group(group_id)
    }
    fn groups_for_article(&self, article_id: ArticleId) -> RepoResult<Vec<Group>> {
        self.inner.groups_for_article(article_id)
    }
    fn associate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()> {
        self.inner.associate(article_id, group_id)
    }
    fn dissociate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()> {
        self.inner.dissociate(article_id, group_id)
    }
    fn clear_associations_for_group(&self, group_id: GroupId) -> RepoResult<usize> {
        self.inner.clear_associations_for_group(group_id)
    }
    fn clear_associations_for_article(&self, article_id: ArticleId) -> RepoResult<usize> {
        self.inner.clear_associations_for_article(article_id)
    }
    fn clear_all_associations(&self) -> RepoResult<usize> {
        self.inner.clear_all_associations()
    }
    fn list_associations(&self) -> RepoResult<Vec<Association>> {
        self.inner.list_associations()
    }
}

#[test]
fn storage_failure_mid_replay_reports_progress_and_retry_completes() {
    let conn = open_db_in_memory().unwrap();
    let snapshot = Snapshot::new(vec![
        entry(1, "a", vec![article(10, "A1")]),
        entry(2, "b", vec![article(20, "B1")]),
        entry(3, "c", vec![article(30, "C1"), article(31, "C2")]),
    ]);
    let service = RestoreService::new(FlakyRepository::new(&conn, 3));

    let err = service
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap_err();
    match &err {
        RestoreError::Failed {
            applied_entries,
            total_entries,
            ..
        } => {
            assert_eq!(*applied_entries, 2);
            assert_eq!(*total_entries, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.may_be_partial());
    // Entries before the failure stay committed; group "c" was created too.
    assert_eq!(counts(&conn), (3, 2, 2));
    assert_no_orphans(&conn);

    let retry_service = RestoreService::new(FlakyRepository::new(&conn, 0));
    retry_service.restore_snapshot(&snapshot, RestoreMode::Merge).unwrap();
    assert_eq!(counts(&conn), (3, 4, 4));
}

#[test]
fn failed_replace_can_be_retried_to_a_clean_result() {
    let conn = open_db_in_memory().unwrap();
    seed_java_in_cs(&conn);
    let snapshot = Snapshot::new(vec![
        entry(1, "cs", vec![article(10, "Java")]),
        entry(2, "math", vec![article(20, "Algebra")]),
    ]);
    let flaky = FlakyRepository::new(&conn, 2);
    let service = RestoreService::new(flaky);

    let err = service
        .restore_snapshot(&snapshot, RestoreMode::Replace)
        .unwrap_err();
    assert!(matches!(err, RestoreError::Failed { applied_entries: 1, .. }));

    let healed = FlakyRepository::new(&conn, 0);
    healed.heal();
    RestoreService::new(healed)
        .restore_snapshot(&snapshot, RestoreMode::Replace)
        .unwrap();
    assert_eq!(counts(&conn), (2, 2, 2));
    assert_no_orphans(&conn);
}

#[test]
fn written_snapshot_can_be_restored_into_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manual.bak");
    let snapshot = Snapshot::new(vec![entry(4, "faq", vec![article(8, "Reset password")])]);
    write_snapshot(&path, &snapshot).unwrap();

    let conn = open_db_in_memory().unwrap();
    let report = RestoreService::new(SqliteRepository::try_new(&conn).unwrap())
        .restore(&path, RestoreMode::Merge)
        .unwrap();
    assert_eq!(report.snapshot_id, snapshot.snapshot_id);
    assert_eq!(counts(&conn), (1, 1, 1));
}

/// Delegating repository that keeps the trait's fresh-id insert.
struct FreshIdRepository<'conn> {
    inner: SqliteRepository<'conn>,
}

impl GroupRepository for FreshIdRepository<'_> {
    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        self.inner.add_group(name)
    }
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        self.inner.get_group(id)
    }
    fn get_group_by_name(&self, name: &str) -> RepoResult<Option<Group>> {
        self.inner.get_group_by_name(name)
    }
    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        self.inner.list_groups()
    }
    fn rename_group(&self, id: GroupId, name: &str) -> RepoResult<()> {
        self.inner.rename_group(id, name)
    }
    fn delete_group(&self, id: GroupId) -> RepoResult<()> {
        self.inner.delete_group(id)
    }
    fn delete_all_groups(&self) -> RepoResult<usize> {
        self.inner.delete_all_groups()
    }
}

impl ArticleRepository for FreshIdRepository<'_> {
    fn add_article(&self, draft: &ArticleDraft) -> RepoResult<ArticleId> {
        self.inner.add_article(draft)
    }
    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>> {
        self.inner.get_article(id)
    }
    fn list_articles(&self) -> RepoResult<Vec<Article>> {
        self.inner.list_articles()
    }
    fn update_article(&self, article: &Article) -> RepoResult<()> {
        self.inner.update_article(article)
    }
    fn delete_article(&self, id: ArticleId) -> RepoResult<()> {
        self.inner.delete_article(id)
    }
    fn delete_all_articles(&self) -> RepoResult<usize> {
        self.inner.delete_all_articles()
    }
    fn articles_for_group(&self, group_id: GroupId) -> RepoResult<Vec<Article>> {
        self.inner.articles_for_group(group_id)
    }
    fn groups_for_article(&self, article_id: ArticleId) -> RepoResult<Vec<Group>> {
        self.inner.groups_for_article(article_id)
    }
    fn associate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()> {
        self.inner.associate(article_id, group_id)
    }
    fn dissociate(&self, article_id: ArticleId, group_id: GroupId) -> RepoResult<()> {
        self.inner.dissociate(article_id, group_id)
    }
    fn clear_associations_for_group(&self, group_id: GroupId) -> RepoResult<usize> {
        self.inner.clear_associations_for_group(group_id)
    }
    fn clear_associations_for_article(&self, article_id: ArticleId) -> RepoResult<usize> {
        self.inner.clear_associations_for_article(article_id)
    }
    fn clear_all_associations(&self) -> RepoResult<usize> {
        self.inner.clear_all_associations()
    }
    fn list_associations(&self) -> RepoResult<Vec<Association>> {
        self.inner.list_associations()
    }
}

#[test]
fn shared_article_links_use_live_id_when_store_assigns_fresh_ids() {
    let conn = open_db_in_memory().unwrap();
    let snapshot = Snapshot::new(vec![
        entry(7, "a", vec![article(50, "Shared")]),
        entry(8, "b", vec![article(50, "Shared")]),
    ]);

    let repo = FreshIdRepository {
        inner: SqliteRepository::try_new(&conn).unwrap(),
    };
    let report = RestoreService::new(repo)
        .restore_snapshot(&snapshot, RestoreMode::Merge)
        .unwrap();
    assert_eq!(report.articles_created, 1);
    assert_eq!(report.articles_reused, 0);
    assert_eq!(report.associations, 2);

    let store = SqliteRepository::try_new(&conn).unwrap();
    let articles = store.list_articles().unwrap();
    assert_eq!(articles.len(), 1);
    let live_id = articles[0].id;
    assert_ne!(live_id, 50);
    assert!(store.get_article(50).unwrap().is_none());

    let a = store.get_group_by_name("a").unwrap().unwrap();
    let b = store.get_group_by_name("b").unwrap().unwrap();
    assert_eq!(
        store.list_associations().unwrap(),
        vec![
            Association {
                article_id: live_id,
                group_id: a.id,
            },
            Association {
                article_id: live_id,
                group_id: b.id,
            },
        ]
    );
    assert_no_orphans(&conn);
}
