mod common;

use common::{author, book, Author, Book};
use std::path::Path;
use unitwork_core::{
    DbError, DocumentContext, EntityRepository, Filter, RepoError, Sort, SqliteStore, UnitOfWork,
};

type SqliteUow = UnitOfWork<DocumentContext<SqliteStore>>;

fn open_uow(path: &Path) -> SqliteUow {
    UnitOfWork::new(DocumentContext::new(SqliteStore::open(path).unwrap()))
}

#[test]
fn create_save_and_read_back_from_fresh_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unitwork.db");

    let mut uow = open_uow(&path);
    let authors = uow.get_repository::<Author>().unwrap();
    authors.create(&author(1, "A"), &[]).unwrap();
    assert_eq!(uow.save_changes().unwrap(), 1);

    let mut fresh = open_uow(&path);
    let loaded = fresh
        .get_repository::<Author>()
        .unwrap()
        .get_by_id(&1)
        .unwrap()
        .unwrap();
    assert_eq!(loaded, author(1, "A"));
}

#[test]
fn full_lifecycle_counts_follow_create_update_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.db");

    let mut uow = open_uow(&path);
    let books = uow.get_repository::<Book>().unwrap();
    books
        .create(
            &book(1, "one", 100, None),
            &[book(2, "two", 200, None), book(3, "three", 300, None)],
        )
        .unwrap();
    assert_eq!(uow.save_changes().unwrap(), 3);

    let mut uow = open_uow(&path);
    let books = uow.get_repository::<Book>().unwrap();
    let mut two = books.get_by_id(&2).unwrap().unwrap();
    two.title = "TWO".to_string();
    books.update(&two, &[]).unwrap();
    books.delete_by_id(&3).unwrap();
    assert_eq!(uow.save_changes().unwrap(), 2);

    let mut uow = open_uow(&path);
    let books = uow.get_repository::<Book>().unwrap();
    let titles: Vec<String> = books
        .get_all(None, Some(&Sort::by("id")), &[])
        .unwrap()
        .into_iter()
        .map(|book| book.title)
        .collect();
    assert_eq!(titles, vec!["one", "TWO"]);
}

#[test]
fn includes_and_filters_work_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("include.db");

    let mut uow = open_uow(&path);
    uow.get_repository::<Author>()
        .unwrap()
        .create(&author(1, "Ursula"), &[author(2, "Iain")])
        .unwrap();
    uow.get_repository::<Book>()
        .unwrap()
        .create(
            &book(10, "Lathe", 184, Some(1)),
            &[book(11, "Excession", 451, Some(2)), book(12, "Orphan", 5, None)],
        )
        .unwrap();
    uow.save_changes().unwrap();

    let mut uow = open_uow(&path);
    let books = uow.get_repository::<Book>().unwrap();
    let filter = Filter::new(|book: &Book| book.pages > 100);
    let loaded = books.get_all(Some(&filter), None, &["author"]).unwrap();
    let names: Vec<String> = loaded
        .iter()
        .map(|book| book.author.as_ref().unwrap().name.clone())
        .collect();
    assert_eq!(names, vec!["Ursula", "Iain"]);

    let orphan = books
        .get_first_or_default(Some(&Filter::new(|book: &Book| book.id == 12)), &["author"])
        .unwrap()
        .unwrap();
    assert!(orphan.author.is_none());
}

#[test]
fn failing_commit_rolls_back_the_whole_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollback.db");

    let mut uow = open_uow(&path);
    uow.get_repository::<Author>()
        .unwrap()
        .create(&author(1, "kept"), &[])
        .unwrap();
    uow.save_changes().unwrap();

    let mut uow = open_uow(&path);
    let authors = uow.get_repository::<Author>().unwrap();
    authors.create(&author(2, "new"), &[]).unwrap();
    authors.update(&author(404, "ghost"), &[]).unwrap();
    let err = uow.save_changes().unwrap_err();
    assert!(matches!(
        err,
        RepoError::CommitFailure(DbError::MissingRow { .. })
    ));

    let mut uow = open_uow(&path);
    let all = uow
        .get_repository::<Author>()
        .unwrap()
        .get_all(None, None, &[])
        .unwrap();
    assert_eq!(all, vec![author(1, "kept")]);
}

#[test]
fn corrupted_document_surfaces_invalid_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.db");

    let mut uow = open_uow(&path);
    uow.get_repository::<Author>()
        .unwrap()
        .create(&author(1, "fine"), &[])
        .unwrap();
    uow.save_changes().unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE documents SET body = '{\"id\": 1}' WHERE entity_set = 'authors';",
        [],
    )
    .unwrap();
    drop(conn);

    let mut uow = open_uow(&path);
    let err = uow
        .get_repository::<Author>()
        .unwrap()
        .get_all(None, None, &[])
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn in_memory_sqlite_store_serves_one_unit_of_work() {
    let mut uow = UnitOfWork::new(DocumentContext::new(SqliteStore::open_in_memory().unwrap()));
    let authors = uow.get_repository::<Author>().unwrap();

    authors.create(&author(1, "memory"), &[]).unwrap();
    assert!(authors.get_all(None, None, &[]).unwrap().is_empty());
    assert_eq!(authors.get_by_id(&1).unwrap().unwrap().name, "memory");
    assert_eq!(uow.save_changes().unwrap(), 1);
}
