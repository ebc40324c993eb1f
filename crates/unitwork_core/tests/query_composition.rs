mod common;

use common::{author, memory_uow, seeded_store, Author, Book};
use std::cell::Cell;
use std::rc::Rc;
use unitwork_core::{
    compose_query, DocumentContext, EntityRepository, Filter, QuerySpec, RepoError, Sort,
    SortDirection,
};

fn ids(books: &[Book]) -> Vec<i64> {
    books.iter().map(|book| book.id).collect()
}

#[test]
fn reference_include_loads_related_author() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let loaded = books.get_all(None, None, &["author"]).unwrap();
    assert_eq!(loaded.len(), 4);
    let kindred = loaded.iter().find(|book| book.id == 12).unwrap();
    assert_eq!(kindred.author.as_ref().unwrap().name, "Octavia");

    let plain = books.get_all(None, None, &[]).unwrap();
    assert!(plain.iter().all(|book| book.author.is_none()));
}

#[test]
fn collection_include_loads_children_in_natural_order() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let authors = uow.get_repository::<Author>().unwrap();

    let ursula = authors
        .get_first_or_default(Some(&Filter::new(|author: &Author| author.id == 1)), &["books"])
        .unwrap()
        .unwrap();
    assert_eq!(ids(&ursula.books), vec![10, 13]);
}

#[test]
fn duplicate_include_paths_are_applied_without_error() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let loaded = books.get_all(None, None, &["author", "author"]).unwrap();
    assert!(loaded.iter().all(|book| book.author.is_some()));
}

#[test]
fn invalid_include_paths_are_composition_errors() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    for path in ["publisher", "", "author.books"] {
        let err = books.get_all(None, None, &[path]).unwrap_err();
        assert!(
            matches!(err, RepoError::QueryComposition(_)),
            "path `{path}` gave {err}"
        );
    }

    let err = books
        .get_first_or_default(None, &["publisher"])
        .unwrap_err();
    assert!(matches!(err, RepoError::QueryComposition(_)));
}

#[test]
fn eager_loaded_relations_are_not_written_back() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let mut dispossessed = books
        .get_first_or_default(Some(&Filter::new(|book: &Book| book.id == 10)), &["author"])
        .unwrap()
        .unwrap();
    assert!(dispossessed.author.is_some());
    dispossessed.pages += 1;
    books.update(&dispossessed, &[]).unwrap();
    uow.save_changes().unwrap();

    let mut rename = memory_uow(&store);
    let authors = rename.get_repository::<Author>().unwrap();
    authors.update(&author(1, "Le Guin"), &[]).unwrap();
    rename.save_changes().unwrap();

    let mut fresh = memory_uow(&store);
    let books = fresh.get_repository::<Book>().unwrap();
    let plain = books.get_by_id(&10).unwrap().unwrap();
    assert_eq!(plain.pages, 388);
    assert!(plain.author.is_none());

    let stale = Filter::new(|book: &Book| book.author.as_ref().is_some_and(|a| a.name == "Ursula"));
    assert!(books.get_all(Some(&stale), None, &[]).unwrap().is_empty());

    let loaded = books.get_all(None, None, &["author"]).unwrap();
    let reloaded = loaded.iter().find(|book| book.id == 10).unwrap();
    assert_eq!(reloaded.author.as_ref().unwrap().name, "Le Guin");
}

#[test]
fn sort_is_applied_after_filter() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let short = Filter::new(|book: &Book| book.pages < 400);
    let sorted = books
        .get_all(Some(&short), Some(&Sort::by("pages")), &[])
        .unwrap();
    assert_eq!(ids(&sorted), vec![13, 12, 10]);

    let descending = books
        .get_all(None, Some(&Sort::by_desc("pages")), &[])
        .unwrap();
    assert_eq!(ids(&descending), vec![11, 10, 12, 13]);
}

#[test]
fn sort_can_use_eager_loaded_fields() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let sort = Sort::by("author.name").then_by("title", SortDirection::Ascending);
    let sorted = books.get_all(None, Some(&sort), &["author"]).unwrap();
    assert_eq!(ids(&sorted), vec![11, 12, 10, 13]);

    // Without the include every author is null, so the title key decides.
    let unloaded = books.get_all(None, Some(&sort), &[]).unwrap();
    assert_eq!(ids(&unloaded), vec![11, 12, 10, 13]);
}

#[test]
fn comparator_sort_is_supported() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let by_title_length = Sort::with(|a: &Book, b: &Book| a.title.len().cmp(&b.title.len()));
    let sorted = books.get_all(None, Some(&by_title_length), &[]).unwrap();
    assert_eq!(sorted[0].title, "Kindred");
}

#[test]
fn unknown_sort_field_is_a_composition_error() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let err = books
        .get_all(None, Some(&Sort::by("isbn")), &[])
        .unwrap_err();
    assert!(matches!(err, RepoError::QueryComposition(_)));
}

#[test]
fn compose_query_runs_against_a_bare_context() {
    let store = seeded_store();
    let mut context = DocumentContext::new(store);

    let filter = Filter::new(|book: &Book| book.author_id == Some(1));
    let sort = Sort::by_desc("title");
    let spec = QuerySpec {
        filter: Some(&filter),
        sort: Some(&sort),
        include: &["author"],
    };
    let books = compose_query(&mut context, spec).unwrap();
    assert_eq!(ids(&books), vec![13, 10]);
    assert!(books
        .iter()
        .all(|book| book.author.as_ref().is_some_and(|author| author.id == 1)));
}

#[test]
fn reentrant_read_from_filter_reports_busy_context() {
    let store = seeded_store();
    let mut uow = memory_uow(&store);
    let books = uow.get_repository::<Book>().unwrap();

    let saw_busy = Rc::new(Cell::new(false));
    let inner = Rc::clone(&books);
    let flag = Rc::clone(&saw_busy);
    let filter = Filter::new(move |_: &Book| {
        if matches!(inner.get_all(None, None, &[]), Err(RepoError::ContextBusy)) {
            flag.set(true);
        }
        true
    });

    assert_eq!(books.get_all(Some(&filter), None, &[]).unwrap().len(), 4);
    assert!(saw_busy.get());
}
