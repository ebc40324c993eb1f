#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use unitwork_core::{
    DocumentContext, Entity, EntityRepository, MemoryStore, Relation, UnitOfWork,
};

pub type MemoryContext = DocumentContext<MemoryStore>;
pub type MemoryUow = UnitOfWork<MemoryContext>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub books: Vec<Book>,
}

impl Entity for Author {
    type Key = i64;
    const SET_NAME: &'static str = "authors";

    fn key(&self) -> i64 {
        self.id
    }

    fn relations() -> &'static [Relation] {
        const RELATIONS: &[Relation] = &[Relation::collection("books", "books", "author_id")];
        RELATIONS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub pages: i64,
    pub author_id: Option<i64>,
    #[serde(default)]
    pub author: Option<Author>,
}

impl Entity for Book {
    type Key = i64;
    const SET_NAME: &'static str = "books";

    fn key(&self) -> i64 {
        self.id
    }

    fn relations() -> &'static [Relation] {
        const RELATIONS: &[Relation] = &[Relation::reference("author", "authors", "author_id")];
        RELATIONS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Entity for Tag {
    type Key = String;
    const SET_NAME: &'static str = "tags";

    fn key(&self) -> String {
        self.name.clone()
    }
}

pub fn author(id: i64, name: &str) -> Author {
    Author {
        id,
        name: name.to_string(),
        books: Vec::new(),
    }
}

pub fn book(id: i64, title: &str, pages: i64, author_id: Option<i64>) -> Book {
    Book {
        id,
        title: title.to_string(),
        pages,
        author_id,
        author: None,
    }
}

pub fn memory_uow(store: &MemoryStore) -> MemoryUow {
    UnitOfWork::new(DocumentContext::new(store.clone()))
}

/// Store pre-populated with three authors and four books.
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let mut uow = memory_uow(&store);

    let authors = uow.get_repository::<Author>().unwrap();
    authors
        .create(
            &author(1, "Ursula"),
            &[author(2, "Iain"), author(3, "Octavia")],
        )
        .unwrap();

    let books = uow.get_repository::<Book>().unwrap();
    books
        .create(
            &book(10, "The Dispossessed", 387, Some(1)),
            &[
                book(11, "Excession", 451, Some(2)),
                book(12, "Kindred", 264, Some(3)),
                book(13, "The Lathe of Heaven", 184, Some(1)),
            ],
        )
        .unwrap();

    uow.save_changes().unwrap();
    store
}
