//! Eager-load path validation and relation loading.
//!
//! # Invariants
//! - Paths are applied in the order given; duplicates are loaded again.
//! - Only single-segment paths naming a declared relation are accepted.
//! - Relation fields never reach storage: snapshots and stored bodies are
//!   stripped of them, so loaded data only lives in query results.

use crate::model::entity::{find_relation, Entity, Relation, RelationKind};
use crate::repo::error::{RepoError, RepoResult};
use crate::store::StoredDocument;
use serde_json::Value;

/// Resolves every include path of `T` to its declared relation.
///
/// # Errors
/// - `QueryComposition` for empty, nested or undeclared paths.
pub fn resolve_includes<T: Entity>(include: &[&str]) -> RepoResult<Vec<&'static Relation>> {
    include
        .iter()
        .map(|path| {
            let path = path.trim();
            if path.is_empty() {
                return Err(RepoError::QueryComposition(format!(
                    "empty include path on `{}`",
                    T::SET_NAME
                )));
            }
            if path.contains('.') {
                return Err(RepoError::QueryComposition(format!(
                    "nested include path `{path}` is not supported on `{}`",
                    T::SET_NAME
                )));
            }
            find_relation::<T>(path).ok_or_else(|| {
                RepoError::QueryComposition(format!(
                    "unknown include path `{path}` on `{}`",
                    T::SET_NAME
                ))
            })
        })
        .collect()
}

/// Writes the related document(s) of `relation` into `body`.
///
/// `owner_key` is the stored identity of the document being loaded and
/// `targets` is the full target set in natural order.
pub fn attach_relation(
    body: &mut Value,
    owner_key: &str,
    relation: &Relation,
    targets: &[StoredDocument],
) -> RepoResult<()> {
    let Value::Object(fields) = body else {
        return Err(RepoError::QueryComposition(format!(
            "relation `{}` requires an object document, got `{owner_key}`",
            relation.name
        )));
    };

    let loaded = match relation.kind {
        RelationKind::Reference { foreign_key } => {
            let target_key = fields.get(foreign_key).ok_or_else(|| {
                RepoError::QueryComposition(format!(
                    "relation `{}` uses missing field `{foreign_key}`",
                    relation.name
                ))
            })?;
            match scalar_identity(target_key) {
                Some(key) => targets
                    .iter()
                    .find(|target| target.key == key)
                    .map(|target| target.body.clone())
                    .unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        RelationKind::Collection { foreign_key } => Value::Array(
            targets
                .iter()
                .filter(|target| {
                    target
                        .body
                        .get(foreign_key)
                        .and_then(scalar_identity)
                        .is_some_and(|key| key == owner_key)
                })
                .map(|target| target.body.clone())
                .collect(),
        ),
    };

    fields.insert(relation.name.to_string(), loaded);
    Ok(())
}

/// Removes every declared relation field of `T` from `body`.
pub fn strip_relations<T: Entity>(body: &mut Value) {
    if let Value::Object(fields) = body {
        for relation in T::relations() {
            fields.remove(relation.name);
        }
    }
}

/// Renders a JSON scalar the way `Display` renders the matching key type.
fn scalar_identity(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{attach_relation, scalar_identity, strip_relations};
    use crate::model::entity::{Entity, Relation};
    use crate::store::StoredDocument;
    use serde_json::json;

    fn doc(key: &str, body: serde_json::Value) -> StoredDocument {
        StoredDocument {
            key: key.to_string(),
            body,
        }
    }

    #[test]
    fn reference_loads_matching_target_or_null() {
        let relation = Relation::reference("author", "authors", "author_id");
        let targets = vec![doc("1", json!({"id": 1, "name": "Ada"}))];

        let mut body = json!({"id": 10, "author_id": 1});
        attach_relation(&mut body, "10", &relation, &targets).unwrap();
        assert_eq!(body["author"]["name"], "Ada");

        let mut orphan = json!({"id": 11, "author_id": 2});
        attach_relation(&mut orphan, "11", &relation, &targets).unwrap();
        assert!(orphan["author"].is_null());
    }

    #[test]
    fn collection_keeps_target_order() {
        let relation = Relation::collection("books", "books", "author_id");
        let targets = vec![
            doc("b", json!({"id": "b", "author_id": 1})),
            doc("x", json!({"id": "x", "author_id": 2})),
            doc("a", json!({"id": "a", "author_id": 1})),
        ];

        let mut body = json!({"id": 1});
        attach_relation(&mut body, "1", &relation, &targets).unwrap();
        let ids: Vec<_> = body["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn scalar_identity_matches_display_of_keys() {
        assert_eq!(scalar_identity(&json!(42)).as_deref(), Some("42"));
        assert_eq!(scalar_identity(&json!("k")).as_deref(), Some("k"));
        assert_eq!(scalar_identity(&json!(null)), None);
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Owner {
        id: i64,
    }

    impl Entity for Owner {
        type Key = i64;
        const SET_NAME: &'static str = "owners";

        fn key(&self) -> i64 {
            self.id
        }

        fn relations() -> &'static [Relation] {
            const RELATIONS: &[Relation] = &[Relation::collection("pets", "pets", "owner_id")];
            RELATIONS
        }
    }

    #[test]
    fn strip_relations_removes_only_declared_fields() {
        let mut body = json!({"id": 1, "pets": [{"id": 2}], "name": "kept"});
        strip_relations::<Owner>(&mut body);
        assert_eq!(body, json!({"id": 1, "name": "kept"}));
    }
}
