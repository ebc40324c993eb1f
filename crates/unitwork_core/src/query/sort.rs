//! Ordering applied after filter and include composition.
//!
//! # Invariants
//! - Sorting is stable: equal keys keep their natural order.
//! - Field keys compare on the serialized entity, so dotted paths can reach
//!   eager-loaded relations.
//! - `null` sorts before every other value in ascending order.

use crate::model::entity::Entity;
use crate::repo::error::{RepoError, RepoResult};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Field path plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Sort transform: a field-and-direction list or an opaque comparator.
///
/// A comparator can carry field keys that break its ties.
pub enum Sort<T> {
    Fields(Vec<SortKey>),
    Comparator {
        compare: Box<dyn Fn(&T, &T) -> Ordering>,
        then: Vec<SortKey>,
    },
}

impl<T> Sort<T> {
    pub fn by(field: impl Into<String>) -> Self {
        Self::Fields(vec![SortKey {
            field: field.into(),
            direction: SortDirection::Ascending,
        }])
    }

    pub fn by_desc(field: impl Into<String>) -> Self {
        Self::Fields(vec![SortKey {
            field: field.into(),
            direction: SortDirection::Descending,
        }])
    }

    /// Adds a tie-breaking key after every existing key or comparator.
    pub fn then_by(self, field: impl Into<String>, direction: SortDirection) -> Self {
        let key = SortKey {
            field: field.into(),
            direction,
        };
        match self {
            Self::Fields(mut keys) => {
                keys.push(key);
                Self::Fields(keys)
            }
            Self::Comparator { compare, mut then } => {
                then.push(key);
                Self::Comparator { compare, then }
            }
        }
    }

    pub fn with(compare: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        Self::Comparator {
            compare: Box::new(compare),
            then: Vec::new(),
        }
    }
}

impl<T> Debug for Sort<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fields(keys) => f.debug_tuple("Fields").field(keys).finish(),
            Self::Comparator { then, .. } => f
                .debug_struct("Comparator")
                .field("then", then)
                .finish_non_exhaustive(),
        }
    }
}

/// Sorts already-composed results.
///
/// # Errors
/// - `QueryComposition` when a sort field is empty or unknown, or when one
///   column mixes value kinds (e.g. numbers and strings).
pub fn apply_sort<T: Entity>(items: Vec<T>, sort: &Sort<T>) -> RepoResult<Vec<T>> {
    match sort {
        Sort::Fields(keys) if keys.is_empty() => Err(RepoError::QueryComposition(format!(
            "sort on `{}` has no keys",
            T::SET_NAME
        ))),
        Sort::Fields(keys) => sort_rows(items, None, keys),
        Sort::Comparator { compare, then } if then.is_empty() => {
            let mut items = items;
            items.sort_by(|left, right| compare(left, right));
            Ok(items)
        }
        Sort::Comparator { compare, then } => sort_rows(items, Some(compare.as_ref()), then),
    }
}

fn sort_rows<T: Entity>(
    items: Vec<T>,
    compare: Option<&dyn Fn(&T, &T) -> Ordering>,
    keys: &[SortKey],
) -> RepoResult<Vec<T>> {

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let body = serde_json::to_value(&item).map_err(|err| {
            RepoError::InvalidData(format!("cannot serialize `{}`: {err}", T::SET_NAME))
        })?;
        let columns = keys
            .iter()
            .map(|key| field_value::<T>(&body, &key.field))
            .collect::<RepoResult<Vec<_>>>()?;
        rows.push((columns, item));
    }

    for (index, key) in keys.iter().enumerate() {
        ensure_comparable::<T>(rows.iter().map(|(columns, _)| &columns[index]), &key.field)?;
    }

    rows.sort_by(|(left, left_item), (right, right_item)| {
        let first = compare.map_or(Ordering::Equal, |compare| compare(left_item, right_item));
        first.then_with(|| {
            keys.iter()
                .zip(left.iter().zip(right.iter()))
                .map(|(key, (a, b))| match key.direction {
                    SortDirection::Ascending => compare_values(a, b),
                    SortDirection::Descending => compare_values(b, a),
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
    });

    Ok(rows.into_iter().map(|(_, item)| item).collect())
}

fn field_value<T: Entity>(body: &Value, path: &str) -> RepoResult<Value> {
    let path = path.trim();
    if path.is_empty() {
        return Err(RepoError::QueryComposition(format!(
            "empty sort field on `{}`",
            T::SET_NAME
        )));
    }

    let mut current = body;
    for segment in path.split('.') {
        match current {
            Value::Null => return Ok(Value::Null),
            Value::Object(fields) => {
                current = fields.get(segment).ok_or_else(|| {
                    RepoError::QueryComposition(format!(
                        "unknown sort field `{path}` on `{}`",
                        T::SET_NAME
                    ))
                })?;
            }
            _ => {
                return Err(RepoError::QueryComposition(format!(
                    "sort field `{path}` on `{}` traverses a non-object value",
                    T::SET_NAME
                )))
            }
        }
    }
    Ok(current.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Bool,
    Number,
    Text,
}

fn ensure_comparable<'a, T: Entity>(
    values: impl Iterator<Item = &'a Value>,
    field: &str,
) -> RepoResult<()> {
    let mut seen: Option<ValueKind> = None;
    for value in values {
        let kind = match value {
            Value::Null => continue,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::Text,
            Value::Array(_) | Value::Object(_) => {
                return Err(RepoError::QueryComposition(format!(
                    "sort field `{field}` on `{}` is not a scalar",
                    T::SET_NAME
                )))
            }
        };
        match seen {
            None => seen = Some(kind),
            Some(previous) if previous != kind => {
                return Err(RepoError::QueryComposition(format!(
                    "sort field `{field}` on `{}` mixes value kinds",
                    T::SET_NAME
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
