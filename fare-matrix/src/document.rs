//! Structural merging of JSON documents.
//!
//! The snapshot on disk and the manual override file are both free-form JSON
//! trees. They are combined at the `serde_json::Value` level before being
//! parsed into typed stations and routes, so overrides can patch any key at
//! any depth, including keys the typed model knows nothing about.

use serde_json::{Map, Value};

use crate::domain::InvalidStationCode;

/// Errors found while interpreting a merged document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// A key that should be a station code is not one
    #[error(transparent)]
    InvalidCode(#[from] InvalidStationCode),

    /// A `stations` entry could not be read as a station
    #[error("invalid station {code}: {source}")]
    InvalidStation {
        code: String,
        #[source]
        source: serde_json::Error,
    },

    /// The `routes` section could not be read as a route matrix
    #[error("invalid routes: {0}")]
    InvalidRoutes(#[source] serde_json::Error),

    /// A section that must be an object is something else
    #[error("expected `{0}` to be an object")]
    NotAnObject(&'static str),
}

/// Merge `overlay` into `base`.
///
/// Objects present on both sides are merged key by key, recursively. Any
/// other combination (scalars, arrays, nulls, or an object meeting a
/// non-object) is resolved in favour of `overlay`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Borrow a top-level section of a document as an object.
///
/// A missing section yields `None`; a section that is present but not an
/// object is an error.
pub fn section<'a>(
    document: &'a Value,
    key: &'static str,
) -> Result<Option<&'a Map<String, Value>>, DocumentError> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(DocumentError::NotAnObject(key)),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| Value::from(n)),
            "[a-z]{0,4}".prop_map(Value::String),
        ]
    }

    fn tree() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            proptest::collection::btree_map("[a-c]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect()))
        })
    }

    /// Every leaf path of `overlay`, paired with its value.
    fn leaves(value: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (k, v) in map {
                    path.push(k.clone());
                    leaves(v, path, out);
                    path.pop();
                }
            }
            other => out.push((path.clone(), other.clone())),
        }
    }

    fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
        path.iter().try_fold(value, |v, k| v.get(k))
    }

    proptest! {
        /// Every non-empty-object leaf of the overlay is present in the result
        #[test]
        fn overlay_leaves_survive(base in tree(), overlay in tree()) {
            let mut merged = base.clone();
            deep_merge(&mut merged, overlay.clone());

            let mut out = Vec::new();
            leaves(&overlay, &mut Vec::new(), &mut out);
            for (path, value) in out {
                if value == Value::Object(Map::new()) {
                    continue;
                }
                prop_assert_eq!(lookup(&merged, &path), Some(&value));
            }
        }

        /// Merging the same overlay twice changes nothing further
        #[test]
        fn merge_is_idempotent(base in tree(), overlay in tree()) {
            let mut once = base.clone();
            deep_merge(&mut once, overlay.clone());
            let mut twice = once.clone();
            deep_merge(&mut twice, overlay);
            prop_assert_eq!(once, twice);
        }
    }
}
