//! Field-level structural diff of two payloads

use serde::Serialize;
use serde_json::Value;
use similar::TextDiff;

/// Maximum recursion depth for diff operations
const MAX_DIFF_DEPTH: usize = 128;

/// One field that differs between two payloads.
///
/// Paths are dotted for object keys and indexed for arrays
/// (`settings.columns[2].label`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum FieldChange {
    Added { path: String, value: Value },
    Removed { path: String, value: Value },
    Modified { path: String, old: Value, new: Value },
}

impl FieldChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }
}

/// Differences between two payloads plus a similarity estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralDiff {
    pub changes: Vec<FieldChange>,
    /// Similarity ratio (0.0 to 1.0)
    pub similarity: f64,
}

impl StructuralDiff {
    pub fn compute(old: &Value, new: &Value) -> Self {
        let mut changes = Vec::new();
        diff_values(old, new, String::new(), &mut changes, 0);
        Self {
            changes,
            similarity: similarity(old, new),
        }
    }

    pub fn is_equivalent(&self) -> bool {
        self.changes.is_empty()
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn diff_values(old: &Value, new: &Value, path: String, changes: &mut Vec<FieldChange>, depth: usize) {
    if depth > MAX_DIFF_DEPTH {
        if old != new {
            changes.push(FieldChange::Modified {
                path,
                old: old.clone(),
                new: new.clone(),
            });
        }
        return;
    }

    match (old, new) {
        (Value::Object(old_obj), Value::Object(new_obj)) => {
            for (key, old_value) in old_obj {
                match new_obj.get(key) {
                    Some(new_value) => {
                        diff_values(old_value, new_value, child(&path, key), changes, depth + 1)
                    }
                    None => changes.push(FieldChange::Removed {
                        path: child(&path, key),
                        value: old_value.clone(),
                    }),
                }
            }
            for (key, new_value) in new_obj {
                if !old_obj.contains_key(key) {
                    changes.push(FieldChange::Added {
                        path: child(&path, key),
                        value: new_value.clone(),
                    });
                }
            }
        }
        (Value::Array(old_arr), Value::Array(new_arr)) => {
            for i in 0..old_arr.len().max(new_arr.len()) {
                let path = format!("{path}[{i}]");
                match (old_arr.get(i), new_arr.get(i)) {
                    (Some(o), Some(n)) => diff_values(o, n, path, changes, depth + 1),
                    (Some(o), None) => changes.push(FieldChange::Removed {
                        path,
                        value: o.clone(),
                    }),
                    (None, Some(n)) => changes.push(FieldChange::Added {
                        path,
                        value: n.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        _ => {
            if old != new {
                changes.push(FieldChange::Modified {
                    path,
                    old: old.clone(),
                    new: new.clone(),
                });
            }
        }
    }
}

/// Character-level similarity of the compact serializations.
fn similarity(old: &Value, new: &Value) -> f64 {
    if old == new {
        return 1.0;
    }
    let old_str = old.to_string();
    let new_str = new.to_string();
    TextDiff::from_chars(&old_str, &new_str).ratio() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn equal_values_have_no_changes() {
        let diff = StructuralDiff::compute(&json!({"a": [1, 2]}), &json!({"a": [1, 2]}));
        assert!(diff.is_equivalent());
        assert_eq!(diff.similarity, 1.0);
    }

    #[test]
    fn nested_paths_are_dotted_and_indexed() {
        let old = json!({"settings": {"columns": [{"label": "A"}, {"label": "B"}]}, "gone": 1});
        let new = json!({"settings": {"columns": [{"label": "A"}, {"label": "C"}]}, "new": true});
        let diff = StructuralDiff::compute(&old, &new);

        assert_eq!(
            diff.changes,
            vec![
                FieldChange::Removed {
                    path: "gone".into(),
                    value: json!(1)
                },
                FieldChange::Modified {
                    path: "settings.columns[1].label".into(),
                    old: json!("B"),
                    new: json!("C")
                },
                FieldChange::Added {
                    path: "new".into(),
                    value: json!(true)
                },
            ]
        );
        assert!(diff.similarity > 0.0 && diff.similarity < 1.0);
    }

    #[test]
    fn array_growth_is_reported_per_index() {
        let diff = StructuralDiff::compute(&json!([1]), &json!([1, 2]));
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].path(), "[1]");
    }

    #[test]
    fn changes_serialize_with_tag() {
        let change = FieldChange::Modified {
            path: "score_threshold".into(),
            old: json!(0.8),
            new: json!(0.9),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["change"], "modified");
        assert_eq!(json["path"], "score_threshold");
    }
}
