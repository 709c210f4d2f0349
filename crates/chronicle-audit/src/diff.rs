//! Structural change detection.
//!
//! Pure functions that turn a before/after pair of entity snapshots into an
//! ordered list of field-level [`ChangeRecord`]s, plus the CREATE/DELETE
//! variants that flatten a single snapshot. No I/O, no state, and no
//! failure path: malformed or pathologically nested input is bounded by
//! `max_depth` rather than rejected.

use serde_json::Value;

use crate::record::ChangeRecord;
use chronicle_core::SYSTEM_EXCLUDE_FIELDS;

/// Default recursion bound.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Options controlling a detection pass.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Additional leaf field names to skip, at any nesting depth. Merged
    /// with the system bookkeeping fields, which are always excluded.
    pub exclude_fields: Vec<String>,

    /// Recursion bound. Differences nested deeper than this are silently
    /// dropped; the diff stays deterministic but coarse.
    pub max_depth: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            exclude_fields: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DiffOptions {
    /// Options with an extra exclusion set on top of the system defaults.
    pub fn with_excluded(exclude_fields: Vec<String>) -> Self {
        Self {
            exclude_fields,
            ..Default::default()
        }
    }

    fn is_excluded(&self, field: &str) -> bool {
        SYSTEM_EXCLUDE_FIELDS.contains(&field) || self.exclude_fields.iter().any(|f| f == field)
    }
}

/// Compute the field-level differences between two entity snapshots.
///
/// Traversal order is deterministic: map keys in their stored order, array
/// indices ascending. A type change at a path yields a single record, not a
/// delete/add pair.
pub fn detect_changes(before: &Value, after: &Value, options: &DiffOptions) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    walk(Some(before), Some(after), "", 0, options, &mut changes);
    changes
}

/// Flatten a newly created entity's top-level fields into change records.
///
/// The old side is an explicit JSON null, not the absent sentinel. The
/// entity's own id field is deliberately not excluded, so it shows up as a
/// change entry.
pub fn detect_create_changes(entity: &Value, options: &DiffOptions) -> Vec<ChangeRecord> {
    flatten(entity, options, |value| {
        (Some(Value::Null), Some(value.clone()))
    })
}

/// Flatten a deleted entity's top-level fields into change records, with the
/// new side an explicit JSON null.
pub fn detect_delete_changes(entity: &Value, options: &DiffOptions) -> Vec<ChangeRecord> {
    flatten(entity, options, |value| {
        (Some(value.clone()), Some(Value::Null))
    })
}

fn flatten(
    entity: &Value,
    options: &DiffOptions,
    sides: impl Fn(&Value) -> (Option<Value>, Option<Value>),
) -> Vec<ChangeRecord> {
    let Some(fields) = entity.as_object() else {
        return Vec::new();
    };
    fields
        .iter()
        .filter(|(key, _)| !options.is_excluded(key))
        .map(|(key, value)| {
            let (old_value, new_value) = sides(value);
            ChangeRecord::new(key.clone(), old_value, new_value)
        })
        .collect()
}

/// `None` or JSON null; the two are treated as equal to each other.
fn is_nullish(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn walk(
    before: Option<&Value>,
    after: Option<&Value>,
    path: &str,
    depth: usize,
    options: &DiffOptions,
    out: &mut Vec<ChangeRecord>,
) {
    // Below the bound the traversal is abandoned, not errored.
    if depth > options.max_depth {
        return;
    }

    if is_nullish(before) && is_nullish(after) {
        return;
    }

    match (before, after) {
        (Some(Value::Array(before_items)), Some(Value::Array(after_items))) => {
            let len = before_items.len().max(after_items.len());
            for i in 0..len {
                walk(
                    before_items.get(i),
                    after_items.get(i),
                    &format!("{path}[{i}]"),
                    depth + 1,
                    options,
                    out,
                );
            }
        }
        (Some(Value::Object(before_fields)), Some(Value::Object(after_fields))) => {
            for (key, before_value) in before_fields {
                if options.is_excluded(key) {
                    continue;
                }
                walk(
                    Some(before_value),
                    after_fields.get(key),
                    &child_path(path, key),
                    depth + 1,
                    options,
                    out,
                );
            }
            for (key, after_value) in after_fields {
                if before_fields.contains_key(key) || options.is_excluded(key) {
                    continue;
                }
                walk(
                    None,
                    Some(after_value),
                    &child_path(path, key),
                    depth + 1,
                    options,
                    out,
                );
            }
        }
        // Scalars, type mismatches, or one side missing: one record per path.
        (before, after) => {
            if before != after {
                out.push(ChangeRecord::new(path, before.cloned(), after.cloned()));
            }
        }
    }
}
