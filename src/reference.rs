//! Removal of the R4-only `Reference.type` element.
//!
//! Two passes are offered. [`strip_reference_types`] knows where References sit
//! in a resource and strips `type` there unconditionally. [`normalize_references`]
//! walks an arbitrary tree and treats any object carrying both `reference` and
//! `type` as a Reference. The latter is a shape heuristic, not a type guarantee:
//! it catches References in positions no transformer declared, such as inside
//! extensions and contained resources.

use serde_json::{Map, Value};

/// Strip `type` from every object reached by the dot-separated `paths`.
/// Arrays met along a path are fanned out, so `performer.actor` covers
/// every performer.
pub fn strip_reference_types(resource: &mut Map<String, Value>, paths: &[&str]) {
    for path in paths {
        let mut segments = path.split('.');
        if let Some(first) = segments.next() {
            if let Some(value) = resource.get_mut(first) {
                strip_at(value, &segments.collect::<Vec<_>>());
            }
        }
    }
}

fn strip_at(value: &mut Value, rest: &[&str]) {
    match value {
        Value::Array(items) => {
            for item in items {
                strip_at(item, rest);
            }
        }
        Value::Object(map) => match rest.split_first() {
            None => {
                if map.shift_remove("type").is_some() {
                    tracing::trace!(reference = ?map.get("reference"), "stripped Reference.type");
                }
            }
            Some((head, tail)) => {
                if let Some(child) = map.get_mut(*head) {
                    strip_at(child, tail);
                }
            }
        },
        _ => {}
    }
}

/// Recursively drop `type` from any object that also has a `reference` key.
/// Idempotent; all other keys are left as they are.
pub fn normalize_references(value: &mut Value) {
    match value {
        Value::Object(map) => normalize_object(map),
        Value::Array(items) => {
            for item in items {
                normalize_references(item);
            }
        }
        _ => {}
    }
}

pub fn normalize_object(map: &mut Map<String, Value>) {
    if map.contains_key("reference") && map.contains_key("type") {
        map.shift_remove("type");
    }
    // References nest, e.g. identifier.assigner
    for child in map.values_mut() {
        normalize_references(child);
    }
}
