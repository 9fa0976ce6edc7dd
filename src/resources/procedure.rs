//! Procedure, following the published Procedure4to3 StructureMap.

use serde_json::{Map, Value};

use super::{convert_profile_url, rewrite_meta, ResourceOutput, BASE_FIELDS};
use crate::{
    extension::rewrite_extensions,
    resource_registry::{ResourceKind, TransformerEntry},
    transformation_rule::{
        copy_rules, AppliedTransformation, Condition, TransformationRule, ValueMap,
    },
};

const NOT_DONE: &str = "not-done";

/// EventStatus concept map R4 -> STU3. `not-done` passes through the table and
/// is overridden afterwards.
pub static EVENT_STATUS: ValueMap = ValueMap {
    name: "EventStatus",
    entries: &[
        ("entered-in-error", "entered-in-error"),
        ("in-progress", "in-progress"),
        ("on-hold", "suspended"),
        ("aborted", "stopped"),
        ("completed", "completed"),
        ("preparation", "preparation"),
        ("stopped", "aborted"),
        ("suspended", "suspended"),
        ("unknown", "unknown"),
    ],
};

const DIRECT_FIELDS: &[&str] = &[
    "identifier",
    "instantiatesCanonical",
    "instantiatesUri",
    "basedOn",
    "partOf",
    "category",
    "code",
    "subject",
    "performedDateTime",
    "performedPeriod",
    "recorder",
    "asserter",
    "location",
    "reasonCode",
    "reasonReference",
    "bodySite",
    "outcome",
    "report",
    "complication",
    "complicationDetail",
    "followUp",
    "note",
    "focalDevice",
    "usedReference",
    "usedCode",
];

const PERFORMER_FIELDS: &[&str] = &["actor", "onBehalfOf"];

pub(crate) const REFERENCE_PATHS: &[&str] = &[
    "basedOn",
    "partOf",
    "subject",
    "context",
    "recorder",
    "asserter",
    "performer.actor",
    "performer.onBehalfOf",
    "location",
    "reasonReference",
    "report",
    "complicationDetail",
    "focalDevice.manipulated",
    "usedReference",
];

pub(crate) fn rules() -> Vec<TransformationRule> {
    let mut rules = copy_rules(BASE_FIELDS);
    rules.push(TransformationRule::value_map("status", &EVENT_STATUS));
    rules.push(
        TransformationRule::rename("statusReason", "notDoneReason")
            .with_condition(Condition::value_equals("status", NOT_DONE)),
    );
    rules.push(TransformationRule::rename("encounter", "context"));
    rules.extend(copy_rules(DIRECT_FIELDS));
    rules
}

pub(crate) fn transform(entry: &TransformerEntry, source: &Map<String, Value>) -> ResourceOutput {
    let mut output = ResourceOutput::new(ResourceKind::Procedure);
    output.apply_rules(&entry.rules, source);
    rewrite_meta(&mut output, source, convert_profile_url);

    if source.get("status").and_then(Value::as_str) == Some(NOT_DONE) {
        output.set(
            "status",
            Value::String("suspended".to_string()),
            AppliedTransformation::transform("not_done", "status", "status"),
        );
        output.set(
            "notDone",
            Value::Bool(true),
            AppliedTransformation::transform("not_done", "status", "notDone"),
        );
    }

    if let Some(performers) = source.get("performer").and_then(Value::as_array) {
        let performers: Vec<Value> = performers.iter().map(convert_performer).collect();
        if !performers.is_empty() {
            output.set(
                "performer",
                Value::Array(performers),
                AppliedTransformation::transform("performer_role", "performer.function", "performer.role"),
            );
        }
    }

    if let Some(extensions) = rewrite_extensions(source.get("extension"), &entry.extension_urls) {
        output.set(
            "extension",
            Value::Array(extensions),
            AppliedTransformation::transform("extension_urls", "extension", "extension"),
        );
    }

    output
}

/// `performer.function` became `performer.role` in STU3
fn convert_performer(performer: &Value) -> Value {
    let Some(performer) = performer.as_object() else {
        return performer.clone();
    };

    let mut stu3 = Map::new();
    if let Some(function) = performer.get("function") {
        stu3.insert("role".to_string(), function.clone());
    }
    for field in PERFORMER_FIELDS {
        if let Some(value) = performer.get(*field) {
            stu3.insert(field.to_string(), value.clone());
        }
    }
    Value::Object(stu3)
}
