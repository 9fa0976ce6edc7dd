//! Encounter.

use serde_json::{Map, Value};

use super::{convert_profile_segment, convert_profile_url, rewrite_meta, ResourceOutput, BASE_FIELDS};
use crate::{
    extension::rewrite_extensions,
    resource_registry::{ResourceKind, TransformerEntry},
    transformation_rule::{copy_rules, AppliedTransformation, TransformationRule},
};

const DIRECT_FIELDS: &[&str] = &[
    "identifier",
    "status",
    "class",
    "type",
    "priority",
    "subject",
    "episodeOfCare",
    "incomingReferral",
    "participant",
    "appointment",
    "period",
    "length",
    "serviceProvider",
    "partOf",
    "hospitalization",
];

/// STU3 status recorded for every former class period
const CLASS_HISTORY_STATUS: &str = "in-progress";

const LOCATION_FIELDS: &[&str] = &["location", "status", "period"];

const R4_ONLY_FIELDS: &[&str] = &["basedOn", "reasonReference", "serviceType"];

pub(crate) const REFERENCE_PATHS: &[&str] = &[
    "subject",
    "episodeOfCare",
    "incomingReferral",
    "participant.individual",
    "appointment",
    "serviceProvider",
    "partOf",
    "location.location",
    "diagnosis.condition",
    "hospitalization.origin",
    "hospitalization.destination",
];

pub(crate) fn rules() -> Vec<TransformationRule> {
    let mut rules = copy_rules(BASE_FIELDS);
    rules.extend(copy_rules(DIRECT_FIELDS));
    rules.push(TransformationRule::rename("reasonCode", "reason"));
    rules
}

/// Encounter profiles only change their release segment
fn convert_encounter_profile(url: &str) -> String {
    if url.contains("Encounter") {
        convert_profile_segment(url)
    } else {
        convert_profile_url(url)
    }
}

pub(crate) fn transform(entry: &TransformerEntry, source: &Map<String, Value>) -> ResourceOutput {
    let mut output = ResourceOutput::new(ResourceKind::Encounter);
    output.apply_rules(&entry.rules, source);
    rewrite_meta(&mut output, source, convert_encounter_profile);

    if let Some(history) = source.get("classHistory").and_then(Value::as_array) {
        output.set(
            "statusHistory",
            Value::Array(history.iter().map(class_to_status_history).collect()),
            AppliedTransformation::transform("class_history", "classHistory", "statusHistory"),
        );
    }

    if let Some(locations) = source.get("location").and_then(Value::as_array) {
        output.set(
            "location",
            Value::Array(locations.iter().map(reduce_location).collect()),
            AppliedTransformation::transform("location", "location", "location"),
        );
    }

    if let Some(diagnoses) = source.get("diagnosis").and_then(Value::as_array) {
        output.set(
            "diagnosis",
            Value::Array(diagnoses.iter().map(rename_diagnosis_use).collect()),
            AppliedTransformation::transform("diagnosis_role", "diagnosis.use", "diagnosis.role"),
        );
    }

    if let Some(extensions) = rewrite_extensions(source.get("extension"), &entry.extension_urls) {
        output.set(
            "extension",
            Value::Array(extensions),
            AppliedTransformation::transform("extension_urls", "extension", "extension"),
        );
    }

    for field in R4_ONLY_FIELDS {
        if source.contains_key(*field) {
            output.dropped(format!("Encounter.{field} has no STU3 counterpart"), field);
        }
    }

    output
}

/// A class period becomes an `in-progress` status period
fn class_to_status_history(entry: &Value) -> Value {
    let mut status = Map::new();
    if entry.get("class").is_some() {
        status.insert("status".to_string(), Value::String(CLASS_HISTORY_STATUS.to_string()));
    }
    if let Some(period) = entry.get("period") {
        status.insert("period".to_string(), period.clone());
    }
    Value::Object(status)
}

/// STU3 location entries carry no physicalType
fn reduce_location(location: &Value) -> Value {
    let Some(location) = location.as_object() else {
        return location.clone();
    };
    let reduced: Map<String, Value> = LOCATION_FIELDS
        .iter()
        .filter_map(|field| location.get(*field).map(|value| (field.to_string(), value.clone())))
        .collect();
    Value::Object(reduced)
}

fn rename_diagnosis_use(diagnosis: &Value) -> Value {
    let Some(diagnosis) = diagnosis.as_object() else {
        return diagnosis.clone();
    };
    let renamed: Map<String, Value> = diagnosis
        .iter()
        .map(|(key, value)| {
            let key = if key == "use" { "role" } else { key.as_str() };
            (key.to_string(), value.clone())
        })
        .collect();
    Value::Object(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_registry::ResourceRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(source: Value) -> ResourceOutput {
        let registry = ResourceRegistry::new();
        let entry = registry.transformer(ResourceKind::Encounter).unwrap();
        super::super::transform(entry, source.as_object().unwrap()).unwrap()
    }

    #[test]
    fn test_encounter_transformation() {
        let output = run(json!({
            "resourceType": "Encounter",
            "id": "enc-1",
            "meta": {
                "versionId": "1",
                "profile": ["http://example.org/R4/Encounter-4.0"]
            },
            "status": "finished",
            "class": {"system": "http://terminology.hl7.org/CodeSystem/v3-ActCode", "code": "AMB"},
            "subject": {"reference": "Patient/p1", "type": "Patient"},
            "participant": [{"individual": {"reference": "Practitioner/d1", "type": "Practitioner"}}],
            "reasonCode": [{"text": "Chest pain"}],
            "reasonReference": [{"reference": "Condition/c1"}],
            "diagnosis": [{"condition": {"reference": "Condition/c1"}, "use": {"text": "AD"}, "rank": 1}],
            "location": [{
                "location": {"reference": "Location/l1", "type": "Location"},
                "status": "completed",
                "physicalType": {"text": "Room"}
            }]
        }));

        assert_eq!(
            Value::Object(output.resource),
            json!({
                "resourceType": "Encounter",
                "id": "enc-1",
                "meta": {
                    "versionId": "1",
                    "profile": ["http://example.org/STU3/Encounter-4.0"]
                },
                "status": "finished",
                "class": {"system": "http://terminology.hl7.org/CodeSystem/v3-ActCode", "code": "AMB"},
                "subject": {"reference": "Patient/p1"},
                "participant": [{"individual": {"reference": "Practitioner/d1"}}],
                "reason": [{"text": "Chest pain"}],
                "location": [{"location": {"reference": "Location/l1"}, "status": "completed"}],
                "diagnosis": [{"condition": {"reference": "Condition/c1"}, "role": {"text": "AD"}, "rank": 1}]
            })
        );
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].field_path.as_deref(), Some("reasonReference"));
    }

    #[test]
    fn test_class_history_becomes_status_history() {
        let output = run(json!({
            "resourceType": "Encounter",
            "classHistory": [
                {"class": {"code": "IMP"}, "period": {"start": "2024-01-01"}},
                {"period": {"start": "2024-02-01"}}
            ]
        }));

        assert!(!output.resource.contains_key("classHistory"));
        assert_eq!(
            output.resource["statusHistory"],
            json!([
                {"status": "in-progress", "period": {"start": "2024-01-01"}},
                {"period": {"start": "2024-02-01"}}
            ])
        );
    }

    #[test]
    fn test_non_encounter_profile_uses_default_conversion() {
        assert_eq!(
            convert_encounter_profile("http://example.org/R4/zib-4.0"),
            "http://example.org/STU3/zib-3.0"
        );
    }

    #[test]
    fn test_allow_list_copy_is_exact() {
        let source = json!({
            "resourceType": "Encounter",
            "hospitalization": {"admitSource": {"text": "GP"}},
            "length": {"value": 3, "unit": "d"},
            "priority": {"text": "urgent"}
        });
        let output = run(source.clone());

        for field in ["hospitalization", "length", "priority"] {
            assert_eq!(output.resource[field], source[field]);
        }
    }
}
