//! Per-resource-type transformers.
//!
//! Every transformer has the same shape: start from an empty STU3 resource,
//! run the type's rule table (copies, renames, code maps), apply its
//! hand-written restructuring steps, then [`ResourceOutput::finish`] drops empty
//! collections and strips R4-only `Reference.type`.

pub mod consent;
pub mod device_use_statement;
pub mod encounter;
pub mod procedure;

use serde_json::{Map, Value};

use crate::{
    reference,
    resource_registry::{ResourceKind, TransformerEntry},
    schema_version::FhirVersion,
    transformation_engine::{TransformationError, TransformationWarning, TransformationWarningType},
    transformation_rule::{AppliedTransformation, RuleOutcome, TransformationRule},
};

/// Resource-level elements shared by every non-Consent transformer
pub(crate) const BASE_FIELDS: &[&str] = &["id", "meta", "implicitRules", "language", "text", "contained"];

/// Collections the STU3 profiles forbid to be empty
pub const CLEANUP_FIELDS: &[&str] = &[
    "extension",
    "modifierExtension",
    "except",
    "category",
    "consentingParty",
];

const META_FIELDS: &[&str] = &["versionId", "lastUpdated", "source"];
const META_LIST_FIELDS: &[&str] = &["tag", "security"];

/// STU3 resource under construction plus its transformation log
#[derive(Debug, Clone)]
pub(crate) struct ResourceOutput {
    pub resource: Map<String, Value>,
    pub applied: Vec<AppliedTransformation>,
    pub warnings: Vec<TransformationWarning>,
}

impl ResourceOutput {
    pub fn new(kind: ResourceKind) -> Self {
        let mut resource = Map::new();
        resource.insert(
            "resourceType".to_string(),
            Value::String(kind.resource_type().to_string()),
        );
        Self {
            resource,
            applied: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Apply rules in order. Present fields that fail a condition are reported.
    pub fn apply_rules(&mut self, rules: &[TransformationRule], source: &Map<String, Value>) {
        for rule in rules {
            match rule.apply(source, &mut self.resource) {
                RuleOutcome::Applied(applied) => {
                    tracing::debug!(rule = %applied.rule_id, "applied rule");
                    self.applied.push(applied);
                }
                RuleOutcome::SourceAbsent => {}
                RuleOutcome::ConditionUnmet => {
                    self.warnings.push(
                        TransformationWarning::new(
                            format!("Rule {} was skipped", rule.rule_id),
                            TransformationWarningType::ConditionalSkipped,
                        )
                        .with_field_path(rule.source_path.clone()),
                    );
                }
            }
        }
    }

    /// Set a field produced by a restructuring step and log it
    pub fn set(&mut self, field: &str, value: Value, applied: AppliedTransformation) {
        tracing::debug!(field, rule = %applied.rule_id, "transformed field");
        self.resource.insert(field.to_string(), value);
        self.applied.push(applied);
    }

    /// Append to a list field, creating it if needed
    pub fn extend_list(&mut self, field: &str, values: Vec<Value>) {
        if values.is_empty() {
            return;
        }
        let entry = self
            .resource
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.extend(values),
            other => {
                let mut items = vec![other.take()];
                items.extend(values);
                *other = Value::Array(items);
            }
        }
    }

    pub fn dropped(&mut self, message: String, field_path: &str) {
        tracing::debug!(field_path, "{message}");
        self.warnings.push(
            TransformationWarning::new(message, TransformationWarningType::ValueNotTransformed)
                .with_field_path(field_path.to_string()),
        );
    }

    /// Remove empty collections and R4-only Reference decorations
    pub fn finish(mut self, kind: ResourceKind) -> Self {
        remove_empty_collections(&mut self.resource, CLEANUP_FIELDS);
        reference::strip_reference_types(&mut self.resource, kind.reference_paths());
        reference::normalize_object(&mut self.resource);
        self
    }
}

/// Dispatch to the transformer for `entry.kind`
pub(crate) fn transform(
    entry: &TransformerEntry,
    source: &Map<String, Value>,
) -> Result<ResourceOutput, TransformationError> {
    let output = match entry.kind {
        ResourceKind::Consent => consent::transform(entry, source)?,
        ResourceKind::Encounter => encounter::transform(entry, source),
        ResourceKind::Procedure => procedure::transform(entry, source),
        ResourceKind::DeviceUseStatement => device_use_statement::transform(entry, source),
    };
    Ok(output.finish(entry.kind))
}

/// Remove each listed field that is an empty list or empty object
pub fn remove_empty_collections(resource: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        let empty = match resource.get(*field) {
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            _ => false,
        };
        if empty {
            resource.shift_remove(*field);
        }
    }
}

/// Rebuild `meta` for STU3, converting profile canonicals with `convert_profile`
pub(crate) fn transform_meta(meta: &Value, convert_profile: fn(&str) -> String) -> Value {
    let Some(meta) = meta.as_object() else {
        return meta.clone();
    };

    let mut stu3 = Map::new();
    for field in META_FIELDS {
        if let Some(value) = meta.get(*field) {
            stu3.insert(field.to_string(), value.clone());
        }
    }
    if let Some(profiles) = meta.get("profile").and_then(Value::as_array) {
        let profiles = profiles
            .iter()
            .map(|profile| match profile.as_str() {
                Some(url) => Value::String(convert_profile(url)),
                None => profile.clone(),
            })
            .collect();
        stu3.insert("profile".to_string(), Value::Array(profiles));
    }
    for field in META_LIST_FIELDS {
        if let Some(value) = meta.get(*field) {
            stu3.insert(field.to_string(), value.clone());
        }
    }
    Value::Object(stu3)
}

/// Default R4 to STU3 profile canonical conversion
pub(crate) fn convert_profile_url(url: &str) -> String {
    convert_profile_segment(url).replace("4.0", "3.0")
}

/// Swap the `/R4/` release segment of a profile canonical for `/STU3/`
pub(crate) fn convert_profile_segment(url: &str) -> String {
    url.replace(
        FhirVersion::R4.profile_segment(),
        FhirVersion::Stu3.profile_segment(),
    )
}

/// Replace an already copied `meta` in place so it keeps its position
pub(crate) fn rewrite_meta(output: &mut ResourceOutput, source: &Map<String, Value>, convert_profile: fn(&str) -> String) {
    if let Some(meta) = source.get("meta") {
        output.set(
            "meta",
            transform_meta(meta, convert_profile),
            AppliedTransformation::transform("meta", "meta", "meta"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_remove_empty_collections() {
        let mut resource = json!({
            "extension": [],
            "modifierExtension": {},
            "except": [{"type": "permit"}],
            "category": [],
            "identifier": []
        });

        remove_empty_collections(resource.as_object_mut().unwrap(), CLEANUP_FIELDS);

        assert_eq!(
            resource,
            json!({"except": [{"type": "permit"}], "identifier": []})
        );
    }

    #[test]
    fn test_transform_meta() {
        let meta = json!({
            "versionId": "2",
            "profile": ["http://example.org/fhir/R4/StructureDefinition/x-4.0"],
            "tag": [{"code": "t"}],
            "extension": [{"url": "dropped"}]
        });

        assert_eq!(
            transform_meta(&meta, convert_profile_url),
            json!({
                "versionId": "2",
                "profile": ["http://example.org/fhir/STU3/StructureDefinition/x-3.0"],
                "tag": [{"code": "t"}]
            })
        );
    }

    #[test]
    fn test_extend_list_creates_and_appends() {
        let mut output = ResourceOutput::new(ResourceKind::Consent);

        output.extend_list("category", vec![]);
        assert!(!output.resource.contains_key("category"));

        output.extend_list("category", vec![json!(1)]);
        output.extend_list("category", vec![json!(2)]);
        assert_eq!(output.resource["category"], json!([1, 2]));
    }

    #[test]
    fn test_finish_cleans_and_strips() {
        let mut output = ResourceOutput::new(ResourceKind::Consent);
        output.resource.insert("extension".to_string(), json!([]));
        output
            .resource
            .insert("patient".to_string(), json!({"identifier": {"value": "1"}, "type": "Patient"}));

        let output = output.finish(ResourceKind::Consent);

        assert_eq!(
            Value::Object(output.resource),
            json!({"resourceType": "Consent", "patient": {"identifier": {"value": "1"}}})
        );
    }
}
