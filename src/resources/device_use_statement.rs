//! DeviceUseStatement, following the published DeviceUseStatement4to3 StructureMap.

use serde_json::{Map, Value};

use super::{convert_profile_url, rewrite_meta, ResourceOutput, BASE_FIELDS};
use crate::{
    extension::{extension_value, find_extension, rewrite_extensions},
    resource_registry::{ResourceKind, TransformerEntry},
    transformation_rule::{copy_rules, AppliedTransformation, TransformationRule},
};

/// R4 carries the STU3-only `whenUsed` element in this extension
pub const WHEN_USED_URL: &str =
    "http://hl7.org/fhir/3.0/StructureDefinition/extension-DeviceUseStatement.whenUsed";

const DIRECT_FIELDS: &[&str] = &[
    "identifier",
    "status",
    "subject",
    "recordedOn",
    "source",
    "device",
    "bodySite",
    "note",
    "timing",
    "timingTiming",
    "timingPeriod",
    "timingDateTime",
];

pub(crate) const REFERENCE_PATHS: &[&str] = &["subject", "source", "device"];

pub(crate) fn rules() -> Vec<TransformationRule> {
    let mut rules = copy_rules(BASE_FIELDS);
    rules.extend(copy_rules(DIRECT_FIELDS));
    rules.push(TransformationRule::rename("reasonCode", "indication"));
    rules
}

pub(crate) fn transform(entry: &TransformerEntry, source: &Map<String, Value>) -> ResourceOutput {
    let mut output = ResourceOutput::new(ResourceKind::DeviceUseStatement);
    output.apply_rules(&entry.rules, source);
    rewrite_meta(&mut output, source, convert_profile_url);

    let extensions = source.get("extension");
    let when_used_extension = find_extension(extensions, WHEN_USED_URL);
    let consumed = match when_used_extension.and_then(extension_value) {
        Some(when_used) => {
            output.set(
                "whenUsed",
                when_used.clone(),
                AppliedTransformation::transform("when_used", "extension", "whenUsed"),
            );
            true
        }
        None => {
            if when_used_extension.is_some() {
                output.dropped(
                    "whenUsed extension has no value[x]; kept as extension".to_string(),
                    "extension",
                );
            }
            false
        }
    };

    // a consumed whenUsed extension is not repeated, everything else is carried over
    if let Some(extensions) = rewrite_extensions(extensions, &entry.extension_urls) {
        let remaining: Vec<Value> = extensions
            .into_iter()
            .filter(|extension| {
                !consumed || extension.get("url").and_then(Value::as_str) != Some(WHEN_USED_URL)
            })
            .collect();
        output.set(
            "extension",
            Value::Array(remaining),
            AppliedTransformation::transform("extension_urls", "extension", "extension"),
        );
    }

    output
}
