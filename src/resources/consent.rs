//! Consent (zib TreatmentDirective / AdvanceDirective).

use serde_json::{json, Map, Value};

use super::ResourceOutput;
use crate::{
    coding::{rewrite_concepts, CATEGORY_REWRITES},
    extension::rewrite_extensions,
    provision::{self, SPECIFICATION_OTHER_URL},
    resource_registry::{ResourceKind, TransformerEntry},
    transformation_engine::TransformationError,
    transformation_rule::{copy_rules, AppliedTransformation, TransformationRule},
};

const DIRECT_FIELDS: &[&str] = &[
    "id",
    "meta",
    "text",
    "contained",
    "identifier",
    "status",
    "patient",
    "dateTime",
    "organization",
    "source",
    "policy",
    "sourceAttachment",
    "sourceReference",
];

/// R4 elements with no STU3 counterpart
const R4_ONLY_FIELDS: &[&str] = &["scope", "policyRule", "verification"];

pub(crate) const EXTENSION_URLS: &[(&str, &str)] = &[
    (
        "http://nictiz.nl/fhir/StructureDefinition/ext-Comment",
        "http://nictiz.nl/fhir/StructureDefinition/Comment",
    ),
    (
        "http://nictiz.nl/fhir/StructureDefinition/ext-TreatmentDirective2.AdvanceDirective",
        "http://nictiz.nl/fhir/StructureDefinition/consent-additionalSources",
    ),
    (
        "http://nictiz.nl/fhir/StructureDefinition/ext-AdvanceDirective.Disorder",
        "http://nictiz.nl/fhir/StructureDefinition/zib-AdvanceDirective-Disorder",
    ),
];

pub(crate) const REFERENCE_PATHS: &[&str] = &[
    "patient",
    "organization",
    "consentingParty",
    "source",
    "sourceReference",
];

pub(crate) fn rules() -> Vec<TransformationRule> {
    copy_rules(DIRECT_FIELDS)
}

pub(crate) fn transform(
    entry: &TransformerEntry,
    source: &Map<String, Value>,
) -> Result<ResourceOutput, TransformationError> {
    let mut output = ResourceOutput::new(ResourceKind::Consent);
    output.apply_rules(&entry.rules, source);

    if let Some(category) = source.get("category") {
        output.set(
            "category",
            rewrite_concepts(category, CATEGORY_REWRITES),
            AppliedTransformation::transform("category_codes", "category", "category"),
        );
    }

    if let Some(extensions) = rewrite_extensions(source.get("extension"), &entry.extension_urls) {
        output.set(
            "extension",
            Value::Array(extensions),
            AppliedTransformation::transform("extension_urls", "extension", "extension"),
        );
    }

    let restructured = provision::restructure(source)?;
    let parts = [
        ("extension", restructured.extension),
        ("modifierExtension", restructured.modifier_extension),
        ("except", restructured.except),
        ("consentingParty", restructured.consenting_party),
        ("category", restructured.category),
    ];
    for (field, values) in parts {
        if !values.is_empty() {
            output.extend_list(field, values);
            output
                .applied
                .push(AppliedTransformation::transform("provision", "provision", field));
        }
    }
    if let Some(end) = restructured.period_end {
        output.set(
            "period",
            json!({"end": end}),
            AppliedTransformation::transform("provision_period", "provision.period.end", "period.end"),
        );
    }

    report_dropped(&mut output, source);
    Ok(output)
}

fn report_dropped(output: &mut ResourceOutput, source: &Map<String, Value>) {
    for field in R4_ONLY_FIELDS {
        if source.contains_key(*field) {
            output.dropped(format!("Consent.{field} has no STU3 counterpart"), field);
        }
    }

    let modifiers = source
        .get("modifierExtension")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    for url in modifiers
        .iter()
        .filter_map(|modifier| modifier.get("url").and_then(Value::as_str))
        .filter(|url| *url != SPECIFICATION_OTHER_URL)
    {
        output.dropped(
            format!("modifierExtension {url} has no STU3 counterpart"),
            "modifierExtension",
        );
    }
}
