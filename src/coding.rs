//! Coding and CodeableConcept rewriting between R4 and STU3 terminologies.

use serde_json::{json, Map, Value};

pub const SNOMED: &str = "http://snomed.info/sct";
pub const CONSENT_CATEGORY_CODES: &str =
    "http://terminology.hl7.org/CodeSystem/consentcategorycodes";
pub const ROLE_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";

/// SNOMED code for the advance directive category once rewritten for STU3
pub const ADVANCE_DIRECTIVE_SNOMED_CODE: &str = "11341000146107";

/// Display handling for a rewritten coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRewrite {
    /// Replace the display with a fixed label
    Set(&'static str),
    /// Drop the display so the terminology server supplies it
    Remove,
}

/// A single `(system, code)` substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingRewrite {
    pub source_system: &'static str,
    pub source_code: &'static str,
    pub target_system: &'static str,
    pub target_code: &'static str,
    pub display: DisplayRewrite,
}

/// Consent.category rewrites, checked in order.
pub const CATEGORY_REWRITES: &[CodingRewrite] = &[
    CodingRewrite {
        source_system: SNOMED,
        source_code: "129125009",
        target_system: SNOMED,
        target_code: "11291000146105",
        display: DisplayRewrite::Set("Treatment instructions (record artifact)"),
    },
    CodingRewrite {
        source_system: CONSENT_CATEGORY_CODES,
        source_code: "acd",
        target_system: SNOMED,
        target_code: ADVANCE_DIRECTIVE_SNOMED_CODE,
        display: DisplayRewrite::Remove,
    },
];

/// Codings that mark a Consent as an advance directive, before and after rewriting
const ADVANCE_DIRECTIVE_CODINGS: &[(&str, &str)] = &[
    (CONSENT_CATEGORY_CODES, "acd"),
    (SNOMED, ADVANCE_DIRECTIVE_SNOMED_CODE),
];

impl CodingRewrite {
    pub fn matches(&self, coding: &Map<String, Value>) -> bool {
        coding_is(coding, self.source_system, self.source_code)
    }

    fn apply(&self, coding: &mut Map<String, Value>) {
        coding.insert("system".to_string(), json!(self.target_system));
        coding.insert("code".to_string(), json!(self.target_code));
        match self.display {
            DisplayRewrite::Set(display) => {
                coding.insert("display".to_string(), json!(display));
            }
            DisplayRewrite::Remove => {
                coding.shift_remove("display");
            }
        }
    }
}

/// Rewrite one coding with the first matching rule; returns whether a rule fired
pub fn rewrite_coding(coding: &mut Map<String, Value>, rules: &[CodingRewrite]) -> bool {
    match rules.iter().find(|rule| rule.matches(coding)) {
        Some(rule) => {
            rule.apply(coding);
            true
        }
        None => false,
    }
}

/// Rewrite every coding of a CodeableConcept, returning a new concept
pub fn rewrite_codeable_concept(concept: &Value, rules: &[CodingRewrite]) -> Value {
    let mut concept = concept.clone();
    if let Some(codings) = concept.get_mut("coding").and_then(Value::as_array_mut) {
        for coding in codings.iter_mut().filter_map(Value::as_object_mut) {
            if rewrite_coding(coding, rules) {
                tracing::debug!(
                    system = ?coding.get("system"),
                    code = ?coding.get("code"),
                    "rewrote coding"
                );
            }
        }
    }
    concept
}

/// Rewrite a field holding a list of CodeableConcepts (or a single one)
pub fn rewrite_concepts(field: &Value, rules: &[CodingRewrite]) -> Value {
    match field {
        Value::Array(concepts) => Value::Array(
            concepts
                .iter()
                .map(|concept| rewrite_codeable_concept(concept, rules))
                .collect(),
        ),
        other => rewrite_codeable_concept(other, rules),
    }
}

/// Whether the resource's `category` marks it as an advance directive.
/// Both the R4 `consentcategorycodes#acd` and the rewritten SNOMED code count.
pub fn is_advance_directive(resource: &Map<String, Value>) -> bool {
    resource
        .get("category")
        .map(|category| {
            as_list(category).iter().any(|concept| {
                ADVANCE_DIRECTIVE_CODINGS
                    .iter()
                    .any(|(system, code)| concept_has_coding(concept, system, code))
            })
        })
        .unwrap_or(false)
}

/// Whether a CodeableConcept carries a coding with the given system and code
pub fn concept_has_coding(concept: &Value, system: &str, code: &str) -> bool {
    concept
        .get("coding")
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .filter_map(Value::as_object)
                .any(|coding| coding_is(coding, system, code))
        })
        .unwrap_or(false)
}

fn coding_is(coding: &Map<String, Value>, system: &str, code: &str) -> bool {
    coding.get("system").and_then(Value::as_str) == Some(system)
        && coding.get("code").and_then(Value::as_str) == Some(code)
}

/// Build a single-coding CodeableConcept
pub fn codeable_concept(system: &str, code: &str, display: &str) -> Value {
    json!({
        "coding": [{
            "system": system,
            "code": code,
            "display": display
        }]
    })
}

/// View a value that may be a single element or a list as a slice
pub fn as_list(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}
