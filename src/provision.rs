//! Restructuring of R4 `Consent.provision` into the flat STU3 Consent shape.
//!
//! R4 nests the treatment decision, the people involved, the treatment codes and
//! the expiry date under a single `provision`. STU3 (with the Dutch zib
//! profiles) spreads the same information over `modifierExtension`, `extension`,
//! `except`, `consentingParty`, `category` and `period`. [`restructure`] computes
//! all of those pieces from the source resource without touching it.

use serde_json::{json, Map, Value};

use crate::coding::{self, codeable_concept, concept_has_coding, ROLE_CODE, SNOMED};
use crate::extension::{complex_extension, extension, find_extension};
use crate::transformation_engine::TransformationError;

pub const SPECIFICATION_OTHER_URL: &str =
    "http://nictiz.nl/fhir/StructureDefinition/ext-TreatmentDirective2.SpecificationOther";
pub const TREATMENT_PERMITTED_URL: &str =
    "http://nictiz.nl/fhir/StructureDefinition/zib-TreatmentDirective-TreatmentPermitted";
pub const VERIFICATION_URL: &str =
    "http://nictiz.nl/fhir/StructureDefinition/zib-TreatmentDirective-Verification";
pub const TREATMENT_URL: &str =
    "http://nictiz.nl/fhir/StructureDefinition/zib-TreatmentDirective-Treatment";
pub const RESTRICTIONS_URL: &str =
    "http://nictiz.nl/fhir/StructureDefinition/zib-TreatmentDirective-Restrictions";

/// TreatmentPermitted code system (zib TreatmentDirective)
pub const TREATMENT_PERMITTED_SYSTEM: &str = "urn:oid:2.16.840.1.113883.2.4.3.11.60.40.4";

const PERMITTED_WITH_RESTRICTIONS: (&str, &str) = ("JA_MAAR", "Ja, maar met beperkingen");

/// `provision.type` to TreatmentPermitted, checked in order
const PROVISION_TYPE_CODES: &[(&str, (&str, &str))] =
    &[("permit", ("JA", "Ja")), ("deny", ("NEE", "Nee"))];

const REPRESENTATIVE_ROLE: &str = "RESPRSN";
const PATIENT_CONCEPT_CODE: &str = "116154003";

/// Everything the provision contributes to the STU3 Consent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Restructured {
    pub extension: Vec<Value>,
    pub modifier_extension: Vec<Value>,
    pub except: Vec<Value>,
    pub consenting_party: Vec<Value>,
    pub category: Vec<Value>,
    pub period_end: Option<Value>,
}

/// Derive the STU3 structures carried by `provision` and the top-level
/// `modifierExtension` of an R4 Consent.
pub fn restructure(source: &Map<String, Value>) -> Result<Restructured, TransformationError> {
    let mut out = Restructured::default();
    let Some(provision) = source.get("provision") else {
        return Ok(out);
    };
    let provision = provision
        .as_object()
        .ok_or_else(|| TransformationError::malformed("provision", "expected an object"))?;

    if let Some((modifier, except)) = treatment_permission(source, provision) {
        out.modifier_extension.push(modifier);
        out.except.push(except);
    }

    let (verification, parties) = verification_and_parties(source, provision);
    out.extension.extend(verification);
    out.consenting_party = parties;

    if let Some(code) = provision.get("code") {
        let codes = treatment_codes(code)?;
        out.extension
            .push(extension(TREATMENT_URL, "CodeableConcept", Value::Array(codes.clone())));
        if coding::is_advance_directive(source) {
            out.category = codes;
        }
    }

    out.period_end = provision
        .get("period")
        .and_then(|period| period.get("end"))
        .cloned();

    Ok(out)
}

/// TreatmentPermitted modifier extension plus its matching except entry.
///
/// A SpecificationOther modifier extension wins over `provision.type`; only
/// the first one is used.
fn treatment_permission(
    source: &Map<String, Value>,
    provision: &Map<String, Value>,
) -> Option<(Value, Value)> {
    if let Some(other) = find_extension(source.get("modifierExtension"), SPECIFICATION_OTHER_URL) {
        let restrictions = other
            .get("valueString")
            .cloned()
            .unwrap_or_else(|| json!(""));
        let (code, display) = PERMITTED_WITH_RESTRICTIONS;
        return Some((
            treatment_permitted(json!(code), json!(display)),
            json!({"extension": [extension(RESTRICTIONS_URL, "String", restrictions)]}),
        ));
    }

    let provision_type = provision.get("type")?;
    let (code, display) = match provision_type
        .as_str()
        .and_then(|kind| PROVISION_TYPE_CODES.iter().find(|(source, _)| *source == kind))
    {
        Some((_, (code, display))) => (json!(code), json!(display)),
        None => {
            tracing::warn!(provision_type = %provision_type, "unmapped provision.type, passing through");
            (provision_type.clone(), provision_type.clone())
        }
    };

    Some((
        treatment_permitted(code, display),
        json!({"type": provision_type}),
    ))
}

fn treatment_permitted(code: Value, display: Value) -> Value {
    extension(
        TREATMENT_PERMITTED_URL,
        "CodeableConcept",
        json!({
            "coding": [{
                "system": TREATMENT_PERMITTED_SYSTEM,
                "code": code,
                "display": display
            }]
        }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActorRole {
    /// The patient took part, so the directive was verified with them
    Subject,
    /// A legal representative consented on the patient's behalf
    Representative,
    Other,
}

fn classify_actor(actor: &Value) -> ActorRole {
    let reference_type = actor
        .get("reference")
        .and_then(|reference| reference.get("type"))
        .and_then(Value::as_str);
    if reference_type == Some("Patient") {
        return ActorRole::Subject;
    }

    let representative = actor
        .get("role")
        .map(|role| concept_has_coding(role, ROLE_CODE, REPRESENTATIVE_ROLE))
        .unwrap_or(false);
    if representative {
        ActorRole::Representative
    } else {
        ActorRole::Other
    }
}

/// One Verification extension for any Patient actors, and the references of
/// representative actors in source order
fn verification_and_parties(
    source: &Map<String, Value>,
    provision: &Map<String, Value>,
) -> (Option<Value>, Vec<Value>) {
    let actors = provision.get("actor").map(coding::as_list).unwrap_or(&[]);

    let roles: Vec<(ActorRole, &Value)> = actors
        .iter()
        .map(|actor| (classify_actor(actor), actor))
        .collect();

    let verification_date = source.get("dateTime");
    let verified: Vec<Value> = roles
        .iter()
        .filter(|(role, _)| *role == ActorRole::Subject)
        .flat_map(|_| verification_entries(verification_date))
        .collect();

    let parties = roles
        .iter()
        .filter(|(role, _)| *role == ActorRole::Representative)
        .filter_map(|(_, actor)| actor.get("reference").cloned())
        .collect();

    let verification = (!verified.is_empty()).then(|| complex_extension(VERIFICATION_URL, verified));
    (verification, parties)
}

fn verification_entries(verification_date: Option<&Value>) -> Vec<Value> {
    let mut entries = vec![
        extension("Verified", "Boolean", json!(true)),
        extension(
            "VerifiedWith",
            "CodeableConcept",
            codeable_concept(SNOMED, PATIENT_CONCEPT_CODE, "Patient"),
        ),
    ];
    if let Some(date) = verification_date {
        entries.push(extension("VerificationDate", "DateTime", date.clone()));
    }
    entries
}

/// `provision.code` as a list of CodeableConcepts; anything that is not an
/// object (or list of objects) is rejected
fn treatment_codes(code: &Value) -> Result<Vec<Value>, TransformationError> {
    let codes = coding::as_list(code);
    if let Some(bad) = codes.iter().find(|concept| !concept.is_object()) {
        return Err(TransformationError::malformed(
            "provision.code",
            format!("expected CodeableConcept, found {bad}"),
        ));
    }
    Ok(codes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::CONSENT_CATEGORY_CODES;
    use pretty_assertions::assert_eq;

    fn consent(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn permitted_code(out: &Restructured) -> &Value {
        &out.modifier_extension[0]["valueCodeableConcept"]["coding"][0]["code"]
    }

    #[test]
    fn test_no_provision_yields_nothing() {
        let out = restructure(&consent(json!({"resourceType": "Consent"}))).unwrap();
        assert_eq!(out, Restructured::default());
    }

    #[test]
    fn test_specification_other_wins_over_provision_type() {
        let source = consent(json!({
            "modifierExtension": [
                {"url": SPECIFICATION_OTHER_URL, "valueString": "no heroics"},
                {"url": SPECIFICATION_OTHER_URL, "valueString": "ignored"}
            ],
            "provision": {"type": "deny"}
        }));

        let out = restructure(&source).unwrap();

        assert_eq!(out.modifier_extension.len(), 1);
        assert_eq!(permitted_code(&out), "JA_MAAR");
        assert_eq!(
            out.modifier_extension[0]["valueCodeableConcept"]["coding"][0]["display"],
            "Ja, maar met beperkingen"
        );
        assert_eq!(
            out.except,
            vec![json!({"extension": [{"url": RESTRICTIONS_URL, "valueString": "no heroics"}]})]
        );
    }

    #[test]
    fn test_specification_other_without_value_gives_empty_restriction() {
        let source = consent(json!({
            "modifierExtension": [{"url": SPECIFICATION_OTHER_URL}],
            "provision": {}
        }));

        let out = restructure(&source).unwrap();

        assert_eq!(out.except[0]["extension"][0]["valueString"], "");
    }

    #[test]
    fn test_provision_type_mapping() {
        for (kind, code, display) in [("permit", "JA", "Ja"), ("deny", "NEE", "Nee")] {
            let out = restructure(&consent(json!({"provision": {"type": kind}}))).unwrap();

            assert_eq!(permitted_code(&out), code);
            assert_eq!(
                out.modifier_extension[0]["valueCodeableConcept"]["coding"][0]["display"],
                display
            );
            assert_eq!(
                out.modifier_extension[0]["valueCodeableConcept"]["coding"][0]["system"],
                TREATMENT_PERMITTED_SYSTEM
            );
            assert_eq!(out.except, vec![json!({"type": kind})]);
        }
    }

    #[test]
    fn test_unknown_provision_type_passes_through() {
        let out = restructure(&consent(json!({"provision": {"type": "maybe"}}))).unwrap();

        assert_eq!(permitted_code(&out), "maybe");
        assert_eq!(
            out.modifier_extension[0]["valueCodeableConcept"]["coding"][0]["display"],
            "maybe"
        );
        assert_eq!(out.except, vec![json!({"type": "maybe"})]);
    }

    #[test]
    fn test_no_permission_without_type_or_specification() {
        let out = restructure(&consent(json!({"provision": {"period": {"start": "2020"}}}))).unwrap();

        assert!(out.modifier_extension.is_empty());
        assert!(out.except.is_empty());
        assert!(out.period_end.is_none());
    }

    #[test]
    fn test_patient_actor_yields_single_verification() {
        let source = consent(json!({
            "dateTime": "2024-01-01T00:00:00Z",
            "provision": {"actor": [
                {"reference": {"reference": "Patient/1", "type": "Patient"}}
            ]}
        }));

        let out = restructure(&source).unwrap();

        assert_eq!(
            out.extension,
            vec![json!({
                "url": VERIFICATION_URL,
                "extension": [
                    {"url": "Verified", "valueBoolean": true},
                    {"url": "VerifiedWith", "valueCodeableConcept": {"coding": [{
                        "system": "http://snomed.info/sct",
                        "code": "116154003",
                        "display": "Patient"
                    }]}},
                    {"url": "VerificationDate", "valueDateTime": "2024-01-01T00:00:00Z"}
                ]
            })]
        );
    }

    #[test]
    fn test_verification_without_datetime_has_two_entries() {
        let source = consent(json!({
            "provision": {"actor": [{"reference": {"reference": "Patient/1", "type": "Patient"}}]}
        }));

        let out = restructure(&source).unwrap();

        assert_eq!(out.extension.len(), 1);
        assert_eq!(out.extension[0]["extension"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_representatives_become_consenting_parties_in_order() {
        let role = json!({"coding": [{"system": ROLE_CODE, "code": "RESPRSN"}]});
        let source = consent(json!({
            "provision": {"actor": [
                {"reference": {"reference": "RelatedPerson/a", "type": "RelatedPerson"}, "role": role},
                {"reference": {"reference": "Practitioner/x"}, "role": {"coding": [{"system": ROLE_CODE, "code": "PROV"}]}},
                {"reference": {"reference": "RelatedPerson/b"}, "role": role}
            ]}
        }));

        let out = restructure(&source).unwrap();

        assert!(out.extension.is_empty());
        assert_eq!(
            out.consenting_party,
            vec![
                json!({"reference": "RelatedPerson/a", "type": "RelatedPerson"}),
                json!({"reference": "RelatedPerson/b"})
            ]
        );
    }

    #[test]
    fn test_treatment_code_scalar_is_wrapped() {
        let code = json!({"coding": [{"system": SNOMED, "code": "305351004"}]});
        let source = consent(json!({"provision": {"code": code}}));

        let out = restructure(&source).unwrap();

        assert_eq!(
            out.extension,
            vec![json!({"url": TREATMENT_URL, "valueCodeableConcept": [code]})]
        );
        assert!(out.category.is_empty());
    }

    #[test]
    fn test_treatment_code_added_to_category_for_advance_directive() {
        let code = json!({"coding": [{"system": SNOMED, "code": "305351004"}]});
        let source = consent(json!({
            "category": [{"coding": [{"system": CONSENT_CATEGORY_CODES, "code": "acd"}]}],
            "provision": {"code": [code, code]}
        }));

        let out = restructure(&source).unwrap();

        assert_eq!(out.category, vec![code.clone(), code]);
    }

    #[test]
    fn test_malformed_treatment_code_is_rejected() {
        let source = consent(json!({"provision": {"code": "DNR"}}));

        let err = restructure(&source).unwrap_err();

        assert!(matches!(err, TransformationError::MalformedField { ref field, .. } if field == "provision.code"));
    }

    #[test]
    fn test_period_end_only() {
        let source = consent(json!({
            "provision": {"period": {"start": "2020-01-01", "end": "2030-01-01"}}
        }));

        let out = restructure(&source).unwrap();

        assert_eq!(out.period_end, Some(json!("2030-01-01")));
    }
}
