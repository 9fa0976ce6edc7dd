use serde::{Deserialize, Serialize};
use std::fmt;

/// FHIR release a resource document conforms to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FhirVersion {
    #[serde(rename = "STU3")]
    Stu3,
    R4,
}

impl FhirVersion {
    /// Path segment used by profile canonicals for this release
    pub fn profile_segment(self) -> &'static str {
        match self {
            FhirVersion::Stu3 => "/STU3/",
            FhirVersion::R4 => "/R4/",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirVersion::Stu3 => write!(f, "STU3"),
            FhirVersion::R4 => write!(f, "R4"),
        }
    }
}
