use serde::{Deserialize, Serialize};

use crate::core::types::Sex;

/// The patient being matched to providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default)]
    pub sex: Sex,

    /// Home postal code; may be partial or empty
    #[serde(default, alias = "zip")]
    pub postal_code: String,

    /// Opaque diagnosis label produced by an upstream classifier.
    /// Only used to pick a provider taxonomy, never for scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
}

impl PatientProfile {
    pub fn new(sex: Sex, postal_code: &str) -> Self {
        Self {
            sex,
            postal_code: postal_code.trim().to_string(),
            diagnosis: None,
        }
    }

    #[must_use]
    pub fn with_diagnosis(mut self, label: impl Into<String>) -> Self {
        self.diagnosis = Some(label.into());
        self
    }

    /// Trim the postal code, e.g. after deserializing untrusted input
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.postal_code = self.postal_code.trim().to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_postal_code() {
        // ZIP+4 is kept whole; proximity compares codes as given
        let patient = PatientProfile::new(Sex::Male, " 10001-0001 ");
        assert_eq!(patient.postal_code, "10001-0001");
        assert!(patient.diagnosis.is_none());
    }

    #[test]
    fn test_deserialize_with_zip_alias() {
        let patient: PatientProfile =
            serde_json::from_str(r#"{"sex": "m", "zip": " 10001 "}"#).unwrap();
        let patient = patient.normalized();
        assert_eq!(patient.sex, Sex::Male);
        assert_eq!(patient.postal_code, "10001");
    }
}
