//! Mapping from diagnosis labels to provider taxonomy codes.
//!
//! Diagnosis labels are opaque strings produced by an upstream classifier.
//! The table below routes the labels that classifier is known to emit to a
//! specialist taxonomy; anything unmapped goes to internal medicine.

/// Internal Medicine
pub const DEFAULT_TAXONOMY: &str = "207Q00000X";

/// Cardiovascular Disease
pub const CARDIOLOGY: &str = "207RC0000X";

/// Pulmonary Disease
pub const PULMONOLOGY: &str = "207RP1001X";

/// Gastroenterology
pub const GASTROENTEROLOGY: &str = "207RG0100X";

const DIAGNOSIS_TAXONOMIES: &[(&str, &str)] = &[
    ("Acute Coronary Syndrome", CARDIOLOGY),
    ("Myocarditis", CARDIOLOGY),
    ("Pneumonia", PULMONOLOGY),
    ("Appendicitis", GASTROENTEROLOGY),
    ("Viral Pharyngitis", DEFAULT_TAXONOMY),
    ("URTI", DEFAULT_TAXONOMY),
];

/// Look up the taxonomy code for a diagnosis label (case-insensitive).
///
/// # Examples
///
/// ```
/// use provider_match::core::taxonomy::{taxonomy_for_diagnosis, DEFAULT_TAXONOMY};
///
/// assert_eq!(taxonomy_for_diagnosis("Pneumonia"), "207RP1001X");
/// assert_eq!(taxonomy_for_diagnosis("something else"), DEFAULT_TAXONOMY);
/// ```
#[must_use]
pub fn taxonomy_for_diagnosis(label: &str) -> &'static str {
    let label = label.trim();
    DIAGNOSIS_TAXONOMIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .map_or(DEFAULT_TAXONOMY, |&(_, code)| code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(taxonomy_for_diagnosis("Acute Coronary Syndrome"), CARDIOLOGY);
        assert_eq!(taxonomy_for_diagnosis("myocarditis"), CARDIOLOGY);
        assert_eq!(taxonomy_for_diagnosis(" Appendicitis "), GASTROENTEROLOGY);
    }

    #[test]
    fn test_unknown_label_uses_default() {
        assert_eq!(taxonomy_for_diagnosis(""), DEFAULT_TAXONOMY);
        assert_eq!(taxonomy_for_diagnosis("Unknown"), DEFAULT_TAXONOMY);
    }
}
