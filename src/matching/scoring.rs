use serde::{Deserialize, Serialize};

use crate::core::patient::PatientProfile;
use crate::core::provider::ProviderRecord;

/// Distance assigned to identical postal codes
pub const SAME_POSTAL_DISTANCE: f64 = 1.0;

/// Distance assigned to postal codes sharing a 3-character prefix
pub const SAME_PREFIX_DISTANCE: f64 = 10.0;

/// Distance assigned to everything else
pub const FAR_DISTANCE: f64 = 100.0;

/// Lower bound applied to a distance before it is inverted
pub const MIN_DISTANCE: f64 = 0.1;

const PREFIX_LEN: usize = 3;

/// Configurable weights for the affinity components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffinityWeights {
    /// Weight for patient/provider sex agreement
    pub gender: f64,
    /// Weight for postal-code proximity
    pub distance: f64,
    /// Weight for network membership
    pub network: f64,
}

impl Default for AffinityWeights {
    fn default() -> Self {
        Self {
            gender: 0.2,   // 20%
            distance: 0.3, // 30%
            network: 0.5,  // 50%
        }
    }
}

impl AffinityWeights {
    /// Normalize weights to sum to 1.0
    pub fn normalized(&self) -> Self {
        let total = self.gender + self.distance + self.network;

        if total.is_nan() || total <= 0.0 {
            return Self::default();
        }
        if self.gender < 0.0 || self.distance < 0.0 || self.network < 0.0 {
            return Self::default();
        }

        Self {
            gender: self.gender / total,
            distance: self.distance / total,
            network: self.network / total,
        }
    }

    /// Build weights from whole percentages, as given on the command line
    pub fn from_percentages(gender: u32, distance: u32, network: u32) -> Self {
        Self {
            gender: f64::from(gender) / 100.0,
            distance: f64::from(distance) / 100.0,
            network: f64::from(network) / 100.0,
        }
        .normalized()
    }
}

/// Detailed affinity between a patient and one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityScore {
    /// Provider was in network; when false every other field is zero
    pub in_network: bool,

    /// 1.0 if sexes match, else 0.0
    pub gender_term: f64,

    /// Postal-code proximity tier (1, 10 or 100)
    pub distance: f64,

    /// 1 / distance
    pub distance_term: f64,

    /// Weighted composite, rounded to 4 decimal places
    pub composite: f64,
}

impl AffinityScore {
    /// Score with the default weights
    #[must_use]
    pub fn calculate(patient: &PatientProfile, provider: &ProviderRecord) -> Self {
        Self::calculate_with_weights(patient, provider, &AffinityWeights::default())
    }

    /// Score with custom weights
    #[must_use]
    pub fn calculate_with_weights(
        patient: &PatientProfile,
        provider: &ProviderRecord,
        weights: &AffinityWeights,
    ) -> Self {
        // Hard gate: nothing else counts outside the network
        if !provider.is_in_network() {
            return Self {
                in_network: false,
                gender_term: 0.0,
                distance: 0.0,
                distance_term: 0.0,
                composite: 0.0,
            };
        }

        let weights = weights.normalized();

        let gender_term = if patient.sex.matches(provider.sex) {
            1.0
        } else {
            0.0
        };

        let distance = postal_distance(&patient.postal_code, &provider.postal_code);
        let distance_term = 1.0 / distance.max(MIN_DISTANCE);

        let composite = round4(
            weights.gender * gender_term + weights.distance * distance_term + weights.network * 1.0,
        );

        Self {
            in_network: true,
            gender_term,
            distance,
            distance_term,
            composite,
        }
    }
}

/// Affinity of `provider` for `patient` in [0.0, 1.0] using the default weights
#[must_use]
pub fn score(patient: &PatientProfile, provider: &ProviderRecord) -> f64 {
    AffinityScore::calculate(patient, provider).composite
}

/// Three-tier proximity between two postal codes.
///
/// Codes are compared as given, apart from surrounding whitespace: identical
/// codes (including two empty ones) are tier 1, codes sharing their first
/// three characters are tier 10, and everything else is tier 100. ZIP+4
/// suffixes are not stripped, so `10001-1234` and `10001-9999` only share a
/// prefix.
///
/// ```
/// use provider_match::matching::scoring::postal_distance;
///
/// assert_eq!(postal_distance("10001", "10001"), 1.0);
/// assert_eq!(postal_distance("10001", "10017"), 10.0);
/// assert_eq!(postal_distance("10001", "94105"), 100.0);
/// ```
#[must_use]
pub fn postal_distance(a: &str, b: &str) -> f64 {
    let (a, b) = (a.trim(), b.trim());

    if a == b {
        return SAME_POSTAL_DISTANCE;
    }

    // Shorter codes take their whole length as the prefix, so they never
    // share one with a different code
    if a.chars().take(PREFIX_LEN).eq(b.chars().take(PREFIX_LEN)) {
        SAME_PREFIX_DISTANCE
    } else {
        FAR_DISTANCE
    }
}

/// Round half away from zero to 4 decimal places
#[inline]
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NetworkStatus, Sex};

    fn patient(sex: Sex, zip: &str) -> PatientProfile {
        PatientProfile::new(sex, zip)
    }

    fn provider(sex: Sex, zip: &str, network: NetworkStatus) -> ProviderRecord {
        ProviderRecord::new("1234567893", sex, zip).with_network(network)
    }

    #[test]
    fn test_out_of_network_is_zero() {
        let p = patient(Sex::Female, "10001");
        for status in [NetworkStatus::OutOfNetwork, NetworkStatus::Unknown] {
            for sex in [Sex::Female, Sex::Male, Sex::Unknown] {
                for zip in ["10001", "10017", "94105", ""] {
                    assert_eq!(score(&p, &provider(sex, zip, status)), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_perfect_match_is_one() {
        let s = score(
            &patient(Sex::Female, "10001"),
            &provider(Sex::Female, "10001", NetworkStatus::InNetwork),
        );
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_score_tiers() {
        let p = patient(Sex::Male, "10001");
        let cases = [
            (Sex::Male, "10001", 1.0),
            (Sex::Female, "10001", 0.8),
            (Sex::Male, "10017", 0.73),
            (Sex::Male, "94105", 0.703),
            (Sex::Female, "10017", 0.53),
            (Sex::Female, "94105", 0.503),
        ];

        for (sex, zip, expected) in cases {
            let actual = score(&p, &provider(sex, zip, NetworkStatus::InNetwork));
            assert_eq!(actual, expected, "sex={sex} zip={zip}");
        }
    }

    #[test]
    fn test_in_network_bounds() {
        let p = patient(Sex::Unknown, "");
        for sex in [Sex::Female, Sex::Male, Sex::Unknown] {
            for zip in ["10001", "1", "", "94105"] {
                let s = score(&p, &provider(sex, zip, NetworkStatus::InNetwork));
                assert!((0.5..=1.0).contains(&s), "score {s} out of bounds");
            }
        }
    }

    #[test]
    fn test_unknown_sex_never_matches() {
        let p = patient(Sex::Unknown, "10001");
        let breakdown = AffinityScore::calculate(
            &p,
            &provider(Sex::Unknown, "10001", NetworkStatus::InNetwork),
        );
        assert_eq!(breakdown.gender_term, 0.0);
        assert_eq!(breakdown.composite, 0.8);
    }

    #[test]
    fn test_postal_distance_edges() {
        assert_eq!(postal_distance("", ""), SAME_POSTAL_DISTANCE);
        assert_eq!(postal_distance(" 10001", "10001 "), SAME_POSTAL_DISTANCE);
        assert_eq!(postal_distance("", "10001"), FAR_DISTANCE);
        assert_eq!(postal_distance("10", "10"), SAME_POSTAL_DISTANCE);
        assert_eq!(postal_distance("10", "101"), FAR_DISTANCE);
        assert_eq!(postal_distance("100", "10099"), SAME_PREFIX_DISTANCE);
        assert_eq!(postal_distance("10001-1234", "10001-9999"), SAME_PREFIX_DISTANCE);
        assert_eq!(postal_distance("10001-1234", "10001"), SAME_PREFIX_DISTANCE);
    }

    #[test]
    fn test_empty_postal_codes_are_identical() {
        let s = score(
            &patient(Sex::Male, ""),
            &provider(Sex::Male, "", NetworkStatus::InNetwork),
        );
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_zip_plus_four_suffixes_differ() {
        let s = score(
            &patient(Sex::Male, "10001-1234"),
            &provider(Sex::Male, "10001-9999", NetworkStatus::InNetwork),
        );
        assert_eq!(s, 0.73);
    }

    #[test]
    fn test_custom_weights_are_normalized() {
        let p = patient(Sex::Male, "10001");
        let prov = provider(Sex::Female, "94105", NetworkStatus::InNetwork);

        // Network only: every in-network provider scores 1.0
        let weights = AffinityWeights::from_percentages(0, 0, 100);
        assert_eq!(AffinityScore::calculate_with_weights(&p, &prov, &weights).composite, 1.0);

        // Doubling every weight changes nothing
        let doubled = AffinityWeights {
            gender: 0.4,
            distance: 0.6,
            network: 1.0,
        };
        assert_eq!(
            AffinityScore::calculate_with_weights(&p, &prov, &doubled).composite,
            score(&p, &prov)
        );
    }

    #[test]
    fn test_degenerate_weights_fall_back_to_default() {
        let zero = AffinityWeights {
            gender: 0.0,
            distance: 0.0,
            network: 0.0,
        };
        assert_eq!(zero.normalized(), AffinityWeights::default());

        let negative = AffinityWeights {
            gender: -1.0,
            distance: 1.0,
            network: 1.0,
        };
        assert_eq!(negative.normalized(), AffinityWeights::default());
    }

    #[test]
    fn test_rounding_is_four_places() {
        assert_eq!(round4(0.123_46), 0.1235);
        assert_eq!(round4(0.123_44), 0.1234);
        assert_eq!(round4(0.703), 0.703);
    }
}
