use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;

/// A national provider identifier, normalized to its canonical string form.
///
/// Identifiers are opaque: two identifiers are equal when their canonical
/// strings are equal. Use [`ProviderId::new`] for raw strings and
/// [`ProviderId::from_u64`] / [`ProviderId::from_f64`] for numeric values read
/// from a coverage document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create an identifier from a raw string, trimming surrounding whitespace.
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_string())
    }

    #[must_use]
    pub fn from_u64(n: u64) -> Self {
        Self(n.to_string())
    }

    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        Self(n.to_string())
    }

    /// Integral floating values (e.g. `1234567893.0`) are printed without a
    /// fractional part or exponent so they compare equal to their integer form.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
            if n < 0.0 {
                return Self::from_i64(n as i64);
            }
            return Self::from_u64(n as u64);
        }
        Self(n.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// `String` and `str` hash identically, so set lookups by `&str` are sound.
impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Accepts JSON strings and numbers, normalizing both to the canonical form
impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ProviderId;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a provider identifier string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ProviderId, E> {
                Ok(ProviderId::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ProviderId, E> {
                Ok(ProviderId::from_u64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ProviderId, E> {
                Ok(ProviderId::from_i64(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ProviderId, E> {
                Ok(ProviderId::from_f64(v))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Administrative sex / gender code shared by patients and providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    /// Missing or unrecognized code
    #[default]
    #[serde(rename = "U")]
    Unknown,
}

impl Sex {
    /// Parse a sex code. Accepts `M`/`F` and `male`/`female` in any case;
    /// everything else is [`Sex::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "M" | "MALE" => Self::Male,
            "F" | "FEMALE" => Self::Female,
            _ => Self::Unknown,
        }
    }

    /// Whether two codes denote the same known sex. Unknown never matches,
    /// not even another unknown.
    pub fn matches(self, other: Self) -> bool {
        self != Self::Unknown && self == other
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unknown => "U",
        }
    }
}

impl From<Option<String>> for Sex {
    fn from(code: Option<String>) -> Self {
        code.as_deref().map_or(Self::Unknown, Self::parse)
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Network membership of a provider under the patient's plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// Never looked up, or looked up against an incomplete scan
    #[default]
    Unknown,
    /// Identifier was found in at least one coverage group
    InNetwork,
    /// Identifier was a scan target and a complete scan did not find it
    OutOfNetwork,
}

impl NetworkStatus {
    pub fn is_in_network(self) -> bool {
        matches!(self, Self::InNetwork)
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::InNetwork => write!(f, "in-network"),
            Self::OutOfNetwork => write!(f, "out-of-network"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_provider_id_numeric_forms_agree() {
        assert_eq!(ProviderId::from_u64(1_111_111_111), ProviderId::new("1111111111"));
        assert_eq!(ProviderId::from_f64(1_111_111_111.0), ProviderId::new("1111111111"));
        assert_eq!(ProviderId::new("  1111111111 "), ProviderId::new("1111111111"));
        assert_eq!(ProviderId::from_f64(12.5).as_str(), "12.5");
    }

    #[test]
    fn test_provider_id_str_lookup() {
        let set: HashSet<ProviderId> = [ProviderId::new("1234567893")].into_iter().collect();
        assert!(set.contains("1234567893"));
        assert!(!set.contains("1234567890"));
    }

    #[test]
    fn test_provider_id_deserializes_numbers() {
        let ids: Vec<ProviderId> = serde_json::from_str(r#"[1111111111, " 2222222222", 3.0]"#).unwrap();
        assert_eq!(ids[0].as_str(), "1111111111");
        assert_eq!(ids[1].as_str(), "2222222222");
        assert_eq!(ids[2].as_str(), "3");
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), "\"1111111111\"");
    }

    #[test]
    fn test_sex_parse_and_match() {
        assert_eq!(Sex::parse("m"), Sex::Male);
        assert_eq!(Sex::parse(" Female "), Sex::Female);
        assert_eq!(Sex::parse("X"), Sex::Unknown);
        assert!(Sex::Male.matches(Sex::Male));
        assert!(!Sex::Male.matches(Sex::Female));
        assert!(!Sex::Unknown.matches(Sex::Unknown));
    }

    #[test]
    fn test_sex_serde_codes() {
        assert_eq!(serde_json::to_string(&Sex::Female).unwrap(), "\"F\"");
        let parsed: Sex = serde_json::from_str("\"Q\"").unwrap();
        assert_eq!(parsed, Sex::Unknown);
        let parsed: Sex = serde_json::from_str("\"female\"").unwrap();
        assert_eq!(parsed, Sex::Female);
        let parsed: Sex = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, Sex::Unknown);
    }
}
