use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::core::types::{NetworkStatus, ProviderId, Sex};

/// A candidate provider returned by the directory lookup.
///
/// Field names accept the common spellings used by provider directories
/// (`npi`/`number`, `gender`/`sex`, `zip`/`postal_code`). Any field not listed
/// here is kept in [`ProviderRecord::extra`] and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// National provider identifier
    #[serde(rename = "npi", alias = "number", alias = "identifier", alias = "id")]
    pub id: ProviderId,

    /// Display name (person or organization)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Provider sex / gender code
    #[serde(
        default,
        rename = "gender",
        alias = "sex",
        alias = "provider_gender_code"
    )]
    pub sex: Sex,

    /// Practice postal code, trimmed but otherwise as given
    #[serde(
        default,
        alias = "zip",
        alias = "postal",
        deserialize_with = "deserialize_postal_code"
    )]
    pub postal_code: String,

    /// Healthcare provider taxonomy codes
    #[serde(
        default,
        alias = "taxonomy_code",
        alias = "taxonomy",
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_string_or_seq"
    )]
    pub taxonomies: Vec<String>,

    /// Coverage status, set by the coverage index annotation step
    #[serde(default, rename = "network_status")]
    pub network: NetworkStatus,

    /// All other original fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderRecord {
    pub fn new(id: impl Into<ProviderId>, sex: Sex, postal_code: &str) -> Self {
        Self {
            id: id.into(),
            name: None,
            sex,
            postal_code: postal_code.trim().to_string(),
            taxonomies: Vec::new(),
            network: NetworkStatus::Unknown,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_taxonomy(mut self, code: impl Into<String>) -> Self {
        self.taxonomies.push(code.into());
        self
    }

    /// Return a copy of this record carrying the given network status
    #[must_use]
    pub fn with_network(mut self, network: NetworkStatus) -> Self {
        self.network = network;
        self
    }

    pub fn is_in_network(&self) -> bool {
        self.network.is_in_network()
    }

    /// Whether this provider may practice under `code`.
    ///
    /// Records without any taxonomy information are not excluded.
    pub fn accepts_taxonomy(&self, code: &str) -> bool {
        self.taxonomies.is_empty() || self.taxonomies.iter().any(|t| t.eq_ignore_ascii_case(code))
    }

    /// Name for display, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Postal codes arrive as strings or, when leading zeros were never present,
/// as bare numbers.
fn deserialize_postal_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct PostalVisitor;

    impl Visitor<'_> for PostalVisitor {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a postal code string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.trim().to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(PostalVisitor)
}

fn deserialize_string_or_seq<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    struct CodesVisitor;

    impl<'de> Visitor<'de> for CodesVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a taxonomy code or a list of taxonomy codes")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Vec<String>, E> {
            let code = v.trim();
            Ok(if code.is_empty() {
                Vec::new()
            } else {
                vec![code.to_string()]
            })
        }

        fn visit_unit<E: de::Error>(self) -> Result<Vec<String>, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Vec<String>, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<String>, A::Error> {
            let mut codes = Vec::new();
            while let Some(code) = seq.next_element::<String>()? {
                let code = code.trim();
                if !code.is_empty() {
                    codes.push(code.to_string());
                }
            }
            Ok(codes)
        }
    }

    deserializer.deserialize_any(CodesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_aliases() {
        let json = r#"{
            "number": 1234567893,
            "gender": "F",
            "zip": "10001-1234",
            "taxonomy_code": "207RC0000X",
            "city": "New York"
        }"#;

        let record: ProviderRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id.as_str(), "1234567893");
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.postal_code, "10001-1234");
        assert_eq!(record.taxonomies, vec!["207RC0000X".to_string()]);
        assert_eq!(record.network, NetworkStatus::Unknown);
        assert_eq!(record.extra["city"], "New York");
    }

    #[test]
    fn test_missing_optional_fields() {
        let record: ProviderRecord = serde_json::from_str(r#"{"npi": "1111111111"}"#).unwrap();
        assert_eq!(record.sex, Sex::Unknown);
        assert!(record.postal_code.is_empty());
        assert!(record.taxonomies.is_empty());
        assert_eq!(record.display_name(), "1111111111");
    }

    #[test]
    fn test_serialize_round_trips_extra_fields() {
        let mut record = ProviderRecord::new("1111111111", Sex::Male, "10001").with_name("Dr. A");
        record
            .extra
            .insert("state".to_string(), serde_json::json!("NY"));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["npi"], "1111111111");
        assert_eq!(value["gender"], "M");
        assert_eq!(value["state"], "NY");
        assert_eq!(value["network_status"], "unknown");
    }

    #[test]
    fn test_accepts_taxonomy() {
        let untyped = ProviderRecord::new("1", Sex::Male, "10001");
        assert!(untyped.accepts_taxonomy("207RC0000X"));

        let cardiology = untyped.clone().with_taxonomy("207RC0000X");
        assert!(cardiology.accepts_taxonomy("207rc0000x"));
        assert!(!cardiology.accepts_taxonomy("207Q00000X"));
    }
}
