use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::core::provider::ProviderRecord;
use crate::core::types::{ProviderId, Sex};
use crate::parsing::tsv::parse_tsv_text;
use crate::utils::validation::{check_candidate_limit, MAX_CANDIDATES};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid delimited record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid candidate file format: {0}")]
    InvalidFormat(String),

    #[error("Too many candidates: {0} exceeds maximum allowed ({MAX_CANDIDATES})")]
    TooManyCandidates(usize),
}

/// Candidate list file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateFormat {
    Json,
    Tsv,
    Csv,
}

impl CandidateFormat {
    /// Guess the format from a file extension; anything unknown is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("tsv" | "tab" | "txt") => Self::Tsv,
            Some("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Load a candidate provider list from a file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or other parse errors
/// if the content is invalid.
pub fn parse_candidates_file(path: &Path) -> Result<Vec<ProviderRecord>, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_candidates_text(&content, CandidateFormat::from_path(path))
}

/// Parse candidate text in the given format
///
/// # Errors
///
/// Returns `ParseError::Json` / `ParseError::InvalidFormat` for bad content and
/// `ParseError::TooManyCandidates` above the limit.
pub fn parse_candidates_text(
    text: &str,
    format: CandidateFormat,
) -> Result<Vec<ProviderRecord>, ParseError> {
    match format {
        CandidateFormat::Json => parse_candidates_json(text),
        CandidateFormat::Tsv => parse_tsv_text(text, b'\t'),
        CandidateFormat::Csv => parse_tsv_text(text, b','),
    }
}

/// Parse a JSON candidate list.
///
/// Accepts either an array of flat provider records or an NPPES registry API
/// response (`{"result_count": n, "results": [...]}`). Array elements in NPPES
/// result shape are also recognized.
///
/// # Errors
///
/// Returns `ParseError::Json` for invalid JSON or records,
/// `ParseError::InvalidFormat` for an unrecognized top-level shape, and
/// `ParseError::TooManyCandidates` above the limit.
pub fn parse_candidates_json(text: &str) -> Result<Vec<ProviderRecord>, ParseError> {
    let value: Value = serde_json::from_str(text)?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ParseError::InvalidFormat(
                    "expected an array of providers or an object with a `results` array"
                        .to_string(),
                ))
            }
        },
        _ => {
            return Err(ParseError::InvalidFormat(
                "expected an array of providers".to_string(),
            ))
        }
    };

    let mut candidates = Vec::with_capacity(items.len().min(MAX_CANDIDATES));
    for item in items {
        if check_candidate_limit(candidates.len()).is_err() {
            return Err(ParseError::TooManyCandidates(candidates.len()));
        }

        let record = if is_nppes_result(&item) {
            serde_json::from_value::<NppesResult>(item)?.into_record()
        } else {
            serde_json::from_value::<ProviderRecord>(item)?
        };
        candidates.push(record);
    }

    Ok(candidates)
}

fn is_nppes_result(item: &Value) -> bool {
    item.get("number").is_some() && (item.get("basic").is_some() || item.get("addresses").is_some())
}

/// One entry of an NPPES registry API response
#[derive(Debug, Deserialize)]
struct NppesResult {
    number: ProviderId,
    #[serde(default)]
    enumeration_type: Option<String>,
    #[serde(default)]
    basic: NppesBasic,
    #[serde(default)]
    addresses: Vec<NppesAddress>,
    #[serde(default)]
    taxonomies: Vec<NppesTaxonomy>,
}

#[derive(Debug, Default, Deserialize)]
struct NppesBasic {
    first_name: Option<String>,
    last_name: Option<String>,
    organization_name: Option<String>,
    credential: Option<String>,
    #[serde(alias = "sex")]
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NppesAddress {
    #[serde(default)]
    address_purpose: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NppesTaxonomy {
    code: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    primary: bool,
}

impl NppesResult {
    fn into_record(self) -> ProviderRecord {
        let sex = self.basic.gender.as_deref().map_or(Sex::Unknown, Sex::parse);

        // Practice location first; the registry usually lists the mailing address first
        let address = self
            .addresses
            .iter()
            .find(|a| a.address_purpose.as_deref() == Some("LOCATION"))
            .or_else(|| self.addresses.first());
        let postal_code = address
            .and_then(|a| a.postal_code.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        let mut record = ProviderRecord::new(self.number, sex, postal_code);

        let person = [self.basic.first_name.as_deref(), self.basic.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(org) = self.basic.organization_name.filter(|o| !o.trim().is_empty()) {
            record.name = Some(org);
        } else if !person.is_empty() {
            record.name = Some(match self.basic.credential.as_deref() {
                Some(cred) if !cred.is_empty() => format!("{person}, {cred}"),
                _ => person,
            });
        }

        // Primary taxonomy first
        let mut taxonomies = self.taxonomies;
        taxonomies.sort_by_key(|t| !t.primary);
        if let Some(primary) = taxonomies.first().and_then(|t| t.desc.clone()) {
            record.extra.insert("specialty".to_string(), Value::String(primary));
        }
        record.taxonomies = taxonomies.into_iter().map(|t| t.code).collect();

        if let Some(address) = address {
            if let Some(city) = &address.city {
                record.extra.insert("city".to_string(), Value::String(city.clone()));
            }
            if let Some(state) = &address.state {
                record.extra.insert("state".to_string(), Value::String(state.clone()));
            }
        }
        if let Some(kind) = self.enumeration_type {
            record.extra.insert("enumeration_type".to_string(), Value::String(kind));
        }

        record
    }
}
