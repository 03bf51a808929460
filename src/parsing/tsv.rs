use serde_json::Value;

use crate::core::provider::ProviderRecord;
use crate::core::types::{ProviderId, Sex};
use crate::parsing::candidates::ParseError;
use crate::utils::validation::check_candidate_limit;

/// Column meaning, resolved from a header name
#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Id,
    Sex,
    PostalCode,
    Name,
    Taxonomy,
    Other(String),
}

impl Column {
    fn from_header(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "npi" | "number" | "id" | "identifier" => Self::Id,
            "gender" | "sex" | "provider_gender_code" => Self::Sex,
            "zip" | "zip_code" | "postal_code" | "postal" => Self::PostalCode,
            "name" | "provider_name" => Self::Name,
            "taxonomy" | "taxonomy_code" | "taxonomies" => Self::Taxonomy,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Columns assumed when the file has no header row
fn default_columns() -> Vec<Column> {
    vec![Column::Id, Column::Sex, Column::PostalCode, Column::Name]
}

/// Parse TSV/CSV candidate text.
///
/// The first non-comment record may be a header naming the columns; without
/// one, columns are taken as: npi, gender, postal code, name. Fields may be
/// quoted, so `"DOE, JANE"` is one name. Multiple taxonomy codes in one cell
/// are separated by `;` or `|`.
///
/// # Errors
///
/// Returns `ParseError::Csv` for unreadable records,
/// `ParseError::InvalidFormat` if the header has no identifier column or a
/// line has an empty identifier, or `ParseError::TooManyCandidates` if the
/// limit is exceeded.
pub fn parse_tsv_text(text: &str, delimiter: u8) -> Result<Vec<ProviderRecord>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut candidates = Vec::new();
    let mut columns: Option<Vec<Column>> = None;

    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        // Check if first non-empty/non-comment record is a header
        if columns.is_none() {
            let header: Vec<Column> = record.iter().map(Column::from_header).collect();
            if header.iter().any(|c| !matches!(c, Column::Other(_))) {
                if !header.contains(&Column::Id) {
                    return Err(ParseError::InvalidFormat(
                        "Header has no identifier column (npi/number/id)".to_string(),
                    ));
                }
                columns = Some(header);
                continue;
            }
        }
        let columns = columns.get_or_insert_with(default_columns);

        if check_candidate_limit(candidates.len()).is_err() {
            return Err(ParseError::TooManyCandidates(candidates.len()));
        }

        let line_num = record.position().map_or(0, csv::Position::line);
        candidates.push(parse_row(columns, &record, line_num)?);
    }

    Ok(candidates)
}

fn parse_row(
    columns: &[Column],
    fields: &csv::StringRecord,
    line_num: u64,
) -> Result<ProviderRecord, ParseError> {
    let mut id = None;
    let mut sex = Sex::Unknown;
    let mut postal = "";
    let mut name = None;
    let mut taxonomies = Vec::new();
    let mut extra = serde_json::Map::new();

    for (column, value) in columns.iter().zip(fields.iter()) {
        match column {
            Column::Id => id = Some(ProviderId::new(value)),
            Column::Sex => sex = Sex::parse(value),
            Column::PostalCode => postal = value,
            Column::Name if !value.is_empty() => name = Some(value.to_string()),
            Column::Name => {}
            Column::Taxonomy => taxonomies.extend(
                value
                    .split([';', '|'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            ),
            Column::Other(key) => {
                extra.insert(key.clone(), Value::String(value.to_string()));
            }
        }
    }

    let id = id.filter(|id| !id.is_empty()).ok_or_else(|| {
        ParseError::InvalidFormat(format!("Line {line_num} has no provider identifier"))
    })?;

    let mut record = ProviderRecord::new(id, sex, postal);
    record.name = name;
    record.taxonomies = taxonomies;
    record.extra = extra;
    Ok(record)
}
