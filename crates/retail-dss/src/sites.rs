//! CSV import of candidate sites.
//!
//! Expected header: `id`, `site_code`, `address`, optional `district` and `status`, then one
//! column per criterion id in the schema. Extra columns are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::ranking::{Candidate, CandidateId, CandidateStatus, CriteriaSchema, CriterionId};

#[derive(Debug)]
pub enum SiteImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(String),
    InvalidId { line: u64, value: String },
}

impl fmt::Display for SiteImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteImportError::Io(err) => write!(f, "failed to read site export: {}", err),
            SiteImportError::Csv(err) => write!(f, "invalid site CSV data: {}", err),
            SiteImportError::MissingColumn(column) => {
                write!(f, "site CSV is missing the '{}' column", column)
            }
            SiteImportError::InvalidId { line, value } => {
                write!(f, "line {}: '{}' is not a valid site id", line, value)
            }
        }
    }
}

impl std::error::Error for SiteImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SiteImportError::Io(err) => Some(err),
            SiteImportError::Csv(err) => Some(err),
            SiteImportError::MissingColumn(_) | SiteImportError::InvalidId { .. } => None,
        }
    }
}

impl From<std::io::Error> for SiteImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SiteImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads candidate sites from a CSV export.
pub struct SiteCsvImporter;

impl SiteCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        schema: &CriteriaSchema,
    ) -> Result<Vec<Candidate>, SiteImportError> {
        let file = std::fs::File::open(path.as_ref())?;
        let sites = Self::from_reader(file, schema)?;
        info!(path = %path.as_ref().display(), sites = sites.len(), "site catalog imported");
        Ok(sites)
    }

    /// Empty or unparsable criterion cells are left out so the matrix builder excludes the site.
    pub fn from_reader<R: Read>(
        reader: R,
        schema: &CriteriaSchema,
    ) -> Result<Vec<Candidate>, SiteImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let columns = Columns::locate(csv_reader.headers()?, schema)?;

        let mut sites = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |position| position.line());
            let cell = |index: usize| record.get(index).unwrap_or("").trim();

            let raw_id = cell(columns.id);
            let id = raw_id
                .parse::<u64>()
                .map_err(|_| SiteImportError::InvalidId {
                    line,
                    value: raw_id.to_string(),
                })?;

            let mut values = BTreeMap::new();
            for (criterion, index) in &columns.criteria {
                match cell(*index).parse::<f64>() {
                    Ok(value) => {
                        values.insert(criterion.clone(), value);
                    }
                    Err(_) => {
                        debug!(
                            site_id = id,
                            %criterion,
                            line,
                            "criterion value missing or unparsable"
                        );
                    }
                }
            }

            sites.push(Candidate {
                id: CandidateId(id),
                site_code: cell(columns.site_code).to_string(),
                address: cell(columns.address).to_string(),
                district: columns
                    .district
                    .map(cell)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string),
                status: columns
                    .status
                    .map_or(CandidateStatus::Active, |index| parse_status(cell(index))),
                values,
            });
        }

        Ok(sites)
    }
}

struct Columns {
    id: usize,
    site_code: usize,
    address: usize,
    district: Option<usize>,
    status: Option<usize>,
    criteria: Vec<(CriterionId, usize)>,
}

impl Columns {
    fn locate(
        headers: &csv::StringRecord,
        schema: &CriteriaSchema,
    ) -> Result<Self, SiteImportError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| SiteImportError::MissingColumn(name.to_string()))
        };

        let criteria = schema
            .criteria()
            .iter()
            .map(|criterion| {
                require(criterion.id.as_str()).map(|index| (criterion.id.clone(), index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: require("id")?,
            site_code: require("site_code")?,
            address: require("address")?,
            district: find("district"),
            status: find("status"),
            criteria,
        })
    }
}

fn parse_status(value: &str) -> CandidateStatus {
    if value.is_empty() || value.eq_ignore_ascii_case("active") {
        CandidateStatus::Active
    } else {
        CandidateStatus::Inactive
    }
}
