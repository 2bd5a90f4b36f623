use crate::catalog::{Catalog, Category};
use crate::error::{DashboardError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io;
use std::path::Path;

/// One day of registrations for one manufacturer in one category.
/// Records are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    #[serde(deserialize_with = "deserialize_day")]
    pub date: NaiveDate,

    #[serde(alias = "vehicle_type")]
    pub category: Category,

    pub manufacturer: String,

    #[serde(alias = "registrations")]
    pub count: u64,
}

impl RegistrationRecord {
    pub fn new(date: NaiveDate, category: Category, manufacturer: &str, count: u64) -> Self {
        RegistrationRecord {
            date,
            category,
            manufacturer: manufacturer.to_string(),
            count,
        }
    }
}

/// Accepts plain ISO days as well as timestamps written by spreadsheet
/// exports ("2020-01-01 00:00:00", "2020-01-01T00:00:00").
fn deserialize_day<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let day = raw
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or_default();

    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

// ============================================================================
// DATASET
// ============================================================================

/// Date-ordered, immutable table of registration records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<RegistrationRecord>,
}

impl Dataset {
    /// Build a dataset, ordering records by date. Records sharing a date keep
    /// their relative order.
    pub fn from_records(mut records: Vec<RegistrationRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        Dataset { records }
    }

    pub fn records(&self) -> &[RegistrationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total(&self) -> u64 {
        crate::metrics::saturating_sum(self.records.iter().map(|r| r.count))
    }

    /// First and last day present in the dataset
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    pub fn categories(&self) -> Vec<Category> {
        let set: BTreeSet<Category> = self.records.iter().map(|r| r.category).collect();
        set.into_iter().collect()
    }

    /// Sorted, deduplicated manufacturer names, optionally limited to one category
    pub fn manufacturers(&self, category: Option<Category>) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| category.map_or(true, |c| r.category == c))
            .map(|r| r.manufacturer.as_str())
            .collect();
        set.into_iter().map(String::from).collect()
    }

    // ========================================================================
    // CSV INTERCHANGE
    // ========================================================================

    pub fn read_csv<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);

        let mut records = Vec::new();
        for (line, result) in rdr.deserialize().enumerate() {
            let record: RegistrationRecord = result.map_err(|e| {
                DashboardError::InvalidDataset(format!("row {}: {}", line + 1, e))
            })?;
            records.push(record);
        }

        Ok(Dataset::from_records(records))
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let dataset = Dataset::read_csv(io::BufReader::new(file))?;
        tracing::info!(path = %path.display(), records = dataset.len(), "loaded dataset");
        Ok(dataset)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(io::BufWriter::new(file))?;
        tracing::info!(path = %path.display(), records = self.len(), "saved dataset");
        Ok(())
    }

    /// SHA-256 over the canonical row encoding. Two datasets with the same
    /// fingerprint serialize to the same bytes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for r in &self.records {
            hasher.update(format!(
                "{},{},{},{}\n",
                r.date, r.category, r.manufacturer, r.count
            ));
        }
        format!("{:x}", hasher.finalize())
    }

    // ========================================================================
    // INVARIANTS
    // ========================================================================

    /// Check the dataset against a catalog: every manufacturer belongs to its
    /// category, each (date, category, manufacturer) appears at most once, and
    /// every catalog series is present on every day of the covered range.
    pub fn check_invariants(&self, catalog: &Catalog) -> Vec<DatasetIssue> {
        let mut issues = Vec::new();
        let mut seen: HashSet<(NaiveDate, Category, &str)> = HashSet::new();

        for r in &self.records {
            if !catalog.contains(r.category, &r.manufacturer) {
                issues.push(DatasetIssue::UnknownManufacturer {
                    date: r.date,
                    category: r.category,
                    manufacturer: r.manufacturer.clone(),
                });
            }
            if !seen.insert((r.date, r.category, r.manufacturer.as_str())) {
                issues.push(DatasetIssue::Duplicate {
                    date: r.date,
                    category: r.category,
                    manufacturer: r.manufacturer.clone(),
                });
            }
        }

        if let Some((start, end)) = self.date_range() {
            let series = catalog.series();
            for date in start.iter_days().take_while(|d| *d <= end) {
                for (category, manufacturer) in &series {
                    if !seen.contains(&(date, *category, *manufacturer)) {
                        issues.push(DatasetIssue::Missing {
                            date,
                            category: *category,
                            manufacturer: manufacturer.to_string(),
                        });
                    }
                }
            }
        }

        issues
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DatasetIssue {
    UnknownManufacturer {
        date: NaiveDate,
        category: Category,
        manufacturer: String,
    },
    Duplicate {
        date: NaiveDate,
        category: Category,
        manufacturer: String,
    },
    Missing {
        date: NaiveDate,
        category: Category,
        manufacturer: String,
    },
}

impl fmt::Display for DatasetIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetIssue::UnknownManufacturer { date, category, manufacturer } => write!(
                f,
                "{}: manufacturer '{}' is not registered under {}",
                date, manufacturer, category
            ),
            DatasetIssue::Duplicate { date, category, manufacturer } => write!(
                f,
                "{}: duplicate record for {} / {}",
                date, category, manufacturer
            ),
            DatasetIssue::Missing { date, category, manufacturer } => write!(
                f,
                "{}: no record for {} / {}",
                date, category, manufacturer
            ),
        }
    }
}
