// Error taxonomy shared by the generator, metrics engine and data sources.
//
// InvalidRange and EmptyResult are returned to the caller, who shows a
// corrective message. Fetch is recovered inside the dataset loader by falling
// back to the generator.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Invalid date range: end {end} precedes start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("No registrations match the selected filters")]
    EmptyResult,

    #[error("Failed to fetch dataset from {source_name}: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown vehicle category: {0}")]
    UnknownCategory(String),

    #[error("Unknown granularity: {0} (expected day, week, month, quarter or year)")]
    UnknownGranularity(String),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DashboardError {
    pub fn fetch(source_name: &str, reason: impl ToString) -> Self {
        DashboardError::Fetch {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors the user can fix by changing the query, as opposed to data or
    /// environment failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DashboardError::InvalidRange { .. }
                | DashboardError::EmptyResult
                | DashboardError::UnknownCategory(_)
                | DashboardError::UnknownGranularity(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
