// Vehicle Registration Dashboard - Core Library
// Exposes the generator, metrics engine and data sources for the CLI, the
// dashboard server and tests

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod period;
pub mod report;
pub mod source;

#[cfg(feature = "tui")]
pub mod ui;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use catalog::{Catalog, Category, CategoryProfile};
pub use config::DashboardConfig;
pub use dataset::{Dataset, DatasetIssue, RegistrationRecord};
pub use error::{DashboardError, Result};
pub use generator::{Generator, GeneratorConfig};
pub use metrics::{
    growth_rate, Kpis, Leader, MetricsEngine, MetricsQuery, MetricsReport, Series, SeriesKey,
    SeriesPoint, ShareRow,
};
pub use period::{Granularity, Period};
pub use source::{CsvFileSource, DataSource, DatasetLoader, Provenance};

#[cfg(feature = "remote")]
pub use source::HttpCsvSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
