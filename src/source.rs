// Dataset sources and the fallback loader
//
// Fetched data (a scraped export, a previously generated file, a remote CSV)
// is preferred in the configured order. Any fetch failure is logged and the
// next source is tried; when none succeeds the generator produces the data.

use crate::dataset::Dataset;
use crate::error::{DashboardError, Result};
use crate::generator::Generator;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// External collaborator returning a dataset in the interchange format.
pub trait DataSource {
    fn name(&self) -> &str;

    /// One blocking fetch. Every failure is reported as `DashboardError::Fetch`.
    fn fetch(&self) -> Result<Dataset>;
}

// ============================================================================
// CSV FILE SOURCE
// ============================================================================

pub struct CsvFileSource {
    name: String,
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        CsvFileSource {
            name: path.display().to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Dataset> {
        if !self.path.exists() {
            return Err(DashboardError::fetch(&self.name, "file not found"));
        }
        Dataset::load_csv(&self.path).map_err(|e| DashboardError::fetch(&self.name, e))
    }
}

// ============================================================================
// HTTP SOURCE
// ============================================================================

#[cfg(feature = "remote")]
pub struct HttpCsvSource {
    url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpCsvSource {
    pub fn new(url: &str) -> Self {
        HttpCsvSource {
            url: url.to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

#[cfg(feature = "remote")]
impl DataSource for HttpCsvSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<Dataset> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| DashboardError::fetch(&self.url, e))?;

        if !response.status().is_success() {
            return Err(DashboardError::fetch(
                &self.url,
                format!("HTTP {}", response.status()),
            ));
        }

        let body = response
            .bytes()
            .map_err(|e| DashboardError::fetch(&self.url, e))?;
        Dataset::read_csv(body.as_ref()).map_err(|e| DashboardError::fetch(&self.url, e))
    }
}

// ============================================================================
// LOADER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Source { name: String },
    Generated { seed: u64 },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Source { name } => write!(f, "loaded from {}", name),
            Provenance::Generated { seed } => write!(f, "synthetic (seed {})", seed),
        }
    }
}

pub struct DatasetLoader {
    sources: Vec<Box<dyn DataSource>>,
    generator: Generator,
    start: NaiveDate,
    end: NaiveDate,
    seed: u64,
}

impl DatasetLoader {
    pub fn new(generator: Generator, start: NaiveDate, end: NaiveDate, seed: u64) -> Self {
        DatasetLoader {
            sources: Vec::new(),
            generator,
            start,
            end,
            seed,
        }
    }

    pub fn with_source(mut self, source: Box<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fetch from the first source that yields a non-empty dataset, else
    /// generate. Fetch failures never reach the caller; an invalid generator
    /// range does.
    pub fn load(&self) -> Result<(Dataset, Provenance)> {
        for source in &self.sources {
            match source.fetch() {
                Ok(dataset) if !dataset.is_empty() => {
                    tracing::info!(source = source.name(), records = dataset.len(), "using fetched dataset");
                    return Ok((
                        dataset,
                        Provenance::Source {
                            name: source.name().to_string(),
                        },
                    ));
                }
                Ok(_) => {
                    tracing::warn!(source = source.name(), "source returned no records, skipping");
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "fetch failed, trying next source");
                }
            }
        }

        tracing::info!(seed = self.seed, "no source available, generating synthetic data");
        let dataset = self.generator.generate(self.start, self.end, self.seed)?;
        Ok((dataset, Provenance::Generated { seed: self.seed }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Category, CategoryProfile};
    use crate::dataset::RegistrationRecord;
    use crate::generator::GeneratorConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loader() -> DatasetLoader {
        let catalog = Catalog::new(vec![CategoryProfile::new(Category::TwoWheeler, &["A", "B"])]);
        let generator = Generator::new(GeneratorConfig::default(), catalog);
        DatasetLoader::new(generator, day(2020, 1, 1), day(2020, 1, 31), 42)
    }

    struct FailingSource {
        calls: Rc<Cell<usize>>,
    }

    impl DataSource for FailingSource {
        fn name(&self) -> &str {
            "unreachable-portal"
        }

        fn fetch(&self) -> Result<Dataset> {
            self.calls.set(self.calls.get() + 1);
            Err(DashboardError::fetch(self.name(), "connection refused"))
        }
    }

    struct StaticSource(Dataset);

    impl DataSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        fn fetch(&self) -> Result<Dataset> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_missing_file_is_fetch_error() {
        let source = CsvFileSource::new("/definitely/not/here.csv");

        let err = source.fetch().unwrap_err();
        assert!(matches!(err, DashboardError::Fetch { .. }));
    }

    #[test]
    fn test_malformed_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "date,category,manufacturer,count\nnot-a-date,2W,Hero,1\n").unwrap();

        let err = CsvFileSource::new(&path).fetch().unwrap_err();
        assert!(matches!(err, DashboardError::Fetch { .. }));
    }

    #[test]
    fn test_falls_back_to_generator_when_all_sources_fail() {
        let calls = Rc::new(Cell::new(0));
        let loader = loader()
            .with_source(Box::new(FailingSource { calls: calls.clone() }))
            .with_source(Box::new(CsvFileSource::new("/missing/synthetic.csv")));

        let (dataset, provenance) = loader.load().unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(provenance, Provenance::Generated { seed: 42 });
        assert_eq!(dataset.len(), 31 * 2);
    }

    #[test]
    fn test_first_successful_source_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraped.csv");
        let scraped = Dataset::from_records(vec![RegistrationRecord::new(
            day(2023, 1, 1),
            Category::FourWheeler,
            "Tata Motors",
            900,
        )]);
        scraped.save_csv(&path).unwrap();

        let loader = loader()
            .with_source(Box::new(FailingSource { calls: Rc::new(Cell::new(0)) }))
            .with_source(Box::new(CsvFileSource::new(&path)))
            .with_source(Box::new(StaticSource(Dataset::default())));

        let (dataset, provenance) = loader.load().unwrap();

        assert_eq!(dataset, scraped);
        assert!(matches!(provenance, Provenance::Source { ref name } if name.ends_with("scraped.csv")));
    }

    #[test]
    fn test_empty_source_is_skipped() {
        let loader = loader().with_source(Box::new(StaticSource(Dataset::default())));

        let (_, provenance) = loader.load().unwrap();
        assert_eq!(provenance, Provenance::Generated { seed: 42 });
    }

    #[test]
    fn test_generator_range_error_reaches_caller() {
        let catalog = Catalog::default();
        let generator = Generator::new(GeneratorConfig::default(), catalog);
        let loader = DatasetLoader::new(generator, day(2021, 1, 1), day(2020, 1, 1), 1);

        assert!(matches!(loader.load(), Err(DashboardError::InvalidRange { .. })));
    }
}
