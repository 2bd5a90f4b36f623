use crate::catalog::Catalog;
use crate::error::{DashboardError, Result};
use crate::generator::{Generator, GeneratorConfig};
use crate::source::{CsvFileSource, DataSource, DatasetLoader};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Prefix for environment overrides, e.g. `DASHBOARD_SEED=7` or
/// `DASHBOARD_GENERATOR__NOISE=0.2`
pub const ENV_PREFIX: &str = "DASHBOARD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory holding the tabular data files
    pub data_dir: PathBuf,

    /// Externally scraped dataset, preferred when present
    pub scraped_file: String,

    /// Previously generated dataset
    pub synthetic_file: String,

    /// Optional remote CSV tried before the local files
    pub remote_url: Option<String>,

    pub seed: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Bind address of the dashboard server
    pub server_addr: String,

    pub generator: GeneratorConfig,
    pub catalog: Catalog,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_dir: PathBuf::from("data"),
            scraped_file: "vehicle_registrations_scraped.csv".to_string(),
            synthetic_file: "vehicle_registrations.csv".to_string(),
            remote_url: None,
            seed: 42,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            server_addr: "0.0.0.0:3000".to_string(),
            generator: GeneratorConfig::default(),
            catalog: Catalog::default(),
        }
    }
}

impl DashboardConfig {
    /// Layer built-in defaults, then the TOML file, then `DASHBOARD_*`
    /// environment variables. A missing file is not an error unless its
    /// path was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_layers(path, environment())
    }

    fn load_layers(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&DashboardConfig::default())?)
            .add_source(file)
            .add_source(env)
            .build()?;

        let cfg: DashboardConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(DashboardError::InvalidRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        self.catalog.validate()?;
        self.generator.validate()
    }

    pub fn scraped_path(&self) -> PathBuf {
        self.data_dir.join(&self.scraped_file)
    }

    pub fn synthetic_path(&self) -> PathBuf {
        self.data_dir.join(&self.synthetic_file)
    }

    pub fn generator(&self) -> Generator {
        Generator::new(self.generator.clone(), self.catalog.clone())
    }

    /// Loader trying the remote URL (when enabled), then the scraped file,
    /// then the synthetic file, before generating.
    pub fn loader(&self) -> DatasetLoader {
        let mut loader = DatasetLoader::new(self.generator(), self.start_date, self.end_date, self.seed);
        if let Some(source) = self.remote_url.as_deref().and_then(remote_source) {
            loader = loader.with_source(source);
        }

        loader
            .with_source(Box::new(CsvFileSource::new(self.scraped_path())))
            .with_source(Box::new(CsvFileSource::new(self.synthetic_path())))
    }
}

/// `DASHBOARD_SEED=7`, `DASHBOARD_GENERATOR__NOISE=0.2`
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(feature = "remote")]
fn remote_source(url: &str) -> Option<Box<dyn DataSource>> {
    Some(Box::new(crate::source::HttpCsvSource::new(url)))
}

#[cfg(not(feature = "remote"))]
fn remote_source(url: &str) -> Option<Box<dyn DataSource>> {
    tracing::warn!(%url, "remote_url set but the 'remote' feature is disabled");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = DashboardConfig::default();

        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(cfg.end_date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(cfg.synthetic_path(), PathBuf::from("data/vehicle_registrations.csv"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
seed = 7
start_date = "2021-01-01"
end_date = "2021-03-31"

[generator]
noise = 0.2
spike_probability = 0.0
"#
        )
        .unwrap();

        let cfg = DashboardConfig::load(Some(file.path())).unwrap();

        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(cfg.generator.noise, 0.2);
        assert_eq!(cfg.generator.spike_probability, 0.0);
        // Untouched values keep their defaults
        assert_eq!(cfg.generator.weekend_factor, 0.6);
        assert_eq!(cfg.catalog, Catalog::default());
    }

    #[test]
    fn test_reversed_dates_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "start_date = \"2022-01-01\"\nend_date = \"2021-01-01\"").unwrap();

        let err = DashboardConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRange { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = DashboardConfig::load(Some(Path::new("/no/such/dashboard.toml"))).unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn test_empty_manufacturer_list_is_invalid() {
        let mut cfg = DashboardConfig::default();
        cfg.catalog.categories[1].manufacturers.clear();

        assert!(matches!(cfg.validate(), Err(DashboardError::InvalidConfig(_))));
    }

    #[test]
    fn test_loader_source_order() {
        let cfg = DashboardConfig {
            data_dir: PathBuf::from("/srv/data"),
            ..DashboardConfig::default()
        };

        let loader = cfg.loader();
        let names = loader.source_names();

        assert_eq!(
            &names[names.len() - 2..],
            &[
                "/srv/data/vehicle_registrations_scraped.csv",
                "/srv/data/vehicle_registrations.csv"
            ]
        );
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("seed = 7\n\n[generator]\nnoise = 0.2\nweekend_factor = 0.5");
        let vars: config::Map<String, String> = [
            ("DASHBOARD_SEED", "9"),
            ("DASHBOARD_GENERATOR__NOISE", "0.25"),
            ("OTHER_SEED", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg = DashboardConfig::load_layers(Some(file.path()), environment().source(Some(vars))).unwrap();

        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.generator.noise, 0.25);
        // File value without an environment override
        assert_eq!(cfg.generator.weekend_factor, 0.5);
    }

    #[test]
    fn test_environment_values_are_validated() {
        let vars: config::Map<String, String> =
            [("DASHBOARD_GENERATOR__SPIKE_PROBABILITY".to_string(), "1.5".to_string())]
                .into_iter()
                .collect();
        let file = toml_file("seed = 1");

        let err = DashboardConfig::load_layers(Some(file.path()), environment().source(Some(vars))).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicate_manufacturer_in_file_is_rejected() {
        let file = toml_file(
            r#"
[[catalog.categories]]
category = "2W"
manufacturers = ["Hero", "Hero"]
scale = 1.0
seasonal_amplitude = 0.5
seasonal_phase_days = 0.0
"#,
        );

        let err = DashboardConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidConfig(ref msg) if msg.contains("Hero")));
    }
}
