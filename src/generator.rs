// Synthetic daily registration generator
//
// value = base(category, manufacturer)
//       × compounding growth since the range start
//       × seasonal sine wave (per-category amplitude and phase)
//       × quarter adjustment × weekend suppression
//       × bounded noise × promotional spike (some days, some manufacturers)
//
// All randomness comes from an injected RNG so a seed reproduces the dataset
// exactly.

use crate::catalog::{Catalog, CategoryProfile};
use crate::dataset::{Dataset, RegistrationRecord};
use crate::error::{DashboardError, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const DAYS_PER_YEAR: f64 = 365.25;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Shape constants of the synthetic series. The defaults are illustrative,
/// not fitted to real registration data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Daily registrations of a weight-1.0 manufacturer in a scale-1.0 category
    pub base_volume: f64,

    /// Compounding growth per elapsed year (0.15 = 15%)
    pub annual_growth: f64,

    /// Multiplier per calendar quarter, Q1..Q4
    pub quarter_factors: [f64; 4],

    /// Multiplier applied on Saturday and Sunday
    pub weekend_factor: f64,

    /// Half-width of the uniform noise band (0.10 = ±10%)
    pub noise: f64,

    /// Range of the fixed per-manufacturer weight
    pub weight_min: f64,
    pub weight_max: f64,

    /// Probability that a given day carries a promotional spike
    pub spike_probability: f64,

    /// Upper bound on the fraction of series hit by one spike day
    pub spike_share: f64,

    /// Range of the spike multiplier
    pub spike_min: f64,
    pub spike_max: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            base_volume: 1000.0,
            annual_growth: 0.15,
            quarter_factors: [1.0, 0.97, 1.0, 1.05],
            weekend_factor: 0.6,
            noise: 0.10,
            weight_min: 0.5,
            weight_max: 1.5,
            spike_probability: 0.01,
            spike_share: 0.3,
            spike_min: 1.5,
            spike_max: 2.5,
        }
    }
}

impl GeneratorConfig {
    /// A config with every random and calendar effect switched off, leaving
    /// only base volume and growth.
    pub fn flat() -> Self {
        GeneratorConfig {
            quarter_factors: [1.0; 4],
            weekend_factor: 1.0,
            noise: 0.0,
            weight_min: 1.0,
            weight_max: 1.0,
            spike_probability: 0.0,
            ..GeneratorConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(DashboardError::InvalidConfig(msg.to_string()));

        let floats = [
            self.base_volume,
            self.annual_growth,
            self.weekend_factor,
            self.noise,
            self.weight_min,
            self.weight_max,
            self.spike_probability,
            self.spike_share,
            self.spike_min,
            self.spike_max,
        ];
        if floats.iter().chain(&self.quarter_factors).any(|v| !v.is_finite()) {
            return fail("generator constants must be finite numbers");
        }

        if self.base_volume < 0.0 {
            return fail("base_volume must be non-negative");
        }
        if self.annual_growth <= -1.0 {
            return fail("annual_growth must be greater than -1");
        }
        if self.quarter_factors.iter().any(|f| *f < 0.0) || self.weekend_factor < 0.0 {
            return fail("calendar factors must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.noise) {
            return fail("noise must be within [0, 1]");
        }
        if self.weight_min < 0.0 || self.weight_min > self.weight_max {
            return fail("weight_min must be non-negative and not exceed weight_max");
        }
        if !(0.0..=1.0).contains(&self.spike_probability) {
            return fail("spike_probability must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.spike_share) {
            return fail("spike_share must be within [0, 1]");
        }
        if self.spike_min < 0.0 || self.spike_min > self.spike_max {
            return fail("spike_min must be non-negative and not exceed spike_max");
        }
        Ok(())
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

pub struct Generator {
    config: GeneratorConfig,
    catalog: Catalog,
}

impl Generator {
    pub fn new(config: GeneratorConfig, catalog: Catalog) -> Self {
        Generator { config, catalog }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Generate with a seeded `StdRng`; the same seed yields the same dataset.
    pub fn generate(&self, start: NaiveDate, end: NaiveDate, seed: u64) -> Result<Dataset> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dataset = self.generate_with(start, end, &mut rng)?;
        tracing::info!(
            %start, %end, seed,
            records = dataset.len(),
            "generated synthetic dataset"
        );
        Ok(dataset)
    }

    /// Generate one record per (date, category, manufacturer) in `[start, end]`
    /// drawing all randomness from `rng`.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        rng: &mut R,
    ) -> Result<Dataset> {
        if end < start {
            return Err(DashboardError::InvalidRange { start, end });
        }
        self.config.validate()?;
        self.catalog.validate()?;

        let cfg = &self.config;
        let series: Vec<(&CategoryProfile, &str)> = self
            .catalog
            .categories
            .iter()
            .flat_map(|p| p.manufacturers.iter().map(move |m| (p, m.as_str())))
            .collect();

        // Fixed base volume per series, drawn once in catalog order
        let bases: Vec<f64> = series
            .iter()
            .map(|(profile, _)| {
                let weight = rng.random_range(cfg.weight_min..=cfg.weight_max);
                cfg.base_volume * profile.scale * weight
            })
            .collect();

        let days = (end - start).num_days() as usize + 1;
        let mut records = Vec::with_capacity(days * series.len());
        let mut spikes = vec![1.0; series.len()];

        for date in start.iter_days().take(days) {
            self.draw_spikes(rng, &mut spikes);

            let growth = self.growth_factor(start, date);
            let calendar = self.calendar_factor(date);

            for (i, (profile, manufacturer)) in series.iter().enumerate() {
                let noise = rng.random_range((1.0 - cfg.noise)..=(1.0 + cfg.noise));
                let value = bases[i]
                    * growth
                    * seasonal_factor(profile, date)
                    * calendar
                    * noise
                    * spikes[i];

                records.push(RegistrationRecord::new(
                    date,
                    profile.category,
                    manufacturer,
                    value.round().max(0.0) as u64,
                ));
            }
        }

        Ok(Dataset::from_records(records))
    }

    /// Reset `spikes` to 1.0 and, on a spike day, give a random subset of
    /// series a multiplier above one.
    fn draw_spikes<R: Rng + ?Sized>(&self, rng: &mut R, spikes: &mut [f64]) {
        spikes.iter_mut().for_each(|s| *s = 1.0);

        let n = spikes.len();
        if n == 0 || !rng.random_bool(self.config.spike_probability) {
            return;
        }

        let max_hit = ((n as f64 * self.config.spike_share).ceil() as usize).clamp(1, n);
        let hit = rng.random_range(1..=max_hit);
        for i in rand::seq::index::sample(rng, n, hit) {
            spikes[i] = rng.random_range(self.config.spike_min..=self.config.spike_max);
        }
    }

    fn growth_factor(&self, start: NaiveDate, date: NaiveDate) -> f64 {
        let elapsed_years = (date - start).num_days() as f64 / DAYS_PER_YEAR;
        (1.0 + self.config.annual_growth).powf(elapsed_years)
    }

    fn calendar_factor(&self, date: NaiveDate) -> f64 {
        let quarter = (date.month0() / 3) as usize;
        let weekend = match date.weekday() {
            Weekday::Sat | Weekday::Sun => self.config.weekend_factor,
            _ => 1.0,
        };
        self.config.quarter_factors[quarter] * weekend
    }
}

fn seasonal_factor(profile: &CategoryProfile, date: NaiveDate) -> f64 {
    let angle = 2.0 * PI * (date.ordinal() as f64 - profile.seasonal_phase_days) / DAYS_PER_YEAR;
    1.0 + profile.seasonal_amplitude * angle.sin()
}
