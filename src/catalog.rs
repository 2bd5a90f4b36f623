// Vehicle categories and the fixed manufacturer set of each one.
//
// A CategoryProfile also carries the generator knobs that vary by category
// (volume scale and seasonal shape), so a single list in the configuration
// describes both what exists and how it behaves.

use crate::error::DashboardError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "2W", alias = "two-wheeler")]
    TwoWheeler,
    #[serde(rename = "3W", alias = "three-wheeler")]
    ThreeWheeler,
    #[serde(rename = "4W", alias = "four-wheeler")]
    FourWheeler,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::TwoWheeler,
        Category::ThreeWheeler,
        Category::FourWheeler,
    ];

    /// Short code used in the CSV interchange format
    pub fn code(&self) -> &'static str {
        match self {
            Category::TwoWheeler => "2W",
            Category::ThreeWheeler => "3W",
            Category::FourWheeler => "4W",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::TwoWheeler => "Two-wheeler",
            Category::ThreeWheeler => "Three-wheeler",
            Category::FourWheeler => "Four-wheeler",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2w" | "two-wheeler" | "twowheeler" => Ok(Category::TwoWheeler),
            "3w" | "three-wheeler" | "threewheeler" => Ok(Category::ThreeWheeler),
            "4w" | "four-wheeler" | "fourwheeler" => Ok(Category::FourWheeler),
            _ => Err(DashboardError::UnknownCategory(s.to_string())),
        }
    }
}

// ============================================================================
// CATEGORY PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub category: Category,

    /// Manufacturers registered under this category, in generation order
    pub manufacturers: Vec<String>,

    /// Volume multiplier relative to the generator's base volume
    pub scale: f64,

    /// Seasonal amplitude as a fraction of the base (0.5 = ±50%)
    pub seasonal_amplitude: f64,

    /// Day-of-year offset of the seasonal sine wave
    pub seasonal_phase_days: f64,
}

impl CategoryProfile {
    pub fn new(category: Category, manufacturers: &[&str]) -> Self {
        CategoryProfile {
            category,
            manufacturers: manufacturers.iter().map(|m| m.to_string()).collect(),
            scale: 1.0,
            seasonal_amplitude: 0.5,
            seasonal_phase_days: 0.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_seasonality(mut self, amplitude: f64, phase_days: f64) -> Self {
        self.seasonal_amplitude = amplitude;
        self.seasonal_phase_days = phase_days;
        self
    }

    pub fn has_manufacturer(&self, manufacturer: &str) -> bool {
        self.manufacturers.iter().any(|m| m == manufacturer)
    }
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<CategoryProfile>,
}

impl Catalog {
    pub fn new(categories: Vec<CategoryProfile>) -> Self {
        Catalog { categories }
    }

    pub fn profile(&self, category: Category) -> Option<&CategoryProfile> {
        self.categories.iter().find(|p| p.category == category)
    }

    pub fn contains(&self, category: Category, manufacturer: &str) -> bool {
        self.profile(category)
            .map_or(false, |p| p.has_manufacturer(manufacturer))
    }

    /// All (category, manufacturer) pairs in generation order
    pub fn series(&self) -> Vec<(Category, &str)> {
        self.categories
            .iter()
            .flat_map(|p| p.manufacturers.iter().map(move |m| (p.category, m.as_str())))
            .collect()
    }

    pub fn series_count(&self) -> usize {
        self.categories.iter().map(|p| p.manufacturers.len()).sum()
    }

    /// Each category listed once with a non-empty, duplicate-free manufacturer
    /// list, so every (category, manufacturer) pair names exactly one series.
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.categories.is_empty() {
            return Err(DashboardError::InvalidConfig(
                "catalog must define at least one category".to_string(),
            ));
        }

        let mut categories = HashSet::new();
        for profile in &self.categories {
            if !categories.insert(profile.category) {
                return Err(DashboardError::InvalidConfig(format!(
                    "category {} is listed more than once",
                    profile.category
                )));
            }
            if profile.manufacturers.is_empty() {
                return Err(DashboardError::InvalidConfig(format!(
                    "category {} has no manufacturers",
                    profile.category
                )));
            }
            if !profile.scale.is_finite()
                || profile.scale < 0.0
                || !profile.seasonal_amplitude.is_finite()
                || !profile.seasonal_phase_days.is_finite()
            {
                return Err(DashboardError::InvalidConfig(format!(
                    "category {} needs a finite non-negative scale and finite seasonality",
                    profile.category
                )));
            }

            let mut names = HashSet::new();
            for manufacturer in &profile.manufacturers {
                if !names.insert(manufacturer.as_str()) {
                    return Err(DashboardError::InvalidConfig(format!(
                        "manufacturer '{}' is listed more than once under {}",
                        manufacturer, profile.category
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Catalog {
    /// Indian market manufacturers per segment, with two-wheelers dominating
    /// volume and three-wheelers the smallest segment.
    fn default() -> Self {
        Catalog::new(vec![
            CategoryProfile::new(
                Category::TwoWheeler,
                &[
                    "Hero",
                    "Honda",
                    "TVS",
                    "Bajaj",
                    "Royal Enfield",
                    "Yamaha",
                    "Suzuki",
                    "Ola Electric",
                    "Ather",
                ],
            )
            .with_scale(5.0)
            .with_seasonality(0.5, 0.0),
            CategoryProfile::new(
                Category::ThreeWheeler,
                &["Bajaj", "Piaggio", "Mahindra", "TVS", "Atul", "Kinetic"],
            )
            .with_scale(0.5)
            .with_seasonality(0.3, 30.0),
            CategoryProfile::new(
                Category::FourWheeler,
                &[
                    "Maruti Suzuki",
                    "Hyundai",
                    "Tata Motors",
                    "Mahindra",
                    "Kia",
                    "Toyota",
                    "Honda",
                    "MG",
                    "Skoda",
                    "Volkswagen",
                ],
            )
            .with_scale(1.0)
            .with_seasonality(0.4, 60.0),
        ])
    }
}
