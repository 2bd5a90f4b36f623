// Metrics Engine
//
// Pure functions of (dataset, query): period aggregation on a zero-filled
// period axis, year-over-year and period-over-period growth, manufacturer
// market share within each category, and headline KPIs.

use crate::catalog::Category;
use crate::dataset::{Dataset, RegistrationRecord};
use crate::error::{DashboardError, Result};
use crate::period::{Granularity, Period};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// QUERY
// ============================================================================

/// Filters and granularity for one metrics computation. `None` or an empty
/// list means "no filter" for that dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsQuery {
    pub granularity: Granularity,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub categories: Option<Vec<Category>>,
    pub manufacturers: Option<Vec<String>>,
}

impl Default for MetricsQuery {
    fn default() -> Self {
        MetricsQuery::new(Granularity::Quarter)
    }
}

impl MetricsQuery {
    pub fn new(granularity: Granularity) -> Self {
        MetricsQuery {
            granularity,
            date_range: None,
            categories: None,
            manufacturers: None,
        }
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_manufacturers(mut self, manufacturers: Vec<String>) -> Self {
        self.manufacturers = Some(manufacturers);
        self
    }

    pub fn matches(&self, record: &RegistrationRecord) -> bool {
        if let Some((start, end)) = self.date_range {
            if record.date < start || record.date > end {
                return false;
            }
        }

        if let Some(categories) = self.categories.as_ref().filter(|c| !c.is_empty()) {
            if !categories.contains(&record.category) {
                return false;
            }
        }

        if let Some(manufacturers) = self.manufacturers.as_ref().filter(|m| !m.is_empty()) {
            if !manufacturers
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(&record.manufacturer))
            {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesKey {
    Total,
    Category {
        category: Category,
    },
    Manufacturer {
        category: Category,
        manufacturer: String,
    },
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Total => f.write_str("Total"),
            SeriesKey::Category { category } => f.write_str(category.label()),
            SeriesKey::Manufacturer { category, manufacturer } => {
                write!(f, "{} ({})", manufacturer, category)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: Period,
    pub total: u64,
    /// Growth against the bucket one year earlier, as a fraction
    pub yoy_growth: Option<f64>,
    /// Growth against the immediately preceding bucket (QoQ for quarters)
    pub pop_growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: SeriesKey,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn total(&self) -> u64 {
        saturating_sum(self.points.iter().map(|p| p.total))
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn point(&self, period: &Period) -> Option<&SeriesPoint> {
        self.points.iter().find(|p| &p.period == period)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareRow {
    pub period: Period,
    pub category: Category,
    pub manufacturer: String,
    pub total: u64,
    /// Fraction of the category total; `None` when the category is empty
    pub share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub name: String,
    pub total: u64,
    /// Fraction of the leader's comparison base
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_registrations: u64,
    pub latest_period: Option<Period>,
    pub latest_yoy_growth: Option<f64>,
    /// Category with the most registrations, share of all registrations
    pub top_category: Option<Leader>,
    /// Manufacturer with the most registrations, share of its category
    pub top_manufacturer: Option<Leader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub query: MetricsQuery,
    pub periods: Vec<Period>,
    pub total: Series,
    pub by_category: Vec<Series>,
    pub by_manufacturer: Vec<Series>,
    pub market_share: Vec<ShareRow>,
    pub kpis: Kpis,
}

impl MetricsReport {
    pub fn category_series(&self, category: Category) -> Option<&Series> {
        self.by_category
            .iter()
            .find(|s| s.key == SeriesKey::Category { category })
    }

    pub fn shares_for(&self, period: &Period) -> Vec<&ShareRow> {
        self.market_share
            .iter()
            .filter(|row| &row.period == period)
            .collect()
    }
}

/// (current - prior) / prior, or `None` when there is no positive prior value
pub fn growth_rate(current: u64, prior: Option<u64>) -> Option<f64> {
    match prior {
        Some(prior) if prior > 0 => Some((current as f64 - prior as f64) / prior as f64),
        _ => None,
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct MetricsEngine<'a> {
    dataset: &'a Dataset,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        MetricsEngine { dataset }
    }

    /// Records passing the query's filters, in dataset order
    pub fn filter(&self, query: &MetricsQuery) -> Vec<&'a RegistrationRecord> {
        self.dataset
            .records()
            .iter()
            .filter(|r| query.matches(r))
            .collect()
    }

    pub fn run(&self, query: &MetricsQuery) -> Result<MetricsReport> {
        if let Some((start, end)) = query.date_range {
            if end < start {
                return Err(DashboardError::InvalidRange { start, end });
            }
        }

        let records = self.filter(query);
        if records.is_empty() {
            return Err(DashboardError::EmptyResult);
        }

        // The axis covers the query range clipped to the data's first and last day
        let Some((first, last)) = self.dataset.date_range() else {
            return Err(DashboardError::EmptyResult);
        };
        let (start, end) = match query.date_range {
            Some((start, end)) => (start.max(first), end.min(last)),
            None => (first, last),
        };

        let granularity = query.granularity;
        let periods = Period::span(granularity, start, end);
        let index: HashMap<Period, usize> =
            periods.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        tracing::debug!(
            %granularity,
            records = records.len(),
            periods = periods.len(),
            "computing metrics"
        );

        // Zero-filled totals per (category, manufacturer)
        let mut manufacturer_totals: BTreeMap<(Category, &str), Vec<u64>> = BTreeMap::new();
        for r in &records {
            let Some(&i) = index.get(&Period::containing(granularity, r.date)) else {
                continue;
            };
            let slot = &mut manufacturer_totals
                .entry((r.category, r.manufacturer.as_str()))
                .or_insert_with(|| vec![0; periods.len()])[i];
            *slot = slot.saturating_add(r.count);
        }

        let mut category_totals: BTreeMap<Category, Vec<u64>> = BTreeMap::new();
        for ((category, _), values) in &manufacturer_totals {
            let sums = category_totals
                .entry(*category)
                .or_insert_with(|| vec![0; periods.len()]);
            add_into(sums, values);
        }

        let mut overall = vec![0; periods.len()];
        for values in category_totals.values() {
            add_into(&mut overall, values);
        }

        let total = build_series(SeriesKey::Total, &overall, &periods, &index);
        let by_category = category_totals
            .iter()
            .map(|(category, values)| {
                build_series(SeriesKey::Category { category: *category }, values, &periods, &index)
            })
            .collect();
        let by_manufacturer = manufacturer_totals
            .iter()
            .map(|((category, manufacturer), values)| {
                let key = SeriesKey::Manufacturer {
                    category: *category,
                    manufacturer: manufacturer.to_string(),
                };
                build_series(key, values, &periods, &index)
            })
            .collect();

        let market_share = market_share(&periods, &manufacturer_totals, &category_totals);
        let kpis = key_metrics(&total, &manufacturer_totals, &category_totals);

        Ok(MetricsReport {
            query: query.clone(),
            periods,
            total,
            by_category,
            by_manufacturer,
            market_share,
            kpis,
        })
    }
}

/// Sum of registration counts, pinned at `u64::MAX` instead of overflowing
pub fn saturating_sum(counts: impl IntoIterator<Item = u64>) -> u64 {
    counts.into_iter().fold(0, u64::saturating_add)
}

fn add_into(sums: &mut [u64], values: &[u64]) {
    for (sum, value) in sums.iter_mut().zip(values) {
        *sum = sum.saturating_add(*value);
    }
}

fn build_series(
    key: SeriesKey,
    values: &[u64],
    periods: &[Period],
    index: &HashMap<Period, usize>,
) -> Series {
    let prior = |period: Period| index.get(&period).map(|&j| values[j]);

    let points = periods
        .iter()
        .zip(values)
        .map(|(period, &total)| SeriesPoint {
            period: *period,
            total,
            yoy_growth: growth_rate(total, period.year_ago().and_then(|p| prior(p))),
            pop_growth: growth_rate(total, period.previous().and_then(|p| prior(p))),
        })
        .collect();

    Series { key, points }
}

fn market_share(
    periods: &[Period],
    manufacturer_totals: &BTreeMap<(Category, &str), Vec<u64>>,
    category_totals: &BTreeMap<Category, Vec<u64>>,
) -> Vec<ShareRow> {
    let mut rows = Vec::with_capacity(periods.len() * manufacturer_totals.len());

    for (i, period) in periods.iter().enumerate() {
        for ((category, manufacturer), values) in manufacturer_totals {
            let category_total = category_totals.get(category).map_or(0, |v| v[i]);
            let share = if category_total > 0 {
                Some(values[i] as f64 / category_total as f64)
            } else {
                None
            };

            rows.push(ShareRow {
                period: *period,
                category: *category,
                manufacturer: manufacturer.to_string(),
                total: values[i],
                share,
            });
        }
    }

    rows
}

fn key_metrics(
    total: &Series,
    manufacturer_totals: &BTreeMap<(Category, &str), Vec<u64>>,
    category_totals: &BTreeMap<Category, Vec<u64>>,
) -> Kpis {
    let grand_total = total.total();
    let fraction = |part: u64, whole: u64| {
        if whole > 0 {
            part as f64 / whole as f64
        } else {
            0.0
        }
    };

    let category_sums: Vec<(Category, u64)> = category_totals
        .iter()
        .map(|(c, v)| (*c, saturating_sum(v.iter().copied())))
        .collect();

    let top_category = first_max(&category_sums).map(|(category, sum)| Leader {
        name: category.label().to_string(),
        total: sum,
        share: fraction(sum, grand_total),
    });

    let manufacturer_sums: Vec<((Category, &str), u64)> = manufacturer_totals
        .iter()
        .map(|(k, v)| (*k, saturating_sum(v.iter().copied())))
        .collect();

    let top_manufacturer = first_max(&manufacturer_sums).map(|((category, manufacturer), sum)| {
        let category_total = category_sums
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(0, |(_, s)| *s);
        Leader {
            name: format!("{} ({})", manufacturer, category),
            total: sum,
            share: fraction(sum, category_total),
        }
    });

    let latest = total.latest();

    Kpis {
        total_registrations: grand_total,
        latest_period: latest.map(|p| p.period),
        latest_yoy_growth: latest.and_then(|p| p.yoy_growth),
        top_category,
        top_manufacturer,
    }
}

/// Largest entry by value; the earliest wins ties.
fn first_max<K: Copy>(entries: &[(K, u64)]) -> Option<(K, u64)> {
    entries.iter().fold(None, |best, &(key, value)| match best {
        Some((_, best_value)) if best_value >= value => best,
        _ => Some((key, value)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CategoryProfile};
    use crate::generator::{Generator, GeneratorConfig};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(date: NaiveDate, category: Category, manufacturer: &str, count: u64) -> RegistrationRecord {
        RegistrationRecord::new(date, category, manufacturer, count)
    }

    fn yearly_dataset() -> Dataset {
        Dataset::from_records(vec![
            rec(day(2020, 6, 1), Category::TwoWheeler, "Hero", 60),
            rec(day(2020, 6, 1), Category::TwoWheeler, "TVS", 40),
            rec(day(2021, 6, 1), Category::TwoWheeler, "Hero", 90),
            rec(day(2021, 6, 1), Category::TwoWheeler, "TVS", 60),
            rec(day(2021, 6, 1), Category::FourWheeler, "Kia", 50),
        ])
    }

    #[test]
    fn test_day_aggregation_of_two_manufacturers() {
        let catalog = Catalog::new(vec![CategoryProfile::new(Category::TwoWheeler, &["A", "B"])]);
        let dataset = Generator::new(GeneratorConfig::default(), catalog)
            .generate(day(2020, 1, 1), day(2020, 1, 2), 42)
            .unwrap();
        assert_eq!(dataset.len(), 4);

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Day))
            .unwrap();

        assert_eq!(report.periods.len(), 2);
        assert_eq!(report.total.points.len(), 2);
        for point in &report.total.points {
            let expected: u64 = dataset
                .records()
                .iter()
                .filter(|r| r.date == point.period.start)
                .map(|r| r.count)
                .sum();
            assert_eq!(point.total, expected);
        }
    }

    #[test]
    fn test_day_granularity_reproduces_record_counts() {
        let dataset = Generator::new(GeneratorConfig::default(), Catalog::default())
            .generate(day(2021, 1, 1), day(2021, 2, 28), 5)
            .unwrap();

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Day))
            .unwrap();

        let mut cells = 0;
        for series in &report.by_manufacturer {
            let SeriesKey::Manufacturer { category, manufacturer } = &series.key else {
                panic!("unexpected key {:?}", series.key);
            };
            for point in &series.points {
                let record = dataset
                    .records()
                    .iter()
                    .find(|r| {
                        r.date == point.period.start
                            && r.category == *category
                            && &r.manufacturer == manufacturer
                    })
                    .unwrap();
                assert_eq!(point.total, record.count);
                cells += 1;
            }
        }
        assert_eq!(cells, dataset.len());
        assert_eq!(report.total.total(), dataset.total());
    }

    #[test]
    fn test_empty_buckets_are_zero_filled() {
        let dataset = Dataset::from_records(vec![
            rec(day(2021, 1, 10), Category::ThreeWheeler, "Atul", 5),
            rec(day(2021, 3, 10), Category::ThreeWheeler, "Atul", 7),
        ]);

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Month))
            .unwrap();

        let totals: Vec<(String, u64)> = report
            .total
            .points
            .iter()
            .map(|p| (p.period.label(), p.total))
            .collect();
        assert_eq!(
            totals,
            vec![
                ("2021-01".to_string(), 5),
                ("2021-02".to_string(), 0),
                ("2021-03".to_string(), 7),
            ]
        );
        // March follows an empty month, so there is no growth figure
        assert_eq!(report.total.points[2].pop_growth, None);
    }

    #[test]
    fn test_query_range_is_clipped_to_data() {
        let dataset = yearly_dataset();
        let query = MetricsQuery::new(Granularity::Quarter).with_date_range(day(2021, 1, 1), day(2021, 12, 31));

        let report = MetricsEngine::new(&dataset).run(&query).unwrap();

        // The data ends on 2021-06-01
        let labels: Vec<String> = report.periods.iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["2021-Q1", "2021-Q2"]);
        assert_eq!(report.total.total(), 200);
        // 2020 is outside the range, so no YoY comparison exists
        assert!(report.total.points.iter().all(|p| p.yoy_growth.is_none()));
    }

    #[test]
    fn test_yoy_growth() {
        let report = MetricsEngine::new(&yearly_dataset())
            .run(&MetricsQuery::new(Granularity::Year))
            .unwrap();

        assert_eq!(report.total.points[0].yoy_growth, None);
        assert_eq!(report.total.points[1].yoy_growth, Some(1.0));
        assert_eq!(report.total.points[1].pop_growth, Some(1.0));

        let two_wheeler = report.category_series(Category::TwoWheeler).unwrap();
        assert_eq!(two_wheeler.points[1].yoy_growth, Some(0.5));

        // Kia has no 2020 registrations: zero prior, growth undefined
        let kia = report
            .by_manufacturer
            .iter()
            .find(|s| s.key.to_string() == "Kia (4W)")
            .unwrap();
        assert_eq!(kia.points[0].total, 0);
        assert_eq!(kia.points[1].yoy_growth, None);
    }

    #[test]
    fn test_qoq_growth_crosses_year_boundary() {
        let dataset = Dataset::from_records(vec![
            rec(day(2020, 11, 1), Category::FourWheeler, "MG", 200),
            rec(day(2021, 2, 1), Category::FourWheeler, "MG", 150),
            rec(day(2021, 5, 1), Category::FourWheeler, "MG", 300),
        ]);

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Quarter))
            .unwrap();

        let pop: Vec<Option<f64>> = report.total.points.iter().map(|p| p.pop_growth).collect();
        assert_eq!(pop, vec![None, Some(-0.25), Some(1.0)]);
    }

    #[test]
    fn test_growth_never_infinite_or_nan() {
        assert_eq!(growth_rate(10, Some(0)), None);
        assert_eq!(growth_rate(0, Some(0)), None);
        assert_eq!(growth_rate(10, None), None);
        assert_eq!(growth_rate(0, Some(4)), Some(-1.0));

        let dataset = Generator::new(GeneratorConfig::default(), Catalog::default())
            .generate(day(2020, 1, 1), day(2021, 12, 31), 3)
            .unwrap();
        for granularity in Granularity::ALL {
            let report = MetricsEngine::new(&dataset)
                .run(&MetricsQuery::new(granularity))
                .unwrap();
            for series in report.by_manufacturer.iter().chain(&report.by_category) {
                for p in &series.points {
                    for g in [p.yoy_growth, p.pop_growth].into_iter().flatten() {
                        assert!(g.is_finite());
                    }
                }
            }
        }
    }

    #[test]
    fn test_market_share_sums_to_one_per_category() {
        let dataset = Generator::new(GeneratorConfig::default(), Catalog::default())
            .generate(day(2022, 1, 1), day(2022, 6, 30), 17)
            .unwrap();

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Month))
            .unwrap();

        for period in &report.periods {
            for category in Category::ALL {
                let sum: f64 = report
                    .shares_for(period)
                    .iter()
                    .filter(|row| row.category == category)
                    .filter_map(|row| row.share)
                    .sum();
                assert!((sum - 1.0).abs() < 1e-9, "{} {}: {}", period, category, sum);
            }
        }
    }

    #[test]
    fn test_market_share_undefined_for_empty_category_period() {
        let dataset = Dataset::from_records(vec![
            rec(day(2021, 1, 1), Category::TwoWheeler, "Hero", 0),
            rec(day(2021, 1, 1), Category::TwoWheeler, "TVS", 0),
            rec(day(2021, 1, 2), Category::TwoWheeler, "Hero", 3),
            rec(day(2021, 1, 2), Category::TwoWheeler, "TVS", 1),
        ]);

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Day))
            .unwrap();

        let first = report.shares_for(&report.periods[0]);
        assert!(first.iter().all(|row| row.share.is_none()));

        let second = report.shares_for(&report.periods[1]);
        let hero = second.iter().find(|row| row.manufacturer == "Hero").unwrap();
        assert_eq!(hero.share, Some(0.75));
    }

    #[test]
    fn test_all_zero_periods_are_not_empty_result() {
        let dataset = Dataset::from_records(vec![rec(day(2021, 1, 1), Category::TwoWheeler, "Hero", 0)]);

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Day))
            .unwrap();

        assert_eq!(report.kpis.total_registrations, 0);
        assert_eq!(report.total.points.len(), 1);
    }

    #[test]
    fn test_filters_that_exclude_everything_are_empty_result() {
        let dataset = yearly_dataset();
        let engine = MetricsEngine::new(&dataset);

        let by_category = MetricsQuery::new(Granularity::Year).with_categories(vec![Category::ThreeWheeler]);
        assert!(matches!(engine.run(&by_category), Err(DashboardError::EmptyResult)));

        let by_manufacturer =
            MetricsQuery::new(Granularity::Year).with_manufacturers(vec!["Tesla".to_string()]);
        assert!(matches!(engine.run(&by_manufacturer), Err(DashboardError::EmptyResult)));

        let by_range = MetricsQuery::new(Granularity::Year).with_date_range(day(2019, 1, 1), day(2019, 12, 31));
        assert!(matches!(engine.run(&by_range), Err(DashboardError::EmptyResult)));

        let empty = Dataset::default();
        assert!(matches!(
            MetricsEngine::new(&empty).run(&MetricsQuery::default()),
            Err(DashboardError::EmptyResult)
        ));
    }

    #[test]
    fn test_reversed_query_range_is_invalid() {
        let dataset = yearly_dataset();
        let query = MetricsQuery::new(Granularity::Month).with_date_range(day(2021, 2, 1), day(2021, 1, 1));

        assert!(matches!(
            MetricsEngine::new(&dataset).run(&query),
            Err(DashboardError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_empty_filter_lists_mean_all() {
        let dataset = yearly_dataset();
        let query = MetricsQuery::new(Granularity::Year)
            .with_categories(vec![])
            .with_manufacturers(vec![]);

        let report = MetricsEngine::new(&dataset).run(&query).unwrap();
        assert_eq!(report.total.total(), dataset.total());
    }

    #[test]
    fn test_manufacturer_filter_is_case_insensitive_and_rescopes_share() {
        let dataset = yearly_dataset();
        let query = MetricsQuery::new(Granularity::Year)
            .with_manufacturers(vec!["hero".to_string(), "KIA".to_string()]);

        let report = MetricsEngine::new(&dataset).run(&query).unwrap();

        assert_eq!(report.by_manufacturer.len(), 2);
        assert_eq!(report.total.total(), 200);
        let hero_2021 = report
            .market_share
            .iter()
            .find(|row| row.manufacturer == "Hero" && row.period.label() == "2021")
            .unwrap();
        assert_eq!(hero_2021.share, Some(1.0));
    }

    #[test]
    fn test_kpis() {
        let report = MetricsEngine::new(&yearly_dataset())
            .run(&MetricsQuery::new(Granularity::Year))
            .unwrap();
        let kpis = &report.kpis;

        assert_eq!(kpis.total_registrations, 300);
        assert_eq!(kpis.latest_period.map(|p| p.label()), Some("2021".to_string()));
        assert_eq!(kpis.latest_yoy_growth, Some(1.0));

        let top_category = kpis.top_category.as_ref().unwrap();
        assert_eq!(top_category.name, "Two-wheeler");
        assert_eq!(top_category.total, 250);
        assert!((top_category.share - 250.0 / 300.0).abs() < 1e-12);

        let top_manufacturer = kpis.top_manufacturer.as_ref().unwrap();
        assert_eq!(top_manufacturer.name, "Hero (2W)");
        assert_eq!(top_manufacturer.total, 150);
        assert!((top_manufacturer.share - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = MetricsEngine::new(&yearly_dataset())
            .run(&MetricsQuery::new(Granularity::Year))
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total"]["key"]["kind"], "total");
        assert_eq!(json["by_category"][0]["key"]["category"], "2W");
        assert_eq!(json["periods"][1]["label"], "2021");
        assert!(json["total"]["points"][0]["yoy_growth"].is_null());
    }

    #[test]
    fn test_unbounded_query_range_stays_within_data() {
        let dataset = Dataset::from_records(vec![rec(day(2021, 3, 1), Category::TwoWheeler, "Hero", 10)]);
        let query = MetricsQuery::new(Granularity::Day).with_date_range(day(1, 1, 1), day(9999, 12, 31));

        let report = MetricsEngine::new(&dataset).run(&query).unwrap();

        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.market_share.len(), 1);
        assert_eq!(report.total.total(), 10);
    }

    #[test]
    fn test_records_at_calendar_edge() {
        let dataset = Dataset::from_records(vec![rec(NaiveDate::MAX, Category::TwoWheeler, "Hero", 3)]);

        for granularity in Granularity::ALL {
            let report = MetricsEngine::new(&dataset).run(&MetricsQuery::new(granularity)).unwrap();
            assert_eq!(report.periods.len(), 1);
            assert_eq!(report.total.points[0].yoy_growth, None);
        }
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let dataset = Dataset::from_records(vec![
            rec(day(2021, 1, 1), Category::TwoWheeler, "Hero", u64::MAX),
            rec(day(2021, 1, 1), Category::TwoWheeler, "TVS", 5),
            rec(day(2021, 1, 1), Category::FourWheeler, "Kia", 5),
        ]);

        let report = MetricsEngine::new(&dataset)
            .run(&MetricsQuery::new(Granularity::Year))
            .unwrap();

        assert_eq!(report.total.total(), u64::MAX);
        assert_eq!(report.kpis.total_registrations, u64::MAX);
        assert_eq!(dataset.total(), u64::MAX);
    }
}
