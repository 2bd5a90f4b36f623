// Plain-terminal rendering of a MetricsReport for the `report` command

use crate::metrics::{MetricsReport, Series};
use crate::period::{Granularity, Period};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};

/// "+12.3%", "-4.0%" or "n/a"
pub fn format_growth(growth: Option<f64>) -> String {
    match growth {
        Some(g) => format!("{:+.1}%", g * 100.0),
        None => "n/a".to_string(),
    }
}

pub fn format_share(share: Option<f64>) -> String {
    match share {
        Some(s) => format!("{:.1}%", s * 100.0),
        None => "n/a".to_string(),
    }
}

/// Thousands-separated count, e.g. 1,234,567
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Column header for period-over-period growth at this granularity
pub fn pop_label(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Day => "DoD",
        Granularity::Week => "WoW",
        Granularity::Month => "MoM",
        Granularity::Quarter => "QoQ",
        Granularity::Year => "YoY",
    }
}

fn growth_cell(growth: Option<f64>) -> Cell {
    let cell = Cell::new(format_growth(growth)).set_alignment(CellAlignment::Right);
    match growth {
        Some(g) if g >= 0.0 => cell.fg(Color::Green),
        Some(_) => cell.fg(Color::Red),
        None => cell.fg(Color::DarkGrey),
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn kpi_table(report: &MetricsReport) -> Table {
    let kpis = &report.kpis;
    let mut table = new_table(vec!["Metric", "Value"]);

    table.add_row(vec![
        Cell::new("Total registrations"),
        Cell::new(format_count(kpis.total_registrations)),
    ]);
    table.add_row(vec![
        Cell::new(format!(
            "YoY growth ({})",
            kpis.latest_period.map(|p| p.label()).unwrap_or_default()
        )),
        growth_cell(kpis.latest_yoy_growth),
    ]);
    if let Some(leader) = &kpis.top_category {
        table.add_row(vec![
            Cell::new("Top vehicle type"),
            Cell::new(format!("{} ({:.1}% of total)", leader.name, leader.share * 100.0)),
        ]);
    }
    if let Some(leader) = &kpis.top_manufacturer {
        table.add_row(vec![
            Cell::new("Top manufacturer"),
            Cell::new(format!("{} ({:.1}% of segment)", leader.name, leader.share * 100.0)),
        ]);
    }

    table
}

pub fn series_table(series: &Series, granularity: Granularity) -> Table {
    let mut table = new_table(vec!["Period", "Registrations", "YoY", pop_label(granularity)]);

    for point in &series.points {
        table.add_row(vec![
            Cell::new(point.period.label()),
            Cell::new(format_count(point.total)).set_alignment(CellAlignment::Right),
            growth_cell(point.yoy_growth),
            growth_cell(point.pop_growth),
        ]);
    }

    table
}

/// One column per category, one row per period
pub fn category_table(report: &MetricsReport) -> Table {
    let mut header = vec!["Period".to_string()];
    for series in &report.by_category {
        header.push(series.key.to_string());
        header.push(format!("{} YoY", series.key));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for (i, period) in report.periods.iter().enumerate() {
        let mut row = vec![Cell::new(period.label())];
        for series in &report.by_category {
            let point = &series.points[i];
            row.push(Cell::new(format_count(point.total)).set_alignment(CellAlignment::Right));
            row.push(growth_cell(point.yoy_growth));
        }
        table.add_row(row);
    }

    table
}

/// Manufacturer shares for one period, largest first within each category
pub fn share_table(report: &MetricsReport, period: &Period) -> Table {
    let mut rows = report.shares_for(period);
    rows.sort_by(|a, b| a.category.cmp(&b.category).then(b.total.cmp(&a.total)));

    let mut table = new_table(vec!["Category", "Manufacturer", "Registrations", "Share"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.category.code()),
            Cell::new(&row.manufacturer),
            Cell::new(format_count(row.total)).set_alignment(CellAlignment::Right),
            Cell::new(format_share(row.share)).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

/// Full text report: KPIs, total series, categories, latest-period shares
pub fn render(report: &MetricsReport) -> String {
    let granularity = report.query.granularity;
    let mut out = String::new();

    out.push_str("Key metrics\n");
    out.push_str(&kpi_table(report).to_string());
    out.push_str(&format!("\n\nTotal registrations by {}\n", granularity));
    out.push_str(&series_table(&report.total, granularity).to_string());
    out.push_str("\n\nRegistrations by vehicle type\n");
    out.push_str(&category_table(report).to_string());

    if let Some(latest) = report.periods.last() {
        out.push_str(&format!("\n\nMarket share, {}\n", latest));
        out.push_str(&share_table(report, latest).to_string());
    }
    out.push('\n');
    out
}
