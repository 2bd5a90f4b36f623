use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use registration_dashboard::{
    init_tracing, report, Category, DashboardConfig, DashboardError, Dataset, Granularity,
    MetricsEngine, MetricsQuery, Provenance,
};
use std::path::PathBuf;

/// Vehicle registration analytics: synthetic data, growth metrics and market share.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./dashboard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic registration dataset and write it as CSV.
    Generate(GenerateArgs),
    /// Print KPIs, growth series and market share for a query.
    Report(ReportArgs),
    /// Check a dataset for unknown manufacturers, duplicates and gaps.
    Validate(InputArgs),
    /// Open the interactive dashboard (default).
    Tui(InputArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// First day (format: YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day, inclusive (format: YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    seed: Option<u64>,

    /// Output CSV path (defaults to the configured synthetic file).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct InputArgs {
    /// Read this CSV instead of the configured sources.
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    #[command(flatten)]
    input: InputArgs,

    /// day, week, month, quarter or year.
    #[arg(short, long, default_value = "quarter")]
    granularity: Granularity,

    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    end: Option<NaiveDate>,

    /// Vehicle type to include (2W, 3W, 4W); repeatable.
    #[arg(long = "category")]
    categories: Vec<Category>,

    /// Manufacturer to include; repeatable.
    #[arg(long = "manufacturer")]
    manufacturers: Vec<String>,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The dashboard owns the terminal, so only warnings reach stderr there
    let interactive = matches!(cli.command, None | Some(Commands::Tui(_)));
    init_tracing(if interactive { "warn" } else { "info" });

    let cfg = DashboardConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::Generate(args)) => run_generate(&cfg, args),
        Some(Commands::Report(args)) => run_report(&cfg, args),
        Some(Commands::Validate(args)) => run_validate(&cfg, args),
        Some(Commands::Tui(args)) => run_ui_mode(&cfg, args),
        None => run_ui_mode(&cfg, InputArgs { input: None }),
    }
}

/// Read the given file, or go through the configured sources with generator fallback
fn load_dataset(cfg: &DashboardConfig, input: &InputArgs) -> Result<(Dataset, Provenance)> {
    match &input.input {
        Some(path) => {
            let dataset = Dataset::load_csv(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let provenance = Provenance::Source {
                name: path.display().to_string(),
            };
            Ok((dataset, provenance))
        }
        None => cfg.loader().load().context("Failed to load dataset"),
    }
}

fn run_generate(cfg: &DashboardConfig, args: GenerateArgs) -> Result<()> {
    let start = args.start.unwrap_or(cfg.start_date);
    let end = args.end.unwrap_or(cfg.end_date);
    let seed = args.seed.unwrap_or(cfg.seed);
    let output = args.output.unwrap_or_else(|| cfg.synthetic_path());

    println!("🎲 Generating registrations {} → {} (seed {})", start, end, seed);

    let dataset = cfg
        .generator()
        .generate(start, end, seed)
        .context("Failed to generate dataset")?;
    dataset
        .save_csv(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✓ Wrote {} records to {}", dataset.len(), output.display());
    println!("✓ Total registrations: {}", report::format_count(dataset.total()));
    println!("✓ Fingerprint: {}", dataset.fingerprint());

    Ok(())
}

fn build_query(args: &ReportArgs, dataset: &Dataset) -> MetricsQuery {
    let mut query = MetricsQuery::new(args.granularity);

    if args.start.is_some() || args.end.is_some() {
        if let Some((first, last)) = dataset.date_range() {
            query = query.with_date_range(args.start.unwrap_or(first), args.end.unwrap_or(last));
        }
    }
    if !args.categories.is_empty() {
        query = query.with_categories(args.categories.clone());
    }
    if !args.manufacturers.is_empty() {
        query = query.with_manufacturers(args.manufacturers.clone());
    }

    query
}

fn run_report(cfg: &DashboardConfig, args: ReportArgs) -> Result<()> {
    let (dataset, provenance) = load_dataset(cfg, &args.input)?;
    let query = build_query(&args, &dataset);

    let metrics = match MetricsEngine::new(&dataset).run(&query) {
        Ok(metrics) => metrics,
        Err(e) if e.is_user_error() => {
            eprintln!("⚠️  {}", e);
            eprintln!("   {}", corrective_hint(&e));
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Failed to compute metrics"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    println!("📊 Vehicle registrations ({}, {} records)\n", provenance, dataset.len());
    print!("{}", report::render(&metrics));

    Ok(())
}

fn corrective_hint(err: &DashboardError) -> &'static str {
    match err {
        DashboardError::EmptyResult => "Widen the date range or drop a --category/--manufacturer filter.",
        DashboardError::InvalidRange { .. } => "--end must not precede --start.",
        _ => "Check the query arguments.",
    }
}

fn run_validate(cfg: &DashboardConfig, args: InputArgs) -> Result<()> {
    let (dataset, provenance) = load_dataset(cfg, &args)?;

    println!("🔍 Validating {} records ({})", dataset.len(), provenance);
    let issues = dataset.check_invariants(&cfg.catalog);

    if issues.is_empty() {
        println!("✅ No issues: one record per day, category and manufacturer");
        return Ok(());
    }

    for issue in issues.iter().take(50) {
        println!("  ✗ {}", issue);
    }
    if issues.len() > 50 {
        println!("  ... and {} more", issues.len() - 50);
    }
    println!("\n❌ {} issue(s) found", issues.len());
    std::process::exit(1);
}

#[cfg(feature = "tui")]
fn run_ui_mode(cfg: &DashboardConfig, args: InputArgs) -> Result<()> {
    use registration_dashboard::ui;

    println!("🖥️  Loading Vehicle Registration Dashboard...\n");
    let (dataset, provenance) = load_dataset(cfg, &args)?;

    println!("✓ Loaded {} records ({})\n", dataset.len(), provenance);
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(dataset, provenance);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_cfg: &DashboardConfig, _args: InputArgs) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the report command: registration-dashboard report");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_report_filters() {
        let cli = Cli::try_parse_from([
            "registration-dashboard",
            "report",
            "--granularity",
            "month",
            "--category",
            "2W",
            "--category",
            "4w",
            "--manufacturer",
            "Hero",
            "--json",
        ])
        .unwrap();

        let Some(Commands::Report(args)) = cli.command else {
            panic!("expected report command");
        };
        assert_eq!(args.granularity, Granularity::Month);
        assert_eq!(args.categories, vec![Category::TwoWheeler, Category::FourWheeler]);
        assert_eq!(args.manufacturers, vec!["Hero".to_string()]);
        assert!(args.json);
    }

    #[test]
    fn test_no_subcommand_means_dashboard() {
        let cli = Cli::try_parse_from(["registration-dashboard", "--config", "x.toml"]).unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_unknown_granularity_is_rejected() {
        let result = Cli::try_parse_from(["registration-dashboard", "report", "-g", "fortnight"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_one_sided_range_uses_dataset_bounds() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let dataset = Dataset::from_records(vec![
            registration_dashboard::RegistrationRecord::new(day(2020, 1, 1), Category::TwoWheeler, "Hero", 1),
            registration_dashboard::RegistrationRecord::new(day(2020, 6, 30), Category::TwoWheeler, "Hero", 1),
        ]);
        let cli = Cli::try_parse_from(["registration-dashboard", "report", "--start", "2020-03-01"]).unwrap();
        let Some(Commands::Report(args)) = cli.command else {
            panic!("expected report command");
        };

        let query = build_query(&args, &dataset);
        assert_eq!(query.date_range, Some((day(2020, 3, 1), day(2020, 6, 30))));
    }
}
