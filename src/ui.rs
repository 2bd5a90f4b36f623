use crate::catalog::Category;
use crate::dataset::Dataset;
use crate::error::DashboardError;
use crate::metrics::{MetricsEngine, MetricsQuery, MetricsReport, Series};
use crate::period::Period;
use crate::report::{format_count, format_growth, format_share, pop_label};
use crate::source::Provenance;
use anyhow::Result;
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Categories,
    MarketShare,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Overview, Page::Categories, Page::MarketShare];

    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Categories,
            Page::Categories => Page::MarketShare,
            Page::MarketShare => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::MarketShare,
            Page::Categories => Page::Overview,
            Page::MarketShare => Page::Categories,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Categories => "Vehicle Types",
            Page::MarketShare => "Market Share",
        }
    }
}

pub struct App {
    pub dataset: Dataset,
    pub provenance: Provenance,
    pub query: MetricsQuery,
    pub report: Result<MetricsReport, DashboardError>,
    pub current_page: Page,
    pub state: TableState,
    /// Index into the report's periods for the market share page
    pub share_period: usize,
}

impl App {
    pub fn new(dataset: Dataset, provenance: Provenance) -> Self {
        let mut app = Self {
            dataset,
            provenance,
            query: MetricsQuery::default(),
            report: Err(DashboardError::EmptyResult),
            current_page: Page::Overview,
            state: TableState::default(),
            share_period: 0,
        };
        app.refresh();
        app
    }

    /// Recompute the report after a query change
    pub fn refresh(&mut self) {
        self.report = MetricsEngine::new(&self.dataset).run(&self.query);
        if let Err(e) = &self.report {
            tracing::debug!(error = %e, "query produced no report");
        }
        self.share_period = self
            .report
            .as_ref()
            .map(|r| r.periods.len().saturating_sub(1))
            .unwrap_or(0);
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        if self.row_count() > 0 {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn cycle_granularity(&mut self) {
        self.query.granularity = self.query.granularity.cycle();
        self.refresh();
    }

    /// All categories, then each category present in the data, in turn
    pub fn cycle_category(&mut self) {
        let available = self.dataset.categories();
        let current = self.category_filter();

        let next = match current {
            None => available.first().copied(),
            Some(c) => available
                .iter()
                .position(|a| *a == c)
                .and_then(|i| available.get(i + 1))
                .copied(),
        };

        self.query.categories = next.map(|c| vec![c]);
        // A manufacturer picked under another category would empty the result
        self.query.manufacturers = None;
        self.refresh();
    }

    /// All manufacturers, then each manufacturer of the selected category
    pub fn cycle_manufacturer(&mut self) {
        let available = self.dataset.manufacturers(self.category_filter());

        let next = match self.manufacturer_filter() {
            None => available.first().cloned(),
            Some(current) => available
                .iter()
                .position(|a| a == current)
                .and_then(|i| available.get(i + 1))
                .cloned(),
        };

        self.query.manufacturers = next.map(|m| vec![m]);
        self.refresh();
    }

    pub fn manufacturer_filter(&self) -> Option<&str> {
        match self.query.manufacturers.as_deref() {
            Some([only]) => Some(only.as_str()),
            _ => None,
        }
    }

    /// Active date range, the whole dataset when unfiltered
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.query.date_range.or_else(|| self.dataset.date_range())
    }

    /// Move the range start one bucket of the current granularity, staying
    /// within the data and not past the range end.
    pub fn shift_start(&mut self, forward: bool) {
        let (Some((start, end)), Some((first, _))) = (self.date_range(), self.dataset.date_range())
        else {
            return;
        };
        let bucket = Period::containing(self.query.granularity, start);
        let moved = if forward { bucket.next() } else { bucket.previous() };

        if let Some(new_start) = moved.map(|p| p.start.max(first)) {
            if new_start <= end && new_start != start {
                self.query.date_range = Some((new_start, end));
                self.refresh();
            }
        }
    }

    /// Move the range end one bucket, to that bucket's last day
    pub fn shift_end(&mut self, forward: bool) {
        let (Some((start, end)), Some((_, last))) = (self.date_range(), self.dataset.date_range())
        else {
            return;
        };
        let bucket = Period::containing(self.query.granularity, end);
        let moved = if forward { bucket.next() } else { bucket.previous() };

        if let Some(new_end) = moved.map(|p| p.end().min(last)) {
            if new_end >= start && new_end != end {
                self.query.date_range = Some((start, new_end));
                self.refresh();
            }
        }
    }

    pub fn reset_date_range(&mut self) {
        self.query.date_range = None;
        self.refresh();
    }

    pub fn category_filter(&self) -> Option<Category> {
        match self.query.categories.as_deref() {
            Some([only]) => Some(*only),
            _ => None,
        }
    }

    pub fn selected_share_period(&self) -> Option<Period> {
        self.report
            .as_ref()
            .ok()
            .and_then(|r| r.periods.get(self.share_period).copied())
    }

    pub fn next_share_period(&mut self) {
        let len = self.report.as_ref().map(|r| r.periods.len()).unwrap_or(0);
        if self.share_period + 1 < len {
            self.share_period += 1;
            self.reset_selection();
        }
    }

    pub fn previous_share_period(&mut self) {
        if self.share_period > 0 {
            self.share_period -= 1;
            self.reset_selection();
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.reset_selection();
    }

    /// Rows in the table shown on the current page
    pub fn row_count(&self) -> usize {
        let Ok(report) = &self.report else {
            return 0;
        };
        match self.current_page {
            Page::Overview | Page::Categories => report.periods.len(),
            Page::MarketShare => self
                .selected_share_period()
                .map(|p| report.shares_for(&p).len())
                .unwrap_or(0),
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(_) => 0,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Apply one key press. Returns false when the dashboard should close.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => self.previous_page(),
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('g') => self.cycle_granularity(),
            KeyCode::Char('c') => self.cycle_category(),
            KeyCode::Char('m') => self.cycle_manufacturer(),
            KeyCode::Char('[') => self.shift_start(false),
            KeyCode::Char(']') => self.shift_start(true),
            KeyCode::Char('{') => self.shift_end(false),
            KeyCode::Char('}') => self.shift_end(true),
            KeyCode::Char('r') => self.reset_date_range(),
            KeyCode::Right | KeyCode::Char('l') => self.next_share_period(),
            KeyCode::Left | KeyCode::Char('h') => self.previous_share_period(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            _ => {}
        }
        true
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && !app.handle_key(key.code, key.modifiers) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs and active query
            Constraint::Min(0),
            Constraint::Length(3), // Key help
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if let Err(e) = &app.report {
        render_message(f, chunks[1], e);
    } else {
        match app.current_page {
            Page::Overview => render_overview(f, chunks[1], app),
            Page::Categories => render_categories(f, chunks[1], app),
            Page::MarketShare => render_market_share(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn growth_style(growth: Option<f64>) -> Style {
    match growth {
        Some(g) if g >= 0.0 => Style::default().fg(Color::Green),
        Some(_) => Style::default().fg(Color::Red),
        None => Style::default().fg(Color::DarkGray),
    }
}

fn table_header<'a>(titles: impl IntoIterator<Item = String>) -> Row<'a> {
    Row::new(titles.into_iter().map(|t| Cell::from(t).style(header_style())))
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn bordered(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let category = app
        .category_filter()
        .map(|c| c.label())
        .unwrap_or("All types");

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("By {}", app.query.granularity),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(category, Style::default().fg(Color::Cyan)));
    if let Some(manufacturer) = app.manufacturer_filter() {
        tab_spans.push(Span::raw(" / "));
        tab_spans.push(Span::styled(
            manufacturer.to_string(),
            Style::default().fg(Color::Cyan),
        ));
    }
    if let Some((start, end)) = app.date_range() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("{} → {}", start, end),
            Style::default().fg(Color::White),
        ));
    }
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.provenance.to_string(),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_message(f: &mut Frame, area: Rect, err: &DashboardError) {
    let hint = match err {
        DashboardError::EmptyResult => "Press c or m to widen the filters, or r to reset the date range.",
        DashboardError::InvalidRange { .. } => "Choose an end date after the start date.",
        _ => "",
    };

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", err),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("  {}", hint)),
    ];

    let message = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(bordered(" No data ".to_string()));
    f.render_widget(message, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &mut App) {
    let Ok(report) = &app.report else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // KPI cards
            Constraint::Length(7), // Sparkline
            Constraint::Min(0),
        ])
        .split(area);

    let kpis = &report.kpis;
    let mut lines = vec![Line::from(vec![
        Span::raw("  Total registrations: "),
        Span::styled(
            format_count(kpis.total_registrations),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ])];
    lines.push(Line::from(vec![
        Span::raw(format!(
            "  YoY growth ({}): ",
            kpis.latest_period.map(|p| p.label()).unwrap_or_default()
        )),
        Span::styled(
            format_growth(kpis.latest_yoy_growth),
            growth_style(kpis.latest_yoy_growth),
        ),
    ]));
    if let Some(leader) = &kpis.top_category {
        lines.push(Line::from(format!(
            "  Top vehicle type: {} ({:.1}% of total)",
            leader.name,
            leader.share * 100.0
        )));
    }
    if let Some(leader) = &kpis.top_manufacturer {
        lines.push(Line::from(format!(
            "  Top manufacturer: {} ({:.1}% of segment)",
            leader.name,
            leader.share * 100.0
        )));
    }
    f.render_widget(
        Paragraph::new(lines).block(bordered(" Key Metrics ".to_string())),
        chunks[0],
    );

    let totals: Vec<u64> = report.total.points.iter().map(|p| p.total).collect();
    let sparkline = Sparkline::default()
        .block(bordered(format!(" Registrations by {} ", app.query.granularity)))
        .data(&totals)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(sparkline, chunks[1]);

    let table = series_table(&report.total, app);
    f.render_stateful_widget(table, chunks[2], &mut app.state);
}

fn series_table<'a>(series: &Series, app: &App) -> Table<'a> {
    let granularity = app.query.granularity;
    let header = table_header([
        "Period".to_string(),
        "Registrations".to_string(),
        "YoY".to_string(),
        pop_label(granularity).to_string(),
    ]);

    let rows: Vec<Row> = series
        .points
        .iter()
        .map(|point| {
            Row::new(vec![
                Cell::from(point.period.label()),
                Cell::from(format_count(point.total)),
                Cell::from(format_growth(point.yoy_growth)).style(growth_style(point.yoy_growth)),
                Cell::from(format_growth(point.pop_growth)).style(growth_style(point.pop_growth)),
            ])
        })
        .collect();

    Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(bordered(format!(" {} ", series.key)))
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ")
}

fn render_categories(f: &mut Frame, area: Rect, app: &mut App) {
    let Ok(report) = &app.report else {
        return;
    };

    let mut titles = vec!["Period".to_string()];
    let mut widths = vec![Constraint::Length(12)];
    for series in &report.by_category {
        titles.push(series.key.to_string());
        titles.push("YoY".to_string());
        widths.push(Constraint::Length(14));
        widths.push(Constraint::Length(9));
    }

    let rows: Vec<Row> = report
        .periods
        .iter()
        .enumerate()
        .map(|(i, period)| {
            let mut cells = vec![Cell::from(period.label())];
            for series in &report.by_category {
                let point = &series.points[i];
                cells.push(Cell::from(format_count(point.total)));
                cells.push(
                    Cell::from(format_growth(point.yoy_growth))
                        .style(growth_style(point.yoy_growth)),
                );
            }
            Row::new(cells).height(1)
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(table_header(titles))
        .block(bordered(" Registrations by Vehicle Type ".to_string()))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_market_share(f: &mut Frame, area: Rect, app: &mut App) {
    let (Ok(report), Some(period)) = (&app.report, app.selected_share_period()) else {
        return;
    };

    let mut shares = report.shares_for(&period);
    shares.sort_by(|a, b| a.category.cmp(&b.category).then(b.total.cmp(&a.total)));

    let rows: Vec<Row> = shares
        .iter()
        .map(|row| {
            let bar_len = row.share.map(|s| (s * 30.0).round() as usize).unwrap_or(0);
            Row::new(vec![
                Cell::from(row.category.code()),
                Cell::from(row.manufacturer.clone()),
                Cell::from(format_count(row.total)),
                Cell::from(format_share(row.share)),
                Cell::from("█".repeat(bar_len)).style(Style::default().fg(Color::Cyan)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(22),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(table_header(
        ["Type", "Manufacturer", "Registrations", "Share", ""]
            .iter()
            .map(|s| s.to_string()),
    ))
    .block(bordered(format!(
        " Market Share - {} ({}/{}) ",
        period,
        app.share_period + 1,
        report.periods.len()
    )))
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.row_count()),
        Style::default().fg(Color::Cyan),
    )];

    let keys = [
        ("Tab", " Page | "),
        ("g", " Granularity | "),
        ("c", " Vehicle type | "),
        ("m", " Manufacturer | "),
        ("[/]", " Start | "),
        ("{/}", " End | "),
        ("←/→", " Share period | "),
        ("↑/↓", " Nav | "),
    ];
    status_spans.push(Span::raw(" | "));
    for (key, action) in keys {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(action));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
