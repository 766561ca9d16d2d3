//! Interactive terminal dashboard (`spendlens dashboard`).

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset as ChartDataset, GraphType, List,
        ListItem, ListState, Paragraph, Tabs, Wrap,
    },
    Frame, Terminal,
};
use spendlens_core::YearMonth;
use spendlens_finance::{format_amount, BarSeries, Dataset, DashboardView, Memo};
use std::collections::BTreeSet;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::report::{all_excluded_msg, NO_DATA_MSG};

const TABS: [&str; 2] = ["By category", "Daily trend"];

const PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Red,
    Color::LightCyan,
    Color::LightMagenta,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Months,
    Categories,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Reload,
}

/// Filter widgets and navigation state, independent of the terminal.
#[derive(Debug, Clone)]
pub struct DashboardState {
    months: Vec<YearMonth>,
    month_idx: usize,
    categories: Vec<String>,
    selected: BTreeSet<String>,
    cat_cursor: usize,
    focus: Focus,
    tab: usize,
}

impl DashboardState {
    /// Most recent month, every category selected.
    pub fn new(ds: &Dataset) -> Self {
        let categories = ds.available_categories();
        Self {
            months: ds.available_months(),
            month_idx: 0,
            selected: categories.iter().cloned().collect(),
            categories,
            cat_cursor: 0,
            focus: Focus::Months,
            tab: 0,
        }
    }

    pub fn selected_month(&self) -> Option<YearMonth> {
        self.months.get(self.month_idx).copied()
    }

    /// Category set passed to the filter; empty means unrestricted.
    pub fn filter_set(&self) -> BTreeSet<String> {
        self.selected.clone()
    }

    /// Re-populate from a reloaded dataset, keeping the month and selection where possible.
    pub fn refresh(&mut self, ds: &Dataset) {
        let month = self.selected_month();
        let had_all = self.selected.len() == self.categories.len();

        self.months = ds.available_months();
        self.month_idx = month
            .and_then(|m| self.months.iter().position(|x| *x == m))
            .unwrap_or(0);

        self.categories = ds.available_categories();
        if had_all {
            self.selected = self.categories.iter().cloned().collect();
        } else {
            self.selected.retain(|c| self.categories.contains(c));
        }
        self.cat_cursor = self.cat_cursor.min(self.categories.len().saturating_sub(1));
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char('r') => return Action::Reload,
            KeyCode::Tab | KeyCode::BackTab => self.tab = (self.tab + 1) % TABS.len(),
            KeyCode::Left => self.focus = Focus::Months,
            KeyCode::Right => self.focus = Focus::Categories,
            KeyCode::Up => match self.focus {
                Focus::Months => self.month_idx = self.month_idx.saturating_sub(1),
                Focus::Categories => self.cat_cursor = self.cat_cursor.saturating_sub(1),
            },
            KeyCode::Down => match self.focus {
                Focus::Months => {
                    if self.month_idx + 1 < self.months.len() {
                        self.month_idx += 1;
                    }
                }
                Focus::Categories => {
                    if self.cat_cursor + 1 < self.categories.len() {
                        self.cat_cursor += 1;
                    }
                }
            },
            KeyCode::Char(' ') | KeyCode::Enter if self.focus == Focus::Categories => {
                if let Some(c) = self.categories.get(self.cat_cursor) {
                    if !self.selected.remove(c) {
                        self.selected.insert(c.clone());
                    }
                }
            }
            KeyCode::Char('a') => self.selected = self.categories.iter().cloned().collect(),
            KeyCode::Char('n') => self.selected.clear(),
            _ => {}
        }
        Action::None
    }
}

/// Undoes terminal and logger changes on drop, including early `?` returns.
struct TerminalGuard {
    log_level: log::LevelFilter,
    raw_mode: bool,
    alt_screen: bool,
}

impl TerminalGuard {
    /// Silence logging; log lines on stderr would tear the alternate screen.
    fn quiet_logs() -> Self {
        let log_level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        Self {
            log_level,
            raw_mode: false,
            alt_screen: false,
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.alt_screen {
            let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        }
        if self.raw_mode {
            let _ = disable_raw_mode();
        }
        log::set_max_level(self.log_level);
    }
}

pub fn run_dashboard(data: &Path) -> Result<()> {
    // Load before touching the terminal so a bad file reports normally.
    let mut memo = Memo::new();
    let ds = memo.load(data)?;
    let state = DashboardState::new(&ds);

    let mut guard = TerminalGuard::quiet_logs();
    enable_raw_mode()?;
    guard.raw_mode = true;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    guard.alt_screen = true;

    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let res = dashboard_loop(&mut terminal, data, &mut memo, ds, state);

    drop(guard);
    terminal.show_cursor()?;
    res
}

fn dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    data: &Path,
    memo: &mut Memo,
    mut ds: Arc<Dataset>,
    mut state: DashboardState,
) -> Result<()> {
    let mut status: Option<String> = None;

    loop {
        let view = state.selected_month().map(|month| {
            let cats = state.filter_set();
            let rows = memo.filter(&ds, month, &cats);
            DashboardView::build(&ds, &rows, month, &cats)
        });

        terminal.draw(|f| draw(f, &state, view.as_ref(), data, status.as_deref()))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match state.handle_key(key.code) {
                    Action::Quit => break,
                    Action::Reload => match memo.reload(data) {
                        Ok(fresh) => {
                            state.refresh(&fresh);
                            status = Some(format!("reloaded {} expense rows", fresh.expenses.len()));
                            ds = fresh;
                        }
                        Err(e) => status = Some(format!("reload failed: {e}")),
                    },
                    Action::None => {}
                }
            }
        }
    }

    Ok(())
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).border_style(style).title(title)
}

fn draw(
    f: &mut Frame,
    state: &DashboardState,
    view: Option<&DashboardView>,
    data: &Path,
    status: Option<&str>,
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(40)])
        .split(f.area());

    draw_sidebar(f, cols[0], state);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(cols[1]);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "Personal Finance Dashboard",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", data.display()), Style::default().fg(Color::Gray)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, rows[0]);

    let Some(view) = view else {
        let msg = Paragraph::new(format!(
            "No expenses in {}. Run `spendlens ingest` first.",
            data.display()
        ))
        .style(Style::default().fg(Color::Blue))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(msg, rows[3]);
        draw_footer(f, rows[4], status);
        return;
    };

    draw_metrics(f, rows[1], view);

    let tabs = Tabs::new(TABS.to_vec())
        .block(Block::default().borders(Borders::ALL))
        .select(state.tab)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, rows[2]);

    match state.tab {
        0 => draw_bars(f, rows[3], view),
        _ => draw_trend(f, rows[3], view),
    }

    draw_footer(f, rows[4], status);
}

fn draw_sidebar(f: &mut Frame, area: Rect, state: &DashboardState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let months: Vec<ListItem> = state
        .months
        .iter()
        .map(|m| ListItem::new(m.to_string()))
        .collect();
    let months = List::new(months)
        .block(focus_block("Month", state.focus == Focus::Months))
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("> ");
    let mut ms = ListState::default().with_selected(Some(state.month_idx));
    f.render_stateful_widget(months, parts[0], &mut ms);

    let cats: Vec<ListItem> = state
        .categories
        .iter()
        .map(|c| {
            let mark = if state.selected.contains(c) { "[x]" } else { "[ ]" };
            ListItem::new(format!("{mark} {c}"))
        })
        .collect();
    let cats = List::new(cats)
        .block(focus_block("Categories", state.focus == Focus::Categories))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut cs = ListState::default();
    if state.focus == Focus::Categories {
        cs.select(Some(state.cat_cursor));
    }
    f.render_stateful_widget(cats, parts[1], &mut cs);
}

fn draw_metrics(f: &mut Frame, area: Rect, view: &DashboardView) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let metrics = [
        ("Total spent", format_amount(view.metrics.total)),
        ("Mean per transaction", format_amount(view.metrics.mean)),
        ("Transactions", view.metrics.count.to_string()),
    ];
    for (cell, (label, value)) in cells.iter().zip(metrics) {
        let p = Paragraph::new(Span::styled(value, Style::default().add_modifier(Modifier::BOLD)))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(label));
        f.render_widget(p, *cell);
    }
}

fn info(f: &mut Frame, area: Rect, title: &str, msg: &str, color: Color) {
    let p = Paragraph::new(msg.to_string())
        .style(Style::default().fg(color))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(p, area);
}

fn draw_bars(f: &mut Frame, area: Rect, view: &DashboardView) {
    let title = "Total spending by category";
    let series = match &view.bars {
        BarSeries::NoData => return info(f, area, title, NO_DATA_MSG, Color::Blue),
        BarSeries::AllExcluded => return info(f, area, title, &all_excluded_msg(), Color::Yellow),
        BarSeries::Series(s) => s,
    };

    let bars: Vec<Bar> = series
        .iter()
        .enumerate()
        .map(|(i, (label, total))| {
            Bar::default()
                .value((total.abs() * 100.0).round() as u64)
                .label(Line::from(label.clone()))
                .text_value(format_amount(*total))
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn days_in_month(m: YearMonth) -> u32 {
    let (y, next) = if m.month == 12 {
        (m.year + 1, 1)
    } else {
        (m.year, m.month + 1)
    };
    NaiveDate::from_ymd_opt(y, next, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// Day-of-month points plus y bounds that always include zero.
fn trend_points(view: &DashboardView) -> (Vec<(f64, f64)>, [f64; 2]) {
    let points: Vec<(f64, f64)> = view
        .daily
        .iter()
        .map(|(d, total)| (d.day() as f64, *total))
        .collect();
    let lo = points.iter().map(|p| p.1).fold(0.0_f64, f64::min);
    let hi = points.iter().map(|p| p.1).fold(0.0_f64, f64::max);
    let hi = if hi - lo < f64::EPSILON { lo + 1.0 } else { hi };
    (points, [lo, hi])
}

fn draw_trend(f: &mut Frame, area: Rect, view: &DashboardView) {
    let title = "Daily spending trend";
    if view.daily.is_empty() {
        return info(f, area, title, NO_DATA_MSG, Color::Blue);
    }

    let (points, [lo, hi]) = trend_points(view);
    let last = days_in_month(view.month) as f64;

    let datasets = vec![ChartDataset::default()
        .name("daily total")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points)];

    let x_labels = vec![
        format!("{}-01", view.month),
        format!("{}-{:02}", view.month, last as u32),
    ];
    let y_labels = vec![
        format_amount(lo),
        format_amount((lo + hi) / 2.0),
        format_amount(hi),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .title("Date")
                .style(Style::default().fg(Color::Gray))
                .bounds([1.0, last])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Daily total")
                .style(Style::default().fg(Color::Gray))
                .bounds([lo, hi])
                .labels(y_labels),
        );
    f.render_widget(chart, area);
}

fn draw_footer(f: &mut Frame, area: Rect, status: Option<&str>) {
    let mut spans = vec![Span::styled(
        "q quit  Tab chart  ←/→ focus  ↑/↓ move  Space toggle  a all  n none  r reload",
        Style::default().fg(Color::Gray),
    )];
    if let Some(s) = status {
        spans.push(Span::styled(format!("  | {s}"), Style::default().fg(Color::Green)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendlens_finance::Expense;

    fn ds(rows: &[(&str, &str)]) -> Dataset {
        let expenses = rows
            .iter()
            .map(|(date, cat)| {
                let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
                Expense::new(d, -10.0, "x", cat)
            })
            .collect();
        Dataset::new("mem", expenses)
    }

    #[test]
    fn test_defaults_latest_month_all_categories() {
        let s = DashboardState::new(&ds(&[
            ("2024-02-01", "Food"),
            ("2024-03-01", "Health"),
            ("2024-03-02", "Food"),
        ]));
        assert_eq!(s.selected_month().unwrap().to_string(), "2024-03");
        assert_eq!(s.filter_set().len(), 2);
    }

    #[test]
    fn test_navigation_and_toggle() {
        let mut s = DashboardState::new(&ds(&[("2024-02-01", "Food"), ("2024-03-01", "Health")]));
        assert_eq!(s.handle_key(KeyCode::Down), Action::None);
        assert_eq!(s.selected_month().unwrap().to_string(), "2024-02");
        s.handle_key(KeyCode::Down);
        assert_eq!(s.selected_month().unwrap().to_string(), "2024-02");

        // Space does nothing while the month list has focus
        s.handle_key(KeyCode::Char(' '));
        assert_eq!(s.filter_set().len(), 2);

        s.handle_key(KeyCode::Right);
        s.handle_key(KeyCode::Char(' '));
        assert_eq!(s.filter_set(), ["Health".to_string()].into_iter().collect());
        s.handle_key(KeyCode::Char(' '));
        assert_eq!(s.filter_set().len(), 2);

        s.handle_key(KeyCode::Char('n'));
        assert!(s.filter_set().is_empty());
        s.handle_key(KeyCode::Char('a'));
        assert_eq!(s.filter_set().len(), 2);

        s.handle_key(KeyCode::Tab);
        assert_eq!(s.tab, 1);
        assert_eq!(s.handle_key(KeyCode::Char('r')), Action::Reload);
        assert_eq!(s.handle_key(KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn test_refresh_keeps_month_and_selection() {
        let mut s = DashboardState::new(&ds(&[("2024-02-01", "Food"), ("2024-03-01", "Health")]));
        s.handle_key(KeyCode::Down);
        s.handle_key(KeyCode::Right);
        s.handle_key(KeyCode::Char(' ')); // drop Food

        s.refresh(&ds(&[
            ("2024-01-01", "Phone"),
            ("2024-02-01", "Food"),
            ("2024-03-01", "Health"),
            ("2024-04-01", "Shopping"),
        ]));
        assert_eq!(s.selected_month().unwrap().to_string(), "2024-02");
        assert_eq!(s.filter_set(), ["Health".to_string()].into_iter().collect());
    }

    #[test]
    fn test_refresh_with_all_selected_picks_up_new_labels() {
        let mut s = DashboardState::new(&ds(&[("2024-03-01", "Food")]));
        s.refresh(&ds(&[("2024-03-01", "Food"), ("2024-03-02", "Phone")]));
        assert_eq!(s.filter_set().len(), 2);
    }

    #[test]
    fn test_empty_dataset_has_no_month() {
        let s = DashboardState::new(&ds(&[]));
        assert!(s.selected_month().is_none());
    }

    #[test]
    fn test_guard_restores_log_level() {
        let before = log::max_level();
        {
            let _guard = TerminalGuard::quiet_logs();
            assert_eq!(log::max_level(), log::LevelFilter::Off);
        }
        assert_eq!(log::max_level(), before);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(YearMonth::new(2024, 2).unwrap()), 29);
        assert_eq!(days_in_month(YearMonth::new(2023, 12).unwrap()), 31);
        assert_eq!(days_in_month(YearMonth::new(2024, 4).unwrap()), 30);
    }

    #[test]
    fn test_trend_bounds_include_zero() {
        let d = ds(&[("2024-03-01", "Food"), ("2024-03-05", "Food")]);
        let month = YearMonth::new(2024, 3).unwrap();
        let view = DashboardView::build(&d, &d.expenses, month, &BTreeSet::new());
        let (points, bounds) = trend_points(&view);
        assert_eq!(points, vec![(1.0, -10.0), (5.0, -10.0)]);
        assert_eq!(bounds, [-10.0, 0.0]);
    }
}
