//! Non-interactive rendering of the dashboard view (`spendlens report`).

use anyhow::{Context, Result};
use spendlens_core::YearMonth;
use spendlens_finance::{format_amount, BarSeries, DashboardView, Memo, MAX_LABEL_CHARS};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

pub const NO_DATA_MSG: &str = "No expenses for the selected filter.";

pub fn all_excluded_msg() -> String {
    format!("All categories were omitted for exceeding {MAX_LABEL_CHARS} characters.")
}

pub fn run_report(
    data: &Path,
    month: Option<YearMonth>,
    categories: Vec<String>,
    json: bool,
) -> Result<()> {
    let mut memo = Memo::new();
    let ds = memo.load(data)?;

    let Some(month) = month.or_else(|| ds.available_months().first().copied()) else {
        println!("No expenses in {}. Run `spendlens ingest` first.", data.display());
        return Ok(());
    };

    let cats: BTreeSet<String> = categories.into_iter().collect();
    let rows = memo.filter(&ds, month, &cats);
    let view = DashboardView::build(&ds, &rows, month, &cats);

    if json {
        println!("{}", serde_json::to_string_pretty(&view).context("serialize view")?);
    } else {
        print!("{}", render_text(&view));
    }
    Ok(())
}

pub fn render_text(view: &DashboardView) -> String {
    let mut s = String::new();
    let cats = if view.categories.is_empty() {
        "all".to_string()
    } else {
        view.categories.join(", ")
    };
    let months: Vec<String> = view.available_months.iter().map(|m| m.to_string()).collect();

    let _ = writeln!(s, "# Spending for {} (categories: {})", view.month, cats);
    let _ = writeln!(s, "Available months: {}", months.join(" "));
    let _ = writeln!(s);
    let _ = writeln!(s, "Total spent:            {:>14}", format_amount(view.metrics.total));
    let _ = writeln!(s, "Mean per transaction:   {:>14}", format_amount(view.metrics.mean));
    let _ = writeln!(s, "Transactions:           {:>14}", view.metrics.count);
    let _ = writeln!(s);

    let _ = writeln!(s, "## By category");
    match &view.bars {
        BarSeries::NoData => {
            let _ = writeln!(s, "{NO_DATA_MSG}");
        }
        BarSeries::AllExcluded => {
            let _ = writeln!(s, "{}", all_excluded_msg());
        }
        BarSeries::Series(bars) => {
            for (label, total) in bars {
                let _ = writeln!(s, "{:<width$} {:>14}", label, format_amount(*total), width = MAX_LABEL_CHARS);
            }
        }
    }
    let _ = writeln!(s);

    let _ = writeln!(s, "## Daily trend");
    if view.daily.is_empty() {
        let _ = writeln!(s, "{NO_DATA_MSG}");
    }
    for (date, total) in &view.daily {
        let _ = writeln!(s, "{} {:>14}", date, format_amount(*total));
    }
    s
}
