//! Summary metrics and chart series over a filtered set of expenses.

use chrono::NaiveDate;
use serde::Serialize;
use spendlens_core::YearMonth;
use std::collections::{BTreeMap, BTreeSet};

use crate::dataset::{Dataset, Expense};

/// Labels longer than this are left out of the bar chart.
pub const MAX_LABEL_CHARS: usize = 35;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub total: f64,
    /// Zero when there are no transactions.
    pub mean: f64,
    pub count: usize,
}

pub fn summarize(expenses: &[Expense]) -> Metrics {
    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let count = expenses.len();
    let mean = if count == 0 { 0.0 } else { total / count as f64 };
    Metrics { total, mean, count }
}

/// Data for the per-category bar chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "bars", rename_all = "snake_case")]
pub enum BarSeries {
    /// Nothing matched the filter.
    NoData,
    /// Rows matched, but every label was too long to display.
    AllExcluded,
    /// `(category, total)`, ascending by total.
    Series(Vec<(String, f64)>),
}

pub fn category_totals(expenses: &[Expense]) -> BarSeries {
    if expenses.is_empty() {
        return BarSeries::NoData;
    }

    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for e in expenses
        .iter()
        .filter(|e| e.category.chars().count() <= MAX_LABEL_CHARS)
    {
        *totals.entry(e.category.as_str()).or_insert(0.0) += e.amount;
    }
    if totals.is_empty() {
        return BarSeries::AllExcluded;
    }

    // BTreeMap order gives the label tiebreak; the stable sort keeps it.
    let mut bars: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(label, total)| (label.to_string(), total))
        .collect();
    bars.sort_by(|a, b| a.1.total_cmp(&b.1));
    BarSeries::Series(bars)
}

/// `(date, total)` per calendar day, ascending by date.
pub fn daily_totals(expenses: &[Expense]) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for e in expenses {
        *days.entry(e.date).or_insert(0.0) += e.amount;
    }
    days.into_iter().collect()
}

/// Everything a renderer needs for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub month: YearMonth,
    pub categories: Vec<String>,
    pub metrics: Metrics,
    pub bars: BarSeries,
    pub daily: Vec<(NaiveDate, f64)>,
    pub available_months: Vec<YearMonth>,
    pub available_categories: Vec<String>,
}

impl DashboardView {
    /// `filtered` must be the result of filtering `dataset` by `month`/`categories`.
    pub fn build(
        dataset: &Dataset,
        filtered: &[Expense],
        month: YearMonth,
        categories: &BTreeSet<String>,
    ) -> Self {
        Self {
            month,
            categories: categories.iter().cloned().collect(),
            metrics: summarize(filtered),
            bars: category_totals(filtered),
            daily: daily_totals(filtered),
            available_months: dataset.available_months(),
            available_categories: dataset.available_categories(),
        }
    }
}

/// `1234567.891` → `1,234,567.89`
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}
