//! Month/category filter for the dashboard.

use spendlens_core::YearMonth;
use std::collections::BTreeSet;

use crate::dataset::Expense;

/// Rows in `month` whose category is in `categories`.
///
/// An empty category set means no category restriction. Input order is kept.
pub fn filter_expenses(
    expenses: &[Expense],
    month: YearMonth,
    categories: &BTreeSet<String>,
) -> Vec<Expense> {
    expenses
        .iter()
        .filter(|e| month.contains(e.date))
        .filter(|e| categories.is_empty() || categories.contains(&e.category))
        .cloned()
        .collect()
}
