//! Load and clean the normalized dataset for the dashboard.

use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use spendlens_core::{Category, YearMonth};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Columns the dashboard cannot do without.
pub const REQUIRED_COLUMNS: [&str; 4] = ["date", "amount", "description", "category"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} is missing required column(s): {}", path.display(), missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
    #[error("{}:{line}: {reason}", path.display())]
    InvalidRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// One expense row as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub date: NaiveDate,
    pub month: YearMonth,
    pub amount: f64,
    pub description: String,
    pub category: String,
}

impl Expense {
    pub fn new(date: NaiveDate, amount: f64, description: &str, category: &str) -> Self {
        Self {
            date,
            month: YearMonth::from_date(date),
            amount,
            description: description.to_string(),
            category: category.to_string(),
        }
    }
}

/// A loaded, cleaned dataset. `id` changes every time a file is (re)loaded.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: u64,
    pub path: PathBuf,
    pub expenses: Vec<Expense>,
}

static NEXT_DATASET_ID: AtomicU64 = AtomicU64::new(1);

impl Dataset {
    pub fn new(path: impl Into<PathBuf>, expenses: Vec<Expense>) -> Self {
        Self {
            id: NEXT_DATASET_ID.fetch_add(1, Ordering::Relaxed),
            path: path.into(),
            expenses,
        }
    }

    /// Distinct months, most recent first.
    pub fn available_months(&self) -> Vec<YearMonth> {
        let set: BTreeSet<YearMonth> = self.expenses.iter().map(|e| e.month).collect();
        set.into_iter().rev().collect()
    }

    /// Distinct category labels, ascending.
    pub fn available_categories(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.expenses.iter().map(|e| e.category.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    date: String,
    amount: f64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
}

fn parse_row_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Read the dataset file, drop income, and normalize categories.
///
/// Any identifier column is ignored. Blank or unknown labels become
/// `Unclassified`, so every returned category is one of the non-income labels
/// or the sentinel.
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let open_err = |source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(open_err)?;

    let headers = rdr.headers().map_err(open_err)?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut expenses = Vec::new();
    let mut income = 0usize;
    let mut relabeled = 0usize;

    for result in rdr.records() {
        let record = result.map_err(|e| DatasetError::InvalidRow {
            path: path.to_path_buf(),
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let invalid = |reason: String| DatasetError::InvalidRow {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let row: RawRow = record
            .deserialize(Some(&headers))
            .map_err(|e| invalid(e.to_string()))?;
        let date = parse_row_date(&row.date)
            .ok_or_else(|| invalid(format!("invalid date {:?}", row.date)))?;

        let category = match Category::from_stored(row.category.trim()) {
            Some(c) if c.is_income() => {
                income += 1;
                continue;
            }
            Some(c) => c,
            None => {
                relabeled += 1;
                debug!("unknown category {:?} -> Unclassified", row.category);
                Category::Unclassified
            }
        };

        expenses.push(Expense::new(date, row.amount, &row.description, category.as_str()));
    }

    if relabeled > 0 {
        warn!(
            "{}: {} row(s) with blank or unknown category shown as {}",
            path.display(),
            relabeled,
            Category::Unclassified
        );
    }
    debug!(
        "{}: {} expense row(s), {} income row(s) dropped",
        path.display(),
        expenses.len(),
        income
    );

    Ok(Dataset::new(path, expenses))
}
