//! Finance record types shared by the ingest and dashboard stages

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A normalized statement transaction after classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Source-provided identifier (OFX FITID), unique within a dataset
    pub id: String,
    /// Posting date (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Signed amount as exported by the bank; negative = money out
    pub amount: f64,
    /// Free-text memo from the statement
    pub description: String,
    /// `None` when the description was blank and no classification was attempted
    pub category: Option<Category>,
}

/// Spending categories the classifier may assign
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Food,
    Income,
    Health,
    Groceries,
    Education,
    Shopping,
    Transport,
    Investment,
    Transfers,
    Phone,
    Housing,
    /// Classification failed or returned a label outside the closed set
    Unclassified,
}

impl Category {
    /// The substantive labels, in the order they are offered to the classifier.
    pub const ALL: [Category; 11] = [
        Category::Food,
        Category::Income,
        Category::Health,
        Category::Groceries,
        Category::Education,
        Category::Shopping,
        Category::Transport,
        Category::Investment,
        Category::Transfers,
        Category::Phone,
        Category::Housing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Income => "Income",
            Category::Health => "Health",
            Category::Groceries => "Groceries",
            Category::Education => "Education",
            Category::Shopping => "Shopping",
            Category::Transport => "Transport",
            Category::Investment => "Investment",
            Category::Transfers => "Transfers",
            Category::Phone => "Phone",
            Category::Housing => "Housing",
            Category::Unclassified => "Unclassified",
        }
    }

    /// Exact, case-sensitive match against the substantive labels.
    ///
    /// The sentinel is not accepted; a classifier answering "Unclassified"
    /// has not classified anything.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == label)
    }

    /// Like [`Category::from_label`] but also accepts the sentinel, for
    /// reading back persisted datasets.
    pub fn from_stored(label: &str) -> Option<Category> {
        if label == Category::Unclassified.as_str() {
            return Some(Category::Unclassified);
        }
        Category::from_label(label)
    }

    pub fn is_income(&self) -> bool {
        matches!(self, Category::Income)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::from_stored(s).ok_or_else(|| anyhow!("unknown category: {s:?}"))
    }
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        amount: f64,
        description: impl Into<String>,
        category: Option<Category>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            amount,
            description: description.into(),
            category,
        }
    }

    /// Label written to the dataset file; empty when unclassified-by-absence.
    pub fn category_label(&self) -> &'static str {
        self.category.map(|c| c.as_str()).unwrap_or("")
    }

    pub fn needs_review(&self) -> bool {
        self.category == Some(Category::Unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_label_match() {
        assert_eq!(Category::from_label("Groceries"), Some(Category::Groceries));
        assert_eq!(Category::from_label("groceries"), None);
        assert_eq!(Category::from_label("Groceries "), None);
        assert_eq!(Category::from_label("Unclassified"), None);
    }

    #[test]
    fn test_stored_accepts_sentinel() {
        assert_eq!(Category::from_stored("Unclassified"), Some(Category::Unclassified));
        assert_eq!("Housing".parse::<Category>().unwrap(), Category::Housing);
        assert!("Rent".parse::<Category>().is_err());
    }

    #[test]
    fn test_all_labels_round_trip() {
        assert_eq!(Category::ALL.len(), 11);
        for c in Category::ALL {
            assert_eq!(Category::from_label(c.as_str()), Some(c));
        }
        assert!(!Category::ALL.contains(&Category::Unclassified));
    }

    #[test]
    fn test_transaction_category_label() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let blank = Transaction::new("t1", date, -10.0, "   ", None);
        assert_eq!(blank.category_label(), "");
        assert!(!blank.needs_review());

        let flagged = Transaction::new("t2", date, -10.0, "???", Some(Category::Unclassified));
        assert!(flagged.needs_review());
        assert_eq!(flagged.category_label(), "Unclassified");
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Category::Transfers).unwrap();
        assert_eq!(json, "\"Transfers\"");
    }
}
