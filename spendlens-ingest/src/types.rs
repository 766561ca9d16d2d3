use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    CreditCard,
    BankAccount,
}

impl StatementKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::CreditCard => "credit card",
            StatementKind::BankAccount => "bank account",
        }
    }
}

/// Normalized output of statement parsers (bank-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTransaction {
    /// Bank-assigned transaction id (OFX `FITID`)
    pub id: String,
    pub date: NaiveDate,
    /// Signed amount as exported; negative means money out.
    pub amount: f64,
    pub description: String,
    /// OFX `TRNTYPE` (DEBIT, CREDIT, PAYMENT, ...) when present
    pub trn_type: Option<String>,
    pub account_id: Option<String>,
    pub kind: StatementKind,
}
