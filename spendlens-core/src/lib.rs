//! spendlens-core: domain types shared by the ingest pipeline and the dashboard

pub mod finance;
pub mod month;

pub use finance::{Category, Transaction};
pub use month::YearMonth;
