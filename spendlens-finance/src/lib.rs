//! spendlens-finance: classification, the ingest pipeline, and the dashboard
//! data layer (dataset loading, filtering, aggregation, memo caches).

pub mod aggregate;
pub mod cache;
pub mod category_rules;
pub mod classify;
pub mod dataset;
pub mod filter;
pub mod pipeline;

pub use aggregate::{
    category_totals, daily_totals, format_amount, summarize, BarSeries, DashboardView, Metrics, MAX_LABEL_CHARS,
};
pub use cache::{DatasetCache, FilterCache, Memo};
pub use category_rules::RulesClassifier;
pub use classify::{classify_all, classification_prompt, validate_label, Classified, Classifier, ClassifyError, ReviewItem};
pub use dataset::{load_dataset, Dataset, DatasetError, Expense};
pub use filter::filter_expenses;
pub use pipeline::{
    apply_date_floor, dedupe_by_id, run_ingest, summarize_accounts, write_dataset, AccountSummary, IngestOptions,
    IngestReport,
};
