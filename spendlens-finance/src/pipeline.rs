//! Ingest pipeline: parse → dedupe → classify → date floor → persist.
//!
//! Each stage is a plain function over owned collections so it can be tested
//! on its own; `run_ingest` chains them.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use spendlens_core::Transaction;
use spendlens_ingest::{read_statement_dir, FileFailure, StatementKind, StatementTransaction};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::{classify_all, Classifier, ReviewItem};

/// Records dated before this are dropped from the dataset.
pub fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub statements_dir: PathBuf,
    pub output: PathBuf,
    pub cutoff: NaiveDate,
    /// Maximum classifier calls in flight (1 = sequential).
    pub concurrency: usize,
}

/// Per-account breakdown of the deduplicated records.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    /// OFX `ACCTID`; empty when the statement carried none.
    pub account_id: String,
    pub kind: StatementKind,
    pub transactions: usize,
    /// Count per OFX `TRNTYPE`; records without one are not counted here.
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub files_read: usize,
    pub failures: Vec<FileFailure>,
    pub accounts: Vec<AccountSummary>,
    pub parsed: usize,
    pub unique: usize,
    pub classifier_calls: usize,
    pub before_cutoff: usize,
    pub written: usize,
    pub output: PathBuf,
    pub review: Vec<ReviewItem>,
    /// Where the review list was written, if there was anything to review.
    pub review_path: Option<PathBuf>,
}

/// Keep the first record seen for each id; relative order is preserved.
pub fn dedupe_by_id(records: Vec<StatementTransaction>) -> Vec<StatementTransaction> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

/// Group records by `(account, statement kind)`, ordered by account id.
pub fn summarize_accounts(records: &[StatementTransaction]) -> Vec<AccountSummary> {
    let mut groups: BTreeMap<(String, StatementKind), AccountSummary> = BTreeMap::new();
    for r in records {
        let account_id = r.account_id.clone().unwrap_or_default();
        let entry = groups
            .entry((account_id.clone(), r.kind))
            .or_insert_with(|| AccountSummary {
                account_id,
                kind: r.kind,
                transactions: 0,
                by_type: BTreeMap::new(),
            });
        entry.transactions += 1;
        if let Some(t) = &r.trn_type {
            *entry.by_type.entry(t.to_ascii_uppercase()).or_insert(0) += 1;
        }
    }
    groups.into_values().collect()
}

/// Keep records dated on or after `cutoff`.
pub fn apply_date_floor(records: Vec<Transaction>, cutoff: NaiveDate) -> Vec<Transaction> {
    records.into_iter().filter(|t| t.date >= cutoff).collect()
}

#[derive(Serialize)]
struct DatasetRow<'a> {
    id: &'a str,
    date: NaiveDate,
    amount: f64,
    description: &'a str,
    category: &'a str,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    Ok(())
}

/// Rewrite the normalized dataset file (`id,date,amount,description,category`).
pub fn write_dataset(path: &Path, records: &[Transaction]) -> Result<()> {
    ensure_parent(path)?;
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for t in records {
        w.serialize(DatasetRow {
            id: &t.id,
            date: t.date,
            amount: t.amount,
            description: &t.description,
            category: t.category_label(),
        })?;
    }
    // serialize() only writes the header alongside the first row
    if records.is_empty() {
        w.write_record(["id", "date", "amount", "description", "category"])?;
    }
    w.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// `finances.csv` → `finances.review.csv`
pub fn review_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    output.with_file_name(format!("{stem}.review.csv"))
}

pub fn write_review(path: &Path, items: &[ReviewItem]) -> Result<()> {
    ensure_parent(path)?;
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for item in items {
        w.serialize(item)?;
    }
    w.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Review items for records that survived the date floor and still carry the
/// `Unclassified` sentinel.
pub fn review_for_kept(kept: &[Transaction], review: Vec<ReviewItem>) -> Vec<ReviewItem> {
    let flagged: HashSet<&str> = kept
        .iter()
        .filter(|t| t.needs_review())
        .map(|t| t.id.as_str())
        .collect();
    review
        .into_iter()
        .filter(|r| flagged.contains(r.id.as_str()))
        .collect()
}

/// Run the whole ingestion stage and rewrite the dataset file.
pub async fn run_ingest<C: Classifier>(opts: &IngestOptions, classifier: &C) -> Result<IngestReport> {
    let scan = read_statement_dir(&opts.statements_dir)?;
    let parsed = scan.transactions.len();

    let unique = dedupe_by_id(scan.transactions);
    info!("{} unique transaction(s) after dedupe ({} parsed)", unique.len(), parsed);
    let unique_count = unique.len();
    let accounts = summarize_accounts(&unique);

    let classified = classify_all(unique, classifier, opts.concurrency).await;

    let total = classified.transactions.len();
    let kept = apply_date_floor(classified.transactions, opts.cutoff);
    let before_cutoff = total - kept.len();
    info!("{} record(s) dated before {} dropped", before_cutoff, opts.cutoff);

    let review = review_for_kept(&kept, classified.review);

    write_dataset(&opts.output, &kept)?;
    info!("wrote {} record(s) to {}", kept.len(), opts.output.display());

    let rp = review_path_for(&opts.output);
    let review_path = if review.is_empty() {
        if rp.exists() {
            fs::remove_file(&rp).with_context(|| format!("remove {}", rp.display()))?;
        }
        None
    } else {
        write_review(&rp, &review)?;
        Some(rp)
    };

    Ok(IngestReport {
        files_read: scan.files_read.len(),
        failures: scan.failures,
        accounts,
        parsed,
        unique: unique_count,
        classifier_calls: classified.calls,
        before_cutoff,
        written: kept.len(),
        output: opts.output.clone(),
        review,
        review_path,
    })
}
