//! Category classification: the pluggable `Classifier` seam, the prompt sent
//! to language-model classifiers, and label validation.

use futures_util::{stream, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use spendlens_core::{Category, Transaction};
use spendlens_ingest::StatementTransaction;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("service returned no text")]
    EmptyResponse,
    #[error("{0}")]
    Other(String),
}

/// Text-classification capability: description in, raw label text out.
///
/// Implementations do not need to validate the label; `classify_all` does.
pub trait Classifier {
    fn classify(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<String, ClassifyError>> + Send;
}

/// Instruction sent to model-backed classifiers for one description.
pub fn classification_prompt(description: &str) -> String {
    let mut labels = String::new();
    for c in Category::ALL {
        labels.push_str("- ");
        labels.push_str(c.as_str());
        labels.push('\n');
    }

    format!(
        "You are a data analyst cleaning a personal finance dataset.\n\
Your job is to choose the right category for each bank transaction I send you.\n\
\n\
Choose one of the following categories:\n\
{labels}\n\
Categorize this transaction:\n\
{description}\n\
\n\
Answer ONLY with one of the categories above, spelled exactly as listed. \
Never answer with a category that is not in the list."
    )
}

/// Trim surrounding whitespace, then require an exact label match.
pub fn validate_label(raw: &str) -> Option<Category> {
    Category::from_label(raw.trim())
}

/// A record that ended up `Unclassified` and needs a human look.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub id: String,
    pub description: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Classified {
    /// Same order as the input records.
    pub transactions: Vec<Transaction>,
    pub review: Vec<ReviewItem>,
    /// Number of classifier calls issued (one per unique non-blank description).
    pub calls: usize,
}

enum Outcome {
    Label(Category),
    Rejected(String),
}

/// Classify every record.
///
/// Blank descriptions get no category. Each distinct non-blank description is
/// sent once; up to `concurrency` calls are in flight and results are joined
/// back in input order. Failures and out-of-set labels become
/// `Category::Unclassified` plus a `ReviewItem`; they never abort the batch.
pub async fn classify_all<C: Classifier>(
    records: Vec<StatementTransaction>,
    classifier: &C,
    concurrency: usize,
) -> Classified {
    let mut unique: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for r in &records {
        let d = r.description.trim();
        if d.is_empty() || index.contains_key(d) {
            continue;
        }
        index.insert(d.to_string(), unique.len());
        unique.push(d.to_string());
    }

    info!(
        "classifying {} unique description(s) for {} record(s)",
        unique.len(),
        records.len()
    );

    let outcomes: Vec<Outcome> = stream::iter(unique.iter())
        .map(|d| async move {
            match classifier.classify(d).await {
                Ok(raw) => match validate_label(&raw) {
                    Some(c) => {
                        debug!("{d:?} -> {c}");
                        Outcome::Label(c)
                    }
                    None => Outcome::Rejected(format!("label not in category set: {:?}", raw.trim())),
                },
                Err(e) => Outcome::Rejected(format!("classifier error: {e}")),
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut out = Classified {
        calls: unique.len(),
        ..Default::default()
    };

    for r in records {
        let key = r.description.trim();
        let category = match index.get(key) {
            None => None,
            Some(&i) => match &outcomes[i] {
                Outcome::Label(c) => Some(*c),
                Outcome::Rejected(reason) => {
                    warn!("{}: {} ({:?})", r.id, reason, key);
                    out.review.push(ReviewItem {
                        id: r.id.clone(),
                        description: r.description.clone(),
                        reason: reason.clone(),
                    });
                    Some(Category::Unclassified)
                }
            },
        };
        out.transactions.push(Transaction::new(
            r.id,
            r.date,
            r.amount,
            r.description,
            category,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use spendlens_ingest::StatementKind;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Canned answers; records every description it is asked about.
    struct Scripted {
        answers: HashMap<&'static str, Result<&'static str, &'static str>>,
        asked: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: &[(&'static str, Result<&'static str, &'static str>)]) -> Self {
            Self {
                answers: answers.iter().cloned().collect(),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for Scripted {
        async fn classify(&self, description: &str) -> Result<String, ClassifyError> {
            self.asked.lock().unwrap().push(description.to_string());
            match self.answers.get(description) {
                Some(Ok(label)) => Ok(label.to_string()),
                Some(Err(msg)) => Err(ClassifyError::Other(msg.to_string())),
                None => Err(ClassifyError::EmptyResponse),
            }
        }
    }

    /// Answers later descriptions sooner, to shake out ordering bugs.
    struct Slow;

    impl Classifier for Slow {
        async fn classify(&self, description: &str) -> Result<String, ClassifyError> {
            let n: u64 = description.trim_start_matches('d').parse().unwrap();
            tokio::time::sleep(Duration::from_millis(50 - n * 10)).await;
            Ok(if n % 2 == 0 { "Food" } else { "Health" }.to_string())
        }
    }

    fn stmt(id: &str, description: &str) -> StatementTransaction {
        StatementTransaction {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount: -10.0,
            description: description.to_string(),
            trn_type: None,
            account_id: None,
            kind: StatementKind::BankAccount,
        }
    }

    #[test]
    fn test_validate_label() {
        assert_eq!(validate_label("Groceries"), Some(Category::Groceries));
        assert_eq!(validate_label("  Groceries\n"), Some(Category::Groceries));
        assert_eq!(validate_label("groceries "), None);
        assert_eq!(validate_label("Groceries."), None);
        assert_eq!(validate_label("Unclassified"), None);
        assert_eq!(validate_label(""), None);
    }

    #[test]
    fn test_prompt_lists_every_label() {
        let p = classification_prompt("SUPERMARKET XYZ");
        for c in Category::ALL {
            assert!(p.contains(&format!("- {}\n", c.as_str())), "missing {c}");
        }
        assert!(p.contains("SUPERMARKET XYZ"));
        assert!(!p.contains("Unclassified"));
    }

    #[tokio::test]
    async fn test_exact_label_is_assigned() {
        let c = Scripted::new(&[("SUPERMARKET XYZ", Ok("Groceries"))]);
        let out = classify_all(vec![stmt("1", "SUPERMARKET XYZ")], &c, 1).await;
        assert_eq!(out.transactions[0].category, Some(Category::Groceries));
        assert!(out.review.is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_label_falls_back_to_sentinel() {
        let c = Scripted::new(&[("SUPERMARKET XYZ", Ok("groceries "))]);
        let out = classify_all(vec![stmt("1", "SUPERMARKET XYZ")], &c, 1).await;
        assert_eq!(out.transactions[0].category, Some(Category::Unclassified));
        assert_eq!(out.review.len(), 1);
        assert!(out.review[0].reason.contains("\"groceries\""), "{}", out.review[0].reason);
    }

    #[tokio::test]
    async fn test_service_error_is_isolated() {
        let c = Scripted::new(&[
            ("PHARMACY", Err("connection reset")),
            ("BUS TICKET", Ok("Transport")),
        ]);
        let out = classify_all(vec![stmt("1", "PHARMACY"), stmt("2", "BUS TICKET")], &c, 1).await;
        assert_eq!(out.transactions.len(), 2);
        assert_eq!(out.transactions[0].category, Some(Category::Unclassified));
        assert_eq!(out.transactions[1].category, Some(Category::Transport));
        assert_eq!(out.review[0].id, "1");
        assert!(out.review[0].reason.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_blank_description_not_sent() {
        let c = Scripted::new(&[]);
        let out = classify_all(vec![stmt("1", ""), stmt("2", "  \t")], &c, 1).await;
        assert!(c.asked.lock().unwrap().is_empty());
        assert_eq!(out.calls, 0);
        assert!(out.transactions.iter().all(|t| t.category.is_none()));
        assert!(out.review.is_empty());
    }

    #[tokio::test]
    async fn test_one_call_per_unique_description() {
        let c = Scripted::new(&[("NETFLIX", Ok("Shopping")), ("UBER", Ok("Transport"))]);
        let recs = vec![
            stmt("1", "NETFLIX"),
            stmt("2", "UBER"),
            stmt("3", " NETFLIX "),
            stmt("4", "NETFLIX"),
        ];
        let out = classify_all(recs, &c, 1).await;
        assert_eq!(*c.asked.lock().unwrap(), vec!["NETFLIX", "UBER"]);
        assert_eq!(out.calls, 2);
        assert_eq!(out.transactions[2].category, Some(Category::Shopping));
        // description text is kept as exported
        assert_eq!(out.transactions[2].description, " NETFLIX ");
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_input_order() {
        let recs: Vec<_> = (0..5).map(|i| stmt(&format!("id{i}"), &format!("d{i}"))).collect();
        let sequential = classify_all(recs.clone(), &Slow, 1).await;
        let parallel = classify_all(recs, &Slow, 4).await;
        assert_eq!(sequential.transactions, parallel.transactions);
        let ids: Vec<_> = parallel.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["id0", "id1", "id2", "id3", "id4"]);
        assert_eq!(parallel.transactions[1].category, Some(Category::Health));
    }
}
