//! Deterministic keyword rules mapping transaction descriptions to categories.
//!
//! Used as the offline classifier (`--classifier rules`) and in tests. Anything
//! the rules cannot place comes back as the sentinel label, which the pipeline
//! routes to manual review.

use spendlens_core::Category;

use crate::classify::{Classifier, ClassifyError};

/// Keyword classifier. Matching is case-insensitive substring search;
/// the first rule that matches wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesClassifier;

/// Categorize a description, or `None` when no rule matches.
pub fn categorize(description: &str) -> Option<Category> {
    let desc = description.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| desc.contains(w));

    // Income
    if any(&["payroll", "salary", "salario", "direct deposit", "stipend", "refund", "estorno"]) {
        return Some(Category::Income);
    }

    // Investment
    if any(&["invest", "brokerage", "vanguard", "fidelity", "tesouro", "cdb", "dividend"]) {
        return Some(Category::Investment);
    }

    // Transfers to third parties
    if any(&["zelle", "pix", "wire transfer", "transfer to", "ted ", "doc ", "venmo", "remitly"]) {
        return Some(Category::Transfers);
    }

    // Housing
    if any(&["rent", "aluguel", "lease", "landlord", "mortgage", "condominio", "electric", "water bill"]) {
        return Some(Category::Housing);
    }

    // Phone / internet
    if any(&["vivo", "claro", "t-mobile", "verizon", "at&t", "telecom", "mobile", "phone"]) {
        return Some(Category::Phone);
    }

    // Education
    if any(&["tuition", "university", "school", "course", "udemy", "coursera", "bookstore"]) {
        return Some(Category::Education);
    }

    // Health
    if any(&["pharmacy", "farmacia", "drogaria", "hospital", "clinic", "dental", "doctor"]) {
        return Some(Category::Health);
    }

    // Groceries
    if any(&["supermarket", "supermercado", "grocery", "mercado", "whole foods", "costco", "h-e-b"]) {
        return Some(Category::Groceries);
    }

    // Transport
    if any(&["uber", "lyft", "99app", "taxi", "metro", "bus", "fuel", "gas station", "posto", "parking"]) {
        return Some(Category::Transport);
    }

    // Food
    if any(&["restaurant", "restaurante", "ifood", "doordash", "grubhub", "cafe", "bakery", "padaria", "pizza"]) {
        return Some(Category::Food);
    }

    // Shopping
    if any(&["amazon", "walmart", "target", "shop", "store", "mall", "netflix", "spotify"]) {
        return Some(Category::Shopping);
    }

    None
}

impl Classifier for RulesClassifier {
    async fn classify(&self, description: &str) -> Result<String, ClassifyError> {
        Ok(categorize(description)
            .unwrap_or(Category::Unclassified)
            .as_str()
            .to_string())
    }
}
