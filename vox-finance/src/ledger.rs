//! Ledger: groups recorded finance entries into per-category totals
//! for a month, highest spending first.

use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use vox_core::finance::{Category, FinanceEntry, TransactionType};

/// Totals for one (category, currency) bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub currency: String,
    pub debit_total: f64,
    pub credit_total: f64,
    pub entry_count: usize,
    pub summary: String,
}

impl CategoryTotal {
    pub fn net(&self) -> f64 {
        self.credit_total - self.debit_total
    }
}

pub struct Ledger;

impl Ledger {
    /// Group entries by (category, currency), sorted by spending descending
    pub fn summarize(entries: &[FinanceEntry]) -> Vec<CategoryTotal> {
        let mut groups: HashMap<(Category, String), Vec<&FinanceEntry>> = HashMap::new();

        for e in entries {
            groups
                .entry((e.category, e.currency.clone()))
                .or_default()
                .push(e);
        }

        let mut totals: Vec<CategoryTotal> = groups
            .into_iter()
            .map(|((category, currency), items)| {
                let debit_total: f64 = items
                    .iter()
                    .filter(|e| e.transaction_type == TransactionType::Debit)
                    .map(|e| e.amount)
                    .sum();
                let credit_total: f64 = items
                    .iter()
                    .filter(|e| e.transaction_type == TransactionType::Credit)
                    .map(|e| e.amount)
                    .sum();
                let count = items.len();

                let summary = if credit_total > 0.0 && debit_total == 0.0 {
                    format!("{}: +{:.2} {} across {} entries", category.label(), credit_total, currency, count)
                } else {
                    format!("{}: {:.2} {} across {} entries", category.label(), debit_total, currency, count)
                };

                CategoryTotal {
                    category,
                    currency,
                    debit_total,
                    credit_total,
                    entry_count: count,
                    summary,
                }
            })
            .collect();

        // Spending descending, then category for a stable order
        totals.sort_by(|a, b| {
            b.debit_total
                .total_cmp(&a.debit_total)
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.currency.cmp(&b.currency))
        });
        totals
    }

    /// Entries recorded in the given calendar month
    pub fn in_month(entries: &[FinanceEntry], year: i32, month: u32) -> Vec<FinanceEntry> {
        entries
            .iter()
            .filter(|e| e.recorded_at.year() == year && e.recorded_at.month() == month)
            .cloned()
            .collect()
    }

    /// Net balance (credits minus debits) per currency
    pub fn net_by_currency(entries: &[FinanceEntry]) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for e in entries {
            *out.entry(e.currency.clone()).or_insert(0.0) += e.signed_amount();
        }
        out
    }
}
