//! Finance entry types for spoken income/expense tracking

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A spoken transaction, e.g. "spent 250 birr on lunch"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinanceEntry {
    /// Assigned by the store on insert
    pub id: i64,
    /// Always positive; direction lives in `transaction_type`
    pub amount: f64,
    /// ISO-ish currency code (ETB, USD, ...)
    pub currency: String,
    pub transaction_type: TransactionType,
    /// Deterministic category
    pub category: Category,
    /// Human-readable description
    pub description: String,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money out
    Debit,
    /// Money in
    Credit,
}

/// Spending categories matched deterministically
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[serde(rename = "food")]
    Food,
    #[serde(rename = "transport")]
    Transport,
    #[serde(rename = "shopping")]
    Shopping,
    #[serde(rename = "bills")]
    Bills,
    #[serde(rename = "health")]
    Health,
    #[serde(rename = "entertainment")]
    Entertainment,
    #[serde(rename = "education")]
    Education,
    #[serde(rename = "income")]
    Income,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Food => "Food & dining",
            Category::Transport => "Transport",
            Category::Shopping => "Shopping",
            Category::Bills => "Bills & utilities",
            Category::Health => "Health",
            Category::Entertainment => "Entertainment",
            Category::Education => "Education",
            Category::Income => "Income",
            Category::Other => "Other",
        }
    }
}

impl FinanceEntry {
    pub fn new(
        amount: f64,
        currency: impl Into<String>,
        transaction_type: TransactionType,
        category: Category,
        description: impl Into<String>,
        recorded_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            amount: amount.abs(),
            currency: currency.into(),
            transaction_type,
            category,
            description: description.into(),
            recorded_at,
        }
    }

    /// Returns true if this is money out
    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Debit
    }

    /// Signed amount: negative for expenses
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Debit => -self.amount,
            TransactionType::Credit => self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_finance_entry_creation() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let entry = FinanceEntry::new(-250.0, "ETB", TransactionType::Debit, Category::Food, "lunch", at);
        assert_eq!(entry.amount, 250.0);
        assert!(entry.is_expense());
        assert_eq!(entry.signed_amount(), -250.0);
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&Category::Bills).unwrap();
        assert_eq!(json, "\"bills\"");
    }
}
