//! Spoken income/expense entries: "spent 250 birr on lunch".

use serde::{Deserialize, Serialize};
use vox_core::{Category, TransactionType};
use vox_finance::categorize;

use crate::patterns::PatternLibrary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFinanceCommand {
    pub amount: f64,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub category: Category,
    pub description: String,
}

/// BIRR becomes ETB; symbols and spelled-out units map to their codes; the
/// rest are upper-cased unchanged.
pub fn normalize_currency(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "BIRR" => "ETB".to_string(),
        "$" | "DOLLAR" | "DOLLARS" => "USD".to_string(),
        "EURO" | "EUROS" => "EUR".to_string(),
        _ => upper,
    }
}

/// Amount with a currency unit AND an income or expense keyword.
pub fn is_finance_command(p: &PatternLibrary, text: &str) -> bool {
    p.amount.is_match(text) && (p.expense_keywords.is_match(text) || p.income_keywords.is_match(text))
}

/// Credit only for a clear income statement; anything ambiguous is a debit.
pub fn detect_transaction_type(p: &PatternLibrary, text: &str) -> TransactionType {
    let income = p.income_keywords.is_match(text);
    // "got paid" is income even though "paid" alone is an expense word
    let without_income = p.income_keywords.replace_all(text, " ");
    let expense = p.expense_keywords.is_match(&without_income);
    if income && !expense {
        TransactionType::Credit
    } else {
        TransactionType::Debit
    }
}

pub fn parse_finance_command(p: &PatternLibrary, text: &str) -> Option<ParsedFinanceCommand> {
    let text = text.trim();
    if !is_finance_command(p, text) {
        return None;
    }

    let caps = p.amount.captures(text)?;
    let (amount, currency) = match (caps.name("amt1"), caps.name("cur1")) {
        (Some(a), Some(c)) => (a.as_str(), c.as_str()),
        _ => (caps.name("amt2")?.as_str(), caps.name("cur2")?.as_str()),
    };
    let amount: f64 = amount.replace(',', "").parse().ok()?;
    if amount <= 0.0 {
        return None;
    }

    let whole = caps.get(0)?;
    let rest = text[whole.end()..].trim();
    let description = p
        .finance_description
        .captures(rest)
        .map(|c| c["desc"].to_string())
        .unwrap_or_else(|| rest.trim_end_matches(['.', '!']).trim().to_string());
    let description = if description.is_empty() {
        text.trim_end_matches(['.', '!']).to_string()
    } else {
        description
    };

    let transaction_type = detect_transaction_type(p, text);

    Some(ParsedFinanceCommand {
        amount,
        currency: normalize_currency(currency),
        transaction_type,
        category: categorize(text, transaction_type),
        description,
    })
}
