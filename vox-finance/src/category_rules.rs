//! Deterministic category rules mapping a spoken transaction description
//! to vox's spending Category.
//!
//! Plain keyword matches; spoken descriptions are short and predictable.

use vox_core::finance::{Category, TransactionType};

/// Keyword table in priority order; the first category with a hit wins.
const RULES: &[(Category, &[&str])] = &[
    (
        Category::Income,
        &["salary", "paycheck", "payroll", "wage", "bonus", "freelance", "refund", "stipend"],
    ),
    (
        Category::Bills,
        &[
            "rent", "electric", "electricity", "water bill", "internet", "wifi", "phone bill",
            "airtime", "mobile card", "utility", "utilities", "bill",
        ],
    ),
    (
        Category::Health,
        &["medicine", "pharmacy", "hospital", "clinic", "doctor", "dentist", "pills"],
    ),
    (
        Category::Education,
        &["tuition", "school fee", "books", "course", "class", "exam"],
    ),
    (
        Category::Transport,
        &["taxi", "uber", "ride", "bus", "fuel", "petrol", "gas", "parking", "train", "transport", "bajaj"],
    ),
    (
        Category::Food,
        &[
            "lunch", "dinner", "breakfast", "coffee", "food", "restaurant", "groceries", "grocery",
            "snack", "injera", "meal", "drinks",
        ],
    ),
    (
        Category::Entertainment,
        &["movie", "cinema", "netflix", "spotify", "game", "concert", "party", "subscription"],
    ),
    (
        Category::Shopping,
        &["clothes", "shoes", "shirt", "dress", "shopping", "market", "gift", "electronics"],
    ),
];

/// Categorize a transaction description.
/// Priority: keyword table order > income fallback for credits > Other.
pub fn categorize(description: &str, transaction_type: TransactionType) -> Category {
    let desc = description.to_lowercase();

    for (category, keywords) in RULES {
        if keywords.iter().any(|k| contains_word(&desc, k)) {
            return *category;
        }
    }

    match transaction_type {
        TransactionType::Credit => Category::Income,
        TransactionType::Debit => Category::Other,
    }
}

/// Keyword match on word boundaries so "bus" does not hit "business".
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric() || c == 's');
        before_ok && after_ok
    })
}
