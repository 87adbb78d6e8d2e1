use chrono::{NaiveDate, NaiveDateTime};
use vox_core::{Category, FinanceEntry, TransactionType};
use vox_finance::{Ledger, categorize};

fn at(month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, month, day)
        .unwrap()
        .and_hms_opt(19, 30, 0)
        .unwrap()
}

fn spoken(amount: f64, currency: &str, tt: TransactionType, description: &str, when: NaiveDateTime) -> FinanceEntry {
    FinanceEntry::new(amount, currency, tt, categorize(description, tt), description, when)
}

/// A month of spoken entries summarizes the way the assistant reads it back.
#[test]
fn test_month_of_spoken_entries() {
    let entries = vec![
        spoken(250.0, "ETB", TransactionType::Debit, "lunch with Hana", at(10, 1)),
        spoken(120.0, "ETB", TransactionType::Debit, "taxi to Bole", at(10, 2)),
        spoken(80.0, "ETB", TransactionType::Debit, "bus fare", at(10, 3)),
        spoken(6000.0, "ETB", TransactionType::Debit, "rent", at(10, 5)),
        spoken(15000.0, "ETB", TransactionType::Credit, "salary", at(10, 25)),
        spoken(20.0, "USD", TransactionType::Debit, "netflix subscription", at(10, 8)),
        // previous month, filtered out
        spoken(999.0, "ETB", TransactionType::Debit, "shoes", at(9, 30)),
    ];

    let october = Ledger::in_month(&entries, 2026, 10);
    assert_eq!(october.len(), 6);

    let totals = Ledger::summarize(&october);
    let categories: Vec<(Category, &str)> = totals.iter().map(|t| (t.category, t.currency.as_str())).collect();
    assert_eq!(
        categories,
        vec![
            (Category::Bills, "ETB"),
            (Category::Food, "ETB"),
            (Category::Transport, "ETB"),
            (Category::Entertainment, "USD"),
            (Category::Income, "ETB"),
        ]
    );

    let transport = &totals[2];
    assert_eq!(transport.debit_total, 200.0);
    assert_eq!(transport.entry_count, 2);

    let net = Ledger::net_by_currency(&october);
    assert_eq!(net.get("ETB"), Some(&(15000.0 - 6000.0 - 250.0 - 200.0)));
    assert_eq!(net.get("USD"), Some(&-20.0));
}
