//! vox-finance: spoken-transaction category rules and the monthly ledger

pub mod category_rules;
pub mod ledger;

pub use category_rules::categorize;
pub use ledger::{CategoryTotal, Ledger};
