//! Spoken income/expense entries and their monthly roll-up.

use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::info;
use vox_core::FinanceEntry;
use vox_finance::{CategoryTotal, Ledger};
use vox_parse::ParsedFinanceCommand;

use crate::error::EngineResult;
use crate::ports::Ports;

pub struct FinanceManager {
    ports: Ports,
}

impl FinanceManager {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn record(&self, cmd: &ParsedFinanceCommand) -> EngineResult<FinanceEntry> {
        let mut entry = FinanceEntry::new(
            cmd.amount,
            cmd.currency.clone(),
            cmd.transaction_type,
            cmd.category,
            cmd.description.clone(),
            self.ports.clock.now(),
        );
        entry.id = self.ports.finance.insert_entry(entry.clone()).await?;
        info!(entry_id = entry.id, amount = entry.amount, currency = %entry.currency, "finance entry recorded");
        Ok(entry)
    }

    /// Category totals for a month; defaults to the current one.
    pub async fn monthly_summary(&self, month: Option<(i32, u32)>) -> EngineResult<Vec<CategoryTotal>> {
        let (year, month) = month.unwrap_or_else(|| {
            let today = self.ports.clock.now().date();
            (today.year(), today.month())
        });
        let entries = self.ports.finance.entries().await?;
        Ok(Ledger::summarize(&Ledger::in_month(&entries, year, month)))
    }

    pub async fn net_by_currency(&self) -> EngineResult<BTreeMap<String, f64>> {
        Ok(Ledger::net_by_currency(&self.ports.finance.entries().await?))
    }
}
