use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, LedgerEntry, UserId};

pub type StatementId = i64;

/// A dated snapshot of one user's income and expenditure.
/// Statements are immutable once created; the report date is assigned by the
/// server at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub user_id: UserId,
    pub report_date: DateTime<Utc>,
    pub incomes: Vec<LedgerEntry>,
    pub expenditures: Vec<LedgerEntry>,
}

impl Statement {
    pub fn total_income(&self) -> Amount {
        self.incomes.iter().map(|e| e.amount).sum()
    }

    pub fn total_expenditure(&self) -> Amount {
        self.expenditures.iter().map(|e| e.amount).sum()
    }

    /// All line items, incomes first.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.incomes.iter().chain(self.expenditures.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.incomes.is_empty() && self.expenditures.is_empty()
    }
}
