use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{parse_amount, Amount};

pub type EntryId = i64;

/// Which side of a statement a line item sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expenditure,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expenditure => "expenditure",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(EntryKind::Income),
            "expenditure" => Some(EntryKind::Expenditure),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A persisted income or expenditure line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub category: String,
    pub amount: Amount,
}

/// A line item as submitted by a caller, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub category: String,
    pub amount: Amount,
}

impl EntryDraft {
    pub fn new(category: impl Into<String>, amount: Amount) -> Self {
        Self {
            category: category.into(),
            amount,
        }
    }

    /// Check the draft and return it with its category trimmed.
    ///
    /// NaN and infinities are not positive reals and fail like zero does.
    pub fn validate(&self) -> Result<ValidEntry, EntryError> {
        let category = self.category.trim();
        if category.is_empty() {
            return Err(EntryError::EmptyCategory);
        }

        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(EntryError::NonPositiveAmount(self.amount));
        }

        Ok(ValidEntry {
            category: category.to_string(),
            amount: self.amount,
        })
    }
}

/// Parses the `CATEGORY=AMOUNT` form used on the command line.
/// The last `=` separates the two, so categories may contain `=`.
impl FromStr for EntryDraft {
    type Err = ParseEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, amount) = s.rsplit_once('=').ok_or(ParseEntryError::MissingSeparator)?;
        let amount = parse_amount(amount).map_err(|_| ParseEntryError::InvalidAmount)?;
        Ok(EntryDraft::new(category, amount))
    }
}

/// A line item that passed validation. Only `EntryDraft::validate` builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEntry {
    category: String,
    amount: Amount,
}

impl ValidEntry {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryError {
    EmptyCategory,
    NonPositiveAmount(Amount),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryError::EmptyCategory => write!(f, "category cannot be empty"),
            EntryError::NonPositiveAmount(amount) => {
                write!(f, "amount must be positive, got {}", amount)
            }
        }
    }
}

impl std::error::Error for EntryError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEntryError {
    MissingSeparator,
    InvalidAmount,
}

impl fmt::Display for ParseEntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseEntryError::MissingSeparator => {
                write!(f, "line item must look like CATEGORY=AMOUNT")
            }
            ParseEntryError::InvalidAmount => write!(f, "invalid line item amount"),
        }
    }
}

impl std::error::Error for ParseEntryError {}
