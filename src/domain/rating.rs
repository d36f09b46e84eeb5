use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Amount, Statement};

/// Letter grade for an expenditure-to-income ratio. A is best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Grade a ratio. Upper bounds are inclusive except for A:
    /// `< 0.1` A, `<= 0.3` B, `<= 0.5` C, anything else D.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.1 {
            Grade::A
        } else if ratio <= 0.3 {
            Grade::B
        } else if ratio <= 0.5 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of rating one or more statements. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    pub total_income: Amount,
    pub total_expenditure: Amount,
    pub disposable_income: Amount,
    pub ratio: f64,
    pub grade: Grade,
}

/// Rate the combined line items of the given statements.
///
/// With no income the ratio is pinned to 1.0, which always grades D.
/// Never fails: an empty slice rates as zero income and zero expenditure.
pub fn calculate_rating(statements: &[Statement]) -> RatingResult {
    let total_income: Amount = statements
        .iter()
        .flat_map(|s| s.incomes.iter())
        .map(|e| e.amount)
        .sum();
    let total_expenditure: Amount = statements
        .iter()
        .flat_map(|s| s.expenditures.iter())
        .map(|e| e.amount)
        .sum();

    let ratio = if total_income > 0.0 {
        total_expenditure / total_income
    } else {
        1.0
    };

    RatingResult {
        total_income,
        total_expenditure,
        disposable_income: total_income - total_expenditure,
        ratio,
        grade: Grade::from_ratio(ratio),
    }
}
