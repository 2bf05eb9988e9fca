//! Spending categories

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Canonical spending categories
///
/// Display names match the strings the model is expected to produce;
/// parsing rejects anything else rather than coercing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FoodAndDining,
    Groceries,
    Transportation,
    Shopping,
    Entertainment,
    BillsAndUtilities,
    Healthcare,
    Education,
    Travel,
    PersonalCare,
    Fitness,
    Subscriptions,
    Other,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Self; 13] = [
        Self::FoodAndDining,
        Self::Groceries,
        Self::Transportation,
        Self::Shopping,
        Self::Entertainment,
        Self::BillsAndUtilities,
        Self::Healthcare,
        Self::Education,
        Self::Travel,
        Self::PersonalCare,
        Self::Fitness,
        Self::Subscriptions,
        Self::Other,
    ];

    /// Canonical display name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FoodAndDining => "Food & Dining",
            Self::Groceries => "Groceries",
            Self::Transportation => "Transportation",
            Self::Shopping => "Shopping",
            Self::Entertainment => "Entertainment",
            Self::BillsAndUtilities => "Bills & Utilities",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::Travel => "Travel",
            Self::PersonalCare => "Personal Care",
            Self::Fitness => "Fitness",
            Self::Subscriptions => "Subscriptions",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    /// Case-insensitive match on the display name; unknown names are
    /// rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::Validation(format!("unknown category: {s}")))
    }
}
