//! Subscription records and the billing arithmetic behind them.
//!
//! A [`SubscriptionRecord`] is created once by the normaliser and is never
//! re-priced afterwards: `monthly` and `yearly` are fixed at creation from
//! `amount` and `frequency`. Only `category` changes over a record's life.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Average number of weeks in a month, used for weekly (and unknown) cadences.
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Weeks in a year.
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Round to two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One recurring charge found in a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,
    pub name: String,
    /// Charge per billing cycle, as reported.
    pub amount: f64,
    /// Lower-cased cadence label, as reported.
    pub frequency: String,
    pub last_charged: String,
    /// How many times the charge appears in the statement.
    pub count: u32,
    pub category: Category,
    pub monthly: f64,
    pub yearly: f64,
    pub cancel_url: String,
}

impl SubscriptionRecord {
    /// Build a `pending` record, deriving the monthly and yearly figures.
    ///
    /// `frequency` is lower-cased before it is stored or classified.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
        frequency: &str,
        last_charged: impl Into<String>,
        count: u32,
        cancel_url: impl Into<String>,
    ) -> Self {
        let frequency = frequency.to_lowercase();
        let cycle = BillingCycle::classify(&frequency);
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            frequency,
            last_charged: last_charged.into(),
            count,
            category: Category::Pending,
            monthly: round2(cycle.monthly_equivalent(amount)),
            yearly: round2(cycle.yearly_equivalent(amount)),
            cancel_url: cancel_url.into(),
        }
    }

    pub fn billing_cycle(&self) -> BillingCycle {
        BillingCycle::classify(&self.frequency)
    }
}

// ── Billing cycle ────────────────────────────────────────────────────────

/// How often a charge recurs.
///
/// Only `monthly` and `yearly` are recognised by name; every other label,
/// including `weekly`, lands in [`BillingCycle::Weekly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Classify a free-text frequency label. Case-insensitive; surrounding
    /// whitespace is not stripped, so `" monthly"` is priced weekly.
    pub fn classify(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "monthly" => BillingCycle::Monthly,
            "yearly" => BillingCycle::Yearly,
            _ => BillingCycle::Weekly,
        }
    }

    /// Unrounded monthly cost of a charge of `amount` per cycle.
    pub fn monthly_equivalent(self, amount: f64) -> f64 {
        match self {
            BillingCycle::Monthly => amount,
            BillingCycle::Yearly => amount / 12.0,
            BillingCycle::Weekly => amount * WEEKS_PER_MONTH,
        }
    }

    /// Unrounded yearly cost of a charge of `amount` per cycle.
    pub fn yearly_equivalent(self, amount: f64) -> f64 {
        match self {
            BillingCycle::Monthly => amount * 12.0,
            BillingCycle::Yearly => amount,
            BillingCycle::Weekly => amount * WEEKS_PER_YEAR,
        }
    }
}

// ── Category ─────────────────────────────────────────────────────────────

/// The user's triage decision for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Pending,
    Keep,
    Cancel,
    Investigate,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Pending,
        Category::Keep,
        Category::Cancel,
        Category::Investigate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pending => "pending",
            Category::Keep => "keep",
            Category::Cancel => "cancel",
            Category::Investigate => "investigate",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a form value is not one of the four categories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected pending, keep, cancel or investigate)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Category::Pending),
            "keep" => Ok(Category::Keep),
            "cancel" => Ok(Category::Cancel),
            "investigate" => Ok(Category::Investigate),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}
