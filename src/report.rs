//! Totals and the categorised savings report.

use crate::model::{round2, Category, SubscriptionRecord};
use serde::{Deserialize, Serialize};

/// Sums shown under the subscription table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_monthly: f64,
    pub total_yearly: f64,
    pub count: usize,
}

impl Totals {
    pub fn from_records(records: &[SubscriptionRecord]) -> Self {
        Self {
            total_monthly: round2(records.iter().map(|r| r.monthly).sum()),
            total_yearly: round2(records.iter().map(|r| r.yearly).sum()),
            count: records.len(),
        }
    }
}

/// Records split by category, with the yearly savings from cancelling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub keep: Vec<SubscriptionRecord>,
    pub cancel: Vec<SubscriptionRecord>,
    pub investigate: Vec<SubscriptionRecord>,
    pub pending: Vec<SubscriptionRecord>,
    /// Sum of `yearly` over cancelled records, 2 dp.
    pub savings: f64,
    /// Sum of `yearly` over all records, 2 dp.
    pub total_yearly: f64,
    pub total: usize,
}

impl Report {
    pub fn from_records(records: &[SubscriptionRecord]) -> Self {
        let pick = |category: Category| -> Vec<SubscriptionRecord> {
            records
                .iter()
                .filter(|r| r.category == category)
                .cloned()
                .collect()
        };

        let cancel = pick(Category::Cancel);
        let savings = round2(cancel.iter().map(|r| r.yearly).sum());

        Self {
            keep: pick(Category::Keep),
            investigate: pick(Category::Investigate),
            pending: pick(Category::Pending),
            cancel,
            savings,
            total_yearly: round2(records.iter().map(|r| r.yearly).sum()),
            total: records.len(),
        }
    }

    /// Records in one category.
    pub fn bucket(&self, category: Category) -> &[SubscriptionRecord] {
        match category {
            Category::Keep => &self.keep,
            Category::Cancel => &self.cancel,
            Category::Investigate => &self.investigate,
            Category::Pending => &self.pending,
        }
    }
}
