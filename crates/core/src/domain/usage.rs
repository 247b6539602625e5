use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One metered billing interval as supplied by the usage store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    pub timestamp: NaiveDate,
    pub kwh: Decimal,
    #[serde(default)]
    pub cost: Option<Decimal>,
}

impl UsagePoint {
    pub fn new(timestamp: NaiveDate, kwh: Decimal) -> Self {
        Self { timestamp, kwh, cost: None }
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Calendar month used as the bucketing key for usage history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillingMonth {
    pub year: i32,
    pub month: u32,
}

impl BillingMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// Months since year 0, so consecutive months differ by exactly one.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn from_ordinal(ordinal: i64) -> Self {
        let year = ordinal.div_euclid(12);
        let month = ordinal.rem_euclid(12) + 1;
        Self { year: year as i32, month: month as u32 }
    }

    pub fn offset(&self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Complete,
    Partial,
    Insufficient,
}

impl DataQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Insufficient => "insufficient",
        }
    }
}

/// Normalized summary of a customer's consumption over the trailing year.
///
/// `annual_kwh` is the observed sum when a full year is present and the
/// annualised monthly average otherwise. `annual_billed_cost` is only set
/// when every observed month carries a billed amount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageProfile {
    pub average_monthly_kwh: Decimal,
    pub peak_month: Option<BillingMonth>,
    pub peak_month_kwh: Decimal,
    pub annual_kwh: Decimal,
    pub seasonal_variation: f64,
    pub usage_trend: UsageTrend,
    pub data_quality: DataQuality,
    pub months_observed: u32,
    pub annual_billed_cost: Option<Decimal>,
}

impl UsageProfile {
    pub fn empty() -> Self {
        Self {
            average_monthly_kwh: Decimal::ZERO,
            peak_month: None,
            peak_month_kwh: Decimal::ZERO,
            annual_kwh: Decimal::ZERO,
            seasonal_variation: 0.0,
            usage_trend: UsageTrend::Stable,
            data_quality: DataQuality::Insufficient,
            months_observed: 0,
            annual_billed_cost: None,
        }
    }
}
