use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::InvalidPlanError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    Fixed,
    Variable,
    Indexed,
    Hybrid,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
            Self::Indexed => "indexed",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for ContractType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "variable" => Ok(Self::Variable),
            "indexed" => Ok(Self::Indexed),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unsupported contract type `{other}` (expected fixed|variable|indexed|hybrid)"
            )),
        }
    }
}

/// Introductory rate applied to the first `months` of supply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionalRate {
    pub rate: Decimal,
    pub months: u32,
}

/// Rate structure of a plan, one variant per contract type.
///
/// Indexed plans track a published wholesale index, so the rate is only the
/// current point estimate and no introductory period is offered. Hybrid plans
/// lock the rate for `fixed_months` before it floats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "contract_type", rename_all = "snake_case")]
pub enum PlanPricing {
    Fixed {
        rate_per_kwh: Decimal,
        #[serde(default)]
        promotional_rate: Option<PromotionalRate>,
    },
    Variable {
        rate_per_kwh: Decimal,
        #[serde(default)]
        promotional_rate: Option<PromotionalRate>,
    },
    Indexed {
        rate_per_kwh: Decimal,
        #[serde(default)]
        index_name: Option<String>,
    },
    Hybrid {
        rate_per_kwh: Decimal,
        #[serde(default)]
        fixed_months: u32,
        #[serde(default)]
        promotional_rate: Option<PromotionalRate>,
    },
}

impl PlanPricing {
    pub fn contract_type(&self) -> ContractType {
        match self {
            Self::Fixed { .. } => ContractType::Fixed,
            Self::Variable { .. } => ContractType::Variable,
            Self::Indexed { .. } => ContractType::Indexed,
            Self::Hybrid { .. } => ContractType::Hybrid,
        }
    }

    pub fn rate_per_kwh(&self) -> Decimal {
        match self {
            Self::Fixed { rate_per_kwh, .. }
            | Self::Variable { rate_per_kwh, .. }
            | Self::Indexed { rate_per_kwh, .. }
            | Self::Hybrid { rate_per_kwh, .. } => *rate_per_kwh,
        }
    }

    pub fn promotional_rate(&self) -> Option<&PromotionalRate> {
        match self {
            Self::Fixed { promotional_rate, .. }
            | Self::Variable { promotional_rate, .. }
            | Self::Hybrid { promotional_rate, .. } => promotional_rate.as_ref(),
            Self::Indexed { .. } => None,
        }
    }

    /// Length of the locked-rate period that opens a hybrid plan.
    pub fn fixed_rate_months(&self) -> Option<u32> {
        match self {
            Self::Hybrid { fixed_months, .. } => Some(*fixed_months),
            _ => None,
        }
    }

    /// Variable and indexed rates can move during the term.
    pub fn is_rate_uncertain(&self) -> bool {
        matches!(self, Self::Variable { .. } | Self::Indexed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyPlan {
    pub plan_id: PlanId,
    pub supplier_name: String,
    pub pricing: PlanPricing,
    #[serde(default)]
    pub contract_length_months: u32,
    #[serde(default)]
    pub early_termination_fee: Decimal,
    #[serde(default)]
    pub renewable_percentage: f64,
    pub supplier_rating: f64,
    #[serde(default)]
    pub monthly_fee: Decimal,
    #[serde(default)]
    pub terms_url: Option<String>,
}

impl EnergyPlan {
    pub fn new(
        plan_id: impl Into<String>,
        supplier_name: impl Into<String>,
        pricing: PlanPricing,
    ) -> Self {
        Self {
            plan_id: PlanId::new(plan_id),
            supplier_name: supplier_name.into(),
            pricing,
            contract_length_months: 0,
            early_termination_fee: Decimal::ZERO,
            renewable_percentage: 0.0,
            supplier_rating: 5.0,
            monthly_fee: Decimal::ZERO,
            terms_url: None,
        }
    }

    pub fn fixed(
        plan_id: impl Into<String>,
        supplier_name: impl Into<String>,
        rate_per_kwh: Decimal,
    ) -> Self {
        Self::new(
            plan_id,
            supplier_name,
            PlanPricing::Fixed { rate_per_kwh, promotional_rate: None },
        )
    }

    pub fn contract_type(&self) -> ContractType {
        self.pricing.contract_type()
    }

    pub fn rate_per_kwh(&self) -> Decimal {
        self.pricing.rate_per_kwh()
    }

    pub fn with_contract(mut self, length_months: u32, early_termination_fee: Decimal) -> Self {
        self.contract_length_months = length_months;
        self.early_termination_fee = early_termination_fee;
        self
    }

    pub fn with_renewable_percentage(mut self, percentage: f64) -> Self {
        self.renewable_percentage = percentage;
        self
    }

    pub fn with_supplier_rating(mut self, rating: f64) -> Self {
        self.supplier_rating = rating;
        self
    }

    pub fn with_monthly_fee(mut self, fee: Decimal) -> Self {
        self.monthly_fee = fee;
        self
    }

    pub fn with_terms_url(mut self, url: impl Into<String>) -> Self {
        self.terms_url = Some(url.into());
        self
    }

    /// Checks the record invariants the catalog is expected to uphold.
    pub fn validate(&self) -> Result<(), InvalidPlanError> {
        if self.plan_id.0.trim().is_empty() {
            return Err(InvalidPlanError::MissingPlanId);
        }

        let rate = self.rate_per_kwh();
        if rate <= Decimal::ZERO {
            return Err(InvalidPlanError::NonPositiveRate { plan_id: self.plan_id.clone(), rate });
        }

        if let Some(promo) = self.pricing.promotional_rate() {
            if promo.rate < Decimal::ZERO || promo.months == 0 {
                return Err(InvalidPlanError::InvalidPromotion {
                    plan_id: self.plan_id.clone(),
                    rate: promo.rate,
                    months: promo.months,
                });
            }
        }

        if !(0.0..=100.0).contains(&self.renewable_percentage) {
            return Err(InvalidPlanError::OutOfRange {
                plan_id: self.plan_id.clone(),
                field: "renewable_percentage",
                value: self.renewable_percentage,
            });
        }

        if !(0.0..=5.0).contains(&self.supplier_rating) {
            return Err(InvalidPlanError::OutOfRange {
                plan_id: self.plan_id.clone(),
                field: "supplier_rating",
                value: self.supplier_rating,
            });
        }

        if self.monthly_fee < Decimal::ZERO {
            return Err(InvalidPlanError::NegativeAmount {
                plan_id: self.plan_id.clone(),
                field: "monthly_fee",
                amount: self.monthly_fee,
            });
        }

        if self.early_termination_fee < Decimal::ZERO {
            return Err(InvalidPlanError::NegativeAmount {
                plan_id: self.plan_id.clone(),
                field: "early_termination_fee",
                amount: self.early_termination_fee,
            });
        }

        Ok(())
    }
}

/// The customer's existing supply contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPlan {
    pub rate_per_kwh: Decimal,
    #[serde(default)]
    pub contract_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub early_termination_fee: Decimal,
}

impl CurrentPlan {
    pub const PLAN_ID: &'static str = "current";

    /// Fixed-rate stand-in so the current contract can be projected like a candidate.
    pub fn as_energy_plan(&self) -> EnergyPlan {
        EnergyPlan::fixed(Self::PLAN_ID, "current supplier", self.rate_per_kwh)
    }
}
