use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::plan::ContractType;
use crate::errors::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostPriority {
    Low,
    Medium,
    High,
}

impl CostPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConstraints {
    #[serde(default)]
    pub max_monthly_cost: Option<Decimal>,
    #[serde(default)]
    pub max_annual_cost: Option<Decimal>,
}

/// What the customer told us they care about.
///
/// `supplier_rating_preference` is a hard floor and the budget limits are hard
/// ceilings; everything else only moves the score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub cost_savings_priority: CostPriority,
    #[serde(default)]
    pub flexibility_preference_months: u32,
    #[serde(default)]
    pub renewable_energy_preference: f64,
    #[serde(default)]
    pub supplier_rating_preference: f64,
    #[serde(default)]
    pub contract_type_preference: Option<ContractType>,
    #[serde(default)]
    pub early_termination_fee_tolerance: Decimal,
    #[serde(default)]
    pub budget_constraints: Option<BudgetConstraints>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            cost_savings_priority: CostPriority::Medium,
            flexibility_preference_months: 12,
            renewable_energy_preference: 0.0,
            supplier_rating_preference: 0.0,
            contract_type_preference: None,
            early_termination_fee_tolerance: Decimal::ZERO,
            budget_constraints: None,
        }
    }
}

impl UserPreferences {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=100.0).contains(&self.renewable_energy_preference) {
            return Err(EngineError::Validation(
                "preferences.renewable_energy_preference must be in range 0..=100".to_string(),
            ));
        }

        if !(0.0..=5.0).contains(&self.supplier_rating_preference) {
            return Err(EngineError::Validation(
                "preferences.supplier_rating_preference must be in range 0..=5".to_string(),
            ));
        }

        if self.early_termination_fee_tolerance < Decimal::ZERO {
            return Err(EngineError::Validation(
                "preferences.early_termination_fee_tolerance must not be negative".to_string(),
            ));
        }

        if let Some(budget) = &self.budget_constraints {
            let limits = [
                ("max_monthly_cost", budget.max_monthly_cost),
                ("max_annual_cost", budget.max_annual_cost),
            ];
            for (field, limit) in limits {
                if limit.is_some_and(|value| value <= Decimal::ZERO) {
                    return Err(EngineError::Validation(format!(
                        "preferences.budget_constraints.{field} must be greater than zero"
                    )));
                }
            }
        }

        Ok(())
    }
}
