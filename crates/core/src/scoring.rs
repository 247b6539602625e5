//! Preference scoring and hard filters for candidate plans.

use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::plan::EnergyPlan;
use crate::domain::preferences::{CostPriority, UserPreferences};
use crate::domain::recommendation::{ComponentScores, CostProjection, ExclusionReason};

/// Weights for scoring components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Cost weight when savings priority is low (default: 0.20)
    pub cost_low: f64,
    /// Cost weight when savings priority is medium (default: 0.40)
    pub cost_medium: f64,
    /// Cost weight when savings priority is high (default: 0.60)
    pub cost_high: f64,
    /// Weight for renewable-share match (default: 0.20)
    pub renewable: f64,
    /// Weight for contract flexibility (default: 0.10)
    pub flexibility: f64,
    /// Flat bonus when the contract type matches the stated preference (default: 0.10)
    pub contract_match_bonus: f64,
    /// Flat penalty when the termination fee exceeds tolerance (default: 0.10)
    pub termination_fee_penalty: f64,
}

pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    cost_low: 0.20,
    cost_medium: 0.40,
    cost_high: 0.60,
    renewable: 0.20,
    flexibility: 0.10,
    contract_match_bonus: 0.10,
    termination_fee_penalty: 0.10,
};

/// Scores closer than this are ranked by the tie-break instead.
pub const DEFAULT_TIE_EPSILON: f64 = 1e-6;

impl Default for ScoringWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl ScoringWeights {
    pub fn cost_weight(&self, priority: CostPriority) -> f64 {
        match priority {
            CostPriority::Low => self.cost_low,
            CostPriority::Medium => self.cost_medium,
            CostPriority::High => self.cost_high,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub plan: &'a EnergyPlan,
    pub preferences: &'a UserPreferences,
    pub projection: &'a CostProjection,
    /// Zero when the customer's current cost is unknown.
    pub current_annual_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanScore {
    /// Final score in `[0, 1]`, quantized to the tie epsilon.
    pub score: f64,
    pub components: ComponentScores,
    pub projected_annual_savings: Decimal,
    /// False when the current cost was unknown and savings did not count.
    pub savings_scored: bool,
}

#[derive(Debug, Clone)]
pub struct PreferenceScorer {
    weights: ScoringWeights,
    tie_epsilon: f64,
}

impl PreferenceScorer {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default(), tie_epsilon: DEFAULT_TIE_EPSILON }
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights, tie_epsilon: DEFAULT_TIE_EPSILON }
    }

    pub fn with_tie_epsilon(mut self, tie_epsilon: f64) -> Self {
        self.tie_epsilon = tie_epsilon;
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Exclusion rules applied before scoring. `None` keeps the plan.
    pub fn hard_filter(
        &self,
        plan: &EnergyPlan,
        projection: &CostProjection,
        preferences: &UserPreferences,
    ) -> Option<ExclusionReason> {
        if plan.supplier_rating < preferences.supplier_rating_preference {
            return Some(ExclusionReason::BelowRatingFloor {
                rating: plan.supplier_rating,
                floor: preferences.supplier_rating_preference,
            });
        }

        let budget = preferences.budget_constraints.as_ref()?;
        if let Some(limit) = budget.max_monthly_cost {
            if projection.monthly_cost > limit {
                return Some(ExclusionReason::OverMonthlyBudget {
                    monthly_cost: projection.monthly_cost,
                    limit,
                });
            }
        }
        if let Some(limit) = budget.max_annual_cost {
            if projection.annual_cost > limit {
                return Some(ExclusionReason::OverAnnualBudget {
                    annual_cost: projection.annual_cost,
                    limit,
                });
            }
        }

        None
    }

    pub fn score(&self, input: ScoringInput<'_>) -> PlanScore {
        let ScoringInput { plan, preferences, projection, current_annual_cost } = input;
        let savings_scored = current_annual_cost > Decimal::ZERO;

        let components = ComponentScores {
            cost: if savings_scored {
                cost_score(projection.annual_cost, current_annual_cost)
            } else {
                0.0
            },
            renewable: renewable_score(
                plan.renewable_percentage,
                preferences.renewable_energy_preference,
            ),
            flexibility: flexibility_score(
                plan.contract_length_months,
                preferences.flexibility_preference_months,
            ),
            contract_match_bonus: match preferences.contract_type_preference {
                Some(preferred) if preferred == plan.contract_type() => {
                    self.weights.contract_match_bonus
                }
                _ => 0.0,
            },
            termination_fee_penalty: if plan.early_termination_fee
                > preferences.early_termination_fee_tolerance
            {
                self.weights.termination_fee_penalty
            } else {
                0.0
            },
        };

        let total = components.cost * self.weights.cost_weight(preferences.cost_savings_priority)
            + components.renewable * self.weights.renewable
            + components.flexibility * self.weights.flexibility
            + components.contract_match_bonus
            - components.termination_fee_penalty;

        PlanScore {
            score: self.quantize(total.clamp(0.0, 1.0)),
            components,
            projected_annual_savings: current_annual_cost - projection.annual_cost,
            savings_scored,
        }
    }

    /// Ranking order: score descending, then lower rate, higher renewable share, plan id.
    ///
    /// Scores count as tied when they round to the same multiple of
    /// `tie_epsilon`. Two scores closer than `tie_epsilon` can still land in
    /// adjacent buckets when a rounding boundary falls between them; they are
    /// then ordered by score. Scores from [`PreferenceScorer::score`] are
    /// already quantized, so they are either equal or at least one bucket apart.
    pub fn compare(&self, a: (&EnergyPlan, f64), b: (&EnergyPlan, f64)) -> Ordering {
        let (plan_a, score_a) = a;
        let (plan_b, score_b) = b;

        self.score_bucket(score_b)
            .cmp(&self.score_bucket(score_a))
            .then_with(|| plan_a.rate_per_kwh().cmp(&plan_b.rate_per_kwh()))
            .then_with(|| plan_b.renewable_percentage.total_cmp(&plan_a.renewable_percentage))
            .then_with(|| plan_a.plan_id.cmp(&plan_b.plan_id))
    }

    fn score_bucket(&self, score: f64) -> i64 {
        (score / self.tie_epsilon).round() as i64
    }

    fn quantize(&self, score: f64) -> f64 {
        self.score_bucket(score) as f64 * self.tie_epsilon
    }
}

impl Default for PreferenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn cost_score(annual_cost: Decimal, current_annual_cost: Decimal) -> f64 {
    let reference = current_annual_cost.max(annual_cost);
    if reference <= Decimal::ZERO {
        return 0.0;
    }
    let ratio = (annual_cost / reference).to_f64().unwrap_or(1.0);
    1.0 - ratio.clamp(0.0, 1.0)
}

fn renewable_score(plan_percentage: f64, preferred_percentage: f64) -> f64 {
    (1.0 - (plan_percentage - preferred_percentage).abs() / 100.0).clamp(0.0, 1.0)
}

/// Full marks within tolerance, decaying linearly to zero at twice the tolerance.
fn flexibility_score(contract_months: u32, tolerance_months: u32) -> f64 {
    if contract_months <= tolerance_months {
        return 1.0;
    }
    if tolerance_months == 0 {
        return 0.0;
    }
    let overshoot = f64::from(contract_months - tolerance_months) / f64::from(tolerance_months);
    (1.0 - overshoot).clamp(0.0, 1.0)
}
