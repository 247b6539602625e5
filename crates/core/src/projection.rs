use rust_decimal::Decimal;

use crate::domain::plan::EnergyPlan;
use crate::domain::recommendation::{CostBreakdown, CostProjection, ProjectionStep};
use crate::domain::usage::UsageProfile;
use crate::errors::InvalidPlanError;
use crate::profile::MONTHS_PER_YEAR;

pub trait CostProjector: Send + Sync {
    fn project(
        &self,
        plan: &EnergyPlan,
        profile: &UsageProfile,
    ) -> Result<CostProjection, InvalidPlanError>;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicCostProjector;

impl CostProjector for DeterministicCostProjector {
    fn project(
        &self,
        plan: &EnergyPlan,
        profile: &UsageProfile,
    ) -> Result<CostProjection, InvalidPlanError> {
        project_cost(plan, profile)
    }
}

/// Projects one year of supply under `plan` for the given usage profile.
///
/// Promotional months are weighted by the average monthly usage rather than a
/// per-month forecast. Variable and indexed rates are projected at their
/// current value and only marked uncertain.
pub fn project_cost(
    plan: &EnergyPlan,
    profile: &UsageProfile,
) -> Result<CostProjection, InvalidPlanError> {
    let rate = plan.rate_per_kwh();
    if rate <= Decimal::ZERO {
        return Err(InvalidPlanError::NonPositiveRate { plan_id: plan.plan_id.clone(), rate });
    }

    let months_per_year = Decimal::from(MONTHS_PER_YEAR);
    let overflow = |stage: &'static str| InvalidPlanError::CostOverflow {
        plan_id: plan.plan_id.clone(),
        stage,
    };
    let mut steps = Vec::with_capacity(4);

    let base_energy_cost = rate.checked_mul(profile.annual_kwh).ok_or_else(|| overflow("energy"))?;
    steps.push(ProjectionStep {
        stage: "energy".to_string(),
        detail: format!("rate_per_kwh {rate} * annual_kwh {}", profile.annual_kwh),
        amount: base_energy_cost,
    });

    let promo_discount = match plan.pricing.promotional_rate() {
        Some(promo) => {
            let promo_months = promo.months.min(MONTHS_PER_YEAR);
            let discount = rate
                .checked_sub(promo.rate)
                .and_then(|delta| delta.checked_mul(profile.average_monthly_kwh))
                .and_then(|delta| delta.checked_mul(Decimal::from(promo_months)))
                .ok_or_else(|| overflow("promotional_discount"))?;
            steps.push(ProjectionStep {
                stage: "promotional_discount".to_string(),
                detail: format!(
                    "{promo_months} month(s) at {} instead of {rate} on {} kWh/month",
                    promo.rate, profile.average_monthly_kwh
                ),
                amount: -discount,
            });
            discount
        }
        None => Decimal::ZERO,
    };

    let energy_cost = base_energy_cost
        .checked_sub(promo_discount)
        .ok_or_else(|| overflow("promotional_discount"))?;
    let fees = plan.monthly_fee.checked_mul(months_per_year).ok_or_else(|| overflow("fees"))?;
    steps.push(ProjectionStep {
        stage: "fees".to_string(),
        detail: format!("monthly_fee {} * {MONTHS_PER_YEAR}", plan.monthly_fee),
        amount: fees,
    });

    let annual_cost = energy_cost.checked_add(fees).ok_or_else(|| overflow("annual_total"))?;
    steps.push(ProjectionStep {
        stage: "annual_total".to_string(),
        detail: "energy_cost + fees".to_string(),
        amount: annual_cost,
    });

    Ok(CostProjection {
        plan_id: plan.plan_id.clone(),
        annual_cost,
        monthly_cost: annual_cost / months_per_year,
        breakdown: CostBreakdown { energy_cost, fees, promo_discount },
        uncertain: plan.pricing.is_rate_uncertain(),
        steps,
    })
}
