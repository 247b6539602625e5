use rust_decimal::Decimal;

use crate::domain::plan::{EnergyPlan, PlanPricing};
use crate::domain::preferences::UserPreferences;
use crate::domain::recommendation::{CostProjection, RiskFlag, RiskKind, Severity};
use crate::domain::usage::{DataQuality, UsageProfile};

pub const DEFAULT_TERMINATION_FEE_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
pub const DEFAULT_CRITICAL_FEE_MULTIPLIER: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
pub const DEFAULT_LOW_SUPPLIER_RATING: f64 = 3.0;

#[derive(Clone, Debug, PartialEq)]
pub struct RiskThresholds {
    /// Fee above `tolerance * termination_fee_multiplier` raises a warning.
    pub termination_fee_multiplier: Decimal,
    /// Fee above `tolerance * critical_fee_multiplier` escalates it to critical.
    pub critical_fee_multiplier: Decimal,
    pub low_supplier_rating: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            termination_fee_multiplier: DEFAULT_TERMINATION_FEE_MULTIPLIER,
            critical_fee_multiplier: DEFAULT_CRITICAL_FEE_MULTIPLIER,
            low_supplier_rating: DEFAULT_LOW_SUPPLIER_RATING,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RiskContext<'a> {
    pub plan: &'a EnergyPlan,
    pub projection: &'a CostProjection,
    pub profile: &'a UsageProfile,
    pub preferences: &'a UserPreferences,
}

pub trait RiskAssessor: Send + Sync {
    fn assess(&self, context: RiskContext<'_>) -> Vec<RiskFlag>;
}

/// Evaluates every rule against the plan. Output order follows the rule order,
/// so identical inputs yield identical flag lists.
#[derive(Clone, Debug, Default)]
pub struct RuleBasedRiskAssessor {
    thresholds: RiskThresholds,
}

impl RuleBasedRiskAssessor {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    fn termination_fee(&self, context: &RiskContext<'_>) -> Option<RiskFlag> {
        let fee = context.plan.early_termination_fee;
        let tolerance = context.preferences.early_termination_fee_tolerance;
        // An unrepresentable threshold is one no fee can exceed.
        let exceeds = |multiplier: Decimal| {
            tolerance.checked_mul(multiplier).is_some_and(|threshold| fee > threshold)
        };
        if !exceeds(self.thresholds.termination_fee_multiplier) {
            return None;
        }

        let severity = if exceeds(self.thresholds.critical_fee_multiplier) {
            Severity::Critical
        } else {
            Severity::Warning
        };
        Some(RiskFlag::new(RiskKind::HighTerminationFee { fee, tolerance }, severity))
    }

    fn low_supplier_rating(&self, context: &RiskContext<'_>) -> Option<RiskFlag> {
        let rating = context.plan.supplier_rating;
        let threshold = self.thresholds.low_supplier_rating;
        (rating < threshold).then(|| {
            RiskFlag::new(RiskKind::LowSupplierRating { rating, threshold }, Severity::Warning)
        })
    }
}

impl RiskAssessor for RuleBasedRiskAssessor {
    fn assess(&self, context: RiskContext<'_>) -> Vec<RiskFlag> {
        [
            self.termination_fee(&context),
            variable_rate_exposure(&context),
            promo_rate_expiring(&context),
            self.low_supplier_rating(&context),
            insufficient_usage_data(&context),
            unclear_terms(&context),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn variable_rate_exposure(context: &RiskContext<'_>) -> Option<RiskFlag> {
    context.projection.uncertain.then(|| {
        RiskFlag::new(
            RiskKind::VariableRateExposure { contract_type: context.plan.contract_type() },
            Severity::Warning,
        )
    })
}

fn promo_rate_expiring(context: &RiskContext<'_>) -> Option<RiskFlag> {
    let promo = context.plan.pricing.promotional_rate()?;
    let contract_length_months = context.plan.contract_length_months;
    let expires_in_term = contract_length_months == 0 || promo.months < contract_length_months;

    expires_in_term.then(|| {
        RiskFlag::new(
            RiskKind::PromoRateExpiring { promo_months: promo.months, contract_length_months },
            Severity::Info,
        )
    })
}

fn insufficient_usage_data(context: &RiskContext<'_>) -> Option<RiskFlag> {
    let profile = context.profile;
    (profile.data_quality != DataQuality::Complete).then(|| {
        RiskFlag::new(
            RiskKind::InsufficientUsageData {
                data_quality: profile.data_quality,
                months_observed: profile.months_observed,
            },
            Severity::Info,
        )
    })
}

fn unclear_terms(context: &RiskContext<'_>) -> Option<RiskFlag> {
    let plan = context.plan;
    let missing = if plan.contract_length_months > 0 && plan.terms_url.is_none() {
        "terms_url"
    } else if matches!(plan.pricing, PlanPricing::Indexed { index_name: None, .. }) {
        "index_name"
    } else {
        return None;
    };

    Some(RiskFlag::new(RiskKind::UnclearTerms { missing: missing.to_string() }, Severity::Warning))
}
